#[macro_use]
extern crate log;

mod batch;
mod layout;

pub mod bytes;
pub mod condition;
pub mod desc;
pub mod encoding;
pub mod error;
pub mod expr;
pub mod extras;
pub mod insn;
pub mod model;
pub mod tree;
pub mod utils;

pub use crate::layout::{FieldDecoder, SubfieldDecoder};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Options {
    /// Let decision trees discriminate on bits fixed by only some of the
    /// candidates.
    pub split_wildcards: bool,
    /// Number of worker threads used by batched decoding.
    pub threads: usize,
    /// Minimal number of codes processed by one worker thread.
    pub chunk_size: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            split_wildcards: true,
            threads: 1,
            chunk_size: 4096,
        }
    }
}

impl Options {
    pub fn split_wildcards(mut self, split_wildcards: bool) -> Self {
        self.split_wildcards = split_wildcards;
        self
    }

    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self
    }

    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }
}
