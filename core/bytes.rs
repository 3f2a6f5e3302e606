use std::{fmt, str::FromStr};

use crate::insn::Form;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "lowercase")
)]
pub enum ByteOrder {
    #[default]
    Little,
    Big,
}

impl fmt::Display for ByteOrder {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Little => fmt.write_str("little"),
            Self::Big => fmt.write_str("big"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseByteOrderError(String);

impl fmt::Display for ParseByteOrderError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "unknown byte order \"{}\"", self.0)
    }
}

impl std::error::Error for ParseByteOrderError {}

impl FromStr for ByteOrder {
    type Err = ParseByteOrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "little" => Ok(Self::Little),
            "big" => Ok(Self::Big),
            _ => Err(ParseByteOrderError(s.to_owned())),
        }
    }
}

pub struct Bytes<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Bytes<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn tail(&self) -> &'a [u8] {
        &self.data[self.offset..]
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    pub fn advance(&mut self, count: usize) {
        self.offset += count;
    }

    pub fn read(&mut self, len: usize) -> Option<&'a [u8]> {
        if len > self.remaining() {
            return None;
        }
        let slice = &self.tail()[..len];
        self.offset += len;
        Some(slice)
    }

    /// Reads an unsigned integer of `len` bytes, `len` must not exceed 8.
    pub fn read_uint(&mut self, order: ByteOrder, len: usize) -> Option<u64> {
        debug_assert!(len <= 8);
        let slice = self.read(len)?;
        let fold = |acc: u64, &byte: &u8| (acc << 8) | byte as u64;
        Some(match order {
            ByteOrder::Big => slice.iter().fold(0, fold),
            ByteOrder::Little => slice.iter().rev().fold(0, fold),
        })
    }
}

/// Assembles the leading bytes into a code of the given form.
///
/// Every encoding element is read with the byte order, the first element
/// becomes the most significant part of the code. Returns `None` if there are
/// not enough bytes or the element length is not a whole number of bytes.
pub fn assemble(data: &[u8], order: ByteOrder, form: Form) -> Option<u64> {
    if form.element_bit_len % 8 != 0 {
        return None;
    }
    let len = form.element_bit_len as usize / 8;
    let mut bytes = Bytes::new(data);
    let mut code = 0;
    for _ in 0..form.element_count {
        let element = bytes.read_uint(order, len)?;
        code = if form.element_bit_len == 64 {
            element
        } else {
            (code << form.element_bit_len) | element
        };
    }
    Some(code)
}
