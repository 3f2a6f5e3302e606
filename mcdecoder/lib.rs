//! Machine code decoder model.
//!
//! ```
//! use mcdecoder::{ByteOrder, Decoder, InstructionDescription, McDecoder, McDescription};
//!
//! let desc = McDescription::new(ByteOrder::Little).instruction(
//!     InstructionDescription::new("c_li", "010|x:imm[5]|xxxxx:rd|xxxxx:imm[4:0]|01")
//!         .unmatch_condition("rd == 0"),
//! );
//! let model = McDecoder::new(&desc).unwrap();
//! let mut decoder = Decoder::new(&model, 0x1000);
//! let insn = decoder.decode(&[0x15, 0x45]).unwrap().unwrap();
//! assert_eq!(insn.instruction.name, "c_li");
//! assert_eq!(insn.fields.get("rd"), Some(10));
//! assert_eq!(decoder.address(), 0x1002);
//! ```

#[macro_use]
extern crate log;

pub use mcdecoder_core::{
    bytes, condition, desc, encoding, error, expr, extras, insn, model, tree, utils,
};

pub use mcdecoder_core::{
    bytes::ByteOrder,
    condition::{Condition, Functions},
    desc::{DecoderDescription, InstructionDescription, MachineDescription, McDescription},
    error::Error,
    extras::Value,
    insn::{FieldValues, Form, InstructionDecoder},
    model::{Builder, Decoded, Machine, McDecoder},
    tree::{DecisionNode, DecisionTree},
    FieldDecoder, Options, SubfieldDecoder,
};

/// Decodes a byte stream one instruction at a time.
pub struct Decoder<'a> {
    model: &'a McDecoder,
    address: u64,
}

impl<'a> Decoder<'a> {
    pub fn new(model: &'a McDecoder, address: u64) -> Self {
        Self { model, address }
    }

    pub fn model(&self) -> &'a McDecoder {
        self.model
    }

    /// Current decoding address.
    pub fn address(&self) -> u64 {
        self.address
    }

    /// Decodes the first matching instruction at the start of `bytes`.
    ///
    /// The address is advanced by the instruction length. Returns `None` and
    /// keeps the address if nothing matches.
    pub fn decode(&mut self, bytes: &[u8]) -> Result<Option<Decoded<'a>>, Error> {
        let decoded = self.model.decode_bytes(bytes)?.into_iter().next();
        match &decoded {
            Some(insn) => {
                trace!("{:#x}: {} {}", self.address, insn.instruction.name, insn.fields);
                self.address += insn.instruction.byte_len() as u64;
            }
            None => trace!("{:#x}: unknown", self.address),
        }
        Ok(decoded)
    }

    /// Returns the number of bytes decoded back to back from the start of
    /// `data`. The current address is not changed.
    pub fn decode_len(&self, data: &[u8]) -> Result<usize, Error> {
        let mut cur = data;
        while !cur.is_empty() {
            let len = match self.model.decode_bytes(cur)?.first() {
                Some(insn) => insn.instruction.byte_len(),
                None => break,
            };
            cur = &cur[len..];
        }
        Ok(data.len() - cur.len())
    }

    /// Do not decode `size` bytes.
    pub fn skip(&mut self, size: u64) {
        self.address += size;
    }
}
