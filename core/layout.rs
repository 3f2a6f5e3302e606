//! Bit-layout compiler.
//!
//! Turns a parsed encoding into fixed-bit mask, fixed bits and field
//! decoders. Bit positions are counted from the least significant bit of the
//! whole instruction, the first encoding element is the most significant one.

use std::collections::BTreeMap;

use crate::{
    encoding::{self, Token},
    error::{LayoutError, LayoutErrorKind},
    extras::Value,
    insn::Form,
    utils::{bit_mask, type_bit_len},
};

/// A contiguous slice of the instruction bits that belongs to a field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubfieldDecoder {
    /// Position in the field declaration order.
    pub index: usize,
    /// Mask of the subfield bits in the instruction.
    pub mask: u64,
    pub msb_in_instruction: u32,
    pub lsb_in_instruction: u32,
    /// Position of the least significant subfield bit in the field value.
    pub lsb_in_field: u32,
}

impl SubfieldDecoder {
    pub fn width(&self) -> u32 {
        self.msb_in_instruction - self.lsb_in_instruction + 1
    }

    /// Returns the encoding element which contains this subfield.
    pub fn element(&self, form: Form) -> u32 {
        form.element_of(self.msb_in_instruction)
    }

    /// Returns the subfield bits shifted to its place in the field value.
    pub fn decode(&self, code: u64) -> u64 {
        ((code >> self.lsb_in_instruction) & bit_mask(self.width())) << self.lsb_in_field
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldDecoder {
    pub name: String,
    /// Width of the smallest unsigned integer type holding the field value.
    pub type_bit_len: u32,
    pub subfields: Vec<SubfieldDecoder>,
    pub extras: Option<Value>,
}

impl FieldDecoder {
    /// Number of instruction bits in the field.
    pub fn width(&self) -> u32 {
        self.subfields.iter().map(SubfieldDecoder::width).sum()
    }

    /// The most significant instruction bit of the field.
    pub fn msb(&self) -> u32 {
        self.subfields
            .iter()
            .map(|s| s.msb_in_instruction)
            .max()
            .unwrap_or(0)
    }

    /// Mask of all field bits in the instruction.
    pub fn mask(&self) -> u64 {
        self.subfields.iter().fold(0, |m, s| m | s.mask)
    }

    /// Mask of all field bits in the field value.
    pub fn value_mask(&self) -> u64 {
        self.subfields.iter().fold(0, |m, s| {
            m | (bit_mask(s.width()) << s.lsb_in_field)
        })
    }

    pub fn decode(&self, code: u64) -> u64 {
        self.subfields.iter().fold(0, |v, s| v | s.decode(code))
    }

    /// Decodes only the subfields located in the encoding element `element`.
    pub fn decode_element(&self, code: u64, form: Form, element: u32) -> u64 {
        self.subfields
            .iter()
            .filter(|s| s.element(form) == element)
            .fold(0, |v, s| v | s.decode(code))
    }

    pub fn has_element(&self, form: Form, element: u32) -> bool {
        self.subfields.iter().any(|s| s.element(form) == element)
    }
}

pub(crate) struct Layout {
    pub(crate) form: Form,
    pub(crate) fixed_bit_mask: u64,
    pub(crate) fixed_bits: u64,
    pub(crate) fields: Vec<FieldDecoder>,
}

struct Placed<'a> {
    token: &'a Token,
    msb: u32,
    lsb: u32,
}

fn ranged_subfields(
    name: &str,
    field: &str,
    tokens: &[Placed],
) -> Result<Vec<SubfieldDecoder>, LayoutError> {
    let error = |kind| LayoutError::new(name, kind);
    let mut subfields = Vec::new();
    let mut used = 0_u64;
    for placed in tokens {
        let invalid = placed.token.ranges.iter().find(|r| r.msb < r.lsb || r.msb >= 64);
        if let Some(range) = invalid {
            return Err(error(LayoutErrorKind::Range {
                field: field.to_owned(),
                msb: range.msb,
                lsb: range.lsb,
            }));
        }
        let ranges: u32 = placed.token.ranges.iter().map(|r| r.width()).sum();
        if ranges != placed.token.bit_len() {
            return Err(error(LayoutErrorKind::RangeWidth {
                field: field.to_owned(),
                bits: placed.token.bit_len(),
                ranges,
            }));
        }
        let mut msb = placed.msb;
        for range in &placed.token.ranges {
            let bits = bit_mask(range.width()) << range.lsb;
            if used & bits != 0 {
                return Err(error(LayoutErrorKind::Overlap {
                    field: field.to_owned(),
                    bit: (used & bits).trailing_zeros(),
                }));
            }
            used |= bits;
            let lsb = msb + 1 - range.width();
            subfields.push(SubfieldDecoder {
                index: subfields.len(),
                mask: bit_mask(range.width()) << lsb,
                msb_in_instruction: msb,
                lsb_in_instruction: lsb,
                lsb_in_field: range.lsb,
            });
            msb = msb.wrapping_sub(range.width());
        }
    }
    Ok(subfields)
}

fn accumulated_subfields(tokens: &[Placed]) -> Vec<SubfieldDecoder> {
    let mut acc: u32 = tokens.iter().map(|p| p.token.bit_len()).sum();
    tokens
        .iter()
        .enumerate()
        .map(|(index, placed)| {
            acc -= placed.token.bit_len();
            SubfieldDecoder {
                index,
                mask: bit_mask(placed.token.bit_len()) << placed.lsb,
                msb_in_instruction: placed.msb,
                lsb_in_instruction: placed.lsb,
                lsb_in_field: acc,
            }
        })
        .collect()
}

/// Compiles the encoding format of the instruction `name`.
pub(crate) fn compile(
    name: &str,
    format: &str,
    field_extras: &BTreeMap<String, Value>,
) -> Result<Layout, LayoutError> {
    let error = |kind| LayoutError::new(name, kind);
    let encoding = encoding::parse(name, format)?;

    let element_bit_len = encoding.elements[0].bit_len();
    for element in &encoding.elements[1..] {
        if element.bit_len() != element_bit_len {
            return Err(error(LayoutErrorKind::InconsistentElements {
                first: element_bit_len,
                other: element.bit_len(),
            }));
        }
    }
    let total = encoding.bit_len();
    if total > 64 {
        return Err(error(LayoutErrorKind::Width(total)));
    }
    let form = Form::new(element_bit_len, encoding.elements.len() as u32);

    let mut fixed_bit_mask = 0_u64;
    let mut fixed_bits = 0_u64;
    let mut fields: Vec<(&str, Vec<Placed>)> = Vec::new();
    let mut pos = total;
    for token in encoding.tokens() {
        let msb = pos - 1;
        pos -= token.bit_len();
        for (i, c) in token.bits.bytes().enumerate() {
            let bit = 1_u64 << (msb - i as u32);
            match c {
                b'0' => fixed_bit_mask |= bit,
                b'1' => {
                    fixed_bit_mask |= bit;
                    fixed_bits |= bit;
                }
                _ => {}
            }
        }
        if let Some(field) = token.name.as_deref() {
            let placed = Placed {
                token,
                msb,
                lsb: pos,
            };
            match fields.iter().position(|(n, _)| *n == field) {
                Some(i) => fields[i].1.push(placed),
                None => fields.push((field, vec![placed])),
            }
        }
    }

    let mut decoders = Vec::with_capacity(fields.len());
    for (field, tokens) in &fields {
        let explicit = tokens.iter().filter(|p| !p.token.ranges.is_empty()).count();
        let subfields = if explicit == tokens.len() {
            ranged_subfields(name, field, tokens)?
        } else if explicit == 0 {
            accumulated_subfields(tokens)
        } else {
            return Err(error(LayoutErrorKind::MixedRanges(field.to_string())));
        };
        let top = subfields
            .iter()
            .map(|s| s.lsb_in_field + s.width())
            .max()
            .unwrap_or(1);
        decoders.push(FieldDecoder {
            name: field.to_string(),
            type_bit_len: type_bit_len(top),
            subfields,
            extras: field_extras.get(*field).cloned(),
        });
    }
    decoders.sort_by_key(|f| std::cmp::Reverse(f.msb()));

    if let Some(field) = field_extras
        .keys()
        .find(|k| !decoders.iter().any(|f| &f.name == *k))
    {
        return Err(error(LayoutErrorKind::UndefinedField(field.clone())));
    }

    trace!(
        "{name}: {form}, mask {fixed_bit_mask:#x}, bits {fixed_bits:#x}, {} field(s)",
        decoders.len()
    );

    Ok(Layout {
        form,
        fixed_bit_mask,
        fixed_bits,
        fields: decoders,
    })
}
