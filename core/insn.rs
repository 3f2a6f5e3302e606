use std::fmt;

use crate::{
    condition::{Condition, Functions},
    desc::InstructionDescription,
    error::{ConditionError, Error, LayoutError, LayoutErrorKind},
    expr,
    extras::Value,
    layout::{self, FieldDecoder},
    utils::{bit_mask, deposit, type_bit_len},
};

/// Geometry of an encoding: element bit length and number of elements.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Form {
    pub element_bit_len: u32,
    pub element_count: u32,
}

impl Form {
    pub fn new(element_bit_len: u32, element_count: u32) -> Self {
        Self {
            element_bit_len,
            element_count,
        }
    }

    pub fn bit_len(&self) -> u32 {
        self.element_bit_len * self.element_count
    }

    pub fn byte_len(&self) -> usize {
        (self.bit_len() as usize + 7) / 8
    }

    /// Mask selecting the right-aligned code bits of this form.
    pub fn code_mask(&self) -> u64 {
        bit_mask(self.bit_len())
    }

    /// Selects the bits of this form from a code `code_bit_len` bits wide.
    ///
    /// The form takes the leading, most significant bits of the code, so a
    /// narrower instruction is matched against the first elements.
    pub fn align(&self, code: u64, code_bit_len: u32) -> u64 {
        (code >> code_bit_len.saturating_sub(self.bit_len())) & self.code_mask()
    }

    /// Returns the element containing the instruction bit `bit`.
    pub fn element_of(&self, bit: u32) -> u32 {
        (self.bit_len() - 1 - bit) / self.element_bit_len
    }
}

impl fmt::Display for Form {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "code{}x{}", self.element_bit_len, self.element_count)
    }
}

/// Field values extracted from a code, in field order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FieldValues<'a> {
    values: Vec<(&'a str, u64)>,
}

impl<'a> FieldValues<'a> {
    pub fn get(&self, name: &str) -> Option<u64> {
        self.values.iter().find(|(n, _)| *n == name).map(|(_, v)| *v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'a str, u64)> + '_ {
        self.values.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Display for FieldValues<'_> {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        for (i, (name, value)) in self.values.iter().enumerate() {
            if i != 0 {
                fmt.write_str(" ")?;
            }
            write!(fmt, "{name}={value:#x}")?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct InstructionDecoder {
    pub name: String,
    /// Source encoding format.
    pub encoding: String,
    pub form: Form,
    /// Width of the smallest unsigned integer type holding the whole code.
    pub type_bit_len: u32,
    pub fixed_bit_mask: u64,
    pub fixed_bits: u64,
    pub match_condition: Option<Condition>,
    pub unmatch_condition: Option<Condition>,
    /// Fields ordered by their most significant bit, descending.
    pub fields: Vec<FieldDecoder>,
    pub extras: Option<Value>,
}

impl InstructionDecoder {
    /// Compiles the encoding and the conditions of an instruction.
    pub fn compile(desc: &InstructionDescription) -> Result<Self, Error> {
        let layout = layout::compile(&desc.name, &desc.format, &desc.field_extras)?;
        let mut insn = Self {
            name: desc.name.clone(),
            encoding: desc.format.clone(),
            form: layout.form,
            type_bit_len: type_bit_len(layout.form.bit_len()),
            fixed_bit_mask: layout.fixed_bit_mask,
            fixed_bits: layout.fixed_bits,
            match_condition: None,
            unmatch_condition: None,
            fields: layout.fields,
            extras: desc.extras.clone(),
        };
        insn.match_condition = insn.compile_condition(desc.match_condition.as_deref())?;
        insn.unmatch_condition = insn.compile_condition(desc.unmatch_condition.as_deref())?;
        Ok(insn)
    }

    fn compile_condition(&self, src: Option<&str>) -> Result<Option<Condition>, ConditionError> {
        match src {
            Some(src) => {
                let condition = expr::parse(&self.name, src)?;
                condition.validate(self)?;
                Ok(Some(condition))
            }
            None => Ok(None),
        }
    }

    pub fn encoding_element_bit_len(&self) -> u32 {
        self.form.element_bit_len
    }

    pub fn length_of_encoding_elements(&self) -> u32 {
        self.form.element_count
    }

    pub fn bit_len(&self) -> u32 {
        self.form.bit_len()
    }

    pub fn byte_len(&self) -> usize {
        self.form.byte_len()
    }

    pub fn field(&self, name: &str) -> Option<&FieldDecoder> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Checks the mask invariant `fixed_bits & !fixed_bit_mask == 0`.
    pub fn check_mask(&self) -> Result<(), LayoutError> {
        if self.fixed_bits & !self.fixed_bit_mask != 0 {
            let kind = LayoutErrorKind::MaskInvariant {
                mask: self.fixed_bit_mask,
                bits: self.fixed_bits,
            };
            return Err(LayoutError::new(&self.name, kind));
        }
        Ok(())
    }

    pub fn matches_fixed_bits(&self, code: u64) -> bool {
        code & self.fixed_bit_mask == self.fixed_bits
    }

    /// Confirms that the code is this instruction.
    ///
    /// The code must have the fixed bits, satisfy the match condition and
    /// must not satisfy the unmatch condition.
    pub fn confirm(&self, code: u64, functions: &Functions) -> Result<bool, ConditionError> {
        if !self.matches_fixed_bits(code) {
            return Ok(false);
        }
        self.confirm_conditions(code, functions)
    }

    pub(crate) fn confirm_conditions(
        &self,
        code: u64,
        functions: &Functions,
    ) -> Result<bool, ConditionError> {
        if let Some(cond) = &self.match_condition {
            if !cond.evaluate(self, code, functions)? {
                return Ok(false);
            }
        }
        if let Some(cond) = &self.unmatch_condition {
            if cond.evaluate(self, code, functions)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Vectorized [`confirm_conditions`] over codes that already passed the
    /// fixed-bit test.
    ///
    /// [`confirm_conditions`]: Self::confirm_conditions
    pub(crate) fn confirm_conditions_lanes(
        &self,
        codes: &[u64],
        functions: &Functions,
    ) -> Result<Vec<bool>, ConditionError> {
        if codes.is_empty() {
            return Ok(Vec::new());
        }
        let mut accepted = match &self.match_condition {
            Some(cond) => cond.evaluate_lanes(self, codes, functions)?,
            None => vec![true; codes.len()],
        };
        if let Some(cond) = &self.unmatch_condition {
            let lanes: Vec<usize> = (0..codes.len()).filter(|&i| accepted[i]).collect();
            if lanes.is_empty() {
                return Ok(accepted);
            }
            let live: Vec<u64> = lanes.iter().map(|&i| codes[i]).collect();
            let rejected = cond.evaluate_lanes(self, &live, functions)?;
            for (&i, rejected) in lanes.iter().zip(rejected) {
                accepted[i] = !rejected;
            }
        }
        Ok(accepted)
    }

    /// Extracts every field value from the code.
    pub fn decode_fields(&self, code: u64) -> FieldValues<'_> {
        let values = self
            .fields
            .iter()
            .map(|f| (f.name.as_str(), f.decode(code)))
            .collect();
        FieldValues { values }
    }

    /// Builds a code from the fixed bits and the field values.
    ///
    /// Fields missing in `values` are encoded as zero.
    pub fn encode(&self, values: &[(&str, u64)]) -> Result<u64, LayoutError> {
        let mut code = self.fixed_bits;
        for &(name, value) in values {
            let field = self.field(name).ok_or_else(|| {
                LayoutError::new(&self.name, LayoutErrorKind::UndefinedField(name.to_owned()))
            })?;
            if value & !field.value_mask() != 0 {
                let kind = LayoutErrorKind::FieldValue {
                    field: name.to_owned(),
                    value,
                };
                return Err(LayoutError::new(&self.name, kind));
            }
            for s in &field.subfields {
                let bits = value >> s.lsb_in_field;
                code = deposit(code, s.lsb_in_instruction, s.width(), bits);
            }
        }
        Ok(code)
    }
}
