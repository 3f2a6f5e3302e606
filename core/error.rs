use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LayoutErrorKind {
    /// The encoding format string is malformed.
    Syntax { pos: usize, msg: String },
    /// The encoding has no bits.
    Empty,
    /// Encoding elements have different bit lengths.
    InconsistentElements { first: u32, other: u32 },
    /// The encoding does not fit into a 64-bit code.
    Width(u32),
    /// A bit range is reversed or lies outside of the field token.
    Range { field: String, msb: u32, lsb: u32 },
    /// Sum of the token ranges does not match the token bit count.
    RangeWidth {
        field: String,
        bits: u32,
        ranges: u32,
    },
    /// Two ranges of the same field share bits.
    Overlap { field: String, bit: u32 },
    /// Some tokens of a field have explicit ranges and some do not.
    MixedRanges(String),
    /// The field does not exist.
    UndefinedField(String),
    /// The value does not fit into the field.
    FieldValue { field: String, value: u64 },
    /// Fixed bits are set outside of the fixed-bit mask.
    MaskInvariant { mask: u64, bits: u64 },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LayoutError {
    instruction: String,
    kind: LayoutErrorKind,
}

impl LayoutError {
    pub(crate) fn new(instruction: &str, kind: LayoutErrorKind) -> Self {
        Self {
            instruction: instruction.to_owned(),
            kind,
        }
    }

    pub fn instruction(&self) -> &str {
        &self.instruction
    }

    pub fn kind(&self) -> &LayoutErrorKind {
        &self.kind
    }
}

impl fmt::Display for LayoutError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "{}: ", self.instruction)?;
        match &self.kind {
            LayoutErrorKind::Syntax { pos, msg } => {
                write!(fmt, "encoding syntax error at {pos}: {msg}")
            }
            LayoutErrorKind::Empty => fmt.write_str("empty encoding"),
            LayoutErrorKind::InconsistentElements { first, other } => write!(
                fmt,
                "encoding elements must have the same bit length, {first} != {other}"
            ),
            LayoutErrorKind::Width(bits) => {
                write!(fmt, "encoding is {bits} bits long, at most 64 supported")
            }
            LayoutErrorKind::Range { field, msb, lsb } => {
                write!(fmt, "invalid range [{msb}:{lsb}] of field \"{field}\"")
            }
            LayoutErrorKind::RangeWidth {
                field,
                bits,
                ranges,
            } => write!(
                fmt,
                "field \"{field}\" token has {bits} bits but its ranges cover {ranges} bits"
            ),
            LayoutErrorKind::Overlap { field, bit } => {
                write!(fmt, "bit {bit} of field \"{field}\" is defined twice")
            }
            LayoutErrorKind::MixedRanges(field) => write!(
                fmt,
                "field \"{field}\" mixes tokens with and without explicit ranges"
            ),
            LayoutErrorKind::UndefinedField(field) => {
                write!(fmt, "field \"{field}\" is not defined")
            }
            LayoutErrorKind::FieldValue { field, value } => {
                write!(fmt, "value {value:#x} does not fit into field \"{field}\"")
            }
            LayoutErrorKind::MaskInvariant { mask, bits } => write!(
                fmt,
                "fixed bits {bits:#x} are not covered by fixed bit mask {mask:#x}"
            ),
        }
    }
}

impl std::error::Error for LayoutError {}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConditionErrorKind {
    /// The condition string is malformed.
    Syntax { pos: usize, msg: String },
    /// The condition refers to a field the instruction does not have.
    UndefinedField(String),
    /// Element index is outside of the encoding elements.
    ElementIndex { field: String, index: u32, count: u32 },
    /// The field has no bits in the selected encoding element.
    EmptyElement { field: String, index: u32 },
    /// The function is not registered.
    UndefinedFunction(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConditionError {
    instruction: String,
    kind: ConditionErrorKind,
}

impl ConditionError {
    pub(crate) fn new(instruction: &str, kind: ConditionErrorKind) -> Self {
        Self {
            instruction: instruction.to_owned(),
            kind,
        }
    }

    pub fn instruction(&self) -> &str {
        &self.instruction
    }

    pub fn kind(&self) -> &ConditionErrorKind {
        &self.kind
    }
}

impl fmt::Display for ConditionError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "{}: ", self.instruction)?;
        match &self.kind {
            ConditionErrorKind::Syntax { pos, msg } => {
                write!(fmt, "condition syntax error at {pos}: {msg}")
            }
            ConditionErrorKind::UndefinedField(field) => {
                write!(fmt, "condition refers to undefined field \"{field}\"")
            }
            ConditionErrorKind::ElementIndex {
                field,
                index,
                count,
            } => write!(
                fmt,
                "element index {index} of field \"{field}\" is out of range, instruction has {count} element(s)"
            ),
            ConditionErrorKind::EmptyElement { field, index } => {
                write!(fmt, "field \"{field}\" has no bits in element {index}")
            }
            ConditionErrorKind::UndefinedFunction(name) => {
                write!(fmt, "function \"{name}\" is not registered")
            }
        }
    }
}

impl std::error::Error for ConditionError {}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodeAmbiguityError {
    code: u64,
    instructions: Vec<String>,
}

impl DecodeAmbiguityError {
    pub(crate) fn new(code: u64, instructions: Vec<String>) -> Self {
        Self { code, instructions }
    }

    pub fn code(&self) -> u64 {
        self.code
    }

    /// Names of all matched instructions in declaration order.
    pub fn instructions(&self) -> &[String] {
        &self.instructions
    }
}

impl fmt::Display for DecodeAmbiguityError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(
            fmt,
            "code {:#x} matches {} instructions: {}",
            self.code,
            self.instructions.len(),
            self.instructions.join(", ")
        )
    }
}

impl std::error::Error for DecodeAmbiguityError {}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    Layout(LayoutError),
    Condition(ConditionError),
    Ambiguity(DecodeAmbiguityError),
}

impl fmt::Display for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Layout(e) => e.fmt(fmt),
            Self::Condition(e) => e.fmt(fmt),
            Self::Ambiguity(e) => e.fmt(fmt),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Layout(e) => Some(e),
            Self::Condition(e) => Some(e),
            Self::Ambiguity(e) => Some(e),
        }
    }
}

impl From<LayoutError> for Error {
    fn from(value: LayoutError) -> Self {
        Self::Layout(value)
    }
}

impl From<ConditionError> for Error {
    fn from(value: ConditionError) -> Self {
        Self::Condition(value)
    }
}

impl From<DecodeAmbiguityError> for Error {
    fn from(value: DecodeAmbiguityError) -> Self {
        Self::Ambiguity(value)
    }
}
