//! Validated decoder description consumed by the model builder.

use std::collections::BTreeMap;

use crate::{bytes::ByteOrder, extras::Value};

#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MachineDescription {
    pub byteorder: ByteOrder,
    #[cfg_attr(feature = "serde", serde(default))]
    pub extras: Option<Value>,
}

#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InstructionDescription {
    pub name: String,
    pub format: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub match_condition: Option<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub unmatch_condition: Option<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub extras: Option<Value>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub field_extras: BTreeMap<String, Value>,
}

impl InstructionDescription {
    pub fn new(name: &str, format: &str) -> Self {
        Self {
            name: name.to_owned(),
            format: format.to_owned(),
            ..Self::default()
        }
    }

    pub fn match_condition(mut self, condition: &str) -> Self {
        self.match_condition = Some(condition.to_owned());
        self
    }

    pub fn unmatch_condition(mut self, condition: &str) -> Self {
        self.unmatch_condition = Some(condition.to_owned());
        self
    }

    pub fn extras(mut self, extras: impl Into<Value>) -> Self {
        self.extras = Some(extras.into());
        self
    }

    pub fn field_extras(mut self, field: &str, extras: impl Into<Value>) -> Self {
        self.field_extras.insert(field.to_owned(), extras.into());
        self
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DecoderDescription {
    #[cfg_attr(feature = "serde", serde(default))]
    pub namespace: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct McDescription {
    pub machine: MachineDescription,
    pub instructions: Vec<InstructionDescription>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub decoder: Option<DecoderDescription>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub extras: Option<Value>,
}

impl McDescription {
    pub fn new(byteorder: ByteOrder) -> Self {
        Self {
            machine: MachineDescription {
                byteorder,
                extras: None,
            },
            ..Self::default()
        }
    }

    pub fn namespace(mut self, namespace: &str) -> Self {
        self.decoder = Some(DecoderDescription {
            namespace: Some(namespace.to_owned()),
        });
        self
    }

    pub fn instruction(mut self, instruction: InstructionDescription) -> Self {
        self.instructions.push(instruction);
        self
    }
}
