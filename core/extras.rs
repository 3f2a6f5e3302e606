//! Untyped user data carried through the model without interpretation.

pub use serde_json::Value;
