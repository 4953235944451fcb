//! JSON boundary for hosts that exchange boards and operations as text.

use serde_json::Value as JsonValue;

use crate::element::Element;
use crate::error::{Error, Result};
use crate::ops::{Operation, OperationKind};

fn serialization(err: serde_json::Error) -> Error {
    Error::Serialization(err.to_string())
}

/// Decodes one operation. A `type` tag outside the known kinds is an
/// [`Error::UnsupportedOperation`], anything else malformed is a serialization error.
pub fn operation_from_value(value: JsonValue) -> Result<Operation> {
    let Some(tag) = value.get("type").and_then(JsonValue::as_str) else {
        return Err(Error::InvalidOperation("operation without a type tag".into()));
    };
    if serde_json::from_value::<OperationKind>(JsonValue::String(tag.to_string())).is_err() {
        return Err(Error::UnsupportedOperation(tag.to_string()));
    }
    serde_json::from_value(value).map_err(serialization)
}

pub fn operations_from_str(json: &str) -> Result<Vec<Operation>> {
    let values: Vec<JsonValue> = serde_json::from_str(json).map_err(serialization)?;
    values.into_iter().map(operation_from_value).collect()
}

pub fn operations_to_string(ops: &[Operation]) -> Result<String> {
    serde_json::to_string(ops).map_err(serialization)
}

pub fn elements_from_str(json: &str) -> Result<Vec<Element>> {
    serde_json::from_str(json).map_err(serialization)
}

pub fn elements_to_string(elements: &[Element]) -> Result<String> {
    serde_json::to_string(elements).map_err(serialization)
}
