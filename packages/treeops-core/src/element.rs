use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Attribute bag of an element, also the payload of `set_node`, `set_viewport` and
/// `set_selection`.
pub type Properties = BTreeMap<String, Value>;

/// Key under which `set_node` rewrites the element identifier.
pub const ID_KEY: &str = "id";
/// Key under which `set_node` rewrites the element type tag.
pub const TYPE_KEY: &str = "type";
/// Child lists are structural and are never changed through `set_node`.
pub const CHILDREN_KEY: &str = "children";

/// Attribute value. Only JSON-shaped data is representable, so every element can be
/// cloned and compared structurally.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<Value>),
    Object(BTreeMap<String, Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Number(value as f64)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::Array(value)
    }
}

impl From<Properties> for Value {
    fn from(value: Properties) -> Self {
        Value::Object(value)
    }
}

/// Deep structural comparison used by the diff engine.
///
/// Numbers compare with `==`, arrays element-wise, objects key-wise. A top-level `Null`
/// attribute and a missing attribute are the same thing to callers of this function,
/// which receive `None` for both.
pub fn is_value_changed(old: Option<&Value>, new: Option<&Value>) -> bool {
    match (old, new) {
        (None, None) => false,
        (Some(Value::Null), None) | (None, Some(Value::Null)) => false,
        (None, Some(_)) | (Some(_), None) => true,
        (Some(a), Some(b)) => !values_equal(a, b),
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Number(x), Value::Number(y)) => x == y,
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(k, x)| ys.get(k).is_some_and(|y| values_equal(x, y)))
        }
        _ => false,
    }
}

/// A node of the board tree. `id` is the only identity that survives reordering.
///
/// Equality skips top-level `Null` attributes: `{fill: null}` and a missing `fill` are one
/// value, the same way the diff compares them and `set_node` stores them.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Element {
    pub id: String,
    #[cfg_attr(feature = "serde", serde(rename = "type", default))]
    pub element_type: String,
    /// Missing and empty child lists are the same value.
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Vec::is_empty")
    )]
    pub children: Vec<Element>,
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub attributes: Properties,
}

impl Element {
    pub fn new(id: impl Into<String>, element_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            element_type: element_type.into(),
            children: Vec::new(),
            attributes: Properties::new(),
        }
    }

    /// Sets an attribute; `Null` leaves it absent.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let (key, value) = (key.into(), value.into());
        if value.is_null() {
            self.attributes.remove(&key);
        } else {
            self.attributes.insert(key, value);
        }
        self
    }

    pub fn with_children(mut self, children: Vec<Element>) -> Self {
        self.children = children;
        self
    }

    /// Own property lookup that also answers for the `type` tag. `Null` reads as absent.
    pub fn property(&self, key: &str) -> Option<Value> {
        match key {
            TYPE_KEY => Some(Value::String(self.element_type.clone())),
            ID_KEY => Some(Value::String(self.id.clone())),
            _ => self.attributes.get(key).filter(|v| !v.is_null()).cloned(),
        }
    }

    /// Merges `properties` onto the element. `Null` deletes an attribute; `id` and `type`
    /// accept string values only; `children` is ignored.
    pub fn merge_properties(&mut self, properties: &Properties) {
        for (key, value) in properties {
            match key.as_str() {
                ID_KEY => {
                    if let Some(id) = value.as_str() {
                        self.id = id.to_string();
                    }
                }
                TYPE_KEY => {
                    if let Some(t) = value.as_str() {
                        self.element_type = t.to_string();
                    }
                }
                CHILDREN_KEY => {
                    tracing::warn!(id = %self.id, "set_node cannot replace children, key ignored");
                }
                _ if value.is_null() => {
                    self.attributes.remove(key);
                }
                _ => {
                    self.attributes.insert(key.clone(), value.clone());
                }
            }
        }
    }
}

impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.element_type == other.element_type
            && present_attributes(&self.attributes).eq(present_attributes(&other.attributes))
            && self.children == other.children
    }
}

/// Attributes in key order, without top-level `Null`s.
pub(crate) fn present_attributes(
    attributes: &Properties,
) -> impl Iterator<Item = (&String, &Value)> + '_ {
    attributes.iter().filter(|(_, value)| !value.is_null())
}

/// Merges a side-channel update (viewport or selection): `Null` deletes the key.
pub fn merge_side_channel(target: &mut Properties, properties: &Properties) {
    for (key, value) in properties {
        if value.is_null() {
            target.remove(key);
        } else {
            target.insert(key.clone(), value.clone());
        }
    }
}
