use schemars::JsonSchema;
use serde::de::{DeserializeOwned, Error as _, Unexpected};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::syntax::format_reference;

/// Entities addressable by name inside a project.
pub trait Named {
    fn name(&self) -> &str;
}

/// A field that holds either an inline entity or a `ref(name)` pointer to one
/// defined elsewhere in the project.
#[derive(Debug, Clone, PartialEq)]
pub enum Slot<T> {
    Reference(String),
    Inline(T),
}

impl<T: Named> Slot<T> {
    #[must_use]
    pub fn is_reference_form(&self) -> bool {
        matches!(self, Self::Reference(_))
    }

    #[must_use]
    pub fn is_inline_form(&self) -> bool {
        matches!(self, Self::Inline(_))
    }

    /// The entity's own name when inline, the referenced name otherwise.
    #[must_use]
    pub fn resolved_name(&self) -> &str {
        match self {
            Self::Reference(name) => name,
            Self::Inline(entity) => entity.name(),
        }
    }

    #[must_use]
    pub fn inline(&self) -> Option<&T> {
        match self {
            Self::Inline(entity) => Some(entity),
            Self::Reference(_) => None,
        }
    }

    #[must_use]
    pub fn reference(&self) -> Option<&str> {
        match self {
            Self::Reference(name) => Some(name),
            Self::Inline(_) => None,
        }
    }
}

impl<T: Serialize> Serialize for Slot<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Reference(name) => serializer.serialize_str(&format_reference(name)),
            Self::Inline(entity) => entity.serialize(serializer),
        }
    }
}

/// Document shape of a slot before the reference string is checked.
///
/// A string is always the reference form and an object is always inline, so
/// an inline entity that fails to parse reports its own error.
#[derive(Debug, Clone, PartialEq, JsonSchema)]
#[serde(untagged)]
pub enum SlotDocument<T> {
    Text(String),
    Inline(T),
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for SlotDocument<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::String(text) => Ok(Self::Text(text)),
            value @ Value::Object(_) => T::deserialize(value)
                .map(Self::Inline)
                .map_err(D::Error::custom),
            Value::Null => Err(D::Error::invalid_type(
                Unexpected::Unit,
                &"a ref(name) string or an inline object",
            )),
            Value::Bool(flag) => Err(D::Error::invalid_type(
                Unexpected::Bool(flag),
                &"a ref(name) string or an inline object",
            )),
            Value::Number(_) | Value::Array(_) => Err(D::Error::invalid_type(
                Unexpected::Other("a number or array"),
                &"a ref(name) string or an inline object",
            )),
        }
    }
}
