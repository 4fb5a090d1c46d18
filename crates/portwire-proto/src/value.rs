use std::fmt;

use serde::{Deserialize, Serialize};

/// A property value as read from or written to the daemon.
///
/// Property values are strings on the wire; the literals `"true"` and
/// `"false"` stand for booleans in both directions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Text(String),
}

impl PropertyValue {
    /// Interpret a wire string.
    pub fn from_wire(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        match raw.as_str() {
            "true" => PropertyValue::Bool(true),
            "false" => PropertyValue::Bool(false),
            _ => PropertyValue::Text(raw),
        }
    }

    /// The string sent to the daemon.
    pub fn to_wire(&self) -> String {
        match self {
            PropertyValue::Bool(true) => "true".to_string(),
            PropertyValue::Bool(false) => "false".to_string(),
            PropertyValue::Text(text) => text.clone(),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Bool(b) => Some(*b),
            PropertyValue::Text(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::Text(text) => Some(text),
            PropertyValue::Bool(_) => None,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_wire())
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Bool(value)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::Text(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::Text(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Text(value.to_string())
    }
}

impl From<u64> for PropertyValue {
    fn from(value: u64) -> Self {
        PropertyValue::Text(value.to_string())
    }
}
