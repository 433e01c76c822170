//! Path-tracking access into a JSON payload.
//!
//! Telemetry validation needs to say *which* key was missing, so every lookup
//! carries the dotted path that led to it.

use crate::error::DecodeError;
use serde_json::Value;

/// A JSON value together with the dotted path it was reached by.
#[derive(Debug, Clone)]
pub(crate) struct Field<'a> {
    value: &'a Value,
    path: String,
}

impl<'a> Field<'a> {
    pub(crate) fn root(value: &'a Value) -> Self {
        Self {
            value,
            path: String::new(),
        }
    }

    fn child_path(&self, key: &str) -> String {
        if self.path.is_empty() {
            key.to_string()
        } else {
            format!("{}.{}", self.path, key)
        }
    }

    /// Looks up a required key.
    ///
    /// A missing key is a [`DecodeError::MissingField`]. Indexing into a value
    /// that is not an object is a [`DecodeError::InvalidField`] on the parent,
    /// except at the root, where any non-object simply lacks the key.
    pub(crate) fn get(&self, key: &str) -> Result<Field<'a>, DecodeError> {
        match self.value {
            Value::Object(map) => match map.get(key) {
                Some(value) => Ok(Field {
                    value,
                    path: self.child_path(key),
                }),
                None => Err(DecodeError::MissingField(self.child_path(key))),
            },
            _ if self.path.is_empty() => Err(DecodeError::MissingField(key.to_string())),
            _ => Err(self.invalid("object")),
        }
    }

    /// Looks up an optional key; absent keys and non-object parents give `None`.
    pub(crate) fn opt(&self, key: &str) -> Option<Field<'a>> {
        self.value.get(key).map(|value| Field {
            value,
            path: self.child_path(key),
        })
    }

    pub(crate) fn as_str(&self) -> Result<&'a str, DecodeError> {
        self.value.as_str().ok_or_else(|| self.invalid("string"))
    }

    pub(crate) fn as_f64(&self) -> Result<f64, DecodeError> {
        self.value.as_f64().ok_or_else(|| self.invalid("number"))
    }

    /// Array of strings; non-string entries are skipped.
    pub(crate) fn string_list(&self) -> Vec<String> {
        self.value
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn invalid(&self, expected: &'static str) -> DecodeError {
        DecodeError::InvalidField {
            path: self.path.clone(),
            expected,
        }
    }
}
