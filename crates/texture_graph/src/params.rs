// SPDX-License-Identifier: MIT OR Apache-2.0
//! Typed parameter storage for nodes.
//!
//! Parameters are a plain value bag: the host writes them, `process` reads
//! them. Mode selections are stored as integers so that a value outside the
//! known range stays representable and is rejected when the node runs.

use crate::curve::Curve;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::mem;

/// A single parameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Parameter {
    /// Float value
    Float(f32),
    /// Integer value (also used for mode selections)
    Int(i32),
    /// Boolean
    Bool(bool),
    /// String
    String(String),
    /// 4D vector / color
    Vector4([f32; 4]),
    /// Reference to an external object (asset key), unset by default
    Object(Option<String>),
    /// Curve table
    Curve(Curve),
}

impl Parameter {
    /// Name of the variant, for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Float(_) => "float",
            Self::Int(_) => "int",
            Self::Bool(_) => "bool",
            Self::String(_) => "string",
            Self::Vector4(_) => "vector4",
            Self::Object(_) => "object",
            Self::Curve(_) => "curve",
        }
    }

    /// Whether both values are the same variant
    pub fn same_type(&self, other: &Parameter) -> bool {
        mem::discriminant(self) == mem::discriminant(other)
    }
}

impl From<f32> for Parameter {
    fn from(value: f32) -> Self {
        Self::Float(value)
    }
}

impl From<i32> for Parameter {
    fn from(value: i32) -> Self {
        Self::Int(value)
    }
}

impl From<bool> for Parameter {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<String> for Parameter {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<[f32; 4]> for Parameter {
    fn from(value: [f32; 4]) -> Self {
        Self::Vector4(value)
    }
}

impl From<Curve> for Parameter {
    fn from(value: Curve) -> Self {
        Self::Curve(value)
    }
}

/// Error reading or writing a parameter
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParameterError {
    /// No parameter with this key
    #[error("Parameter not found: {0}")]
    Missing(String),

    /// Parameter exists with another type
    #[error("Parameter {key} is {found}, expected {expected}")]
    WrongType {
        /// Parameter key
        key: String,
        /// Requested type
        expected: &'static str,
        /// Stored type
        found: &'static str,
    },
}

/// Ordered parameter bag of a node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterSet {
    values: IndexMap<String, Parameter>,
}

impl ParameterSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Parameter>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert or replace a value, returning the previous one
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Parameter>) -> Option<Parameter> {
        self.values.insert(key.into(), value.into())
    }

    /// Replace an existing value without changing its type
    pub fn update(&mut self, key: &str, value: Parameter) -> Result<Parameter, ParameterError> {
        let slot = self
            .values
            .get_mut(key)
            .ok_or_else(|| ParameterError::Missing(key.to_string()))?;
        if !slot.same_type(&value) {
            return Err(ParameterError::WrongType {
                key: key.to_string(),
                expected: slot.type_name(),
                found: value.type_name(),
            });
        }
        Ok(mem::replace(slot, value))
    }

    /// Get a value by key
    pub fn get(&self, key: &str) -> Option<&Parameter> {
        self.values.get(key)
    }

    /// Check if a key is present
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Iterate over all values in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Parameter)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of values
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn typed<'a, T>(
        &'a self,
        key: &str,
        expected: &'static str,
        pick: impl FnOnce(&'a Parameter) -> Option<T>,
    ) -> Result<T, ParameterError> {
        let value = self
            .values
            .get(key)
            .ok_or_else(|| ParameterError::Missing(key.to_string()))?;
        pick(value).ok_or_else(|| ParameterError::WrongType {
            key: key.to_string(),
            expected,
            found: value.type_name(),
        })
    }

    /// Read a float
    pub fn float(&self, key: &str) -> Result<f32, ParameterError> {
        self.typed(key, "float", |p| match p {
            Parameter::Float(v) => Some(*v),
            _ => None,
        })
    }

    /// Read an integer
    pub fn int(&self, key: &str) -> Result<i32, ParameterError> {
        self.typed(key, "int", |p| match p {
            Parameter::Int(v) => Some(*v),
            _ => None,
        })
    }

    /// Read a boolean
    pub fn bool(&self, key: &str) -> Result<bool, ParameterError> {
        self.typed(key, "bool", |p| match p {
            Parameter::Bool(v) => Some(*v),
            _ => None,
        })
    }

    /// Read a string
    pub fn string(&self, key: &str) -> Result<&str, ParameterError> {
        self.typed(key, "string", |p| match p {
            Parameter::String(v) => Some(v.as_str()),
            _ => None,
        })
    }

    /// Read a 4D vector
    pub fn vector4(&self, key: &str) -> Result<[f32; 4], ParameterError> {
        self.typed(key, "vector4", |p| match p {
            Parameter::Vector4(v) => Some(*v),
            _ => None,
        })
    }

    /// Read an object reference
    pub fn object(&self, key: &str) -> Result<Option<&str>, ParameterError> {
        self.typed(key, "object", |p| match p {
            Parameter::Object(v) => Some(v.as_deref()),
            _ => None,
        })
    }

    /// Read a curve
    pub fn curve(&self, key: &str) -> Result<&Curve, ParameterError> {
        self.typed(key, "curve", |p| match p {
            Parameter::Curve(v) => Some(v),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_reads() {
        let params = ParameterSet::new()
            .with("strength", 0.5_f32)
            .with("mode", 3)
            .with("enabled", true)
            .with("label", "albedo".to_string())
            .with("tint", [1.0_f32, 0.5, 0.25, 1.0])
            .with("source", Parameter::Object(None))
            .with("curve", Curve::identity());

        assert_eq!(params.float("strength"), Ok(0.5));
        assert_eq!(params.int("mode"), Ok(3));
        assert_eq!(params.bool("enabled"), Ok(true));
        assert_eq!(params.string("label"), Ok("albedo"));
        assert_eq!(params.vector4("tint"), Ok([1.0, 0.5, 0.25, 1.0]));
        assert_eq!(params.object("source"), Ok(None));
        assert_eq!(params.curve("curve"), Ok(&Curve::identity()));
        assert_eq!(params.len(), 7);
    }

    #[test]
    fn test_read_errors() {
        let params = ParameterSet::new().with("mode", 1);
        assert_eq!(
            params.float("missing"),
            Err(ParameterError::Missing("missing".to_string()))
        );
        assert_eq!(
            params.float("mode"),
            Err(ParameterError::WrongType {
                key: "mode".to_string(),
                expected: "float",
                found: "int",
            })
        );
    }

    #[test]
    fn test_update_keeps_type() {
        let mut params = ParameterSet::new().with("strength", 1.0_f32);
        let previous = params.update("strength", Parameter::Float(0.25)).unwrap();
        assert_eq!(previous, Parameter::Float(1.0));
        assert_eq!(params.float("strength"), Ok(0.25));

        assert!(params.update("strength", Parameter::Int(1)).is_err());
        assert!(params.update("unknown", Parameter::Float(1.0)).is_err());
    }
}
