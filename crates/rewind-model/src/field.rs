#![forbid(unsafe_code)]

//! Field values and field patches.
//!
//! Records store their data as a map of string keys to [`FieldValue`]s.
//! Mutations are expressed as [`FieldPatch`]es: ordered lists of
//! `(key, Option<value>)` pairs where `None` removes the key. The undo
//! machinery relies on patches being invertible: applying a patch yields
//! the inverse patch capturing the prior values.

#[cfg(feature = "state-persistence")]
use serde::{Deserialize, Serialize};

use crate::record::ModelId;

/// A single record field value.
///
/// The variant set is closed: hosts model richer data by composing these
/// (e.g. storing ISO strings as `Text` or epoch millis as `Timestamp`).
#[derive(Debug, Clone)]
#[cfg_attr(feature = "state-persistence", derive(Serialize, Deserialize))]
pub enum FieldValue {
    Null,
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Timestamp(i64),
    /// Reference to another record.
    ModelRef(ModelId),
}

impl PartialEq for FieldValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Integer(a), Self::Integer(b)) => a == b,
            // total_cmp keeps field diffing total in the presence of NaN.
            (Self::Float(a), Self::Float(b)) => a.total_cmp(b).is_eq(),
            (Self::Boolean(a), Self::Boolean(b)) => a == b,
            (Self::Timestamp(a), Self::Timestamp(b)) => a == b,
            (Self::ModelRef(a), Self::ModelRef(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for FieldValue {}

impl FieldValue {
    /// Whether this value is `Null`.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Borrow the text content, if this is a `Text` value.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Get the integer content, if this is an `Integer` value.
    #[must_use]
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Get the boolean content, if this is a `Boolean` value.
    #[must_use]
    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            FieldValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        FieldValue::Integer(n)
    }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        FieldValue::Float(n)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Boolean(b)
    }
}

/// An ordered set of field changes.
///
/// `None` on the value side means "the key is absent": on the old side of
/// an update it records that the key did not exist before, and applying it
/// removes the key. Entries apply left to right.
pub type FieldPatch = Vec<(String, Option<FieldValue>)>;

/// Build a patch entry that sets `key` to `value`.
#[must_use]
pub fn set(key: impl Into<String>, value: impl Into<FieldValue>) -> (String, Option<FieldValue>) {
    (key.into(), Some(value.into()))
}

/// Build a patch entry that removes `key`.
#[must_use]
pub fn unset(key: impl Into<String>) -> (String, Option<FieldValue>) {
    (key.into(), None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_equality_is_total() {
        assert_eq!(FieldValue::Float(f64::NAN), FieldValue::Float(f64::NAN));
        assert_ne!(FieldValue::Float(0.0), FieldValue::Float(-0.0));
        assert_eq!(FieldValue::Float(1.5), FieldValue::Float(1.5));
    }

    #[test]
    fn test_cross_variant_inequality() {
        assert_ne!(FieldValue::Integer(1), FieldValue::Float(1.0));
        assert_ne!(FieldValue::Null, FieldValue::Boolean(false));
    }

    #[test]
    fn test_accessors() {
        assert_eq!(FieldValue::from("x").as_text(), Some("x"));
        assert_eq!(FieldValue::from(7i64).as_integer(), Some(7));
        assert_eq!(FieldValue::from(true).as_boolean(), Some(true));
        assert!(FieldValue::Null.is_null());
        assert_eq!(FieldValue::from("x").as_integer(), None);
    }

    #[test]
    fn test_patch_helpers() {
        let (k, v) = set("name", "card");
        assert_eq!(k, "name");
        assert_eq!(v, Some(FieldValue::Text("card".into())));
        let (k, v) = unset("name");
        assert_eq!(k, "name");
        assert_eq!(v, None);
    }
}
