//! Declarative shape checks for stored values.
//!
//! A [`Schema`] is registered per storage key and consulted at write and
//! import time. Validation never mutates the value.
//!
//! The application's own keys also carry a [`TypedCheck`], so anything that
//! validates can be read back as the type that owns the key.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use super::keys;
use crate::domain::{Preferences, ReadingLists};

/// JSON value kinds a schema can require
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    String,
    Number,
    Boolean,
    Object,
    Array,
    Null,
}

impl ValueType {
    pub fn of(value: &Value) -> Self {
        match value {
            Value::String(_) => Self::String,
            Value::Number(_) => Self::Number,
            Value::Bool(_) => Self::Boolean,
            Value::Object(_) => Self::Object,
            Value::Array(_) => Self::Array,
            Value::Null => Self::Null,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
            Self::Null => "null",
        };
        f.write_str(name)
    }
}

/// Expected type (and optionally allowed values) of an object property
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub value_type: ValueType,
    pub allowed: Option<Vec<Value>>,
}

impl Property {
    pub fn of(value_type: ValueType) -> Self {
        Self {
            value_type,
            allowed: None,
        }
    }

    /// A string property restricted to a fixed set of values
    pub fn one_of<'a>(values: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            value_type: ValueType::String,
            allowed: Some(values.into_iter().map(Value::from).collect()),
        }
    }
}

/// Check that a value deserializes as a given Rust type
#[derive(Clone, Copy)]
pub struct TypedCheck {
    type_name: &'static str,
    check: fn(&Value) -> Result<(), String>,
}

impl TypedCheck {
    pub fn of<T: DeserializeOwned>() -> Self {
        Self {
            type_name: short_type_name(std::any::type_name::<T>()),
            check: decodes_as::<T>,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    fn run(&self, value: &Value) -> Result<(), SchemaViolation> {
        (self.check)(value).map_err(|reason| SchemaViolation::Undecodable {
            type_name: self.type_name,
            reason,
        })
    }
}

/// `alloc::vec::Vec<T>` -> `Vec<T>`
fn short_type_name(full: &'static str) -> &'static str {
    let base_end = full.find('<').unwrap_or(full.len());
    let start = full[..base_end].rfind("::").map_or(0, |i| i + 2);
    &full[start..]
}

fn decodes_as<T: DeserializeOwned>(value: &Value) -> Result<(), String> {
    serde_json::from_value::<T>(value.clone())
        .map(|_| ())
        .map_err(|e| e.to_string())
}

impl fmt::Debug for TypedCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TypedCheck").field(&self.type_name).finish()
    }
}

impl PartialEq for TypedCheck {
    fn eq(&self, other: &Self) -> bool {
        self.type_name == other.type_name
    }
}

/// Shape description for one storage key
#[derive(Debug, Clone, PartialEq)]
pub enum Schema {
    /// An object; declared properties are checked when present
    Object { properties: BTreeMap<String, Property> },

    /// An array, optionally bounded in length
    Array { max_items: Option<usize> },

    /// A bare scalar of the given type
    Scalar(ValueType),

    /// Must deserialize as a typed value
    Typed(TypedCheck),

    /// Every schema must pass, checked in order
    All(Vec<Schema>),
}

/// Why a value failed validation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaViolation {
    #[error("expected {expected}, found {found}")]
    WrongType { expected: ValueType, found: ValueType },

    #[error("{count} items exceeds the maximum of {max}")]
    TooManyItems { count: usize, max: usize },

    #[error("property '{property}' must be {expected}, found {found}")]
    WrongPropertyType {
        property: String,
        expected: ValueType,
        found: ValueType,
    },

    #[error("property '{property}' has disallowed value {value}")]
    NotAllowed { property: String, value: Value },

    #[error("not a valid {type_name}: {reason}")]
    Undecodable {
        type_name: &'static str,
        reason: String,
    },
}

impl Schema {
    /// Build an object schema from `(name, property)` pairs
    pub fn object<'a>(properties: impl IntoIterator<Item = (&'a str, Property)>) -> Self {
        Self::Object {
            properties: properties
                .into_iter()
                .map(|(name, prop)| (name.to_string(), prop))
                .collect(),
        }
    }

    pub fn array(max_items: Option<usize>) -> Self {
        Self::Array { max_items }
    }

    pub fn typed<T: DeserializeOwned>() -> Self {
        Self::Typed(TypedCheck::of::<T>())
    }

    /// This schema, then a typed check
    pub fn and_typed<T: DeserializeOwned>(self) -> Self {
        Self::All(vec![self, Self::typed::<T>()])
    }

    /// Check `value` against this schema
    pub fn validate(&self, value: &Value) -> Result<(), SchemaViolation> {
        match self {
            Self::Array { max_items } => {
                let items = value.as_array().ok_or(SchemaViolation::WrongType {
                    expected: ValueType::Array,
                    found: ValueType::of(value),
                })?;
                if let Some(max) = *max_items {
                    if items.len() > max {
                        return Err(SchemaViolation::TooManyItems {
                            count: items.len(),
                            max,
                        });
                    }
                }
                Ok(())
            }
            Self::Object { properties } => {
                let object = value.as_object().ok_or(SchemaViolation::WrongType {
                    expected: ValueType::Object,
                    found: ValueType::of(value),
                })?;
                for (name, prop) in properties {
                    let Some(field) = object.get(name) else {
                        continue;
                    };
                    let found = ValueType::of(field);
                    if found != prop.value_type {
                        return Err(SchemaViolation::WrongPropertyType {
                            property: name.clone(),
                            expected: prop.value_type,
                            found,
                        });
                    }
                    if let Some(allowed) = &prop.allowed {
                        if !allowed.contains(field) {
                            return Err(SchemaViolation::NotAllowed {
                                property: name.clone(),
                                value: field.clone(),
                            });
                        }
                    }
                }
                Ok(())
            }
            Self::Scalar(expected) => {
                let found = ValueType::of(value);
                if found == *expected {
                    Ok(())
                } else {
                    Err(SchemaViolation::WrongType {
                        expected: *expected,
                        found,
                    })
                }
            }
            Self::Typed(check) => check.run(value),
            Self::All(schemas) => schemas.iter().try_for_each(|schema| schema.validate(value)),
        }
    }
}

/// Schemas by bare storage key
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: HashMap<String, Schema>,
}

impl SchemaRegistry {
    /// Empty registry (nothing is validated)
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with schemas for the application's own keys
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();

        registry.register(
            keys::READING_LISTS,
            Schema::object([
                ("reading", Property::of(ValueType::Array)),
                ("toRead", Property::of(ValueType::Array)),
                ("completed", Property::of(ValueType::Array)),
            ])
            .and_typed::<ReadingLists>(),
        );
        registry.register(
            keys::PREFERENCES,
            Schema::object([
                ("theme", Property::one_of(["light", "dark", "auto"])),
                ("defaultSource", Property::one_of(["openlibrary", "googlebooks"])),
                ("resultsPerPage", Property::of(ValueType::Number)),
                ("viewMode", Property::one_of(["grid", "list"])),
            ])
            .and_typed::<Preferences>(),
        );
        registry.register(
            keys::SEARCH_HISTORY,
            Schema::array(Some(super::MAX_SEARCH_HISTORY)).and_typed::<Vec<String>>(),
        );

        registry
    }

    pub fn register(&mut self, key: impl Into<String>, schema: Schema) {
        self.schemas.insert(key.into(), schema);
    }

    pub fn get(&self, key: &str) -> Option<&Schema> {
        self.schemas.get(key)
    }

    /// Validate `value` if `key` has a schema; unknown keys always pass
    pub fn validate(&self, key: &str, value: &Value) -> Result<(), SchemaViolation> {
        match self.get(key) {
            Some(schema) => schema.validate(value),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_array_schema() {
        let schema = Schema::array(Some(2));

        assert!(schema.validate(&json!([1, 2])).is_ok());
        assert_eq!(
            schema.validate(&json!([1, 2, 3])),
            Err(SchemaViolation::TooManyItems { count: 3, max: 2 })
        );
        assert!(matches!(
            schema.validate(&json!({"a": 1})),
            Err(SchemaViolation::WrongType {
                expected: ValueType::Array,
                ..
            })
        ));
    }

    #[test]
    fn test_object_schema_checks_present_properties_only() {
        let schema = Schema::object([
            ("theme", Property::one_of(["light", "dark"])),
            ("size", Property::of(ValueType::Number)),
        ]);

        assert!(schema.validate(&json!({})).is_ok());
        assert!(schema.validate(&json!({"theme": "dark", "extra": true})).is_ok());
        assert!(matches!(
            schema.validate(&json!({"theme": "neon"})),
            Err(SchemaViolation::NotAllowed { .. })
        ));
        assert!(matches!(
            schema.validate(&json!({"size": "12"})),
            Err(SchemaViolation::WrongPropertyType { .. })
        ));
        assert!(schema.validate(&json!([])).is_err());
    }

    #[test]
    fn test_scalar_schema() {
        let schema = Schema::Scalar(ValueType::Boolean);
        assert!(schema.validate(&json!(true)).is_ok());
        assert!(schema.validate(&json!("true")).is_err());
    }

    #[test]
    fn test_typed_schema_reports_type() {
        let schema = Schema::array(None).and_typed::<Vec<u32>>();

        assert!(schema.validate(&json!([1, 2])).is_ok());
        assert!(matches!(
            schema.validate(&json!({})),
            Err(SchemaViolation::WrongType { .. })
        ));
        match schema.validate(&json!([1, -2])) {
            Err(SchemaViolation::Undecodable { type_name, .. }) => assert!(type_name.starts_with("Vec")),
            other => panic!("expected undecodable, got {:?}", other),
        }
    }

    #[test]
    fn test_reading_lists_must_decode() {
        let registry = SchemaRegistry::with_defaults();

        assert!(registry
            .validate(keys::READING_LISTS, &json!({"reading": [{"id": "x"}]}))
            .is_ok());
        assert!(matches!(
            registry.validate(keys::READING_LISTS, &json!({"reading": [{"title": "No id"}]})),
            Err(SchemaViolation::Undecodable { .. })
        ));
        assert!(registry
            .validate(
                keys::READING_LISTS,
                &json!({"reading": [{"id": "x", "progress": "half"}]})
            )
            .is_err());
        assert!(registry
            .validate(keys::PREFERENCES, &json!({"resultsPerPage": -5}))
            .is_err());
    }

    #[test]
    fn test_default_registry() {
        let registry = SchemaRegistry::with_defaults();

        assert!(registry
            .validate(keys::READING_LISTS, &json!({"reading": [], "toRead": []}))
            .is_ok());
        assert!(registry
            .validate(keys::READING_LISTS, &json!({"reading": "nope"}))
            .is_err());
        assert!(registry
            .validate(keys::PREFERENCES, &json!({"defaultSource": "amazon"}))
            .is_err());
        assert!(registry.validate("unregistered", &json!(42)).is_ok());

        assert!(registry
            .validate(keys::SEARCH_HISTORY, &json!(["dune", 7]))
            .is_err());

        let long_history: Vec<String> = (0..51).map(|i| format!("q{}", i)).collect();
        assert!(registry
            .validate(keys::SEARCH_HISTORY, &json!(long_history))
            .is_err());
    }
}
