//! Validation rule definitions
//!
//! Supported types:
//! - string
//! - double: any JSON number
//! - int: integer within 32 bits
//! - long: integer within 64 bits
//! - bool
//! - date: `{"$date": ...}` or a string that parses as a date
//! - object
//! - array

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::store::value::parse_date;

/// Structural type a field may take
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BsonType {
    String,
    Double,
    Int,
    Long,
    Bool,
    Date,
    Object,
    Array,
}

impl BsonType {
    /// Returns the type name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            BsonType::String => "string",
            BsonType::Double => "double",
            BsonType::Int => "int",
            BsonType::Long => "long",
            BsonType::Bool => "bool",
            BsonType::Date => "date",
            BsonType::Object => "object",
            BsonType::Array => "array",
        }
    }

    /// Checks whether a value has this type
    pub fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (BsonType::String, Value::String(_)) => true,
            (BsonType::Double, Value::Number(_)) => true,
            (BsonType::Int, Value::Number(n)) => n
                .as_i64()
                .is_some_and(|i| i32::try_from(i).is_ok()),
            (BsonType::Long, Value::Number(n)) => n.as_i64().is_some(),
            (BsonType::Bool, Value::Bool(_)) => true,
            (BsonType::Date, v) => parse_date(v).is_some(),
            (BsonType::Object, Value::Object(obj)) => !obj.contains_key("$date"),
            (BsonType::Array, Value::Array(_)) => true,
            _ => false,
        }
    }
}

impl fmt::Display for BsonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// Short type name of an arbitrary value, for violation messages
pub fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "double",
        Value::Number(_) => "int",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(obj) if obj.contains_key("$date") => "date",
        Value::Object(_) => "object",
    }
}

/// Type and range constraints for one field
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldRule {
    /// Accepted types; empty accepts any type
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub types: Vec<BsonType>,
    /// Inclusive lower bound for numbers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    /// Inclusive upper bound for numbers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
}

impl FieldRule {
    pub fn of(types: &[BsonType]) -> Self {
        Self {
            types: types.to_vec(),
            ..Self::default()
        }
    }

    pub fn min(mut self, minimum: f64) -> Self {
        self.minimum = Some(minimum);
        self
    }

    pub fn max(mut self, maximum: f64) -> Self {
        self.maximum = Some(maximum);
        self
    }
}

/// What the store does with a document that violates the rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationLevel {
    /// Reject the write
    Error,
    /// Log the violation and accept the write
    Warn,
}

impl ValidationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationLevel::Error => "error",
            ValidationLevel::Warn => "warn",
        }
    }
}

impl fmt::Display for ValidationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structural constraints for one collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationSpec {
    pub collection: String,
    /// Fields that must be present
    pub required: Vec<String>,
    /// Per-field constraints, checked when the field is present
    #[serde(default)]
    pub properties: BTreeMap<String, FieldRule>,
    /// Level to attempt first
    pub level: ValidationLevel,
}

impl ValidationSpec {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            required: Vec::new(),
            properties: BTreeMap::new(),
            level: ValidationLevel::Error,
        }
    }

    pub fn require(mut self, field: impl Into<String>) -> Self {
        self.required.push(field.into());
        self
    }

    pub fn property(mut self, field: impl Into<String>, rule: FieldRule) -> Self {
        self.properties.insert(field.into(), rule);
        self
    }

    pub fn with_level(mut self, level: ValidationLevel) -> Self {
        self.level = level;
        self
    }

    /// Checks the rule set itself (not a document)
    pub fn validate_structure(&self) -> Result<(), String> {
        if self.collection.trim().is_empty() {
            return Err("validation spec must name a collection".into());
        }
        for (field, rule) in &self.properties {
            if let (Some(min), Some(max)) = (rule.minimum, rule.maximum) {
                if min > max {
                    return Err(format!("'{}': minimum {} exceeds maximum {}", field, min, max));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_type_matching() {
        assert!(BsonType::Double.matches(&json!(4.5)));
        assert!(BsonType::Double.matches(&json!(4)));
        assert!(BsonType::Int.matches(&json!(120)));
        assert!(!BsonType::Int.matches(&json!(1.5)));
        assert!(!BsonType::Int.matches(&json!(5_000_000_000i64)));
        assert!(BsonType::Long.matches(&json!(5_000_000_000i64)));
        assert!(!BsonType::Int.matches(&json!("120")));
        assert!(BsonType::String.matches(&json!("x")));
    }

    #[test]
    fn test_date_matching() {
        assert!(BsonType::Date.matches(&json!("2024-01-05")));
        assert!(BsonType::Date.matches(&json!({"$date": "2024-01-05T00:00:00Z"})));
        assert!(!BsonType::Date.matches(&json!("soon")));
        assert!(!BsonType::Object.matches(&json!({"$date": "2024-01-05T00:00:00Z"})));
    }

    #[test]
    fn test_spec_structure() {
        let spec = ValidationSpec::new("Products_clean")
            .require("product_id")
            .property("rating", FieldRule::of(&[BsonType::Double]).min(0.0).max(5.0));
        assert!(spec.validate_structure().is_ok());

        let bad = ValidationSpec::new("x").property("p", FieldRule::default().min(3.0).max(1.0));
        assert!(bad.validate_structure().is_err());

        assert!(ValidationSpec::new(" ").validate_structure().is_err());
    }

    #[test]
    fn test_level_serde() {
        assert_eq!(serde_json::to_value(ValidationLevel::Warn).unwrap(), json!("warn"));
        assert_eq!(ValidationLevel::Error.to_string(), "error");
    }
}
