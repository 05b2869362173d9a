//! Core types shared by the store, compiler and validator.

use serde::Serialize;
use serde_json::Value;

/// Keyword that turns its enclosing object into an alias.
pub const REF_KEYWORD: &str = "$ref";

/// Default cap on registered locations per store.
pub const DEFAULT_MAX_LOCATIONS: usize = 10_000;

/// Default cap on `$ref` hops followed by a single `require`.
pub const DEFAULT_MAX_REF_HOPS: usize = 64;

/// Returns the JSON type name for error messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A type name accepted by the `type` keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JsonType {
    Null,
    Boolean,
    Integer,
    Number,
    String,
    Array,
    Object,
}

impl JsonType {
    /// Parse a type name.
    ///
    /// Returns `None` for unknown names (caller should error).
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "null" => Some(JsonType::Null),
            "boolean" => Some(JsonType::Boolean),
            "integer" => Some(JsonType::Integer),
            "number" => Some(JsonType::Number),
            "string" => Some(JsonType::String),
            "array" => Some(JsonType::Array),
            "object" => Some(JsonType::Object),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JsonType::Null => "null",
            JsonType::Boolean => "boolean",
            JsonType::Integer => "integer",
            JsonType::Number => "number",
            JsonType::String => "string",
            JsonType::Array => "array",
            JsonType::Object => "object",
        }
    }

    /// Whether `value` is of this type.
    ///
    /// Any number with a zero fractional part counts as an integer, so
    /// `1.0` is an integer just like `1`.
    pub fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (JsonType::Null, Value::Null) => true,
            (JsonType::Boolean, Value::Bool(_)) => true,
            (JsonType::Number, Value::Number(_)) => true,
            (JsonType::Integer, Value::Number(n)) => {
                n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|f| f.fract() == 0.0)
            }
            (JsonType::String, Value::String(_)) => true,
            (JsonType::Array, Value::Array(_)) => true,
            (JsonType::Object, Value::Object(_)) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for JsonType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Limits applied by a [`SchemaStore`](crate::SchemaStore).
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Maximum number of distinct locations (pending + built).
    pub max_locations: usize,
    /// Maximum number of `$ref` hops a single `require` follows.
    pub max_ref_hops: usize,
}

impl StoreOptions {
    /// Create options with the default limits.
    pub fn new() -> Self {
        Self {
            max_locations: DEFAULT_MAX_LOCATIONS,
            max_ref_hops: DEFAULT_MAX_REF_HOPS,
        }
    }

    /// Set the location limit.
    pub fn max_locations(mut self, limit: usize) -> Self {
        self.max_locations = limit;
        self
    }

    /// Set the `$ref` hop limit.
    pub fn max_ref_hops(mut self, limit: usize) -> Self {
        self.max_ref_hops = limit;
        self
    }
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_type_parse_valid() {
        assert_eq!(JsonType::parse("integer"), Some(JsonType::Integer));
        assert_eq!(JsonType::parse("object"), Some(JsonType::Object));
        assert_eq!(JsonType::parse("null"), Some(JsonType::Null));
    }

    #[test]
    fn json_type_parse_invalid() {
        assert_eq!(JsonType::parse("float"), None);
        assert_eq!(JsonType::parse("String"), None);
        assert_eq!(JsonType::parse(""), None);
    }

    #[test]
    fn integer_accepts_zero_fraction() {
        assert!(JsonType::Integer.matches(&json!(3)));
        assert!(JsonType::Integer.matches(&json!(-3)));
        assert!(JsonType::Integer.matches(&json!(3.0)));
        assert!(!JsonType::Integer.matches(&json!(3.5)));
        assert!(!JsonType::Integer.matches(&json!("3")));
    }

    #[test]
    fn number_accepts_integers() {
        assert!(JsonType::Number.matches(&json!(1)));
        assert!(JsonType::Number.matches(&json!(1.5)));
        assert!(!JsonType::Number.matches(&json!(null)));
    }

    #[test]
    fn store_options_builder() {
        let opts = StoreOptions::new().max_locations(5).max_ref_hops(2);
        assert_eq!(opts.max_locations, 5);
        assert_eq!(opts.max_ref_hops, 2);

        let opts = StoreOptions::default();
        assert_eq!(opts.max_locations, DEFAULT_MAX_LOCATIONS);
    }
}
