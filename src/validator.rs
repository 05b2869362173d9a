//! Instance validation against built schemas.
//!
//! Every violation is reported; nothing stops at the first failure. Only the
//! branches of `anyOf` and `oneOf` are checked in isolation, and they surface
//! as a single verdict error on the combinator itself.

use std::cell::RefCell;
use std::collections::HashSet;

use serde_json::{Map, Number, Value};

use crate::error::{ResolveError, ValidateError, ValidationError};
use crate::location::{escape_segment, Location};
use crate::schema::{Items, ObjectSchema, SchemaNode};
use crate::store::SchemaStore;
use crate::types::json_type_name;

/// Relative tolerance for `multipleOf` on non-integer operands.
const MULTIPLE_OF_TOLERANCE: f64 = 1e-9;

/// Validate `instance` against the schema built at `location`.
///
/// Returns every violation found, in the order they were detected.
///
/// # Errors
///
/// Returns `ResolveError::NotBuilt` if `location`, or a schema it refers to,
/// has not been built, and `ResolveError::CircularSchema` if combinators lead
/// back to a schema already applied to the same instance value.
pub fn validate(
    store: &SchemaStore,
    location: &Location,
    instance: &Value,
) -> Result<Vec<ValidationError>, ResolveError> {
    let mut errors = Vec::new();
    validate_with(store, location, instance, &mut |error| errors.push(error))?;
    Ok(errors)
}

/// Like [`validate`], but hands each violation to `sink` as it is found.
pub fn validate_with(
    store: &SchemaStore,
    location: &Location,
    instance: &Value,
    sink: &mut dyn FnMut(ValidationError),
) -> Result<(), ResolveError> {
    Validator::new(store).validate(location, instance, "", sink)
}

/// Validate and turn any violation into `ValidateError::Invalid`.
pub fn check(
    store: &SchemaStore,
    location: &Location,
    instance: &Value,
) -> Result<(), ValidateError> {
    let errors = validate(store, location, instance)?;
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidateError::Invalid { errors })
    }
}

struct Validator<'s> {
    store: &'s SchemaStore,
    /// Schemas currently being applied, keyed by instance path.
    active: RefCell<HashSet<(Location, String)>>,
}

impl<'s> Validator<'s> {
    fn new(store: &'s SchemaStore) -> Self {
        Self {
            store,
            active: RefCell::new(HashSet::new()),
        }
    }

    fn validate(
        &self,
        location: &Location,
        instance: &Value,
        path: &str,
        sink: &mut dyn FnMut(ValidationError),
    ) -> Result<(), ResolveError> {
        let node = self
            .store
            .get(location)
            .ok_or_else(|| ResolveError::NotBuilt {
                location: location.to_string(),
            })?;

        // Only combinators revisit a path; properties and items always descend
        let key = (location.clone(), path.to_string());
        if !self.active.borrow_mut().insert(key.clone()) {
            return Err(ResolveError::CircularSchema {
                location: location.to_string(),
                path: path.to_string(),
            });
        }

        let result = match node {
            SchemaNode::Bool(true) => Ok(()),
            SchemaNode::Bool(false) => {
                sink(ValidationError::new(
                    path,
                    "false",
                    "no value is allowed here",
                ));
                Ok(())
            }
            SchemaNode::Object(schema) => self.validate_schema(schema, instance, path, sink),
        };

        self.active.borrow_mut().remove(&key);
        result
    }

    /// Run `location` against `instance` without touching the caller's sink.
    fn collect(
        &self,
        location: &Location,
        instance: &Value,
        path: &str,
    ) -> Result<Vec<ValidationError>, ResolveError> {
        let mut errors = Vec::new();
        self.validate(location, instance, path, &mut |error| errors.push(error))?;
        Ok(errors)
    }

    fn validate_schema(
        &self,
        schema: &ObjectSchema,
        instance: &Value,
        path: &str,
        sink: &mut dyn FnMut(ValidationError),
    ) -> Result<(), ResolveError> {
        match instance {
            Value::Number(number) => check_number(schema, number, path, sink),
            Value::String(string) => check_string(schema, string, path, sink),
            Value::Object(object) => self.check_object(schema, object, path, sink)?,
            Value::Array(array) => self.check_array(schema, array, path, sink)?,
            Value::Null | Value::Bool(_) => {}
        }

        for ty in &schema.types {
            if !ty.matches(instance) {
                sink(ValidationError::new(
                    path,
                    "type",
                    format!("expected {}, got {}", ty, json_type_name(instance)),
                ));
            }
        }

        if let Some(all_of) = &schema.all_of {
            for child in all_of {
                self.validate(child, instance, path, sink)?;
            }
        }

        if let Some(any_of) = &schema.any_of {
            self.check_any_of(any_of, instance, path, sink)?;
        }

        if let Some(one_of) = &schema.one_of {
            self.check_one_of(one_of, instance, path, sink)?;
        }

        Ok(())
    }

    fn check_object(
        &self,
        schema: &ObjectSchema,
        object: &Map<String, Value>,
        path: &str,
        sink: &mut dyn FnMut(ValidationError),
    ) -> Result<(), ResolveError> {
        for (name, value) in object {
            let child_path = format!("{}/{}", path, escape_segment(name));
            let mut matched = false;

            if let Some(property) = schema.properties.get(name) {
                self.validate(property, value, &child_path, sink)?;
                matched = true;
            }

            for pattern in &schema.pattern_properties {
                if pattern.matches(name) {
                    self.validate(&pattern.schema, value, &child_path, sink)?;
                    matched = true;
                }
            }

            // Absent additionalProperties leaves the rest unchecked
            if !matched {
                if let Some(additional) = &schema.additional_properties {
                    self.validate(additional, value, &child_path, sink)?;
                }
            }
        }

        for name in &schema.required {
            if !object.contains_key(name) {
                sink(ValidationError::new(
                    path,
                    "required",
                    format!("missing required property \"{}\"", name),
                ));
            }
        }

        Ok(())
    }

    fn check_array(
        &self,
        schema: &ObjectSchema,
        array: &[Value],
        path: &str,
        sink: &mut dyn FnMut(ValidationError),
    ) -> Result<(), ResolveError> {
        match &schema.items {
            None => {}
            Some(Items::Single(items)) => {
                for (idx, element) in array.iter().enumerate() {
                    self.validate(items, element, &format!("{}/{}", path, idx), sink)?;
                }
            }
            Some(Items::Positional(items)) => {
                for (idx, (item, element)) in items.iter().zip(array).enumerate() {
                    self.validate(item, element, &format!("{}/{}", path, idx), sink)?;
                }
            }
        }
        Ok(())
    }

    fn check_any_of(
        &self,
        branches: &[Location],
        instance: &Value,
        path: &str,
        sink: &mut dyn FnMut(ValidationError),
    ) -> Result<(), ResolveError> {
        let mut causes = Vec::new();
        for branch in branches {
            let errors = self.collect(branch, instance, path)?;
            if errors.is_empty() {
                return Ok(());
            }
            causes.extend(errors);
        }

        sink(ValidationError::new(path, "anyOf", "all anyOf branches failed").with_causes(causes));
        Ok(())
    }

    fn check_one_of(
        &self,
        branches: &[Location],
        instance: &Value,
        path: &str,
        sink: &mut dyn FnMut(ValidationError),
    ) -> Result<(), ResolveError> {
        let mut passed = 0;
        let mut causes = Vec::new();
        for branch in branches {
            let errors = self.collect(branch, instance, path)?;
            if errors.is_empty() {
                passed += 1;
            } else {
                causes.extend(errors);
            }
        }

        if passed != 1 {
            // Branch errors only explain a zero count
            let causes = if passed == 0 { causes } else { Vec::new() };
            sink(
                ValidationError::new(
                    path,
                    "oneOf",
                    format!("{} oneOf branches passed, expected exactly 1", passed),
                )
                .with_causes(causes),
            );
        }
        Ok(())
    }
}

fn check_number(
    schema: &ObjectSchema,
    number: &Number,
    path: &str,
    sink: &mut dyn FnMut(ValidationError),
) {
    let Some(value) = number.as_f64() else {
        return;
    };

    if let Some(minimum) = schema.minimum {
        if value < minimum {
            sink(ValidationError::new(
                path,
                "minimum",
                format!("{} is less than the minimum of {}", number, minimum),
            ));
        }
    }
    if let Some(exclusive_minimum) = schema.exclusive_minimum {
        if value <= exclusive_minimum {
            sink(ValidationError::new(
                path,
                "exclusiveMinimum",
                format!(
                    "{} is less than or equal to the exclusive minimum of {}",
                    number, exclusive_minimum
                ),
            ));
        }
    }
    if let Some(maximum) = schema.maximum {
        if value > maximum {
            sink(ValidationError::new(
                path,
                "maximum",
                format!("{} is greater than the maximum of {}", number, maximum),
            ));
        }
    }
    if let Some(exclusive_maximum) = schema.exclusive_maximum {
        if value >= exclusive_maximum {
            sink(ValidationError::new(
                path,
                "exclusiveMaximum",
                format!(
                    "{} is greater than or equal to the exclusive maximum of {}",
                    number, exclusive_maximum
                ),
            ));
        }
    }
    if let Some(divisor) = &schema.multiple_of {
        if !is_multiple_of(number, divisor) {
            sink(ValidationError::new(
                path,
                "multipleOf",
                format!("{} is not a multiple of {}", number, divisor),
            ));
        }
    }
}

fn check_string(
    schema: &ObjectSchema,
    string: &str,
    path: &str,
    sink: &mut dyn FnMut(ValidationError),
) {
    let length = string.chars().count() as u64;

    if let Some(min_length) = schema.min_length {
        if length < min_length {
            sink(ValidationError::new(
                path,
                "minLength",
                format!("\"{}\" is shorter than {} characters", string, min_length),
            ));
        }
    }
    if let Some(max_length) = schema.max_length {
        if length > max_length {
            sink(ValidationError::new(
                path,
                "maxLength",
                format!("\"{}\" is longer than {} characters", string, max_length),
            ));
        }
    }
}

/// Integer operands are compared exactly; anything else within tolerance.
fn is_multiple_of(number: &Number, divisor: &Number) -> bool {
    if let (Some(value), Some(divisor)) = (number.as_i64(), divisor.as_i64()) {
        return value % divisor == 0;
    }
    if let (Some(value), Some(divisor)) = (number.as_u64(), divisor.as_u64()) {
        return value % divisor == 0;
    }

    let (Some(value), Some(divisor)) = (number.as_f64(), divisor.as_f64()) else {
        return false;
    };
    let quotient = value / divisor;
    if !quotient.is_finite() {
        return false;
    }
    (quotient - quotient.round()).abs() <= MULTIPLE_OF_TOLERANCE * quotient.abs().max(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::MemoryLoader;
    use serde_json::json;

    fn errors(schema: Value, instance: Value) -> Vec<ValidationError> {
        let mut store = SchemaStore::new(MemoryLoader::new().with_document("s.json", schema));
        let root = store.load(Location::root("s.json")).unwrap();
        validate(&store, &root, &instance).unwrap()
    }

    fn keywords(schema: Value, instance: Value) -> Vec<&'static str> {
        errors(schema, instance).iter().map(|e| e.keyword).collect()
    }

    #[test]
    fn numeric_bounds() {
        let schema = json!({ "minimum": 0, "exclusiveMaximum": 10 });
        assert_eq!(keywords(schema.clone(), json!(10)), ["exclusiveMaximum"]);
        assert!(keywords(schema.clone(), json!(0)).is_empty());
        assert_eq!(keywords(schema, json!(-0.5)), ["minimum"]);

        let schema = json!({ "exclusiveMinimum": 0, "maximum": 10 });
        assert_eq!(keywords(schema.clone(), json!(0)), ["exclusiveMinimum"]);
        assert!(keywords(schema.clone(), json!(10)).is_empty());
        assert_eq!(keywords(schema, json!(10.01)), ["maximum"]);
    }

    #[test]
    fn all_number_checks_run() {
        let schema = json!({ "minimum": 5, "multipleOf": 2 });
        assert_eq!(keywords(schema, json!(3)), ["minimum", "multipleOf"]);
    }

    #[test]
    fn multiple_of_integers_and_decimals() {
        assert!(keywords(json!({ "multipleOf": 3 }), json!(9)).is_empty());
        assert!(keywords(json!({ "multipleOf": 3 }), json!(-9)).is_empty());
        assert_eq!(keywords(json!({ "multipleOf": 3 }), json!(10)), ["multipleOf"]);
        assert!(keywords(json!({ "multipleOf": 0.1 }), json!(0.3)).is_empty());
        assert!(keywords(json!({ "multipleOf": 0.01 }), json!(19.99)).is_empty());
        assert_eq!(keywords(json!({ "multipleOf": 0.5 }), json!(1.25)), ["multipleOf"]);
        assert!(keywords(json!({ "multipleOf": 2 }), json!(4.0)).is_empty());
    }

    #[test]
    fn string_length_counts_characters() {
        let schema = json!({ "minLength": 2, "maxLength": 3 });
        assert!(keywords(schema.clone(), json!("héé")).is_empty());
        assert_eq!(keywords(schema.clone(), json!("a")), ["minLength"]);
        assert_eq!(keywords(schema, json!("abcd")), ["maxLength"]);
    }

    #[test]
    fn keyword_checks_ignore_other_kinds() {
        let schema = json!({ "minimum": 5, "minLength": 5, "required": ["a"], "items": false });
        assert!(keywords(schema.clone(), json!(true)).is_empty());
        assert!(keywords(schema.clone(), json!(null)).is_empty());
        assert!(keywords(schema, json!("abcdef")).is_empty());
    }

    #[test]
    fn type_assertions() {
        assert!(keywords(json!({ "type": "integer" }), json!(2)).is_empty());
        assert!(keywords(json!({ "type": "integer" }), json!(2.0)).is_empty());
        assert_eq!(keywords(json!({ "type": "integer" }), json!(2.5)), ["type"]);
        assert_eq!(keywords(json!({ "type": "object" }), json!([])), ["type"]);
        assert_eq!(keywords(json!({ "type": "array" }), json!({})), ["type"]);
    }

    #[test]
    fn each_type_name_is_checked() {
        let errs = errors(json!({ "type": ["string", "null"] }), json!(1));
        let messages: Vec<&str> = errs.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(
            messages,
            ["expected string, got number", "expected null, got number"]
        );

        assert_eq!(
            keywords(json!({ "type": ["integer", "number"] }), json!(1.5)),
            ["type"]
        );
        assert!(keywords(json!({ "type": ["integer", "number"] }), json!(3))
            .is_empty());
        assert_eq!(
            keywords(json!({ "type": ["string", "null"] }), json!(null)),
            ["type"]
        );
    }

    #[test]
    fn properties_and_patterns_are_not_exclusive() {
        let schema = json!({
            "properties": { "x-count": { "type": "integer" } },
            "patternProperties": {
                "^x-": { "type": "number" },
                "count$": { "minimum": 10 }
            },
            "additionalProperties": false
        });
        let errs = errors(schema.clone(), json!({ "x-count": 2.5 }));
        let kinds: Vec<&str> = errs.iter().map(|e| e.keyword).collect();
        assert_eq!(kinds, ["type", "minimum"]);
        assert!(errs.iter().all(|e| e.path == "/x-count"));

        let errs = errors(schema, json!({ "x-a": 1, "other": 1 }));
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].path, "/other");
        assert_eq!(errs[0].keyword, "false");
    }

    #[test]
    fn additional_properties_true_accepts_leftovers() {
        let schema = json!({ "properties": {}, "additionalProperties": true });
        assert!(keywords(schema, json!({ "anything": [1, 2] })).is_empty());
    }

    #[test]
    fn required_reports_each_missing_name() {
        let errs = errors(json!({ "required": ["a", "b", "c"] }), json!({ "b": 0 }));
        let messages: Vec<&str> = errs.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(
            messages,
            [
                "missing required property \"a\"",
                "missing required property \"c\""
            ]
        );
    }

    #[test]
    fn items_single_and_positional() {
        let errs = errors(json!({ "items": { "type": "string" } }), json!(["a", 1, "b", 2]));
        let paths: Vec<&str> = errs.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, ["/1", "/3"]);

        let schema = json!({ "items": [{ "type": "string" }, { "type": "number" }] });
        assert!(keywords(schema.clone(), json!(["a", 1, null, {}])).is_empty());
        assert!(keywords(schema.clone(), json!(["a"])).is_empty());
        let errs = errors(schema, json!([1, "a"]));
        let paths: Vec<&str> = errs.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, ["/0", "/1"]);
    }

    #[test]
    fn nested_paths_escape_names() {
        let schema = json!({
            "properties": {
                "a/b": { "properties": { "c": { "type": "string" } } }
            }
        });
        let errs = errors(schema, json!({ "a/b": { "c": 1 } }));
        assert_eq!(errs[0].path, "/a~1b/c");
    }

    #[test]
    fn all_of_forwards_every_failure() {
        let schema = json!({ "allOf": [{ "type": "string" }, { "minimum": 3 }, { "maximum": 1 }] });
        assert_eq!(keywords(schema, json!(2)), ["type", "minimum", "maximum"]);
    }

    #[test]
    fn any_of_isolates_branches() {
        let schema = json!({ "anyOf": [{ "type": "string" }, { "type": "number" }] });
        assert!(keywords(schema.clone(), json!("x")).is_empty());

        let errs = errors(schema, json!(true));
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].keyword, "anyOf");
        assert_eq!(errs[0].causes.len(), 2);
    }

    #[test]
    fn one_of_counts_passing_branches() {
        let schema = json!({ "oneOf": [{ "minimum": 0 }, { "maximum": 10 }] });

        let errs = errors(schema.clone(), json!(5));
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].keyword, "oneOf");
        assert!(errs[0].message.starts_with("2 "));

        assert!(errors(schema.clone(), json!(-5)).is_empty());

        let errs = errors(schema, json!(20));
        assert_eq!(errs.len(), 1);
        assert!(errs[0].message.starts_with("0 "));
    }

    #[test]
    fn boolean_schemas() {
        assert!(keywords(json!(true), json!({ "a": 1 })).is_empty());
        assert_eq!(keywords(json!(false), json!(null)), ["false"]);
    }

    #[test]
    fn sink_receives_each_error() {
        let mut store = SchemaStore::new(
            MemoryLoader::new().with_document("s.json", json!({ "required": ["a", "b"] })),
        );
        let root = store.load(Location::root("s.json")).unwrap();

        let mut seen = 0;
        validate_with(&store, &root, &json!({}), &mut |_| seen += 1).unwrap();
        assert_eq!(seen, 2);
    }

    #[test]
    fn unbuilt_location_is_an_error() {
        let mut store =
            SchemaStore::new(MemoryLoader::new().with_document("s.json", json!({})));
        let root = store.require(Location::root("s.json")).unwrap();
        let result = validate(&store, &root, &json!(1));
        assert!(matches!(result, Err(ResolveError::NotBuilt { .. })));
    }

    #[test]
    fn combinator_cycle_is_an_error() {
        let mut store = SchemaStore::new(
            MemoryLoader::new().with_document("s.json", json!({ "allOf": [{ "$ref": "#" }] })),
        );
        let root = store.load(Location::root("s.json")).unwrap();
        let result = validate(&store, &root, &json!(1));
        assert!(matches!(
            result,
            Err(ResolveError::CircularSchema { ref location, ref path })
                if location == "s.json#/" && path.is_empty()
        ));
    }

    #[test]
    fn same_schema_on_different_paths_is_not_a_cycle() {
        let schema = json!({
            "anyOf": [
                { "type": "integer" },
                { "type": "array", "items": { "$ref": "#" } }
            ]
        });
        assert!(keywords(schema.clone(), json!([[1, 2], [3, [4]]])).is_empty());
        assert_eq!(keywords(schema, json!([["x"]])), ["anyOf"]);
    }

    #[test]
    fn check_maps_errors_to_invalid() {
        let mut store = SchemaStore::new(
            MemoryLoader::new().with_document("s.json", json!({ "type": "string" })),
        );
        let root = store.load(Location::root("s.json")).unwrap();
        assert!(check(&store, &root, &json!("ok")).is_ok());
        assert!(matches!(
            check(&store, &root, &json!(1)),
            Err(ValidateError::Invalid { errors }) if errors.len() == 1
        ));
    }
}
