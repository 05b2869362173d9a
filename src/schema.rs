//! Compiled schema nodes and the compiler that produces them.
//!
//! Sub-schemas are not owned by their parent. A node holds the canonical
//! [`Location`] of each child, registered with the store while compiling, and
//! the validator looks children up in the store's built map.

use std::collections::HashMap;

use regex::Regex;
use serde_json::{Map, Number, Value};

use crate::error::ResolveError;
use crate::location::Location;
use crate::store::SchemaStore;
use crate::types::{json_type_name, JsonType};

/// An immutable compiled schema.
#[derive(Debug, Clone)]
pub enum SchemaNode {
    /// `true` accepts every instance, `false` rejects every instance.
    Bool(bool),
    Object(ObjectSchema),
}

/// `items`: one schema for every element, or one per position.
#[derive(Debug, Clone, PartialEq)]
pub enum Items {
    Single(Location),
    Positional(Vec<Location>),
}

/// A `patternProperties` entry.
#[derive(Debug, Clone)]
pub struct PatternProperty {
    pub pattern: Regex,
    pub schema: Location,
}

impl PatternProperty {
    pub fn matches(&self, name: &str) -> bool {
        self.pattern.is_match(name)
    }
}

/// The keywords of an object schema. `None` means the keyword was absent.
#[derive(Debug, Clone, Default)]
pub struct ObjectSchema {
    /// Declaration order, duplicates removed.
    pub types: Vec<JsonType>,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub exclusive_minimum: Option<f64>,
    pub exclusive_maximum: Option<f64>,
    /// Always positive.
    pub multiple_of: Option<Number>,
    pub min_length: Option<u64>,
    pub max_length: Option<u64>,
    pub properties: HashMap<String, Location>,
    /// Declaration order.
    pub pattern_properties: Vec<PatternProperty>,
    pub additional_properties: Option<Location>,
    pub required: Vec<String>,
    pub items: Option<Items>,
    pub all_of: Option<Vec<Location>>,
    pub any_of: Option<Vec<Location>>,
    pub one_of: Option<Vec<Location>>,
}

/// Compile the schema at `location`.
///
/// Every sub-schema is registered with `store`, so the build loop picks it up
/// later; nothing below this location is compiled here.
///
/// # Errors
///
/// Returns `ResolveError` if nothing is found at `location`, a keyword has the
/// wrong JSON type, or registering a sub-schema fails.
pub fn compile(store: &mut SchemaStore, location: &Location) -> Result<SchemaNode, ResolveError> {
    let document = store.document(location.document())?;
    let value = location
        .evaluate(&document)
        .ok_or_else(|| ResolveError::PointerNotFound {
            location: location.to_string(),
        })?;

    let object = match value {
        Value::Bool(b) => return Ok(SchemaNode::Bool(*b)),
        Value::Object(object) => object,
        other => {
            return Err(ResolveError::InvalidKeyword {
                location: location.to_string(),
                keyword: "schema",
                expected: "object or boolean",
                actual: json_type_name(other).to_string(),
            })
        }
    };

    let mut compiler = Compiler {
        store,
        location,
        object,
    };
    compiler.compile().map(SchemaNode::Object)
}

struct Compiler<'a> {
    store: &'a mut SchemaStore,
    location: &'a Location,
    object: &'a Map<String, Value>,
}

impl Compiler<'_> {
    fn compile(&mut self) -> Result<ObjectSchema, ResolveError> {
        Ok(ObjectSchema {
            types: self.types()?,
            minimum: self.number("minimum")?,
            maximum: self.number("maximum")?,
            exclusive_minimum: self.number("exclusiveMinimum")?,
            exclusive_maximum: self.number("exclusiveMaximum")?,
            multiple_of: self.multiple_of()?,
            min_length: self.length("minLength")?,
            max_length: self.length("maxLength")?,
            properties: self.properties()?,
            pattern_properties: self.pattern_properties()?,
            additional_properties: self.additional_properties()?,
            required: self.required()?,
            items: self.items()?,
            all_of: self.schema_list("allOf")?,
            any_of: self.schema_list("anyOf")?,
            one_of: self.schema_list("oneOf")?,
        })
    }

    fn invalid(&self, keyword: &'static str, expected: &'static str, actual: &Value) -> ResolveError {
        ResolveError::InvalidKeyword {
            location: self.location.to_string(),
            keyword,
            expected,
            actual: json_type_name(actual).to_string(),
        }
    }

    fn require(&mut self, location: Location) -> Result<Location, ResolveError> {
        self.store.require(location)
    }

    fn types(&self) -> Result<Vec<JsonType>, ResolveError> {
        let names: Vec<&Value> = match self.object.get("type") {
            None => return Ok(Vec::new()),
            Some(Value::Array(names)) => names.iter().collect(),
            Some(single) => vec![single],
        };

        let mut types = Vec::with_capacity(names.len());
        for name in names {
            let Some(name) = name.as_str() else {
                return Err(self.invalid("type", "string or array of strings", name));
            };
            let ty = JsonType::parse(name).ok_or_else(|| ResolveError::UnknownType {
                location: self.location.to_string(),
                name: name.to_string(),
            })?;
            if !types.contains(&ty) {
                types.push(ty);
            }
        }
        Ok(types)
    }

    fn number(&self, keyword: &'static str) -> Result<Option<f64>, ResolveError> {
        match self.object.get(keyword) {
            None => Ok(None),
            Some(value) => value
                .as_f64()
                .map(Some)
                .ok_or_else(|| self.invalid(keyword, "number", value)),
        }
    }

    // Kept as the original number so integer divisors can be checked exactly.
    fn multiple_of(&self) -> Result<Option<Number>, ResolveError> {
        match self.object.get("multipleOf") {
            None => Ok(None),
            Some(Value::Number(number)) if number.as_f64().is_some_and(|f| f > 0.0) => {
                Ok(Some(number.clone()))
            }
            Some(value) => Err(self.invalid("multipleOf", "positive number", value)),
        }
    }

    fn length(&self, keyword: &'static str) -> Result<Option<u64>, ResolveError> {
        match self.object.get(keyword) {
            None => Ok(None),
            Some(value) => value
                .as_u64()
                .map(Some)
                .ok_or_else(|| self.invalid(keyword, "non-negative integer", value)),
        }
    }

    fn properties(&mut self) -> Result<HashMap<String, Location>, ResolveError> {
        let object = self.object;
        let Some(value) = object.get("properties") else {
            return Ok(HashMap::new());
        };
        let Some(properties) = value.as_object() else {
            return Err(self.invalid("properties", "object", value));
        };

        let base = self.location.append("properties");
        let mut result = HashMap::with_capacity(properties.len());
        for name in properties.keys() {
            let schema = self.require(base.append(name))?;
            result.insert(name.clone(), schema);
        }
        Ok(result)
    }

    fn pattern_properties(&mut self) -> Result<Vec<PatternProperty>, ResolveError> {
        let object = self.object;
        let Some(value) = object.get("patternProperties") else {
            return Ok(Vec::new());
        };
        let Some(patterns) = value.as_object() else {
            return Err(self.invalid("patternProperties", "object", value));
        };

        let base = self.location.append("patternProperties");
        let mut result = Vec::with_capacity(patterns.len());
        for source in patterns.keys() {
            let pattern = Regex::new(source).map_err(|source_err| ResolveError::InvalidPattern {
                location: self.location.to_string(),
                pattern: source.clone(),
                source: source_err,
            })?;
            let schema = self.require(base.append(source))?;
            result.push(PatternProperty { pattern, schema });
        }
        Ok(result)
    }

    fn additional_properties(&mut self) -> Result<Option<Location>, ResolveError> {
        let object = self.object;
        match object.get("additionalProperties") {
            None => Ok(None),
            Some(Value::Object(_) | Value::Bool(_)) => self
                .require(self.location.append("additionalProperties"))
                .map(Some),
            Some(other) => Err(self.invalid("additionalProperties", "object or boolean", other)),
        }
    }

    fn required(&self) -> Result<Vec<String>, ResolveError> {
        let Some(value) = self.object.get("required") else {
            return Ok(Vec::new());
        };
        let Some(names) = value.as_array() else {
            return Err(self.invalid("required", "array of strings", value));
        };

        let mut result: Vec<String> = Vec::with_capacity(names.len());
        for name in names {
            let Some(name) = name.as_str() else {
                return Err(self.invalid("required", "array of strings", name));
            };
            if !result.iter().any(|existing| existing == name) {
                result.push(name.to_string());
            }
        }
        Ok(result)
    }

    fn items(&mut self) -> Result<Option<Items>, ResolveError> {
        let object = self.object;
        let base = self.location.append("items");
        match object.get("items") {
            None => Ok(None),
            Some(Value::Object(_) | Value::Bool(_)) => Ok(Some(Items::Single(self.require(base)?))),
            Some(Value::Array(schemas)) => {
                let mut positional = Vec::with_capacity(schemas.len());
                for idx in 0..schemas.len() {
                    positional.push(self.require(base.append(&idx.to_string()))?);
                }
                Ok(Some(Items::Positional(positional)))
            }
            Some(other) => Err(self.invalid("items", "object, boolean or array", other)),
        }
    }

    fn schema_list(&mut self, keyword: &'static str) -> Result<Option<Vec<Location>>, ResolveError> {
        let object = self.object;
        let Some(value) = object.get(keyword) else {
            return Ok(None);
        };
        let Some(schemas) = value.as_array() else {
            return Err(self.invalid(keyword, "array", value));
        };

        let base = self.location.append(keyword);
        let mut result = Vec::with_capacity(schemas.len());
        for idx in 0..schemas.len() {
            result.push(self.require(base.append(&idx.to_string()))?);
        }
        Ok(Some(result))
    }
}
