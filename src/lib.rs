//! JSON Schema reference resolution and validation
//!
//! Schemas may span several documents linked by `$ref`. A [`SchemaStore`]
//! resolves references into canonical [`Location`]s, compiles each location
//! once into an immutable [`SchemaNode`], and [`validate`] checks instances
//! against the result, reporting every violation rather than the first.
//!
//! # Example
//!
//! ```
//! use refschema::{validate, Location, MemoryLoader, SchemaStore};
//! use serde_json::json;
//!
//! let loader = MemoryLoader::new().with_document(
//!     "order.json",
//!     json!({
//!         "type": "object",
//!         "properties": {
//!             "id": { "$ref": "#/definitions/id" },
//!             "quantity": { "type": "integer", "minimum": 1 }
//!         },
//!         "required": ["id"],
//!         "definitions": {
//!             "id": { "type": "string", "minLength": 4 }
//!         }
//!     }),
//! );
//!
//! let mut store = SchemaStore::new(loader);
//! let root = store.load(Location::root("order.json")).unwrap();
//!
//! let errors = validate(&store, &root, &json!({ "id": "abc", "quantity": 0 })).unwrap();
//! assert_eq!(errors.len(), 2);
//!
//! let errors = validate(&store, &root, &json!({ "id": "abcd" })).unwrap();
//! assert!(errors.is_empty());
//! ```
//!
//! # Build Lifecycle
//!
//! | Step | Effect |
//! |------|--------|
//! | [`SchemaStore::require`] | Follows `$ref` aliases, marks the target pending |
//! | [`SchemaStore::build`] | Compiles pending locations until none are left |
//! | [`validate`] | Walks a built schema against an instance |
//!
//! A location whose content is only a `$ref` is never built itself; anything
//! pointing at it is rewired to the target.

mod error;
mod loader;
mod location;
mod schema;
mod store;
mod types;
mod validator;

pub use error::{ResolveError, ValidateError, ValidationError};
pub use loader::{
    is_url, load_document, load_document_auto, load_document_str, DocumentLoader, FileLoader,
    MemoryLoader,
};
pub use location::{escape_segment, Location, ROOT_POINTER};
pub use schema::{compile, Items, ObjectSchema, PatternProperty, SchemaNode};
pub use store::SchemaStore;
pub use types::{
    json_type_name, JsonType, StoreOptions, DEFAULT_MAX_LOCATIONS, DEFAULT_MAX_REF_HOPS,
};
pub use validator::{check, validate, validate_with};

#[cfg(feature = "remote")]
pub use loader::load_document_url;
