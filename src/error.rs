//! Error types for schema resolution, compilation and validation.

use std::path::PathBuf;
use thiserror::Error;

/// Errors while loading documents, chasing `$ref` or compiling schemas.
///
/// Any of these means the schema is broken, not the instance.
#[derive(Debug, Error)]
pub enum ResolveError {
    // IO errors (exit code 3)
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[cfg(feature = "remote")]
    #[error("failed to fetch {url}: {source}")]
    NetworkError {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("unknown document: {document}")]
    UnknownDocument { document: String },

    // Parse errors (exit code 2)
    #[error("invalid JSON in {document}: {source}")]
    InvalidJson {
        document: String,
        #[source]
        source: serde_json::Error,
    },

    // Schema errors (exit code 2)
    #[error("invalid reference \"{reference}\": {message}")]
    InvalidReference { reference: String, message: String },

    #[error("nothing found at {location}")]
    PointerNotFound { location: String },

    #[error("circular $ref chain through {location}")]
    CircularReference { location: String },

    #[error("$ref chain starting at {location} is longer than {limit} hops")]
    TooManyHops { location: String, limit: usize },

    #[error("invalid {keyword} at {location}: expected {expected}, got {actual}")]
    InvalidKeyword {
        location: String,
        keyword: &'static str,
        expected: &'static str,
        actual: String,
    },

    #[error("unknown type \"{name}\" at {location}")]
    UnknownType { location: String, name: String },

    #[error("invalid pattern \"{pattern}\" at {location}: {source}")]
    InvalidPattern {
        location: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("schema graph exceeds {limit} locations")]
    LocationLimit { limit: usize },

    #[error("schema at {location} is applied to itself again at instance path \"{path}\"")]
    CircularSchema { location: String, path: String },

    #[error("schema at {location} has not been built")]
    NotBuilt { location: String },
}

impl ResolveError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            ResolveError::FileNotFound { .. }
            | ResolveError::ReadError { .. }
            | ResolveError::UnknownDocument { .. } => 3,
            #[cfg(feature = "remote")]
            ResolveError::NetworkError { .. } => 3,
            _ => 2,
        }
    }
}

/// Pass/fail outcome of validating an instance.
#[derive(Debug, Error)]
pub enum ValidateError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("validation failed with {} error(s)", errors.len())]
    Invalid { errors: Vec<ValidationError> },
}

impl ValidateError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            ValidateError::Resolve(e) => e.exit_code(),
            ValidateError::Invalid { .. } => 1,
        }
    }
}

/// Single violation found while validating an instance.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ValidationError {
    /// JSON Pointer (RFC 6901) to the offending value in the instance.
    pub path: String,
    /// Keyword that produced the violation.
    pub keyword: &'static str,
    /// Human-readable error message.
    pub message: String,
    /// Branch failures behind an `anyOf`/`oneOf` verdict.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub causes: Vec<ValidationError>,
}

impl ValidationError {
    pub(crate) fn new(path: &str, keyword: &'static str, message: impl Into<String>) -> Self {
        Self {
            path: path.to_string(),
            keyword,
            message: message.into(),
            causes: Vec::new(),
        }
    }

    pub(crate) fn with_causes(mut self, causes: Vec<ValidationError>) -> Self {
        self.causes = causes;
        self
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.path.is_empty() {
            write!(f, "(root): {}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_error_exit_codes() {
        let err = ResolveError::FileNotFound {
            path: PathBuf::from("schema.json"),
        };
        assert_eq!(err.exit_code(), 3);

        let err = ResolveError::UnknownDocument {
            document: "other.json".into(),
        };
        assert_eq!(err.exit_code(), 3);

        let err = ResolveError::PointerNotFound {
            location: "schema.json#/definitions/missing".into(),
        };
        assert_eq!(err.exit_code(), 2);

        let err = ResolveError::UnknownType {
            location: "schema.json#/".into(),
            name: "float".into(),
        };
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn validate_error_exit_codes() {
        let err = ValidateError::Invalid {
            errors: vec![ValidationError::new("/id", "required", "missing")],
        };
        assert_eq!(err.exit_code(), 1);

        let err = ValidateError::from(ResolveError::NotBuilt {
            location: "schema.json#/".into(),
        });
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn validation_error_display() {
        let err = ValidationError::new("/buyer/email", "type", "expected string, got number");
        assert_eq!(err.to_string(), "/buyer/email: expected string, got number");

        let err = ValidationError::new("", "required", "missing required property \"id\"");
        assert_eq!(err.to_string(), "(root): missing required property \"id\"");
    }

    #[test]
    fn causes_are_omitted_from_json_when_empty() {
        let err = ValidationError::new("/a", "minimum", "too small");
        let json = serde_json::to_value(&err).unwrap();
        assert!(json.get("causes").is_none());
        assert_eq!(json["keyword"], "minimum");

        let err = ValidationError::new("", "anyOf", "no branch matched")
            .with_causes(vec![ValidationError::new("", "type", "expected string")]);
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["causes"][0]["message"], "expected string");
    }
}
