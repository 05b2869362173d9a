//! Document loading from memory, files and HTTP URLs.
//!
//! The store never touches the filesystem or network itself; it asks a
//! [`DocumentLoader`] for each document part it meets.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::error::ResolveError;

#[cfg(feature = "remote")]
use std::time::Duration;

/// Default timeout for HTTP requests (10 seconds).
#[cfg(feature = "remote")]
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Source of JSON documents, keyed by the document part of a location.
pub trait DocumentLoader {
    /// Load and parse the document named `document`.
    fn load(&self, document: &str) -> Result<Value, ResolveError>;
}

impl<F> DocumentLoader for F
where
    F: Fn(&str) -> Result<Value, ResolveError>,
{
    fn load(&self, document: &str) -> Result<Value, ResolveError> {
        self(document)
    }
}

/// Documents held in memory under fixed names.
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    documents: HashMap<String, Value>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a document, replacing any previous one with the same name.
    pub fn with_document(mut self, name: impl Into<String>, document: Value) -> Self {
        self.insert(name, document);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, document: Value) {
        self.documents.insert(name.into(), document);
    }
}

impl DocumentLoader for MemoryLoader {
    fn load(&self, document: &str) -> Result<Value, ResolveError> {
        self.documents
            .get(document)
            .cloned()
            .ok_or_else(|| ResolveError::UnknownDocument {
                document: document.to_string(),
            })
    }
}

/// Documents read from disk, relative paths taken from `base_dir`.
///
/// With the `remote` feature, `http://` and `https://` documents are fetched.
#[derive(Debug, Clone)]
pub struct FileLoader {
    base_dir: PathBuf,
}

impl FileLoader {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }
}

impl Default for FileLoader {
    fn default() -> Self {
        Self::new(".")
    }
}

impl DocumentLoader for FileLoader {
    fn load(&self, document: &str) -> Result<Value, ResolveError> {
        if is_url(document) {
            return load_document_auto(document);
        }
        let path = match document.strip_prefix("file://") {
            Some(path) => PathBuf::from(path),
            None => self.base_dir.join(document),
        };
        load_document(&path)
    }
}

/// Load a document from a file path.
///
/// # Errors
///
/// Returns `ResolveError::FileNotFound` if the file doesn't exist,
/// or `ResolveError::InvalidJson` if the file isn't valid JSON.
pub fn load_document(path: &Path) -> Result<Value, ResolveError> {
    if !path.exists() {
        return Err(ResolveError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let content = std::fs::read_to_string(path).map_err(|source| ResolveError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;

    serde_json::from_str(&content).map_err(|source| ResolveError::InvalidJson {
        document: path.display().to_string(),
        source,
    })
}

/// Load a document from a JSON string.
///
/// # Errors
///
/// Returns `ResolveError::InvalidJson` if the string isn't valid JSON.
pub fn load_document_str(content: &str) -> Result<Value, ResolveError> {
    serde_json::from_str(content).map_err(|source| ResolveError::InvalidJson {
        document: "(string)".to_string(),
        source,
    })
}

/// Load a document from an HTTP/HTTPS URL.
///
/// Requires the `remote` feature (enabled by default).
///
/// # Errors
///
/// Returns `ResolveError::NetworkError` if the request fails or the response
/// isn't valid JSON.
#[cfg(feature = "remote")]
pub fn load_document_url(url: &str) -> Result<Value, ResolveError> {
    log::debug!("fetching {}", url);

    let client = reqwest::blocking::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(|source| ResolveError::NetworkError {
            url: url.to_string(),
            source,
        })?;

    let response = client
        .get(url)
        .send()
        .map_err(|source| ResolveError::NetworkError {
            url: url.to_string(),
            source,
        })?;

    // Check for HTTP errors before parsing
    let response = response
        .error_for_status()
        .map_err(|source| ResolveError::NetworkError {
            url: url.to_string(),
            source,
        })?;

    response
        .json()
        .map_err(|source| ResolveError::NetworkError {
            url: url.to_string(),
            source,
        })
}

/// Check if a string looks like a URL (starts with http:// or https://).
pub fn is_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

/// Load a document from a file path or URL.
///
/// URL loading requires the `remote` feature.
pub fn load_document_auto(source: &str) -> Result<Value, ResolveError> {
    if is_url(source) {
        #[cfg(feature = "remote")]
        {
            load_document_url(source)
        }
        #[cfg(not(feature = "remote"))]
        {
            Err(ResolveError::FileNotFound {
                path: PathBuf::from(source),
            })
        }
    } else {
        load_document(Path::new(source))
    }
}
