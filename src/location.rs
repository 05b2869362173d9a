//! Schema locations: a document plus a JSON Pointer into it.

use std::fmt;
use std::str::FromStr;

use serde_json::Value;
use url::Url;

use crate::error::ResolveError;

/// The pointer addressing a whole document.
pub const ROOT_POINTER: &str = "/";

/// Canonical address of a schema: `document#pointer`.
///
/// The pointer is always non-empty; an absent or empty fragment is stored as
/// the root pointer `/`, so `doc.json`, `doc.json#` and `doc.json#/` are the
/// same location.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Location {
    document: String,
    pointer: String,
}

impl Location {
    /// Create a location from a document name and a JSON Pointer.
    pub fn new(document: impl Into<String>, pointer: impl Into<String>) -> Self {
        let pointer = pointer.into();
        Self {
            document: document.into(),
            pointer: if pointer.is_empty() {
                ROOT_POINTER.to_string()
            } else {
                pointer
            },
        }
    }

    /// The root of `document`.
    pub fn root(document: impl Into<String>) -> Self {
        Self::new(document, ROOT_POINTER)
    }

    /// Parse `document#pointer`, e.g. `schema.json#/definitions/item`.
    ///
    /// # Errors
    ///
    /// Returns `ResolveError::InvalidReference` if the fragment is not a JSON
    /// Pointer. Unlike [`Location::join`], whitespace is allowed so local
    /// paths can be passed through unchanged.
    ///
    /// The document is normalized the same way `$ref` targets are, so
    /// `./a.json` and `a.json` name one document.
    pub fn parse(s: &str) -> Result<Self, ResolveError> {
        let (document, fragment) = split_reference(s)?;
        let document = match Url::parse(document) {
            Ok(url) => url.to_string(),
            Err(_) => normalize_path(document),
        };
        Ok(Self::new(document, fragment.unwrap_or_default()))
    }

    pub fn document(&self) -> &str {
        &self.document
    }

    pub fn pointer(&self) -> &str {
        &self.pointer
    }

    pub fn is_root(&self) -> bool {
        self.pointer == ROOT_POINTER
    }

    /// Location of the child `segment` under this one.
    ///
    /// `~` and `/` in the segment are escaped as `~0` and `~1`.
    pub fn append(&self, segment: &str) -> Self {
        let escaped = escape_segment(segment);
        let pointer = if self.is_root() {
            format!("/{}", escaped)
        } else {
            format!("{}/{}", self.pointer, escaped)
        };
        Self {
            document: self.document.clone(),
            pointer,
        }
    }

    /// Find the value this location addresses inside its loaded document.
    pub fn evaluate<'a>(&self, document: &'a Value) -> Option<&'a Value> {
        if self.is_root() {
            Some(document)
        } else {
            document.pointer(&self.pointer)
        }
    }

    /// Rewrite a `$ref` found at this location into the location it names.
    ///
    /// A ref without a document part stays in this document; a ref without a
    /// fragment points at the root of its document.
    ///
    /// # Errors
    ///
    /// Returns `ResolveError::InvalidReference` if the ref is malformed.
    pub fn join(&self, reference: &str) -> Result<Self, ResolveError> {
        if reference
            .chars()
            .any(|c| c.is_whitespace() || c.is_control())
        {
            return Err(ResolveError::InvalidReference {
                reference: reference.to_string(),
                message: "contains whitespace or control characters".to_string(),
            });
        }
        let (document, fragment) = split_reference(reference)?;
        let document = if document.is_empty() {
            self.document.clone()
        } else {
            resolve_document(&self.document, document)?
        };
        Ok(Self::new(document, fragment.unwrap_or_default()))
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.document, self.pointer)
    }
}

impl FromStr for Location {
    type Err = ResolveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Location::parse(s)
    }
}

/// Escape one JSON Pointer reference token (RFC 6901).
pub fn escape_segment(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

/// Split a reference into its document part and optional fragment.
fn split_reference(reference: &str) -> Result<(&str, Option<&str>), ResolveError> {
    let invalid = |message: &str| ResolveError::InvalidReference {
        reference: reference.to_string(),
        message: message.to_string(),
    };

    let Some((document, fragment)) = reference.split_once('#') else {
        return Ok((reference, None));
    };
    if fragment.contains('#') {
        return Err(invalid("more than one '#'"));
    }
    if !fragment.is_empty() && !fragment.starts_with('/') {
        return Err(invalid("fragment is not a JSON Pointer"));
    }
    Ok((document, Some(fragment)))
}

/// Resolve a ref's document part against the referencing document.
fn resolve_document(base: &str, reference: &str) -> Result<String, ResolveError> {
    match Url::parse(reference) {
        Ok(url) => Ok(url.to_string()),
        Err(url::ParseError::RelativeUrlWithoutBase) => match Url::parse(base) {
            Ok(base_url) => base_url
                .join(reference)
                .map(|url| url.to_string())
                .map_err(|e| ResolveError::InvalidReference {
                    reference: reference.to_string(),
                    message: e.to_string(),
                }),
            // Base is a plain path
            Err(_) => Ok(join_path(base, reference)),
        },
        Err(e) => Err(ResolveError::InvalidReference {
            reference: reference.to_string(),
            message: e.to_string(),
        }),
    }
}

/// Join a relative path onto the directory of `base` and normalize it.
fn join_path(base: &str, reference: &str) -> String {
    if reference.starts_with('/') {
        return normalize_path(reference);
    }
    match base.rfind('/') {
        Some(idx) => normalize_path(&format!("{}{}", &base[..=idx], reference)),
        None => normalize_path(reference),
    }
}

/// Lexically remove `.` and `..` segments.
fn normalize_path(path: &str) -> String {
    let absolute = path.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => match segments.last() {
                Some(&last) if last != ".." => {
                    segments.pop();
                }
                _ if absolute => {}
                _ => segments.push(".."),
            },
            other => segments.push(other),
        }
    }
    let joined = segments.join("/");
    if absolute {
        format!("/{}", joined)
    } else {
        joined
    }
}
