//! The schema store: reference resolution and the lazy build loop.
//!
//! Locations move from absent to pending (`require`) to built (`build`) and
//! never back. Registering a location that is already pending or built is a
//! no-op, which is what keeps cyclic schema graphs finite.

use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::rc::Rc;

use serde_json::Value;

use crate::error::ResolveError;
use crate::loader::DocumentLoader;
use crate::location::Location;
use crate::schema::{compile, SchemaNode};
use crate::types::{StoreOptions, REF_KEYWORD};

/// Owner of every loaded document and compiled schema.
pub struct SchemaStore {
    loader: Box<dyn DocumentLoader>,
    options: StoreOptions,
    documents: RefCell<HashMap<String, Rc<Value>>>,
    pending: BTreeSet<Location>,
    built: HashMap<Location, SchemaNode>,
}

impl SchemaStore {
    /// Create a store with default limits.
    pub fn new(loader: impl DocumentLoader + 'static) -> Self {
        Self::with_options(loader, StoreOptions::default())
    }

    pub fn with_options(loader: impl DocumentLoader + 'static, options: StoreOptions) -> Self {
        Self {
            loader: Box::new(loader),
            options,
            documents: RefCell::new(HashMap::new()),
            pending: BTreeSet::new(),
            built: HashMap::new(),
        }
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    /// Register `location` for compilation.
    ///
    /// Follows `$ref` aliases until it reaches a location holding a schema,
    /// registers that one and returns it. Returns immediately if the location
    /// is already pending or built.
    ///
    /// # Errors
    ///
    /// Returns `ResolveError` if a document fails to load, a pointer has no
    /// target, a ref is malformed, aliases loop, or a limit is hit.
    pub fn require(&mut self, location: Location) -> Result<Location, ResolveError> {
        let mut current = location;
        let mut visited = HashSet::new();

        loop {
            if self.contains(&current) {
                return Ok(current);
            }

            let Some(reference) = self.reference_at(&current)? else {
                break;
            };

            if visited.len() >= self.options.max_ref_hops {
                return Err(ResolveError::TooManyHops {
                    location: current.to_string(),
                    limit: self.options.max_ref_hops,
                });
            }
            let target = current.join(&reference)?;
            log::trace!("{} is a reference to {}", current, target);
            if !visited.insert(current) || visited.contains(&target) {
                return Err(ResolveError::CircularReference {
                    location: target.to_string(),
                });
            }
            current = target;
        }

        if self.pending.len() + self.built.len() >= self.options.max_locations {
            return Err(ResolveError::LocationLimit {
                limit: self.options.max_locations,
            });
        }

        log::trace!("registered {}", current);
        self.pending.insert(current.clone());
        Ok(current)
    }

    /// Read the JSON value at `location`.
    ///
    /// Does not follow `$ref` and never changes pending or built state.
    ///
    /// # Errors
    ///
    /// Returns `ResolveError` if the document fails to load or the pointer
    /// has no target.
    pub fn resolve(&self, location: &Location) -> Result<Value, ResolveError> {
        let document = self.document(location.document())?;
        location
            .evaluate(&document)
            .cloned()
            .ok_or_else(|| ResolveError::PointerNotFound {
                location: location.to_string(),
            })
    }

    /// Compile pending locations until none are left.
    ///
    /// Compiling a location may register more; they are picked up by the
    /// same loop. On error, everything built so far stays built.
    pub fn build(&mut self) -> Result<(), ResolveError> {
        while let Some(location) = self.pending.first().cloned() {
            log::debug!("processing {}", location);
            let node = compile(self, &location)?;
            self.pending.remove(&location);
            self.built.insert(location, node);
        }
        log::debug!("built {} schema location(s)", self.built.len());
        Ok(())
    }

    /// Register `location` and build everything reachable from it.
    ///
    /// Returns the canonical location to validate against.
    pub fn load(&mut self, location: Location) -> Result<Location, ResolveError> {
        let location = self.require(location)?;
        self.build()?;
        Ok(location)
    }

    /// The compiled schema at `location`, if built.
    pub fn get(&self, location: &Location) -> Option<&SchemaNode> {
        self.built.get(location)
    }

    pub fn is_pending(&self, location: &Location) -> bool {
        self.pending.contains(location)
    }

    pub fn is_built(&self, location: &Location) -> bool {
        self.built.contains_key(location)
    }

    /// Locations registered but not yet compiled.
    pub fn pending(&self) -> impl Iterator<Item = &Location> {
        self.pending.iter()
    }

    /// Every compiled location with its schema, in no particular order.
    pub fn built(&self) -> impl Iterator<Item = (&Location, &SchemaNode)> {
        self.built.iter()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn built_len(&self) -> usize {
        self.built.len()
    }

    fn contains(&self, location: &Location) -> bool {
        self.pending.contains(location) || self.built.contains_key(location)
    }

    /// Fetch a document through the loader, once per store.
    pub(crate) fn document(&self, name: &str) -> Result<Rc<Value>, ResolveError> {
        if let Some(document) = self.documents.borrow().get(name) {
            return Ok(Rc::clone(document));
        }
        log::debug!("loading document {:?}", name);
        let document = self.loader.load(name).map_err(|err| match err {
            // Loaders report their own source; errors name the store's document
            ResolveError::InvalidJson { source, .. } => ResolveError::InvalidJson {
                document: name.to_string(),
                source,
            },
            other => other,
        })?;
        let document = Rc::new(document);
        self.documents
            .borrow_mut()
            .insert(name.to_string(), Rc::clone(&document));
        Ok(document)
    }

    /// The `$ref` string at `location`, if it is an alias.
    fn reference_at(&self, location: &Location) -> Result<Option<String>, ResolveError> {
        let document = self.document(location.document())?;
        let value = location
            .evaluate(&document)
            .ok_or_else(|| ResolveError::PointerNotFound {
                location: location.to_string(),
            })?;
        Ok(value
            .get(REF_KEYWORD)
            .and_then(Value::as_str)
            .filter(|r| !r.is_empty())
            .map(str::to_string))
    }
}

impl std::fmt::Debug for SchemaStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaStore")
            .field("options", &self.options)
            .field("pending", &self.pending)
            .field("built", &self.built.len())
            .finish_non_exhaustive()
    }
}
