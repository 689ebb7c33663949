//! Per-session execution environment
//!
//! Owns the backend handle, the bound index, the connection properties, and
//! time-bounded caches of the backend's schema metadata.

use crate::backend::SearchBackend;
use crate::error::{Error, Result};
use crate::types::{Identifier, IndexDefinition, TypeDefinition};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Property controlling the metadata cache TTL, in milliseconds.
pub const METADATA_CACHE_TTL_PROPERTY: &str = "metadata.cache.ttl.ms";

/// Default metadata cache TTL when the property is absent.
pub const DEFAULT_METADATA_CACHE_TTL_MS: u64 = 60_000;

/// A per-connection/session execution environment.
pub struct ExecutionEnvironment {
    backend: Arc<dyn SearchBackend>,
    index: Identifier,
    properties: HashMap<String, String>,
    ttl: Duration,
    /// Lazily resolved index definition, memoized after the first fetch.
    index_definition: Mutex<Option<IndexDefinition>>,
    /// Type definitions by identifier, each entry stamped with its fetch
    /// time and dropped once older than the TTL.
    types: Mutex<HashMap<Identifier, (Instant, Arc<TypeDefinition>)>>,
    closed: Mutex<bool>,
}

impl ExecutionEnvironment {
    /// Creates an environment bound to one index. The properties map is
    /// copied and immutable from here on.
    pub fn new(
        backend: Arc<dyn SearchBackend>,
        index: &str,
        properties: HashMap<String, String>,
    ) -> Result<Self> {
        let ttl_ms = match properties.get(METADATA_CACHE_TTL_PROPERTY) {
            Some(raw) => raw.parse::<u64>().map_err(|_| {
                Error::InvalidValue(format!(
                    "property {} must be an integer, got '{}'",
                    METADATA_CACHE_TTL_PROPERTY, raw
                ))
            })?,
            None => DEFAULT_METADATA_CACHE_TTL_MS,
        };
        Ok(ExecutionEnvironment {
            backend,
            index: Identifier::new(index)?,
            properties,
            ttl: Duration::from_millis(ttl_ms),
            index_definition: Mutex::new(None),
            types: Mutex::new(HashMap::new()),
            closed: Mutex::new(false),
        })
    }

    pub fn backend(&self) -> &Arc<dyn SearchBackend> {
        &self.backend
    }

    pub fn index(&self) -> &Identifier {
        &self.index
    }

    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }

    pub fn properties(&self) -> &HashMap<String, String> {
        &self.properties
    }

    fn check_open(&self) -> Result<()> {
        if *self.closed.lock() {
            return Err(Error::ExecutionError(
                "execution environment is closed".into(),
            ));
        }
        Ok(())
    }

    /// The bound index's definition, resolved against the backend on first
    /// access and memoized.
    pub fn index_definition(&self) -> Result<IndexDefinition> {
        self.check_open()?;
        {
            let cached = self.index_definition.lock();
            if let Some(definition) = cached.as_ref() {
                return Ok(definition.clone());
            }
        }
        let definition = self.backend.index_definition(&self.index)?;
        let mut cached = self.index_definition.lock();
        // A racing fetch may have filled the slot; both fetched the same
        // logical value, so last write wins.
        if cached.is_none() {
            *cached = Some(definition.clone());
        }
        Ok(definition)
    }

    /// The named type's definition: served from the TTL cache, fetched from
    /// the backend on miss or expiry. Expired entries are simply dropped.
    pub fn type_definition(&self, name: &str) -> Result<Arc<TypeDefinition>> {
        self.check_open()?;
        let ident = Identifier::new(name)?;
        {
            let mut types = self.types.lock();
            if let Some((fetched, definition)) = types.get(&ident) {
                if fetched.elapsed() <= self.ttl {
                    return Ok(definition.clone());
                }
                tracing::debug!(type_ident = %ident, "metadata cache entry expired");
                types.remove(&ident);
            }
        }
        let definition = self.backend.type_definition(&self.index, &ident)?;
        self.types
            .lock()
            .insert(ident, (Instant::now(), definition.clone()));
        Ok(definition)
    }

    /// Releases the metadata caches. Idempotent.
    pub fn close(&self) {
        let mut closed = self.closed.lock();
        if *closed {
            return;
        }
        *closed = true;
        tracing::debug!(index = %self.index, "closing execution environment");
        self.types.lock().clear();
        *self.index_definition.lock() = None;
    }
}
