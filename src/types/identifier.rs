//! Interned identifiers for schema and SQL names

use crate::error::{Error, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, LazyLock};

/// Process-wide intern pool. Every `Identifier` holds an `Arc<str>` from this
/// set, so equal names share one allocation and equality is a pointer check.
static POOL: LazyLock<Mutex<HashSet<Arc<str>>>> = LazyLock::new(|| Mutex::new(HashSet::new()));

/// An interned, case-preserving name. Used as the key wherever a schema or
/// SQL name appears (index names, type names, field names).
///
/// Equality and hashing go through the interned pointer, so two identifiers
/// compare equal iff they were created from the same (trimmed) text,
/// including case.
#[derive(Clone)]
pub struct Identifier(Arc<str>);

impl Identifier {
    /// Interns the given name. The name is trimmed and must not be empty.
    pub fn new(name: &str) -> Result<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidValue("identifier cannot be empty".into()));
        }
        let mut pool = POOL.lock();
        if let Some(interned) = pool.get(name) {
            return Ok(Identifier(interned.clone()));
        }
        let interned: Arc<str> = Arc::from(name);
        pool.insert(interned.clone());
        Ok(Identifier(interned))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl PartialEq for Identifier {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Identifier {}

impl Hash for Identifier {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.0) as *const u8 as usize).hash(state);
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identifier({})", self.0)
    }
}

impl Serialize for Identifier {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Identifier {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Identifier::new(&name).map_err(serde::de::Error::custom)
    }
}
