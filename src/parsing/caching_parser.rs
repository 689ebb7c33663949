//! Caching parser for SQL statements
//!
//! Wraps the grammar analyzer with a cache of compiled statements keyed by
//! the raw SQL text, so identical text is not recompiled while a client
//! still holds the compiled statement. Entries whose statements are no
//! longer referenced outside the cache are reclaimed by `sweep()`, normally
//! driven by the background cache sweeper.

use super::Parser;
use super::ast::Statement;
use crate::error::Result;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;

/// Default capacity for the statement cache.
const DEFAULT_CACHE_CAPACITY: usize = 1000;

const FALLBACK_CACHE_CAPACITY: usize = 100;

/// A caching wrapper around the SQL parser.
pub struct CachingParser {
    cache: Mutex<LruCache<String, Arc<Statement>>>,
}

impl CachingParser {
    /// Creates a caching parser with default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }

    /// Creates a caching parser with the given capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity)
            .or(NonZeroUsize::new(FALLBACK_CACHE_CAPACITY))
            .unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Parses SQL with caching. Two compiles of identical text return the
    /// same `Arc` while the entry is live; racing inserts for the same key
    /// are resolved last-write-wins, losers discarded silently.
    pub fn parse(&self, sql: &str) -> Result<Arc<Statement>> {
        let normalized = normalize_sql(sql);

        if let Some(statement) = self.cache.lock().get(&normalized) {
            return Ok(statement.clone());
        }

        // Parse outside the lock; compilation can be slow.
        let statement = Arc::new(Parser::parse(sql)?);
        self.cache.lock().put(normalized, statement.clone());
        Ok(statement)
    }

    /// Drops entries no longer referenced outside the cache. The compiled
    /// statement survives as long as some client holds it; once the last
    /// external reference is gone, the next sweep reclaims the entry.
    pub fn sweep(&self) {
        let mut cache = self.cache.lock();
        let dead: Vec<String> = cache
            .iter()
            .filter(|(_, statement)| Arc::strong_count(statement) == 1)
            .map(|(sql, _)| sql.clone())
            .collect();
        if !dead.is_empty() {
            tracing::debug!(count = dead.len(), "sweeping unreferenced statements");
        }
        for sql in dead {
            cache.pop(&sql);
        }
    }

    pub fn clear(&self) {
        self.cache.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.cache.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.lock().is_empty()
    }
}

impl Default for CachingParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Normalizes SQL for consistent cache keys. Parameterized statements are
/// usually already normalized; trimming avoids the cheap misses.
#[inline]
fn normalize_sql(sql: &str) -> String {
    sql.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_text_returns_the_same_statement_instance() {
        let parser = CachingParser::new();
        let first = parser.parse("SELECT * FROM student").unwrap();
        let second = parser.parse("SELECT * FROM student ").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn sweep_reclaims_unreferenced_entries() {
        let parser = CachingParser::new();
        let statement = parser.parse("SELECT * FROM student").unwrap();
        let watch = Arc::downgrade(&statement);

        // A live external reference keeps the entry across sweeps.
        parser.sweep();
        assert_eq!(parser.len(), 1);
        let again = parser.parse("SELECT * FROM student").unwrap();
        assert!(Arc::ptr_eq(&statement, &again));

        // Once the last external reference is dropped, a sweep reclaims the
        // entry, the old statement is freed, and the next compile produces
        // a fresh instance.
        drop(statement);
        drop(again);
        parser.sweep();
        assert_eq!(parser.len(), 0);
        assert!(watch.upgrade().is_none());
        let fresh = parser.parse("SELECT * FROM student").unwrap();
        assert_eq!(fresh.parameter_count(), 0);
    }

    #[test]
    fn parse_errors_are_not_cached() {
        let parser = CachingParser::new();
        assert!(parser.parse("SELECT DISTINCT * FROM student").is_err());
        assert!(parser.is_empty());
    }
}
