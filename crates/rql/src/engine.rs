//! Query engine with a bounded parse cache
//!
//! For services that see the same query strings repeatedly:
//! - Parsed (and normalized) trees are cached by the exact query string
//! - The cache is bounded; the oldest entry is evicted first
//! - One engine can be shared across threads

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::ast::core::Node;
use crate::document::DocumentQuery;
use crate::parse::{DEFAULT_MAX_DEPTH, ParseError, ParseOptions};
use crate::translate::{DocumentStore, Translate};
use crate::{RqlError, normalize};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Maximum number of cached trees; 0 disables caching
    pub cache_capacity: usize,
    /// Maximum parenthesis nesting accepted by the parser
    pub max_depth: usize,
    /// Collapse single-child `and`/`or` before caching
    pub normalize: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_capacity: 1024,
            max_depth: DEFAULT_MAX_DEPTH,
            normalize: true,
        }
    }
}

/// Insertion-ordered cache of parsed trees
struct QueryCache {
    capacity: usize,
    entries: RwLock<IndexMap<String, Arc<Node>>>,
}

impl QueryCache {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: RwLock::new(IndexMap::with_capacity(capacity.min(1024))),
        }
    }

    fn get(&self, query: &str) -> Option<Arc<Node>> {
        self.entries.read().get(query).cloned()
    }

    fn insert(&self, query: &str, node: Arc<Node>) {
        if self.capacity == 0 {
            return;
        }
        let mut entries = self.entries.write();
        // another caller may have parsed the same query meanwhile
        if entries.contains_key(query) {
            return;
        }
        while entries.len() >= self.capacity {
            match entries.shift_remove_index(0) {
                Some((evicted, _)) => log::debug!("query cache evicted {evicted:?}"),
                None => break,
            }
        }
        entries.insert(query.to_string(), node);
    }

    fn len(&self) -> usize {
        self.entries.read().len()
    }

    fn clear(&self) {
        self.entries.write().clear();
    }
}

/// Parses, caches and translates RQL queries
///
/// # Example
///
/// ```
/// use rql::{EngineConfig, QueryEngine};
///
/// let engine = QueryEngine::new(EngineConfig::default());
/// let query = engine.translate("price=lt=10&sort(-price)").unwrap();
/// assert_eq!(query.sort.get("price"), Some(&-1));
/// assert_eq!(engine.cache_len(), 1);
/// ```
pub struct QueryEngine {
    config: EngineConfig,
    cache: QueryCache,
}

impl Default for QueryEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl QueryEngine {
    pub fn new(config: EngineConfig) -> Self {
        let cache = QueryCache::new(config.cache_capacity);
        Self { config, cache }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Parse a query, returning the cached tree when the exact string was seen before
    pub fn parse(&self, query: &str) -> Result<Arc<Node>, ParseError> {
        if let Some(node) = self.cache.get(query) {
            log::debug!("query cache hit for {query:?}");
            return Ok(node);
        }
        log::debug!("query cache miss for {query:?}");

        let options = ParseOptions {
            max_depth: self.config.max_depth,
        };
        let node = crate::parse_with(query, &options)?;
        let node = if self.config.normalize {
            normalize(node)
        } else {
            node
        };

        let node = Arc::new(node);
        self.cache.insert(query, Arc::clone(&node));
        Ok(node)
    }

    /// Translate a query into a document-store query.
    /// An empty query matches everything.
    pub fn translate(&self, query: &str) -> Result<DocumentQuery, RqlError> {
        self.translate_with(query, &DocumentStore)
    }

    /// Translate with any backend
    pub fn translate_with<T>(&self, query: &str, backend: &T) -> Result<T::Output, RqlError>
    where
        T: Translate,
        T::Output: Default,
    {
        if query.trim().is_empty() {
            return Ok(T::Output::default());
        }
        let node = self.parse(query)?;
        Ok(backend.translate(&node)?)
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }
}
