use super::parser::{ParseResult, QueryOptions, parse_query_with};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::trace;

pub const DEFAULT_CACHE_CAPACITY: usize = 64;

/// LRU of parse results keyed by the exact query text and a dataset version.
///
/// Keys are never normalized: `Girl` and `girl` are cached separately. Bump
/// the version, or call [`ParseCache::invalidate`], whenever the post set
/// changes.
pub struct ParseCache {
    entries: LruCache<(String, u64), Arc<ParseResult>>,
    options: QueryOptions,
}

impl ParseCache {
    pub fn new(capacity: usize, options: QueryOptions) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        ParseCache {
            entries: LruCache::new(capacity),
            options,
        }
    }

    pub fn options(&self) -> QueryOptions {
        self.options
    }

    pub fn get_or_parse(&mut self, query: &str, version: u64) -> Arc<ParseResult> {
        let key = (query.to_string(), version);
        if let Some(hit) = self.entries.get(&key) {
            trace!(query = query, version = version, "parse cache hit");
            return Arc::clone(hit);
        }

        trace!(query = query, version = version, "parse cache miss");
        let result = Arc::new(parse_query_with(query, &self.options));
        self.entries.put(key, Arc::clone(&result));
        result
    }

    pub fn invalidate(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }
}

impl Default for ParseCache {
    fn default() -> Self {
        ParseCache::new(DEFAULT_CACHE_CAPACITY, QueryOptions::default())
    }
}
