//! # Result Cache
//!
//! Memoizes parse results by a key derived from the input text. Entries are
//! evicted in insertion order (FIFO) once `capacity` is reached; a capacity of
//! zero stores nothing.
//!
//! Keys are `(byte length, FNV-1a 64)`. Under
//! [`CacheKeyStrategy::Fingerprint`] the hash covers only the first
//! [`FINGERPRINT_CHARS`] characters, so equal-length texts sharing that prefix
//! collide.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use crate::{node::ParseResult, options::CacheKeyStrategy};

/// Characters hashed by the fingerprint strategy.
pub const FINGERPRINT_CHARS: usize = 100;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// FNV-1a, 64-bit.
pub fn fnv1a64(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET, |h, &b| {
        (h ^ u64::from(b)).wrapping_mul(FNV_PRIME)
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    len: usize,
    hash: u64,
}

impl CacheKey {
    pub fn new(text: &str, strategy: CacheKeyStrategy) -> Self {
        let hashed = match strategy {
            CacheKeyStrategy::ContentHash => text,
            CacheKeyStrategy::Fingerprint => match text.char_indices().nth(FINGERPRINT_CHARS) {
                Some((cut, _)) => &text[..cut],
                None => text,
            },
        };
        Self {
            len: text.len(),
            hash: fnv1a64(hashed.as_bytes()),
        }
    }
}

#[derive(Debug)]
pub struct ResultCache {
    entries: HashMap<CacheKey, Arc<ParseResult>>,
    order: VecDeque<CacheKey>,
    capacity: usize,
    hits: u64,
    misses: u64,
}

impl ResultCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::with_capacity(capacity.min(1024)),
            order: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
            hits: 0,
            misses: 0,
        }
    }

    pub fn get(&mut self, key: &CacheKey) -> Option<Arc<ParseResult>> {
        match self.entries.get(key) {
            Some(hit) => {
                self.hits += 1;
                Some(Arc::clone(hit))
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    pub fn insert(&mut self, key: CacheKey, result: Arc<ParseResult>) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.insert(key, result).is_some() {
            return;
        }
        self.order.push_back(key);
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
                log::debug!("evicted cached parse result ({} bytes)", oldest.len);
            }
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
        self.hits = 0;
        self.misses = 0;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `(hits, misses)` since creation or the last `clear`.
    pub fn stats(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn result(count: u32) -> Arc<ParseResult> {
        Arc::new(ParseResult {
            nodes: vec![],
            parse_time_ms: 0.0,
            node_count: count,
            memory_used: 0,
        })
    }

    fn key(text: &str) -> CacheKey {
        CacheKey::new(text, CacheKeyStrategy::ContentHash)
    }

    #[rstest]
    #[case(b"", 0xcbf2_9ce4_8422_2325)]
    #[case(b"a", 0xaf63_dc4c_8601_ec8c)]
    #[case(b"foobar", 0x85944171f73967e8)]
    fn fnv_reference_vectors(#[case] input: &[u8], #[case] expected: u64) {
        assert_eq!(fnv1a64(input), expected);
    }

    #[test]
    fn hit_returns_shared_result() {
        let mut cache = ResultCache::new(4);
        let stored = result(1);
        cache.insert(key("a"), Arc::clone(&stored));
        let hit = cache.get(&key("a")).unwrap();
        assert!(Arc::ptr_eq(&hit, &stored));
        assert_eq!(cache.stats(), (1, 0));
    }

    #[test]
    fn evicts_oldest_first() {
        let mut cache = ResultCache::new(2);
        cache.insert(key("a"), result(1));
        cache.insert(key("b"), result(2));
        cache.get(&key("a"));
        cache.insert(key("c"), result(3));

        assert_eq!(cache.len(), 2);
        assert!(cache.get(&key("a")).is_none(), "FIFO ignores recent reads");
        assert!(cache.get(&key("b")).is_some());
        assert!(cache.get(&key("c")).is_some());
    }

    #[test]
    fn reinserting_does_not_grow_order() {
        let mut cache = ResultCache::new(2);
        cache.insert(key("a"), result(1));
        cache.insert(key("a"), result(2));
        cache.insert(key("b"), result(3));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&key("a")).unwrap().node_count, 2);
    }

    #[test]
    fn zero_capacity_stores_nothing() {
        let mut cache = ResultCache::new(0);
        cache.insert(key("a"), result(1));
        assert!(cache.is_empty());
    }

    #[test]
    fn clear_resets_entries_and_stats() {
        let mut cache = ResultCache::new(2);
        cache.insert(key("a"), result(1));
        cache.get(&key("a"));
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.stats(), (0, 0));
    }

    #[test]
    fn content_hash_separates_shared_prefixes() {
        let prefix = "x".repeat(FINGERPRINT_CHARS);
        let a = format!("{prefix}aaaa");
        let b = format!("{prefix}bbbb");
        assert_ne!(
            CacheKey::new(&a, CacheKeyStrategy::ContentHash),
            CacheKey::new(&b, CacheKeyStrategy::ContentHash)
        );
    }

    #[test]
    fn fingerprint_collides_on_shared_prefix_and_length() {
        let prefix = "x".repeat(FINGERPRINT_CHARS);
        let a = format!("{prefix}aaaa");
        let b = format!("{prefix}bbbb");
        assert_eq!(
            CacheKey::new(&a, CacheKeyStrategy::Fingerprint),
            CacheKey::new(&b, CacheKeyStrategy::Fingerprint)
        );
        assert_ne!(
            CacheKey::new(&a, CacheKeyStrategy::Fingerprint),
            CacheKey::new(&format!("{a}!"), CacheKeyStrategy::Fingerprint),
            "length still separates keys"
        );
    }

    #[test]
    fn fingerprint_counts_characters_not_bytes() {
        let prefix = "é".repeat(FINGERPRINT_CHARS);
        let a = format!("{prefix}a");
        let b = format!("{prefix}b");
        assert_eq!(
            CacheKey::new(&a, CacheKeyStrategy::Fingerprint),
            CacheKey::new(&b, CacheKeyStrategy::Fingerprint)
        );
    }
}
