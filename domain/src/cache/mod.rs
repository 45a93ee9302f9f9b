//! Per-run memo of read-only call results.
//!
//! Entries are keyed by the same fingerprint the ledger uses. Staleness is
//! measured in run decisions, never wall-clock time, so replaying the same
//! call sequence always yields the same hits.

use crate::core::ids::CallEventId;
use crate::ledger::IdempotencyKey;
use crate::policy::CachePolicy;
use serde_json::Value;
use std::collections::HashMap;

/// A stored result and where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedEntry {
    pub result: Value,
    pub source_call: CallEventId,
    /// Decision sequence number at which the entry was stored.
    pub stored_at_seq: u64,
}

#[derive(Debug, Default)]
pub struct CallCache {
    enabled: bool,
    ttl_calls: Option<u64>,
    entries: HashMap<IdempotencyKey, CachedEntry>,
}

impl CallCache {
    pub fn new(policy: CachePolicy) -> Self {
        Self {
            enabled: policy.enabled,
            ttl_calls: policy.ttl_calls,
            entries: HashMap::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Fresh entry for `key` as of decision `now_seq`.
    pub fn lookup(&self, key: &IdempotencyKey, now_seq: u64) -> Option<&CachedEntry> {
        if !self.enabled {
            return None;
        }
        self.entries
            .get(key)
            .filter(|entry| !self.is_stale(entry, now_seq))
    }

    pub fn store(
        &mut self,
        key: IdempotencyKey,
        result: Value,
        source_call: CallEventId,
        now_seq: u64,
    ) {
        if !self.enabled {
            return;
        }
        self.entries.insert(
            key,
            CachedEntry {
                result,
                source_call,
                stored_at_seq: now_seq,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn is_stale(&self, entry: &CachedEntry, now_seq: u64) -> bool {
        match self.ttl_calls {
            Some(ttl) => now_seq.saturating_sub(entry.stored_at_seq) > ttl,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::KeyDeriver;
    use serde_json::json;

    fn key(q: &str) -> IdempotencyKey {
        KeyDeriver::new(None).derive("search_kb", &json!({ "query": q }))
    }

    #[test]
    fn test_hit_after_store() {
        let mut cache = CallCache::new(CachePolicy::default());
        cache.store(key("a"), json!(["doc1"]), CallEventId::new("r#1"), 1);
        let hit = cache.lookup(&key("a"), 50).unwrap();
        assert_eq!(hit.result, json!(["doc1"]));
        assert_eq!(hit.source_call.as_str(), "r#1");
        assert!(cache.lookup(&key("b"), 2).is_none());
    }

    #[test]
    fn test_ttl_counts_decisions() {
        let mut cache = CallCache::new(CachePolicy {
            enabled: true,
            ttl_calls: Some(3),
        });
        cache.store(key("a"), json!(1), CallEventId::new("r#1"), 1);
        assert!(cache.lookup(&key("a"), 4).is_some());
        assert!(cache.lookup(&key("a"), 5).is_none());
    }

    #[test]
    fn test_disabled_cache_never_hits() {
        let mut cache = CallCache::new(CachePolicy {
            enabled: false,
            ttl_calls: None,
        });
        cache.store(key("a"), json!(1), CallEventId::new("r#1"), 1);
        assert!(cache.is_empty());
        assert!(cache.lookup(&key("a"), 2).is_none());
    }
}
