//! Verification key cache.
//!
//! # Responsibilities
//! - Hold the current key id → PEM mapping
//! - Publish new mappings atomically
//! - Serve lock-free snapshots to concurrent verifiers

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;

use crate::observability::metrics;

/// Cache lifetime assumed when the endpoint does not state one.
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(3600);

/// One complete, immutable generation of verification keys.
#[derive(Debug, Clone)]
pub struct KeySet {
    keys: HashMap<String, String>,
    max_age: Duration,
    fetched_at: Option<Instant>,
}

impl KeySet {
    /// The set served before the first successful fetch.
    pub fn empty() -> Self {
        Self {
            keys: HashMap::new(),
            max_age: DEFAULT_MAX_AGE,
            fetched_at: None,
        }
    }

    pub fn new(keys: HashMap<String, String>, max_age: Duration) -> Self {
        Self {
            keys,
            max_age,
            fetched_at: Some(Instant::now()),
        }
    }

    /// PEM material for `kid`.
    pub fn get(&self, kid: &str) -> Option<&str> {
        self.keys.get(kid).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.keys.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn key_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.keys.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    /// When this set was fetched, `None` for the initial empty set.
    pub fn fetched_at(&self) -> Option<Instant> {
        self.fetched_at
    }
}

impl Default for KeySet {
    fn default() -> Self {
        Self::empty()
    }
}

/// Process-wide store of verification keys.
///
/// The refresh task is the only writer; it swaps in a whole new [`KeySet`]
/// so readers always see one consistent generation.
#[derive(Debug)]
pub struct KeyCache {
    current: ArcSwap<KeySet>,
}

impl KeyCache {
    pub fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(KeySet::empty()),
        }
    }

    /// The current generation. Holding it pins that generation in memory.
    pub fn snapshot(&self) -> Arc<KeySet> {
        self.current.load_full()
    }

    pub fn get(&self, kid: &str) -> Option<String> {
        self.current.load().get(kid).map(str::to_owned)
    }

    /// Publish a new generation, replacing the previous one wholesale.
    pub fn replace(&self, keys: KeySet) {
        let count = keys.len();
        self.current.store(Arc::new(keys));
        metrics::record_keys_cached(count);
    }

    pub fn len(&self) -> usize {
        self.current.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.load().is_empty()
    }
}

impl Default for KeyCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn generation(n: usize, width: usize) -> KeySet {
        let keys = (0..width)
            .map(|i| (format!("kid-{}", i), format!("gen-{}", n)))
            .collect();
        KeySet::new(keys, Duration::from_secs(60))
    }

    #[test]
    fn test_starts_empty() {
        let cache = KeyCache::new();
        assert!(cache.is_empty());
        assert!(cache.snapshot().fetched_at().is_none());
        assert_eq!(cache.snapshot().max_age(), DEFAULT_MAX_AGE);
        assert!(cache.get("anything").is_none());
    }

    #[test]
    fn test_replace_is_wholesale() {
        let cache = KeyCache::new();
        cache.replace(KeySet::new(
            HashMap::from([("a".to_string(), "pem-a".to_string())]),
            Duration::from_secs(10),
        ));
        assert_eq!(cache.get("a").as_deref(), Some("pem-a"));

        cache.replace(KeySet::new(
            HashMap::from([("b".to_string(), "pem-b".to_string())]),
            Duration::from_secs(10),
        ));
        assert!(cache.get("a").is_none());
        assert_eq!(cache.snapshot().key_ids(), vec!["b"]);
    }

    #[test]
    fn test_old_snapshot_survives_replace() {
        let cache = KeyCache::new();
        cache.replace(generation(1, 3));
        let held = cache.snapshot();
        cache.replace(generation(2, 3));
        assert_eq!(held.get("kid-0"), Some("gen-1"));
        assert_eq!(cache.get("kid-0").as_deref(), Some("gen-2"));
    }

    #[test]
    fn test_readers_never_see_mixed_generations() {
        let cache = Arc::new(KeyCache::new());
        cache.replace(generation(0, 16));
        let done = Arc::new(AtomicBool::new(false));

        let readers: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                let done = done.clone();
                std::thread::spawn(move || {
                    let mut observed = 0usize;
                    loop {
                        let snap = cache.snapshot();
                        assert_eq!(snap.len(), 16);
                        let first = snap.get("kid-0").unwrap().to_string();
                        for (_, pem) in snap.iter() {
                            assert_eq!(pem, first, "snapshot mixes generations");
                        }
                        observed += 1;
                        if done.load(Ordering::Acquire) {
                            break observed;
                        }
                    }
                })
            })
            .collect();

        for n in 1..2_000 {
            cache.replace(generation(n, 16));
        }
        done.store(true, Ordering::Release);

        for reader in readers {
            assert!(reader.join().unwrap() > 0);
        }
        assert_eq!(cache.get("kid-15").as_deref(), Some("gen-1999"));
    }
}
