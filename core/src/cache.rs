//! Bounded TTL cache with a distinct tombstone TTL
//!
//! Key→value storage used for OIDC anti-replay state (nonce → expected state)
//! and for ephemeral download-link tokens. A key stored as `None` is a
//! tombstone: `get` reports it as absent, but the entry occupies the map
//! until the tombstone TTL elapses. Consuming a nonce therefore leaves a
//! "already used" marker behind instead of erasing it, and a replay inside
//! that window is rejected the same way as a never-issued nonce.
//!
//! Caches are constructed once by the composition root and passed by
//! reference into handlers; there is no global instance to initialize.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use log::info;

use crate::platform::Clock;

/// Nonce → expected OIDC state
pub type OidcStateCache = TtlCache<String>;

/// Ephemeral download token → upstream file URL
pub type DownloadTokenCache = TtlCache<String>;

struct CacheEntry<V> {
    value: Option<V>,
    expires_at: u64,
}

/// Capacity-bounded, time-expiring key→value store
pub struct TtlCache<V> {
    ttl_secs: u64,
    null_ttl_secs: u64,
    capacity: usize,
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl_secs: u64, null_ttl_secs: u64, capacity: usize) -> Self {
        info!(
            "ttl cache created: ttl={}s, null_ttl={}s, capacity={}",
            ttl_secs, null_ttl_secs, capacity
        );

        Self {
            ttl_secs,
            null_ttl_secs,
            capacity,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Look up a key. Absent, expired, and tombstoned keys are all `None`;
    /// expired entries are purged on access. A value is never returned at or
    /// past its expiry instant.
    pub fn get(&self, key: &str, clock: &dyn Clock) -> Option<V> {
        let now = clock.now_secs();
        let mut entries = self.lock();

        match entries.get(key) {
            Some(entry) if entry.expires_at <= now => {
                entries.remove(key);
                None
            }
            Some(entry) => entry.value.clone(),
            None => None,
        }
    }

    /// Insert or overwrite a key. `None` is stored as a tombstone with the
    /// tombstone TTL; any other value uses the normal TTL.
    ///
    /// Eviction when inserting a new key into a full map is deterministic:
    /// expired entries go first, then the entry with the earliest expiry
    /// (ties broken by key order). Not LRU.
    pub fn put(&self, key: &str, value: Option<V>, clock: &dyn Clock) {
        if self.capacity == 0 {
            return;
        }

        let now = clock.now_secs();
        let expires_at = now
            + if value.is_none() {
                self.null_ttl_secs
            } else {
                self.ttl_secs
            };

        let mut entries = self.lock();

        if !entries.contains_key(key) && entries.len() >= self.capacity {
            entries.retain(|_, entry| entry.expires_at > now);
        }

        while !entries.contains_key(key) && entries.len() >= self.capacity {
            let victim = entries
                .iter()
                .min_by(|(key_a, a), (key_b, b)| {
                    a.expires_at.cmp(&b.expires_at).then_with(|| key_a.cmp(key_b))
                })
                .map(|(k, _)| k.clone());

            match victim {
                Some(k) => {
                    entries.remove(&k);
                }
                None => break,
            }
        }

        entries.insert(key.to_string(), CacheEntry { value, expires_at });
    }

    /// Number of live entries, including unexpired tombstones
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, CacheEntry<V>>> {
        // A poisoned lock only means another request panicked mid-operation;
        // the map itself is still structurally sound.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
