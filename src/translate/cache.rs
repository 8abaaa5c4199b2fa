//! In-memory translation response cache with TTL and a bounded entry count.
//! Key: blake3 hash of (user id | source lang | target lang | content
//! fingerprint), partitioned per user so identical text never crosses
//! accounts. Volatile; losing it only costs a provider call.

use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use lru::LruCache;
use parking_lot::Mutex;

/// Cached provider response. Carries no source text; only the one-way
/// fingerprint of the text ever enters the key.
#[derive(Debug, Clone)]
pub struct CachedTranslation {
    pub translated_text: String,
    pub provider: String,
    pub detected_source_lang: Option<String>,
}

struct Entry {
    value: CachedTranslation,
    inserted_at: Instant,
}

pub struct TranslationCache {
    inner: Mutex<LruCache<[u8; 32], Entry>>,
    ttl: Duration,
}

impl TranslationCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(LruCache::new(
                NonZeroUsize::new(capacity).expect("cache capacity must be > 0"),
            )),
            ttl,
        }
    }

    /// Compute the cache key. The user id is a key component, not an
    /// optimization: cross-user sharing of cached text is forbidden.
    pub fn compute_key(
        user_id: &str,
        source_lang: &str,
        target_lang: &str,
        fingerprint: &str,
    ) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new();
        hasher.update(user_id.as_bytes());
        hasher.update(b"|");
        hasher.update(source_lang.as_bytes());
        hasher.update(b"|");
        hasher.update(target_lang.as_bytes());
        hasher.update(b"|");
        hasher.update(fingerprint.as_bytes());
        *hasher.finalize().as_bytes()
    }

    /// Look up a cached translation. Returns None if absent or expired.
    pub fn get(&self, key: &[u8; 32]) -> Option<CachedTranslation> {
        let mut cache = self.inner.lock();
        if let Some(entry) = cache.get(key) {
            if entry.inserted_at.elapsed() < self.ttl {
                return Some(entry.value.clone());
            }
            // Lazy expiry: a stale entry is dropped by the read that finds it.
            cache.pop(key);
        }
        None
    }

    /// Insert a translation, overwriting any existing entry and restamping
    /// its TTL. The capacity bound evicts least-recently-used entries.
    pub fn insert(&self, key: [u8; 32], value: CachedTranslation) {
        let mut cache = self.inner.lock();
        cache.put(
            key,
            Entry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }
}

/// One-way content fingerprint over (secret, text). The secret keeps hashes
/// unlinkable across deployments; the raw text is never hashed alone.
pub fn content_fingerprint(secret: &str, text: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(secret.as_bytes());
    hasher.update(b"|");
    hasher.update(text.as_bytes());
    hasher.finalize().to_hex().to_string()
}
