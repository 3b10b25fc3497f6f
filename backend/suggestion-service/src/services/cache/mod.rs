//! Single-slot result cache for the suggestion engine
//!
//! Only the most recent computation is retained. The key is
//! `(surface, item count, library fingerprint, context fingerprint)`;
//! an entry older than the TTL is recomputed and replaced.
//!
//! The TTL is measured against the caller-supplied `now`, so tests can
//! drive expiry without sleeping.

use crate::config::EngineConfig;
use crate::models::{Context, Item, Suggestion, Surface};
use crate::services::engine::SuggestionEngine;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey {
    pub surface: Surface,
    pub item_count: usize,
    pub library_hash: String,
    pub context_hash: String,
}

impl CacheKey {
    pub fn new(items: &[Item], context: &Context) -> Self {
        Self {
            surface: context.surface,
            item_count: items.len(),
            library_hash: library_fingerprint(items),
            context_hash: context_fingerprint(context),
        }
    }
}

struct CacheEntry {
    key: CacheKey,
    computed_at: DateTime<Utc>,
    suggestion: Suggestion,
}

/// Snapshot of cache counters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub expirations: u64,
}

/// Thread-safe memoizing wrapper around [`SuggestionEngine`]
pub struct CachedSuggestionEngine {
    engine: SuggestionEngine,
    ttl: Duration,
    slot: Mutex<Option<CacheEntry>>,
    hits: AtomicU64,
    misses: AtomicU64,
    expirations: AtomicU64,
}

impl Default for CachedSuggestionEngine {
    fn default() -> Self {
        Self::new(SuggestionEngine::new())
    }
}

impl CachedSuggestionEngine {
    pub fn new(engine: SuggestionEngine) -> Self {
        let ttl = engine.config().cache_ttl();
        Self {
            engine,
            ttl,
            slot: Mutex::new(None),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            expirations: AtomicU64::new(0),
        }
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self::new(SuggestionEngine::with_config(config))
    }

    /// Override the TTL
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn engine(&self) -> &SuggestionEngine {
        &self.engine
    }

    pub fn suggest(&self, items: &[Item], context: &Context, now: DateTime<Utc>) -> Vec<Item> {
        self.suggest_with_stats(items, context, now).items
    }

    /// Cached result when key matches and the entry is fresh, else recompute
    pub fn suggest_with_stats(
        &self,
        items: &[Item],
        context: &Context,
        now: DateTime<Utc>,
    ) -> Suggestion {
        let key = CacheKey::new(items, context);

        // Held across compare and recompute so concurrent callers never race
        let mut slot = self.slot.lock();

        if let Some(entry) = slot.as_ref() {
            if entry.key == key {
                let age = now - entry.computed_at;
                if age >= Duration::zero() && age < self.ttl {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    debug!(
                        surface = key.surface.as_str(),
                        age_secs = age.num_seconds(),
                        "Suggestion cache hit"
                    );
                    return entry.suggestion.clone();
                }
                self.expirations.fetch_add(1, Ordering::Relaxed);
                debug!(
                    surface = key.surface.as_str(),
                    age_secs = age.num_seconds(),
                    "Suggestion cache entry expired"
                );
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!(
            surface = key.surface.as_str(),
            item_count = key.item_count,
            "Suggestion cache miss"
        );

        let suggestion = self.engine.suggest_with_stats(items, context, now);
        *slot = Some(CacheEntry {
            key,
            computed_at: now,
            suggestion: suggestion.clone(),
        });

        suggestion
    }

    /// Drop the cached entry
    pub fn invalidate(&self) {
        *self.slot.lock() = None;
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
        }
    }
}

/// SHA-256 over every ranking-relevant field of every item, in input order.
/// Every variable-length list is length-prefixed, so the byte stream parses
/// back into exactly one library.
pub fn library_fingerprint(items: &[Item]) -> String {
    let mut hasher = Sha256::new();
    hasher.update((items.len() as u64).to_le_bytes());
    for item in items {
        hasher.update(item.id.as_bytes());
        hasher.update(item.use_count.to_le_bytes());
        hasher.update(item.view_count.to_le_bytes());
        hasher.update([item.is_favorite as u8]);
        let last_viewed = item.last_viewed_at.map(|t| t.timestamp_millis()).unwrap_or(i64::MIN);
        hasher.update(last_viewed.to_le_bytes());
        hasher.update(item.imported_at.timestamp_millis().to_le_bytes());
        for text in [&item.title, &item.description, &item.text_content] {
            match text {
                Some(text) => {
                    hasher.update([1u8]);
                    update_str(&mut hasher, text);
                }
                None => hasher.update([0u8]),
            }
        }
        hasher.update((item.tags.len() as u64).to_le_bytes());
        for tag in &item.tags {
            update_str(&mut hasher, &tag.id);
            update_str(&mut hasher, &tag.name);
            hasher.update((tag.keywords.len() as u64).to_le_bytes());
            for keyword in &tag.keywords {
                update_str(&mut hasher, keyword);
            }
        }
    }
    hex::encode(hasher.finalize())
}

/// SHA-256 over the context; previous-session ids are already sorted
pub fn context_fingerprint(context: &Context) -> String {
    let mut hasher = Sha256::new();
    update_str(&mut hasher, context.surface.as_str());
    update_str(&mut hasher, context.active_filter.as_deref().unwrap_or_default());
    hasher.update((context.recent_queries.len() as u64).to_le_bytes());
    for query in &context.recent_queries {
        update_str(&mut hasher, query);
    }
    hasher.update((context.previous_session.len() as u64).to_le_bytes());
    for id in &context.previous_session {
        hasher.update(id.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Length-prefixed so that ("ab", "c") and ("a", "bc") differ
fn update_str(hasher: &mut Sha256, value: &str) {
    hasher.update((value.len() as u64).to_le_bytes());
    hasher.update(value.as_bytes());
}
