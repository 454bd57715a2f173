//! Shared cache of resolved action references.
//!
//! Keys are `(language, framework, action)` triples so that a framework can
//! pin an action differently from the language default. Lookups take the
//! read lock; a miss resolves outside the lock and inserts with
//! `entry().or_insert`, so racing writers agree on the first value.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use super::catalog::ActionRef;

/// Cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TemplateKey {
    pub language: String,
    pub framework: String,
    pub action: String,
}

impl TemplateKey {
    pub fn new(
        language: impl Into<String>,
        framework: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self { language: language.into(), framework: framework.into(), action: action.into() }
    }
}

/// Hit/miss counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

/// Thread-safe action reference cache.
#[derive(Debug, Default)]
pub struct TemplateCache {
    entries: RwLock<HashMap<TemplateKey, ActionRef>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

static GLOBAL: Lazy<Arc<TemplateCache>> = Lazy::new(|| Arc::new(TemplateCache::new()));

impl TemplateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide cache shared by every engine that does not bring its own.
    pub fn global() -> Arc<TemplateCache> {
        Arc::clone(&GLOBAL)
    }

    /// Return the cached reference or resolve and store it.
    pub fn resolve<F>(&self, key: TemplateKey, resolver: F) -> ActionRef
    where
        F: FnOnce() -> ActionRef,
    {
        if let Some(found) = self.entries.read().get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return found.clone();
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let resolved = resolver();
        self.entries.write().entry(key).or_insert(resolved).clone()
    }

    /// Cached reference without resolving.
    pub fn get(&self, key: &TemplateKey) -> Option<ActionRef> {
        self.entries.read().get(key).cloned()
    }

    /// Insert or replace a reference.
    pub fn insert(&self, key: TemplateKey, action: ActionRef) {
        self.entries.write().insert(key, action);
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }
}
