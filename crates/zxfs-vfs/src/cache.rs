//! Handle cache keyed by canonical namespace URI.
//!
//! Uses DashMap so lookups and inserts from many threads never contend on a
//! single lock, and never on the model's locks. Raw URI spellings (trailing
//! slash, dot segments, percent-encoding variants) are folded onto the
//! canonical key through a separate alias table. That table is bounded by
//! [`MAX_ALIASES`] and is dropped wholesale once full; a dropped alias only
//! costs a re-parse.

use std::sync::Arc;

use dashmap::DashMap;

use crate::handle::StoreHandle;
use crate::path::NamespacePath;

/// Upper bound on remembered raw spellings
pub const MAX_ALIASES: usize = 4096;

/// Memoized handles, shared by every resolver call
pub struct HandleCache {
    /// canonical uri -> handle
    handles: DashMap<String, Arc<StoreHandle>>,
    /// raw uri as given by a caller -> parsed path
    aliases: DashMap<String, NamespacePath>,
}

impl HandleCache {
    pub fn new() -> Self {
        Self {
            handles: DashMap::new(),
            aliases: DashMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<Arc<StoreHandle>> {
        self.handles.get(key).map(|r| Arc::clone(&r))
    }

    /// Inserts `handle` unless another thread got there first.
    ///
    /// Returns whichever handle ends up cached, so concurrent resolutions of
    /// one key converge on a single instance.
    pub fn insert(&self, key: String, handle: Arc<StoreHandle>) -> Arc<StoreHandle> {
        Arc::clone(&self.handles.entry(key).or_insert(handle))
    }

    /// Unconditionally replaces the cached handle for `key`.
    pub fn replace(&self, key: String, handle: Arc<StoreHandle>) -> Arc<StoreHandle> {
        self.handles.insert(key, Arc::clone(&handle));
        handle
    }

    /// Parsed path previously recorded for a raw uri
    pub fn alias(&self, raw: &str) -> Option<NamespacePath> {
        self.aliases.get(raw).map(|r| r.value().clone())
    }

    pub fn add_alias(&self, raw: impl Into<String>, path: NamespacePath) {
        if self.aliases.len() >= MAX_ALIASES {
            self.aliases.clear();
        }
        self.aliases.insert(raw.into(), path);
    }

    /// Number of remembered raw spellings
    pub fn alias_count(&self) -> usize {
        self.aliases.len()
    }

    pub fn remove(&self, key: &str) -> Option<Arc<StoreHandle>> {
        self.handles.remove(key).map(|(_, handle)| handle)
    }

    /// Number of cached handles
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn clear(&self) {
        self.handles.clear();
        self.aliases.clear();
    }
}

impl Default for HandleCache {
    fn default() -> Self {
        Self::new()
    }
}
