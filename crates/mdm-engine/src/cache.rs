//! The optional ad-hoc cache described in §5/§9: keyed by
//! `mdm.master.<localKey>`, caching the current `MasterRecord` relationship
//! for a LOCAL. Every Data Manager operation that deletes or rewrites such a
//! relationship invalidates the corresponding entry before commit.

use mdm_types::RecordKey;

#[must_use]
pub fn cache_key(local: RecordKey) -> String {
    format!("mdm.master.{local}")
}

/// A cache of `local -> current master` lookups. Not required for
/// correctness — every path that would read from it also falls back to the
/// persistence service — only for avoiding repeat round-trips.
pub trait MasterLinkCache: Send + Sync {
    fn get(&self, local: RecordKey) -> Option<RecordKey>;

    fn set(&self, local: RecordKey, master: RecordKey);

    /// Must be called before commit for any transaction that deletes or
    /// rewrites the `MasterRecord` relationship for `local` (§5).
    fn invalidate(&self, local: RecordKey);
}

/// An in-process cache backed by a `Mutex<HashMap>`, suitable for a single
/// engine instance. Multi-node deployments would swap this for a shared
/// cache behind the same trait.
#[derive(Debug, Default)]
pub struct InMemoryMasterLinkCache {
    entries: std::sync::Mutex<std::collections::HashMap<RecordKey, RecordKey>>,
}

impl InMemoryMasterLinkCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl MasterLinkCache for InMemoryMasterLinkCache {
    fn get(&self, local: RecordKey) -> Option<RecordKey> {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(&local)
            .copied()
    }

    fn set(&self, local: RecordKey, master: RecordKey) {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(local, master);
    }

    fn invalidate(&self, local: RecordKey) {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .remove(&local);
    }
}
