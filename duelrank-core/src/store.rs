/// Storage abstraction for the ranking engine.
///
/// The engine reaches persistence only through these traits, so transports
/// can plug in whatever backend they run on (files, SQL, a remote KV) and
/// multiple server instances can share state through an external store.
/// All engine computation is synchronous, so the traits are too;
/// implementations must be `Send + Sync`.
///
/// In-memory implementations live here as well — the default for tests and
/// for embedding the engine as a plain library.
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::ItemScope;
use crate::errors::EngineResult;
use crate::session::Session;
use crate::types::{GlobalEntry, Item};

/// Per-item contribution of one completed session to the global aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FoldDelta {
    pub item_id: i64,
    pub score: f64,
    pub comparisons: u64,
}

/// Supplies the item universe for sessions.
pub trait CatalogProvider: Send + Sync {
    /// Ordered item list for the scope. The order is the deterministic
    /// tie-break used everywhere downstream.
    fn load_items(&self, scope: ItemScope) -> EngineResult<Vec<Item>>;
}

/// One session slot per user. Persistence format is opaque to the engine.
pub trait SessionStore: Send + Sync {
    fn get(&self, user_id: i64) -> EngineResult<Option<Session>>;
    fn put(&self, user_id: i64, session: &Session) -> EngineResult<()>;
    fn delete(&self, user_id: i64) -> EngineResult<()>;
    /// Users that currently have a stored session (for cleanup sweeps).
    fn user_ids(&self) -> EngineResult<Vec<i64>>;
    /// Retain a superseded or expired session for audit.
    fn archive(&self, session: &Session) -> EngineResult<()>;
}

/// Shared cross-user aggregate.
pub trait GlobalStore: Send + Sync {
    fn read_entries(&self) -> EngineResult<Vec<GlobalEntry>>;
    /// Apply a completed session's deltas at most once. Returns `false`
    /// without applying anything when the session id was already folded.
    /// The already-folded check and the delta application must be atomic.
    fn write_fold(&self, session_id: Uuid, deltas: &[FoldDelta]) -> EngineResult<bool>;
}

/// In-memory catalog provider: a fixed item list plus an optional
/// "unseen by this user" subset per user for `ItemScope::NewForUser`.
pub struct MemoryCatalogProvider {
    items: Vec<Item>,
    new_for_user: Mutex<HashMap<i64, Vec<i64>>>,
}

impl MemoryCatalogProvider {
    pub fn new(items: Vec<Item>) -> Self {
        MemoryCatalogProvider { items, new_for_user: Mutex::new(HashMap::new()) }
    }

    /// Declare which item ids count as new for a user.
    pub fn set_new_for_user(&self, user_id: i64, item_ids: Vec<i64>) {
        self.new_for_user.lock().insert(user_id, item_ids);
    }
}

impl CatalogProvider for MemoryCatalogProvider {
    fn load_items(&self, scope: ItemScope) -> EngineResult<Vec<Item>> {
        match scope {
            ItemScope::All => Ok(self.items.clone()),
            ItemScope::NewForUser(user_id) => {
                let map = self.new_for_user.lock();
                let new_ids: HashSet<i64> =
                    map.get(&user_id).map(|v| v.iter().copied().collect()).unwrap_or_default();
                Ok(self.items.iter().filter(|i| new_ids.contains(&i.id)).cloned().collect())
            }
        }
    }
}

/// In-memory session store.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<i64, Session>>,
    archived: Mutex<Vec<Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn archived(&self) -> Vec<Session> {
        self.archived.lock().clone()
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, user_id: i64) -> EngineResult<Option<Session>> {
        Ok(self.sessions.lock().get(&user_id).cloned())
    }

    fn put(&self, user_id: i64, session: &Session) -> EngineResult<()> {
        self.sessions.lock().insert(user_id, session.clone());
        Ok(())
    }

    fn delete(&self, user_id: i64) -> EngineResult<()> {
        self.sessions.lock().remove(&user_id);
        Ok(())
    }

    fn user_ids(&self) -> EngineResult<Vec<i64>> {
        Ok(self.sessions.lock().keys().copied().collect())
    }

    fn archive(&self, session: &Session) -> EngineResult<()> {
        self.archived.lock().push(session.clone());
        Ok(())
    }
}

/// In-memory global store. One mutex guards both the entry map and the
/// folded-id set, so check-and-mark is atomic by construction.
#[derive(Default)]
pub struct MemoryGlobalStore {
    inner: Mutex<GlobalState>,
}

#[derive(Default)]
struct GlobalState {
    entries: HashMap<i64, GlobalEntry>,
    folded: HashSet<Uuid>,
}

impl MemoryGlobalStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl GlobalStore for MemoryGlobalStore {
    fn read_entries(&self) -> EngineResult<Vec<GlobalEntry>> {
        Ok(self.inner.lock().entries.values().copied().collect())
    }

    fn write_fold(&self, session_id: Uuid, deltas: &[FoldDelta]) -> EngineResult<bool> {
        let mut state = self.inner.lock();
        if !state.folded.insert(session_id) {
            return Ok(false);
        }
        for delta in deltas {
            let entry = state.entries.entry(delta.item_id).or_insert(GlobalEntry {
                item_id: delta.item_id,
                cumulative_score: 0.0,
                cumulative_comparisons: 0,
            });
            entry.cumulative_score += delta.score;
            entry.cumulative_comparisons += delta.comparisons;
        }
        Ok(true)
    }
}

/// Convenience alias used by the session manager.
pub type SharedSessionStore = Arc<dyn SessionStore>;
pub type SharedGlobalStore = Arc<dyn GlobalStore>;
pub type SharedCatalogProvider = Arc<dyn CatalogProvider>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionScope;

    #[test]
    fn test_memory_session_store_roundtrip() {
        let store = MemorySessionStore::new();
        let session = Session::new(42, SessionScope::All, None);
        store.put(42, &session).unwrap();

        let loaded = store.get(42).unwrap().unwrap();
        assert_eq!(loaded.id(), session.id());
        assert_eq!(store.user_ids().unwrap(), vec![42]);

        store.delete(42).unwrap();
        assert!(store.get(42).unwrap().is_none());
    }

    #[test]
    fn test_memory_global_store_folds_once() {
        let store = MemoryGlobalStore::new();
        let sid = Uuid::new_v4();
        let deltas = vec![FoldDelta { item_id: 1, score: 0.5, comparisons: 3 }];

        assert!(store.write_fold(sid, &deltas).unwrap());
        assert!(!store.write_fold(sid, &deltas).unwrap());

        let entries = store.read_entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert!((entries[0].cumulative_score - 0.5).abs() < 1e-12);
        assert_eq!(entries[0].cumulative_comparisons, 3);
    }

    #[test]
    fn test_memory_catalog_provider_scopes() {
        let provider = MemoryCatalogProvider::new(vec![
            Item::new(1, "A"),
            Item::new(2, "B"),
            Item::new(3, "C"),
        ]);
        provider.set_new_for_user(7, vec![3]);

        assert_eq!(provider.load_items(ItemScope::All).unwrap().len(), 3);
        let fresh = provider.load_items(ItemScope::NewForUser(7)).unwrap();
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].id, 3);
        assert!(provider.load_items(ItemScope::NewForUser(8)).unwrap().is_empty());
    }
}
