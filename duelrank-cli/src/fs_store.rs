/// JSON-file-backed stores for the CLI.
///
/// Sessions, the audit archive, the rated-items map, and the global
/// aggregate all survive process restarts. Saves go through a temp file
/// plus rename, so a crash mid-save never truncates existing state.
///
/// One file per concern inside the data directory:
///   sessions.json — active session per user id
///   archive.json  — superseded and expired sessions
///   rated.json    — item ids each user has fully rated
///   global.json   — cumulative scores plus the folded-session guard
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use duelrank_core::{
    CatalogProvider, EngineError, EngineResult, FoldDelta, GlobalEntry, GlobalStore, Item,
    ItemScope, Session, SessionStore,
};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

fn store_err(e: impl std::fmt::Display) -> EngineError {
    EngineError::Store(e.to_string())
}

fn load_json_or_default<T: DeserializeOwned + Default>(path: &Path) -> EngineResult<T> {
    match fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content).map_err(store_err),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
        Err(e) => Err(store_err(e)),
    }
}

fn save_json<T: Serialize>(path: &Path, value: &T) -> EngineResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(store_err)?;
    }
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, serde_json::to_string_pretty(value).map_err(store_err)?).map_err(store_err)?;
    fs::rename(&tmp, path).map_err(store_err)?;
    Ok(())
}

/// Session store persisted under `<data_dir>/sessions.json`, with an
/// append-style audit archive in `archive.json`.
pub struct FsSessionStore {
    sessions_path: PathBuf,
    archive_path: PathBuf,
    sessions: Mutex<HashMap<i64, Session>>,
}

impl FsSessionStore {
    pub fn open(data_dir: &Path) -> EngineResult<Self> {
        let sessions_path = data_dir.join("sessions.json");
        let sessions = load_json_or_default(&sessions_path)?;
        Ok(FsSessionStore {
            sessions_path,
            archive_path: data_dir.join("archive.json"),
            sessions: Mutex::new(sessions),
        })
    }
}

impl SessionStore for FsSessionStore {
    fn get(&self, user_id: i64) -> EngineResult<Option<Session>> {
        Ok(self.sessions.lock().get(&user_id).cloned())
    }

    fn put(&self, user_id: i64, session: &Session) -> EngineResult<()> {
        let mut map = self.sessions.lock();
        map.insert(user_id, session.clone());
        save_json(&self.sessions_path, &*map)
    }

    fn delete(&self, user_id: i64) -> EngineResult<()> {
        let mut map = self.sessions.lock();
        map.remove(&user_id);
        save_json(&self.sessions_path, &*map)
    }

    fn user_ids(&self) -> EngineResult<Vec<i64>> {
        Ok(self.sessions.lock().keys().copied().collect())
    }

    fn archive(&self, session: &Session) -> EngineResult<()> {
        let mut archived: Vec<Session> = load_json_or_default(&self.archive_path)?;
        archived.push(session.clone());
        save_json(&self.archive_path, &archived)
    }
}

#[derive(Default, Serialize, Deserialize)]
struct GlobalFileState {
    entries: HashMap<i64, GlobalEntry>,
    folded: HashSet<Uuid>,
}

/// Global aggregate persisted under `<data_dir>/global.json`. The entry
/// map and the folded-id set live in one file behind one mutex, so the
/// already-folded check, the delta application, and the save commit or
/// skip together.
pub struct FsGlobalStore {
    path: PathBuf,
    state: Mutex<GlobalFileState>,
}

impl FsGlobalStore {
    pub fn open(data_dir: &Path) -> EngineResult<Self> {
        let path = data_dir.join("global.json");
        let state = load_json_or_default(&path)?;
        Ok(FsGlobalStore { path, state: Mutex::new(state) })
    }
}

impl GlobalStore for FsGlobalStore {
    fn read_entries(&self) -> EngineResult<Vec<GlobalEntry>> {
        Ok(self.state.lock().entries.values().copied().collect())
    }

    fn write_fold(&self, session_id: Uuid, deltas: &[FoldDelta]) -> EngineResult<bool> {
        let mut state = self.state.lock();
        if state.folded.contains(&session_id) {
            return Ok(false);
        }

        // Stage on a copy; memory only changes if the save lands.
        let mut next = GlobalFileState {
            entries: state.entries.clone(),
            folded: state.folded.clone(),
        };
        next.folded.insert(session_id);
        for delta in deltas {
            let entry = next.entries.entry(delta.item_id).or_insert(GlobalEntry {
                item_id: delta.item_id,
                cumulative_score: 0.0,
                cumulative_comparisons: 0,
            });
            entry.cumulative_score += delta.score;
            entry.cumulative_comparisons += delta.comparisons;
        }
        save_json(&self.path, &next)?;
        *state = next;
        Ok(true)
    }
}

/// Catalog provider over a fixed item list, with `rated.json` tracking
/// which items each user has already ranked — the source of the
/// "new items only" scope.
pub struct FileCatalogProvider {
    items: Vec<Item>,
    rated_path: PathBuf,
    rated: Mutex<HashMap<i64, HashSet<i64>>>,
}

impl FileCatalogProvider {
    pub fn open(items: Vec<Item>, data_dir: &Path) -> EngineResult<Self> {
        let rated_path = data_dir.join("rated.json");
        let rated = load_json_or_default(&rated_path)?;
        Ok(FileCatalogProvider { items, rated_path, rated: Mutex::new(rated) })
    }

    /// Record that a user has ranked these items; they stop being "new".
    pub fn mark_rated(&self, user_id: i64, item_ids: &[i64]) -> EngineResult<()> {
        let mut rated = self.rated.lock();
        rated.entry(user_id).or_default().extend(item_ids.iter().copied());
        save_json(&self.rated_path, &*rated)
    }
}

impl CatalogProvider for FileCatalogProvider {
    fn load_items(&self, scope: ItemScope) -> EngineResult<Vec<Item>> {
        match scope {
            ItemScope::All => Ok(self.items.clone()),
            ItemScope::NewForUser(user_id) => {
                let rated = self.rated.lock();
                let seen = rated.get(&user_id);
                Ok(self
                    .items
                    .iter()
                    .filter(|i| seen.map_or(true, |s| !s.contains(&i.id)))
                    .cloned()
                    .collect())
            }
        }
    }
}
