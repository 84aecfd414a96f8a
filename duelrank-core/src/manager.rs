/// Session manager: one active session per user, sequenced access to the
/// selector, ledger, and ranking builder, and the fold into the global
/// aggregate on completion.
///
/// Mutating operations on one user's session are serialized behind a
/// per-user lock; sessions of different users proceed fully in parallel.
/// Session state lives in an explicit store keyed by user id, never in
/// process-wide singletons, so several server instances can share a
/// backend.
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::aggregate::GlobalAggregator;
use crate::catalog::{Catalog, ItemScope};
use crate::errors::{EngineError, EngineResult};
use crate::session::{Session, SessionScope, SessionState, TurnOutcome};
use crate::store::{SharedCatalogProvider, SharedGlobalStore, SharedSessionStore};
use crate::types::{DerivedRanking, GlobalEntry, Pair};

/// What a new session should cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartScope {
    /// Rank the whole catalog.
    Full,
    /// Rank only items the user has not seen before, against everyone.
    NewItemsOnly,
}

pub struct SessionManager {
    catalogs: SharedCatalogProvider,
    sessions: SharedSessionStore,
    aggregator: GlobalAggregator,
    user_locks: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl SessionManager {
    pub fn new(
        catalogs: SharedCatalogProvider,
        sessions: SharedSessionStore,
        global: SharedGlobalStore,
    ) -> Self {
        SessionManager {
            catalogs,
            sessions,
            aggregator: GlobalAggregator::new(global),
            user_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Return the user's active session, or create one. A stored terminal
    /// session (completed or aborted) is archived and replaced.
    pub fn start_or_resume(
        &self,
        user_id: i64,
        scope: StartScope,
        max_comparisons: Option<usize>,
    ) -> EngineResult<TurnOutcome> {
        let lock = self.user_lock(user_id);
        let _guard = lock.lock();

        let catalog = self.catalog()?;
        if let Some(mut session) = self.sessions.get(user_id)? {
            if session.is_active() {
                let outcome = session.activate(&catalog)?;
                self.sessions.put(user_id, &session)?;
                return Ok(outcome);
            }
            self.sessions.archive(&session)?;
            self.sessions.delete(user_id)?;
        }
        self.create_locked(user_id, scope, max_comparisons, &catalog)
    }

    /// Discard any existing session (retained for audit, never folded
    /// unless it completed) and start fresh.
    pub fn restart(
        &self,
        user_id: i64,
        scope: StartScope,
        max_comparisons: Option<usize>,
    ) -> EngineResult<TurnOutcome> {
        let lock = self.user_lock(user_id);
        let _guard = lock.lock();

        let catalog = self.catalog()?;
        if let Some(mut session) = self.sessions.get(user_id)? {
            session.abort();
            self.sessions.archive(&session)?;
            self.sessions.delete(user_id)?;
            info!(user = user_id, session = %session.id(), "superseded previous session");
        }
        self.create_locked(user_id, scope, max_comparisons, &catalog)
    }

    /// Record the user's choice for the currently issued pair.
    pub fn submit_choice(&self, user_id: i64, pair: Pair, winner: i64) -> EngineResult<TurnOutcome> {
        let lock = self.user_lock(user_id);
        let _guard = lock.lock();

        let catalog = self.catalog()?;
        let mut session = self.stored_session(user_id)?;
        let outcome = session.submit(&catalog, pair, winner)?;
        self.sessions.put(user_id, &session)?;
        if session.state() == SessionState::Completed {
            self.fold_completed(&session, &catalog)?;
        }
        Ok(outcome)
    }

    /// Undo the user's last judgment and re-offer the pair it came from.
    pub fn go_back(&self, user_id: i64) -> EngineResult<TurnOutcome> {
        let lock = self.user_lock(user_id);
        let _guard = lock.lock();

        let catalog = self.catalog()?;
        let mut session = self.stored_session(user_id)?;
        let outcome = session.go_back(&catalog)?;
        self.sessions.put(user_id, &session)?;
        Ok(outcome)
    }

    /// Defer the currently issued pair without recording a judgment.
    pub fn skip(&self, user_id: i64) -> EngineResult<TurnOutcome> {
        let lock = self.user_lock(user_id);
        let _guard = lock.lock();

        let catalog = self.catalog()?;
        let mut session = self.stored_session(user_id)?;
        let outcome = session.skip(&catalog)?;
        self.sessions.put(user_id, &session)?;
        Ok(outcome)
    }

    /// The order derivable from the user's judgments so far, any state.
    pub fn current_ranking(&self, user_id: i64) -> EngineResult<DerivedRanking> {
        let catalog = self.catalog()?;
        let session = self.stored_session(user_id)?;
        session.ranking(&catalog)
    }

    /// The final order of a completed session.
    pub fn final_ranking(&self, user_id: i64) -> EngineResult<DerivedRanking> {
        let catalog = self.catalog()?;
        let session = self.stored_session(user_id)?;
        if session.state() != SessionState::Completed {
            return Err(EngineError::IncompleteSession(session.id()));
        }
        session.ranking(&catalog)
    }

    /// The cross-user aggregate, best first.
    pub fn global_ranking(&self) -> EngineResult<Vec<GlobalEntry>> {
        self.aggregator.rank()
    }

    pub fn global_top(&self, n: usize) -> EngineResult<Vec<GlobalEntry>> {
        self.aggregator.top_n(n)
    }

    /// Abort and remove sessions untouched for longer than `max_age`.
    /// Returns the number of sessions swept.
    pub fn cleanup_stale(&self, max_age: chrono::Duration) -> EngineResult<usize> {
        let cutoff = chrono::Utc::now() - max_age;
        let mut swept = 0;
        for user_id in self.sessions.user_ids()? {
            let lock = self.user_lock(user_id);
            let _guard = lock.lock();
            let Some(mut session) = self.sessions.get(user_id)? else { continue };
            if session.updated_at() < cutoff {
                session.abort();
                self.sessions.archive(&session)?;
                self.sessions.delete(user_id)?;
                swept += 1;
            }
        }
        if swept > 0 {
            info!(swept, "stale session cleanup");
        }
        Ok(swept)
    }

    fn create_locked(
        &self,
        user_id: i64,
        scope: StartScope,
        max_comparisons: Option<usize>,
        catalog: &Catalog,
    ) -> EngineResult<TurnOutcome> {
        let session_scope = match scope {
            StartScope::Full => SessionScope::All,
            StartScope::NewItemsOnly => {
                let fresh = self.catalogs.load_items(ItemScope::NewForUser(user_id))?;
                SessionScope::NewOnly(fresh.into_iter().map(|i| i.id).collect())
            }
        };
        let mut session = Session::new(user_id, session_scope, max_comparisons);
        let outcome = session.activate(catalog)?;
        self.sessions.put(user_id, &session)?;
        info!(user = user_id, session = %session.id(), state = ?session.state(), "started ranking session");
        if session.state() == SessionState::Completed {
            self.fold_completed(&session, catalog)?;
        }
        Ok(outcome)
    }

    fn fold_completed(&self, session: &Session, catalog: &Catalog) -> EngineResult<()> {
        let ranking = session.ranking(catalog)?;
        if ranking.approximate {
            warn!(session = %session.id(), "folding an approximate ranking");
        }
        self.aggregator.fold(session, &ranking)?;
        Ok(())
    }

    fn stored_session(&self, user_id: i64) -> EngineResult<Session> {
        match self.sessions.get(user_id)? {
            Some(s) if s.state() != SessionState::Aborted => Ok(s),
            _ => Err(EngineError::NoActiveSession(user_id)),
        }
    }

    fn catalog(&self) -> EngineResult<Catalog> {
        Catalog::new(self.catalogs.load_items(ItemScope::All)?)
    }

    fn user_lock(&self, user_id: i64) -> Arc<Mutex<()>> {
        self.user_locks
            .lock()
            .entry(user_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryCatalogProvider, MemoryGlobalStore, MemorySessionStore, SessionStore};
    use crate::types::Item;

    fn manager_with(n: i64) -> (SessionManager, Arc<MemoryCatalogProvider>, Arc<MemorySessionStore>) {
        let items: Vec<Item> = (1..=n).map(|i| Item::new(i, format!("item-{i}"))).collect();
        let catalogs = Arc::new(MemoryCatalogProvider::new(items));
        let sessions = Arc::new(MemorySessionStore::new());
        let manager = SessionManager::new(
            catalogs.clone(),
            sessions.clone(),
            Arc::new(MemoryGlobalStore::new()),
        );
        (manager, catalogs, sessions)
    }

    fn run_to_completion(manager: &SessionManager, user: i64) -> TurnOutcome {
        let mut outcome = manager.start_or_resume(user, StartScope::Full, None).unwrap();
        while let Some(pair) = outcome.next_pair {
            outcome = manager.submit_choice(user, pair, pair.lo()).unwrap();
        }
        outcome
    }

    #[test]
    fn test_start_resume_returns_same_session() {
        let (manager, _, _) = manager_with(4);
        let first = manager.start_or_resume(7, StartScope::Full, None).unwrap();
        let pair = first.next_pair.unwrap();
        manager.submit_choice(7, pair, pair.lo()).unwrap();

        let resumed = manager.start_or_resume(7, StartScope::Full, None).unwrap();
        assert_eq!(resumed.session_id, first.session_id);
        assert_eq!(resumed.progress.made, 1);
    }

    #[test]
    fn test_full_flow_completes_and_folds_once() {
        let (manager, _, _) = manager_with(4);
        let outcome = run_to_completion(&manager, 1);
        assert_eq!(outcome.state, SessionState::Completed);
        let rows = outcome.ranking.unwrap();
        assert_eq!(rows[0].item_id, 1);

        let global = manager.global_ranking().unwrap();
        assert_eq!(global[0].item_id, 1);
        assert!((global[0].cumulative_score - 1.0).abs() < 1e-12);

        // Re-deriving the final ranking does not change the aggregate.
        manager.final_ranking(1).unwrap();
        assert_eq!(manager.global_ranking().unwrap(), global);
    }

    #[test]
    fn test_global_accumulates_across_users() {
        let (manager, _, _) = manager_with(3);
        run_to_completion(&manager, 1);
        run_to_completion(&manager, 2);

        let global = manager.global_ranking().unwrap();
        assert_eq!(global[0].item_id, 1);
        assert!((global[0].cumulative_score - 2.0).abs() < 1e-12);
        assert_eq!(manager.global_top(2).unwrap().len(), 2);
    }

    #[test]
    fn test_submit_without_session() {
        let (manager, _, _) = manager_with(3);
        let pair = Pair::new(1, 2).unwrap();
        let err = manager.submit_choice(99, pair, 1).unwrap_err();
        assert_eq!(err, EngineError::NoActiveSession(99));
    }

    #[test]
    fn test_stale_submission_rejected() {
        let (manager, _, _) = manager_with(4);
        let outcome = manager.start_or_resume(3, StartScope::Full, None).unwrap();
        let issued = outcome.next_pair.unwrap();
        manager.submit_choice(3, issued, issued.lo()).unwrap();

        // Retrying the already-accepted pair must not double-record.
        let err = manager.submit_choice(3, issued, issued.lo()).unwrap_err();
        assert!(matches!(err, EngineError::StalePair { .. }));
        let resumed = manager.start_or_resume(3, StartScope::Full, None).unwrap();
        assert_eq!(resumed.progress.made, 1);
    }

    #[test]
    fn test_go_back_then_redo() {
        let (manager, _, _) = manager_with(4);
        let outcome = manager.start_or_resume(5, StartScope::Full, None).unwrap();
        let first = outcome.next_pair.unwrap();
        manager.submit_choice(5, first, first.lo()).unwrap();

        let back = manager.go_back(5).unwrap();
        assert_eq!(back.next_pair, Some(first));
        assert_eq!(back.progress.made, 0);

        // A clean retry with the other winner goes through.
        manager.submit_choice(5, first, first.hi()).unwrap();
    }

    #[test]
    fn test_restart_aborts_and_archives_previous() {
        let (manager, _, sessions) = manager_with(4);
        let first = manager.start_or_resume(2, StartScope::Full, None).unwrap();
        let pair = first.next_pair.unwrap();
        manager.submit_choice(2, pair, pair.lo()).unwrap();

        let fresh = manager.restart(2, StartScope::Full, None).unwrap();
        assert_ne!(fresh.session_id, first.session_id);
        assert_eq!(fresh.progress.made, 0);

        let archived = sessions.archived();
        assert_eq!(archived.len(), 1);
        assert_eq!(archived[0].state(), SessionState::Aborted);
        // Aborted sessions never reach the aggregate.
        assert!(manager.global_ranking().unwrap().is_empty());
    }

    #[test]
    fn test_single_item_catalog_completes_immediately() {
        let (manager, _, _) = manager_with(1);
        let outcome = manager.start_or_resume(1, StartScope::Full, None).unwrap();
        assert_eq!(outcome.state, SessionState::Completed);
        assert_eq!(outcome.progress.made, 0);
        assert_eq!(outcome.ranking.unwrap().len(), 1);
    }

    #[test]
    fn test_new_items_scope_uses_provider_subset() {
        let (manager, catalogs, _) = manager_with(4);
        catalogs.set_new_for_user(6, vec![4]);

        let mut outcome = manager.start_or_resume(6, StartScope::NewItemsOnly, None).unwrap();
        while let Some(pair) = outcome.next_pair {
            assert!(pair.contains(4));
            outcome = manager.submit_choice(6, pair, 4).unwrap();
        }
        assert_eq!(outcome.state, SessionState::Completed);
        assert_eq!(outcome.ranking.unwrap()[0].item_id, 4);
    }

    #[test]
    fn test_new_items_scope_with_nothing_new() {
        let (manager, _, _) = manager_with(4);
        let outcome = manager.start_or_resume(8, StartScope::NewItemsOnly, None).unwrap();
        assert_eq!(outcome.state, SessionState::Completed);
        assert_eq!(outcome.progress.made, 0);
    }

    #[test]
    fn test_cleanup_sweeps_only_stale_sessions() {
        let (manager, _, sessions) = manager_with(4);
        manager.start_or_resume(1, StartScope::Full, None).unwrap();
        manager.start_or_resume(2, StartScope::Full, None).unwrap();

        let mut old = sessions.get(1).unwrap().unwrap();
        old.backdate(chrono::Duration::hours(48));
        sessions.put(1, &old).unwrap();

        let swept = manager.cleanup_stale(chrono::Duration::hours(24)).unwrap();
        assert_eq!(swept, 1);
        assert!(sessions.get(1).unwrap().is_none());
        assert!(sessions.get(2).unwrap().is_some());
        assert_eq!(sessions.archived()[0].state(), SessionState::Aborted);
    }
}
