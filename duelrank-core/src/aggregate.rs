/// Global aggregation: folding completed sessions into one cross-user
/// ranking.
///
/// Sessions contribute normalized `[0, 1]` dominance scores, so sessions
/// over catalogs of different sizes weigh comparably. Folding is
/// at-most-once per session id; the store performs the already-folded
/// check and the delta application in one critical section.
use tracing::{debug, info};

use crate::errors::{EngineError, EngineResult};
use crate::session::{Session, SessionState};
use crate::store::{FoldDelta, SharedGlobalStore};
use crate::types::{DerivedRanking, GlobalEntry};

/// Result of a fold attempt. A duplicate fold is a success, not an error —
/// that is what makes retried completion requests harmless.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FoldOutcome {
    Folded,
    AlreadyFolded,
}

pub struct GlobalAggregator {
    store: SharedGlobalStore,
}

impl GlobalAggregator {
    pub fn new(store: SharedGlobalStore) -> Self {
        GlobalAggregator { store }
    }

    /// Fold one completed session's derived scores into the global store.
    /// Fails with `IncompleteSession` for any other session state.
    pub fn fold(&self, session: &Session, ranking: &DerivedRanking) -> EngineResult<FoldOutcome> {
        if session.state() != SessionState::Completed {
            return Err(EngineError::IncompleteSession(session.id()));
        }

        let deltas: Vec<FoldDelta> = ranking
            .entries
            .iter()
            .map(|e| FoldDelta {
                item_id: e.item_id,
                score: e.score,
                comparisons: e.compared as u64,
            })
            .collect();

        if self.store.write_fold(session.id(), &deltas)? {
            info!(session = %session.id(), user = session.user_id(), items = deltas.len(), "folded session into global ranking");
            Ok(FoldOutcome::Folded)
        } else {
            debug!(session = %session.id(), "session already folded, skipping");
            Ok(FoldOutcome::AlreadyFolded)
        }
    }

    /// The global ranking: cumulative score descending, item id ascending
    /// on ties. Deterministic for a given store state.
    pub fn rank(&self) -> EngineResult<Vec<GlobalEntry>> {
        let mut entries = self.store.read_entries()?;
        entries.sort_by(|a, b| {
            b.cumulative_score
                .partial_cmp(&a.cumulative_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.item_id.cmp(&b.item_id))
        });
        Ok(entries)
    }

    /// The top `n` of the global ranking.
    pub fn top_n(&self, n: usize) -> EngineResult<Vec<GlobalEntry>> {
        let mut entries = self.rank()?;
        entries.truncate(n);
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::catalog::Catalog;
    use crate::session::SessionScope;
    use crate::store::MemoryGlobalStore;
    use crate::types::Item;

    fn completed_session(catalog: &Catalog) -> (Session, DerivedRanking) {
        let mut session = Session::new(1, SessionScope::All, None);
        session.activate(catalog).unwrap();
        while let Some(p) = session.current_pair(catalog).unwrap() {
            session.submit(catalog, p, p.lo()).unwrap();
        }
        let ranking = session.ranking(catalog).unwrap();
        (session, ranking)
    }

    fn catalog(n: i64) -> Catalog {
        let items = (1..=n).map(|i| Item::new(i, format!("item-{i}"))).collect();
        Catalog::new(items).unwrap()
    }

    #[test]
    fn test_fold_requires_completed_session() {
        let cat = catalog(3);
        let aggregator = GlobalAggregator::new(Arc::new(MemoryGlobalStore::new()));
        let mut session = Session::new(1, SessionScope::All, None);
        session.activate(&cat).unwrap();
        let ranking = session.ranking(&cat).unwrap();

        let err = aggregator.fold(&session, &ranking).unwrap_err();
        assert_eq!(err, EngineError::IncompleteSession(session.id()));
    }

    #[test]
    fn test_fold_twice_leaves_totals_unchanged() {
        let cat = catalog(3);
        let aggregator = GlobalAggregator::new(Arc::new(MemoryGlobalStore::new()));
        let (session, ranking) = completed_session(&cat);

        assert_eq!(aggregator.fold(&session, &ranking).unwrap(), FoldOutcome::Folded);
        let first = aggregator.rank().unwrap();

        assert_eq!(aggregator.fold(&session, &ranking).unwrap(), FoldOutcome::AlreadyFolded);
        assert_eq!(aggregator.rank().unwrap(), first);
    }

    #[test]
    fn test_rank_orders_by_score_then_id() {
        let store = Arc::new(MemoryGlobalStore::new());
        let aggregator = GlobalAggregator::new(store.clone());
        let cat = catalog(3);

        let (session, ranking) = completed_session(&cat);
        aggregator.fold(&session, &ranking).unwrap();

        let ranked = aggregator.rank().unwrap();
        // Item 1 won everything in the session.
        assert_eq!(ranked[0].item_id, 1);
        assert!(ranked.windows(2).all(|w| {
            w[0].cumulative_score > w[1].cumulative_score
                || (w[0].cumulative_score == w[1].cumulative_score && w[0].item_id < w[1].item_id)
        }));
        assert_eq!(aggregator.top_n(1).unwrap().len(), 1);
    }
}
