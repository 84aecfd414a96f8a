/// Per-user ranking session: the state machine that sequences selection,
/// judgment recording, undo, and progress.
///
/// A session owns its ledger exclusively. Everything else it exposes —
/// current pair, progress, rankings — is recomputed from the ledger on
/// demand, so derived state can never drift from the judgments that
/// produced it.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::Catalog;
use crate::constants::MIN_JUDGMENTS_FOR_CONFIDENT_RANKING;
use crate::errors::{EngineError, EngineResult};
use crate::graph::PreferenceGraph;
use crate::ledger::Ledger;
use crate::ranking;
use crate::selector;
use crate::types::{DerivedRanking, Pair, Progress, RankingRow};

/// Session lifecycle. `Created` exists only between construction and
/// activation; terminal states are `Completed` and `Aborted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Created,
    InProgress,
    Completed,
    Aborted,
}

/// Which pairs a session elicits judgments for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionScope {
    /// Every unordered pair in the catalog.
    All,
    /// Only pairs touching one of the given item ids — the "rate the new
    /// arrivals" mode. The derived ranking still covers the full catalog.
    NewOnly(Vec<i64>),
}

/// Plain outbound record for one engine operation: the next pair to show
/// (or none), progress, and the final ranking rows once completed. Wire
/// encoding is the transport's concern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnOutcome {
    pub session_id: Uuid,
    pub state: SessionState,
    pub next_pair: Option<Pair>,
    pub progress: Progress,
    pub ranking: Option<Vec<RankingRow>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    id: Uuid,
    user_id: i64,
    scope: SessionScope,
    ledger: Ledger,
    state: SessionState,
    max_comparisons: Option<usize>,
    /// Pairs the user asked to see later. Never recorded as judgments, and
    /// deliberately untouched by submit and undo: selection is a
    /// deterministic function of (ledger, deferred), and keeping the set
    /// stable is what makes `go_back` re-offer exactly the undone pair.
    #[serde(default)]
    deferred: Vec<Pair>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(user_id: i64, scope: SessionScope, max_comparisons: Option<usize>) -> Session {
        let now = Utc::now();
        Session {
            id: Uuid::new_v4(),
            user_id,
            scope,
            ledger: Ledger::new(),
            state: SessionState::Created,
            max_comparisons,
            deferred: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Move a freshly created session into play: `InProgress` when the
    /// selector yields a first pair, straight to `Completed` for a trivial
    /// catalog (fewer than 2 items in scope).
    pub fn activate(&mut self, catalog: &Catalog) -> EngineResult<TurnOutcome> {
        if matches!(self.state, SessionState::Created) {
            self.state = SessionState::InProgress;
            self.refresh_state(catalog)?;
            self.touch();
        }
        self.outcome(catalog)
    }

    /// The pair currently offered to the user, recomputed from the ledger.
    /// `None` once the session left `InProgress` or the comparison cap is
    /// reached.
    pub fn current_pair(&self, catalog: &Catalog) -> EngineResult<Option<Pair>> {
        if !matches!(self.state, SessionState::InProgress) {
            return Ok(None);
        }
        if let Some(max) = self.max_comparisons {
            if self.ledger.len() >= max {
                return Ok(None);
            }
        }
        let graph = self.graph(catalog)?;
        let deferred = self.deferred_indices(catalog);
        Ok(selector::select(&graph, &deferred).map(|(a, b)| id_pair(catalog, a, b)))
    }

    /// Accept one judgment. The submitted pair must match the pair most
    /// recently issued — anything else (a retried request racing an undo,
    /// a duplicate) is rejected with `StalePair` and leaves the ledger
    /// unchanged.
    pub fn submit(&mut self, catalog: &Catalog, pair: Pair, winner: i64) -> EngineResult<TurnOutcome> {
        let issued = self.current_pair(catalog)?;
        if issued != Some(pair) {
            return Err(EngineError::StalePair { submitted: pair, issued });
        }
        self.ledger.append(pair, winner)?;
        self.touch();
        self.refresh_state(catalog)?;
        self.outcome(catalog)
    }

    /// Undo the most recent judgment and re-offer the pair it came from.
    pub fn go_back(&mut self, catalog: &Catalog) -> EngineResult<TurnOutcome> {
        let undone = self.ledger.undo_last()?;
        if matches!(self.state, SessionState::Completed) {
            self.state = SessionState::InProgress;
        }
        self.touch();
        let outcome = self.outcome(catalog)?;
        debug_assert_eq!(outcome.next_pair, Some(undone.pair), "undo must re-offer the undone pair");
        Ok(outcome)
    }

    /// Defer the current pair without recording anything. The pair comes
    /// back once no other informative pair remains. A no-op when nothing
    /// is on offer.
    pub fn skip(&mut self, catalog: &Catalog) -> EngineResult<TurnOutcome> {
        if let Some(pair) = self.current_pair(catalog)? {
            if !self.deferred.contains(&pair) {
                self.deferred.push(pair);
                self.touch();
            }
        }
        self.outcome(catalog)
    }

    /// Abandon the session. The ledger is retained for audit but the
    /// session will never fold into the global aggregate.
    pub fn abort(&mut self) {
        if !matches!(self.state, SessionState::Completed) {
            self.state = SessionState::Aborted;
            self.touch();
        }
    }

    /// Comparisons made plus the re-estimated upper bound on the total.
    pub fn progress(&self, catalog: &Catalog) -> EngineResult<Progress> {
        let made = self.ledger.len();
        let graph = self.graph(catalog)?;
        let mut estimated_total = made + graph.unknown_count();
        if let Some(max) = self.max_comparisons {
            estimated_total = estimated_total.min(max).max(made);
        }
        Ok(Progress { made, estimated_total })
    }

    /// The order derivable from the judgments so far, over the full catalog.
    pub fn ranking(&self, catalog: &Catalog) -> EngineResult<DerivedRanking> {
        ranking::derive(catalog, &self.ledger)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn user_id(&self) -> i64 {
        self.user_id
    }

    pub fn scope(&self) -> &SessionScope {
        &self.scope
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, SessionState::Created | SessionState::InProgress)
    }

    /// Whether enough judgments accumulated for the ranking to be worth
    /// presenting as a considered preference order.
    pub fn has_sufficient_data(&self) -> bool {
        self.ledger.len() >= MIN_JUDGMENTS_FOR_CONFIDENT_RANKING
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[cfg(test)]
    pub(crate) fn backdate(&mut self, age: chrono::Duration) {
        self.updated_at = Utc::now() - age;
    }

    fn graph(&self, catalog: &Catalog) -> EngineResult<PreferenceGraph> {
        let indexed = catalog.to_indexed(self.ledger.history())?;
        let focus = match &self.scope {
            SessionScope::All => None,
            SessionScope::NewOnly(ids) => {
                let indices: EngineResult<Vec<usize>> =
                    ids.iter().map(|&id| catalog.to_idx(id)).collect();
                Some(indices?)
            }
        };
        Ok(PreferenceGraph::build(catalog.len(), focus.as_deref(), &indexed))
    }

    fn deferred_indices(&self, catalog: &Catalog) -> Vec<(usize, usize)> {
        self.deferred
            .iter()
            .filter_map(|p| {
                let a = catalog.to_idx(p.lo()).ok()?;
                let b = catalog.to_idx(p.hi()).ok()?;
                Some(if a < b { (a, b) } else { (b, a) })
            })
            .collect()
    }

    fn refresh_state(&mut self, catalog: &Catalog) -> EngineResult<()> {
        if matches!(self.state, SessionState::InProgress) && self.current_pair(catalog)?.is_none() {
            self.state = SessionState::Completed;
            tracing::info!(
                session = %self.id,
                user = self.user_id,
                judgments = self.ledger.len(),
                "ranking session completed"
            );
        }
        Ok(())
    }

    fn outcome(&self, catalog: &Catalog) -> EngineResult<TurnOutcome> {
        let next_pair = self.current_pair(catalog)?;
        let ranking = if matches!(self.state, SessionState::Completed) {
            Some(self.ranking(catalog)?.rows())
        } else {
            None
        };
        Ok(TurnOutcome {
            session_id: self.id,
            state: self.state,
            next_pair,
            progress: self.progress(catalog)?,
            ranking,
        })
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

fn id_pair(catalog: &Catalog, a: usize, b: usize) -> Pair {
    let (x, y) = (catalog.id_at(a), catalog.id_at(b));
    if x < y {
        Pair::from_sorted(x, y)
    } else {
        Pair::from_sorted(y, x)
    }
}
