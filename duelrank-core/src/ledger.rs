/// Append-only, undo-capable judgment history for one session.
///
/// The ledger is the source of truth for everything derived: current pair,
/// progress, and rankings are all recomputed from it. Sequence numbers are
/// assigned here and stay gap-free across undo.
use serde::{Deserialize, Serialize};

use crate::errors::{EngineError, EngineResult};
use crate::types::{Judgment, Pair};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ledger {
    judgments: Vec<Judgment>,
}

impl Ledger {
    pub fn new() -> Self {
        Ledger { judgments: Vec::new() }
    }

    /// Append a judgment. Fails with `InvalidJudgment` if the winner is not
    /// a member of the pair; the ledger is left untouched on failure.
    pub fn append(&mut self, pair: Pair, winner: i64) -> EngineResult<Judgment> {
        if !pair.contains(winner) {
            return Err(EngineError::InvalidJudgment { pair, winner });
        }
        let judgment = Judgment { pair, winner, seq: self.judgments.len() as u64 + 1 };
        self.judgments.push(judgment);
        Ok(judgment)
    }

    /// Remove and return the most recent judgment. Single-step and
    /// repeatable; there is no redo.
    pub fn undo_last(&mut self) -> EngineResult<Judgment> {
        self.judgments.pop().ok_or(EngineError::EmptyLedger)
    }

    /// Read-only ordered history, oldest first.
    pub fn history(&self) -> &[Judgment] {
        &self.judgments
    }

    pub fn last(&self) -> Option<&Judgment> {
        self.judgments.last()
    }

    pub fn len(&self) -> usize {
        self.judgments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.judgments.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(a: i64, b: i64) -> Pair {
        Pair::new(a, b).unwrap()
    }

    #[test]
    fn test_append_assigns_gap_free_sequence() {
        let mut ledger = Ledger::new();
        ledger.append(pair(1, 2), 1).unwrap();
        ledger.append(pair(3, 4), 4).unwrap();
        let seqs: Vec<u64> = ledger.history().iter().map(|j| j.seq).collect();
        assert_eq!(seqs, vec![1, 2]);
    }

    #[test]
    fn test_append_rejects_winner_outside_pair() {
        let mut ledger = Ledger::new();
        let err = ledger.append(pair(1, 2), 3).unwrap_err();
        assert!(matches!(err, EngineError::InvalidJudgment { .. }));
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_undo_removes_exactly_one() {
        let mut ledger = Ledger::new();
        ledger.append(pair(1, 2), 2).unwrap();
        ledger.append(pair(1, 3), 1).unwrap();

        let undone = ledger.undo_last().unwrap();
        assert_eq!(undone.pair, pair(1, 3));
        assert_eq!(ledger.len(), 1);

        // Sequence numbers stay gap-free after undo + re-append.
        let j = ledger.append(pair(2, 3), 3).unwrap();
        assert_eq!(j.seq, 2);
    }

    #[test]
    fn test_undo_on_empty_ledger() {
        let mut ledger = Ledger::new();
        assert_eq!(ledger.undo_last().unwrap_err(), EngineError::EmptyLedger);
    }

    #[test]
    fn test_undo_is_repeatable() {
        let mut ledger = Ledger::new();
        ledger.append(pair(1, 2), 1).unwrap();
        ledger.append(pair(1, 3), 3).unwrap();
        ledger.undo_last().unwrap();
        ledger.undo_last().unwrap();
        assert_eq!(ledger.undo_last().unwrap_err(), EngineError::EmptyLedger);
    }
}
