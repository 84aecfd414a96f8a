/// Core data model for the ranking engine.
///
/// Items are identified by caller-provided `i64` IDs. Pairs are unordered
/// and stored normalized, so equality and hashing ignore the order the two
/// ids arrived in.
use serde::{Deserialize, Serialize};

/// A rankable item. Immutable once its catalog is loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Caller-provided ID. Unique within a catalog.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Opaque reference to display artwork. The engine never dereferences it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_ref: Option<String>,
}

impl Item {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Item { id, name: name.into(), image_ref: None }
    }
}

/// Unordered pair of distinct item ids, normalized so `lo() < hi()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pair {
    lo: i64,
    hi: i64,
}

impl Pair {
    /// Build a pair from two distinct ids, in either order.
    /// Returns `None` when `a == b` — a pair needs two items.
    pub fn new(a: i64, b: i64) -> Option<Pair> {
        if a == b {
            return None;
        }
        Some(if a < b { Pair { lo: a, hi: b } } else { Pair { lo: b, hi: a } })
    }

    /// Internal constructor for ids already known distinct and ordered.
    pub(crate) fn from_sorted(lo: i64, hi: i64) -> Pair {
        debug_assert!(lo < hi);
        Pair { lo, hi }
    }

    pub fn lo(&self) -> i64 {
        self.lo
    }

    pub fn hi(&self) -> i64 {
        self.hi
    }

    pub fn contains(&self, id: i64) -> bool {
        self.lo == id || self.hi == id
    }

    /// The other member of the pair, or `None` if `id` is not a member.
    pub fn other(&self, id: i64) -> Option<i64> {
        if id == self.lo {
            Some(self.hi)
        } else if id == self.hi {
            Some(self.lo)
        } else {
            None
        }
    }
}

/// One accepted comparison outcome.
///
/// `seq` numbers are strictly increasing and gap-free within a ledger,
/// starting at 1. Immutable once appended.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Judgment {
    pub pair: Pair,
    /// Winning item id. Always a member of `pair`.
    pub winner: i64,
    pub seq: u64,
}

impl Judgment {
    pub fn loser(&self) -> i64 {
        if self.winner == self.pair.lo() {
            self.pair.hi()
        } else {
            self.pair.lo()
        }
    }
}

/// Progress through a session. `estimated_total` is a re-estimated upper
/// bound: it moves as transitivity resolves pairs, and callers must treat
/// the denominator as unstable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub made: usize,
    pub estimated_total: usize,
}

/// One position in a derived ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedEntry {
    pub item_id: i64,
    pub name: String,
    /// 1-based position, best first.
    pub position: usize,
    /// Normalized dominance score in `[0, 1]`, comparable across sessions
    /// of different catalog sizes.
    pub score: f64,
    /// Items this one transitively beats.
    pub dominated: usize,
    /// Direct comparisons this item took part in.
    pub compared: usize,
}

/// A total (or partial) order derived from a ledger. Never persisted — it
/// is a pure function of `(catalog, ledger)`, so it is always reproducible
/// and undo reverts it for free.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedRanking {
    pub entries: Vec<RankedEntry>,
    /// Set when a contradictory judgment had to be dropped to keep the
    /// order acyclic (most recent judgment wins).
    pub approximate: bool,
}

impl DerivedRanking {
    /// Outbound view: the plain rows transports serialize.
    pub fn rows(&self) -> Vec<RankingRow> {
        self.entries
            .iter()
            .map(|e| RankingRow {
                item_id: e.item_id,
                display_name: e.name.clone(),
                position: e.position,
            })
            .collect()
    }

    pub fn position_of(&self, item_id: i64) -> Option<usize> {
        self.entries.iter().find(|e| e.item_id == item_id).map(|e| e.position)
    }
}

/// Outbound ranking row, wire-encoding agnostic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingRow {
    pub item_id: i64,
    pub display_name: String,
    pub position: usize,
}

/// Aggregated standing of one item across all completed sessions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GlobalEntry {
    pub item_id: i64,
    pub cumulative_score: f64,
    pub cumulative_comparisons: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_normalizes_order() {
        let p = Pair::new(7, 3).unwrap();
        assert_eq!(p.lo(), 3);
        assert_eq!(p.hi(), 7);
        assert_eq!(p, Pair::new(3, 7).unwrap());
    }

    #[test]
    fn test_pair_rejects_self_comparison() {
        assert!(Pair::new(5, 5).is_none());
    }

    #[test]
    fn test_pair_membership() {
        let p = Pair::new(1, 2).unwrap();
        assert!(p.contains(1));
        assert!(!p.contains(3));
        assert_eq!(p.other(1), Some(2));
        assert_eq!(p.other(2), Some(1));
        assert_eq!(p.other(9), None);
    }

    #[test]
    fn test_judgment_loser() {
        let pair = Pair::new(10, 20).unwrap();
        let j = Judgment { pair, winner: 20, seq: 1 };
        assert_eq!(j.loser(), 10);
    }

    #[test]
    fn test_ranking_rows_preserve_order() {
        let ranking = DerivedRanking {
            entries: vec![
                RankedEntry { item_id: 2, name: "B".into(), position: 1, score: 1.0, dominated: 1, compared: 1 },
                RankedEntry { item_id: 1, name: "A".into(), position: 2, score: 0.0, dominated: 0, compared: 1 },
            ],
            approximate: false,
        };
        let rows = ranking.rows();
        assert_eq!(rows[0].item_id, 2);
        assert_eq!(rows[1].position, 2);
        assert_eq!(ranking.position_of(1), Some(2));
    }
}
