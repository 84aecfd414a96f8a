/// Preference graph with incremental transitive closure.
///
/// The shared derived view behind both pair selection and ranking
/// derivation: rebuilt from the ledger on demand, never stored, so the
/// ledger stays the single source of truth and undo needs no bookkeeping.
///
/// Internal module — operates on pre-mapped `usize` indices, not caller IDs.
use std::collections::HashSet;

/// Directed "preferred-over" relation between catalog indices, kept closed
/// under transitivity: after every mutation, `beats[a]` contains `b` iff
/// `a` is known to beat `b` directly or through any chain.
pub(crate) struct PreferenceGraph {
    n: usize,
    /// beats[w] = every index w is known to beat.
    beats: Vec<HashSet<usize>>,
    /// beaten_by[l] = every index known to beat l.
    beaten_by: Vec<HashSet<usize>>,
    /// Direct comparisons each index took part in.
    compared: Vec<usize>,
    /// Normalized `(lo, hi)` index pairs whose relative order is still
    /// unknown. Shrinks as judgments and their transitive consequences land.
    unknown: HashSet<(usize, usize)>,
    /// A judgment was dropped because it contradicted more recent ones.
    approximate: bool,
}

impl PreferenceGraph {
    /// Build the graph for `n` items from `(winner_idx, loser_idx)` tuples
    /// in ledger order (oldest first).
    ///
    /// Judgments are replayed newest-first so that when two of them
    /// contradict each other, the one with the larger sequence number wins
    /// and the older edge is dropped (`approximate` set).
    ///
    /// `focus` restricts the unknown-pair universe to pairs touching at
    /// least one of the given indices ("new items only" sessions).
    pub fn build(n: usize, focus: Option<&[usize]>, indexed: &[(usize, usize)]) -> Self {
        let mut graph = PreferenceGraph {
            n,
            beats: vec![HashSet::new(); n],
            beaten_by: vec![HashSet::new(); n],
            compared: vec![0; n],
            unknown: seed_unknown(n, focus),
            approximate: false,
        };
        for &(winner, loser) in indexed.iter().rev() {
            graph.record(winner, loser);
        }
        graph
    }

    /// Apply one direct judgment. Comparison counts and the unknown set are
    /// updated unconditionally; the edge itself is only added when it does
    /// not contradict the (more recent) relations already present.
    fn record(&mut self, winner: usize, loser: usize) {
        debug_assert!(winner < self.n && loser < self.n && winner != loser);

        self.compared[winner] += 1;
        self.compared[loser] += 1;
        self.unknown.remove(&normalized(winner, loser));

        if self.beats[winner].contains(&loser) {
            // Already implied by newer judgments.
            return;
        }
        if self.beats[loser].contains(&winner) {
            // Would close a cycle against a newer judgment. Most recent wins.
            self.approximate = true;
            return;
        }
        self.add_relation_with_closure(winner, loser);
    }

    /// Add `winner > loser` plus every transitive consequence:
    /// `a > b` for all `a` in ancestors(winner) ∪ {winner} and
    /// `b` in descendants(loser) ∪ {loser}. Assumes the graph was closed
    /// before the call, which makes ancestor/descendant lookup a set read
    /// instead of a traversal.
    fn add_relation_with_closure(&mut self, winner: usize, loser: usize) {
        let mut ancestors: Vec<usize> = self.beaten_by[winner].iter().copied().collect();
        ancestors.push(winner);
        let mut descendants: Vec<usize> = self.beats[loser].iter().copied().collect();
        descendants.push(loser);

        for &a in &ancestors {
            for &b in &descendants {
                if a == b || self.beats[a].contains(&b) {
                    continue;
                }
                self.beats[a].insert(b);
                self.beaten_by[b].insert(a);
                self.unknown.remove(&normalized(a, b));
            }
        }
    }

    pub fn beats(&self, a: usize, b: usize) -> bool {
        self.beats[a].contains(&b)
    }

    /// True when the relative order of `a` and `b` is already known,
    /// directly or transitively.
    pub fn ordered(&self, a: usize, b: usize) -> bool {
        self.beats(a, b) || self.beats(b, a)
    }

    /// Number of items this index transitively dominates.
    pub fn dominated(&self, idx: usize) -> usize {
        self.beats[idx].len()
    }

    /// Number of direct comparisons this index took part in.
    pub fn compared(&self, idx: usize) -> usize {
        self.compared[idx]
    }

    pub fn unknown_pairs(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.unknown.iter().copied()
    }

    pub fn unknown_count(&self) -> usize {
        self.unknown.len()
    }

    pub fn is_fully_ordered(&self) -> bool {
        self.unknown.is_empty()
    }

    pub fn is_approximate(&self) -> bool {
        self.approximate
    }
}

fn normalized(a: usize, b: usize) -> (usize, usize) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

fn seed_unknown(n: usize, focus: Option<&[usize]>) -> HashSet<(usize, usize)> {
    match focus {
        Some(focus_indices) => {
            let mut unknown = HashSet::new();
            for &a in focus_indices {
                for b in 0..n {
                    if a != b {
                        unknown.insert(normalized(a, b));
                    }
                }
            }
            unknown
        }
        None => {
            let mut unknown = HashSet::with_capacity(n * (n.saturating_sub(1)) / 2);
            for a in 0..n {
                for b in (a + 1)..n {
                    unknown.insert((a, b));
                }
            }
            unknown
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitive_implication() {
        // 0 beats 1, 1 beats 2 — 0 > 2 must be implied, not asked again.
        let graph = PreferenceGraph::build(3, None, &[(0, 1), (1, 2)]);
        assert!(graph.beats(0, 2));
        assert!(graph.ordered(2, 0));
        assert!(graph.is_fully_ordered());
        assert_eq!(graph.dominated(0), 2);
        assert_eq!(graph.dominated(1), 1);
        assert_eq!(graph.dominated(2), 0);
    }

    #[test]
    fn test_unknown_shrinks_by_closure() {
        let graph = PreferenceGraph::build(4, None, &[(0, 1), (2, 3)]);
        // (0,1) and (2,3) judged directly; the four cross pairs remain.
        assert_eq!(graph.unknown_count(), 4);
        assert!(!graph.ordered(0, 2));
    }

    #[test]
    fn test_conflict_most_recent_wins() {
        // Older judgment says 0 > 1, newer says 1 > 0.
        let graph = PreferenceGraph::build(2, None, &[(0, 1), (1, 0)]);
        assert!(graph.is_approximate());
        assert!(graph.beats(1, 0));
        assert!(!graph.beats(0, 1));
        // Both directs still count as comparisons.
        assert_eq!(graph.compared(0), 2);
    }

    #[test]
    fn test_transitive_conflict_dropped() {
        // Newest first: 2 > 0 lands, then 1 > 2, implying 1 > 0.
        // The oldest judgment 0 > 1 now contradicts the closure.
        let graph = PreferenceGraph::build(3, None, &[(0, 1), (1, 2), (2, 0)]);
        assert!(graph.is_approximate());
        assert!(graph.beats(2, 0));
        assert!(graph.beats(1, 2));
    }

    #[test]
    fn test_focus_restricts_unknown_pairs() {
        // Only pairs touching index 3 are in play.
        let graph = PreferenceGraph::build(4, Some(&[3]), &[]);
        assert_eq!(graph.unknown_count(), 3);
        for (a, b) in graph.unknown_pairs() {
            assert!(a == 3 || b == 3);
        }
    }

    #[test]
    fn test_single_item_is_trivially_ordered() {
        let graph = PreferenceGraph::build(1, None, &[]);
        assert!(graph.is_fully_ordered());
    }
}
