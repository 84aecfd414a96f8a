/// Deterministic next-pair selection.
///
/// Pairs whose order is already implied by the ledger — directly or
/// transitively — are never presented. Among the remaining informative
/// pairs the policy minimizes, lexicographically:
///
///   1. combined direct-comparison count (fresh items surface first, which
///      decomposes the catalog into small ordered groups, round by round),
///   2. dominance-count difference (closest records produce the most
///      informative comparison — the boundary items of two groups),
///   3. the normalized pair itself (total tie-break).
///
/// The key is a total order, so for a given ledger state the same pair is
/// always returned. That determinism is what lets undo re-offer exactly
/// the pair whose judgment was removed.
use crate::catalog::Catalog;
use crate::errors::EngineResult;
use crate::graph::PreferenceGraph;
use crate::ledger::Ledger;
use crate::types::Pair;

/// Pick the next informative pair, or `None` when the order is fully
/// determined. `deferred` pairs are skipped while alternatives remain.
pub(crate) fn select(
    graph: &PreferenceGraph,
    deferred: &[(usize, usize)],
) -> Option<(usize, usize)> {
    let best = select_from(graph, |p| !deferred.contains(&p));
    if best.is_some() {
        return best;
    }
    // Everything informative was deferred: fall back to re-offering.
    select_from(graph, |_| true)
}

fn select_from(
    graph: &PreferenceGraph,
    keep: impl Fn((usize, usize)) -> bool,
) -> Option<(usize, usize)> {
    graph
        .unknown_pairs()
        .filter(|&p| keep(p))
        .min_by_key(|&(a, b)| {
            let comp_sum = graph.compared(a) + graph.compared(b);
            let win_diff = graph.dominated(a).abs_diff(graph.dominated(b));
            (comp_sum, win_diff, a, b)
        })
}

/// Spec-level contract: the next pair for a full-scope session, as a pure
/// function of `(catalog, ledger)`.
pub fn next_pair(catalog: &Catalog, ledger: &Ledger) -> EngineResult<Option<Pair>> {
    let indexed = catalog.to_indexed(ledger.history())?;
    let graph = PreferenceGraph::build(catalog.len(), None, &indexed);
    Ok(select(&graph, &[]).map(|(a, b)| {
        let (x, y) = (catalog.id_at(a), catalog.id_at(b));
        if x < y {
            Pair::from_sorted(x, y)
        } else {
            Pair::from_sorted(y, x)
        }
    }))
}
