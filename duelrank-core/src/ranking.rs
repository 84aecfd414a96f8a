/// Ranking derivation: ledger in, ordered list out.
///
/// Pure function over `(catalog, ledger)` — no IO, no state. Ordering is by
/// transitive dominance count, descending; catalog order is the stable
/// tie-break, which also places never-compared items deterministically.
use crate::catalog::Catalog;
use crate::errors::EngineResult;
use crate::graph::PreferenceGraph;
use crate::ledger::Ledger;
use crate::types::{DerivedRanking, RankedEntry};

/// Derive the current total (or partial) order from a ledger.
///
/// Each item's score is `dominated / (n - 1)`, the fraction of the catalog
/// it transitively beats — a `[0, 1]` value comparable across sessions of
/// different sizes, which is what the global aggregator folds.
///
/// A contradictory ledger (possible only when judgments bypass the
/// selector) degrades to an `approximate` ranking where the most recent
/// judgment wins; the request never fails over it.
pub fn derive(catalog: &Catalog, ledger: &Ledger) -> EngineResult<DerivedRanking> {
    let n = catalog.len();
    let indexed = catalog.to_indexed(ledger.history())?;
    let graph = PreferenceGraph::build(n, None, &indexed);

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by_key(|&idx| (std::cmp::Reverse(graph.dominated(idx)), idx));

    let denom = n.saturating_sub(1).max(1) as f64;
    let entries = order
        .iter()
        .enumerate()
        .map(|(pos, &idx)| {
            let item = &catalog.items()[idx];
            RankedEntry {
                item_id: item.id,
                name: item.name.clone(),
                position: pos + 1,
                score: graph.dominated(idx) as f64 / denom,
                dominated: graph.dominated(idx),
                compared: graph.compared(idx),
            }
        })
        .collect();

    Ok(DerivedRanking { entries, approximate: graph.is_approximate() })
}
