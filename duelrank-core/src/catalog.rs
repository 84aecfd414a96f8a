/// Immutable item catalog for a ranking session.
///
/// Supplies identity and display metadata only. The catalog handles the
/// mapping between caller `i64` ids and internal `0..n` indices — callers
/// never think about indices.
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::errors::{EngineError, EngineResult};
use crate::types::{Item, Judgment};

/// Which slice of the item universe a catalog load covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemScope {
    /// Every known item.
    All,
    /// Only items the given user has not ranked before.
    NewForUser(i64),
}

#[derive(Debug)]
pub struct Catalog {
    items: Vec<Item>,
    id_to_idx: HashMap<i64, usize>,
}

impl Catalog {
    /// Build a catalog from an ordered item list.
    ///
    /// The list order is load-bearing: it is the deterministic tie-break
    /// for unranked items. Fails on an empty list or a duplicate id.
    pub fn new(items: Vec<Item>) -> EngineResult<Catalog> {
        if items.is_empty() {
            return Err(EngineError::EmptyCatalog);
        }
        let mut id_to_idx = HashMap::with_capacity(items.len());
        for (idx, item) in items.iter().enumerate() {
            if id_to_idx.insert(item.id, idx).is_some() {
                return Err(EngineError::DuplicateItem(item.id));
            }
        }
        Ok(Catalog { items, id_to_idx })
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn contains(&self, id: i64) -> bool {
        self.id_to_idx.contains_key(&id)
    }

    pub fn get(&self, id: i64) -> Option<&Item> {
        self.id_to_idx.get(&id).map(|&idx| &self.items[idx])
    }

    /// Catalog position of an id, used as the stable ranking tie-break.
    pub(crate) fn to_idx(&self, id: i64) -> EngineResult<usize> {
        self.id_to_idx.get(&id).copied().ok_or(EngineError::UnknownItem(id))
    }

    pub(crate) fn id_at(&self, idx: usize) -> i64 {
        self.items[idx].id
    }

    /// Convert judgments to internal `(winner_idx, loser_idx)` tuples in
    /// ledger order. Fails on any id outside the catalog.
    pub(crate) fn to_indexed(&self, judgments: &[Judgment]) -> EngineResult<Vec<(usize, usize)>> {
        judgments
            .iter()
            .map(|j| Ok((self.to_idx(j.winner)?, self.to_idx(j.loser())?)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(names: &[&str]) -> Vec<Item> {
        names
            .iter()
            .enumerate()
            .map(|(i, n)| Item::new(i as i64 + 1, *n))
            .collect()
    }

    #[test]
    fn test_catalog_maps_ids_both_ways() {
        let catalog = Catalog::new(items(&["Asuka", "Rei", "Misato"])).unwrap();
        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.to_idx(2).unwrap(), 1);
        assert_eq!(catalog.id_at(2), 3);
        assert_eq!(catalog.get(1).unwrap().name, "Asuka");
        assert!(catalog.get(9).is_none());
    }

    #[test]
    fn test_catalog_rejects_empty() {
        assert_eq!(Catalog::new(vec![]).unwrap_err(), EngineError::EmptyCatalog);
    }

    #[test]
    fn test_catalog_rejects_duplicate_ids() {
        let mut list = items(&["A", "B"]);
        list.push(Item::new(1, "A again"));
        assert_eq!(Catalog::new(list).unwrap_err(), EngineError::DuplicateItem(1));
    }

    #[test]
    fn test_unknown_id_is_an_error() {
        let catalog = Catalog::new(items(&["A", "B"])).unwrap();
        assert_eq!(catalog.to_idx(42).unwrap_err(), EngineError::UnknownItem(42));
    }
}
