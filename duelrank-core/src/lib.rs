/// duelrank-core: Pairwise-comparison ranking engine.
///
/// Binary "A or B?" judgments → consistent total order, with undo, progress
/// estimation, and a cross-user global aggregate. No IO, no HTTP — storage
/// and transport plug in behind the traits in [`store`].
///
/// Items are identified by caller-provided `i64` IDs. The crate handles the
/// internal mapping to efficient array indices — callers never think about
/// indices.
///
/// # Quick start
///
/// ```rust
/// use std::sync::Arc;
/// use duelrank_core::{
///     Item, MemoryCatalogProvider, MemoryGlobalStore, MemorySessionStore,
///     SessionManager, StartScope,
/// };
///
/// let items = vec![Item::new(1, "Asuka"), Item::new(2, "Rei"), Item::new(3, "Misato")];
/// let manager = SessionManager::new(
///     Arc::new(MemoryCatalogProvider::new(items)),
///     Arc::new(MemorySessionStore::new()),
///     Arc::new(MemoryGlobalStore::new()),
/// );
///
/// let mut outcome = manager.start_or_resume(42, StartScope::Full, None).unwrap();
/// while let Some(pair) = outcome.next_pair {
///     // Ask the user; here the lower id always wins.
///     outcome = manager.submit_choice(42, pair, pair.lo()).unwrap();
/// }
///
/// for row in outcome.ranking.unwrap() {
///     println!("{}. {}", row.position, row.display_name);
/// }
/// ```

pub mod aggregate;
pub mod catalog;
pub mod constants;
pub mod errors;
mod graph;
pub mod ledger;
pub mod manager;
pub mod ranking;
pub mod selector;
pub mod session;
pub mod store;
pub mod types;

// Re-export primary public API at crate root.
pub use aggregate::{FoldOutcome, GlobalAggregator};
pub use catalog::{Catalog, ItemScope};
pub use errors::{EngineError, EngineResult};
pub use ledger::Ledger;
pub use manager::{SessionManager, StartScope};
pub use ranking::derive;
pub use selector::next_pair;
pub use session::{Session, SessionScope, SessionState, TurnOutcome};
pub use store::{
    CatalogProvider, FoldDelta, GlobalStore, MemoryCatalogProvider, MemoryGlobalStore,
    MemorySessionStore, SessionStore, SharedCatalogProvider, SharedGlobalStore,
    SharedSessionStore,
};
pub use types::{
    DerivedRanking, GlobalEntry, Item, Judgment, Pair, Progress, RankedEntry, RankingRow,
};
