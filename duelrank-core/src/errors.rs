//! Error types for the ranking engine.
//!
//! Every variant is a local, recoverable condition reported to the caller.
//! The engine has no fatal error category: internal inconsistencies degrade
//! to an `approximate` ranking instead of failing the request.

use uuid::Uuid;

use crate::types::Pair;

/// Top-level error enum for the ranking engine.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    /// The submitted winner is not a member of the submitted pair.
    #[error("winner {winner} is not a member of pair ({}, {})", .pair.lo(), .pair.hi())]
    InvalidJudgment { pair: Pair, winner: i64 },

    /// The submitted pair does not match the pair most recently issued for
    /// this session — likely a duplicate or retried request.
    #[error("submitted pair does not match the last issued pair")]
    StalePair { submitted: Pair, issued: Option<Pair> },

    /// Undo was requested on a ledger with no entries.
    #[error("nothing to undo")]
    EmptyLedger,

    /// A fold was attempted on a session that has not completed.
    #[error("session {0} is not completed")]
    IncompleteSession(Uuid),

    /// A catalog was required but the provider returned no items.
    #[error("catalog has no items")]
    EmptyCatalog,

    /// Two catalog items share an id.
    #[error("duplicate item id {0} in catalog")]
    DuplicateItem(i64),

    /// A judgment or request references an id outside the catalog.
    #[error("item {0} is not in the catalog")]
    UnknownItem(i64),

    /// The operation needs an active session and the user has none.
    #[error("no active session for user {0}")]
    NoActiveSession(i64),

    /// A storage collaborator failed. Carries the backend's message.
    #[error("store error: {0}")]
    Store(String),
}

pub type EngineResult<T> = Result<T, EngineError>;
