/// Minimum number of direct judgments before a derived ranking is worth
/// presenting as a user's considered preference order. Below this, callers
/// should label the result as low-confidence. The engine only exposes the
/// count; the policy lives with the caller.
pub const MIN_JUDGMENTS_FOR_CONFIDENT_RANKING: usize = 15;

/// Default age bound for the stale-session cleanup pass. Sessions untouched
/// for longer than this are aborted and removed from the session store.
pub const DEFAULT_SESSION_MAX_AGE_HOURS: i64 = 24;
