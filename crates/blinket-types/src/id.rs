//! Mongo-backed documents carry `_id` next to (or instead of) the named key.

/// Prefers the named key and falls back to `_id`. Empty strings count as absent.
pub(crate) fn resolve(named: Option<String>, mongo_id: Option<String>) -> Option<String> {
    named
        .filter(|id| !id.is_empty())
        .or_else(|| mongo_id.filter(|id| !id.is_empty()))
}
