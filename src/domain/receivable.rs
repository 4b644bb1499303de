//! Deferred receivable: a store whose cash will be settled later.

use crate::domain::TimeMs;
use serde::{Deserialize, Serialize};

/// Store-level deferred settlement marker.
///
/// At most one unreceived row may exist per (route, store); the `received`
/// flag flips exactly once and never reverts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeferredReceivable {
    pub id: i64,
    pub route_id: i64,
    pub store_id: i64,
    pub received: bool,
    pub marked_at: TimeMs,
    pub received_at: Option<TimeMs>,
}
