use serde::{Deserialize, Serialize};

/// One side of a conversation turn, as persisted.
///
/// `id` is the insertion sequence and the only ordering guarantee;
/// `timestamp` (RFC 3339 UTC) is informational.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: i64,
    pub timestamp: String,
    pub chat_id: i64,
    pub chat_name: String,
    pub user_id: i64,
    pub full_name: String,
    pub message: String,
}
