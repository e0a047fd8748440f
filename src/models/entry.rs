use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A journal entry. `date` is an ISO `YYYY-MM-DD` string, so lexicographic
/// order is date order. `tags` is a denormalized display cache; the
/// `entry_tags` table is the source of truth for tag membership.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Entry {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub date: String,
    pub time_spent: i64,
    pub learned: String,
    pub resources: String,
    pub tags: String,
    pub private: bool,
    pub hidden: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// Normalize the visibility flag pair before any write: a hidden entry is
/// always also private.
pub fn normalize_visibility(private: bool, hidden: bool) -> (bool, bool) {
    if hidden { (true, true) } else { (private, hidden) }
}
