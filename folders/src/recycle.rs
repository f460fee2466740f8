//! Recycle bin entries for discarded chunks.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::local::EphemeralChunk;

/// Days a discarded chunk stays restorable.
pub const RETENTION_DAYS: i64 = 30;

pub fn default_retention() -> Duration {
    Duration::days(RETENTION_DAYS)
}

/// A discarded chunk awaiting restore or purge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecycledChunk {
    #[serde(flatten)]
    pub chunk: EphemeralChunk,

    pub deleted_at: DateTime<Utc>,
}

impl RecycledChunk {
    pub fn expires_at(&self, retention: Duration) -> DateTime<Utc> {
        self.deleted_at + retention
    }

    /// Whether the entry may be purged at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>, retention: Duration) -> bool {
        now >= self.expires_at(retention)
    }

    /// Whole days until purge, never negative.
    pub fn days_left(&self, now: DateTime<Utc>, retention: Duration) -> i64 {
        (self.expires_at(retention) - now).num_days().max(0)
    }
}
