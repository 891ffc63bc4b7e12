//! Lock record data models.
//!
//! A `LockedAppRecord` is the only durable state in the engine: which packages
//! are locked, how many minutes one repetition buys, and how much earned time
//! is left.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LockedAppRecord {
    pub package: String,
    pub minutes_per_rep: u32,
    pub remaining_seconds: u32,
    pub updated_at: DateTime<Utc>,
}

impl LockedAppRecord {
    pub fn new(package: impl Into<String>, minutes_per_rep: u32) -> Self {
        Self {
            package: package.into(),
            minutes_per_rep,
            remaining_seconds: 0,
            updated_at: Utc::now(),
        }
    }

    pub fn is_blocked(&self) -> bool {
        self.remaining_seconds == 0
    }

    /// Seconds earned by a single completed repetition.
    pub fn grant_per_rep(&self) -> u32 {
        self.minutes_per_rep.saturating_mul(60)
    }
}

/// On-disk layout of the lock file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct LockFile {
    #[serde(default)]
    pub locks: Vec<LockedAppRecord>,
}

/// Applies a signed delta to a non-negative counter, clamping at zero.
pub(crate) fn apply_delta(current: u32, delta: i64) -> u32 {
    let next = i64::from(current).saturating_add(delta);
    next.clamp(0, i64::from(u32::MAX)) as u32
}

pub(crate) fn clamp_seconds(seconds: i64) -> u32 {
    seconds.clamp(0, i64::from(u32::MAX)) as u32
}
