//! Threshold settings for the bucket policy.

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_ELAPSED_THRESHOLDS, DEFAULT_PREDICTION_TIMEOUT_MS, DEFAULT_SCREEN_THRESHOLDS,
    KEY_ELAPSED_THRESHOLDS, KEY_PREDICTION_TIMEOUT, KEY_SCREEN_THRESHOLDS,
};
use crate::types::bucket::StandbyBucket;

/// Parsed bucket-policy thresholds.
///
/// Both vectors are indexed by the rank of `[ACTIVE, WORKING_SET, FREQUENT,
/// RARE]` and hold the minimum accumulated time, in milliseconds, required to
/// *enter* the bucket at that rank. Entry 0 is always zero. Vectors are
/// monotonically non-decreasing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandbySettings {
    pub screen_thresholds: [u64; 4],
    pub elapsed_thresholds: [u64; 4],
    /// How long a predicted assignment stays authoritative before the
    /// scanner resumes timeout-driven decay.
    pub prediction_timeout_ms: u64,
}

impl Default for StandbySettings {
    fn default() -> Self {
        Self {
            screen_thresholds: DEFAULT_SCREEN_THRESHOLDS,
            elapsed_thresholds: DEFAULT_ELAPSED_THRESHOLDS,
            prediction_timeout_ms: DEFAULT_PREDICTION_TIMEOUT_MS,
        }
    }
}

impl StandbySettings {
    /// Elapsed-time threshold for entering `bucket`. `Never` has no
    /// threshold; callers must not ask for it.
    pub fn elapsed_threshold(&self, bucket: StandbyBucket) -> Option<u64> {
        bucket.threshold_rank().map(|rank| self.elapsed_thresholds[rank])
    }

    /// Screen-on-time threshold for entering `bucket`.
    pub fn screen_threshold(&self, bucket: StandbyBucket) -> Option<u64> {
        bucket.threshold_rank().map(|rank| self.screen_thresholds[rank])
    }

    /// Canonical settings-string rendering of these thresholds. Parsing the
    /// result with `parse_app_idle_settings` yields `self` back.
    pub fn to_config_string(&self) -> String {
        let join = |v: &[u64; 4]| {
            v.iter().map(|ms| ms.to_string()).collect::<Vec<_>>().join("/")
        };
        format!(
            "{KEY_SCREEN_THRESHOLDS}={},{KEY_ELAPSED_THRESHOLDS}={},{KEY_PREDICTION_TIMEOUT}={}",
            join(&self.screen_thresholds),
            join(&self.elapsed_thresholds),
            self.prediction_timeout_ms,
        )
    }
}
