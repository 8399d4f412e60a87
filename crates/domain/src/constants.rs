//! Domain constants
//!
//! Centralized location for all domain-level constants used throughout the
//! controller.

// Time units, in milliseconds
pub const MINUTE_MS: u64 = 60 * 1000;
pub const HOUR_MS: u64 = 60 * MINUTE_MS;
pub const DAY_MS: u64 = 24 * HOUR_MS;

// Raw wire values for the five standby buckets. The numeric gaps are
// load-bearing: policy comparisons use integer order.
pub const BUCKET_ACTIVE: u32 = 10;
pub const BUCKET_WORKING_SET: u32 = 20;
pub const BUCKET_FREQUENT: u32 = 30;
pub const BUCKET_RARE: u32 = 40;
pub const BUCKET_NEVER: u32 = 50;

// Default elapsed-time thresholds, indexed by [ACTIVE, WORKING_SET,
// FREQUENT, RARE]. Entry 0 is always zero.
pub const DEFAULT_ELAPSED_THRESHOLDS: [u64; 4] = [0, 12 * HOUR_MS, 24 * HOUR_MS, 48 * HOUR_MS];

// Default screen-on thresholds, same indexing.
pub const DEFAULT_SCREEN_THRESHOLDS: [u64; 4] = [0, 0, 0, HOUR_MS];

/// How long a predicted assignment stays authoritative before the scanner
/// resumes timeout-driven decay.
pub const DEFAULT_PREDICTION_TIMEOUT_MS: u64 = 12 * HOUR_MS;

// Settings-string field names
pub const KEY_SCREEN_THRESHOLDS: &str = "screen_thresholds";
pub const KEY_ELAPSED_THRESHOLDS: &str = "elapsed_thresholds";
pub const KEY_PREDICTION_TIMEOUT: &str = "prediction_timeout";

/// Uids below this value belong to the system image and are never
/// idle-filtered.
pub const FIRST_APPLICATION_UID: u32 = 10_000;

/// Checkpoint snapshot format version accepted by `restore`.
pub const SNAPSHOT_VERSION: u32 = 1;
