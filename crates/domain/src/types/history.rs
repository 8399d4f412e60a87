//! Per-app usage history and the values that flow around it.

use serde::{Deserialize, Serialize};

use super::bucket::{BucketingReason, StandbyBucket};

/// Device user id. Multi-user devices run several profiles concurrently;
/// history is kept per (user, package).
pub type UserId = u32;

/// Everything the controller remembers about one (user, package) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppUsageHistory {
    /// Current standby classification.
    pub current_bucket: StandbyBucket,
    /// Source of the current classification.
    pub current_reason: BucketingReason,
    /// Elapsed-clock time at which `current_bucket` was last assigned.
    pub bucket_set_at_elapsed: u64,
    /// Elapsed-clock time of the last user interaction.
    pub last_used_elapsed: u64,
    /// Screen-on-clock time of the last user interaction.
    pub last_used_screen_on: u64,
    /// Most recent predicted bucket, if any prediction was ever applied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_predicted_bucket: Option<StandbyBucket>,
    /// Elapsed-clock time the last prediction was applied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_predicted_at_elapsed: Option<u64>,
    /// Sticky administrative flag pinning the app to RARE or deeper.
    #[serde(default)]
    pub forced_idle: bool,
}

impl AppUsageHistory {
    /// A brand-new record: the app has never been used, so it sits in NEVER
    /// with the default reason until a real signal arrives. Both last-used
    /// clocks are sampled at creation so later timeout arithmetic has a
    /// defined origin.
    pub fn new_at(now_elapsed: u64, now_screen_on: u64) -> Self {
        Self {
            current_bucket: StandbyBucket::Never,
            current_reason: BucketingReason::DEFAULT,
            bucket_set_at_elapsed: now_elapsed,
            last_used_elapsed: now_elapsed,
            last_used_screen_on: now_screen_on,
            last_predicted_bucket: None,
            last_predicted_at_elapsed: None,
            forced_idle: false,
        }
    }
}

/// Value notification published when a commit changes an app's bucket.
/// Listeners receive values, never references into the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketChange {
    pub user: UserId,
    pub package: String,
    pub from: StandbyBucket,
    pub to: StandbyBucket,
    pub reason: BucketingReason,
}

/// Kinds of app-usage events the ingress accepts. Only the first two affect
/// buckets; the rest are forwarded to the observability sink unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StandbyEventKind {
    UserInteraction,
    NotificationSeen,
    MoveToForeground,
    MoveToBackground,
    SystemInteraction,
}

/// One app-usage event as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StandbyEvent {
    pub package: String,
    pub kind: StandbyEventKind,
    /// Uid of the reporting app, when the host knows it. Forwarded to the
    /// observability sink.
    pub uid: Option<u32>,
}

impl StandbyEvent {
    pub fn new(package: impl Into<String>, kind: StandbyEventKind) -> Self {
        Self { package: package.into(), kind, uid: None }
    }

    pub fn with_uid(mut self, uid: u32) -> Self {
        self.uid = Some(uid);
        self
    }
}

/// Host boot phases the engine cares about. Ordering matters: parole stays
/// engaged until `BootCompleted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BootPhase {
    SystemServicesReady,
    BootCompleted,
}
