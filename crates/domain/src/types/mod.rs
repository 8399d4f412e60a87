//! Domain types and models

pub mod bucket;
pub mod history;
pub mod settings;
pub mod snapshot;

pub use bucket::{BucketingReason, ReasonSource, StandbyBucket, THRESHOLD_BUCKETS};
pub use history::{
    AppUsageHistory, BootPhase, BucketChange, StandbyEvent, StandbyEventKind, UserId,
};
pub use settings::StandbySettings;
pub use snapshot::{PackageSnapshot, StandbySnapshot, UserSnapshot};
