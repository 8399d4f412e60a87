//! Standby buckets and bucketing reasons.
//!
//! A bucket is the standby classification of one app for one user; lower
//! values are more active. A reason records which source most recently
//! assigned the current bucket and therefore which later writers may
//! overwrite it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::{
    BUCKET_ACTIVE, BUCKET_FREQUENT, BUCKET_NEVER, BUCKET_RARE, BUCKET_WORKING_SET,
};
use crate::errors::DozeArcError;

/// Standby classification for one (user, package) pair.
///
/// Total order follows the raw values: `Active(10) < WorkingSet(20) <
/// Frequent(30) < Rare(40) < Never(50)`. "Greater" always means "more idle".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StandbyBucket {
    Active,
    WorkingSet,
    Frequent,
    Rare,
    Never,
}

/// Buckets that can be entered via the dual-clock timeout thresholds, in
/// ascending idleness. Index into this array is the rank used to address the
/// threshold vectors.
pub const THRESHOLD_BUCKETS: [StandbyBucket; 4] = [
    StandbyBucket::Active,
    StandbyBucket::WorkingSet,
    StandbyBucket::Frequent,
    StandbyBucket::Rare,
];

impl StandbyBucket {
    /// Raw wire value of this bucket.
    pub fn value(self) -> u32 {
        match self {
            Self::Active => BUCKET_ACTIVE,
            Self::WorkingSet => BUCKET_WORKING_SET,
            Self::Frequent => BUCKET_FREQUENT,
            Self::Rare => BUCKET_RARE,
            Self::Never => BUCKET_NEVER,
        }
    }

    /// Parse a raw wire value. External callers hand us untrusted integers;
    /// anything outside the five defined values is rejected.
    pub fn from_value(value: u32) -> Result<Self, DozeArcError> {
        match value {
            BUCKET_ACTIVE => Ok(Self::Active),
            BUCKET_WORKING_SET => Ok(Self::WorkingSet),
            BUCKET_FREQUENT => Ok(Self::Frequent),
            BUCKET_RARE => Ok(Self::Rare),
            BUCKET_NEVER => Ok(Self::Never),
            other => Err(DozeArcError::InvalidBucket(other)),
        }
    }

    /// Rank of this bucket in [`THRESHOLD_BUCKETS`], or `None` for `Never`,
    /// which is never entered via thresholds.
    pub fn threshold_rank(self) -> Option<usize> {
        THRESHOLD_BUCKETS.iter().position(|b| *b == self)
    }

    /// The next more-idle threshold bucket, saturating at `Rare`. `Never`
    /// is not reachable by decay.
    pub fn next_more_idle(self) -> StandbyBucket {
        match self {
            Self::Active => Self::WorkingSet,
            Self::WorkingSet => Self::Frequent,
            Self::Frequent | Self::Rare => Self::Rare,
            Self::Never => Self::Never,
        }
    }
}

impl fmt::Display for StandbyBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Active => "active",
            Self::WorkingSet => "working_set",
            Self::Frequent => "frequent",
            Self::Rare => "rare",
            Self::Never => "never",
        };
        write!(f, "{name}")
    }
}

/// The source of a bucket assignment, in increasing authority for the
/// purposes of the acceptance matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonSource {
    Default,
    Usage,
    Timeout,
    Predicted,
    Forced,
}

impl ReasonSource {
    /// Stable index used to address the acceptance matrix.
    pub fn index(self) -> usize {
        match self {
            Self::Default => 0,
            Self::Usage => 1,
            Self::Timeout => 2,
            Self::Predicted => 3,
            Self::Forced => 4,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Usage => "usage",
            Self::Timeout => "timeout",
            Self::Predicted => "predicted",
            Self::Forced => "forced",
        }
    }
}

/// Why the current bucket was assigned.
///
/// The optional subtag (`predicted:cts`) identifies the concrete writer for
/// diagnostics. Policy never consults it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketingReason {
    pub source: ReasonSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtag: Option<String>,
}

impl BucketingReason {
    pub fn new(source: ReasonSource) -> Self {
        Self { source, subtag: None }
    }

    pub fn with_subtag(source: ReasonSource, subtag: impl Into<String>) -> Self {
        Self { source, subtag: Some(subtag.into()) }
    }

    pub const DEFAULT: Self = Self { source: ReasonSource::Default, subtag: None };

    pub fn is_predicted(&self) -> bool {
        self.source == ReasonSource::Predicted
    }

    pub fn is_forced(&self) -> bool {
        self.source == ReasonSource::Forced
    }
}

impl From<ReasonSource> for BucketingReason {
    fn from(source: ReasonSource) -> Self {
        Self::new(source)
    }
}

impl fmt::Display for BucketingReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.subtag {
            Some(tag) => write!(f, "{}:{tag}", self.source.as_str()),
            None => write!(f, "{}", self.source.as_str()),
        }
    }
}

impl FromStr for BucketingReason {
    type Err = DozeArcError;

    /// Parses `source[:subtag]`, e.g. `usage` or `predicted:cts`. The source
    /// is matched case-insensitively; the subtag is kept verbatim.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (source, subtag) = match s.split_once(':') {
            Some((source, tag)) => (source, Some(tag.to_string())),
            None => (s, None),
        };
        let source = match source.to_ascii_lowercase().as_str() {
            "default" => ReasonSource::Default,
            "usage" => ReasonSource::Usage,
            "timeout" => ReasonSource::Timeout,
            "predicted" => ReasonSource::Predicted,
            "forced" => ReasonSource::Forced,
            _ => return Err(DozeArcError::InvalidReason(s.to_string())),
        };
        Ok(Self { source, subtag })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_order_follows_raw_values() {
        assert!(StandbyBucket::Active < StandbyBucket::WorkingSet);
        assert!(StandbyBucket::WorkingSet < StandbyBucket::Frequent);
        assert!(StandbyBucket::Frequent < StandbyBucket::Rare);
        assert!(StandbyBucket::Rare < StandbyBucket::Never);

        let values: Vec<u32> =
            THRESHOLD_BUCKETS.iter().map(|b| b.value()).collect();
        assert_eq!(values, vec![10, 20, 30, 40]);
        assert_eq!(StandbyBucket::Never.value(), 50);
    }

    #[test]
    fn from_value_round_trips_and_rejects_unknown() {
        for bucket in [
            StandbyBucket::Active,
            StandbyBucket::WorkingSet,
            StandbyBucket::Frequent,
            StandbyBucket::Rare,
            StandbyBucket::Never,
        ] {
            assert_eq!(StandbyBucket::from_value(bucket.value()).unwrap(), bucket);
        }
        assert!(matches!(
            StandbyBucket::from_value(15),
            Err(DozeArcError::InvalidBucket(15))
        ));
    }

    #[test]
    fn threshold_rank_excludes_never() {
        assert_eq!(StandbyBucket::Active.threshold_rank(), Some(0));
        assert_eq!(StandbyBucket::Rare.threshold_rank(), Some(3));
        assert_eq!(StandbyBucket::Never.threshold_rank(), None);
    }

    #[test]
    fn reason_parses_with_and_without_subtag() {
        let plain: BucketingReason = "usage".parse().unwrap();
        assert_eq!(plain.source, ReasonSource::Usage);
        assert_eq!(plain.subtag, None);

        let tagged: BucketingReason = "predicted:CTS".parse().unwrap();
        assert_eq!(tagged.source, ReasonSource::Predicted);
        assert_eq!(tagged.subtag.as_deref(), Some("CTS"));
        assert_eq!(tagged.to_string(), "predicted:CTS");

        assert!("bogus".parse::<BucketingReason>().is_err());
    }
}
