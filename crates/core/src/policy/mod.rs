//! Bucket policy - the decision core.
//!
//! Everything in this module is a pure function of its arguments: no clocks,
//! no locks, no stored state. The controller feeds it history records and
//! clock readings; it answers "which bucket" and "is this write allowed".
//!
//! Two modes, per the two ways buckets change:
//! - *timeout-driven classification*, used by the scanner: both the elapsed
//!   clock and the screen-on clock must have advanced past a bucket's
//!   threshold since last use for the app to sink into it;
//! - *source-arbitrated assignment*, used by external writers: an explicit
//!   acceptance matrix over (incoming reason, current reason), plus three
//!   side conditions, decides whether the write lands.

use dozearc_domain::{
    AppUsageHistory, ReasonSource, StandbyBucket, StandbySettings, THRESHOLD_BUCKETS,
};

/// Acceptance matrix for source-arbitrated assignment, indexed as
/// `ACCEPTS[incoming.index()][current.index()]` with the index order
/// Default, Usage, Timeout, Predicted, Forced.
///
/// Forced writes always land; nothing but another forced write may follow a
/// forced one; a default write only ever lands on untouched state.
const ACCEPTS: [[bool; 5]; 5] = [
    // current:  Default Usage  Timeout Predicted Forced
    /* Default   */ [true, false, false, false, false],
    /* Usage     */ [true, true, true, true, false],
    /* Timeout   */ [true, true, true, true, false],
    /* Predicted */ [true, true, true, true, false],
    /* Forced    */ [true, true, true, true, true],
];

/// Timeout-driven classification.
///
/// `elapsed_since_use` and `screen_on_since_use` are the two clock deltas
/// since the last user interaction. An app qualifies for a bucket only when
/// *both* deltas meet that bucket's threshold; the most idle qualifying
/// bucket wins, `Active` if none does. `Never` is not reachable this way.
pub fn bucket_for_usage(
    elapsed_since_use: u64,
    screen_on_since_use: u64,
    settings: &StandbySettings,
) -> StandbyBucket {
    for (rank, bucket) in THRESHOLD_BUCKETS.iter().enumerate().rev() {
        if elapsed_since_use >= settings.elapsed_thresholds[rank]
            && screen_on_since_use >= settings.screen_thresholds[rank]
        {
            return *bucket;
        }
    }
    StandbyBucket::Active
}

/// Whether a predicted assignment has outlived its authority.
///
/// Only meaningful when the current reason is `Predicted`; a record that
/// has never been predicted never expires.
pub fn prediction_expired(
    history: &AppUsageHistory,
    now_elapsed: u64,
    settings: &StandbySettings,
) -> bool {
    match history.last_predicted_at_elapsed {
        Some(predicted_at) => {
            now_elapsed.saturating_sub(predicted_at) >= settings.prediction_timeout_ms
        }
        None => true,
    }
}

/// Source-arbitrated assignment decision.
///
/// `usage_candidate` is the timeout-driven classification at the write's
/// timestamp; it feeds the usage-recency guard. Returns `true` when the
/// write should be committed. Rejections are silent by contract.
pub fn assignment_accepted(
    current: &AppUsageHistory,
    new_bucket: StandbyBucket,
    new_source: ReasonSource,
    usage_candidate: StandbyBucket,
) -> bool {
    if !ACCEPTS[new_source.index()][current.current_reason.source.index()] {
        return false;
    }

    if new_source == ReasonSource::Predicted {
        // Predictions may neither produce NEVER nor resurrect an app that
        // some non-predicted writer parked there.
        if new_bucket == StandbyBucket::Never || current.current_bucket == StandbyBucket::Never {
            return false;
        }
        // Usage-recency guard: while the app is still inside its
        // usage-driven ACTIVE window, recency wins over prediction.
        if current.current_reason.source == ReasonSource::Usage
            && usage_candidate == StandbyBucket::Active
        {
            return false;
        }
    }

    true
}

/// Scanner evaluation for one record.
///
/// Returns the bucket a `Timeout` commit should move the app to, or `None`
/// when the scanner must leave the record alone: forced records, records
/// parked in NEVER by a non-predicted writer, records under a fresh
/// prediction, and records whose candidate is not more idle than what they
/// already have.
pub fn evaluate_for_scan(
    history: &AppUsageHistory,
    now_elapsed: u64,
    screen_on_now: u64,
    settings: &StandbySettings,
) -> Option<StandbyBucket> {
    if history.current_reason.is_forced() {
        return None;
    }
    if history.current_bucket == StandbyBucket::Never && !history.current_reason.is_predicted() {
        return None;
    }
    if history.current_reason.is_predicted() && !prediction_expired(history, now_elapsed, settings)
    {
        return None;
    }

    let candidate = bucket_for_usage(
        now_elapsed.saturating_sub(history.last_used_elapsed),
        screen_on_now.saturating_sub(history.last_used_screen_on),
        settings,
    );
    (candidate > history.current_bucket).then_some(candidate)
}

#[cfg(test)]
mod tests {
    use dozearc_domain::constants::HOUR_MS;
    use dozearc_domain::BucketingReason;

    use super::*;

    fn test_settings() -> StandbySettings {
        StandbySettings {
            screen_thresholds: [0, 0, 0, HOUR_MS],
            elapsed_thresholds: [0, 12 * HOUR_MS, 24 * HOUR_MS, 48 * HOUR_MS],
            prediction_timeout_ms: 12 * HOUR_MS,
        }
    }

    fn history_with(bucket: StandbyBucket, source: ReasonSource) -> AppUsageHistory {
        let mut history = AppUsageHistory::new_at(0, 0);
        history.current_bucket = bucket;
        history.current_reason = BucketingReason::new(source);
        history
    }

    #[test]
    fn classification_walks_the_thresholds() {
        let settings = test_settings();
        assert_eq!(bucket_for_usage(0, 0, &settings), StandbyBucket::Active);
        assert_eq!(
            bucket_for_usage(12 * HOUR_MS - 1, u64::MAX, &settings),
            StandbyBucket::Active
        );
        assert_eq!(
            bucket_for_usage(12 * HOUR_MS, u64::MAX, &settings),
            StandbyBucket::WorkingSet
        );
        assert_eq!(
            bucket_for_usage(24 * HOUR_MS, u64::MAX, &settings),
            StandbyBucket::Frequent
        );
        assert_eq!(bucket_for_usage(48 * HOUR_MS, u64::MAX, &settings), StandbyBucket::Rare);
    }

    #[test]
    fn both_clocks_must_agree() {
        let settings = test_settings();
        // Plenty of elapsed time but no screen-on time: RARE stays out of
        // reach, FREQUENT (screen threshold 0) does not.
        assert_eq!(
            bucket_for_usage(100 * HOUR_MS, HOUR_MS - 1, &settings),
            StandbyBucket::Frequent
        );
        assert_eq!(bucket_for_usage(100 * HOUR_MS, HOUR_MS, &settings), StandbyBucket::Rare);
    }

    #[test]
    fn forced_blocks_everything_but_forced() {
        let current = history_with(StandbyBucket::Frequent, ReasonSource::Forced);
        for source in [ReasonSource::Default, ReasonSource::Usage, ReasonSource::Timeout] {
            assert!(!assignment_accepted(
                &current,
                StandbyBucket::WorkingSet,
                source,
                StandbyBucket::Rare
            ));
        }
        assert!(!assignment_accepted(
            &current,
            StandbyBucket::WorkingSet,
            ReasonSource::Predicted,
            StandbyBucket::Rare
        ));
        assert!(assignment_accepted(
            &current,
            StandbyBucket::Never,
            ReasonSource::Forced,
            StandbyBucket::Rare
        ));
    }

    #[test]
    fn predictions_never_touch_never() {
        let parked = history_with(StandbyBucket::Never, ReasonSource::Default);
        assert!(!assignment_accepted(
            &parked,
            StandbyBucket::Active,
            ReasonSource::Predicted,
            StandbyBucket::Rare
        ));

        let active = history_with(StandbyBucket::Active, ReasonSource::Timeout);
        assert!(!assignment_accepted(
            &active,
            StandbyBucket::Never,
            ReasonSource::Predicted,
            StandbyBucket::Rare
        ));
    }

    #[test]
    fn recency_guard_defers_predictions_over_fresh_usage() {
        let current = history_with(StandbyBucket::Active, ReasonSource::Usage);
        // App would still classify as ACTIVE: prediction loses.
        assert!(!assignment_accepted(
            &current,
            StandbyBucket::Frequent,
            ReasonSource::Predicted,
            StandbyBucket::Active
        ));
        // Usage window lapsed: prediction lands.
        assert!(assignment_accepted(
            &current,
            StandbyBucket::Frequent,
            ReasonSource::Predicted,
            StandbyBucket::WorkingSet
        ));
        // The guard is specific to usage-sourced state.
        let timed_out = history_with(StandbyBucket::Rare, ReasonSource::Timeout);
        assert!(assignment_accepted(
            &timed_out,
            StandbyBucket::Active,
            ReasonSource::Predicted,
            StandbyBucket::Active
        ));
    }

    #[test]
    fn default_only_lands_on_untouched_state() {
        let untouched = history_with(StandbyBucket::Never, ReasonSource::Default);
        assert!(assignment_accepted(
            &untouched,
            StandbyBucket::Rare,
            ReasonSource::Default,
            StandbyBucket::Active
        ));
        let used = history_with(StandbyBucket::Active, ReasonSource::Usage);
        assert!(!assignment_accepted(
            &used,
            StandbyBucket::Rare,
            ReasonSource::Default,
            StandbyBucket::Active
        ));
    }

    #[test]
    fn scanner_skips_forced_and_parked_records() {
        let settings = test_settings();
        let forced = history_with(StandbyBucket::Rare, ReasonSource::Forced);
        assert_eq!(evaluate_for_scan(&forced, 100 * HOUR_MS, 100 * HOUR_MS, &settings), None);

        let parked = history_with(StandbyBucket::Never, ReasonSource::Default);
        assert_eq!(evaluate_for_scan(&parked, 100 * HOUR_MS, 100 * HOUR_MS, &settings), None);
    }

    #[test]
    fn scanner_honors_fresh_predictions_and_expires_stale_ones() {
        let settings = test_settings();
        let mut predicted = history_with(StandbyBucket::Active, ReasonSource::Predicted);
        predicted.last_predicted_bucket = Some(StandbyBucket::Active);
        predicted.last_predicted_at_elapsed = Some(HOUR_MS);

        // Eleven hours into a twelve-hour prediction: untouched.
        assert_eq!(evaluate_for_scan(&predicted, 12 * HOUR_MS, 12 * HOUR_MS, &settings), None);
        // Thirteen hours in: decays by timeout classification.
        assert_eq!(
            evaluate_for_scan(&predicted, 14 * HOUR_MS, 14 * HOUR_MS, &settings),
            Some(StandbyBucket::WorkingSet)
        );
    }

    #[test]
    fn scanner_never_promotes() {
        let settings = test_settings();
        let mut rare = history_with(StandbyBucket::Rare, ReasonSource::Timeout);
        rare.last_used_elapsed = 0;
        rare.last_used_screen_on = 0;
        // Candidate at 1h would be ACTIVE, which is less idle: no action.
        assert_eq!(evaluate_for_scan(&rare, HOUR_MS, HOUR_MS, &settings), None);
    }
}
