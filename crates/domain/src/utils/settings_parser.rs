//! App-idle settings string parser.
//!
//! The host hands the engine a single configuration string of the form
//! `screen_thresholds=A/B/C/D,elapsed_thresholds=E/F/G/H` (values in
//! milliseconds, four entries per vector, non-decreasing), optionally
//! followed by `prediction_timeout=N`. Parsing is never fatal: a missing or
//! malformed field falls back to the compiled-in default for that field and
//! the engine keeps running.

use tracing::warn;

use crate::constants::{KEY_ELAPSED_THRESHOLDS, KEY_PREDICTION_TIMEOUT, KEY_SCREEN_THRESHOLDS};
use crate::types::settings::StandbySettings;

/// Parse a settings string, falling back to defaults per field.
pub fn parse_app_idle_settings(raw: &str) -> StandbySettings {
    let mut settings = StandbySettings::default();

    for field in raw.split(',').map(str::trim).filter(|f| !f.is_empty()) {
        let Some((key, value)) = field.split_once('=') else {
            warn!(field, "app idle settings field has no '=', ignoring");
            continue;
        };
        match key.trim() {
            KEY_SCREEN_THRESHOLDS => {
                if let Some(vector) = parse_threshold_vector(value) {
                    settings.screen_thresholds = vector;
                } else {
                    warn!(value, "malformed screen thresholds, using defaults");
                }
            }
            KEY_ELAPSED_THRESHOLDS => {
                if let Some(vector) = parse_threshold_vector(value) {
                    settings.elapsed_thresholds = vector;
                } else {
                    warn!(value, "malformed elapsed thresholds, using defaults");
                }
            }
            KEY_PREDICTION_TIMEOUT => match value.trim().parse::<u64>() {
                Ok(ms) => settings.prediction_timeout_ms = ms,
                Err(_) => warn!(value, "malformed prediction timeout, using default"),
            },
            other => {
                warn!(key = other, "unknown app idle settings key, ignoring");
            }
        }
    }

    settings
}

/// Parse `A/B/C/D` into a non-decreasing four-entry vector. Returns `None`
/// on any shape or ordering violation so the caller can fall back whole.
fn parse_threshold_vector(value: &str) -> Option<[u64; 4]> {
    let mut out = [0u64; 4];
    let mut count = 0;

    for entry in value.split('/') {
        if count == 4 {
            return None;
        }
        out[count] = entry.trim().parse::<u64>().ok()?;
        count += 1;
    }
    if count != 4 {
        return None;
    }
    if out.windows(2).any(|pair| pair[0] > pair[1]) {
        return None;
    }
    Some(out)
}
