//! Engine configuration loader
//!
//! Loads runtime configuration from environment variables, falling back to
//! compiled-in defaults. Like the threshold-string parser, loading is never
//! fatal: a malformed value logs a warning and the default wins.
//!
//! ## Environment Variables
//! - `DOZEARC_SCAN_CRON`: Cron expression for the periodic idle scan
//! - `DOZEARC_SETTINGS`: Threshold settings string overriding the injector's
//! - `DOZEARC_CHECKPOINTS_ENABLED`: Whether to persist checkpoints
//!   (true/false)
//! - `DOZEARC_DATA_DIR`: Override for the checkpoint directory

use std::path::PathBuf;

use tracing::warn;

const DEFAULT_SCAN_CRON: &str = "0 */30 * * * *";

/// Runtime configuration for the engine host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Cron expression driving the periodic idle scan.
    pub scan_cron: String,
    /// Optional threshold settings string; when set it takes precedence
    /// over what the injector reports.
    pub settings_override: Option<String>,
    /// Whether history checkpoints are written at all.
    pub checkpoints_enabled: bool,
    /// Override for the checkpoint directory; defaults to the injector's
    /// data system directory.
    pub data_dir: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            scan_cron: DEFAULT_SCAN_CRON.to_string(),
            settings_override: None,
            checkpoints_enabled: true,
            data_dir: None,
        }
    }
}

/// Load configuration from the environment, defaulting field by field.
pub fn load() -> EngineConfig {
    let defaults = EngineConfig::default();
    EngineConfig {
        scan_cron: std::env::var("DOZEARC_SCAN_CRON").unwrap_or(defaults.scan_cron),
        settings_override: std::env::var("DOZEARC_SETTINGS").ok(),
        checkpoints_enabled: env_bool("DOZEARC_CHECKPOINTS_ENABLED", defaults.checkpoints_enabled),
        data_dir: std::env::var("DOZEARC_DATA_DIR").ok().map(PathBuf::from),
    }
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(s) => match s.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            other => {
                warn!(key, value = other, "unparseable boolean, using default");
                default
            }
        },
        Err(_) => default,
    }
}
