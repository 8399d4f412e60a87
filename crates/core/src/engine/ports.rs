//! Port interfaces for the standby engine
//!
//! These traits define the boundaries between core business logic
//! and the host system. The injector is the only surface the engine
//! depends on; everything external - clocks, charger state, display
//! state, exemption queries - goes through it so tests can script the
//! whole device.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use dozearc_domain::{BucketChange, Result, StandbyEventKind, StandbySnapshot, UserId};

/// Host-side queries and sinks the engine depends on.
///
/// Queries are synchronous and must return promptly; they are only called
/// from the engine task. Fallible queries model host RPC boundaries: on
/// error the engine degrades to conservative defaults rather than failing.
pub trait StandbyInjector: Send + Sync {
    /// Monotonic device-uptime clock, in milliseconds. Pauses in deep idle.
    fn elapsed_realtime(&self) -> u64;

    /// Wall clock, in milliseconds since the epoch.
    fn current_time_millis(&self) -> u64;

    /// Current charger state.
    fn is_charging(&self) -> bool;

    /// Master switch for the whole standby feature.
    fn is_app_idle_enabled(&self) -> bool;

    /// Whether the package holds a power-save exemption that also covers
    /// idle filtering.
    fn is_power_save_whitelist_except_idle(&self, package: &str) -> Result<bool>;

    /// Ephemeral (instant) apps get masked as ACTIVE on request.
    fn is_package_ephemeral(&self, user: UserId, package: &str) -> Result<bool>;

    /// Whether the default display is currently on. Drives the screen-on
    /// clock.
    fn is_default_display_on(&self) -> bool;

    /// Whether the package currently backs a bound widget for this user.
    fn is_bound_widget_package(&self, package: &str, user: UserId) -> Result<bool>;

    /// The package of the active network scorer, if any.
    fn get_active_network_scorer(&self) -> Option<String>;

    /// Users currently running on the device.
    fn get_running_user_ids(&self) -> Vec<UserId>;

    /// Raw threshold configuration string (see the settings parser).
    fn get_app_idle_settings(&self) -> String;

    /// Registers the engine's display-change callback.
    fn register_display_listener(&self, listener: Arc<dyn DisplayListener>);

    /// Observability sink for reported app-usage events.
    fn note_event(&self, kind: StandbyEventKind, package: &str, uid: u32) -> Result<()>;

    /// Root directory for engine persistence.
    fn get_data_system_directory(&self) -> PathBuf;
}

/// Callback the engine registers with the injector to learn about display
/// state changes.
pub trait DisplayListener: Send + Sync {
    fn on_display_changed(&self);
}

/// Receives value notifications whenever a commit changes an app's bucket.
pub trait BucketChangeListener: Send + Sync {
    fn on_bucket_changed(&self, change: &BucketChange);
}

/// Persistence port for history checkpoints. The engine emits snapshots;
/// where and how they are stored is an adapter concern.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Persist a snapshot, replacing any previous one.
    async fn save(&self, snapshot: &StandbySnapshot) -> Result<()>;

    /// Load the most recent snapshot, or `None` when none was ever saved.
    async fn load(&self) -> Result<Option<StandbySnapshot>>;
}
