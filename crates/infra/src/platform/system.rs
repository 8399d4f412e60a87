//! Default injector for embedding the engine in a host process.
//!
//! The host wires its battery, display, and package broadcasts into the
//! setters here; the engine sees them through the `StandbyInjector` trait.
//! Clocks: elapsed time is process uptime (a host with real suspend-aware
//! clocks should supply its own injector); wall time comes from `chrono`.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use tracing::debug;

use dozearc_core::{DisplayListener, StandbyInjector};
use dozearc_domain::{Result, StandbyEventKind, UserId};

use crate::config::EngineConfig;

struct HostState {
    charging: bool,
    app_idle_enabled: bool,
    display_on: bool,
    whitelist: HashSet<String>,
    widget_packages: HashSet<String>,
    network_scorer: Option<String>,
    ephemeral: HashSet<String>,
    settings: String,
    users: Vec<UserId>,
    data_dir: PathBuf,
}

/// Process-local injector backed by host callbacks.
pub struct SystemInjector {
    started_at: Instant,
    state: RwLock<HostState>,
    display_listener: RwLock<Option<Arc<dyn DisplayListener>>>,
}

impl SystemInjector {
    pub fn new(config: &EngineConfig) -> Arc<Self> {
        let data_dir = config
            .data_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("dozearc"));
        Arc::new(Self {
            started_at: Instant::now(),
            state: RwLock::new(HostState {
                charging: false,
                app_idle_enabled: true,
                display_on: true,
                whitelist: HashSet::new(),
                widget_packages: HashSet::new(),
                network_scorer: None,
                ephemeral: HashSet::new(),
                settings: config.settings_override.clone().unwrap_or_default(),
                users: vec![0],
                data_dir,
            }),
            display_listener: RwLock::new(None),
        })
    }

    // Host-side wiring -------------------------------------------------

    pub fn set_charging(&self, charging: bool) {
        self.state.write().charging = charging;
    }

    pub fn set_app_idle_enabled(&self, enabled: bool) {
        self.state.write().app_idle_enabled = enabled;
    }

    /// Record a display transition and fire the engine's listener.
    pub fn set_display_on(&self, on: bool) {
        self.state.write().display_on = on;
        let listener = self.display_listener.read().clone();
        if let Some(listener) = listener {
            listener.on_display_changed();
        }
    }

    pub fn set_whitelisted(&self, package: &str, whitelisted: bool) {
        let mut state = self.state.write();
        if whitelisted {
            state.whitelist.insert(package.to_string());
        } else {
            state.whitelist.remove(package);
        }
    }

    pub fn set_widget_package(&self, package: &str, bound: bool) {
        let mut state = self.state.write();
        if bound {
            state.widget_packages.insert(package.to_string());
        } else {
            state.widget_packages.remove(package);
        }
    }

    pub fn set_network_scorer(&self, package: Option<String>) {
        self.state.write().network_scorer = package;
    }

    pub fn set_ephemeral(&self, package: &str, ephemeral: bool) {
        let mut state = self.state.write();
        if ephemeral {
            state.ephemeral.insert(package.to_string());
        } else {
            state.ephemeral.remove(package);
        }
    }

    pub fn set_settings(&self, settings: String) {
        self.state.write().settings = settings;
    }

    pub fn set_running_users(&self, users: Vec<UserId>) {
        self.state.write().users = users;
    }
}

impl StandbyInjector for SystemInjector {
    fn elapsed_realtime(&self) -> u64 {
        self.started_at.elapsed().as_millis() as u64
    }

    fn current_time_millis(&self) -> u64 {
        chrono::Utc::now().timestamp_millis().max(0) as u64
    }

    fn is_charging(&self) -> bool {
        self.state.read().charging
    }

    fn is_app_idle_enabled(&self) -> bool {
        self.state.read().app_idle_enabled
    }

    fn is_power_save_whitelist_except_idle(&self, package: &str) -> Result<bool> {
        Ok(self.state.read().whitelist.contains(package))
    }

    fn is_package_ephemeral(&self, _user: UserId, package: &str) -> Result<bool> {
        Ok(self.state.read().ephemeral.contains(package))
    }

    fn is_default_display_on(&self) -> bool {
        self.state.read().display_on
    }

    fn is_bound_widget_package(&self, package: &str, _user: UserId) -> Result<bool> {
        Ok(self.state.read().widget_packages.contains(package))
    }

    fn get_active_network_scorer(&self) -> Option<String> {
        self.state.read().network_scorer.clone()
    }

    fn get_running_user_ids(&self) -> Vec<UserId> {
        self.state.read().users.clone()
    }

    fn get_app_idle_settings(&self) -> String {
        self.state.read().settings.clone()
    }

    fn register_display_listener(&self, listener: Arc<dyn DisplayListener>) {
        *self.display_listener.write() = Some(listener);
    }

    fn note_event(&self, kind: StandbyEventKind, package: &str, uid: u32) -> Result<()> {
        debug!(?kind, package, uid, "usage event noted");
        Ok(())
    }

    fn get_data_system_directory(&self) -> PathBuf {
        self.state.read().data_dir.clone()
    }
}
