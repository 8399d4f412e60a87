//! Shared test helpers for `dozearc-core` integration tests.
//!
//! `MockInjector` scripts the whole device: clocks, charger, display,
//! exemption lists, and the settings string. Tests mutate it directly and
//! drive the controller synchronously.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;

use dozearc_core::{DisplayListener, StandbyInjector};
use dozearc_domain::{DozeArcError, Result, StandbyEventKind, UserId};

pub const PACKAGE_1: &str = "com.example.foo";
pub const UID_1: u32 = 10_000;
pub const USER_ID: UserId = 0;

pub struct MockState {
    pub elapsed: u64,
    pub charging: bool,
    pub app_idle_enabled: bool,
    pub display_on: bool,
    pub whitelist: HashSet<String>,
    pub widget_package: Option<String>,
    pub network_scorer: Option<String>,
    pub ephemeral: HashSet<String>,
    pub settings: String,
    pub users: Vec<UserId>,
    /// Simulate a host RPC failure on the whitelist query.
    pub fail_whitelist: bool,
    pub noted_events: Vec<(StandbyEventKind, String, u32)>,
}

pub struct MockInjector {
    state: Mutex<MockState>,
    display_listener: Mutex<Option<Arc<dyn DisplayListener>>>,
}

impl MockInjector {
    pub fn new(settings: String) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(MockState {
                elapsed: 0,
                charging: false,
                app_idle_enabled: true,
                display_on: false,
                whitelist: HashSet::new(),
                widget_package: None,
                network_scorer: None,
                ephemeral: HashSet::new(),
                settings,
                users: vec![USER_ID],
                fail_whitelist: false,
                noted_events: Vec::new(),
            }),
            display_listener: Mutex::new(None),
        })
    }

    pub fn set_elapsed(&self, elapsed: u64) {
        self.state.lock().elapsed = elapsed;
    }

    pub fn advance(&self, delta: u64) -> u64 {
        let mut state = self.state.lock();
        state.elapsed += delta;
        state.elapsed
    }

    pub fn elapsed(&self) -> u64 {
        self.state.lock().elapsed
    }

    pub fn set_charging(&self, charging: bool) {
        self.state.lock().charging = charging;
    }

    /// Flip the display and fire the registered listener, the way the host
    /// display subsystem would.
    pub fn set_display_on(&self, on: bool) {
        self.state.lock().display_on = on;
        let listener = self.display_listener.lock().clone();
        if let Some(listener) = listener {
            listener.on_display_changed();
        }
    }

    pub fn with_state<R>(&self, f: impl FnOnce(&mut MockState) -> R) -> R {
        f(&mut self.state.lock())
    }
}

impl StandbyInjector for MockInjector {
    fn elapsed_realtime(&self) -> u64 {
        self.state.lock().elapsed
    }

    fn current_time_millis(&self) -> u64 {
        self.state.lock().elapsed
    }

    fn is_charging(&self) -> bool {
        self.state.lock().charging
    }

    fn is_app_idle_enabled(&self) -> bool {
        self.state.lock().app_idle_enabled
    }

    fn is_power_save_whitelist_except_idle(&self, package: &str) -> Result<bool> {
        let state = self.state.lock();
        if state.fail_whitelist {
            return Err(DozeArcError::Injector("whitelist service unavailable".into()));
        }
        Ok(state.whitelist.contains(package))
    }

    fn is_package_ephemeral(&self, _user: UserId, package: &str) -> Result<bool> {
        Ok(self.state.lock().ephemeral.contains(package))
    }

    fn is_default_display_on(&self) -> bool {
        self.state.lock().display_on
    }

    fn is_bound_widget_package(&self, package: &str, _user: UserId) -> Result<bool> {
        Ok(self.state.lock().widget_package.as_deref() == Some(package))
    }

    fn get_active_network_scorer(&self) -> Option<String> {
        self.state.lock().network_scorer.clone()
    }

    fn get_running_user_ids(&self) -> Vec<UserId> {
        self.state.lock().users.clone()
    }

    fn get_app_idle_settings(&self) -> String {
        self.state.lock().settings.clone()
    }

    fn register_display_listener(&self, listener: Arc<dyn DisplayListener>) {
        *self.display_listener.lock() = Some(listener);
    }

    fn note_event(&self, kind: StandbyEventKind, package: &str, uid: u32) -> Result<()> {
        self.state.lock().noted_events.push((kind, package.to_string(), uid));
        Ok(())
    }

    fn get_data_system_directory(&self) -> PathBuf {
        PathBuf::from("/tmp/dozearc-test")
    }
}
