//! Parole: global suspension of idle enforcement.
//!
//! While the device charges, before boot completes, or while the feature's
//! master switch is off, no app is reported idle. Bucket state keeps being
//! maintained underneath so that coming off parole resumes smoothly.

use std::sync::atomic::{AtomicBool, Ordering};

/// Tracks the three inputs that derive the parole flag.
#[derive(Debug)]
pub struct ParoleTracker {
    charging: AtomicBool,
    app_idle_enabled: AtomicBool,
    boot_completed: AtomicBool,
}

impl ParoleTracker {
    pub fn new(charging: bool, app_idle_enabled: bool) -> Self {
        Self {
            charging: AtomicBool::new(charging),
            app_idle_enabled: AtomicBool::new(app_idle_enabled),
            boot_completed: AtomicBool::new(false),
        }
    }

    /// Record a charger transition. Returns whether the state changed.
    pub fn set_charging(&self, charging: bool) -> bool {
        self.charging.swap(charging, Ordering::SeqCst) != charging
    }

    /// Flip the feature master switch.
    pub fn set_app_idle_enabled(&self, enabled: bool) {
        self.app_idle_enabled.store(enabled, Ordering::SeqCst);
    }

    /// Boot has reached BOOT_COMPLETED; the early-boot parole ends.
    pub fn set_boot_completed(&self) {
        self.boot_completed.store(true, Ordering::SeqCst);
    }

    pub fn is_charging(&self) -> bool {
        self.charging.load(Ordering::SeqCst)
    }

    /// `charging || !enabled || boot not complete`.
    pub fn is_paroled(&self) -> bool {
        self.charging.load(Ordering::SeqCst)
            || !self.app_idle_enabled.load(Ordering::SeqCst)
            || !self.boot_completed.load(Ordering::SeqCst)
    }
}
