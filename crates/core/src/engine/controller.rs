//! Standby controller - event ingress, idle scanning, and filtering queries.
//!
//! One controller instance serves the whole device. It owns the history
//! store and the parole tracker, and reaches the host exclusively through
//! the injector. All mutation funnels through the store's lock, so the
//! controller itself is `&self` everywhere and can be shared behind an
//! `Arc`.

use std::str::FromStr;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use dozearc_domain::constants::FIRST_APPLICATION_UID;
use dozearc_domain::{
    parse_app_idle_settings, BootPhase, BucketingReason, ReasonSource, Result, StandbyBucket,
    StandbyEvent, StandbyEventKind, StandbySettings, StandbySnapshot, UserId,
};

use crate::engine::parole::ParoleTracker;
use crate::engine::ports::{BucketChangeListener, DisplayListener, StandbyInjector};
use crate::history::AppIdleHistory;
use crate::policy;

/// The app standby classification engine.
pub struct StandbyController {
    injector: Arc<dyn StandbyInjector>,
    history: AppIdleHistory,
    settings: RwLock<StandbySettings>,
    parole: ParoleTracker,
    /// Handed out (weakly) to the injector's display-listener registration.
    weak_self: Weak<StandbyController>,
}

impl StandbyController {
    /// Build the engine. Created at SYSTEM_SERVICES_READY; call
    /// [`on_boot_phase`](Self::on_boot_phase) as the host advances.
    pub fn new(injector: Arc<dyn StandbyInjector>) -> Arc<Self> {
        let now = injector.elapsed_realtime();
        let settings = parse_app_idle_settings(&injector.get_app_idle_settings());
        let controller = Arc::new_cyclic(|weak| Self {
            history: AppIdleHistory::new(now, injector.is_default_display_on()),
            parole: ParoleTracker::new(injector.is_charging(), injector.is_app_idle_enabled()),
            settings: RwLock::new(settings),
            weak_self: weak.clone(),
            injector,
        });
        info!(paroled = controller.parole.is_paroled(), "standby controller created");
        controller
    }

    /// Host boot-phase callback.
    pub fn on_boot_phase(&self, phase: BootPhase) {
        match phase {
            BootPhase::SystemServicesReady => {
                self.refresh_settings();
                self.injector
                    .register_display_listener(Arc::new(ControllerDisplayListener(
                        self.weak_self.clone(),
                    )));
                info!("standby controller: system services ready");
            }
            BootPhase::BootCompleted => {
                self.parole.set_boot_completed();
                info!(paroled = self.parole.is_paroled(), "standby controller: boot completed");
            }
        }
    }

    /// Re-read the threshold configuration from the injector. Never fails;
    /// malformed input falls back to defaults inside the parser.
    pub fn refresh_settings(&self) {
        let parsed = parse_app_idle_settings(&self.injector.get_app_idle_settings());
        *self.settings.write() = parsed;
    }

    /// Subscribe to bucket-change notifications.
    pub fn register_bucket_listener(&self, listener: Arc<dyn BucketChangeListener>) {
        self.history.register_listener(listener);
    }

    // ------------------------------------------------------------------
    // Event ingress
    // ------------------------------------------------------------------

    /// Ingest one app-usage event.
    ///
    /// User interaction pulls the app to ACTIVE and refreshes both last-used
    /// clocks; a seen notification nudges anything more idle than
    /// WORKING_SET up to WORKING_SET without touching the clocks. Every
    /// other kind is observability-only.
    pub fn report_event(&self, event: &StandbyEvent, now_elapsed: u64, user: UserId) {
        if let Err(err) =
            self.injector.note_event(event.kind, &event.package, event.uid.unwrap_or(0))
        {
            warn!(package = %event.package, error = %err, "note_event sink failed");
        }

        match event.kind {
            StandbyEventKind::UserInteraction => {
                self.history.update(user, &event.package, now_elapsed, true, |app, screen_now| {
                    app.current_bucket = StandbyBucket::Active;
                    app.current_reason = BucketingReason::new(ReasonSource::Usage);
                    app.bucket_set_at_elapsed = now_elapsed;
                    app.last_used_elapsed = now_elapsed;
                    app.last_used_screen_on = screen_now;
                    app.forced_idle = false;
                });
            }
            StandbyEventKind::NotificationSeen => {
                self.history.update(user, &event.package, now_elapsed, true, |app, _screen_now| {
                    if app.current_bucket > StandbyBucket::WorkingSet {
                        app.current_bucket = StandbyBucket::WorkingSet;
                        app.current_reason = BucketingReason::new(ReasonSource::Usage);
                        app.bucket_set_at_elapsed = now_elapsed;
                        app.forced_idle = false;
                    }
                });
            }
            _ => {
                debug!(package = %event.package, kind = ?event.kind, "event has no bucket effect");
            }
        }
    }

    // ------------------------------------------------------------------
    // External bucket assignment
    // ------------------------------------------------------------------

    /// Source-arbitrated bucket assignment. Precedence violations are
    /// silent no-ops by contract; the acceptance matrix lives in
    /// [`policy::assignment_accepted`].
    pub fn set_app_standby_bucket(
        &self,
        package: &str,
        user: UserId,
        bucket: StandbyBucket,
        reason: BucketingReason,
        now_elapsed: u64,
    ) {
        let settings = self.settings.read().clone();
        self.history.update(user, package, now_elapsed, true, |app, screen_now| {
            let usage_candidate = policy::bucket_for_usage(
                now_elapsed.saturating_sub(app.last_used_elapsed),
                screen_now.saturating_sub(app.last_used_screen_on),
                &settings,
            );
            if !policy::assignment_accepted(app, bucket, reason.source, usage_candidate) {
                debug!(
                    package,
                    requested = %bucket,
                    reason = %reason,
                    current = %app.current_bucket,
                    "bucket assignment rejected by precedence"
                );
                return;
            }
            app.current_bucket = bucket;
            app.bucket_set_at_elapsed = now_elapsed;
            if reason.source == ReasonSource::Predicted {
                app.last_predicted_bucket = Some(bucket);
                app.last_predicted_at_elapsed = Some(now_elapsed);
            }
            app.current_reason = reason;
        });
    }

    /// Untrusted-surface variant: validates the raw bucket value and reason
    /// string before delegating. Invalid values are rejected with an error
    /// and leave state untouched.
    pub fn set_app_standby_bucket_raw(
        &self,
        package: &str,
        user: UserId,
        bucket_value: u32,
        reason: &str,
        now_elapsed: u64,
    ) -> Result<()> {
        let bucket = StandbyBucket::from_value(bucket_value)?;
        let reason = BucketingReason::from_str(reason)?;
        self.set_app_standby_bucket(package, user, bucket, reason, now_elapsed);
        Ok(())
    }

    /// Administrative sticky idle flag.
    ///
    /// Setting pins the app to RARE with reason FORCED; clearing returns it
    /// to ACTIVE as if it had just been used, so the next scan does not
    /// instantly re-demote.
    pub fn force_idle_state(&self, package: &str, user: UserId, idle: bool) {
        let now = self.injector.elapsed_realtime();
        self.history.update(user, package, now, true, |app, screen_now| {
            if idle {
                app.forced_idle = true;
                app.current_bucket = StandbyBucket::Rare;
                app.current_reason = BucketingReason::new(ReasonSource::Forced);
                app.bucket_set_at_elapsed = now;
            } else {
                app.forced_idle = false;
                app.current_bucket = StandbyBucket::Active;
                app.current_reason = BucketingReason::new(ReasonSource::Usage);
                app.bucket_set_at_elapsed = now;
                app.last_used_elapsed = now;
                app.last_used_screen_on = screen_now;
            }
        });
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Current bucket for one app. A package with no history reads as
    /// NEVER. With `obfuscate_ephemeral` set, ephemeral apps are masked as
    /// ACTIVE. Pure: never creates or mutates records.
    pub fn get_app_standby_bucket(
        &self,
        package: &str,
        user: UserId,
        _now_elapsed: u64,
        obfuscate_ephemeral: bool,
    ) -> StandbyBucket {
        if obfuscate_ephemeral && self.is_ephemeral(user, package) {
            return StandbyBucket::Active;
        }
        self.history
            .read(user, package)
            .map(|app| app.current_bucket)
            .unwrap_or(StandbyBucket::Never)
    }

    /// Whether background work for this app should be filtered: bucket at
    /// RARE or deeper and no exemption applies. System uids are never
    /// filtered.
    pub fn is_app_idle_filtered(
        &self,
        package: &str,
        uid: u32,
        user: UserId,
        now_elapsed: u64,
    ) -> bool {
        if uid < FIRST_APPLICATION_UID {
            return false;
        }
        self.is_idle_unexempted(package, user, now_elapsed)
    }

    /// As [`is_app_idle_filtered`](Self::is_app_idle_filtered), but always
    /// `false` while the device is paroled.
    pub fn is_app_idle_filtered_or_paroled(
        &self,
        package: &str,
        user: UserId,
        now_elapsed: u64,
        obfuscate_ephemeral: bool,
    ) -> bool {
        if self.parole.is_paroled() {
            return false;
        }
        if obfuscate_ephemeral && self.is_ephemeral(user, package) {
            return false;
        }
        self.is_idle_unexempted(package, user, now_elapsed)
    }

    /// Whether the device is currently paroled.
    pub fn is_paroled(&self) -> bool {
        self.parole.is_paroled()
    }

    fn is_idle_unexempted(&self, package: &str, user: UserId, _now_elapsed: u64) -> bool {
        let bucket = self
            .history
            .read(user, package)
            .map(|app| app.current_bucket)
            .unwrap_or(StandbyBucket::Never);
        if bucket < StandbyBucket::Rare {
            return false;
        }
        // Exemption queries cross a host boundary; on failure the
        // conservative answer is "no exemption".
        if self.query_or(false, self.injector.is_power_save_whitelist_except_idle(package)) {
            return false;
        }
        if self.query_or(false, self.injector.is_bound_widget_package(package, user)) {
            return false;
        }
        if self.injector.get_active_network_scorer().as_deref() == Some(package) {
            return false;
        }
        if self.is_ephemeral(user, package) {
            return false;
        }
        true
    }

    fn is_ephemeral(&self, user: UserId, package: &str) -> bool {
        self.query_or(false, self.injector.is_package_ephemeral(user, package))
    }

    fn query_or(&self, default: bool, result: Result<bool>) -> bool {
        match result {
            Ok(value) => value,
            Err(err) => {
                warn!(error = %err, "injector query failed, using conservative default");
                default
            }
        }
    }

    // ------------------------------------------------------------------
    // Scanner
    // ------------------------------------------------------------------

    /// Sweep one user's records and commit every timeout-driven demotion.
    /// Idempotent under unchanged clocks.
    pub fn check_idle_states(&self, user: UserId) {
        let now = self.injector.elapsed_realtime();
        let settings = self.settings.read().clone();
        debug!(user, now_elapsed = now, "idle scan");
        self.history.scan_user(user, now, |package, app, screen_now| {
            if let Some(candidate) = policy::evaluate_for_scan(app, now, screen_now, &settings) {
                debug!(package, from = %app.current_bucket, to = %candidate, "timeout demotion");
                app.current_bucket = candidate;
                app.current_reason = BucketingReason::new(ReasonSource::Timeout);
                app.bucket_set_at_elapsed = now;
            }
        });
    }

    /// Sweep every running user.
    pub fn check_idle_states_all(&self) {
        for user in self.injector.get_running_user_ids() {
            self.check_idle_states(user);
        }
    }

    // ------------------------------------------------------------------
    // Device-state callbacks and lifecycle
    // ------------------------------------------------------------------

    /// Charger transition. Coming off the charger triggers a sweep so that
    /// state accumulated during parole takes effect promptly.
    pub fn set_charging_state(&self, charging: bool) {
        if self.parole.set_charging(charging) {
            info!(charging, paroled = self.parole.is_paroled(), "charging state changed");
            if !charging {
                self.check_idle_states_all();
            }
        }
    }

    /// Feature master switch.
    pub fn set_app_idle_enabled(&self, enabled: bool) {
        self.parole.set_app_idle_enabled(enabled);
        info!(enabled, paroled = self.parole.is_paroled(), "app idle enabled changed");
    }

    /// Display-change callback: resample the display state, advance the
    /// screen-on clock, and sweep on transitions to on.
    pub fn on_display_changed(&self) {
        let on = self.injector.is_default_display_on();
        let now = self.injector.elapsed_realtime();
        debug!(display_on = on, "display changed");
        self.history.set_display_state(on, now);
        if on {
            self.check_idle_states_all();
        }
    }

    /// A package became visible to the engine; seed its history so scans
    /// cover it. New records sit in NEVER until a real signal arrives.
    pub fn on_package_added(&self, user: UserId, package: &str) {
        let now = self.injector.elapsed_realtime();
        self.history.update(user, package, now, true, |_, _| {});
    }

    /// Package uninstalled: drop its record.
    pub fn on_package_removed(&self, user: UserId, package: &str) {
        self.history.remove_package(user, package);
    }

    /// User removed: drop all their records.
    pub fn on_user_removed(&self, user: UserId) {
        self.history.remove_user(user);
    }

    // ------------------------------------------------------------------
    // Checkpoints
    // ------------------------------------------------------------------

    /// Emit a versioned checkpoint of all history.
    pub fn snapshot(&self) -> StandbySnapshot {
        self.history
            .snapshot(self.injector.elapsed_realtime(), self.injector.current_time_millis())
    }

    /// Restore a checkpoint, typically once at startup.
    pub fn restore(&self, snapshot: &StandbySnapshot) -> Result<()> {
        self.history.restore(snapshot, self.injector.elapsed_realtime())
    }
}

/// Adapter handed to the injector; holds the controller weakly so the
/// injector never keeps the engine alive.
struct ControllerDisplayListener(Weak<StandbyController>);

impl DisplayListener for ControllerDisplayListener {
    fn on_display_changed(&self) {
        if let Some(controller) = self.0.upgrade() {
            controller.on_display_changed();
        }
    }
}
