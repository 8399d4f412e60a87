//! In-memory (user, package) -> history store.
//!
//! The store is the engine's sole shared state. All mutation happens under
//! one write lock; a scanner sweep over a user holds the lock for the whole
//! tick, so ticks are atomic with respect to every other operation. Change
//! notifications are collected under the lock and published after it is
//! dropped, as values.
//!
//! The store also owns the screen-on clock: a monotonic accumulator that
//! advances only while the default display is on. It lives here because
//! every history mutation that samples it must do so consistently with the
//! map it is about to mutate.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use dozearc_domain::{
    AppUsageHistory, BucketChange, PackageSnapshot, Result, StandbySnapshot, UserId, UserSnapshot,
};

use crate::engine::ports::BucketChangeListener;

/// Monotonic screen-on accumulator.
///
/// Advanced on every display transition; read live as
/// `accumulated + (on ? now - last_on_at : 0)`.
#[derive(Debug)]
struct ScreenOnClock {
    accumulated: u64,
    display_on: bool,
    last_on_at: u64,
}

impl ScreenOnClock {
    fn new(display_on: bool, now_elapsed: u64) -> Self {
        Self { accumulated: 0, display_on, last_on_at: now_elapsed }
    }

    fn read(&self, now_elapsed: u64) -> u64 {
        if self.display_on {
            self.accumulated + now_elapsed.saturating_sub(self.last_on_at)
        } else {
            self.accumulated
        }
    }

    fn set_display(&mut self, on: bool, now_elapsed: u64) {
        if on == self.display_on {
            return;
        }
        if self.display_on {
            // Turning off: bank the interval that just ended.
            self.accumulated += now_elapsed.saturating_sub(self.last_on_at);
        } else {
            self.last_on_at = now_elapsed;
        }
        self.display_on = on;
    }
}

struct StoreInner {
    users: BTreeMap<UserId, BTreeMap<String, AppUsageHistory>>,
    screen: ScreenOnClock,
}

/// Thread-safe history store with change notifications.
pub struct AppIdleHistory {
    inner: RwLock<StoreInner>,
    listeners: RwLock<Vec<Arc<dyn BucketChangeListener>>>,
}

impl AppIdleHistory {
    pub fn new(now_elapsed: u64, display_on: bool) -> Self {
        Self {
            inner: RwLock::new(StoreInner {
                users: BTreeMap::new(),
                screen: ScreenOnClock::new(display_on, now_elapsed),
            }),
            listeners: RwLock::new(Vec::new()),
        }
    }

    pub fn register_listener(&self, listener: Arc<dyn BucketChangeListener>) {
        self.listeners.write().push(listener);
    }

    /// Live reading of the screen-on clock.
    pub fn screen_on_time(&self, now_elapsed: u64) -> u64 {
        self.inner.read().screen.read(now_elapsed)
    }

    /// Record a display transition. No-op when the state did not change.
    pub fn set_display_state(&self, on: bool, now_elapsed: u64) {
        self.inner.write().screen.set_display(on, now_elapsed);
    }

    /// Copy of one record, if it exists. Queries never create records.
    pub fn read(&self, user: UserId, package: &str) -> Option<AppUsageHistory> {
        self.inner.read().users.get(&user).and_then(|apps| apps.get(package)).cloned()
    }

    /// Mutate one record under the lock.
    ///
    /// When `create` is set and the record is absent, a fresh NEVER/default
    /// record is inserted first (with both last-used clocks sampled at
    /// `now_elapsed`). Returns the committed record, or `None` when the
    /// record was absent and `create` was not set. Publishes a change
    /// notification iff the commit changed the bucket.
    pub fn update<F>(
        &self,
        user: UserId,
        package: &str,
        now_elapsed: u64,
        create: bool,
        mutate: F,
    ) -> Option<AppUsageHistory>
    where
        F: FnOnce(&mut AppUsageHistory, u64),
    {
        let (committed, change) = {
            let mut guard = self.inner.write();
            let screen_now = guard.screen.read(now_elapsed);
            let apps = if create {
                guard.users.entry(user).or_default()
            } else {
                match guard.users.get_mut(&user) {
                    Some(apps) => apps,
                    None => return None,
                }
            };
            if create {
                apps.entry(package.to_string())
                    .or_insert_with(|| AppUsageHistory::new_at(now_elapsed, screen_now));
            }
            let Some(app) = apps.get_mut(package) else {
                return None;
            };
            let old_bucket = app.current_bucket;
            mutate(app, screen_now);
            let change = (app.current_bucket != old_bucket).then(|| BucketChange {
                user,
                package: package.to_string(),
                from: old_bucket,
                to: app.current_bucket,
                reason: app.current_reason.clone(),
            });
            (app.clone(), change)
        };
        if let Some(change) = change {
            self.publish(change);
        }
        Some(committed)
    }

    /// Scanner sweep: visit every record of one user, in package order,
    /// atomically under the write lock. The visitor receives the screen-on
    /// reading taken at sweep start. Notifications for all bucket changes
    /// are published after the sweep.
    pub fn scan_user<F>(&self, user: UserId, now_elapsed: u64, mut visit: F)
    where
        F: FnMut(&str, &mut AppUsageHistory, u64),
    {
        let changes = {
            let mut guard = self.inner.write();
            let screen_now = guard.screen.read(now_elapsed);
            let mut changes = Vec::new();
            if let Some(apps) = guard.users.get_mut(&user) {
                for (package, app) in apps.iter_mut() {
                    let old_bucket = app.current_bucket;
                    visit(package, app, screen_now);
                    if app.current_bucket != old_bucket {
                        changes.push(BucketChange {
                            user,
                            package: package.clone(),
                            from: old_bucket,
                            to: app.current_bucket,
                            reason: app.current_reason.clone(),
                        });
                    }
                }
            }
            changes
        };
        for change in changes {
            self.publish(change);
        }
    }

    /// Drop one record (package uninstalled).
    pub fn remove_package(&self, user: UserId, package: &str) {
        let mut guard = self.inner.write();
        if let Some(apps) = guard.users.get_mut(&user) {
            apps.remove(package);
            if apps.is_empty() {
                guard.users.remove(&user);
            }
        }
    }

    /// Drop all records of one user (user removed).
    pub fn remove_user(&self, user: UserId) {
        self.inner.write().users.remove(&user);
    }

    /// Emit a versioned checkpoint of the whole store.
    pub fn snapshot(&self, now_elapsed: u64, now_wall: u64) -> StandbySnapshot {
        let guard = self.inner.read();
        let users = guard
            .users
            .iter()
            .map(|(user_id, apps)| UserSnapshot {
                user_id: *user_id,
                packages: apps
                    .iter()
                    .map(|(package, history)| PackageSnapshot {
                        package: package.clone(),
                        history: history.clone(),
                    })
                    .collect(),
            })
            .collect();
        StandbySnapshot::new(now_wall, guard.screen.read(now_elapsed), users)
    }

    /// Replace the store's contents with a checkpoint, typically at boot.
    /// The screen-on clock resumes from the checkpointed accumulator; the
    /// current display interval, if one is open, restarts at `now_elapsed`.
    pub fn restore(&self, snapshot: &StandbySnapshot, now_elapsed: u64) -> Result<()> {
        snapshot.check_version()?;
        let mut guard = self.inner.write();
        guard.users = snapshot
            .users
            .iter()
            .map(|user| {
                (
                    user.user_id,
                    user.packages
                        .iter()
                        .map(|pkg| (pkg.package.clone(), pkg.history.clone()))
                        .collect(),
                )
            })
            .collect();
        guard.screen.accumulated = snapshot.screen_on_accumulated;
        guard.screen.last_on_at = now_elapsed;
        Ok(())
    }

    fn publish(&self, change: BucketChange) {
        debug!(
            user = change.user,
            package = %change.package,
            from = %change.from,
            to = %change.to,
            reason = %change.reason,
            "standby bucket changed"
        );
        let listeners = self.listeners.read().clone();
        for listener in listeners {
            listener.on_bucket_changed(&change);
        }
    }
}
