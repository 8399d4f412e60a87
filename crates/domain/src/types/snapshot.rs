//! Versioned checkpoint snapshot format.
//!
//! The engine does not persist state itself; the history store emits these
//! snapshots and accepts them back on startup. The layout on disk is owned
//! by whoever stores them.

use serde::{Deserialize, Serialize};

use crate::constants::SNAPSHOT_VERSION;
use crate::errors::{DozeArcError, Result};
use crate::types::history::{AppUsageHistory, UserId};

/// One package's history inside a checkpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageSnapshot {
    pub package: String,
    #[serde(flatten)]
    pub history: AppUsageHistory,
}

/// All packages for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSnapshot {
    pub user_id: UserId,
    pub packages: Vec<PackageSnapshot>,
}

/// A full checkpoint of the history store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandbySnapshot {
    pub version: u32,
    /// Wall-clock time the checkpoint was taken, for diagnostics. The
    /// elapsed clocks inside are meaningless across reboots; this is not.
    pub generated_at_wall: u64,
    /// Screen-on clock accumulated up to the checkpoint, so the dual-clock
    /// arithmetic survives a restart.
    pub screen_on_accumulated: u64,
    pub users: Vec<UserSnapshot>,
}

impl StandbySnapshot {
    pub fn new(
        generated_at_wall: u64,
        screen_on_accumulated: u64,
        users: Vec<UserSnapshot>,
    ) -> Self {
        Self { version: SNAPSHOT_VERSION, generated_at_wall, screen_on_accumulated, users }
    }

    /// Rejects snapshots written by a format this build does not understand.
    pub fn check_version(&self) -> Result<()> {
        if self.version != SNAPSHOT_VERSION {
            return Err(DozeArcError::Snapshot(format!(
                "unsupported snapshot version {} (expected {})",
                self.version, SNAPSHOT_VERSION
            )));
        }
        Ok(())
    }
}
