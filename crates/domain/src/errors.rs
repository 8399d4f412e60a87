//! Error types used throughout the controller

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for DozeArc
#[derive(Error, Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum DozeArcError {
    #[error("Settings error: {0}")]
    Settings(String),

    #[error("Injector error: {0}")]
    Injector(String),

    #[error("Invalid standby bucket value: {0}")]
    InvalidBucket(u32),

    #[error("Invalid bucketing reason: {0}")]
    InvalidReason(String),

    #[error("Snapshot error: {0}")]
    Snapshot(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for DozeArc operations
pub type Result<T> = std::result::Result<T, DozeArcError>;
