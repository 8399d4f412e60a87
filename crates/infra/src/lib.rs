//! # DozeArc Infra
//!
//! Infrastructure layer - adapters around the pure engine.
//!
//! This crate contains:
//! - The engine runtime: a single task owning all controller mutations,
//!   fed by a command queue
//! - The periodic scan scheduler
//! - File-backed checkpoint persistence
//! - Environment configuration loading
//! - The default system injector
//!
//! ## Architecture Principles
//! - Depends on `dozearc-core` and `dozearc-domain`
//! - All spawned tasks tracked with join handles
//! - Explicit lifecycle management (start/stop) with cancellation tokens
//! - Structured tracing throughout

pub mod config;
pub mod persistence;
pub mod platform;
pub mod runtime;
pub mod scheduling;

pub use config::EngineConfig;
pub use persistence::FileCheckpointStore;
pub use platform::SystemInjector;
pub use runtime::{EngineRuntime, StandbyHandle};
pub use scheduling::ScanScheduler;
