//! Engine configuration.

mod loader;

pub use loader::{load, EngineConfig};
