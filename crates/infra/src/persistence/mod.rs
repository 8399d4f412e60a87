//! Checkpoint persistence adapters.

mod checkpoint;

pub use checkpoint::FileCheckpointStore;
