//! The standby engine: controller, parole, and port traits.

pub mod controller;
pub mod parole;
pub mod ports;

pub use controller::StandbyController;
pub use parole::ParoleTracker;
