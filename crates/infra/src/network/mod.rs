//! Connectivity sources for the network monitor

pub mod probe;

pub use probe::HealthProbe;
