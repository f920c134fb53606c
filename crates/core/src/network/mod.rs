//! Connectivity tracking

pub mod monitor;
pub mod ports;

pub use monitor::NetworkMonitor;
pub use ports::ConnectivitySource;
