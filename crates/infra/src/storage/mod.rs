//! Durable [`StateStore`](courier_core::StateStore) adapters
//!
//! - [`FileStateStore`]: one JSON document on disk, replaced atomically
//! - [`KeychainStateStore`]: one OS keychain entry per key

pub mod file;
pub mod keychain;

pub use file::FileStateStore;
pub use keychain::KeychainStateStore;
