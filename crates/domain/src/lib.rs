//! # Courier Domain
//!
//! Domain types shared by every Courier crate.
//!
//! This crate contains:
//! - Request, envelope, auth, task and connectivity types
//! - The classified error taxonomy (`CourierError`) and `Result` alias
//! - Configuration structures with defaults
//! - Header names, endpoint paths and storage keys
//!
//! ## Architecture
//! - No dependencies on other Courier crates
//! - Only external dependencies allowed
//! - Pure data structures, no I/O

#[macro_use]
pub mod macros;

pub mod config;
pub mod constants;
pub mod errors;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
