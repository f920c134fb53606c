//! # Courier Infrastructure
//!
//! Infrastructure implementations of `courier-core` ports.
//!
//! This crate contains:
//! - HTTP transport and health probe (reqwest)
//! - State stores: JSON file and OS keychain
//! - Configuration loading from environment and files
//! - Tracing subscriber setup
//! - [`CourierContext`], which wires everything together
//!
//! ## Architecture
//! - Implements traits defined in `courier-core`
//! - Depends on `courier-domain` and `courier-core`
//! - Contains all "impure" code (network, filesystem, keychain)

pub mod config;
pub mod context;
pub mod errors;
pub mod http;
pub mod network;
pub mod observability;
pub mod storage;

// Re-export commonly used items
pub use context::{open_store, CourierContext, CourierContextBuilder};
pub use errors::InfraError;
pub use http::{ReqwestTransport, ReqwestTransportBuilder};
pub use network::HealthProbe;
pub use observability::init_tracing;
pub use storage::{FileStateStore, KeychainStateStore};
