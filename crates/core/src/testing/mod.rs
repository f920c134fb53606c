//! Test doubles for the core ports
//!
//! Available to this crate's unit tests and, through the `test-utils`
//! feature, to integration tests and downstream crates.
//!
//! - [`ScriptedTransport`]: replies scripted per method and path, with call
//!   recording and in-flight tracking
//! - [`StaticCredentialSource`]: fixed login credential with a call counter

#![allow(clippy::missing_panics_doc)]

pub mod credentials;
pub mod transport;

pub use credentials::StaticCredentialSource;
pub use transport::{RecordedCall, ScriptedReply, ScriptedTransport};

pub use crate::storage::MemoryStateStore;
