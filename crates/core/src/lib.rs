//! # Courier Core
//!
//! Request orchestration logic - no infrastructure dependencies.
//!
//! This crate contains:
//! - Port interfaces (transport, durable state, connectivity, credentials)
//! - `RequestClient`: cache, admission queue, interceptors, retry and replay
//! - `AuthCoordinator`: token lifecycle with single-flight refresh and login
//! - `TaskPoller`: polling state machine for server-side jobs
//! - `NetworkMonitor` and `ResponseCache`
//!
//! ## Architecture Principles
//! - Only depends on `courier-common` and `courier-domain`
//! - No HTTP client, filesystem or keychain code
//! - `AuthCoordinator` and `RequestClient` share the `Transport` port;
//!   the client holds the coordinator, never the reverse

pub mod auth;
pub mod cache;
pub mod client;
pub mod network;
pub mod storage;
pub mod tasks;
pub mod transport;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

// Re-export specific items to avoid ambiguity
pub use auth::ports::CredentialSource;
pub use auth::{AuthCoordinator, AuthCoordinatorBuilder, AuthEvent};
pub use cache::ResponseCache;
pub use client::{
    ClientStats, PendingRequestRecord, RequestClient, RequestClientBuilder, RequestInterceptor,
    ResponseInterceptor,
};
pub use network::ports::ConnectivitySource;
pub use network::NetworkMonitor;
pub use storage::ports::StateStore;
pub use storage::MemoryStateStore;
pub use tasks::{PollOptions, ProgressCallback, TaskPoller};
pub use transport::ports::{HttpRequest, HttpResponse, Transport, TransportError};
