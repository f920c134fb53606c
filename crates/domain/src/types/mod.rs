//! Domain types and models

pub mod auth;
pub mod envelope;
pub mod network;
pub mod request;
pub mod task;

pub use auth::{AuthMode, AuthState, LoginCredential, TokenGrant, UserInfo};
pub use envelope::Envelope;
pub use network::{NetworkEvent, NetworkStatus};
pub use request::{Method, RequestDescriptor, RetryOverride};
pub use task::{PollingTask, TaskState, TaskStatusReport};
