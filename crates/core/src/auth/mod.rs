//! Authentication lifecycle

pub mod coordinator;
pub mod ports;

pub use coordinator::{AuthCoordinator, AuthCoordinatorBuilder, AuthEvent};
pub use ports::CredentialSource;
