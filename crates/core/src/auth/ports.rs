//! Port interfaces for authentication

use async_trait::async_trait;
use courier_domain::{LoginCredential, Result};

/// Produces a one-time login credential (e.g. a platform login code)
///
/// Invoked at most once per login flight.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    async fn obtain(&self) -> Result<LoginCredential>;
}
