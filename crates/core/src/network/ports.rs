//! Port interface for platform connectivity signals

use async_trait::async_trait;
use courier_domain::NetworkStatus;

/// Samples the current connectivity
#[async_trait]
pub trait ConnectivitySource: Send + Sync {
    async fn probe(&self) -> NetworkStatus;
}
