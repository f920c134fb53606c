//! Network monitor
//!
//! Owns the global [`NetworkStatus`]. The current value lives in a `watch`
//! channel so readers never block; transitions are also published on a
//! `broadcast` channel as typed [`NetworkEvent`]s.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use courier_domain::{NetworkEvent, NetworkStatus};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::ports::ConnectivitySource;

const EVENT_CAPACITY: usize = 64;

struct MonitorInner {
    status: watch::Sender<NetworkStatus>,
    events: broadcast::Sender<NetworkEvent>,
}

/// Cheap-to-clone handle to the connectivity state
#[derive(Clone)]
pub struct NetworkMonitor {
    inner: Arc<MonitorInner>,
}

impl NetworkMonitor {
    pub fn new(initial: NetworkStatus) -> Self {
        let (status, _) = watch::channel(initial);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self { inner: Arc::new(MonitorInner { status, events }) }
    }

    pub fn status(&self) -> NetworkStatus {
        *self.inner.status.borrow()
    }

    pub fn is_online(&self) -> bool {
        self.status().is_online()
    }

    /// Record the latest connectivity sample
    ///
    /// Returns the emitted event when the status actually changed.
    pub fn set_status(&self, current: NetworkStatus) -> Option<NetworkEvent> {
        let mut previous = current;
        let changed = self.inner.status.send_if_modified(|status| {
            previous = *status;
            if *status == current {
                return false;
            }
            *status = current;
            true
        });
        if !changed {
            return None;
        }

        let event = NetworkEvent { previous, current, at: Utc::now() };
        info!(from = %previous, to = %current, "network status changed");
        // No subscribers is fine.
        let _ = self.inner.events.send(event);
        Some(event)
    }

    /// Typed stream of transitions
    pub fn subscribe(&self) -> broadcast::Receiver<NetworkEvent> {
        self.inner.events.subscribe()
    }

    /// Watch the raw status value
    pub fn watch(&self) -> watch::Receiver<NetworkStatus> {
        self.inner.status.subscribe()
    }

    /// Suspend until the status is online
    pub async fn wait_online(&self) {
        let mut rx = self.watch();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = rx.wait_for(|status| status.is_online()).await;
    }

    /// Sample `source` every `interval` and feed the result into the monitor
    pub fn spawn_probe(
        &self,
        source: Arc<dyn ConnectivitySource>,
        interval: Duration,
    ) -> JoinHandle<()> {
        let monitor = self.clone();
        tokio::spawn(async move {
            loop {
                let status = source.probe().await;
                debug!(%status, "connectivity probe");
                monitor.set_status(status);
                tokio::time::sleep(interval).await;
            }
        })
    }
}

impl Default for NetworkMonitor {
    fn default() -> Self {
        Self::new(NetworkStatus::Online)
    }
}

impl std::fmt::Debug for NetworkMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkMonitor").field("status", &self.status()).finish()
    }
}
