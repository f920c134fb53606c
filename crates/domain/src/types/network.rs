//! Connectivity types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Global connectivity value, mutated only by the network monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkStatus {
    #[default]
    Online,
    Offline,
}

crate::impl_status_conversions!(NetworkStatus {
    Online => "online",
    Offline => "offline",
});

impl NetworkStatus {
    pub fn is_online(self) -> bool {
        matches!(self, Self::Online)
    }
}

/// A connectivity transition delivered to subscribers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkEvent {
    pub previous: NetworkStatus,
    pub current: NetworkStatus,
    pub at: DateTime<Utc>,
}

impl NetworkEvent {
    pub fn came_online(&self) -> bool {
        !self.previous.is_online() && self.current.is_online()
    }
}
