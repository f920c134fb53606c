//! Application context
//!
//! [`CourierContext`] owns one instance of every component and the
//! background tasks that keep them running. Build it once at startup and
//! hand out references; nothing in the workspace relies on globals.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use courier_common::resilience::{Clock, SystemClock};
use courier_core::{
    AuthCoordinator, ConnectivitySource, CredentialSource, MemoryStateStore, NetworkMonitor,
    PollOptions, RequestClient, ResponseCache, StateStore, TaskPoller, Transport,
};
use courier_domain::{AuthMode, Config, CourierError, Result, StorageBackend, StorageConfig, UserInfo};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

use crate::http::ReqwestTransport;
use crate::network::HealthProbe;
use crate::storage::{FileStateStore, KeychainStateStore};

/// Builder for [`CourierContext`]
///
/// Every port defaults to the production adapter chosen by the config.
pub struct CourierContextBuilder {
    config: Config,
    transport: Option<Arc<dyn Transport>>,
    store: Option<Arc<dyn StateStore>>,
    connectivity: Option<Arc<dyn ConnectivitySource>>,
    clock: Arc<dyn Clock>,
}

impl CourierContextBuilder {
    fn new(config: Config) -> Self {
        Self { config, transport: None, store: None, connectivity: None, clock: Arc::new(SystemClock) }
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn store(mut self, store: Arc<dyn StateStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn connectivity(mut self, source: Arc<dyn ConnectivitySource>) -> Self {
        self.connectivity = Some(source);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Validate the config and wire the components together
    ///
    /// Nothing is spawned until [`CourierContext::start`].
    pub async fn build(self) -> Result<CourierContext> {
        let config = self.config;
        config.validate()?;

        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::from_config(&config.api)?),
        };
        let store = match self.store {
            Some(store) => store,
            None => open_store(&config.storage).await?,
        };
        let connectivity = match self.connectivity {
            Some(source) => Some(source),
            None if config.network.probe_enabled => {
                Some(Arc::new(HealthProbe::from_config(&config)?) as Arc<dyn ConnectivitySource>)
            }
            None => None,
        };

        let monitor = NetworkMonitor::default();
        let auth = AuthCoordinator::builder(Arc::clone(&transport), Arc::clone(&store))
            .config(&config)
            .clock(Arc::clone(&self.clock))
            .monitor(monitor.clone())
            .build();

        let cache = config.cache.enabled.then(|| {
            let cache = ResponseCache::new(
                config.cache.default_ttl(),
                Some(config.cache.max_entries),
                Arc::clone(&self.clock),
            );
            let cache =
                if config.cache.persist { cache.with_store(Arc::clone(&store)) } else { cache };
            Arc::new(cache)
        });

        let mut client = RequestClient::builder(transport)
            .config(&config)
            .auth(auth.clone())
            .monitor(monitor.clone());
        if let Some(cache) = &cache {
            client = client.cache(Arc::clone(cache));
        }
        let client = Arc::new(client.build());
        let poller = TaskPoller::new(Arc::clone(&client));

        info!(
            base_url = %config.api.base_url,
            storage = %config.storage.backend,
            cache = config.cache.enabled,
            probe = connectivity.is_some(),
            "courier context built"
        );

        Ok(CourierContext {
            config,
            store,
            connectivity,
            auth,
            cache,
            monitor,
            client,
            poller,
            started: AtomicBool::new(false),
            background: Mutex::new(Vec::new()),
        })
    }
}

/// Owner of the wired request stack and its background tasks
pub struct CourierContext {
    config: Config,
    store: Arc<dyn StateStore>,
    connectivity: Option<Arc<dyn ConnectivitySource>>,
    auth: AuthCoordinator,
    cache: Option<Arc<ResponseCache>>,
    monitor: NetworkMonitor,
    client: Arc<RequestClient>,
    poller: TaskPoller,
    started: AtomicBool,
    background: Mutex<Vec<JoinHandle<()>>>,
}

impl CourierContext {
    pub fn builder(config: Config) -> CourierContextBuilder {
        CourierContextBuilder::new(config)
    }

    /// Context with production adapters for `config`
    pub async fn from_config(config: Config) -> Result<Self> {
        Self::builder(config).build().await
    }

    /// Context configured by [`crate::config::load`]
    pub async fn from_env() -> Result<Self> {
        Self::from_config(crate::config::load()?).await
    }

    /// Restore state and start background work
    ///
    /// Restores persisted credentials and cached responses, then starts the
    /// cache sweeper, the connectivity probe, the offline replay listener and
    /// the token auto-refresh. A restored token is confirmed against the
    /// user-info endpoint; a rejected one leaves the context logged out.
    /// Calling `start` again is a no-op.
    #[instrument(skip(self))]
    pub async fn start(&self) -> Result<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        self.auth.initialize().await?;

        let mut background = Vec::new();
        if let Some(cache) = &self.cache {
            if self.config.cache.persist {
                match cache.restore().await {
                    Ok(restored) => info!(restored, "cache snapshot restored"),
                    Err(e) => warn!(error = %e, "failed to restore cache snapshot"),
                }
            }
            background.push(cache.spawn_sweeper(self.config.cache.sweep_interval()));
        }
        if let Some(source) = &self.connectivity {
            background.push(
                self.monitor.spawn_probe(Arc::clone(source), self.config.network.probe_interval()),
            );
        }
        if let Some(listener) = self.client.attach_network_listener() {
            background.push(listener);
        }
        self.background.lock().extend(background);

        if self.auth.is_authenticated() && self.auth.mode() == AuthMode::Token {
            if let Err(e) = self.auth.validate().await {
                warn!(error = %e, "stored session could not be validated");
            }
        }
        self.auth.start_auto_refresh();

        info!(authenticated = self.auth.is_authenticated(), "courier context started");
        Ok(())
    }

    /// Stop background work and persist the response cache
    #[instrument(skip(self))]
    pub async fn shutdown(&self) -> Result<()> {
        self.auth.stop_auto_refresh();
        let stopped = self.poller.stop_all();
        for handle in self.background.lock().drain(..) {
            handle.abort();
        }
        self.started.store(false, Ordering::SeqCst);

        if let Some(cache) = self.cache.as_ref().filter(|_| self.config.cache.persist) {
            cache.persist().await?;
        }
        info!(stopped_tasks = stopped, "courier context shut down");
        Ok(())
    }

    /// Sign in with a credential from `source`
    pub async fn login(&self, source: Arc<dyn CredentialSource>) -> Result<UserInfo> {
        self.auth.login(source).await
    }

    /// End the session: stop polling, drop cached responses, clear credentials
    #[instrument(skip(self))]
    pub async fn logout(&self) -> Result<()> {
        self.poller.stop_all();
        self.client.clear_cache();
        self.auth.logout().await
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn auth(&self) -> &AuthCoordinator {
        &self.auth
    }

    pub fn client(&self) -> &Arc<RequestClient> {
        &self.client
    }

    pub fn poller(&self) -> &TaskPoller {
        &self.poller
    }

    pub fn monitor(&self) -> &NetworkMonitor {
        &self.monitor
    }

    pub fn store(&self) -> &Arc<dyn StateStore> {
        &self.store
    }

    /// Poll options from the configured interval and attempt budget
    pub fn poll_options(&self) -> PollOptions {
        PollOptions::from(&self.config.polling)
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }
}

impl Drop for CourierContext {
    fn drop(&mut self) {
        for handle in self.background.get_mut().drain(..) {
            handle.abort();
        }
    }
}

impl std::fmt::Debug for CourierContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CourierContext")
            .field("base_url", &self.config.api.base_url)
            .field("started", &self.is_started())
            .field("network", &self.monitor.status())
            .field("authenticated", &self.auth.is_authenticated())
            .finish()
    }
}

/// State store for the configured backend
pub async fn open_store(config: &StorageConfig) -> Result<Arc<dyn StateStore>> {
    let store: Arc<dyn StateStore> = match config.backend {
        StorageBackend::Memory => Arc::new(MemoryStateStore::new()),
        StorageBackend::File => {
            let path = config.path.as_ref().map(PathBuf::from).ok_or_else(|| {
                CourierError::Config("storage.path is required for the file backend".into())
            })?;
            Arc::new(FileStateStore::open(path).await?)
        }
        StorageBackend::Keychain => Arc::new(KeychainStateStore::new(config.service_name.clone())),
    };
    Ok(store)
}
