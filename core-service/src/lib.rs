//! Core service façade and bootstrap helpers.
//!
//! This crate wires host-provided bridge implementations (HTTP transport,
//! source directory, target store) into the reconciliation engine. Hosts that
//! run as a regular process enable the `desktop-shims` feature, which builds
//! the reqwest transport plus the Google Directory and SCIM providers straight
//! from a [`CoreConfig`].

pub mod error;

pub use error::{CoreError, Result};

use std::sync::Arc;

use bridge_traits::{SourceDirectory, TargetStore};
use core_async::sync::CancellationToken;
use core_runtime::config::CoreConfig;
use core_runtime::events::{EventBus, Receiver, SyncEvent};
use core_sync::{SyncCoordinator, SyncReport, SyncSettings};
use tracing::info;

/// Capacity of the run event channel.
const EVENT_BUS_CAPACITY: usize = 256;

/// Aggregated handle to the bridge dependencies a run requires.
pub struct CoreDependencies {
    pub source: Arc<dyn SourceDirectory>,
    pub target: Arc<dyn TargetStore>,
}

impl CoreDependencies {
    /// Construct a dependency bundle from explicit bridge handles.
    pub fn new(source: Arc<dyn SourceDirectory>, target: Arc<dyn TargetStore>) -> Self {
        Self { source, target }
    }
}

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct CoreService {
    config: Arc<CoreConfig>,
    coordinator: Arc<SyncCoordinator>,
}

impl CoreService {
    /// Create a new service from a validated config and the provided dependencies.
    pub fn new(config: CoreConfig, deps: CoreDependencies) -> Result<Self> {
        config.validate()?;

        let coordinator = SyncCoordinator::new(
            deps.source,
            deps.target,
            SyncSettings::from_config(&config),
            EventBus::new(EVENT_BUS_CAPACITY),
        );

        Ok(Self {
            config: Arc::new(config),
            coordinator: Arc::new(coordinator),
        })
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn coordinator(&self) -> Arc<SyncCoordinator> {
        Arc::clone(&self.coordinator)
    }

    /// Subscribe to progress events of subsequent runs.
    pub fn subscribe_events(&self) -> Receiver<SyncEvent> {
        self.coordinator.event_bus().subscribe()
    }

    /// Run one sync with the configured method.
    pub async fn run(&self, token: CancellationToken) -> Result<SyncReport> {
        info!(
            method = %self.config.sync_method,
            dry_run = self.config.dry_run,
            "Starting sync"
        );
        Ok(self.coordinator.run_sync(token).await?)
    }
}

/// Build the reqwest transport and both directory providers from `config`.
///
/// ```no_run
/// # async fn example(config: core_runtime::config::CoreConfig) -> core_service::Result<()> {
/// use core_async::sync::CancellationToken;
///
/// let service = core_service::bootstrap_desktop(config)?;
/// let report = service.run(CancellationToken::new()).await?;
/// println!("{} changes", report.run.stats.total_changes());
/// # Ok(())
/// # }
/// ```
#[cfg(feature = "desktop-shims")]
pub fn bootstrap_desktop(config: CoreConfig) -> Result<CoreService> {
    use bridge_desktop::ReqwestHttpClient;
    use bridge_traits::HttpClient;
    use provider_google_directory::GoogleDirectoryConnector;
    use provider_scim::ScimClient;

    config.validate()?;

    let http_client: Arc<dyn HttpClient> = Arc::new(
        ReqwestHttpClient::new()
            .map_err(|e| CoreError::InitializationFailed(e.to_string()))?,
    );

    let source = GoogleDirectoryConnector::new(
        Arc::clone(&http_client),
        config.google_access_token.clone(),
        config.google_customer_id.clone(),
    );
    let target = ScimClient::new(
        Arc::clone(&http_client),
        config.scim_endpoint.clone(),
        config.scim_access_token.clone(),
    );

    CoreService::new(
        config,
        CoreDependencies::new(Arc::new(source), Arc::new(target)),
    )
}
