//! # Initialization
//!
//! Controller initialization logic including rustls setup, tracing, metrics,
//! server startup, Kubernetes client setup and wiring of the reconcile
//! handler.

use crate::config::ControllerConfig;
use crate::constants::{
    CONTROLLER_NAME, DEFAULT_SERVER_POLL_INTERVAL_MS, DEFAULT_SERVER_STARTUP_TIMEOUT_SECS,
};
use crate::controller::events::KubeEventRecorder;
use crate::controller::reconciler::Handler;
use crate::controller::server::{start_server, ServerState};
use crate::crd::AzureKeyVaultSecret;
use crate::observability;
use crate::provider::AzureKeyVaultReader;
use crate::runtime::controller::Controller;
use crate::store::{KubeSecretRefStore, KubeSecretStore};
use anyhow::{Context, Result};
use k8s_openapi::api::core::v1::Secret;
use kube::runtime::reflector::{self, store::Writer, Store};
use kube::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Initialization result containing all necessary components for the controller
pub struct InitializationResult {
    /// Kubernetes client
    pub client: Client,
    /// Queues, workers and poll ticker
    pub controller: Arc<Controller>,
    /// Server state for health checks
    pub server_state: Arc<ServerState>,
    /// Read side of the AzureKeyVaultSecret cache
    pub ref_cache: Store<AzureKeyVaultSecret>,
    /// Write side of the AzureKeyVaultSecret cache, fed by the watch loop
    pub ref_writer: Writer<AzureKeyVaultSecret>,
    /// Read side of the Secret cache
    pub secret_cache: Store<Secret>,
    /// Write side of the Secret cache, fed by the watch loop
    pub secret_writer: Writer<Secret>,
    /// Delay before a watch stream that ended is restarted
    pub watch_restart_delay: Duration,
}

impl std::fmt::Debug for InitializationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitializationResult")
            .field("server_ready", &self.server_state.ready())
            .field("controller", &self.controller)
            .finish_non_exhaustive()
    }
}

/// Initialize the controller runtime
///
/// This function handles:
/// - rustls crypto provider setup
/// - Tracing subscriber setup
/// - Metrics registration
/// - HTTP server startup
/// - Kubernetes client creation
/// - Azure Key Vault credential setup
/// - Handler and controller setup
pub async fn initialize(config: ControllerConfig) -> Result<InitializationResult> {
    // Must run before anything opens a TLS connection
    let rustls_installed = rustls::crypto::ring::default_provider()
        .install_default()
        .is_ok();

    observability::logging::init_tracing(&config)?;
    if !rustls_installed {
        debug!("rustls crypto provider was already installed");
    }

    info!("Starting Azure Key Vault Controller");
    info!(
        "Build info: timestamp={}, datetime={}, git_hash={}",
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_DATETIME"),
        env!("BUILD_GIT_HASH")
    );
    for warning in &config.load_warnings {
        warn!("{}", warning);
    }
    debug!(?config, "Loaded controller configuration");

    observability::metrics::register_metrics()?;

    let server_state = Arc::new(ServerState::default());
    let server_state_clone = Arc::clone(&server_state);
    let server_port = config.metrics_port;
    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(server_port, server_state_clone).await {
            error!("HTTP server error: {}", e);
        }
    });

    // Liveness must answer before the caches sync, which may take a while
    wait_for_server_ready(&server_state, &server_handle).await?;

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;

    let (ref_cache, ref_writer) = reflector::store::<AzureKeyVaultSecret>();
    let (secret_cache, secret_writer) = reflector::store::<Secret>();

    let secret_store = Arc::new(KubeSecretStore::new(secret_cache.clone(), client.clone()));
    let ref_store = Arc::new(KubeSecretRefStore::new(ref_cache.clone(), client.clone()));

    let vault = Arc::new(
        AzureKeyVaultReader::new(config.azure_client_id.as_deref())
            .context("Failed to set up Azure Key Vault credentials")?,
    );
    let recorder = Arc::new(KubeEventRecorder::new(client.clone(), CONTROLLER_NAME));

    let handler = Arc::new(Handler::new(
        Arc::<KubeSecretStore>::clone(&secret_store),
        secret_store,
        Arc::<KubeSecretRefStore>::clone(&ref_store),
        Arc::<KubeSecretRefStore>::clone(&ref_store),
        vault,
        recorder,
    ));
    let controller = Arc::new(Controller::new(handler, ref_store, &config));

    info!("Controller initialized, starting watch loop...");

    Ok(InitializationResult {
        client,
        controller,
        server_state,
        ref_cache,
        ref_writer,
        secret_cache,
        secret_writer,
        watch_restart_delay: config.watch_restart_delay_duration(),
    })
}

/// Wait for the HTTP server to bind its socket
async fn wait_for_server_ready(
    server_state: &Arc<ServerState>,
    server_handle: &tokio::task::JoinHandle<()>,
) -> Result<()> {
    let startup_timeout = Duration::from_secs(DEFAULT_SERVER_STARTUP_TIMEOUT_SECS);
    let poll_interval = Duration::from_millis(DEFAULT_SERVER_POLL_INTERVAL_MS);
    let start_time = std::time::Instant::now();

    loop {
        if server_handle.is_finished() {
            return Err(anyhow::anyhow!("HTTP server failed to start"));
        }

        if server_state.listening() {
            info!("HTTP server is listening and accepting connections");
            return Ok(());
        }

        if start_time.elapsed() > startup_timeout {
            return Err(anyhow::anyhow!(
                "HTTP server failed to become ready within {} seconds",
                startup_timeout.as_secs()
            ));
        }

        tokio::time::sleep(poll_interval).await;
    }
}
