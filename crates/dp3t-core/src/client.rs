//! Command facade over the native tracing SDK
//!
//! [`TracingClient`] forwards each operation to the [`TracingBackend`] in a
//! single round trip. It validates inputs, lets the [`PlatformAdapter`]
//! encode platform-specific arguments, and normalizes the status it gets
//! back. It never retries and never reinterprets a rejection: backend
//! errors are returned verbatim.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::channel::{StatusChannel, Subscription};
use crate::config::{DiscoveryConfig, validate_endpoint};
use crate::error::{Error, Result};
use crate::status::{TracingStatus, normalize};
use crate::traits::{
    PermissionOutcome, PermissionRationale, Platform, PlatformAdapter, TracingBackend,
};

/// Stateless facade over a tracing backend
///
/// Cloning is cheap; clones share the backend and platform adapter.
#[derive(Clone)]
pub struct TracingClient {
    backend: Arc<dyn TracingBackend>,
    platform: Arc<dyn PlatformAdapter>,
}

impl TracingClient {
    /// Create a new client
    ///
    /// # Parameters
    ///
    /// - `backend`: Native SDK binding
    /// - `platform`: Strategy for the target platform
    pub fn new(backend: Arc<dyn TracingBackend>, platform: Arc<dyn PlatformAdapter>) -> Self {
        Self { backend, platform }
    }

    /// Target platform of this client
    pub fn platform(&self) -> Platform {
        self.platform.platform()
    }

    /// Whether the backend has been initialized
    pub async fn is_initialized(&self) -> Result<bool> {
        self.backend.is_initialized().await
    }

    /// Initialize according to a discovery configuration
    pub async fn init(&self, app_id: &str, discovery: &DiscoveryConfig) -> Result<()> {
        match discovery {
            DiscoveryConfig::Discovery { dev } => self.init_with_discovery(app_id, *dev).await,
            DiscoveryConfig::Manual {
                report_base_url,
                bucket_base_url,
            } => {
                self.init_manually(app_id, report_base_url, bucket_base_url)
                    .await
            }
        }
    }

    /// Initialize through the discovery service
    pub async fn init_with_discovery(&self, app_id: &str, dev: bool) -> Result<()> {
        require_non_empty("app id", app_id)?;

        info!(
            "Initializing {} backend via discovery (app_id={}, dev={})",
            self.backend.backend_name(),
            app_id,
            dev
        );
        self.backend
            .init_with_discovery(app_id, dev)
            .await
            .inspect_err(|e| warn!("Discovery initialization failed: {}", e))
    }

    /// Initialize with explicit endpoints
    pub async fn init_manually(
        &self,
        app_id: &str,
        report_base_url: &str,
        bucket_base_url: &str,
    ) -> Result<()> {
        require_non_empty("app id", app_id)?;
        validate_endpoint("report base URL", report_base_url)?;
        validate_endpoint("bucket base URL", bucket_base_url)?;

        info!(
            "Initializing {} backend manually (app_id={}, report={}, bucket={})",
            self.backend.backend_name(),
            app_id,
            report_base_url,
            bucket_base_url
        );
        self.backend
            .init_manually(app_id, report_base_url, bucket_base_url)
            .await
            .inspect_err(|e| warn!("Manual initialization failed: {}", e))
    }

    /// Start tracing
    pub async fn start(&self) -> Result<()> {
        debug!("Starting tracing");
        self.backend
            .start()
            .await
            .inspect_err(|e| warn!("Start failed: {}", e))
    }

    /// Stop tracing
    pub async fn stop(&self) -> Result<()> {
        debug!("Stopping tracing");
        self.backend
            .stop()
            .await
            .inspect_err(|e| warn!("Stop failed: {}", e))
    }

    /// Fetch and normalize the current status
    pub async fn current_status(&self) -> Result<TracingStatus> {
        let raw = self.backend.current_status().await?;
        Ok(normalize(raw))
    }

    /// Report the user as infected
    ///
    /// # Parameters
    ///
    /// - `onset`: Onset of symptoms, encoded for the target platform
    /// - `auth`: Authorization code issued by the health authority
    pub async fn report_infected(&self, onset: DateTime<Utc>, auth: &str) -> Result<()> {
        require_non_empty("auth code", auth)?;

        let encoded = self.platform.encode_onset(onset);
        info!(
            "Reporting infection on {} (onset={:?})",
            self.platform.platform(),
            encoded
        );
        self.backend
            .send_infected(&encoded, auth)
            .await
            .inspect_err(|e| warn!("Infection report failed: {}", e))
    }

    /// Trigger a synchronisation; returns whether one happened
    pub async fn sync(&self) -> Result<bool> {
        let synced = self.backend.sync().await?;
        debug!("Sync finished (synced={})", synced);
        Ok(synced)
    }

    /// Wipe all tracing data
    pub async fn clear_data(&self) -> Result<()> {
        info!("Clearing tracing data");
        self.backend.clear_data().await
    }

    /// Request the permissions tracing needs on this platform
    pub async fn request_permissions(
        &self,
        rationale: Option<&PermissionRationale>,
    ) -> Result<PermissionOutcome> {
        let outcome = self.platform.request_permissions(rationale).await?;
        debug!(
            "Permission request on {} finished: {:?}",
            self.platform.platform(),
            outcome
        );
        Ok(outcome)
    }

    /// The backend's status event channel
    pub fn status_channel(&self) -> StatusChannel {
        self.backend.status_channel()
    }

    /// Subscribe to normalized status changes
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&TracingStatus) + Send + Sync + 'static,
    {
        self.backend.status_channel().subscribe(listener)
    }
}

impl std::fmt::Debug for TracingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TracingClient")
            .field("backend", &self.backend.backend_name())
            .field("platform", &self.platform.platform())
            .finish()
    }
}

fn require_non_empty(name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::invalid_input(format!("{} cannot be empty", name)));
    }
    Ok(())
}
