// # dp3t-monitor - Tracing Status Monitor
//
// The dp3t-monitor daemon is responsible for:
// 1. Reading configuration from environment variables (or a JSON file)
// 2. Initializing the runtime
// 3. Registering platform strategies
// 4. Initializing and starting the tracing backend
// 5. Activating the status controller and logging every observed status
//
// The backend is the in-memory simulation from `dp3t-core`; native SDK
// bindings plug in through the same `TracingBackend` trait.
//
// ## Configuration
//
// ### Client
// - `DP3T_CONFIG_PATH`: JSON configuration file; when set, the variables below
//   except logging and intervals are ignored
// - `DP3T_APP_ID`: Application id registered with the discovery service
// - `DP3T_PLATFORM`: Target platform (android, ios)
// - `DP3T_DEV`: Use the development discovery environment (true, false)
// - `DP3T_REPORT_URL`: Report base URL (manual endpoints)
// - `DP3T_BUCKET_URL`: Bucket base URL (manual endpoints)
// - `DP3T_REFRESH_ORDERING`: last_arrival or discard_stale
//
// ### Daemon
// - `DP3T_REFRESH_SECS`: Manual refresh interval, 0 disables (default 60)
// - `DP3T_SIMULATE_SECS`: Simulated handshake interval, 0 disables (default 0)
// - `DP3T_SHUTDOWN_TIMEOUT_SECS`: Grace period for stopping tracing (default 10)
// - `DP3T_LOG_LEVEL`: trace, debug, info, warn, error
//
// ## Example
//
// ```bash
// export DP3T_APP_ID=org.example.tracing
// export DP3T_PLATFORM=ios
// export DP3T_SIMULATE_SECS=5
//
// dp3t-monitor
// ```

use anyhow::{Context, Result};
use dp3t_core::config::{DiscoveryConfig, PlatformConfig, RefreshOrdering, TracingConfig};
use dp3t_core::traits::{PermissionOutcome, PermissionRationale};
use dp3t_core::{
    MemoryBackend, ObservedStatus, PlatformRegistry, StatusController, TracingClient,
};
use std::env;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Interval, MissedTickBehavior};
use tokio_stream::StreamExt;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum MonitorExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<MonitorExitCode> for ExitCode {
    fn from(code: MonitorExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
#[derive(Debug)]
struct Config {
    config_path: Option<String>,
    app_id: Option<String>,
    platform: String,
    dev: bool,
    report_url: Option<String>,
    bucket_url: Option<String>,
    refresh_ordering: String,
    refresh_secs: u64,
    simulate_secs: u64,
    shutdown_timeout_secs: u64,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Ok(Self {
            config_path: env::var("DP3T_CONFIG_PATH").ok(),
            app_id: env::var("DP3T_APP_ID").ok(),
            platform: env::var("DP3T_PLATFORM").unwrap_or_else(|_| "android".to_string()),
            dev: parse_env("DP3T_DEV", false)?,
            report_url: env::var("DP3T_REPORT_URL").ok(),
            bucket_url: env::var("DP3T_BUCKET_URL").ok(),
            refresh_ordering: env::var("DP3T_REFRESH_ORDERING")
                .unwrap_or_else(|_| "last_arrival".to_string()),
            refresh_secs: parse_env("DP3T_REFRESH_SECS", 60)?,
            simulate_secs: parse_env("DP3T_SIMULATE_SECS", 0)?,
            shutdown_timeout_secs: parse_env("DP3T_SHUTDOWN_TIMEOUT_SECS", 10)?,
            log_level: env::var("DP3T_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        if self.config_path.is_none() {
            if self.app_id.as_ref().is_none_or(|id| id.trim().is_empty()) {
                anyhow::bail!(
                    "DP3T_APP_ID is required unless DP3T_CONFIG_PATH is set. \
                    Set it via: export DP3T_APP_ID=org.example.tracing"
                );
            }

            match self.platform.as_str() {
                "android" | "ios" => {}
                _ => anyhow::bail!(
                    "DP3T_PLATFORM '{}' is not supported. Supported platforms: android, ios",
                    self.platform
                ),
            }

            if self.report_url.is_some() != self.bucket_url.is_some() {
                anyhow::bail!("DP3T_REPORT_URL and DP3T_BUCKET_URL must be set together");
            }

            self.ordering()?;
        }

        if self.refresh_secs > 3600 {
            anyhow::bail!(
                "DP3T_REFRESH_SECS must be between 0 and 3600 seconds. Got: {}",
                self.refresh_secs
            );
        }

        if !(1..=300).contains(&self.shutdown_timeout_secs) {
            anyhow::bail!(
                "DP3T_SHUTDOWN_TIMEOUT_SECS must be between 1 and 300 seconds. Got: {}",
                self.shutdown_timeout_secs
            );
        }

        self.level()?;

        Ok(())
    }

    fn ordering(&self) -> Result<RefreshOrdering> {
        match self.refresh_ordering.as_str() {
            "last_arrival" => Ok(RefreshOrdering::LastArrival),
            "discard_stale" => Ok(RefreshOrdering::DiscardStale),
            other => anyhow::bail!(
                "DP3T_REFRESH_ORDERING '{}' is not valid. Valid values: last_arrival, discard_stale",
                other
            ),
        }
    }

    fn level(&self) -> Result<Level> {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Ok(Level::TRACE),
            "debug" => Ok(Level::DEBUG),
            "info" => Ok(Level::INFO),
            "warn" => Ok(Level::WARN),
            "error" => Ok(Level::ERROR),
            _ => anyhow::bail!(
                "DP3T_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }
    }

    /// Build the client configuration, from file or from the environment
    async fn tracing_config(&self) -> Result<TracingConfig> {
        if let Some(path) = &self.config_path {
            return TracingConfig::load(path)
                .await
                .with_context(|| format!("Failed to load {}", path));
        }

        let discovery = match (&self.report_url, &self.bucket_url) {
            (Some(report), Some(bucket)) => DiscoveryConfig::Manual {
                report_base_url: report.clone(),
                bucket_base_url: bucket.clone(),
            },
            _ => DiscoveryConfig::Discovery { dev: self.dev },
        };
        let platform = match self.platform.as_str() {
            "ios" => PlatformConfig::Ios,
            _ => PlatformConfig::Android,
        };

        let mut config = TracingConfig::new(self.app_id.clone().unwrap_or_default())
            .with_discovery(discovery)
            .with_platform(platform);
        config.controller.refresh_ordering = self.ordering()?;
        config.validate()?;
        Ok(config)
    }
}

fn parse_env<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value: '{}'", name, value)),
        Err(_) => Ok(default),
    }
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return MonitorExitCode::ConfigError.into();
        }
    };

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return MonitorExitCode::ConfigError.into();
    }

    // Initialize tracing
    let log_level = config.level().unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return MonitorExitCode::ConfigError.into();
    }

    info!("Starting dp3t-monitor");

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return MonitorExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        let tracing_config = match config.tracing_config().await {
            Ok(tracing_config) => tracing_config,
            Err(e) => {
                error!("Configuration error: {:#}", e);
                return MonitorExitCode::ConfigError;
            }
        };

        if let Err(e) = run_monitor(&config, tracing_config).await {
            error!("Monitor error: {:#}", e);
            MonitorExitCode::RuntimeError
        } else {
            MonitorExitCode::CleanShutdown
        }
    });

    result.into()
}

/// Run the monitor until a shutdown signal arrives
async fn run_monitor(config: &Config, tracing_config: TracingConfig) -> Result<()> {
    let registry = PlatformRegistry::new();
    dp3t_platform::register(&registry);
    info!("Registered platforms: {}", registry.list_platforms().join(", "));

    let platform = registry.create_platform(&tracing_config.platform)?;
    let backend = MemoryBackend::new();
    let client = TracingClient::new(Arc::new(backend.clone()), platform);

    let rationale = PermissionRationale::new(
        "Location permission",
        "Bluetooth scanning for nearby devices requires the location permission.",
        "OK",
    );
    match client.request_permissions(Some(&rationale)).await? {
        PermissionOutcome::Denied => {
            warn!("Location permission denied; tracing will report permissionMissing");
            backend.set_permission_granted(false).await;
        }
        outcome => debug!("Permission outcome: {:?}", outcome),
    }

    if !client.is_initialized().await? {
        client
            .init(&tracing_config.app_id, &tracing_config.discovery)
            .await
            .context("Failed to initialize the tracing backend")?;
    }

    let controller = StatusController::new(client.clone(), &tracing_config.controller);
    let mut updates = controller.updates();
    let readiness = controller.activate().await;
    info!("Status controller active (readiness {:?})", readiness);

    if let Err(e) = client.start().await {
        // The failure is also part of the observed status
        warn!("Tracing not started: {}", e);
    }

    let mut refresh = every(config.refresh_secs);
    let mut simulate = every(config.simulate_secs);

    let shutdown = wait_for_shutdown();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            signal = &mut shutdown => {
                info!("Received shutdown signal: {}", signal?);
                break;
            }
            Some(observed) = updates.next() => log_observed(&observed),
            _ = tick(&mut refresh) => controller.refresh().await,
            _ = tick(&mut simulate) => backend.simulate_handshake(true).await,
        }
    }

    info!("Shutting down monitor");
    controller.deactivate();

    let grace = Duration::from_secs(config.shutdown_timeout_secs);
    match tokio::time::timeout(grace, client.stop()).await {
        Ok(Ok(())) => info!("Tracing stopped"),
        Ok(Err(e)) => warn!("Failed to stop tracing: {}", e),
        Err(_) => anyhow::bail!("Shutdown timeout after {:?}", grace),
    }

    Ok(())
}

fn log_observed(observed: &ObservedStatus) {
    match observed {
        ObservedStatus::Loading => debug!("Status loading"),
        ObservedStatus::NotInitialized => warn!("Tracing backend is not initialized"),
        ObservedStatus::Failed(e) => error!("Status unavailable: {}", e),
        ObservedStatus::Ready(status) => {
            let last_sync = status
                .last_synced_at()
                .map(|at| at.to_rfc3339())
                .unwrap_or_else(|| "never".to_string());
            info!(
                "Tracing {:?}, health {:?}: {} handshake(s), {} contact(s), {} matched, last sync {}",
                status.tracing_state,
                status.health_status,
                status.number_of_handshakes,
                status.number_of_contacts,
                status.matched_contacts.len(),
                last_sync
            );
            for (kind, native) in status.error_pairs() {
                warn!("SDK error {}: {}", kind, native);
            }
        }
    }
}

/// Interval ticking every `secs` seconds, or none for 0
fn every(secs: u64) -> Option<Interval> {
    (secs > 0).then(|| {
        let period = Duration::from_secs(secs);
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval
    })
}

async fn tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// # Returns
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
