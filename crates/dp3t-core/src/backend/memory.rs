// # Memory Backend
//
// In-memory simulation of the native DP-3T SDK.
//
// ## Purpose
//
// Provides a backend that behaves like the SDK from the client's point of
// view without Bluetooth or a report server. Useful for tests, demos and
// headless hosts.
//
// ## Behavior
//
// - Initialization happens once; a second init is rejected
// - `start` fails with `PermissionMissing` / `BluetoothDisabled` when the
//   simulated device preconditions are off, and records the error
// - A raw status is emitted whenever tracing state, health status or the
//   error set changes
// - `Infected` is sticky: a later exposure does not downgrade it
// - Nothing survives a restart

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::channel::StatusChannel;
use crate::error::{Error, ErrorKind, Result};
use crate::status::{HealthStatus, RawMatchedContact, RawTracingStatus, TracingState};
use crate::traits::{OnsetEncoding, TracingBackend};

/// How the simulated SDK was initialized
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitMode {
    Discovery {
        app_id: String,
        dev: bool,
    },
    Manual {
        app_id: String,
        report_base_url: String,
        bucket_base_url: String,
    },
}

#[derive(Debug)]
struct SimulatedState {
    init_mode: Option<InitMode>,
    tracing_state: TracingState,
    handshakes: u64,
    contacts: u64,
    health: HealthStatus,
    last_sync_millis: Option<i64>,
    errors: Vec<(ErrorKind, String)>,
    matched_contacts: Vec<RawMatchedContact>,
    permission_granted: bool,
    bluetooth_enabled: bool,
    reports_accepted: bool,
    last_onset: Option<OnsetEncoding>,
}

impl SimulatedState {
    fn new() -> Self {
        Self {
            init_mode: None,
            tracing_state: TracingState::Stopped,
            handshakes: 0,
            contacts: 0,
            health: HealthStatus::Healthy,
            last_sync_millis: None,
            errors: Vec::new(),
            matched_contacts: Vec::new(),
            permission_granted: true,
            bluetooth_enabled: true,
            reports_accepted: true,
            last_onset: None,
        }
    }

    fn require_initialized(&self, action: &str) -> Result<()> {
        if self.init_mode.is_none() {
            return Err(Error::invalid_state(format!(
                "cannot {} before the SDK is initialized",
                action
            )));
        }
        Ok(())
    }

    fn clear_tracing_data(&mut self) {
        self.tracing_state = TracingState::Stopped;
        self.handshakes = 0;
        self.contacts = 0;
        self.health = HealthStatus::Healthy;
        self.last_sync_millis = None;
        self.errors.clear();
        self.matched_contacts.clear();
        self.last_onset = None;
    }

    fn snapshot(&self) -> RawTracingStatus {
        RawTracingStatus {
            tracing_state: self.tracing_state,
            number_of_handshakes: self.handshakes,
            number_of_contacts: self.contacts,
            health_status: self.health,
            last_sync_date: self.last_sync_millis.map(|ms| ms.to_string()),
            errors: self.errors.iter().map(|(kind, _)| *kind).collect(),
            native_errors: self.errors.iter().map(|(_, native)| native.clone()).collect(),
            matched_contacts: self.matched_contacts.clone(),
        }
    }
}

/// In-memory tracing backend
///
/// # Example
///
/// ```rust,no_run
/// use dp3t_core::backend::MemoryBackend;
/// use dp3t_core::traits::TracingBackend;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let backend = MemoryBackend::new();
///     backend.init_with_discovery("org.example.tracing", true).await?;
///     backend.start().await?;
///
///     let raw = backend.current_status().await?;
///     println!("{:?}", raw.tracing_state);
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct MemoryBackend {
    state: Arc<Mutex<SimulatedState>>,
    channel: StatusChannel,
}

impl MemoryBackend {
    /// Create an uninitialized backend with all device preconditions met
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SimulatedState::new())),
            channel: StatusChannel::new(),
        }
    }

    /// How the backend was initialized, if it was
    pub async fn init_mode(&self) -> Option<InitMode> {
        self.state.lock().await.init_mode.clone()
    }

    /// Onset passed with the most recent accepted infection report
    pub async fn last_onset(&self) -> Option<OnsetEncoding> {
        self.state.lock().await.last_onset.clone()
    }

    /// Grant or revoke the simulated location permission
    pub async fn set_permission_granted(&self, granted: bool) {
        self.state.lock().await.permission_granted = granted;
    }

    /// Switch simulated Bluetooth on or off
    pub async fn set_bluetooth_enabled(&self, enabled: bool) {
        self.state.lock().await.bluetooth_enabled = enabled;
    }

    /// Make the simulated report server accept or refuse infection reports
    pub async fn set_reports_accepted(&self, accepted: bool) {
        self.state.lock().await.reports_accepted = accepted;
    }

    /// Record one handshake; `new_contact` also counts a new contact
    pub async fn simulate_handshake(&self, new_contact: bool) {
        let mut state = self.state.lock().await;
        if state.tracing_state != TracingState::Started {
            debug!("Ignoring handshake while tracing is not started");
            return;
        }
        state.handshakes += 1;
        if new_contact {
            state.contacts += 1;
        }
    }

    /// Record a matched contact reported at `report_date_millis`
    pub async fn simulate_exposure(&self, id: impl Into<String>, report_date_millis: i64) {
        let raw = {
            let mut state = self.state.lock().await;
            state.matched_contacts.push(RawMatchedContact {
                id: id.into(),
                report_date: Some(report_date_millis.to_string()),
            });
            if state.health != HealthStatus::Infected {
                state.health = HealthStatus::Exposed;
            }
            state.snapshot()
        };
        info!("Simulated exposure ({} matched contact(s))", raw.matched_contacts.len());
        self.channel.emit(raw);
    }

    /// Emit an arbitrary raw payload on the status channel
    pub fn emit_raw(&self, raw: RawTracingStatus) -> usize {
        self.channel.emit(raw)
    }

    async fn emit_current(&self) {
        let raw = self.state.lock().await.snapshot();
        self.channel.emit(raw);
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TracingBackend for MemoryBackend {
    async fn is_initialized(&self) -> Result<bool> {
        Ok(self.state.lock().await.init_mode.is_some())
    }

    async fn init_with_discovery(&self, app_id: &str, dev: bool) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.init_mode.is_some() {
            return Err(Error::invalid_state("SDK is already initialized"));
        }
        state.init_mode = Some(InitMode::Discovery {
            app_id: app_id.to_string(),
            dev,
        });
        Ok(())
    }

    async fn init_manually(
        &self,
        app_id: &str,
        report_base_url: &str,
        bucket_base_url: &str,
    ) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.init_mode.is_some() {
            return Err(Error::invalid_state("SDK is already initialized"));
        }
        state.init_mode = Some(InitMode::Manual {
            app_id: app_id.to_string(),
            report_base_url: report_base_url.to_string(),
            bucket_base_url: bucket_base_url.to_string(),
        });
        Ok(())
    }

    async fn start(&self) -> Result<()> {
        let outcome = {
            let mut state = self.state.lock().await;
            state.require_initialized("start tracing")?;

            let failure = if !state.permission_granted {
                Some((ErrorKind::PermissionMissing, "PERMISSION_MISSING"))
            } else if !state.bluetooth_enabled {
                Some((ErrorKind::BluetoothDisabled, "BLUETOOTH_DISABLED"))
            } else {
                None
            };

            match failure {
                Some((kind, native)) => {
                    state.tracing_state = TracingState::Error;
                    state.errors = vec![(kind, native.to_string())];
                    Err(Error::tracing(kind, native))
                }
                None => {
                    state.tracing_state = TracingState::Started;
                    state.errors.clear();
                    Ok(())
                }
            }
        };

        self.emit_current().await;
        outcome
    }

    async fn stop(&self) -> Result<()> {
        {
            let mut state = self.state.lock().await;
            state.require_initialized("stop tracing")?;
            state.tracing_state = TracingState::Stopped;
        }
        self.emit_current().await;
        Ok(())
    }

    async fn current_status(&self) -> Result<RawTracingStatus> {
        Ok(self.state.lock().await.snapshot())
    }

    async fn send_infected(&self, onset: &OnsetEncoding, auth: &str) -> Result<()> {
        let outcome = {
            let mut state = self.state.lock().await;
            state.require_initialized("report an infection")?;

            if state.reports_accepted {
                state.health = HealthStatus::Infected;
                state.tracing_state = TracingState::Stopped;
                state.last_onset = Some(onset.clone());
                info!("Infection report accepted ({} char auth code)", auth.len());
                Ok(())
            } else {
                state
                    .errors
                    .push((ErrorKind::Sync, "REPORT_REJECTED".to_string()));
                Err(Error::tracing(ErrorKind::Sync, "report server rejected the request"))
            }
        };

        self.emit_current().await;
        outcome
    }

    async fn sync(&self) -> Result<bool> {
        let mut state = self.state.lock().await;
        if state.init_mode.is_none() {
            return Err(Error::tracing(ErrorKind::Sync, "SDK is not initialized"));
        }
        state.last_sync_millis = Some(chrono::Utc::now().timestamp_millis());
        Ok(true)
    }

    async fn clear_data(&self) -> Result<()> {
        let initialized = {
            let mut state = self.state.lock().await;
            state.clear_tracing_data();
            state.init_mode.is_some()
        };
        if initialized {
            self.emit_current().await;
        }
        Ok(())
    }

    fn status_channel(&self) -> StatusChannel {
        self.channel.clone()
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
