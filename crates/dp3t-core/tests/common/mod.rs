//! Test doubles and common utilities for contract tests
//!
//! This module provides minimal test doubles that let a test decide when
//! each backend response resolves, without implementing real tracing.

#![allow(dead_code)]

use chrono::{DateTime, SecondsFormat, Utc};
use dp3t_core::error::{Error, Result};
use dp3t_core::status::RawTracingStatus;
use dp3t_core::traits::{
    OnsetEncoding, PermissionOutcome, PermissionRationale, Platform, PlatformAdapter,
    TracingBackend,
};
use dp3t_core::{StatusChannel, TracingClient};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

/// One scripted response, optionally held until the test releases it
struct Scripted<T> {
    gate: Option<oneshot::Receiver<()>>,
    response: Result<T>,
}

/// A backend whose readiness and status responses are scripted by the test
///
/// Unscripted calls resolve immediately: readiness with `true`, status with
/// an idle payload.
pub struct GatedBackend {
    readiness: Arc<Mutex<VecDeque<Scripted<bool>>>>,
    statuses: Arc<Mutex<VecDeque<Scripted<RawTracingStatus>>>>,
    /// Error every command (init, start, stop, report, sync, clear) rejects with
    command_error: Arc<Mutex<Option<Error>>>,
    channel: StatusChannel,
    /// Call counter for is_initialized()
    readiness_call_count: Arc<AtomicUsize>,
    /// Call counter for current_status()
    status_call_count: Arc<AtomicUsize>,
    /// Call counter for the command methods
    command_call_count: Arc<AtomicUsize>,
    /// Arguments of the last send_infected() call
    last_report: Arc<Mutex<Option<(OnsetEncoding, String)>>>,
}

impl GatedBackend {
    pub fn new() -> Self {
        Self {
            readiness: Arc::new(Mutex::new(VecDeque::new())),
            statuses: Arc::new(Mutex::new(VecDeque::new())),
            command_error: Arc::new(Mutex::new(None)),
            channel: StatusChannel::new(),
            readiness_call_count: Arc::new(AtomicUsize::new(0)),
            status_call_count: Arc::new(AtomicUsize::new(0)),
            command_call_count: Arc::new(AtomicUsize::new(0)),
            last_report: Arc::new(Mutex::new(None)),
        }
    }

    /// Create a new GatedBackend that shares script, channel and counters with an existing one
    pub fn sharing_counters_with(other: &Self) -> Self {
        Self {
            readiness: Arc::clone(&other.readiness),
            statuses: Arc::clone(&other.statuses),
            command_error: Arc::clone(&other.command_error),
            channel: other.channel.clone(),
            readiness_call_count: Arc::clone(&other.readiness_call_count),
            status_call_count: Arc::clone(&other.status_call_count),
            command_call_count: Arc::clone(&other.command_call_count),
            last_report: Arc::clone(&other.last_report),
        }
    }

    /// Script the next readiness answer
    pub fn queue_readiness(&self, response: Result<bool>) {
        self.readiness.lock().unwrap().push_back(Scripted {
            gate: None,
            response,
        });
    }

    /// Script the next readiness answer and hold it until the sender fires
    pub fn hold_readiness(&self, response: Result<bool>) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.readiness.lock().unwrap().push_back(Scripted {
            gate: Some(rx),
            response,
        });
        tx
    }

    /// Script the next status response
    pub fn queue_status(&self, response: Result<RawTracingStatus>) {
        self.statuses.lock().unwrap().push_back(Scripted {
            gate: None,
            response,
        });
    }

    /// Script the next status response and hold it until the sender fires
    pub fn hold_status(&self, response: Result<RawTracingStatus>) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.statuses.lock().unwrap().push_back(Scripted {
            gate: Some(rx),
            response,
        });
        tx
    }

    /// Make every command reject with `err`
    pub fn fail_commands_with(&self, err: Error) {
        *self.command_error.lock().unwrap() = Some(err);
    }

    /// Emit a raw status event
    pub fn emit(&self, raw: RawTracingStatus) -> usize {
        self.channel.emit(raw)
    }

    /// Handle to the backend's status channel
    pub fn emitter(&self) -> StatusChannel {
        self.channel.clone()
    }

    pub fn readiness_call_count(&self) -> usize {
        self.readiness_call_count.load(Ordering::SeqCst)
    }

    pub fn status_call_count(&self) -> usize {
        self.status_call_count.load(Ordering::SeqCst)
    }

    pub fn command_call_count(&self) -> usize {
        self.command_call_count.load(Ordering::SeqCst)
    }

    pub fn listener_count(&self) -> usize {
        self.channel.listener_count()
    }

    pub fn last_report(&self) -> Option<(OnsetEncoding, String)> {
        self.last_report.lock().unwrap().clone()
    }

    /// Wait until current_status() has been called `count` times
    pub async fn wait_for_status_calls(&self, count: usize) {
        wait_until(|| self.status_call_count() >= count).await;
    }

    /// Wait until is_initialized() has been called `count` times
    pub async fn wait_for_readiness_calls(&self, count: usize) {
        wait_until(|| self.readiness_call_count() >= count).await;
    }

    fn command(&self) -> Result<()> {
        self.command_call_count.fetch_add(1, Ordering::SeqCst);
        match self.command_error.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

async fn resolve<T>(script: &Mutex<VecDeque<Scripted<T>>>, default: T) -> Result<T> {
    let next = script.lock().unwrap().pop_front();
    match next {
        Some(Scripted { gate, response }) => {
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            response
        }
        None => Ok(default),
    }
}

#[async_trait::async_trait]
impl TracingBackend for GatedBackend {
    async fn is_initialized(&self) -> Result<bool> {
        self.readiness_call_count.fetch_add(1, Ordering::SeqCst);
        resolve(&self.readiness, true).await
    }

    async fn init_with_discovery(&self, _app_id: &str, _dev: bool) -> Result<()> {
        self.command()
    }

    async fn init_manually(
        &self,
        _app_id: &str,
        _report_base_url: &str,
        _bucket_base_url: &str,
    ) -> Result<()> {
        self.command()
    }

    async fn start(&self) -> Result<()> {
        self.command()
    }

    async fn stop(&self) -> Result<()> {
        self.command()
    }

    async fn current_status(&self) -> Result<RawTracingStatus> {
        self.status_call_count.fetch_add(1, Ordering::SeqCst);
        resolve(&self.statuses, RawTracingStatus::idle()).await
    }

    async fn send_infected(&self, onset: &OnsetEncoding, auth: &str) -> Result<()> {
        *self.last_report.lock().unwrap() = Some((onset.clone(), auth.to_string()));
        self.command()
    }

    async fn sync(&self) -> Result<bool> {
        self.command().map(|()| true)
    }

    async fn clear_data(&self) -> Result<()> {
        self.command()
    }

    fn status_channel(&self) -> StatusChannel {
        self.channel.clone()
    }

    fn backend_name(&self) -> &'static str {
        "gated"
    }
}

/// A platform adapter with fixed, platform-shaped behaviour
pub struct FixedPlatform {
    platform: Platform,
}

impl FixedPlatform {
    pub fn new(platform: Platform) -> Self {
        Self { platform }
    }
}

#[async_trait::async_trait]
impl PlatformAdapter for FixedPlatform {
    fn platform(&self) -> Platform {
        self.platform
    }

    fn encode_onset(&self, onset: DateTime<Utc>) -> OnsetEncoding {
        match self.platform {
            Platform::Ios => OnsetEncoding::EpochSeconds(onset.timestamp_millis() as f64 / 1000.0),
            Platform::Android => {
                OnsetEncoding::Iso8601(onset.to_rfc3339_opts(SecondsFormat::Millis, true))
            }
        }
    }

    async fn request_permissions(
        &self,
        _rationale: Option<&PermissionRationale>,
    ) -> Result<PermissionOutcome> {
        Ok(match self.platform {
            Platform::Ios => PermissionOutcome::NotApplicable,
            Platform::Android => PermissionOutcome::Granted,
        })
    }
}

/// Client over a backend sharing counters with `backend`
pub fn client_for(backend: &GatedBackend, platform: Platform) -> TracingClient {
    TracingClient::new(
        Arc::new(GatedBackend::sharing_counters_with(backend)),
        Arc::new(FixedPlatform::new(platform)),
    )
}

/// Raw status payload with the given tracing state and handshake count
pub fn raw_status(tracing_state: &str, handshakes: u64) -> RawTracingStatus {
    serde_json::from_value(serde_json::json!({
        "tracingState": tracing_state,
        "numberOfHandshakes": handshakes,
        "numberOfContacts": 0,
        "healthStatus": "healthy",
        "errors": [],
        "nativeErrors": [],
        "matchedContacts": []
    }))
    .expect("valid raw status")
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(tokio::time::Duration::from_secs(5), async {
        while !condition() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("condition reached within 5 seconds");
}
