// # Platform Adapter Trait
//
// The native SDKs on Android and iOS differ in two places the client cares
// about:
//
// - how the onset date of an infection report is encoded
//   (ISO-8601 text on Android, epoch seconds on iOS)
// - how tracing permissions are obtained (battery-optimization exemption
//   plus a location permission on Android, nothing to do on iOS)
//
// Both differences are expressed as one injected strategy so the facade and
// the controller stay platform-agnostic.
//
// ## Implementations
//
// - `dp3t-platform` crate: `AndroidPlatform`, `IosPlatform`

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Target platform of the native SDK
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Android,
    Ios,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Android => "android",
            Platform::Ios => "ios",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Onset date in the representation the native SDK expects
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OnsetEncoding {
    /// Seconds since the epoch, with millisecond precision
    EpochSeconds(f64),
    /// ISO-8601 timestamp, e.g. `2020-05-18T10:00:00.000Z`
    Iso8601(String),
}

/// Human-readable explanation shown alongside a permission prompt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionRationale {
    pub title: String,
    pub message: String,
    pub button_positive: String,
}

impl PermissionRationale {
    pub fn new(
        title: impl Into<String>,
        message: impl Into<String>,
        button_positive: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            button_positive: button_positive.into(),
        }
    }
}

/// Result of a permission request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionOutcome {
    Granted,
    Denied,
    /// The platform has no permission flow for tracing
    NotApplicable,
}

/// Per-platform strategy used by [`TracingClient`](crate::TracingClient)
#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    /// Which platform this adapter targets
    fn platform(&self) -> Platform;

    /// Encode an infection onset date for the native SDK
    fn encode_onset(&self, onset: DateTime<Utc>) -> OnsetEncoding;

    /// Obtain the permissions tracing needs
    async fn request_permissions(
        &self,
        rationale: Option<&PermissionRationale>,
    ) -> Result<PermissionOutcome>;
}

/// Helper trait for constructing platform adapters from configuration
pub trait PlatformFactory: Send + Sync {
    /// Create a platform adapter from configuration
    fn create(
        &self,
        config: &crate::config::PlatformConfig,
    ) -> Result<std::sync::Arc<dyn PlatformAdapter>>;
}
