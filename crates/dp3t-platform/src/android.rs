//! Android platform strategy
//!
//! The Android SDK takes onset dates as ISO-8601 text and needs two things
//! before tracing can run reliably: an exemption from battery optimization
//! and the fine-location permission (required for Bluetooth LE scanning).

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use dp3t_core::config::PlatformConfig;
use dp3t_core::traits::{
    OnsetEncoding, PermissionOutcome, PermissionRationale, Platform, PlatformAdapter,
    PlatformFactory,
};
use dp3t_core::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// System services the Android permission flow talks to
#[async_trait]
pub trait AndroidSystem: Send + Sync {
    /// Whether the app is already exempt from battery optimization
    async fn is_ignoring_battery_optimizations(&self) -> Result<bool>;

    /// Ask the user to exempt the app from battery optimization
    async fn request_ignore_battery_optimizations(&self) -> Result<()>;

    /// Ask for the fine-location permission; returns whether it was granted
    async fn request_location_permission(
        &self,
        rationale: Option<&PermissionRationale>,
    ) -> Result<bool>;
}

/// Android system with fixed answers
///
/// Stands in for the real system services when no device is attached.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct StaticAndroidSystem {
    /// Whether the app starts out exempt from battery optimization
    #[serde(default)]
    pub battery_exempt: bool,

    /// Whether the location permission prompt is accepted
    #[serde(default = "default_grant")]
    pub grant_location: bool,

    #[serde(skip)]
    battery_requests: AtomicUsize,
}

fn default_grant() -> bool {
    true
}

impl StaticAndroidSystem {
    pub fn new(battery_exempt: bool, grant_location: bool) -> Self {
        Self {
            battery_exempt,
            grant_location,
            battery_requests: AtomicUsize::new(0),
        }
    }

    /// A system that grants everything it is asked for
    pub fn granting() -> Self {
        Self::new(false, true)
    }

    /// Number of battery-optimization exemption requests made
    pub fn battery_requests(&self) -> usize {
        self.battery_requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AndroidSystem for StaticAndroidSystem {
    async fn is_ignoring_battery_optimizations(&self) -> Result<bool> {
        Ok(self.battery_exempt)
    }

    async fn request_ignore_battery_optimizations(&self) -> Result<()> {
        self.battery_requests.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn request_location_permission(
        &self,
        _rationale: Option<&PermissionRationale>,
    ) -> Result<bool> {
        Ok(self.grant_location)
    }
}

/// Android strategy
pub struct AndroidPlatform {
    system: Arc<dyn AndroidSystem>,
}

impl AndroidPlatform {
    pub fn new(system: Arc<dyn AndroidSystem>) -> Self {
        Self { system }
    }
}

#[async_trait]
impl PlatformAdapter for AndroidPlatform {
    fn platform(&self) -> Platform {
        Platform::Android
    }

    /// `2020-05-18T10:00:00.000Z`
    fn encode_onset(&self, onset: DateTime<Utc>) -> OnsetEncoding {
        OnsetEncoding::Iso8601(onset.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    async fn request_permissions(
        &self,
        rationale: Option<&PermissionRationale>,
    ) -> Result<PermissionOutcome> {
        if !self.system.is_ignoring_battery_optimizations().await? {
            info!("Requesting battery optimization exemption");
            self.system.request_ignore_battery_optimizations().await?;
        }

        let granted = self.system.request_location_permission(rationale).await?;
        debug!("Location permission granted: {}", granted);

        Ok(if granted {
            PermissionOutcome::Granted
        } else {
            PermissionOutcome::Denied
        })
    }
}

/// Factory for Android adapters
///
/// `PlatformConfig::Android` uses the system the factory was built with.
/// A custom config is read as a [`StaticAndroidSystem`].
pub struct AndroidFactory {
    system: Arc<dyn AndroidSystem>,
}

impl AndroidFactory {
    pub fn new(system: Arc<dyn AndroidSystem>) -> Self {
        Self { system }
    }
}

impl PlatformFactory for AndroidFactory {
    fn create(&self, config: &PlatformConfig) -> Result<Arc<dyn PlatformAdapter>> {
        match config {
            PlatformConfig::Android => Ok(Arc::new(AndroidPlatform::new(Arc::clone(
                &self.system,
            )))),
            PlatformConfig::Custom { config, .. } => {
                let system: StaticAndroidSystem = serde_json::from_value(config.clone())
                    .map_err(|e| Error::config(format!("Invalid Android system config: {}", e)))?;
                Ok(Arc::new(AndroidPlatform::new(Arc::new(system))))
            }
            other => Err(Error::config(format!(
                "Android factory cannot create a '{}' platform",
                other.type_name()
            ))),
        }
    }
}
