//! iOS platform strategy
//!
//! The iOS SDK takes onset dates as fractional epoch seconds and handles
//! its own authorization prompts, so there is no permission flow here.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dp3t_core::config::PlatformConfig;
use dp3t_core::traits::{
    OnsetEncoding, PermissionOutcome, PermissionRationale, Platform, PlatformAdapter,
    PlatformFactory,
};
use dp3t_core::{Error, Result};
use tracing::debug;

/// iOS strategy
#[derive(Debug, Default, Clone, Copy)]
pub struct IosPlatform;

#[async_trait]
impl PlatformAdapter for IosPlatform {
    fn platform(&self) -> Platform {
        Platform::Ios
    }

    fn encode_onset(&self, onset: DateTime<Utc>) -> OnsetEncoding {
        OnsetEncoding::EpochSeconds(onset.timestamp_millis() as f64 / 1000.0)
    }

    async fn request_permissions(
        &self,
        _rationale: Option<&PermissionRationale>,
    ) -> Result<PermissionOutcome> {
        debug!("No permission flow on iOS");
        Ok(PermissionOutcome::NotApplicable)
    }
}

/// Factory for iOS adapters
pub struct IosFactory;

impl PlatformFactory for IosFactory {
    fn create(&self, config: &PlatformConfig) -> Result<Arc<dyn PlatformAdapter>> {
        match config {
            PlatformConfig::Ios => Ok(Arc::new(IosPlatform)),
            other => Err(Error::config(format!(
                "iOS factory cannot create a '{}' platform",
                other.type_name()
            ))),
        }
    }
}
