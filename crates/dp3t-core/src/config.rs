//! Configuration types for the tracing client
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

use crate::error::{Error, Result};

/// Main tracing client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TracingConfig {
    /// Backend application id registered with the DP-3T discovery service
    pub app_id: String,

    /// How the SDK locates its report and bucket endpoints
    #[serde(default)]
    pub discovery: DiscoveryConfig,

    /// Target platform
    #[serde(default)]
    pub platform: PlatformConfig,

    /// Optional controller settings
    #[serde(default)]
    pub controller: ControllerConfig,
}

impl TracingConfig {
    /// Create a new configuration with defaults
    pub fn new(app_id: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            discovery: DiscoveryConfig::default(),
            platform: PlatformConfig::default(),
            controller: ControllerConfig::default(),
        }
    }

    /// Set the discovery mode
    pub fn with_discovery(mut self, discovery: DiscoveryConfig) -> Self {
        self.discovery = discovery;
        self
    }

    /// Set the target platform
    pub fn with_platform(mut self, platform: PlatformConfig) -> Self {
        self.platform = platform;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.app_id.trim().is_empty() {
            return Err(Error::config("App id cannot be empty"));
        }

        self.discovery.validate()?;
        self.platform.validate()?;

        Ok(())
    }

    /// Parse and validate a JSON configuration
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = tokio::fs::read_to_string(path).await.map_err(|e| {
            Error::config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&json)
    }
}

/// Endpoint discovery configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DiscoveryConfig {
    /// Resolve endpoints through the discovery service
    Discovery {
        /// Use the development discovery environment
        #[serde(default)]
        dev: bool,
    },

    /// Explicit endpoints
    Manual {
        /// Base URL infection reports are posted to
        report_base_url: String,
        /// Base URL exposure buckets are fetched from
        bucket_base_url: String,
    },
}

impl DiscoveryConfig {
    /// Validate the discovery configuration
    pub fn validate(&self) -> Result<()> {
        match self {
            DiscoveryConfig::Discovery { .. } => Ok(()),
            DiscoveryConfig::Manual {
                report_base_url,
                bucket_base_url,
            } => {
                validate_endpoint("report base URL", report_base_url)?;
                validate_endpoint("bucket base URL", bucket_base_url)
            }
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        DiscoveryConfig::Discovery { dev: false }
    }
}

/// Platform configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlatformConfig {
    /// Android SDK (ISO-8601 onsets, battery + location permission flow)
    #[default]
    Android,

    /// iOS SDK (epoch-second onsets, no permission flow)
    Ios,

    /// Custom platform adapter
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl PlatformConfig {
    /// Validate the platform configuration
    pub fn validate(&self) -> Result<()> {
        match self {
            PlatformConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(Error::config("Custom platform factory cannot be empty"));
                }
                if config.is_null() {
                    return Err(Error::config("Custom platform config cannot be null"));
                }
                Ok(())
            }
            PlatformConfig::Android | PlatformConfig::Ios => Ok(()),
        }
    }

    /// Get the platform type name
    pub fn type_name(&self) -> &str {
        match self {
            PlatformConfig::Android => "android",
            PlatformConfig::Ios => "ios",
            PlatformConfig::Custom { factory, .. } => factory,
        }
    }
}

/// Controller configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// How a refresh response racing with newer updates is applied
    #[serde(default)]
    pub refresh_ordering: RefreshOrdering,
}

/// Ordering policy for refresh responses
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshOrdering {
    /// Whatever resolves last is observed, even a refresh issued before a
    /// newer event
    #[default]
    LastArrival,

    /// A refresh response is discarded if an event or a newer refresh was
    /// applied after it was issued
    DiscardStale,
}

/// Check that an endpoint is a non-empty http(s) URL with a host
pub(crate) fn validate_endpoint(name: &str, url: &str) -> Result<()> {
    if url.is_empty() {
        return Err(Error::invalid_input(format!("{} cannot be empty", name)));
    }

    let parsed = Url::parse(url).map_err(|e| {
        Error::invalid_input(format!("{} is not a valid URL ({}). Got: {}", name, e, url))
    })?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(Error::invalid_input(format!(
            "{} must use HTTP or HTTPS scheme. Got: {}",
            name, url
        )));
    }

    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(Error::invalid_input(format!(
            "{} has no valid host. Got: {}",
            name, url
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_discovery_on_android() {
        let config = TracingConfig::from_json_str(r#"{ "app_id": "ch.admin.bag.dp3t" }"#).unwrap();
        assert_eq!(config.discovery, DiscoveryConfig::Discovery { dev: false });
        assert_eq!(config.platform.type_name(), "android");
        assert_eq!(config.controller.refresh_ordering, RefreshOrdering::LastArrival);
    }

    #[test]
    fn parses_manual_endpoints() {
        let config = TracingConfig::from_json_str(
            r#"{
                "app_id": "org.example.tracing",
                "discovery": {
                    "type": "manual",
                    "report_base_url": "https://report.example.org/v1",
                    "bucket_base_url": "https://bucket.example.org/v1"
                },
                "platform": { "type": "ios" },
                "controller": { "refresh_ordering": "discard_stale" }
            }"#,
        )
        .unwrap();

        assert!(matches!(config.discovery, DiscoveryConfig::Manual { .. }));
        assert_eq!(config.platform.type_name(), "ios");
        assert_eq!(config.controller.refresh_ordering, RefreshOrdering::DiscardStale);
    }

    #[test]
    fn rejects_empty_app_id() {
        let err = TracingConfig::new("  ").validate().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn rejects_malformed_endpoints() {
        for url in [
            "",
            "ftp://bucket.example.org",
            "https://",
            "https:// spaced.org",
            "bucket.example.org",
            "https://[::1",
            "https://a:b:c",
        ] {
            let discovery = DiscoveryConfig::Manual {
                report_base_url: "https://report.example.org".to_string(),
                bucket_base_url: url.to_string(),
            };
            assert!(discovery.validate().is_err(), "{url:?} should be rejected");
        }
    }

    #[test]
    fn accepts_hosts_ports_and_paths() {
        for url in [
            "https://report.example.org/v1",
            "http://127.0.0.1:8080/bucket",
            "https://[::1]:8443",
        ] {
            assert!(validate_endpoint("bucket base URL", url).is_ok(), "{url:?} should be accepted");
        }
    }

    #[test]
    fn rejects_custom_platform_without_factory() {
        let platform = PlatformConfig::Custom {
            factory: String::new(),
            config: serde_json::json!({}),
        };
        assert!(platform.validate().is_err());
    }
}
