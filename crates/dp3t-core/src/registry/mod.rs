//! Plugin-based platform registry
//!
//! The registry lets platform adapters be registered by name at runtime, so
//! the binary picks the adapter from configuration instead of branching on
//! the target platform.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use dp3t_core::registry::PlatformRegistry;
//! use dp3t_core::config::PlatformConfig;
//!
//! let registry = PlatformRegistry::new();
//! dp3t_platform::register(&registry);
//!
//! let platform = registry.create_platform(&PlatformConfig::Ios)?;
//! ```

use crate::config::PlatformConfig;
use crate::error::{Error, Result};
use crate::traits::{PlatformAdapter, PlatformFactory};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Registry of platform adapter factories
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes.
#[derive(Default)]
pub struct PlatformRegistry {
    platforms: RwLock<HashMap<String, Box<dyn PlatformFactory>>>,
}

impl PlatformRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a platform factory
    ///
    /// # Parameters
    ///
    /// - `name`: Platform type name (e.g., "android", "ios")
    /// - `factory`: Factory object for creating adapter instances
    pub fn register_platform(&self, name: impl Into<String>, factory: Box<dyn PlatformFactory>) {
        let name = name.into();
        let mut platforms = self
            .platforms
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        platforms.insert(name, factory);
    }

    /// Create a platform adapter from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Arc<dyn PlatformAdapter>)`: Created adapter
    /// - `Err(Error)`: If the platform type is not registered or creation fails
    pub fn create_platform(&self, config: &PlatformConfig) -> Result<Arc<dyn PlatformAdapter>> {
        config.validate()?;

        let platform_type = config.type_name();
        let platforms = self
            .platforms
            .read()
            .unwrap_or_else(PoisonError::into_inner);

        let factory = platforms
            .get(platform_type)
            .ok_or_else(|| Error::config(format!("Unknown platform type: {}", platform_type)))?;

        factory.create(config)
    }

    /// List all registered platform types
    pub fn list_platforms(&self) -> Vec<String> {
        let platforms = self
            .platforms
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = platforms.keys().cloned().collect();
        names.sort();
        names
    }

    /// Check if a platform type is registered
    pub fn has_platform(&self, name: &str) -> bool {
        let platforms = self
            .platforms
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        platforms.contains_key(name)
    }
}
