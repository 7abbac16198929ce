// # DP-3T Platform Strategies
//
// This crate provides the Android and iOS implementations of
// `dp3t_core::traits::PlatformAdapter`.
//
// | Platform | Onset encoding                  | Permission flow                             |
// |----------|---------------------------------|---------------------------------------------|
// | Android  | ISO-8601, millisecond precision | battery exemption, then fine location       |
// | iOS      | epoch seconds (`f64`)           | none, always `NotApplicable`                |
//
// ## Usage
//
// ```rust,ignore
// use dp3t_core::{PlatformConfig, PlatformRegistry};
//
// let registry = PlatformRegistry::new();
// dp3t_platform::register(&registry);
//
// let platform = registry.create_platform(&PlatformConfig::Android)?;
// ```

pub mod android;
pub mod ios;

use std::sync::Arc;

use dp3t_core::PlatformRegistry;

pub use android::{AndroidFactory, AndroidPlatform, AndroidSystem, StaticAndroidSystem};
pub use ios::{IosFactory, IosPlatform};

/// Register the built-in platforms
///
/// Android adapters created from `PlatformConfig::Android` use a
/// [`StaticAndroidSystem`] that grants every request. Hosts with real system
/// services should use [`register_with`] instead.
pub fn register(registry: &PlatformRegistry) {
    register_with(registry, Arc::new(StaticAndroidSystem::granting()));
}

/// Register the built-in platforms with the given Android system services
///
/// Also registers `android_static`, whose custom config describes a
/// [`StaticAndroidSystem`].
pub fn register_with(registry: &PlatformRegistry, system: Arc<dyn AndroidSystem>) {
    registry.register_platform("android", Box::new(AndroidFactory::new(Arc::clone(&system))));
    registry.register_platform("android_static", Box::new(AndroidFactory::new(system)));
    registry.register_platform("ios", Box::new(IosFactory));
}
