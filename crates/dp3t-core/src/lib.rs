// # dp3t-core
//
// Core library of the DP-3T proximity tracing client.
//
// ## Architecture Overview
//
// This library sits between a UI layer and a native tracing SDK:
// - **TracingBackend**: Trait for the native SDK (commands and status events)
// - **PlatformAdapter**: Trait for platform-specific argument encoding and permissions
// - **TracingClient**: Command facade that validates, delegates and normalizes
// - **StatusChannel**: Observer channel of normalized status updates
// - **StatusController**: Reactive controller exposing one observed status
// - **PlatformRegistry**: Plugin-based registry for platform adapters
//
// ## Design Principles
//
// 1. **Canonical Model**: Every status reaching a consumer went through `normalize`
// 2. **Thin Facade**: One backend round trip per command, errors passed through verbatim
// 3. **Plugin-Based**: Platform behaviour is an injected strategy, not a branch
// 4. **Library-First**: All core functionality can be used as a library

pub mod backend;
pub mod channel;
pub mod client;
pub mod config;
pub mod controller;
pub mod error;
pub mod registry;
pub mod status;
pub mod traits;

// Re-export core types for convenience
pub use backend::MemoryBackend;
pub use channel::{STATUS_EVENT_NAME, StatusChannel, Subscription};
pub use client::TracingClient;
pub use config::{ControllerConfig, DiscoveryConfig, PlatformConfig, RefreshOrdering, TracingConfig};
pub use controller::{ObservedStatus, Readiness, StatusController};
pub use error::{Error, ErrorKind, Result};
pub use registry::PlatformRegistry;
pub use status::{
    ContactId, HealthStatus, MatchedContact, RawTracingStatus, Timestamp, TracingState,
    TracingStatus, normalize,
};
pub use traits::{PlatformAdapter, TracingBackend};
