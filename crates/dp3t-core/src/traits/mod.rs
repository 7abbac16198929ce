//! Core traits for the tracing client
//!
//! This module defines the abstract interfaces of the external collaborators.
//!
//! - [`TracingBackend`]: Request/response calls and the status event channel of the native SDK
//! - [`PlatformAdapter`]: Platform-specific onset encoding and permission flow

pub mod backend;
pub mod platform;

pub use backend::TracingBackend;
pub use platform::{
    OnsetEncoding, PermissionOutcome, PermissionRationale, Platform, PlatformAdapter,
    PlatformFactory,
};
