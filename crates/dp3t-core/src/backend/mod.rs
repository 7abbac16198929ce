// # Backend Implementations
//
// This module provides implementations of the TracingBackend trait that
// live inside the workspace. Native SDK bindings are provided by the host
// application.

pub mod memory;

pub use memory::{InitMode, MemoryBackend};
