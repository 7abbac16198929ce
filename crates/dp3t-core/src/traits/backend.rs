// # Tracing Backend Trait
//
// Defines the contract with the native DP-3T SDK.
//
// ## Implementations
//
// - In-memory simulation: `dp3t_core::backend::MemoryBackend`
// - Native bridges (JNI / Swift) live outside this workspace
//
// ## Usage
//
// ```rust,ignore
// use dp3t_core::TracingBackend;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let backend = /* TracingBackend implementation */;
//
//     if backend.is_initialized().await? {
//         let raw = backend.current_status().await?;
//         println!("{:?}", raw.tracing_state);
//     }
//
//     let _sub = backend.status_channel().subscribe(|status| {
//         println!("status changed: {:?}", status.health_status);
//     });
//
//     Ok(())
// }
// ```

use async_trait::async_trait;

use crate::channel::StatusChannel;
use crate::error::Result;
use crate::status::RawTracingStatus;
use crate::traits::platform::OnsetEncoding;

/// Trait for native tracing backends
///
/// Every method is one request/response round trip. Implementations must
/// not retry internally and must surface rejections as errors; domain
/// failures use [`Error::Tracing`](crate::Error::Tracing) with the matching
/// [`ErrorKind`](crate::ErrorKind).
///
/// # Events
///
/// A backend owns exactly one [`StatusChannel`] and emits a raw status on
/// it whenever tracing state, health status or the error set changes.
///
/// # Thread Safety
///
/// Implementations must be thread-safe and usable across async tasks.
#[async_trait]
pub trait TracingBackend: Send + Sync {
    /// Whether the SDK has been initialized
    ///
    /// Rejects only on transport failure.
    async fn is_initialized(&self) -> Result<bool>;

    /// Initialize using the discovery service
    ///
    /// Rejects if already initialized or discovery fails.
    async fn init_with_discovery(&self, app_id: &str, dev: bool) -> Result<()>;

    /// Initialize with explicit report and bucket endpoints
    async fn init_manually(
        &self,
        app_id: &str,
        report_base_url: &str,
        bucket_base_url: &str,
    ) -> Result<()>;

    /// Start tracing
    ///
    /// Rejects with `PermissionMissing` or `BluetoothDisabled` when the
    /// device preconditions are not met.
    async fn start(&self) -> Result<()>;

    /// Stop tracing
    async fn stop(&self) -> Result<()>;

    /// Fetch the current status; never returns partial data
    async fn current_status(&self) -> Result<RawTracingStatus>;

    /// Report the user as infected
    ///
    /// `onset` is already encoded the way the target platform expects.
    /// Rejects with a `Sync` error when the report server refuses it.
    async fn send_infected(&self, onset: &OnsetEncoding, auth: &str) -> Result<()>;

    /// Trigger a synchronisation; returns whether one happened
    async fn sync(&self) -> Result<bool>;

    /// Wipe all tracing data; safe whether or not initialized
    async fn clear_data(&self) -> Result<()>;

    /// The channel this backend emits status changes on
    fn status_channel(&self) -> StatusChannel;

    /// Backend name, for logging
    fn backend_name(&self) -> &'static str;
}
