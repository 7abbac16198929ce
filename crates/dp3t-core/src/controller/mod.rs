//! Reactive status controller
//!
//! The StatusController is responsible for:
//! - Gating on the backend's readiness before doing anything else
//! - Refreshing the status on activation and on demand
//! - Applying pushed status events as they arrive
//! - Exposing one observed value to the UI layer
//!
//! ## Architecture
//!
//! ```text
//!                     ┌──────────────────┐
//!   activate() ─────▶ │ StatusController │ ◀───── refresh()
//!                     └──────────────────┘
//!                        │            ▲
//!        is_initialized  │            │ status events
//!        current_status  ▼            │
//!               ┌───────────────┐  ┌───────────────┐
//!               │ TracingClient │  │ StatusChannel │
//!               └───────────────┘  └───────────────┘
//!                        │
//!                        ▼ watch::Receiver<ObservedStatus>
//!                     consumers
//! ```
//!
//! ## State Machine
//!
//! ```text
//! Unknown ──(not initialized)──▶ NotReady   observed: NotInitialized
//!    │
//!    └──(initialized)──▶ Ready ──▶ observed: Loading ──▶ Ready(status) / Failed(err)
//! ```
//!
//! `NotReady` is final for an activation: no subscription is made and
//! `refresh()` does nothing until the controller is activated again.
//!
//! ## Ordering
//!
//! The activation refresh and events racing with it are applied in arrival
//! order by default (see [`RefreshOrdering`]). A failed refresh is applied
//! like a successful one, as [`ObservedStatus::Failed`]. Nothing is retried.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, info, warn};

use crate::channel::Subscription;
use crate::client::TracingClient;
use crate::config::{ControllerConfig, RefreshOrdering};
use crate::error::Error;
use crate::status::TracingStatus;

/// Whether the backend is known to be initialized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// Readiness check not issued or not resolved yet
    Unknown,
    /// Backend initialized; subscription established
    Ready,
    /// Backend not initialized
    NotReady,
}

/// The single value a consumer observes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObservedStatus {
    /// A readiness check or refresh is in flight
    Loading,
    /// The backend has not been initialized
    NotInitialized,
    /// The last readiness check or refresh failed
    Failed(Error),
    /// A status from a refresh or an event
    Ready(TracingStatus),
}

impl ObservedStatus {
    /// The status, if one is observed
    pub fn status(&self) -> Option<&TracingStatus> {
        match self {
            ObservedStatus::Ready(status) => Some(status),
            _ => None,
        }
    }

    /// The error, if a failure is observed
    pub fn error(&self) -> Option<&Error> {
        match self {
            ObservedStatus::Failed(err) => Some(err),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, ObservedStatus::Loading)
    }
}

#[derive(Debug)]
struct ControllerState {
    readiness: Readiness,
    subscription: Option<Subscription>,
    /// Bumped by every activate/deactivate; stale work compares against it
    activation: u64,
    /// Ticket counter shared by refreshes (at issue) and events (at arrival)
    sequence: u64,
    /// Ticket of the most recently applied update
    applied: u64,
}

struct Inner {
    client: TracingClient,
    ordering: RefreshOrdering,
    state: Mutex<ControllerState>,
    observed: watch::Sender<ObservedStatus>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, ControllerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn apply_event(&self, activation: u64, status: &TracingStatus) {
        let mut state = self.lock();
        if state.activation != activation || state.readiness != Readiness::Ready {
            debug!("Dropping status event from a previous activation");
            return;
        }
        state.sequence += 1;
        state.applied = state.sequence;
        debug!(
            "Applying status event (tracing={:?}, health={:?})",
            status.tracing_state, status.health_status
        );
        self.observed
            .send_replace(ObservedStatus::Ready(status.clone()));
    }
}

/// Reactive status controller
///
/// Cloning is cheap; clones drive the same controller.
///
/// ## Lifecycle
///
/// 1. Create with [`StatusController::new()`]
/// 2. [`activate()`](StatusController::activate) when a consumer starts observing
/// 3. Read [`observed()`](StatusController::observed) or follow [`watch()`](StatusController::watch)
/// 4. [`refresh()`](StatusController::refresh) on demand
/// 5. [`deactivate()`](StatusController::deactivate) when the consumer goes away
///
/// Dropping the last handle cancels the subscription as well.
#[derive(Clone)]
pub struct StatusController {
    inner: Arc<Inner>,
}

impl StatusController {
    /// Create an inactive controller
    pub fn new(client: TracingClient, config: &ControllerConfig) -> Self {
        let (observed, _) = watch::channel(ObservedStatus::Loading);
        Self {
            inner: Arc::new(Inner {
                client,
                ordering: config.refresh_ordering,
                state: Mutex::new(ControllerState {
                    readiness: Readiness::Unknown,
                    subscription: None,
                    activation: 0,
                    sequence: 0,
                    applied: 0,
                }),
                observed,
            }),
        }
    }

    /// Start observing
    ///
    /// Cancels any previous subscription, re-checks readiness and, if the
    /// backend is initialized, subscribes to status events and issues one
    /// refresh. Resolves once that refresh has been applied (or the
    /// activation ended early).
    ///
    /// An activation overtaken by [`deactivate()`](Self::deactivate) or a
    /// newer `activate()` while awaiting the backend is abandoned.
    pub async fn activate(&self) -> Readiness {
        let (activation, previous) = {
            let mut state = self.inner.lock();
            state.activation += 1;
            state.readiness = Readiness::Unknown;
            self.inner.observed.send_replace(ObservedStatus::Loading);
            (state.activation, state.subscription.take())
        };
        if let Some(previous) = previous {
            previous.cancel();
            debug!("Cancelled subscription of the previous activation");
        }

        debug!("Activation {} checking backend readiness", activation);
        let ready = self.inner.client.is_initialized().await;

        {
            let mut state = self.inner.lock();
            if state.activation != activation {
                debug!("Activation {} superseded, abandoning", activation);
                return state.readiness;
            }

            match ready {
                Ok(true) => {
                    state.readiness = Readiness::Ready;
                    let weak: Weak<Inner> = Arc::downgrade(&self.inner);
                    let subscription = self.inner.client.subscribe(move |status| {
                        if let Some(inner) = weak.upgrade() {
                            inner.apply_event(activation, status);
                        }
                    });
                    state.subscription = Some(subscription);
                    info!("Backend initialized, subscribed to status events");
                }
                Ok(false) => {
                    state.readiness = Readiness::NotReady;
                    self.inner
                        .observed
                        .send_replace(ObservedStatus::NotInitialized);
                    info!("Backend not initialized");
                    return Readiness::NotReady;
                }
                Err(e) => {
                    warn!("Readiness check failed: {}", e);
                    self.inner.observed.send_replace(ObservedStatus::Failed(e));
                    return Readiness::Unknown;
                }
            }
        }

        self.refresh_for(activation).await;
        Readiness::Ready
    }

    /// Stop observing
    ///
    /// Cancels the event subscription. Calling it again, or on an inactive
    /// controller, does nothing. In-flight calls are not cancelled but their
    /// results are discarded.
    pub fn deactivate(&self) {
        let subscription = {
            let mut state = self.inner.lock();
            state.activation += 1;
            state.readiness = Readiness::Unknown;
            state.subscription.take()
        };
        if let Some(subscription) = subscription {
            subscription.cancel();
            info!("Status controller deactivated");
        }
    }

    /// Re-fetch the current status
    ///
    /// A no-op unless the backend is known to be initialized. The observed
    /// value reads `Loading` until the response is applied.
    pub async fn refresh(&self) {
        let activation = {
            let state = self.inner.lock();
            if state.readiness != Readiness::Ready {
                debug!("Refresh ignored (readiness {:?})", state.readiness);
                return;
            }
            state.activation
        };
        self.refresh_for(activation).await;
    }

    async fn refresh_for(&self, activation: u64) {
        let ticket = {
            let mut state = self.inner.lock();
            if state.activation != activation || state.readiness != Readiness::Ready {
                return;
            }
            state.sequence += 1;
            self.inner.observed.send_replace(ObservedStatus::Loading);
            state.sequence
        };

        let result = self.inner.client.current_status().await;

        let mut state = self.inner.lock();
        if state.activation != activation {
            debug!("Discarding refresh result of a previous activation");
            return;
        }
        if self.inner.ordering == RefreshOrdering::DiscardStale && state.applied > ticket {
            debug!(
                "Discarding stale refresh (ticket {}, applied {})",
                ticket, state.applied
            );
            return;
        }
        state.applied = state.applied.max(ticket);

        let observed = match result {
            Ok(status) => ObservedStatus::Ready(status),
            Err(e) => {
                warn!("Status refresh failed: {}", e);
                ObservedStatus::Failed(e)
            }
        };
        self.inner.observed.send_replace(observed);
    }

    /// The current observed value
    pub fn observed(&self) -> ObservedStatus {
        self.inner.observed.borrow().clone()
    }

    /// Receiver that follows the observed value
    pub fn watch(&self) -> watch::Receiver<ObservedStatus> {
        self.inner.observed.subscribe()
    }

    /// Stream of observed values, starting with the current one
    pub fn updates(&self) -> WatchStream<ObservedStatus> {
        WatchStream::new(self.watch())
    }

    pub fn readiness(&self) -> Readiness {
        self.inner.lock().readiness
    }

    /// Whether an event subscription is currently held
    pub fn is_subscribed(&self) -> bool {
        self.inner
            .lock()
            .subscription
            .as_ref()
            .is_some_and(Subscription::is_active)
    }

    /// The facade this controller drives
    pub fn client(&self) -> &TracingClient {
        &self.inner.client
    }
}

impl std::fmt::Debug for StatusController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.lock();
        f.debug_struct("StatusController")
            .field("client", &self.inner.client)
            .field("ordering", &self.inner.ordering)
            .field("readiness", &state.readiness)
            .field("subscribed", &state.subscription.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::status::{HealthStatus, TracingState};
    use crate::traits::{
        OnsetEncoding, PermissionOutcome, PermissionRationale, Platform, PlatformAdapter,
        TracingBackend,
    };
    use chrono::{DateTime, Utc};

    struct NoPlatform;

    #[async_trait::async_trait]
    impl PlatformAdapter for NoPlatform {
        fn platform(&self) -> Platform {
            Platform::Ios
        }

        fn encode_onset(&self, onset: DateTime<Utc>) -> OnsetEncoding {
            OnsetEncoding::EpochSeconds(onset.timestamp() as f64)
        }

        async fn request_permissions(
            &self,
            _rationale: Option<&PermissionRationale>,
        ) -> crate::Result<PermissionOutcome> {
            Ok(PermissionOutcome::NotApplicable)
        }
    }

    fn controller(backend: &MemoryBackend) -> StatusController {
        let client = TracingClient::new(Arc::new(backend.clone()), Arc::new(NoPlatform));
        StatusController::new(client, &ControllerConfig::default())
    }

    #[tokio::test]
    async fn starts_loading_and_unsubscribed() {
        let backend = MemoryBackend::new();
        let controller = controller(&backend);
        assert!(controller.observed().is_loading());
        assert_eq!(controller.readiness(), Readiness::Unknown);
        assert!(!controller.is_subscribed());
    }

    #[tokio::test]
    async fn uninitialized_backend_stops_the_machine() {
        let backend = MemoryBackend::new();
        let controller = controller(&backend);

        assert_eq!(controller.activate().await, Readiness::NotReady);
        assert_eq!(controller.observed(), ObservedStatus::NotInitialized);
        assert!(!controller.is_subscribed());
        assert_eq!(backend.status_channel().listener_count(), 0);

        controller.refresh().await;
        assert_eq!(controller.observed(), ObservedStatus::NotInitialized);
    }

    #[tokio::test]
    async fn initialized_backend_refreshes_and_follows_events() {
        let backend = MemoryBackend::new();
        backend.init_with_discovery("app", true).await.unwrap();
        let controller = controller(&backend);

        assert_eq!(controller.activate().await, Readiness::Ready);
        let status = controller.observed().status().cloned().expect("status observed");
        assert_eq!(status.tracing_state, TracingState::Stopped);

        backend.start().await.unwrap();
        let status = controller.observed().status().cloned().expect("status observed");
        assert_eq!(status.tracing_state, TracingState::Started);

        backend.simulate_exposure("c1", 1_589_700_000_000).await;
        let status = controller.observed().status().cloned().expect("status observed");
        assert_eq!(status.health_status, HealthStatus::Exposed);
        assert_eq!(status.matched_contacts.len(), 1);
    }

    #[tokio::test]
    async fn deactivate_cancels_and_is_idempotent() {
        let backend = MemoryBackend::new();
        backend.init_with_discovery("app", true).await.unwrap();
        let controller = controller(&backend);

        controller.activate().await;
        assert_eq!(backend.status_channel().listener_count(), 1);

        controller.deactivate();
        controller.deactivate();
        assert_eq!(backend.status_channel().listener_count(), 0);
        assert_eq!(controller.readiness(), Readiness::Unknown);

        let before = controller.observed();
        backend.start().await.unwrap();
        assert_eq!(controller.observed(), before);
    }

    #[tokio::test]
    async fn dropping_the_controller_releases_the_subscription() {
        let backend = MemoryBackend::new();
        backend.init_with_discovery("app", true).await.unwrap();
        let controller = controller(&backend);
        controller.activate().await;
        assert_eq!(backend.status_channel().listener_count(), 1);

        drop(controller);
        assert_eq!(backend.status_channel().listener_count(), 0);
    }
}
