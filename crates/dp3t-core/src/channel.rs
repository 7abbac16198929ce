//! Status event channel
//!
//! The native backend announces every change of tracing state, health
//! status or error set on one named channel. [`StatusChannel`] is the
//! observer abstraction over it:
//!
//! - [`StatusChannel::subscribe`] registers a listener and returns a
//!   [`Subscription`] handle.
//! - [`StatusChannel::emit`] normalizes the raw payload once and calls every
//!   registered listener synchronously, in registration order. Nothing is
//!   buffered, coalesced or dropped.
//! - [`Subscription::cancel`] removes exactly one registration. It is
//!   idempotent, and dropping the handle cancels it as well.
//!
//! Delivery iterates over a snapshot of the registration list taken before
//! the first listener runs, so listeners may subscribe or cancel from inside
//! a callback. The channel does not depend on any async runtime.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tracing::{debug, trace};

use crate::status::{RawTracingStatus, TracingStatus, normalize};

/// Name of the native status-change event
pub const STATUS_EVENT_NAME: &str = "Dp3tStatusUpdated";

type Listener = Arc<dyn Fn(&TracingStatus) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: Vec<(u64, Listener)>,
}

/// Broadcast channel of normalized status updates
///
/// Clones share the same registration list.
#[derive(Clone)]
pub struct StatusChannel {
    name: Arc<str>,
    registry: Arc<Mutex<Registry>>,
}

impl StatusChannel {
    /// Create a channel for the standard status event
    pub fn new() -> Self {
        Self::named(STATUS_EVENT_NAME)
    }

    /// Create a channel with a custom event name
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Arc::from(name.into()),
            registry: Arc::new(Mutex::new(Registry::default())),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register a listener
    ///
    /// The listener receives every status emitted after this call until the
    /// returned [`Subscription`] is cancelled or dropped.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&TracingStatus) + Send + Sync + 'static,
    {
        let mut registry = lock(&self.registry);
        let id = registry.next_id;
        registry.next_id += 1;
        registry.listeners.push((id, Arc::new(listener)));
        debug!(
            "Subscribed listener {} to {} ({} active)",
            id,
            self.name,
            registry.listeners.len()
        );

        Subscription {
            id,
            channel: self.name.clone(),
            registry: Arc::downgrade(&self.registry),
            active: AtomicBool::new(true),
        }
    }

    /// Normalize a raw payload and deliver it to every listener
    ///
    /// Returns the number of listeners the status was delivered to.
    pub fn emit(&self, raw: RawTracingStatus) -> usize {
        let status = normalize(raw);
        self.deliver(&status)
    }

    /// Deliver an already normalized status
    pub fn deliver(&self, status: &TracingStatus) -> usize {
        let snapshot: Vec<Listener> = lock(&self.registry)
            .listeners
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        trace!("Delivering {} to {} listener(s)", self.name, snapshot.len());
        for listener in &snapshot {
            listener(status);
        }
        snapshot.len()
    }

    /// Number of currently registered listeners
    pub fn listener_count(&self) -> usize {
        lock(&self.registry).listeners.len()
    }
}

impl Default for StatusChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StatusChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusChannel")
            .field("name", &self.name)
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// Handle to one listener registration
///
/// The handle does not keep the channel alive.
#[must_use = "dropping a Subscription cancels it"]
pub struct Subscription {
    id: u64,
    channel: Arc<str>,
    registry: Weak<Mutex<Registry>>,
    active: AtomicBool,
}

impl Subscription {
    /// Remove this registration; later calls are no-ops
    pub fn cancel(&self) {
        if !self.active.swap(false, Ordering::SeqCst) {
            return;
        }
        let Some(registry) = self.registry.upgrade() else {
            return;
        };

        // Drop the listener outside the lock: it may own other subscriptions
        // on this channel.
        let removed = {
            let mut registry = lock(&registry);
            let removed = registry
                .listeners
                .iter()
                .position(|(id, _)| *id == self.id)
                .map(|index| registry.listeners.remove(index));
            debug!(
                "Cancelled listener {} on {} ({} active)",
                self.id,
                self.channel,
                registry.listeners.len()
            );
            removed
        };
        drop(removed);
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("channel", &self.channel)
            .field("active", &self.is_active())
            .finish()
    }
}

fn lock(registry: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::HealthStatus;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str) -> Box<dyn Fn(&TracingStatus) + Send + Sync>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = log.clone();
        let make = move |tag: &str| {
            let sink = sink.clone();
            let tag = tag.to_string();
            Box::new(move |_: &TracingStatus| sink.lock().unwrap().push(tag.clone()))
                as Box<dyn Fn(&TracingStatus) + Send + Sync>
        };
        (log, make)
    }

    #[test]
    fn delivers_in_registration_order() {
        let channel = StatusChannel::new();
        let (log, make) = recorder();
        let _a = channel.subscribe(make("a"));
        let _b = channel.subscribe(make("b"));
        let _c = channel.subscribe(make("c"));

        assert_eq!(channel.emit(RawTracingStatus::idle()), 3);
        assert_eq!(*log.lock().unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn cancel_is_idempotent_and_targets_one_listener() {
        let channel = StatusChannel::new();
        let (log, make) = recorder();
        let a = channel.subscribe(make("a"));
        let _b = channel.subscribe(make("b"));

        a.cancel();
        a.cancel();
        assert!(!a.is_active());
        assert_eq!(channel.listener_count(), 1);

        channel.emit(RawTracingStatus::idle());
        assert_eq!(*log.lock().unwrap(), vec!["b"]);
    }

    #[test]
    fn dropping_the_handle_cancels() {
        let channel = StatusChannel::new();
        let (log, make) = recorder();
        drop(channel.subscribe(make("gone")));
        assert_eq!(channel.listener_count(), 0);
        assert_eq!(channel.emit(RawTracingStatus::idle()), 0);
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn listeners_receive_the_normalized_status() {
        let channel = StatusChannel::new();
        let seen = Arc::new(Mutex::new(None));
        let sink = seen.clone();
        let _sub = channel.subscribe(move |status| {
            *sink.lock().unwrap() = Some(status.clone());
        });

        channel.emit(RawTracingStatus {
            health_status: HealthStatus::Infected,
            last_sync_date: Some("1000".to_string()),
            ..RawTracingStatus::idle()
        });

        let seen = seen.lock().unwrap().clone().expect("status delivered");
        assert_eq!(seen.health_status, HealthStatus::Infected);
        assert_eq!(seen.last_synced_at().unwrap().timestamp_millis(), 1000);
    }

    #[test]
    fn listener_may_cancel_itself_during_delivery() {
        let channel = StatusChannel::new();
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let hits = Arc::new(Mutex::new(0));

        let own = slot.clone();
        let counter = hits.clone();
        let sub = channel.subscribe(move |_| {
            *counter.lock().unwrap() += 1;
            if let Some(sub) = own.lock().unwrap().as_ref() {
                sub.cancel();
            }
        });
        *slot.lock().unwrap() = Some(sub);

        channel.emit(RawTracingStatus::idle());
        channel.emit(RawTracingStatus::idle());
        assert_eq!(*hits.lock().unwrap(), 1);
        assert_eq!(channel.listener_count(), 0);
    }

    #[test]
    fn subscription_outliving_channel_cancels_quietly() {
        let channel = StatusChannel::named("Custom");
        assert_eq!(channel.name(), "Custom");
        let sub = channel.subscribe(|_| {});
        drop(channel);
        sub.cancel();
        assert!(!sub.is_active());
    }

    /// Runs `f` on a thread and fails if it does not finish within 3 seconds
    fn finishes_in_time(f: impl FnOnce() + Send + 'static) {
        let (tx, rx) = std::sync::mpsc::channel();
        std::thread::spawn(move || {
            f();
            let _ = tx.send(());
        });
        rx.recv_timeout(std::time::Duration::from_secs(3))
            .expect("finished without re-entering the registry lock");
    }

    #[test]
    fn cancel_drops_a_listener_owning_another_subscription() {
        let channel = StatusChannel::new();
        let observer = channel.clone();

        finishes_in_time(move || {
            let inner = channel.subscribe(|_| {});
            let outer = channel.subscribe(move |_| {
                let _owned = &inner;
            });
            assert_eq!(channel.listener_count(), 2);
            outer.cancel();
        });

        assert_eq!(observer.listener_count(), 0);
    }

    #[test]
    fn listener_cancelled_during_delivery_may_own_another_subscription() {
        let channel = StatusChannel::new();
        let observer = channel.clone();

        finishes_in_time(move || {
            let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
            let inner = channel.subscribe(|_| {});
            let own = slot.clone();
            let outer = channel.subscribe(move |_| {
                let _owned = &inner;
                // Dropping the own handle cancels it mid-delivery
                own.lock().unwrap().take();
            });
            *slot.lock().unwrap() = Some(outer);
            drop(slot);

            assert_eq!(channel.emit(RawTracingStatus::idle()), 2);
        });

        assert_eq!(observer.listener_count(), 0);
    }
}
