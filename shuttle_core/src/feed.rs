//! Subscriber fan-out and upstream location feeds.
//!
//! Every producer in the pipeline (live feed, replay engine, tracking manager)
//! hands its events to callbacks registered through `subscribe`. Delivery is
//! at-most-once, best-effort and unordered: each callback runs in its own
//! spawned task, so a slow or panicking subscriber never holds up the producer
//! or the other subscribers.

use crate::model::Location;
use shuttle_env::ShuttleContext;
use std::sync::{Arc, Mutex, PoisonError};

/// A registered callback.
pub type Subscriber<T> = Arc<dyn Fn(T) + Send + Sync>;

/// Thread-safe list of subscribers.
///
/// Registration and enumeration take the same lock, so `subscribe` can be
/// called at any time, including while a notification is in flight.
pub struct Subscribers<T> {
    list: Mutex<Vec<Subscriber<T>>>,
}

impl<T> Subscribers<T>
where
    T: Clone + Send + 'static,
{
    pub fn new() -> Self {
        Self {
            list: Mutex::new(Vec::new()),
        }
    }

    pub fn subscribe(&self, subscriber: Subscriber<T>) {
        self.list
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(subscriber);
    }

    pub fn len(&self) -> usize {
        self.list.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Dispatches `value` to every subscriber without waiting for them.
    pub fn notify<Ctx: ShuttleContext>(&self, ctx: &Ctx, value: &T) {
        let list = self.list.lock().unwrap_or_else(PoisonError::into_inner);
        for subscriber in list.iter() {
            let subscriber = Arc::clone(subscriber);
            let value = value.clone();
            ctx.spawn("notify-subscriber", async move {
                subscriber(value);
            });
        }
    }
}

impl<T> Default for Subscribers<T>
where
    T: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

/// A producer of location events.
///
/// The tracking manager is wired to one of these without knowing whether it
/// is a live GPS feed or the replay engine.
pub trait LocationFeed: Send + Sync {
    fn subscribe(&self, subscriber: Subscriber<Location>);
}

/// Feed for live observations pushed in by an external transport.
pub struct LiveFeed<Ctx: ShuttleContext> {
    context: Arc<Ctx>,
    subscribers: Subscribers<Location>,
}

impl<Ctx: ShuttleContext> LiveFeed<Ctx> {
    pub fn new(context: Arc<Ctx>) -> Self {
        Self {
            context,
            subscribers: Subscribers::new(),
        }
    }

    /// Announces a newly observed location to all subscribers.
    pub fn publish(&self, location: Location) {
        tracing::debug!(
            vehicle_id = ?location.vehicle_id,
            location_id = %location.id,
            "publishing live location"
        );
        self.subscribers.notify(&*self.context, &location);
    }
}

impl<Ctx: ShuttleContext> LocationFeed for LiveFeed<Ctx> {
    fn subscribe(&self, subscriber: Subscriber<Location>) {
        self.subscribers.subscribe(subscriber);
    }
}
