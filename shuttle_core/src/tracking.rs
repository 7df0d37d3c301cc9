//! The smooth tracking manager.
//!
//! Keeps the last observed location of every vehicle, and on a fixed interval
//! predicts where each vehicle on a route has got to since. Every prediction
//! is persisted as a derived location and handed to subscribers (e.g. a live
//! map), so vehicles keep moving between GPS reports.
//!
//! # Concurrency
//!
//! `on_location` is called from the upstream feed's tasks while `run` ticks
//! on its own task. All per-vehicle state sits behind a single mutex, and
//! membership of the active set changes in the same critical section as the
//! location update that causes it. The lock is never held across a model
//! service call or an await point.

use crate::config::{ConfigError, TrackingConfig};
use crate::feed::{LocationFeed, Subscriber, Subscribers};
use crate::geometry::{closest_point_index, distance};
use crate::model::{Location, Prediction};
use crate::model_service::ModelService;
use crate::prediction::{predict, PredictionError};
use shuttle_env::{IdSequence, ShuttleContext, VehicleId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, error, info, warn, Level};

/// Per-vehicle tracking state.
#[derive(Debug, Default)]
struct TrackerState {
    /// Last observed location per vehicle
    updates: HashMap<VehicleId, Location>,

    /// Last prediction per vehicle
    predictions: HashMap<VehicleId, Prediction>,

    /// Vehicles whose last location is on a route, in arrival order
    active: Vec<VehicleId>,
}

impl TrackerState {
    /// Records `location` as the latest for `vehicle_id` and updates active
    /// membership. Returns the prediction standing before this update.
    fn observe(&mut self, vehicle_id: VehicleId, location: Location) -> Option<Prediction> {
        let on_route = location.route_id.is_some();
        self.updates.insert(vehicle_id, location);

        let position = self.active.iter().position(|id| *id == vehicle_id);
        match (on_route, position) {
            (true, None) => self.active.push(vehicle_id),
            (false, Some(i)) => {
                // Order among the remaining vehicles is not meaningful
                self.active.swap_remove(i);
            }
            _ => {}
        }

        self.predictions.get(&vehicle_id).copied()
    }
}

/// Outcome of one prediction tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    /// Vehicles predicted, persisted and announced
    pub predicted: usize,

    /// Vehicles that could not be predicted (missing vehicle, route, ...)
    pub skipped: usize,

    /// Vehicles whose derived location could not be persisted
    pub failed: usize,
}

/// Tracks active vehicles and periodically predicts their positions.
///
/// Generic over the context and model service, so the same manager runs on
/// the real clock in production and on a virtual clock under replay.
pub struct TrackingManager<Ctx, M>
where
    Ctx: ShuttleContext,
    M: ModelService,
{
    /// Environment context
    context: Arc<Ctx>,

    /// Persistence
    model: Arc<M>,

    /// Time between ticks
    interval: Duration,

    /// Whether `run` ticks at all
    enabled: bool,

    /// Source of ids for derived locations
    ids: Arc<IdSequence>,

    state: Mutex<TrackerState>,

    subscribers: Subscribers<Prediction>,
}

impl<Ctx, M> TrackingManager<Ctx, M>
where
    Ctx: ShuttleContext,
    M: ModelService,
{
    /// Creates a manager from `config`.
    ///
    /// Fails if the prediction interval does not parse.
    pub fn new(config: &TrackingConfig, context: Arc<Ctx>, model: Arc<M>) -> Result<Self, ConfigError> {
        let interval = config.interval()?;

        Ok(Self {
            context,
            model,
            interval,
            enabled: config.predict_updates,
            ids: Arc::new(IdSequence::new()),
            state: Mutex::new(TrackerState::default()),
            subscribers: Subscribers::new(),
        })
    }

    /// Draws derived location ids from a shared sequence.
    pub fn with_id_sequence(mut self, ids: Arc<IdSequence>) -> Self {
        self.ids = ids;
        self
    }

    /// Subscribes this manager to an upstream location feed.
    pub fn attach<F>(self: &Arc<Self>, feed: &F)
    where
        F: LocationFeed + ?Sized,
    {
        let manager = Arc::clone(self);
        feed.subscribe(Arc::new(move |location: Location| {
            manager.on_location(location);
        }));
    }

    /// Registers a callback for every new prediction.
    pub fn subscribe(&self, subscriber: Subscriber<Prediction>) {
        self.subscribers.subscribe(subscriber);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    fn state(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Handles a newly observed location from the upstream feed.
    pub fn on_location(&self, location: Location) {
        let Some(vehicle_id) = location.vehicle_id else {
            return;
        };

        let prior = self.state().observe(vehicle_id, location.clone());

        if let Some(prediction) = prior {
            if tracing::enabled!(Level::DEBUG) {
                self.log_prediction_error(&prediction, &location);
            }
        }
    }

    /// Compares a standing prediction against the observation that replaces it.
    fn log_prediction_error(&self, prediction: &Prediction, actual: &Location) {
        let actual_index = actual
            .route_id
            .and_then(|route_id| self.model.route(route_id).ok())
            .and_then(|route| closest_point_index(actual.latitude, actual.longitude, &route));
        let error_m = distance(prediction.point, actual.point());

        debug!(
            vehicle_id = %prediction.vehicle_id,
            predicted_index = prediction.index,
            predicted_lat = prediction.point.latitude,
            predicted_lon = prediction.point.longitude,
            actual_index = ?actual_index,
            actual_lat = actual.latitude,
            actual_lon = actual.longitude,
            index_error = ?actual_index.map(|i| i.abs_diff(prediction.index)),
            error_m,
            "prediction vs observation"
        );
    }

    /// Vehicles currently on a route.
    pub fn active_vehicles(&self) -> Vec<VehicleId> {
        self.state().active.clone()
    }

    pub fn last_location(&self, vehicle_id: VehicleId) -> Option<Location> {
        self.state().updates.get(&vehicle_id).cloned()
    }

    pub fn prediction(&self, vehicle_id: VehicleId) -> Option<Prediction> {
        self.state().predictions.get(&vehicle_id).copied()
    }

    /// Snapshot of the latest prediction for every vehicle.
    pub fn current_predictions(&self) -> HashMap<VehicleId, Prediction> {
        self.state().predictions.clone()
    }

    /// Predicts one vehicle and builds the derived location to persist.
    fn predict_vehicle(&self, vehicle_id: VehicleId, now: f64) -> Result<(Prediction, Location), PredictionError> {
        let vehicle = self.model.vehicle(vehicle_id)?;
        let last = self
            .last_location(vehicle_id)
            .ok_or(PredictionError::NoObservation(vehicle_id))?;
        let route_id = last.route_id.ok_or(PredictionError::NotOnRoute(vehicle_id))?;
        let route = self.model.route(route_id)?;
        let stops = self.model.stops()?;

        let prediction = predict(&vehicle, &last, &route, &stops, now)?;

        let derived = Location {
            id: self.ids.next_id(),
            tracker_id: last.tracker_id.clone(),
            vehicle_id: Some(vehicle_id),
            route_id: Some(route.id),
            latitude: prediction.point.latitude,
            longitude: prediction.point.longitude,
            heading: last.heading,
            speed: last.speed,
            observed_at: now,
            created_at: now,
        };

        Ok((prediction, derived))
    }

    /// Runs one prediction pass over the active vehicles.
    ///
    /// A vehicle that cannot be predicted or persisted is logged and skipped;
    /// the rest of the tick carries on.
    pub fn tick(&self) -> TickSummary {
        let now = self.context.unix_now();
        let active = self.active_vehicles();
        let mut summary = TickSummary::default();

        for vehicle_id in active {
            let (prediction, derived) = match self.predict_vehicle(vehicle_id, now) {
                Ok(result) => result,
                Err(e) => {
                    warn!(vehicle_id = %vehicle_id, error = %e, "cannot predict vehicle");
                    summary.skipped += 1;
                    continue;
                }
            };

            if let Err(e) = self.model.create_location(&derived) {
                error!(vehicle_id = %vehicle_id, error = %e, "could not create location for prediction");
                summary.failed += 1;
                continue;
            }

            self.state().predictions.insert(vehicle_id, prediction);
            self.subscribers.notify(&*self.context, &prediction);
            summary.predicted += 1;
        }

        summary
    }

    /// Ticks forever at the configured interval.
    ///
    /// Returns immediately when prediction is disabled.
    pub async fn run(&self) {
        if !self.enabled {
            info!("smooth tracking disabled");
            return;
        }

        info!(interval = ?self.interval, "smooth tracking started");
        loop {
            self.context.sleep(self.interval).await;
            let summary = self.tick();
            debug!(
                predicted = summary.predicted,
                skipped = summary.skipped,
                failed = summary.failed,
                "prediction tick"
            );
        }
    }
}
