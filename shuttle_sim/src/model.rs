//! In-memory model service for replay runs and tests.

use crate::error::SimError;
use serde::{Deserialize, Serialize};
use shuttle_core::{Location, ModelError, ModelService, Route, Stop, Vehicle};
use shuttle_env::{RouteId, VehicleId};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Vehicles, routes and stops as stored in a fixture file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelFixture {
    pub vehicles: Vec<Vehicle>,
    pub routes: Vec<Route>,
    pub stops: Vec<Stop>,
}

#[derive(Default)]
struct Catalog {
    vehicles: HashMap<VehicleId, Vehicle>,
    routes: HashMap<RouteId, Route>,
    stops: Vec<Stop>,
}

/// Created locations kept by default.
pub const DEFAULT_HISTORY: usize = 10_000;

/// Bounded record of persisted locations.
#[derive(Debug)]
struct History {
    recent: VecDeque<Location>,
    capacity: usize,
    total: u64,
}

impl History {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            recent: VecDeque::new(),
            capacity,
            total: 0,
        }
    }

    fn push(&mut self, location: Location) {
        self.total += 1;
        if self.capacity == 0 {
            return;
        }
        if self.recent.len() == self.capacity {
            self.recent.pop_front();
        }
        self.recent.push_back(location);
    }
}

/// A `ModelService` that keeps everything in memory.
///
/// The most recent created locations are kept in order, up to a fixed
/// history size, so an open-ended replay run does not grow without bound.
/// Persistence can be made to fail for chosen vehicles to exercise the
/// skip-and-continue paths.
pub struct MemoryModelService {
    catalog: RwLock<Catalog>,
    created: Mutex<History>,
    failing: Mutex<HashSet<VehicleId>>,
}

impl Default for MemoryModelService {
    fn default() -> Self {
        Self::with_history(DEFAULT_HISTORY)
    }
}

impl MemoryModelService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps at most `capacity` created locations.
    pub fn with_history(capacity: usize) -> Self {
        Self {
            catalog: RwLock::new(Catalog::default()),
            created: Mutex::new(History::with_capacity(capacity)),
            failing: Mutex::new(HashSet::new()),
        }
    }

    pub fn from_fixture(fixture: ModelFixture) -> Self {
        let model = Self::new();
        for vehicle in fixture.vehicles {
            model.add_vehicle(vehicle);
        }
        for route in fixture.routes {
            model.add_route(route);
        }
        for stop in fixture.stops {
            model.add_stop(stop);
        }
        model
    }

    /// Loads a fixture from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SimError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| SimError::io(path, e))?;
        let fixture: ModelFixture = serde_json::from_str(&raw).map_err(|e| SimError::parse(path, e))?;

        tracing::info!(
            path = %path.display(),
            vehicles = fixture.vehicles.len(),
            routes = fixture.routes.len(),
            stops = fixture.stops.len(),
            "loaded model fixture"
        );
        Ok(Self::from_fixture(fixture))
    }

    fn catalog_mut(&self) -> RwLockWriteGuard<'_, Catalog> {
        self.catalog.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn catalog(&self) -> RwLockReadGuard<'_, Catalog> {
        self.catalog.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn failing(&self) -> MutexGuard<'_, HashSet<VehicleId>> {
        self.failing.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_vehicle(&self, vehicle: Vehicle) {
        self.catalog_mut().vehicles.insert(vehicle.id, vehicle);
    }

    pub fn add_route(&self, route: Route) {
        self.catalog_mut().routes.insert(route.id, route);
    }

    pub fn add_stop(&self, stop: Stop) {
        self.catalog_mut().stops.push(stop);
    }

    fn created(&self) -> MutexGuard<'_, History> {
        self.created.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The retained locations, oldest first.
    pub fn created_locations(&self) -> Vec<Location> {
        self.created().recent.iter().cloned().collect()
    }

    /// Locations persisted since creation, including ones no longer retained.
    pub fn created_count(&self) -> u64 {
        self.created().total
    }

    /// Makes `create_location` fail for `vehicle_id` until `recover` is called.
    pub fn fail_creates_for(&self, vehicle_id: VehicleId) {
        self.failing().insert(vehicle_id);
    }

    pub fn recover(&self, vehicle_id: VehicleId) {
        self.failing().remove(&vehicle_id);
    }
}

impl ModelService for MemoryModelService {
    fn create_location(&self, location: &Location) -> Result<(), ModelError> {
        if let Some(vehicle_id) = location.vehicle_id {
            if self.failing().contains(&vehicle_id) {
                return Err(ModelError::storage(format!(
                    "injected failure for vehicle {}",
                    vehicle_id
                )));
            }
        }
        self.created().push(location.clone());
        Ok(())
    }

    fn vehicle(&self, id: VehicleId) -> Result<Vehicle, ModelError> {
        self.catalog()
            .vehicles
            .get(&id)
            .cloned()
            .ok_or(ModelError::VehicleNotFound(id))
    }

    fn route(&self, id: RouteId) -> Result<Route, ModelError> {
        self.catalog()
            .routes
            .get(&id)
            .cloned()
            .ok_or(ModelError::RouteNotFound(id))
    }

    fn stops(&self) -> Result<Vec<Stop>, ModelError> {
        Ok(self.catalog().stops.clone())
    }
}
