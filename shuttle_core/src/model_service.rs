//! The model service: persistence of vehicles, routes, stops and locations.
//!
//! Storage is an external concern. The tracking manager and the replay engine
//! only need the four calls below, made synchronously from their tick loops.

use crate::model::{Location, Route, Stop, Vehicle};
use shuttle_env::{RouteId, VehicleId};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("vehicle {0} not found")]
    VehicleNotFound(VehicleId),

    #[error("route {0} not found")]
    RouteNotFound(RouteId),

    /// Backend failure (connection lost, constraint violated, ...)
    #[error("storage error: {0}")]
    Storage(String),
}

impl ModelError {
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }
}

/// Read/write access to the persisted model.
pub trait ModelService: Send + Sync + 'static {
    /// Persists a new location.
    fn create_location(&self, location: &Location) -> Result<(), ModelError>;

    fn vehicle(&self, id: VehicleId) -> Result<Vehicle, ModelError>;

    fn route(&self, id: RouteId) -> Result<Route, ModelError>;

    /// All known stops.
    fn stops(&self) -> Result<Vec<Stop>, ModelError>;
}

impl<M: ModelService + ?Sized> ModelService for Arc<M> {
    fn create_location(&self, location: &Location) -> Result<(), ModelError> {
        (**self).create_location(location)
    }

    fn vehicle(&self, id: VehicleId) -> Result<Vehicle, ModelError> {
        (**self).vehicle(id)
    }

    fn route(&self, id: RouteId) -> Result<Route, ModelError> {
        (**self).route(id)
    }

    fn stops(&self) -> Result<Vec<Stop>, ModelError> {
        (**self).stops()
    }
}
