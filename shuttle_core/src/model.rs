//! Domain records shared by the tracking pipeline.
//!
//! Routes, stops and vehicles are owned by the model service; this crate only
//! reads them. Locations and predictions are produced here.

use serde::{Deserialize, Serialize};
use shuttle_env::{LocationId, RouteId, StopId, VehicleId};

/// A position on the earth's surface, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub latitude: f64,
    pub longitude: f64,
}

impl Point {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

/// A precomputed, cyclic route.
///
/// The last point connects back to the first. `stop_ids` lists the stops
/// served by the route, in service order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub id: RouteId,

    #[serde(default)]
    pub name: String,

    pub points: Vec<Point>,

    #[serde(default)]
    pub stop_ids: Vec<StopId>,
}

impl Route {
    /// Number of points on the loop.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// The index following `index` on the loop.
    #[inline]
    pub fn next_index(&self, index: usize) -> usize {
        if index + 1 >= self.points.len() {
            0
        } else {
            index + 1
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stop {
    pub id: StopId,

    #[serde(default)]
    pub name: String,

    pub latitude: f64,
    pub longitude: f64,
}

impl Stop {
    pub fn point(&self) -> Point {
        Point::new(self.latitude, self.longitude)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: VehicleId,

    #[serde(default)]
    pub name: String,
}

/// One observed or derived position fix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Assigned by the component that produced this fix
    #[serde(default)]
    pub id: LocationId,

    /// Hardware tracker that reported the fix
    #[serde(default)]
    pub tracker_id: String,

    /// `None` means the fix is not assigned to a vehicle
    #[serde(default)]
    pub vehicle_id: Option<VehicleId>,

    /// `None` means the vehicle is not on a route
    #[serde(default)]
    pub route_id: Option<RouteId>,

    pub latitude: f64,
    pub longitude: f64,

    /// Heading in degrees
    #[serde(default)]
    pub heading: f64,

    /// Speed in meters per second
    #[serde(default)]
    pub speed: f64,

    /// Observation time (Unix seconds)
    #[serde(rename = "time", default)]
    pub observed_at: f64,

    /// Creation time (Unix seconds)
    #[serde(rename = "created", default)]
    pub created_at: f64,
}

impl Location {
    pub fn point(&self) -> Point {
        Point::new(self.latitude, self.longitude)
    }
}

/// A derived estimate of where a vehicle is now.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub vehicle_id: VehicleId,
    pub point: Point,
    /// Index into the route's points
    pub index: usize,
    /// Bearing of travel in degrees
    pub angle: f64,
}
