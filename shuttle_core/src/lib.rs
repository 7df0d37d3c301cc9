//! Shuttle Core - Smooth Tracking for Route-Bound Vehicles
//!
//! GPS trackers on shuttles report every few seconds. Between reports, this
//! library estimates where each vehicle has got to so a map can show smooth
//! movement:
//! 1. **Geometry**: haversine distance, bearing, snapping to a route, walking it
//! 2. **Prediction**: constant-speed projection with braking near stops
//! 3. **Tracking**: per-vehicle state, the prediction loop, subscriber fan-out
//!
//! Upstream locations arrive through a [`LocationFeed`]; persistence goes
//! through a [`ModelService`].

pub mod config;
pub mod feed;
pub mod geometry;
pub mod model;
pub mod model_service;
pub mod prediction;
pub mod tracking;

// Re-export key types for convenience
pub use config::{parse_interval, ConfigError, TrackingConfig};
pub use feed::{LiveFeed, LocationFeed, Subscriber, Subscribers};
pub use model::{Location, Point, Prediction, Route, Stop, Vehicle};
pub use model_service::{ModelError, ModelService};
pub use prediction::{predict, PredictionError};
pub use tracking::{TickSummary, TrackingManager};
