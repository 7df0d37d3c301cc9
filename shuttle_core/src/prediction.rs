//! Position prediction along a route.
//!
//! Given the last observed location of a vehicle and the time elapsed since,
//! estimate where on its route the vehicle is now:
//! 1. Snap the observation to the nearest route point
//! 2. Project the distance travelled at constant speed
//! 3. Near a stop the vehicle is heading to, use constant deceleration instead
//! 4. Walk the route forward by the projected distance

use crate::geometry::{
    along_route_distance, bearing, braking_deceleration, closest_point_index, closest_stop_index,
    distance, is_approaching, loop_length, stop_route_index,
};
use crate::model::{Location, Prediction, Route, Stop, Vehicle};
use crate::model_service::ModelError;
use shuttle_env::{RouteId, VehicleId};
use thiserror::Error;

/// Below this distance to an approaching stop (meters) the vehicle is assumed
/// to be braking.
pub const BRAKING_THRESHOLD_M: f64 = 30.0;

/// Why a vehicle could not be predicted on a tick.
#[derive(Debug, Error)]
pub enum PredictionError {
    #[error("no prior observation for vehicle {0}")]
    NoObservation(VehicleId),

    #[error("vehicle {0} is not on a route")]
    NotOnRoute(VehicleId),

    #[error("route {0} has no points")]
    EmptyRoute(RouteId),

    #[error("model lookup failed: {0}")]
    Model(#[from] ModelError),
}

/// Predicts the current position of `vehicle` on `route`.
///
/// `now` is the current wall-clock time in Unix seconds; the elapsed time is
/// measured against `last.observed_at`.
pub fn predict(
    vehicle: &Vehicle,
    last: &Location,
    route: &Route,
    stops: &[Stop],
    now: f64,
) -> Result<Prediction, PredictionError> {
    let index = closest_point_index(last.latitude, last.longitude, route)
        .ok_or(PredictionError::EmptyRoute(route.id))?;

    let elapsed = now - last.observed_at;
    let mut projected = elapsed * last.speed;

    if let Some(distance_to_stop) = distance_to_approaching_stop(index, route, stops) {
        if distance_to_stop < BRAKING_THRESHOLD_M {
            projected = braking_projection(last.speed, elapsed, distance_to_stop);
        }
    }

    let (index, angle) = walk_forward(route, index, projected);

    Ok(Prediction {
        vehicle_id: vehicle.id,
        point: route.points[index],
        index,
        angle,
    })
}

/// Along-route distance to the nearest stop, if the vehicle is heading to it.
fn distance_to_approaching_stop(index: usize, route: &Route, stops: &[Stop]) -> Option<f64> {
    let stop = closest_stop_index(index, route, stops)?;
    if !is_approaching(index, stop, route, stops) {
        return None;
    }
    let stop_index = stop_route_index(stop, route, stops)?;
    Some(along_route_distance(index, stop_index, route))
}

/// Distance covered in `elapsed` seconds while braking to rest over
/// `distance_to_stop` meters: `d = v·t + ½·a·t²`.
fn braking_projection(speed: f64, elapsed: f64, distance_to_stop: f64) -> f64 {
    if distance_to_stop <= 0.0 {
        // Already at the stop
        return 0.0;
    }
    let a = braking_deceleration(speed, distance_to_stop);
    speed * elapsed + 0.5 * a * elapsed.powi(2)
}

/// Walks forward from `start` until at least `projected` meters are covered.
///
/// Returns the index reached and the bearing of the last segment walked. A
/// non-positive projection walks nowhere: `(start, 0.0)`. Whole laps are
/// dropped first so a stale observation cannot spin the walk.
pub fn walk_forward(route: &Route, start: usize, projected: f64) -> (usize, f64) {
    let total = loop_length(route);
    if !(projected > 0.0) || total <= 0.0 {
        return (start, 0.0);
    }

    let mut remaining = projected;
    if remaining > total {
        remaining -= ((remaining / total).ceil() - 1.0) * total;
    }

    let mut elapsed = 0.0;
    let mut index = start;
    let mut angle = 0.0;
    while elapsed < remaining {
        let prev = index;
        index = route.next_index(index);
        elapsed += distance(route.points[prev], route.points[index]);
        angle = bearing(route.points[prev], route.points[index]);
    }
    (index, angle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Point;
    use approx::assert_relative_eq;
    use shuttle_env::{LocationId, StopId};

    const NOW: f64 = 1_700_000_000.0;

    fn vehicle() -> Vehicle {
        Vehicle {
            id: VehicleId(7),
            name: "Bus 7".to_string(),
        }
    }

    fn square_route() -> Route {
        Route {
            id: RouteId(1),
            name: "square".to_string(),
            points: vec![
                Point::new(0.0, 0.0),
                Point::new(0.0, 0.001),
                Point::new(0.001, 0.001),
                Point::new(0.001, 0.0),
            ],
            stop_ids: vec![],
        }
    }

    /// Ten points heading east along the equator, roughly 11 m apart.
    fn line_route() -> Route {
        Route {
            id: RouteId(2),
            name: "line".to_string(),
            points: (0..10).map(|i| Point::new(0.0, i as f64 * 0.0001)).collect(),
            stop_ids: vec![StopId(1)],
        }
    }

    fn stop_at(p: Point) -> Vec<Stop> {
        vec![Stop {
            id: StopId(1),
            name: "Union".to_string(),
            latitude: p.latitude,
            longitude: p.longitude,
        }]
    }

    fn location_at(p: Point, speed: f64, observed_at: f64) -> Location {
        Location {
            id: LocationId(1),
            tracker_id: "t-7".to_string(),
            vehicle_id: Some(VehicleId(7)),
            route_id: Some(RouteId(1)),
            latitude: p.latitude,
            longitude: p.longitude,
            heading: 0.0,
            speed,
            observed_at,
            created_at: observed_at,
        }
    }

    #[test]
    fn test_zero_speed_stays_put() {
        let route = square_route();
        let last = location_at(route.points[2], 0.0, NOW - 30.0);

        let p = predict(&vehicle(), &last, &route, &[], NOW).unwrap();
        assert_eq!(p.index, 2);
        assert_eq!(p.point, route.points[2]);
        assert_eq!(p.angle, 0.0);
        assert_eq!(p.vehicle_id, VehicleId(7));
    }

    #[test]
    fn test_zero_elapsed_stays_put() {
        let route = square_route();
        let last = location_at(route.points[1], 12.0, NOW);

        let p = predict(&vehicle(), &last, &route, &[], NOW).unwrap();
        assert_eq!(p.index, 1);
        assert_eq!(p.angle, 0.0);
    }

    #[test]
    fn test_exact_segment_lands_on_next_point() {
        let route = square_route();
        let side = distance(route.points[0], route.points[1]);
        // One second at exactly one side's worth of speed
        let last = location_at(route.points[0], side, NOW - 1.0);

        let p = predict(&vehicle(), &last, &route, &[], NOW).unwrap();
        assert_eq!(p.index, 1);
        assert_eq!(p.point, route.points[1]);
        assert_relative_eq!(p.angle, bearing(route.points[0], route.points[1]));
    }

    #[test]
    fn test_walk_wraps_past_end_of_route() {
        let route = square_route();
        let side = distance(route.points[3], route.points[0]);
        let last = location_at(route.points[3], side * 1.5, NOW - 1.0);

        let p = predict(&vehicle(), &last, &route, &[], NOW).unwrap();
        assert_eq!(p.index, 1);
    }

    #[test]
    fn test_snaps_to_nearest_point_first() {
        let route = line_route();
        // Slightly north of point 4
        let off_route = Point::new(0.00002, 0.0004);
        let last = location_at(off_route, 0.0, NOW);

        let p = predict(&vehicle(), &last, &route, &[], NOW).unwrap();
        assert_eq!(p.index, 4);
        assert_eq!(p.point, route.points[4]);
    }

    #[test]
    fn test_braking_near_approaching_stop() {
        let route = line_route();
        let stops = stop_at(route.points[3]);
        let last = location_at(route.points[1], 10.0, NOW - 1.2);

        // Unconstrained, 12 m carries the vehicle past point 2 to point 3
        assert_eq!(walk_forward(&route, 1, 12.0).0, 3);

        // Braking over the ~22 m to the stop shortens that to ~10.4 m
        let p = predict(&vehicle(), &last, &route, &stops, NOW).unwrap();
        assert_eq!(p.index, 2);
        assert_relative_eq!(p.angle, 45.0, epsilon = 1e-9);
    }

    #[test]
    fn test_no_braking_after_passing_stop() {
        let route = line_route();
        let stops = stop_at(route.points[3]);
        let last = location_at(route.points[4], 10.0, NOW - 1.2);

        let p = predict(&vehicle(), &last, &route, &stops, NOW).unwrap();
        assert_eq!(p.index, 6);
    }

    #[test]
    fn test_vehicle_at_stop_stays() {
        let route = line_route();
        let stops = stop_at(route.points[3]);
        let last = location_at(route.points[3], 8.0, NOW - 5.0);

        let p = predict(&vehicle(), &last, &route, &stops, NOW).unwrap();
        assert_eq!(p.index, 3);
        assert_eq!(p.angle, 0.0);
    }

    #[test]
    fn test_empty_route_is_an_error() {
        let mut route = square_route();
        route.points.clear();
        let last = location_at(Point::new(0.0, 0.0), 5.0, NOW - 1.0);

        let err = predict(&vehicle(), &last, &route, &[], NOW).unwrap_err();
        assert!(matches!(err, PredictionError::EmptyRoute(RouteId(1))));
    }

    #[test]
    fn test_walk_forward_drops_whole_laps() {
        let route = square_route();
        let lap = loop_length(&route);
        let side = distance(route.points[0], route.points[1]);

        let (index, _) = walk_forward(&route, 0, 1000.0 * lap + 0.5 * side);
        assert_eq!(index, 1);
    }

    #[test]
    fn test_walk_forward_degenerate_route() {
        let route = Route {
            id: RouteId(3),
            name: String::new(),
            points: vec![Point::new(1.0, 1.0); 3],
            stop_ids: vec![],
        };
        assert_eq!(walk_forward(&route, 1, 50.0), (1, 0.0));
        assert_eq!(walk_forward(&route, 1, f64::NAN), (1, 0.0));
    }
}
