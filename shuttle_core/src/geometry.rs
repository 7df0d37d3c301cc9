//! Route geometry and kinematics.
//!
//! Pure functions over [`Point`]s and [`Route`]s: great-circle distance,
//! bearing, placing a position on a route and walking a route forward.
//! Nothing here holds state, so every function is safe to call from any task.

use crate::model::{Point, Route, Stop};

/// Mean earth radius in meters (spherical model).
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Subtracted from every computed bearing; map markers are drawn rotated by
/// this amount.
pub const BEARING_OFFSET_DEG: f64 = 45.0;

/// hav(θ) = (1 - cos θ) / 2, evaluated as sin²(θ/2) to keep precision for
/// the short segments routes are made of.
#[inline]
fn haversine(theta: f64) -> f64 {
    (theta / 2.0).sin().powi(2)
}

/// Great-circle distance between two points in meters (haversine formula).
pub fn distance(p1: Point, p2: Point) -> f64 {
    let lat1 = p1.latitude.to_radians();
    let lon1 = p1.longitude.to_radians();
    let lat2 = p2.latitude.to_radians();
    let lon2 = p2.longitude.to_radians();

    let h = haversine(lat2 - lat1) + lat1.cos() * lat2.cos() * haversine(lon2 - lon1);

    // Rounding can push h a hair outside [0, 1] near antipodes
    2.0 * EARTH_RADIUS_M * h.clamp(0.0, 1.0).sqrt().asin()
}

/// Forward azimuth from `p1` to `p2` in degrees, offset by
/// [`BEARING_OFFSET_DEG`], in `[0, 360)`.
pub fn bearing(p1: Point, p2: Point) -> f64 {
    let lat1 = p1.latitude.to_radians();
    let lat2 = p2.latitude.to_radians();
    let delta_lon = (p2.longitude - p1.longitude).to_radians();

    let y = delta_lon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * delta_lon.cos();

    let azimuth = y.atan2(x).to_degrees().rem_euclid(360.0);
    let adjusted = (azimuth - BEARING_OFFSET_DEG).rem_euclid(360.0);
    if adjusted >= 360.0 {
        0.0
    } else {
        adjusted
    }
}

/// Index of the route point closest to (`latitude`, `longitude`).
///
/// Ties go to the lowest index. Returns `None` for a route without points.
pub fn closest_point_index(latitude: f64, longitude: f64, route: &Route) -> Option<usize> {
    let target = Point::new(latitude, longitude);
    let mut best: Option<(usize, f64)> = None;

    for (i, point) in route.points.iter().enumerate() {
        let d = distance(*point, target);
        match best {
            Some((_, min)) if d >= min => {}
            _ => best = Some((i, d)),
        }
    }

    best.map(|(i, _)| i)
}

fn resolve_stop<'a>(stop_index: usize, route: &Route, stops: &'a [Stop]) -> Option<&'a Stop> {
    let stop_id = route.stop_ids.get(stop_index)?;
    stops.iter().find(|s| s.id == *stop_id)
}

/// Index into `route.stop_ids` of the stop nearest to the route point at
/// `current_index`.
///
/// Stop ids with no entry in `stops` are skipped. Ties go to the first stop
/// in route order. Returns `None` when no listed stop resolves or
/// `current_index` is off the route.
pub fn closest_stop_index(current_index: usize, route: &Route, stops: &[Stop]) -> Option<usize> {
    let here = *route.points.get(current_index)?;
    let mut best: Option<(usize, f64)> = None;

    for i in 0..route.stop_ids.len() {
        let Some(stop) = resolve_stop(i, route, stops) else {
            continue;
        };
        let d = distance(stop.point(), here);
        match best {
            Some((_, min)) if d >= min => {}
            _ => best = Some((i, d)),
        }
    }

    best.map(|(i, _)| i)
}

/// Route point index closest to the stop at `stop_index` in `route.stop_ids`.
pub fn stop_route_index(stop_index: usize, route: &Route, stops: &[Stop]) -> Option<usize> {
    let stop = resolve_stop(stop_index, route, stops)?;
    closest_point_index(stop.latitude, stop.longitude, route)
}

/// Whether a vehicle at `current_index` is heading toward the stop at
/// `stop_index` rather than leaving it.
///
/// The stop counts as ahead when it is reached in fewer than half a loop by
/// walking forward.
pub fn is_approaching(current_index: usize, stop_index: usize, route: &Route, stops: &[Stop]) -> bool {
    let Some(stop_index) = stop_route_index(stop_index, route, stops) else {
        return false;
    };
    let half = route.len() / 2;

    if current_index <= stop_index {
        stop_index - current_index < half
    } else {
        current_index - stop_index > half
    }
}

/// Distance in meters covered walking forward along the route from
/// `from_index` to `to_index`, wrapping at the end of the loop.
///
/// Zero when the indices are equal or either one is off the route.
pub fn along_route_distance(from_index: usize, to_index: usize, route: &Route) -> f64 {
    if from_index >= route.len() || to_index >= route.len() {
        return 0.0;
    }

    let mut elapsed = 0.0;
    let mut index = from_index;
    while index != to_index {
        let prev = index;
        index = route.next_index(index);
        elapsed += distance(route.points[prev], route.points[index]);
    }
    elapsed
}

/// Total length of the closed loop in meters.
pub fn loop_length(route: &Route) -> f64 {
    (0..route.len())
        .map(|i| distance(route.points[i], route.points[route.next_index(i)]))
        .sum()
}

/// Constant deceleration that brings a vehicle moving at `speed` m/s to rest
/// after `distance` meters: `a = -v² / (2d)`.
///
/// `distance` must be strictly positive.
pub fn braking_deceleration(speed: f64, distance: f64) -> f64 {
    debug_assert!(distance > 0.0, "braking distance must be positive");
    -speed.powi(2) / (2.0 * distance)
}
