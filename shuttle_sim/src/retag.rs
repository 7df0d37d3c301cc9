//! Rewrites the ids in a replay recording.
//!
//! Recordings are usually captured from one vehicle and replayed as another.
//! Every record gets the given vehicle, route and tracker ids; all other
//! fields are left untouched.

use crate::error::SimError;
use serde_json::{Map, Value};
use shuttle_env::{RouteId, VehicleId};
use std::path::Path;

/// The ids stamped onto every record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Retag {
    pub vehicle_id: VehicleId,
    pub route_id: RouteId,
    pub tracker_id: String,
}

impl Retag {
    fn apply(&self, record: &mut Map<String, Value>) {
        record.insert("vehicle_id".to_string(), Value::from(self.vehicle_id.get()));
        record.insert("route_id".to_string(), Value::from(self.route_id.get()));
        record.insert("tracker_id".to_string(), Value::from(self.tracker_id.clone()));
    }
}

/// Retags every object in `records`. Returns how many were rewritten.
pub fn retag(records: &mut [Value], tag: &Retag) -> usize {
    let mut count = 0;
    for record in records.iter_mut() {
        if let Value::Object(fields) = record {
            tag.apply(fields);
            count += 1;
        }
    }
    count
}

/// Retags a recording file in place.
pub fn retag_file(path: &Path, tag: &Retag) -> Result<usize, SimError> {
    let raw = std::fs::read_to_string(path).map_err(|e| SimError::io(path, e))?;
    let mut records: Vec<Value> = serde_json::from_str(&raw).map_err(|e| SimError::parse(path, e))?;

    let count = retag(&mut records, tag);

    let mut out = serde_json::to_string_pretty(&records).map_err(|e| SimError::parse(path, e))?;
    out.push('\n');
    std::fs::write(path, out).map_err(|e| SimError::io(path, e))?;

    tracing::info!(path = %path.display(), records = count, vehicle_id = %tag.vehicle_id, "retagged recording");
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shuttle_core::Location;

    fn tag() -> Retag {
        Retag {
            vehicle_id: VehicleId(12),
            route_id: RouteId(3),
            tracker_id: "1234567890".to_string(),
        }
    }

    #[test]
    fn test_retag_overwrites_ids_only() {
        let mut records: Vec<Value> = serde_json::from_str(
            r#"[
                {"vehicle_id": 1, "route_id": 9, "tracker_id": "old", "latitude": 42.7, "longitude": -73.6, "speed": 4.5},
                {"latitude": 42.8, "longitude": -73.5},
                "not a record"
            ]"#,
        )
        .unwrap();

        assert_eq!(retag(&mut records, &tag()), 2);

        assert_eq!(records[0]["vehicle_id"], 12);
        assert_eq!(records[0]["route_id"], 3);
        assert_eq!(records[0]["tracker_id"], "1234567890");
        assert_eq!(records[0]["speed"], 4.5);
        assert_eq!(records[1]["vehicle_id"], 12);
        assert_eq!(records[1]["latitude"], 42.8);
        assert_eq!(records[2], "not a record");
    }

    #[test]
    fn test_retag_file_round_trips_as_locations() {
        let path = std::env::temp_dir().join(format!("shuttle-retag-{}.json", std::process::id()));
        std::fs::write(
            &path,
            r#"[{"latitude": 42.73, "longitude": -73.68, "speed": 3.0}, {"latitude": 42.74, "longitude": -73.67}]"#,
        )
        .unwrap();

        assert_eq!(retag_file(&path, &tag()).unwrap(), 2);

        let raw = std::fs::read_to_string(&path).unwrap();
        let locations: Vec<Location> = serde_json::from_str(&raw).unwrap();
        assert!(locations
            .iter()
            .all(|l| l.vehicle_id == Some(VehicleId(12)) && l.route_id == Some(RouteId(3))));
        assert_eq!(locations[0].tracker_id, "1234567890");
        assert_eq!(locations[0].speed, 3.0);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_retag_file_rejects_non_array() {
        let path = std::env::temp_dir().join(format!("shuttle-retag-object-{}.json", std::process::id()));
        std::fs::write(&path, r#"{"latitude": 1.0}"#).unwrap();

        assert!(matches!(retag_file(&path, &tag()), Err(SimError::Parse { .. })));
        std::fs::remove_file(&path).unwrap();
    }
}
