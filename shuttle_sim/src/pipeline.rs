//! Replay feeding the tracking manager.

use crate::config::ShuttleConfig;
use crate::replay::ReplayEngine;
use shuttle_core::{ConfigError, ModelService, TrackingManager};
use shuttle_env::{IdSequence, ShuttleContext};
use std::sync::Arc;

/// A replay engine with a tracking manager attached to it.
///
/// Both draw location ids from one sequence, so replayed and predicted
/// locations never collide in storage.
pub struct Pipeline<Ctx, M>
where
    Ctx: ShuttleContext,
    M: ModelService,
{
    replay: Arc<ReplayEngine<Ctx, M>>,
    tracker: Arc<TrackingManager<Ctx, M>>,
}

impl<Ctx, M> Pipeline<Ctx, M>
where
    Ctx: ShuttleContext,
    M: ModelService,
{
    pub fn new(config: &ShuttleConfig, context: Arc<Ctx>, model: Arc<M>) -> Result<Self, ConfigError> {
        let ids = Arc::new(IdSequence::new());

        let replay = ReplayEngine::new(&config.replay, Arc::clone(&context), Arc::clone(&model))?
            .with_id_sequence(Arc::clone(&ids));
        let tracker = TrackingManager::new(&config.tracking, context, model)?.with_id_sequence(ids);

        let replay = Arc::new(replay);
        let tracker = Arc::new(tracker);
        tracker.attach(replay.as_ref());

        Ok(Self { replay, tracker })
    }

    pub fn replay(&self) -> &Arc<ReplayEngine<Ctx, M>> {
        &self.replay
    }

    pub fn tracker(&self) -> &Arc<TrackingManager<Ctx, M>> {
        &self.tracker
    }

    /// Runs both loops until both return.
    pub async fn run(&self) {
        tokio::join!(self.replay.run(), self.tracker.run());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SimContext;
    use crate::model::MemoryModelService;
    use shuttle_core::{Location, Point, Route, Vehicle};
    use shuttle_env::{LocationId, RouteId, VehicleId};
    use std::time::Duration;

    /// Eight points heading east, about 41 m apart.
    fn model() -> Arc<MemoryModelService> {
        let model = MemoryModelService::new();
        model.add_vehicle(Vehicle {
            id: VehicleId(7),
            name: "Bus 7".to_string(),
        });
        model.add_route(Route {
            id: RouteId(1),
            name: "East".to_string(),
            points: (0..8).map(|i| Point::new(42.73, -73.68 + i as f64 * 0.0005)).collect(),
            stop_ids: vec![],
        });
        Arc::new(model)
    }

    fn record(longitude: f64) -> Location {
        Location {
            id: LocationId(0),
            tracker_id: "tracker-7".to_string(),
            vehicle_id: Some(VehicleId(7)),
            route_id: Some(RouteId(1)),
            latitude: 42.73,
            longitude,
            heading: 90.0,
            speed: 10.0,
            observed_at: 0.0,
            created_at: 0.0,
        }
    }

    async fn wait_for_observation(pipeline: &Pipeline<SimContext, MemoryModelService>, id: LocationId) {
        for _ in 0..200 {
            let seen = pipeline
                .tracker()
                .last_location(VehicleId(7))
                .is_some_and(|l| l.id == id);
            if seen {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("tracker never saw location {}", id);
    }

    #[tokio::test]
    async fn test_replayed_location_drives_prediction() {
        let ctx = SimContext::shared();
        let model = model();
        let pipeline = Pipeline::new(&ShuttleConfig::default(), Arc::clone(&ctx), Arc::clone(&model)).unwrap();
        pipeline.replay().insert_sequence("bus-7", vec![record(-73.68)]).unwrap();

        pipeline.replay().step();
        wait_for_observation(&pipeline, LocationId(1)).await;
        assert_eq!(pipeline.tracker().active_vehicles(), vec![VehicleId(7)]);

        // 50 m at 10 m/s carries the bus past point 1 to point 2
        ctx.advance_time(Duration::from_secs(5));
        let summary = pipeline.tracker().tick();
        assert_eq!(summary.predicted, 1);

        let prediction = pipeline.tracker().prediction(VehicleId(7)).unwrap();
        assert_eq!(prediction.index, 2);

        // Replayed and derived locations share one id sequence
        let ids: Vec<LocationId> = model.created_locations().iter().map(|l| l.id).collect();
        assert_eq!(ids, vec![LocationId(1), LocationId(2)]);
    }

    #[tokio::test]
    async fn test_disabled_pipeline_returns() {
        let pipeline = Pipeline::new(&ShuttleConfig::default(), SimContext::shared(), model()).unwrap();
        pipeline.run().await;
        assert!(pipeline.tracker().current_predictions().is_empty());
    }

    #[tokio::test]
    async fn test_virtual_run_keeps_both_intervals() {
        let ctx = SimContext::shared();
        let model = model();
        let mut config = ShuttleConfig::default();
        config.replay.replay_updates = true;
        config.replay.data_dir = std::path::PathBuf::from("/nonexistent/recordings");
        config.tracking.predict_updates = true;
        let pipeline = Pipeline::new(&config, Arc::clone(&ctx), Arc::clone(&model)).unwrap();

        // Parked just north of point 0, so replayed and predicted fixes differ
        let mut parked = record(-73.68);
        parked.latitude = 42.7301;
        parked.speed = 0.0;
        pipeline.replay().insert_sequence("bus-7", vec![parked]).unwrap();

        tokio::select! {
            _ = pipeline.run() => panic!("enabled loops never return"),
            _ = ctx.sleep(Duration::from_secs(35)) => {}
        }

        let epoch = 1704067200.0;
        let created = model.created_locations();
        let stamps = |replayed: bool| -> Vec<f64> {
            created
                .iter()
                .filter(|l| (l.latitude == 42.7301) == replayed)
                .map(|l| l.observed_at - epoch)
                .collect()
        };

        assert_eq!(stamps(true), vec![0.0, 10.0, 20.0, 30.0]);

        let predicted = stamps(false);
        assert_eq!(predicted.first(), Some(&1.0));
        assert!(predicted.len() >= 34, "only {} ticks", predicted.len());
        for pair in predicted.windows(2) {
            assert_eq!(pair[1] - pair[0], 1.0);
        }
    }

    #[tokio::test]
    async fn test_demo_data_loads_and_predicts() {
        let demos = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../demos");
        let ctx = SimContext::shared();
        let model = Arc::new(MemoryModelService::from_file(demos.join("model.json")).unwrap());
        let config = ShuttleConfig::from_file(demos.join("config.json")).unwrap();
        let pipeline = Pipeline::new(&config, Arc::clone(&ctx), Arc::clone(&model)).unwrap();

        assert_eq!(pipeline.replay().load_dir(&demos.join("replay")).unwrap(), 2);
        assert_eq!(pipeline.replay().vehicles(), vec![VehicleId(7), VehicleId(9)]);

        assert_eq!(pipeline.replay().step().emitted, 2);
        for _ in 0..200 {
            if pipeline.tracker().active_vehicles().len() == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        ctx.advance_time(Duration::from_secs(3));
        let summary = pipeline.tracker().tick();
        assert_eq!(summary.predicted, 2);
        assert_eq!(pipeline.tracker().current_predictions().len(), 2);
    }

    #[test]
    fn test_bad_interval_fails_construction() {
        let mut config = ShuttleConfig::default();
        config.replay.replay_interval = "0s".to_string();
        assert!(Pipeline::new(&config, SimContext::shared(), model()).is_err());
    }
}
