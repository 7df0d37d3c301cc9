//! The replay engine.
//!
//! Plays back recorded location sequences as if they were being observed
//! live. Each `*.json` file in the data directory holds one vehicle's
//! recording; on every step the engine emits the next record of every
//! vehicle, re-stamped with the current time and a fresh id, persists it and
//! hands it to subscribers. Recordings loop forever.
//!
//! The engine implements [`LocationFeed`], so a tracking manager can be
//! attached to it exactly as it would be to a live feed.

use crate::error::SimError;
use serde::{Deserialize, Serialize};
use shuttle_core::{parse_interval, ConfigError, Location, LocationFeed, ModelService, Subscriber, Subscribers};
use shuttle_env::{IdSequence, ShuttleContext, VehicleId};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Configuration for the ReplayEngine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReplayConfig {
    /// Replay recorded locations at all (default: false)
    pub replay_updates: bool,

    /// Time between replay steps (default: "10s")
    pub replay_interval: String,

    /// Directory holding one `*.json` recording per vehicle (default: "spoof_data")
    pub data_dir: PathBuf,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            replay_updates: false,
            replay_interval: "10s".to_string(),
            data_dir: PathBuf::from("spoof_data"),
        }
    }
}

impl ReplayConfig {
    /// The validated step interval.
    pub fn interval(&self) -> Result<Duration, ConfigError> {
        parse_interval(&self.replay_interval)
    }
}

/// One vehicle's recording and playback position.
#[derive(Debug)]
struct ReplayTrack {
    /// Where the recording came from
    source: String,

    /// Never empty
    locations: Vec<Location>,

    /// Always in `[0, locations.len())`
    cursor: usize,

    /// Distinguishes a reloaded recording from the one it replaced
    generation: u64,
}

impl ReplayTrack {
    fn current(&self) -> &Location {
        &self.locations[self.cursor]
    }

    fn advance(&mut self) {
        self.cursor += 1;
        if self.cursor >= self.locations.len() {
            self.cursor = 0;
        }
    }
}

/// Outcome of one replay step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepSummary {
    /// Records persisted and announced
    pub emitted: usize,

    /// Records that could not be persisted; those cursors did not move
    pub failed: usize,
}

/// Replays recorded locations on a fixed interval.
pub struct ReplayEngine<Ctx, M>
where
    Ctx: ShuttleContext,
    M: ModelService,
{
    context: Arc<Ctx>,
    model: Arc<M>,
    interval: Duration,
    enabled: bool,
    data_dir: PathBuf,

    /// Source of ids for emitted locations
    ids: Arc<IdSequence>,

    /// Recordings in vehicle id order
    tracks: Mutex<BTreeMap<VehicleId, ReplayTrack>>,

    generations: AtomicU64,

    subscribers: Subscribers<Location>,
}

impl<Ctx, M> ReplayEngine<Ctx, M>
where
    Ctx: ShuttleContext,
    M: ModelService,
{
    /// Creates an engine from `config`.
    ///
    /// Fails if the replay interval does not parse. Recordings are read when
    /// the engine starts running, or explicitly through `load_dir`.
    pub fn new(config: &ReplayConfig, context: Arc<Ctx>, model: Arc<M>) -> Result<Self, ConfigError> {
        let interval = config.interval()?;

        Ok(Self {
            context,
            model,
            interval,
            enabled: config.replay_updates,
            data_dir: config.data_dir.clone(),
            ids: Arc::new(IdSequence::new()),
            tracks: Mutex::new(BTreeMap::new()),
            generations: AtomicU64::new(0),
            subscribers: Subscribers::new(),
        })
    }

    /// Draws emitted location ids from a shared sequence.
    pub fn with_id_sequence(mut self, ids: Arc<IdSequence>) -> Self {
        self.ids = ids;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn tracks(&self) -> MutexGuard<'_, BTreeMap<VehicleId, ReplayTrack>> {
        self.tracks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds a recording for the vehicle named by its first record.
    ///
    /// A second recording for the same vehicle replaces the first.
    pub fn insert_sequence(&self, source: &str, locations: Vec<Location>) -> Result<VehicleId, SimError> {
        let first = locations
            .first()
            .ok_or_else(|| SimError::EmptySource(source.to_string()))?;
        let vehicle_id = first
            .vehicle_id
            .ok_or_else(|| SimError::MissingVehicle(source.to_string()))?;

        let count = locations.len();
        let track = ReplayTrack {
            source: source.to_string(),
            locations,
            cursor: 0,
            generation: self.generations.fetch_add(1, Ordering::Relaxed),
        };
        if let Some(old) = self.tracks().insert(vehicle_id, track) {
            warn!(
                vehicle_id = %vehicle_id,
                replaced = %old.source,
                source,
                "duplicate recording for vehicle"
            );
        }

        debug!(vehicle_id = %vehicle_id, records = count, source, "loaded recording");
        Ok(vehicle_id)
    }

    /// Reads one recording: a JSON array of locations.
    pub fn load_source(&self, path: &Path) -> Result<VehicleId, SimError> {
        let raw = std::fs::read_to_string(path).map_err(|e| SimError::io(path, e))?;
        let locations: Vec<Location> = serde_json::from_str(&raw).map_err(|e| SimError::parse(path, e))?;
        self.insert_sequence(&path.display().to_string(), locations)
    }

    /// Loads every `*.json` recording in `dir`, in file name order.
    ///
    /// Sources that cannot be used are logged and skipped. Only an unreadable
    /// directory is an error. Returns the number of recordings loaded.
    pub fn load_dir(&self, dir: &Path) -> Result<usize, SimError> {
        let entries = std::fs::read_dir(dir).map_err(|e| SimError::io(dir, e))?;

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();

        let mut loaded = 0;
        for path in paths {
            match self.load_source(&path) {
                Ok(_) => loaded += 1,
                Err(e) => warn!(path = %path.display(), error = %e, "skipping replay source"),
            }
        }
        Ok(loaded)
    }

    /// Vehicles with a recording, in replay order.
    pub fn vehicles(&self) -> Vec<VehicleId> {
        self.tracks().keys().copied().collect()
    }

    /// Index of the record `vehicle_id` will emit next.
    pub fn cursor(&self, vehicle_id: VehicleId) -> Option<usize> {
        self.tracks().get(&vehicle_id).map(|track| track.cursor)
    }

    /// Emits the next record of every vehicle.
    ///
    /// A record that cannot be persisted is not announced and its cursor
    /// stays put, so it is retried on the next step. Other vehicles are
    /// unaffected. A recording replaced while its record was being persisted
    /// starts from its first record.
    pub fn step(&self) -> StepSummary {
        let now = self.context.unix_now();
        let pending: Vec<(VehicleId, u64, Location)> = self
            .tracks()
            .iter()
            .map(|(vehicle_id, track)| (*vehicle_id, track.generation, track.current().clone()))
            .collect();

        let mut summary = StepSummary::default();
        for (vehicle_id, generation, mut location) in pending {
            location.id = self.ids.next_id();
            location.observed_at = now;
            location.created_at = now;

            if let Err(e) = self.model.create_location(&location) {
                error!(vehicle_id = %vehicle_id, error = %e, "could not create replayed location");
                summary.failed += 1;
                continue;
            }
            debug!(vehicle_id = %vehicle_id, location_id = %location.id, "replayed location");
            self.subscribers.notify(&*self.context, &location);

            if let Some(track) = self.tracks().get_mut(&vehicle_id) {
                if track.generation == generation {
                    track.advance();
                }
            }
            summary.emitted += 1;
        }

        summary
    }

    /// Loads the data directory, steps once, then steps every interval.
    ///
    /// Returns immediately when replay is disabled.
    pub async fn run(&self) {
        if !self.enabled {
            info!("location replay disabled");
            return;
        }

        match self.load_dir(&self.data_dir) {
            Ok(loaded) => info!(
                dir = %self.data_dir.display(),
                recordings = loaded,
                interval = ?self.interval,
                "location replay started"
            ),
            Err(e) => error!(error = %e, "cannot load replay data"),
        }

        loop {
            let summary = self.step();
            debug!(emitted = summary.emitted, failed = summary.failed, "replay step");
            self.context.sleep(self.interval).await;
        }
    }
}

impl<Ctx, M> LocationFeed for ReplayEngine<Ctx, M>
where
    Ctx: ShuttleContext,
    M: ModelService,
{
    fn subscribe(&self, subscriber: Subscriber<Location>) {
        self.subscribers.subscribe(subscriber);
    }
}
