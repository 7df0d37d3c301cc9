//! Core environment context trait for the tracking pipeline.

use async_trait::async_trait;
use std::future::Future;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// The central interface for environment interaction.
///
/// This trait abstracts the "real world" so that the tracking manager and the
/// replay engine can run on the production clock or on a virtual one.
///
/// # Implementations
///
/// - **Production**: `TokioContext` - wraps `tokio::time` and the system clock
/// - **Replay/Test**: `SimContext` - virtual clock advanced by hand
#[async_trait]
pub trait ShuttleContext: Send + Sync + 'static {
    /// Returns the monotonic time since context creation.
    fn now(&self) -> Duration;

    /// Returns the wall-clock time used to stamp locations.
    ///
    /// Prediction compares this against a location's observation time, so
    /// under a virtual clock predictions are fully deterministic.
    fn system_time(&self) -> SystemTime;

    /// Suspends execution for the given duration.
    ///
    /// In production: wraps `tokio::time::sleep`
    /// In simulation: advances the virtual clock
    async fn sleep(&self, duration: Duration);

    /// Spawns a detached background task.
    ///
    /// Used for fire-and-forget subscriber notification. A panic inside the
    /// task stays inside the task.
    fn spawn<F>(&self, name: &str, future: F)
    where
        F: Future<Output = ()> + Send + 'static;

    /// Wall-clock time as Unix seconds.
    fn unix_now(&self) -> f64 {
        unix_seconds(self.system_time())
    }
}

/// Converts a wall-clock time to fractional Unix seconds.
///
/// Times before the epoch map to negative values.
pub fn unix_seconds(time: SystemTime) -> f64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(since) => since.as_secs_f64(),
        Err(before) => -before.duration().as_secs_f64(),
    }
}
