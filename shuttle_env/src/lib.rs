//! Shuttle Environment Abstraction Layer
//!
//! This crate provides the abstraction that lets the tracking pipeline run
//! against both the **real clock** (tokio) and a **virtual clock** used by the
//! replay harness.
//!
//! # Core Concept
//!
//! Every piece of the pipeline that would otherwise touch the outside world
//! goes through a [`ShuttleContext`]:
//! - Time (`now()`, `system_time()`, `sleep()`)
//! - Task spawning (`spawn()`), used for subscriber fan-out
//!
//! Identifiers shared by all crates (`VehicleId`, `RouteId`, ...) and the
//! producer-side [`IdSequence`] live here as well.
//!
//! # Example
//!
//! ```ignore
//! use shuttle_env::ShuttleContext;
//!
//! async fn tick_loop<Ctx: ShuttleContext>(ctx: &Ctx, interval: Duration) {
//!     loop {
//!         ctx.sleep(interval).await;
//!         tick();
//!     }
//! }
//! ```

mod context;
mod error;
mod tokio_impl;
mod types;

pub use context::{unix_seconds, ShuttleContext};
pub use error::EnvError;
pub use tokio_impl::TokioContext;
pub use types::{IdSequence, LocationId, RouteId, StopId, VehicleId};
