//! Shuttle Sim - Location Replay Harness
//!
//! Drives the smooth tracker without any GPS hardware. Recorded location
//! sequences are played back on an interval as if they were live, through
//! the same [`LocationFeed`](shuttle_core::LocationFeed) interface a real
//! feed implements.
//!
//! # Architecture
//!
//! ```text
//! spoof_data/*.json ──► ReplayEngine ──location──► TrackingManager ──prediction──► subscribers
//!                            │                           │
//!                            └──────► ModelService ◄─────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use shuttle_sim::{MemoryModelService, Pipeline, ShuttleConfig, SimContext};
//!
//! let model = Arc::new(MemoryModelService::from_file("model.json")?);
//! let pipeline = Pipeline::new(&ShuttleConfig::default(), SimContext::shared(), model)?;
//! pipeline.replay().step();
//! ```

mod context;
mod error;
pub mod config;
pub mod model;
pub mod pipeline;
pub mod replay;
pub mod retag;

pub use config::ShuttleConfig;
pub use context::SimContext;
pub use error::SimError;
pub use model::{MemoryModelService, ModelFixture};
pub use pipeline::Pipeline;
pub use replay::{ReplayConfig, ReplayEngine, StepSummary};
pub use retag::{retag, retag_file, Retag};
