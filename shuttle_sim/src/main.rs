//! Shuttle Sim CLI
//!
//! Replay recorded shuttle locations through the smooth tracker, or retag
//! recordings for a different vehicle.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use shuttle_core::{parse_interval, Prediction};
use shuttle_env::{RouteId, TokioContext, VehicleId};
use shuttle_sim::{retag_file, MemoryModelService, Pipeline, Retag, ShuttleConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "shuttle-sim")]
#[command(about = "Replay recorded shuttle locations through the smooth tracker", long_about = None)]
struct Args {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay recordings and predict positions between them
    Replay {
        /// Model fixture with vehicles, routes and stops
        #[arg(short, long)]
        model: PathBuf,

        /// Configuration file (defaults apply when omitted)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Directory of recordings, overriding the config file
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Time between replay steps, e.g. "10s"
        #[arg(long)]
        replay_interval: Option<String>,

        /// Time between prediction ticks, e.g. "1s"
        #[arg(long)]
        prediction_interval: Option<String>,

        /// Stop after this long, e.g. "2m" (runs forever when omitted)
        #[arg(long)]
        duration: Option<String>,

        /// Print predictions as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// Stamp vehicle, route and tracker ids onto recordings
    Retag {
        /// Recording files to rewrite in place
        #[arg(required = true)]
        files: Vec<PathBuf>,

        #[arg(long)]
        vehicle: VehicleId,

        #[arg(long)]
        route: RouteId,

        #[arg(long)]
        tracker: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber).context("failed to set tracing subscriber")?;

    match args.command {
        Command::Replay {
            model,
            config,
            data,
            replay_interval,
            prediction_interval,
            duration,
            json,
        } => {
            let mut config = match config {
                Some(path) => ShuttleConfig::from_file(&path)?,
                None => ShuttleConfig::default(),
            };
            // This command exists to replay and predict
            config.replay.replay_updates = true;
            config.tracking.predict_updates = true;
            if let Some(dir) = data {
                config.replay.data_dir = dir;
            }
            if let Some(interval) = replay_interval {
                config.replay.replay_interval = interval;
            }
            if let Some(interval) = prediction_interval {
                config.tracking.prediction_interval = interval;
            }
            let duration = duration.as_deref().map(parse_interval).transpose()?;
            config.validate()?;

            run_replay(config, model, duration, json).await
        }
        Command::Retag {
            files,
            vehicle,
            route,
            tracker,
        } => {
            let tag = Retag {
                vehicle_id: vehicle,
                route_id: route,
                tracker_id: tracker,
            };
            for file in &files {
                let count = retag_file(file, &tag)?;
                info!("Retagged {} records in {}", count, file.display());
            }
            Ok(())
        }
    }
}

async fn run_replay(
    config: ShuttleConfig,
    model_path: PathBuf,
    duration: Option<std::time::Duration>,
    json: bool,
) -> Result<()> {
    let model = Arc::new(
        MemoryModelService::from_file(&model_path)
            .with_context(|| format!("loading model fixture {}", model_path.display()))?,
    );
    let pipeline = Pipeline::new(&config, TokioContext::shared(), Arc::clone(&model))?;

    pipeline.tracker().subscribe(Arc::new(move |prediction: Prediction| {
        if json {
            match serde_json::to_string(&prediction) {
                Ok(line) => println!("{}", line),
                Err(e) => warn!(error = %e, "cannot encode prediction"),
            }
        } else {
            info!(
                "vehicle {} → point {} ({:.6}, {:.6}) heading {:.1}°",
                prediction.vehicle_id,
                prediction.index,
                prediction.point.latitude,
                prediction.point.longitude,
                prediction.angle
            );
        }
    }));

    info!("Shuttle Sim v0.1.0");
    info!(
        "Replaying {} every {} / predicting every {}",
        pipeline.replay().data_dir().display(),
        config.replay.replay_interval,
        config.tracking.prediction_interval
    );

    match duration {
        Some(limit) => {
            // Both loops run forever; the limit is the only way out
            let _ = tokio::time::timeout(limit, pipeline.run()).await;
        }
        None => pipeline.run().await,
    }

    info!(
        "Persisted {} locations for {} vehicles",
        model.created_count(),
        pipeline.replay().vehicles().len()
    );
    Ok(())
}
