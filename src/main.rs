//! Headless flock demo.
//!
//! Log verbosity follows `RUST_LOG` (default `info`).

use clap::Parser;
use std::process::ExitCode;
use std::time::{Duration, Instant};
use steerflock::prelude::*;
use steerflock::spawn::{DEFAULT_COUNT, DEFAULT_SEED};
use tracing_subscriber::EnvFilter;

const FRAME: Duration = Duration::from_micros(16_667);

#[derive(Parser, Debug)]
#[command(
    name = "steerflock",
    version,
    about = "Run a boids flock headless at 60 Hz and log each steering cycle"
)]
struct Cli {
    /// Number of boids to scatter.
    #[arg(default_value_t = DEFAULT_COUNT)]
    count: usize,

    /// Number of frames to run.
    #[arg(default_value_t = 600)]
    frames: u64,

    /// Seed for the initial scatter and the steering randomness.
    #[arg(long, default_value_t = DEFAULT_SEED)]
    seed: u64,

    /// Worker threads; 0 uses one per core.
    #[arg(long, default_value_t = 0)]
    threads: usize,
}

fn run(cli: &Cli) -> Result<(), FlockError> {
    let boids = scatter(cli.count, &SpawnConfig::default(), cli.seed);
    let mut flock = Simulation::new()
        .with_config(FlockConfig::default().with_seed(cli.seed))
        .with_boids(boids)
        .with_worker_threads(cli.threads)
        .build()?;
    tracing::info!(boids = flock.len(), frames = cli.frames, "flock started");

    let mut time = Time::new();
    time.set_fixed_delta(Some(FRAME.as_secs_f32()));

    for _ in 0..cli.frames {
        let started = Instant::now();
        time.update();

        let report = flock.update(&time)?;
        if report.action == FrameAction::Apply {
            let spread = flock
                .store()
                .read()
                .positions()
                .iter()
                .map(|p| p.length())
                .fold(0.0f32, f32::max);
            let stats = flock.octant_stats();
            tracing::info!(
                cycle = report.cycle,
                applied = report.applied,
                frame = time.frame(),
                spread,
                occupied_cells = stats.occupied_cells,
                largest_cell = stats.largest_cell,
                "cycle applied"
            );
        }

        if let Some(rest) = FRAME.checked_sub(started.elapsed()) {
            std::thread::sleep(rest);
        }
    }

    tracing::info!(cycles = flock.cycles_completed(), "flock finished");
    flock.finish();
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(%err, "flock stopped");
            ExitCode::FAILURE
        }
    }
}
