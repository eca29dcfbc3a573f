use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info};
use std::sync::Arc;
use std::time::Duration;

use maze_racer::simulation::{
    generate, Algorithm, AlgorithmConfig, RaceConfig, RaceEntry, RaceMode, RaceSession, RaceState,
    RacingTeam,
};

#[derive(Parser)]
#[command(name = "maze_racer")]
#[command(about = "Race path-finding algorithms through a generated maze")]
struct Cli {
    /// Track width in cells
    #[arg(long, default_value_t = 21)]
    width: usize,

    /// Track height in cells
    #[arg(long, default_value_t = 21)]
    height: usize,

    /// Number of flags to place
    #[arg(long, default_value_t = 7)]
    flags: usize,

    /// Seed for track generation
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Race mode
    #[arg(long, value_enum, default_value_t = RaceMode::Sprint)]
    mode: RaceMode,

    /// Algorithms to enter (repeatable); all six when omitted
    #[arg(long = "algorithm", value_enum)]
    algorithms: Vec<Algorithm>,

    /// Maximum cell expansions per search
    #[arg(long, default_value_t = 100_000)]
    max_steps: usize,

    /// Wall-clock limit per search in milliseconds
    #[arg(long, default_value_t = 2_000)]
    time_limit_ms: u64,

    /// Weight on the A* heuristic
    #[arg(long, default_value_t = 1.0)]
    heuristic_weight: f32,

    /// Fixed simulation step in seconds
    #[arg(long, default_value_t = 1.0 / 60.0)]
    tick: f32,

    /// Race clock limit in seconds
    #[arg(long, default_value_t = 300.0)]
    race_time_limit: f32,

    /// Seconds of simulated time between progress reports
    #[arg(long, default_value_t = 1.0)]
    report_every: f32,

    /// Draw the track map with each report
    #[arg(long)]
    draw: bool,

    /// Print the final snapshot as JSON instead of text summaries
    #[arg(long)]
    json: bool,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    if let Err(err) = run_headless(&cli) {
        error!("{:#}", err);
        std::process::exit(1);
    }
}

/// Generate a track, race the selected algorithms on it and report
fn run_headless(cli: &Cli) -> Result<()> {
    let track = generate(cli.width, cli.height, cli.flags, cli.seed)
        .context("Could not generate the track")?;

    let algorithm_config = AlgorithmConfig {
        max_steps: cli.max_steps,
        time_limit: Duration::from_millis(cli.time_limit_ms),
        heuristic_weight: cli.heuristic_weight,
    };
    let algorithms = if cli.algorithms.is_empty() {
        Algorithm::ALL.to_vec()
    } else {
        cli.algorithms.clone()
    };
    let entries: Vec<RaceEntry> = algorithms
        .iter()
        .map(|algorithm| {
            RaceEntry::new(RacingTeam::for_algorithm(*algorithm), *algorithm)
                .with_config(algorithm_config)
        })
        .collect();

    let race_config = RaceConfig {
        tick_seconds: cli.tick,
        time_limit: cli.race_time_limit,
        ..RaceConfig::default()
    };

    let mut session = RaceSession::new(Arc::new(track), entries, cli.mode, race_config)?;
    session.start()?;

    for racer in session.racers() {
        info!(
            "{} ({}): {:?}, route {} cells, explored {}, searched in {:?}",
            racer.team.name,
            racer.algorithm.name(),
            racer.search.outcome,
            racer.route.length(),
            racer.search.explored.len(),
            racer.search.execution_time
        );
    }

    if !cli.json {
        println!("Initial state:");
        session.print_summary();
        if cli.draw {
            session.draw_map();
        }
        println!();
    }

    let ticks_per_report = ((cli.report_every / cli.tick).ceil() as u64).max(1);
    while session.state() != RaceState::Finished {
        session.tick()?;

        if session.ticks() % ticks_per_report == 0 || session.state() == RaceState::Finished {
            for line in session.drain_commentary() {
                info!("[{:.2}s] {:?}: {}", line.time, line.kind, line.message);
            }
            if !cli.json {
                println!("--- After tick {} ({:.2}s race time) ---", session.ticks(), session.clock());
                session.print_summary();
                if cli.draw {
                    session.draw_map();
                }
                println!();
            }
        }
    }

    let finishers = session.finish_order();
    info!("=== RACE COMPLETE ===");
    info!("Race time: {:.2}s", session.clock());
    info!("Finishers: {}/{}", finishers.len(), session.racers().len());
    for (index, racer) in finishers.iter().enumerate() {
        info!(
            "P{} {} ({}) {:.3}s over {} cells",
            index + 1,
            racer.team.name,
            racer.algorithm.name(),
            racer.finish_time.unwrap_or_default(),
            racer.route.length()
        );
    }
    match session.winner() {
        Some(winner) => info!("Winner: {} ({})", winner.team.name, winner.algorithm.name()),
        None => info!("Winner: none"),
    }

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&session.snapshot())?);
    }

    Ok(())
}
