//! Maze race simulation
//!
//! Track generation, the six path-finding racers and the tick-based race
//! engine. Nothing in here draws anything; renderers read snapshots.

mod algorithms;
mod odds;
mod race;
mod racer;
mod search;
mod team;
mod telemetry;
mod track;
mod track_generator;
mod types;

pub use algorithms::{AStar, Bidirectional, BreadthFirst, DepthFirst, Dijkstra, GreedyBestFirst};
pub use odds::{BettingOdds, OddsCalculator, OddsMovement, MAX_ODDS, MIN_ODDS, ODDS_HISTORY};
pub use race::{
    RaceConfig, RaceEntry, RaceMode, RaceSession, RaceSnapshot, RaceState, RacerSnapshot,
    MAX_TICKS_PER_ADVANCE,
};
pub use racer::{
    DnfReason, Racer, RacerStatus, RacerUpdateResult, Route, TelemetrySample, TrailPoint,
    FUEL_BURN_RATE, TIRE_WEAR_RATE,
};
pub use search::{
    run_search, run_searches_parallel, validate_path, Algorithm, AlgorithmConfig, SearchOutcome,
    SearchResult, SearchStrategy,
};
pub use team::{RacingTeam, TeamStats};
pub use telemetry::{
    rank, CommentaryType, RaceCommentary, Standing, Telemetry, COMMENTARY_INTERVAL,
    COMMENTARY_LOG, OVERTAKE_PROXIMITY,
};
pub use track::{CellKind, Track, TrackView};
pub use track_generator::{generate, BRAID_RATIO, MIN_TRACK_SIZE};
pub use types::{
    Cell, Direction, Position, RacerId, ARRIVAL_EPSILON, CRITICAL_WEAR, SPLIT_FRACTIONS,
    TELEMETRY_HISTORY, TRAIL_FADE, TRAIL_LENGTH,
};
