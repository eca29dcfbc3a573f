//! Shared contract for the path-finding racers
//!
//! Every algorithm takes a read-only track view, a start, a goal and an
//! [`AlgorithmConfig`], and hands back a [`SearchResult`]. Running out of
//! budget or finding no route are ordinary outcomes, never errors.

use log::debug;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use super::algorithms::{AStar, Bidirectional, BreadthFirst, DepthFirst, Dijkstra, GreedyBestFirst};
use super::track::{Track, TrackView};
use super::types::Cell;

/// The six search strategies that can enter a race
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, clap::ValueEnum)]
pub enum Algorithm {
    BreadthFirst,
    DepthFirst,
    Dijkstra,
    AStar,
    GreedyBestFirst,
    Bidirectional,
}

impl Algorithm {
    pub const ALL: [Algorithm; 6] = [
        Algorithm::BreadthFirst,
        Algorithm::DepthFirst,
        Algorithm::Dijkstra,
        Algorithm::AStar,
        Algorithm::GreedyBestFirst,
        Algorithm::Bidirectional,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Algorithm::BreadthFirst => "Breadth-First",
            Algorithm::DepthFirst => "Depth-First",
            Algorithm::Dijkstra => "Dijkstra",
            Algorithm::AStar => "A*",
            Algorithm::GreedyBestFirst => "Greedy Best-First",
            Algorithm::Bidirectional => "Bidirectional",
        }
    }

    /// Whether the algorithm always returns a shortest path on a
    /// uniform-cost grid (A* only with an admissible weight)
    pub fn is_optimal(self) -> bool {
        !matches!(self, Algorithm::DepthFirst | Algorithm::GreedyBestFirst)
    }
}

/// Search budget and tuning
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AlgorithmConfig {
    /// Maximum number of cell expansions
    pub max_steps: usize,
    /// Wall-clock limit for one search
    pub time_limit: Duration,
    /// Multiplier on the Manhattan heuristic. 1.0 keeps A* admissible.
    pub heuristic_weight: f32,
}

impl Default for AlgorithmConfig {
    fn default() -> Self {
        Self {
            max_steps: 100_000,
            time_limit: Duration::from_secs(2),
            heuristic_weight: 1.0,
        }
    }
}

/// Why a search ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SearchOutcome {
    Found,
    Unreachable,
    StepLimitExceeded,
    TimeLimitExceeded,
}

/// Output of one algorithm run against one track
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub algorithm: Algorithm,
    /// Cells from start to goal inclusive; empty unless `success`
    pub path: Vec<Cell>,
    /// Cells in the order they were expanded
    pub explored: Vec<Cell>,
    pub success: bool,
    pub steps: usize,
    pub execution_time: Duration,
    pub outcome: SearchOutcome,
}

impl SearchResult {
    /// Number of moves along the path
    pub fn path_length(&self) -> usize {
        self.path.len().saturating_sub(1)
    }

    /// Ratio of path cells to expanded cells, 0 when nothing was found
    pub fn efficiency(&self) -> f32 {
        if !self.success || self.explored.is_empty() {
            0.0
        } else {
            self.path.len() as f32 / self.explored.len() as f32
        }
    }

    /// Timing is the only field that varies between identical runs
    pub fn same_route(&self, other: &SearchResult) -> bool {
        self.algorithm == other.algorithm
            && self.path == other.path
            && self.explored == other.explored
            && self.success == other.success
            && self.steps == other.steps
            && self.outcome == other.outcome
    }
}

/// A path-finding strategy
pub trait SearchStrategy {
    fn search(
        &self,
        track: &dyn TrackView,
        start: Cell,
        goal: Cell,
        config: &AlgorithmConfig,
    ) -> SearchResult;
}

impl SearchStrategy for Algorithm {
    fn search(
        &self,
        track: &dyn TrackView,
        start: Cell,
        goal: Cell,
        config: &AlgorithmConfig,
    ) -> SearchResult {
        match self {
            Algorithm::BreadthFirst => BreadthFirst.search(track, start, goal, config),
            Algorithm::DepthFirst => DepthFirst.search(track, start, goal, config),
            Algorithm::Dijkstra => Dijkstra.search(track, start, goal, config),
            Algorithm::AStar => AStar.search(track, start, goal, config),
            Algorithm::GreedyBestFirst => GreedyBestFirst.search(track, start, goal, config),
            Algorithm::Bidirectional => Bidirectional.search(track, start, goal, config),
        }
    }
}

/// Run one algorithm and check what it produced.
///
/// # Panics
///
/// Panics if a successful result is not a contiguous chain of open cells
/// from `start` to `goal`. That can only come from a broken strategy.
pub fn run_search(
    algorithm: Algorithm,
    track: &dyn TrackView,
    start: Cell,
    goal: Cell,
    config: &AlgorithmConfig,
) -> SearchResult {
    let result = algorithm.search(track, start, goal, config);
    if result.success {
        if let Err(problem) = validate_path(track, &result.path, start, goal) {
            panic!("{} produced an invalid path: {}", algorithm.name(), problem);
        }
    }

    debug!(
        "{} search: {:?} after {} steps, path length {}, {} explored, {:?}",
        algorithm.name(),
        result.outcome,
        result.steps,
        result.path_length(),
        result.explored.len(),
        result.execution_time
    );

    result
}

/// Run several searches against the same track in parallel.
/// Results come back in request order.
pub fn run_searches_parallel(
    track: &Track,
    start: Cell,
    goal: Cell,
    requests: &[(Algorithm, AlgorithmConfig)],
) -> Vec<SearchResult> {
    requests
        .par_iter()
        .map(|(algorithm, config)| run_search(*algorithm, track, start, goal, config))
        .collect()
}

/// Check that `path` walks from `start` to `goal` over adjacent open cells
pub fn validate_path(
    track: &dyn TrackView,
    path: &[Cell],
    start: Cell,
    goal: Cell,
) -> Result<(), String> {
    let (Some(first), Some(last)) = (path.first(), path.last()) else {
        return Err("path is empty".to_string());
    };
    if *first != start {
        return Err(format!("path starts at {:?}, not {:?}", first, start));
    }
    if *last != goal {
        return Err(format!("path ends at {:?}, not {:?}", last, goal));
    }
    if let Some(wall) = path.iter().find(|cell| !track.is_open(**cell)) {
        return Err(format!("path crosses wall cell {:?}", wall));
    }
    if let Some(pair) = path.windows(2).find(|pair| pair[0].manhattan(&pair[1]) != 1) {
        return Err(format!("path jumps from {:?} to {:?}", pair[0], pair[1]));
    }
    Ok(())
}

/// Step and time accounting shared by every strategy
pub(crate) struct SearchBudget {
    max_steps: usize,
    time_limit: Duration,
    started: Instant,
    pub steps: usize,
}

impl SearchBudget {
    pub fn new(config: &AlgorithmConfig) -> Self {
        Self {
            max_steps: config.max_steps,
            time_limit: config.time_limit,
            started: Instant::now(),
            steps: 0,
        }
    }

    /// Count one expansion, or report which limit stops the search
    pub fn try_step(&mut self) -> Result<(), SearchOutcome> {
        if self.steps >= self.max_steps {
            return Err(SearchOutcome::StepLimitExceeded);
        }
        if self.started.elapsed() >= self.time_limit {
            return Err(SearchOutcome::TimeLimitExceeded);
        }
        self.steps += 1;
        Ok(())
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Finish with a path
    pub fn found(self, algorithm: Algorithm, path: Vec<Cell>, explored: Vec<Cell>) -> SearchResult {
        SearchResult {
            algorithm,
            path,
            explored,
            success: true,
            steps: self.steps,
            execution_time: self.elapsed(),
            outcome: SearchOutcome::Found,
        }
    }

    /// Finish without a path, keeping whatever was explored
    pub fn failed(
        self,
        algorithm: Algorithm,
        outcome: SearchOutcome,
        explored: Vec<Cell>,
    ) -> SearchResult {
        SearchResult {
            algorithm,
            path: Vec::new(),
            explored,
            success: false,
            steps: self.steps,
            execution_time: self.elapsed(),
            outcome,
        }
    }
}

/// Walk parent links back from `goal` and return the path start-first
pub(crate) fn reconstruct_path(parents: &HashMap<Cell, Cell>, start: Cell, goal: Cell) -> Vec<Cell> {
    let mut path = vec![goal];
    let mut current = goal;
    while current != start {
        match parents.get(&current) {
            Some(parent) => {
                current = *parent;
                path.push(current);
            }
            None => return Vec::new(),
        }
    }
    path.reverse();
    path
}

/// Manhattan distance scaled by the configured weight
pub(crate) fn heuristic(cell: Cell, goal: Cell, weight: f32) -> f32 {
    cell.manhattan(&goal) as f32 * weight
}
