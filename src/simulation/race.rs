//! Race sessions
//!
//! A session owns everything about one race: the shared track, the racer
//! arena, telemetry and odds. Dropping or resetting the session throws all
//! of it away at once, which is how an in-flight race is cancelled.

use anyhow::{bail, ensure, Result};
use log::{debug, error, info, warn};
use ordered_float::OrderedFloat;
use rayon::prelude::*;
use serde::Serialize;
use std::sync::Arc;

use super::odds::{BettingOdds, OddsCalculator};
use super::racer::{DnfReason, Racer, RacerStatus, RacerUpdateResult, Route, TrailPoint};
use super::search::{run_search, Algorithm, AlgorithmConfig, SearchOutcome, SearchResult};
use super::team::RacingTeam;
use super::telemetry::{CommentaryType, RaceCommentary, Standing, Telemetry};
use super::track::{Track, TrackView};
use super::types::{Cell, Position, RacerId};

/// Upper bound on ticks run by a single [`RaceSession::advance`] call
pub const MAX_TICKS_PER_ADVANCE: usize = 240;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RaceState {
    Preparing,
    Starting,
    Racing,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RaceMode {
    /// Start to finish; flags are decoration
    Sprint,
    /// Every flag must be collected before the finish counts
    Flags,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RaceConfig {
    /// Fixed simulation step in seconds
    pub tick_seconds: f32,
    /// Race clock at which everyone still out is retired
    pub time_limit: f32,
    /// Seconds spent in `Starting` before racing begins
    pub countdown: f32,
}

impl Default for RaceConfig {
    fn default() -> Self {
        Self {
            tick_seconds: 1.0 / 60.0,
            time_limit: 300.0,
            countdown: 0.0,
        }
    }
}

/// A team entered with the algorithm it races
#[derive(Debug, Clone, PartialEq)]
pub struct RaceEntry {
    pub team: RacingTeam,
    pub algorithm: Algorithm,
    pub config: AlgorithmConfig,
}

impl RaceEntry {
    pub fn new(team: RacingTeam, algorithm: Algorithm) -> Self {
        Self {
            team,
            algorithm,
            config: AlgorithmConfig::default(),
        }
    }

    pub fn with_config(mut self, config: AlgorithmConfig) -> Self {
        self.config = config;
        self
    }

    /// The built-in team for every algorithm
    pub fn full_grid() -> Vec<RaceEntry> {
        RacingTeam::roster()
            .into_iter()
            .map(|(team, algorithm)| RaceEntry::new(team, algorithm))
            .collect()
    }
}

/// Read-only view of one racer for renderers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RacerSnapshot {
    pub id: RacerId,
    pub team: String,
    pub color: String,
    pub algorithm: Algorithm,
    pub position: Position,
    pub velocity: Position,
    pub heading: f32,
    pub speed: f32,
    pub current_target: usize,
    pub distance: f32,
    pub progress: f32,
    pub route_length: usize,
    pub explored: usize,
    pub tire_wear: f32,
    pub fuel_burn: f32,
    pub status: RacerStatus,
    pub finish_time: Option<f32>,
    pub collected_flags: Vec<Cell>,
    pub target_flag: Option<Cell>,
    pub trail: Vec<TrailPoint>,
}

impl From<&Racer> for RacerSnapshot {
    fn from(racer: &Racer) -> Self {
        Self {
            id: racer.id,
            team: racer.team.name.clone(),
            color: racer.team.color.clone(),
            algorithm: racer.algorithm,
            position: racer.position,
            velocity: racer.velocity,
            heading: racer.heading,
            speed: racer.speed,
            current_target: racer.current_target,
            distance: racer.distance,
            progress: racer.progress(),
            route_length: racer.route.length(),
            explored: racer.search.explored.len(),
            tire_wear: racer.tire_wear,
            fuel_burn: racer.fuel_burn,
            status: racer.status,
            finish_time: racer.finish_time,
            collected_flags: racer.collected_flags.clone(),
            target_flag: racer.target_flag,
            trail: racer.trail.iter().copied().collect(),
        }
    }
}

/// Everything a renderer needs for one frame
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RaceSnapshot {
    pub state: RaceState,
    pub mode: RaceMode,
    pub clock: f32,
    pub racers: Vec<RacerSnapshot>,
    pub standings: Vec<Standing>,
    pub odds: Vec<BettingOdds>,
    pub latest_commentary: Option<RaceCommentary>,
}

pub struct RaceSession {
    track: Arc<Track>,
    entries: Vec<RaceEntry>,
    mode: RaceMode,
    config: RaceConfig,
    state: RaceState,
    clock: f32,
    countdown_left: f32,
    accumulator: f32,
    ticks: u64,
    racers: Vec<Racer>,
    telemetry: Telemetry,
    odds: OddsCalculator,
    abort_reason: Option<String>,
}

impl RaceSession {
    /// Set up a race in the `Preparing` state. Nothing is searched yet.
    pub fn new(
        track: Arc<Track>,
        entries: Vec<RaceEntry>,
        mode: RaceMode,
        config: RaceConfig,
    ) -> Result<Self> {
        if entries.is_empty() {
            bail!("A race needs at least one entry");
        }
        if !(config.tick_seconds > 0.0) {
            bail!("Tick length must be positive, got {}", config.tick_seconds);
        }
        if !(config.time_limit > 0.0) {
            bail!("Race time limit must be positive, got {}", config.time_limit);
        }
        if !(config.countdown >= 0.0) {
            bail!("Countdown cannot be negative, got {}", config.countdown);
        }

        Ok(Self::preparing(track, entries, mode, config))
    }

    fn preparing(
        track: Arc<Track>,
        entries: Vec<RaceEntry>,
        mode: RaceMode,
        config: RaceConfig,
    ) -> Self {
        Self {
            track,
            entries,
            mode,
            config,
            state: RaceState::Preparing,
            clock: 0.0,
            countdown_left: config.countdown,
            accumulator: 0.0,
            ticks: 0,
            racers: Vec::new(),
            telemetry: Telemetry::new(),
            odds: OddsCalculator::new(),
            abort_reason: None,
        }
    }

    pub fn state(&self) -> RaceState {
        self.state
    }

    pub fn mode(&self) -> RaceMode {
        self.mode
    }

    pub fn config(&self) -> &RaceConfig {
        &self.config
    }

    pub fn track(&self) -> &Track {
        &self.track
    }

    pub fn entries(&self) -> &[RaceEntry] {
        &self.entries
    }

    /// Race time in seconds since lights out
    pub fn clock(&self) -> f32 {
        self.clock
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn racers(&self) -> &[Racer] {
        &self.racers
    }

    pub fn racer(&self, id: RacerId) -> Option<&Racer> {
        self.racers.get(id.0)
    }

    pub fn standings(&self) -> &[Standing] {
        self.telemetry.standings()
    }

    pub fn odds(&self) -> &[BettingOdds] {
        self.odds.odds()
    }

    pub fn telemetry(&self) -> &Telemetry {
        &self.telemetry
    }

    /// Pending commentary, handed over and cleared
    pub fn drain_commentary(&mut self) -> Vec<RaceCommentary> {
        self.telemetry.drain()
    }

    /// Why the session stopped early, if a tick failed
    pub fn abort_reason(&self) -> Option<&str> {
        self.abort_reason.as_deref()
    }

    /// Finishers in finish order
    pub fn finish_order(&self) -> Vec<&Racer> {
        let mut finishers: Vec<&Racer> =
            self.racers.iter().filter(|racer| racer.is_finished()).collect();
        finishers.sort_by_key(|racer| (OrderedFloat(racer.finish_time.unwrap_or(f32::MAX)), racer.id));
        finishers
    }

    pub fn winner(&self) -> Option<&Racer> {
        self.finish_order().into_iter().next()
    }

    /// Compute every route, place the racers on the grid and go to
    /// `Starting` (or straight to `Racing` without a countdown).
    pub fn start(&mut self) -> Result<()> {
        if self.state != RaceState::Preparing {
            bail!("Race can only start from Preparing, currently {:?}", self.state);
        }
        self.state = RaceState::Starting;
        info!(
            "Race starting: {} entries, {:?} mode, {} flags on track",
            self.entries.len(),
            self.mode,
            self.track.flags().len()
        );

        let track: &Track = &self.track;
        let mode = self.mode;
        let plans: Vec<(SearchResult, Result<Route, SearchOutcome>)> = self
            .entries
            .par_iter()
            .map(|entry| plan_route(track, entry, mode))
            .collect();

        self.racers = self
            .entries
            .iter()
            .zip(plans)
            .enumerate()
            .map(|(index, (entry, (search, route)))| {
                let (route, failure) = match route {
                    Ok(route) => (route, None),
                    Err(outcome) => (Route::default(), Some(outcome)),
                };
                let mut racer = Racer::new(
                    RacerId(index),
                    entry.team.clone(),
                    entry.algorithm,
                    search,
                    route,
                    track.start(),
                );
                if let Some(outcome) = failure {
                    racer.retire(DnfReason::NoRoute(outcome));
                }
                if racer.is_dnf() {
                    warn!(
                        "{} ({}) is out before the start: {:?}",
                        racer.team.name,
                        racer.algorithm.name(),
                        racer.status
                    );
                }
                racer
            })
            .collect();

        self.telemetry.announce_start(&self.racers, self.clock);
        self.odds.update(&self.racers, self.telemetry.standings());

        if self.racers.iter().all(|racer| !racer.is_racing()) {
            self.finish_race();
        } else if self.countdown_left <= 0.0 {
            self.go_racing();
        }

        Ok(())
    }

    /// Run exactly one fixed tick
    pub fn tick(&mut self) -> Result<RaceState> {
        match self.state {
            RaceState::Preparing => bail!("Race has not been started"),
            RaceState::Finished => return Ok(RaceState::Finished),
            RaceState::Starting => {
                self.ticks += 1;
                self.countdown_left -= self.config.tick_seconds;
                if self.countdown_left <= 0.0 {
                    self.go_racing();
                }
                return Ok(self.state);
            }
            RaceState::Racing => {}
        }

        if let Err(err) = self.step_racers() {
            error!("Race aborted at {:.2}s: {:#}", self.clock, err);
            self.abort_reason = Some(format!("{:#}", err));
            self.state = RaceState::Finished;
            return Err(err);
        }

        Ok(self.state)
    }

    /// Feed in real elapsed time and run as many whole ticks as it covers.
    /// Returns the number of ticks run.
    pub fn advance(&mut self, frame_seconds: f32) -> Result<usize> {
        if self.state == RaceState::Preparing {
            bail!("Race has not been started");
        }

        self.accumulator += frame_seconds.max(0.0);
        let mut ran = 0;
        while self.accumulator >= self.config.tick_seconds && self.state != RaceState::Finished {
            if ran == MAX_TICKS_PER_ADVANCE {
                debug!("Dropping {:.3}s of backlog", self.accumulator);
                self.accumulator = 0.0;
                break;
            }
            self.accumulator -= self.config.tick_seconds;
            self.tick()?;
            ran += 1;
        }

        Ok(ran)
    }

    /// Start if needed and tick until the race is over
    pub fn run_to_completion(&mut self) -> Result<()> {
        if self.state == RaceState::Preparing {
            self.start()?;
        }
        while self.state != RaceState::Finished {
            self.tick()?;
        }
        Ok(())
    }

    /// Abandon the current race and return to `Preparing` on the same track
    pub fn reset(&mut self) {
        info!("Race reset at {:.2}s ({:?})", self.clock, self.state);
        *self = Self::preparing(
            Arc::clone(&self.track),
            std::mem::take(&mut self.entries),
            self.mode,
            self.config,
        );
    }

    pub fn snapshot(&self) -> RaceSnapshot {
        RaceSnapshot {
            state: self.state,
            mode: self.mode,
            clock: self.clock,
            racers: self.racers.iter().map(RacerSnapshot::from).collect(),
            standings: self.telemetry.standings().to_vec(),
            odds: self.odds.odds().to_vec(),
            latest_commentary: self.telemetry.latest().cloned(),
        }
    }

    fn go_racing(&mut self) {
        self.state = RaceState::Racing;
        info!("Lights out after {} ticks", self.ticks);
    }

    fn step_racers(&mut self) -> Result<()> {
        let dt = self.config.tick_seconds;
        let clock = self.clock;
        let flags_mode = self.mode == RaceMode::Flags;
        let flags_required = self.track.flags().len();

        for racer in self.racers.iter_mut() {
            if let RacerUpdateResult::Finished(time) =
                racer.update(dt, clock, flags_mode, flags_required)
            {
                info!(
                    "{} ({}) finished in {:.3}s over {} cells",
                    racer.team.name,
                    racer.algorithm.name(),
                    time,
                    racer.route.length()
                );
            }
            ensure!(
                racer.position.x.is_finite() && racer.position.y.is_finite(),
                "{} left the track at {:?}",
                racer.team.name,
                racer.position
            );
            ensure!(
                racer.current_target <= racer.route.cells.len() || racer.is_dnf(),
                "{} is driving past the end of its route",
                racer.team.name
            );
        }

        self.clock += dt;
        self.ticks += 1;

        // Every racer has moved; only now look across racers
        self.telemetry.update(&self.racers, self.clock);
        self.odds.update(&self.racers, self.telemetry.standings());

        if self.racers.iter().all(|racer| !racer.is_racing()) {
            self.finish_race();
        } else if self.clock >= self.config.time_limit {
            warn!("Race time limit of {:.1}s reached", self.config.time_limit);
            for racer in self.racers.iter_mut() {
                racer.retire(DnfReason::TimeLimit);
            }
            self.telemetry.update(&self.racers, self.clock);
            self.odds.update(&self.racers, self.telemetry.standings());
            self.finish_race();
        }

        Ok(())
    }

    fn finish_race(&mut self) {
        self.state = RaceState::Finished;
        let message = match self.winner() {
            Some(winner) => format!(
                "Chequered flag! {} wins with {}",
                winner.team.name,
                winner.algorithm.name()
            ),
            None => "Chequered flag! Nobody made it home".to_string(),
        };
        info!("{}", message);
        self.telemetry
            .announce(self.clock, message, CommentaryType::Normal);
    }

    /// Print a summary of the race state
    pub fn print_summary(&self) {
        println!("=== Maze Race Summary ===");
        println!(
            "State: {:?} | Mode: {:?} | Clock: {:.2}s | Ticks: {}",
            self.state, self.mode, self.clock, self.ticks
        );
        println!(
            "Track: {}x{}, {} flags",
            self.track.width(),
            self.track.height(),
            self.track.flags().len()
        );
        if let Some(leader) = self.telemetry.leader() {
            println!("Leader: {} ({:.0}%)", leader.team, leader.progress * 100.0);
        }
        println!();

        println!("--- Standings ---");
        for standing in self.telemetry.standings() {
            match standing.finish_time {
                Some(time) => println!(
                    "  P{} {:<22} finished {:.3}s",
                    standing.position, standing.team, time
                ),
                None => println!(
                    "  P{} {:<22} {:>5.1} cells ({:.0}%)",
                    standing.position,
                    standing.team,
                    standing.distance,
                    standing.progress * 100.0
                ),
            }
        }

        let out: Vec<&Racer> = self.racers.iter().filter(|racer| racer.is_dnf()).collect();
        if !out.is_empty() {
            println!("--- Out ---");
            for racer in out {
                println!("  {:<22} {:?}", racer.team.name, racer.status);
            }
        }

        if !self.odds.odds().is_empty() {
            println!("--- Odds ---");
            for odds in self.odds.odds() {
                println!("  {:<22} {:>6.2} {:?}", odds.team, odds.odds, odds.movement);
            }
        }

        if let Some(latest) = self.telemetry.latest() {
            println!("--- Latest ---");
            println!("  [{:.2}s] {:?}: {}", latest.time, latest.kind, latest.message);
        }
    }

    /// Draw the track with racers in the terminal
    pub fn draw_map(&self) {
        let mut grid: Vec<Vec<char>> = self
            .track
            .to_ascii()
            .into_iter()
            .map(|row| {
                row.chars()
                    .map(|symbol| match symbol {
                        '#' => '█',
                        '.' => ' ',
                        other => other,
                    })
                    .collect()
            })
            .collect();

        for racer in &self.racers {
            let col = racer.position.x.round().max(0.0) as usize;
            let row = racer.position.y.round().max(0.0) as usize;
            if let Some(slot) = grid.get_mut(row).and_then(|line| line.get_mut(col)) {
                *slot = char::from_digit((racer.id.0 % 10) as u32, 10).unwrap_or('?');
            }
        }

        println!("\n=== Track Map ===");
        println!("Legend: S=Start, F=Finish, *=Flag, █=Wall, 0-9=Racer");
        for racer in &self.racers {
            println!("  {} = {} ({})", racer.id.0 % 10, racer.team.name, racer.algorithm.name());
        }
        println!();
        for row in &grid {
            let line: String = row.iter().collect();
            println!("{}", line);
        }
        println!();
    }
}

/// Work out the route a racer will drive, using only its own algorithm.
///
/// Sprint routes are the start-to-finish path. Flags routes hop to the
/// nearest uncollected flag until none remain, then head for the finish;
/// any failed leg leaves the racer without a route.
fn plan_route(
    track: &Track,
    entry: &RaceEntry,
    mode: RaceMode,
) -> (SearchResult, Result<Route, SearchOutcome>) {
    let start = track.start();
    let finish = track.finish();
    let search = run_search(entry.algorithm, track, start, finish, &entry.config);
    if !search.success {
        let outcome = search.outcome;
        return (search, Err(outcome));
    }

    if mode == RaceMode::Sprint {
        let route = Route {
            cells: search.path.clone(),
            flag_stops: Vec::new(),
        };
        return (search, Ok(route));
    }

    let mut cells = vec![start];
    let mut flag_stops = Vec::new();
    let mut remaining: Vec<Cell> = track.flags().to_vec();
    let mut here = start;

    loop {
        let next = remaining
            .iter()
            .enumerate()
            .min_by_key(|(_, flag)| flag.manhattan(&here))
            .map(|(_, flag)| *flag)
            .unwrap_or(finish);

        let leg = run_search(entry.algorithm, track, here, next, &entry.config);
        if !leg.success {
            debug!(
                "{} could not plan a leg {:?} -> {:?}: {:?}",
                entry.team.name, here, next, leg.outcome
            );
            return (search, Err(leg.outcome));
        }

        for cell in leg.path.iter().skip(1) {
            cells.push(*cell);
            if let Some(index) = remaining.iter().position(|flag| flag == cell) {
                flag_stops.push(remaining.remove(index));
            }
        }

        here = next;
        if here == finish && remaining.is_empty() {
            break;
        }
    }

    debug!(
        "{} planned a {}-cell flags route through {} flags",
        entry.team.name,
        cells.len() - 1,
        flag_stops.len()
    );

    (search, Ok(Route { cells, flag_stops }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corridor_session() -> RaceSession {
        let track = Track::from_ascii(&["#########", "#S.....F#", "#########"]).unwrap();
        let entries = [Algorithm::BreadthFirst, Algorithm::AStar]
            .into_iter()
            .map(|algorithm| RaceEntry::new(RacingTeam::for_algorithm(algorithm), algorithm))
            .collect();
        RaceSession::new(Arc::new(track), entries, RaceMode::Sprint, RaceConfig::default()).unwrap()
    }

    #[test]
    fn test_leader_tracks_the_front_runner() {
        let mut session = corridor_session();
        session.start().unwrap();
        for _ in 0..30 {
            session.tick().unwrap();
        }

        let leader = session.telemetry().leader().unwrap();
        assert_eq!(leader.position, 1);
        let furthest = session
            .racers()
            .iter()
            .max_by(|a, b| a.distance.total_cmp(&b.distance))
            .unwrap();
        assert_eq!(leader.racer, furthest.id);
    }

    #[test]
    fn test_corrupt_racer_aborts_only_the_session() {
        let mut session = corridor_session();
        session.start().unwrap();
        assert_eq!(session.state(), RaceState::Racing);
        session.tick().unwrap();

        session.racers[1].position.x = f32::NAN;
        let clock = session.clock();

        assert!(session.tick().is_err());
        assert_eq!(session.state(), RaceState::Finished);
        let reason = session.abort_reason().unwrap();
        assert!(reason.contains("left the track"), "unexpected reason: {}", reason);
        assert_eq!(session.clock(), clock);

        assert_eq!(session.tick().unwrap(), RaceState::Finished);
        assert!(session.advance(1.0).unwrap() == 0);
    }

    #[test]
    fn test_reset_clears_an_aborted_session() {
        let mut session = corridor_session();
        session.start().unwrap();
        session.racers[0].current_target = session.racers[0].route.cells.len() + 5;
        assert!(session.tick().is_err());

        session.reset();
        assert!(session.abort_reason().is_none());
        session.run_to_completion().unwrap();
        assert!(session.winner().is_some());
    }
}
