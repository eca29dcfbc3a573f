//! Per-race runtime state of one entrant
//!
//! A racer drives its precomputed route cell by cell. It never searches and
//! never looks at another racer.

use log::warn;
use serde::Serialize;
use std::collections::VecDeque;

use super::search::{Algorithm, SearchOutcome, SearchResult};
use super::team::RacingTeam;
use super::types::{
    Cell, Position, RacerId, ARRIVAL_EPSILON, SPLIT_FRACTIONS, TELEMETRY_HISTORY, TRAIL_FADE,
    TRAIL_LENGTH,
};

/// Tyre wear per second at zero handling
pub const TIRE_WEAR_RATE: f32 = 0.02;

/// Fuel burn per second at zero stamina
pub const FUEL_BURN_RATE: f32 = 0.015;

/// Top-speed loss at full tyre wear
const TIRE_PENALTY: f32 = 0.25;

/// Top-speed loss with an empty tank
const FUEL_PENALTY: f32 = 0.15;

/// Why a racer did not finish
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DnfReason {
    /// Its algorithm produced no usable route
    NoRoute(SearchOutcome),
    /// The race clock ran out first
    TimeLimit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RacerStatus {
    Racing,
    Finished,
    DidNotFinish(DnfReason),
}

/// The cells a racer drives, plus where it picks up flags
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Route {
    pub cells: Vec<Cell>,
    /// Flags planned on this route, in pickup order
    pub flag_stops: Vec<Cell>,
}

impl Route {
    pub fn length(&self) -> usize {
        self.cells.len().saturating_sub(1)
    }
}

/// One point of the fading trail behind a racer
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrailPoint {
    pub position: Position,
    pub alpha: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TelemetrySample {
    pub time: f32,
    pub speed: f32,
    /// Current speed as a fraction of the team's top speed
    pub efficiency: f32,
}

/// What happened to a racer during one tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RacerUpdateResult {
    /// Already finished or out; nothing moved
    Idle,
    Continue,
    Finished(f32),
}

#[derive(Debug, Clone)]
pub struct Racer {
    pub id: RacerId,
    pub team: RacingTeam,
    pub algorithm: Algorithm,
    pub search: SearchResult,
    pub route: Route,
    pub position: Position,
    pub velocity: Position,
    /// Radians from the +x axis
    pub heading: f32,
    /// Index into `route.cells` of the cell being driven to
    pub current_target: usize,
    pub distance: f32,
    pub speed: f32,
    /// 0..=1, only ever increases
    pub tire_wear: f32,
    /// 0..=1, only ever increases
    pub fuel_burn: f32,
    pub status: RacerStatus,
    pub finish_time: Option<f32>,
    pub trail: VecDeque<TrailPoint>,
    pub collected_flags: Vec<Cell>,
    pub target_flag: Option<Cell>,
    pub telemetry: VecDeque<TelemetrySample>,
    /// Race clock at each of [`SPLIT_FRACTIONS`] passed so far
    pub splits: Vec<f32>,
}

impl Racer {
    /// Place a racer on the start cell.
    ///
    /// A failed search or an empty route makes the racer a DNF from the
    /// outset; it stays where it is for the whole race.
    pub fn new(
        id: RacerId,
        team: RacingTeam,
        algorithm: Algorithm,
        search: SearchResult,
        route: Route,
        start: Cell,
    ) -> Self {
        let status = if !search.success {
            RacerStatus::DidNotFinish(DnfReason::NoRoute(search.outcome))
        } else if route.cells.is_empty() {
            RacerStatus::DidNotFinish(DnfReason::NoRoute(SearchOutcome::Unreachable))
        } else {
            RacerStatus::Racing
        };
        let target_flag = route.flag_stops.first().copied();

        Self {
            id,
            team,
            algorithm,
            search,
            route,
            position: start.center(),
            velocity: Position::default(),
            heading: 0.0,
            current_target: 1,
            distance: 0.0,
            speed: 0.0,
            tire_wear: 0.0,
            fuel_burn: 0.0,
            status,
            finish_time: None,
            trail: VecDeque::with_capacity(TRAIL_LENGTH),
            collected_flags: Vec::new(),
            target_flag,
            telemetry: VecDeque::with_capacity(TELEMETRY_HISTORY),
            splits: Vec::with_capacity(SPLIT_FRACTIONS.len()),
        }
    }

    pub fn is_racing(&self) -> bool {
        self.status == RacerStatus::Racing
    }

    pub fn is_finished(&self) -> bool {
        self.status == RacerStatus::Finished
    }

    pub fn is_dnf(&self) -> bool {
        matches!(self.status, RacerStatus::DidNotFinish(_))
    }

    /// Fraction of the route covered, 0..=1
    pub fn progress(&self) -> f32 {
        if self.is_finished() {
            return 1.0;
        }
        match self.route.length() {
            0 => 0.0,
            length => (self.distance / length as f32).min(1.0),
        }
    }

    /// The larger of the two wear figures
    pub fn wear(&self) -> f32 {
        self.tire_wear.max(self.fuel_burn)
    }

    /// Multiplier on top speed from tyre and fuel wear
    pub fn wear_multiplier(&self) -> f32 {
        1.0 - TIRE_PENALTY * self.tire_wear - FUEL_PENALTY * self.fuel_burn
    }

    pub fn effective_top_speed(&self) -> f32 {
        self.team.stats.top_speed * self.wear_multiplier()
    }

    /// Stop a racer that is still out when the race clock expires
    pub fn retire(&mut self, reason: DnfReason) {
        if self.is_racing() {
            self.status = RacerStatus::DidNotFinish(reason);
            self.speed = 0.0;
            self.velocity = Position::default();
        }
    }

    /// Advance the racer by one fixed tick starting at race time `clock`.
    ///
    /// In flags mode the finish only counts once `flags_required` flags have
    /// been collected.
    pub fn update(
        &mut self,
        dt: f32,
        clock: f32,
        flags_mode: bool,
        flags_required: usize,
    ) -> RacerUpdateResult {
        if !self.is_racing() {
            return RacerUpdateResult::Idle;
        }

        let stats = self.team.stats;
        self.tire_wear = (self.tire_wear + dt * TIRE_WEAR_RATE * (1.5 - stats.handling)).min(1.0);
        self.fuel_burn = (self.fuel_burn + dt * FUEL_BURN_RATE * (1.5 - stats.stamina)).min(1.0);
        self.speed = (self.speed + stats.acceleration * dt).min(self.effective_top_speed());

        let budget_total = self.speed * dt;
        let mut budget = budget_total;
        let mut advanced = 0.0;
        let previous = self.position;

        while budget > 0.0 && self.current_target < self.route.cells.len() {
            let target_cell = self.route.cells[self.current_target];
            let target = target_cell.center();
            let gap = self.position.distance(&target);

            if gap <= budget + ARRIVAL_EPSILON {
                self.position = target;
                advanced += gap;
                budget = (budget - gap).max(0.0);
                self.arrive_at(target_cell, flags_mode);
                self.current_target += 1;
            } else {
                self.position = self.position.move_towards(&target, budget);
                advanced += budget;
                budget = 0.0;
            }
        }

        self.distance += advanced;
        if self.position != previous {
            self.heading = previous.angle_to(&self.position);
        }
        self.velocity = Position::new(
            self.heading.cos() * self.speed,
            self.heading.sin() * self.speed,
        );

        self.record_trail();
        self.record_telemetry(clock + dt);
        self.record_splits(clock + dt);

        let route_done = self.current_target >= self.route.cells.len();
        let flags_done = !flags_mode || self.collected_flags.len() >= flags_required;
        if route_done && flags_done {
            let used = if budget_total > 0.0 {
                (advanced / budget_total).clamp(0.0, 1.0)
            } else {
                1.0
            };
            let finish_time = clock + dt * used;
            self.status = RacerStatus::Finished;
            self.finish_time = Some(finish_time);
            self.speed = 0.0;
            self.velocity = Position::default();
            return RacerUpdateResult::Finished(finish_time);
        }

        if route_done {
            // Route exhausted without every flag; the plan was incomplete
            warn!(
                "{} ({}) ran out of route with {} of {} flags",
                self.team.name,
                self.algorithm.name(),
                self.collected_flags.len(),
                flags_required
            );
            self.status = RacerStatus::DidNotFinish(DnfReason::NoRoute(SearchOutcome::Unreachable));
        }

        RacerUpdateResult::Continue
    }

    fn arrive_at(&mut self, cell: Cell, flags_mode: bool) {
        if !flags_mode || self.collected_flags.contains(&cell) {
            return;
        }
        if self.route.flag_stops.contains(&cell) {
            self.collected_flags.push(cell);
            if self.target_flag == Some(cell) {
                self.target_flag = self
                    .route
                    .flag_stops
                    .iter()
                    .find(|flag| !self.collected_flags.contains(flag))
                    .copied();
            }
        }
    }

    fn record_trail(&mut self) {
        for point in self.trail.iter_mut() {
            point.alpha *= TRAIL_FADE;
        }
        self.trail.push_back(TrailPoint {
            position: self.position,
            alpha: 1.0,
        });
        while self.trail.len() > TRAIL_LENGTH {
            self.trail.pop_front();
        }
    }

    fn record_telemetry(&mut self, time: f32) {
        let top_speed = self.team.stats.top_speed;
        self.telemetry.push_back(TelemetrySample {
            time,
            speed: self.speed,
            efficiency: if top_speed > 0.0 {
                self.speed / top_speed
            } else {
                0.0
            },
        });
        while self.telemetry.len() > TELEMETRY_HISTORY {
            self.telemetry.pop_front();
        }
    }

    fn record_splits(&mut self, time: f32) {
        let progress = self.progress();
        while let Some(fraction) = SPLIT_FRACTIONS.get(self.splits.len()) {
            if progress < *fraction {
                break;
            }
            self.splits.push(time);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::team::TeamStats;
    use std::time::Duration;

    fn straight_racer(length: usize) -> Racer {
        let cells: Vec<Cell> = (0..=length).map(|x| Cell::new(x + 1, 1)).collect();
        let search = SearchResult {
            algorithm: Algorithm::BreadthFirst,
            path: cells.clone(),
            explored: cells.clone(),
            success: true,
            steps: cells.len(),
            execution_time: Duration::ZERO,
            outcome: SearchOutcome::Found,
        };
        let team = RacingTeam::new(
            "Test",
            "#ffffff",
            TeamStats {
                top_speed: 4.0,
                acceleration: 8.0,
                handling: 1.0,
                stamina: 1.0,
            },
        );
        let route = Route {
            cells,
            flag_stops: Vec::new(),
        };
        Racer::new(RacerId(0), team, Algorithm::BreadthFirst, search, route, Cell::new(1, 1))
    }

    #[test]
    fn test_trail_is_bounded_and_fades() {
        let mut racer = straight_racer(40);
        for tick in 0..(TRAIL_LENGTH * 2) {
            racer.update(0.05, tick as f32 * 0.05, false, 0);
        }

        assert_eq!(racer.trail.len(), TRAIL_LENGTH);
        let newest = racer.trail.back().unwrap();
        let oldest = racer.trail.front().unwrap();
        assert_eq!(newest.alpha, 1.0);
        assert!(oldest.alpha < newest.alpha);
    }

    #[test]
    fn test_wear_only_increases() {
        let mut racer = straight_racer(200);
        let mut last = (racer.tire_wear, racer.fuel_burn);
        for tick in 0..100 {
            racer.update(0.1, tick as f32 * 0.1, false, 0);
            assert!(racer.tire_wear >= last.0);
            assert!(racer.fuel_burn >= last.1);
            last = (racer.tire_wear, racer.fuel_burn);
        }
        assert!(racer.effective_top_speed() < racer.team.stats.top_speed);
    }

    #[test]
    fn test_route_without_every_flag_ends_as_dnf() {
        let mut racer = straight_racer(3);
        let mut clock = 0.0;
        while racer.is_racing() {
            racer.update(0.1, clock, true, 1);
            clock += 0.1;
            assert!(clock < 60.0, "racer never left the route");
        }

        assert!(racer.collected_flags.is_empty());
        assert!(racer.finish_time.is_none());
        assert_eq!(
            racer.status,
            RacerStatus::DidNotFinish(DnfReason::NoRoute(SearchOutcome::Unreachable))
        );
    }

    #[test]
    fn test_failed_search_starts_as_dnf() {
        let mut racer = straight_racer(5);
        racer.search.success = false;
        racer.search.outcome = SearchOutcome::StepLimitExceeded;
        let racer = Racer::new(
            racer.id,
            racer.team,
            racer.algorithm,
            racer.search,
            racer.route,
            Cell::new(1, 1),
        );

        assert_eq!(
            racer.status,
            RacerStatus::DidNotFinish(DnfReason::NoRoute(SearchOutcome::StepLimitExceeded))
        );
    }
}
