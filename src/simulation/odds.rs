//! Betting-style odds derived from race progress

use serde::Serialize;
use std::collections::{HashMap, VecDeque};

use super::racer::Racer;
use super::telemetry::Standing;
use super::types::RacerId;

/// Shortest odds ever quoted
pub const MIN_ODDS: f32 = 1.01;

/// Longest odds, also quoted for racers that are out
pub const MAX_ODDS: f32 = 99.0;

/// Odds values remembered per racer
pub const ODDS_HISTORY: usize = 10;

/// Change smaller than this counts as stable
const ODDS_EPSILON: f32 = 0.05;

/// Strength floor so a racer that has not moved still gets a price
const BASE_STRENGTH: f32 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OddsMovement {
    Up,
    Down,
    Stable,
}

/// Current decimal odds for one racer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BettingOdds {
    pub racer: RacerId,
    pub team: String,
    pub odds: f32,
    pub movement: OddsMovement,
}

#[derive(Debug, Default)]
pub struct OddsCalculator {
    history: HashMap<RacerId, VecDeque<f32>>,
    current: Vec<BettingOdds>,
}

impl OddsCalculator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn odds(&self) -> &[BettingOdds] {
        &self.current
    }

    /// Recompute every racer's odds from the latest standings
    pub fn update(&mut self, racers: &[Racer], standings: &[Standing]) {
        let finish_rank: HashMap<RacerId, usize> = standings
            .iter()
            .filter(|standing| standing.finish_time.is_some())
            .map(|standing| (standing.racer, standing.position))
            .collect();

        let strengths: Vec<f32> = racers
            .iter()
            .map(|racer| {
                if racer.is_dnf() {
                    0.0
                } else if let Some(rank) = finish_rank.get(&racer.id) {
                    2.0 / *rank as f32
                } else {
                    BASE_STRENGTH + racer.progress().powi(2)
                }
            })
            .collect();
        let total: f32 = strengths.iter().sum();

        self.current = racers
            .iter()
            .zip(strengths)
            .map(|(racer, strength)| {
                let odds = if strength > 0.0 && total > 0.0 {
                    (total / strength).clamp(MIN_ODDS, MAX_ODDS)
                } else {
                    MAX_ODDS
                };

                let history = self.history.entry(racer.id).or_default();
                let movement = match history.front() {
                    Some(oldest) if odds - oldest > ODDS_EPSILON => OddsMovement::Up,
                    Some(oldest) if oldest - odds > ODDS_EPSILON => OddsMovement::Down,
                    _ => OddsMovement::Stable,
                };
                history.push_back(odds);
                while history.len() > ODDS_HISTORY {
                    history.pop_front();
                }

                BettingOdds {
                    racer: racer.id,
                    team: racer.team.name.clone(),
                    odds,
                    movement,
                }
            })
            .collect();
    }
}
