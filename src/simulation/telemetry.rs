//! Leaderboard and race commentary
//!
//! Runs once per tick after every racer has moved, reading racer state and
//! never writing it.

use ordered_float::OrderedFloat;
use serde::Serialize;
use std::collections::{HashMap, HashSet, VecDeque};

use super::racer::Racer;
use super::types::{RacerId, CRITICAL_WEAR, SPLIT_FRACTIONS};

/// Two racers closer than this (in cells) make a rank swap worth shouting about
pub const OVERTAKE_PROXIMITY: f32 = 0.75;

/// Minimum race time between routine leader reports
pub const COMMENTARY_INTERVAL: f32 = 5.0;

/// Commentary kept before the oldest is dropped
pub const COMMENTARY_LOG: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CommentaryType {
    Normal,
    Exciting,
    Critical,
}

/// A timestamped line of commentary
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RaceCommentary {
    pub time: f32,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: CommentaryType,
}

/// One row of the leaderboard
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Standing {
    /// 1-based
    pub position: usize,
    pub racer: RacerId,
    pub team: String,
    pub distance: f32,
    pub progress: f32,
    pub finish_time: Option<f32>,
}

#[derive(Debug, Default)]
pub struct Telemetry {
    standings: Vec<Standing>,
    log: VecDeque<RaceCommentary>,
    latest: Option<RaceCommentary>,
    last_report: Option<f32>,
    finishes_announced: HashSet<RacerId>,
    wear_announced: HashSet<RacerId>,
    /// How many split points have had their leader announced
    splits_announced: usize,
}

impl Telemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn standings(&self) -> &[Standing] {
        &self.standings
    }

    pub fn leader(&self) -> Option<&Standing> {
        self.standings.first()
    }

    pub fn latest(&self) -> Option<&RaceCommentary> {
        self.latest.as_ref()
    }

    /// Commentary not yet drained, oldest first
    pub fn commentary(&self) -> impl Iterator<Item = &RaceCommentary> {
        self.log.iter()
    }

    /// Hand over all pending commentary
    pub fn drain(&mut self) -> Vec<RaceCommentary> {
        self.log.drain(..).collect()
    }

    pub fn announce(&mut self, time: f32, message: impl Into<String>, kind: CommentaryType) {
        let entry = RaceCommentary {
            time,
            message: message.into(),
            kind,
        };
        self.log.push_back(entry.clone());
        while self.log.len() > COMMENTARY_LOG {
            self.log.pop_front();
        }
        self.latest = Some(entry);
    }

    /// Opening commentary, including every racer that is out before the start
    pub fn announce_start(&mut self, racers: &[Racer], clock: f32) {
        let starters = racers.iter().filter(|racer| !racer.is_dnf()).count();
        self.announce(
            clock,
            format!("Lights out! {} of {} racers get away", starters, racers.len()),
            CommentaryType::Normal,
        );

        for racer in racers.iter().filter(|racer| racer.is_dnf()) {
            self.announce(
                clock,
                format!(
                    "{} ({}) found no route and will not start",
                    racer.team.name,
                    racer.algorithm.name()
                ),
                CommentaryType::Critical,
            );
        }

        self.standings = rank(racers);
        self.last_report = Some(clock);
    }

    /// Re-rank and generate commentary for the tick that just ended at `clock`
    pub fn update(&mut self, racers: &[Racer], clock: f32) {
        let standings = rank(racers);

        self.announce_overtakes(racers, &standings, clock);
        self.announce_finishes(racers, &standings, clock);
        self.announce_wear(racers, clock);
        self.announce_splits(racers);

        self.standings = standings;
        self.report_leader(clock);
    }

    fn announce_overtakes(&mut self, racers: &[Racer], standings: &[Standing], clock: f32) {
        let before: HashMap<RacerId, usize> = self
            .standings
            .iter()
            .map(|standing| (standing.racer, standing.position))
            .collect();
        let now: HashMap<RacerId, usize> = standings
            .iter()
            .map(|standing| (standing.racer, standing.position))
            .collect();

        let mut overtakes = Vec::new();
        for passer in racers.iter().filter(|racer| racer.is_racing()) {
            for passed in racers.iter().filter(|racer| racer.is_racing()) {
                let (Some(was_passer), Some(was_passed), Some(is_passer), Some(is_passed)) = (
                    before.get(&passer.id),
                    before.get(&passed.id),
                    now.get(&passer.id),
                    now.get(&passed.id),
                ) else {
                    continue;
                };

                let swapped = was_passer > was_passed && is_passer < is_passed;
                let close = (passer.distance - passed.distance).abs() < OVERTAKE_PROXIMITY;
                if swapped && close {
                    overtakes.push(format!(
                        "{} slips past {} for P{}!",
                        passer.team.name, passed.team.name, is_passer
                    ));
                }
            }
        }

        for message in overtakes {
            self.announce(clock, message, CommentaryType::Exciting);
        }
    }

    fn announce_finishes(&mut self, racers: &[Racer], standings: &[Standing], clock: f32) {
        let mut finishes = Vec::new();
        for standing in standings.iter().filter(|standing| standing.finish_time.is_some()) {
            if !self.finishes_announced.insert(standing.racer) {
                continue;
            }
            let Some(racer) = racers.iter().find(|racer| racer.id == standing.racer) else {
                continue;
            };
            let time = standing.finish_time.unwrap_or(clock);
            let (message, kind) = if standing.position == 1 {
                (
                    format!(
                        "{} takes the win in {:.2}s with {}!",
                        racer.team.name,
                        time,
                        racer.algorithm.name()
                    ),
                    CommentaryType::Exciting,
                )
            } else {
                (
                    format!(
                        "{} crosses the line P{} in {:.2}s",
                        racer.team.name, standing.position, time
                    ),
                    CommentaryType::Normal,
                )
            };
            finishes.push((message, kind));
        }

        for (message, kind) in finishes {
            self.announce(clock, message, kind);
        }
    }

    fn announce_wear(&mut self, racers: &[Racer], clock: f32) {
        for racer in racers.iter().filter(|racer| racer.is_racing()) {
            if racer.wear() >= CRITICAL_WEAR && self.wear_announced.insert(racer.id) {
                self.announce(
                    clock,
                    format!(
                        "{} is struggling: wear at {:.0}%",
                        racer.team.name,
                        racer.wear() * 100.0
                    ),
                    CommentaryType::Critical,
                );
            }
        }
    }

    /// Name the first racer through each split point
    fn announce_splits(&mut self, racers: &[Racer]) {
        while self.splits_announced < SPLIT_FRACTIONS.len() {
            let index = self.splits_announced;
            let first = racers
                .iter()
                .filter_map(|racer| racer.splits.get(index).map(|time| (racer, *time)))
                .min_by_key(|(racer, time)| (OrderedFloat(*time), racer.id));

            let Some((racer, time)) = first else {
                break;
            };
            let message = format!(
                "{} leads through the {:.0}% split at {:.2}s",
                racer.team.name,
                SPLIT_FRACTIONS[index] * 100.0,
                time
            );
            self.splits_announced += 1;
            self.announce(time, message, CommentaryType::Normal);
        }
    }

    fn report_leader(&mut self, clock: f32) {
        if let Some(last) = self.last_report {
            if clock - last < COMMENTARY_INTERVAL {
                return;
            }
        }
        let Some(leader) = self.standings.first() else {
            return;
        };

        let message = format!(
            "{} leads, {:.0}% of the way home",
            leader.team,
            leader.progress * 100.0
        );
        self.last_report = Some(clock);
        self.announce(clock, message, CommentaryType::Normal);
    }
}

/// Finished racers by finish time, then racing ones by distance covered.
/// DNFs are left off.
pub fn rank(racers: &[Racer]) -> Vec<Standing> {
    let mut finished: Vec<&Racer> = racers.iter().filter(|racer| racer.is_finished()).collect();
    finished.sort_by_key(|racer| (OrderedFloat(racer.finish_time.unwrap_or(f32::MAX)), racer.id));

    let mut running: Vec<&Racer> = racers.iter().filter(|racer| racer.is_racing()).collect();
    running.sort_by_key(|racer| (std::cmp::Reverse(OrderedFloat(racer.distance)), racer.id));

    finished
        .into_iter()
        .chain(running)
        .enumerate()
        .map(|(index, racer)| Standing {
            position: index + 1,
            racer: racer.id,
            team: racer.team.name.clone(),
            distance: racer.distance,
            progress: racer.progress(),
            finish_time: racer.finish_time,
        })
        .collect()
}
