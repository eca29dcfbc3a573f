//! Racing teams: the fixed identity and car profile of each entrant

use serde::Serialize;

use super::search::Algorithm;

/// Car performance profile
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TeamStats {
    /// Cells per second on fresh tyres and a full tank
    pub top_speed: f32,
    /// Cells per second squared
    pub acceleration: f32,
    /// 0..=1, higher wears tyres more slowly
    pub handling: f32,
    /// 0..=1, higher burns fuel more slowly
    pub stamina: f32,
}

/// Static identity and styling for one entrant
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RacingTeam {
    pub name: String,
    /// Hex colour used by renderers, e.g. "#e10600"
    pub color: String,
    pub stats: TeamStats,
}

impl RacingTeam {
    pub fn new(name: impl Into<String>, color: impl Into<String>, stats: TeamStats) -> Self {
        Self {
            name: name.into(),
            color: color.into(),
            stats,
        }
    }

    /// The house team for an algorithm.
    ///
    /// Depth-first and greedy teams are outclassed on every stat by the
    /// teams whose algorithms guarantee a shortest path.
    pub fn for_algorithm(algorithm: Algorithm) -> Self {
        let (name, color, top_speed, acceleration, handling, stamina) = match algorithm {
            Algorithm::BreadthFirst => ("Breadth-First Blaze", "#1e88e5", 6.0, 3.0, 0.70, 0.70),
            Algorithm::Dijkstra => ("Dijkstra Dynamics", "#43a047", 5.8, 3.2, 0.75, 0.80),
            Algorithm::AStar => ("A-Star Racing", "#e10600", 6.2, 2.8, 0.65, 0.65),
            Algorithm::Bidirectional => ("Bidirectional Bolt", "#8e24aa", 5.9, 3.1, 0.72, 0.75),
            Algorithm::DepthFirst => ("Depth-First Drifters", "#fb8c00", 5.0, 2.5, 0.50, 0.50),
            Algorithm::GreedyBestFirst => ("Greedy Grand Prix", "#fdd835", 5.2, 2.6, 0.55, 0.55),
        };

        Self::new(
            name,
            color,
            TeamStats {
                top_speed,
                acceleration,
                handling,
                stamina,
            },
        )
    }

    /// One house team per algorithm, in [`Algorithm::ALL`] order
    pub fn roster() -> Vec<(RacingTeam, Algorithm)> {
        Algorithm::ALL
            .iter()
            .map(|algorithm| (Self::for_algorithm(*algorithm), *algorithm))
            .collect()
    }
}
