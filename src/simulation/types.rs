//! Core types for the race simulation
//!
//! Grid coordinates, continuous positions and the handles used to refer to
//! racers inside a session.

use serde::Serialize;

/// A cell on the track grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Cell {
    pub x: usize,
    pub y: usize,
}

impl Cell {
    pub const fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }

    pub fn manhattan(&self, other: &Cell) -> usize {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    /// The neighbouring cell in `direction`, or `None` when it would leave
    /// the grid on the low side. The high side is checked by the track.
    pub fn step(&self, direction: Direction) -> Option<Cell> {
        let (dx, dy) = direction.offset();
        let x = self.x.checked_add_signed(dx)?;
        let y = self.y.checked_add_signed(dy)?;
        Some(Cell { x, y })
    }

    /// Centre of the cell in continuous track space
    pub fn center(&self) -> Position {
        Position::new(self.x as f32, self.y as f32)
    }
}

/// Orthogonal movement directions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    North,
    East,
    South,
    West,
}

impl Direction {
    /// Fixed exploration order. Every search walks neighbours in this order
    /// so that equal-cost candidates are broken the same way on every run.
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];

    pub const fn offset(self) -> (isize, isize) {
        match self {
            Direction::North => (0, -1),
            Direction::East => (1, 0),
            Direction::South => (0, 1),
            Direction::West => (-1, 0),
        }
    }
}

/// A 2D position in continuous track space, one unit per cell
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Position) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn lerp(&self, other: &Position, t: f32) -> Position {
        Position {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
        }
    }

    /// Heading from this position to another, in radians from the +x axis
    pub fn angle_to(&self, other: &Position) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        if dx == 0.0 && dy == 0.0 {
            0.0
        } else {
            dy.atan2(dx)
        }
    }

    /// Move towards `target` by at most `max_distance`, never past it
    pub fn move_towards(&self, target: &Position, max_distance: f32) -> Position {
        let distance = self.distance(target);
        if distance <= max_distance || distance == 0.0 {
            *target
        } else {
            self.lerp(target, max_distance / distance)
        }
    }
}

/// Handle to a racer in a session's racer arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RacerId(pub usize);

/// Distance below which a racer counts as sitting on its target cell
pub const ARRIVAL_EPSILON: f32 = 1e-4;

/// Number of points kept in a racer's trail
pub const TRAIL_LENGTH: usize = 24;

/// Alpha multiplier applied to older trail points every tick
pub const TRAIL_FADE: f32 = 0.9;

/// Number of telemetry samples kept per racer
pub const TELEMETRY_HISTORY: usize = 120;

/// Wear level that triggers a critical commentary event
pub const CRITICAL_WEAR: f32 = 0.8;

/// Fractions of the route at which split times are taken
pub const SPLIT_FRACTIONS: [f32; 3] = [0.25, 0.5, 0.75];
