//! Procedural track generation
//!
//! Carves a perfect maze over the odd-coordinate cells with an explicit
//! stack, braids in a few extra openings for overtaking lanes, then scatters
//! flags across evenly sized sectors. Generation is deterministic for a seed.

use anyhow::{bail, Result};
use log::{debug, info};
use ordered_float::OrderedFloat;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use super::track::{CellKind, Track};
use super::types::{Cell, Direction};

/// Smallest accepted width or height
pub const MIN_TRACK_SIZE: usize = 5;

/// Fraction of the grid area tried as braiding openings
pub const BRAID_RATIO: f32 = 0.05;

/// Generate a track of `width` x `height` cells with up to `flag_count` flags.
///
/// The start is always (1, 1) and the finish (width - 2, height - 2). If
/// fewer open cells exist than flags requested, as many flags as possible
/// are placed.
///
/// # Panics
///
/// Panics if the finished layout leaves an open cell unreachable from the
/// start. That would be a bug in the carving code, not a bad input.
pub fn generate(width: usize, height: usize, flag_count: usize, seed: u64) -> Result<Track> {
    if width < MIN_TRACK_SIZE || height < MIN_TRACK_SIZE {
        bail!(
            "Track must be at least {}x{}, got {}x{}",
            MIN_TRACK_SIZE,
            MIN_TRACK_SIZE,
            width,
            height
        );
    }
    if flag_count == 0 {
        bail!("Flag count must be positive");
    }

    let mut carver = MazeCarver::new(width, height, seed);
    carver.carve();
    carver.braid();

    let start = Cell::new(1, 1);
    let finish = Cell::new(width - 2, height - 2);
    carver.open(start);
    carver.open(finish);
    carver.connect_finish(finish);

    let flags = place_flags(&carver, flag_count, start, finish);
    if flags.len() < flag_count {
        debug!(
            "Only {} of {} flags fit on the {}x{} track",
            flags.len(),
            flag_count,
            width,
            height
        );
    }

    let track = Track::from_parts(width, height, carver.cells, start, finish, flags)?;
    assert!(
        track.is_fully_connected(),
        "generated track (seed {}) has open cells unreachable from the start",
        seed
    );

    info!(
        "Generated {}x{} track (seed {}): {} open cells, {} flags",
        width,
        height,
        seed,
        track.open_count(),
        track.flags().len()
    );

    Ok(track)
}

/// Working grid plus the seeded RNG that drives carving and braiding
struct MazeCarver {
    width: usize,
    height: usize,
    cells: Vec<CellKind>,
    rng: StdRng,
}

impl MazeCarver {
    fn new(width: usize, height: usize, seed: u64) -> Self {
        Self {
            width,
            height,
            cells: vec![CellKind::Wall; width * height],
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn index(&self, cell: Cell) -> usize {
        cell.y * self.width + cell.x
    }

    fn is_open(&self, cell: Cell) -> bool {
        cell.x < self.width && cell.y < self.height && self.cells[self.index(cell)] == CellKind::Open
    }

    fn open(&mut self, cell: Cell) {
        let index = self.index(cell);
        self.cells[index] = CellKind::Open;
    }

    /// Whether `cell` lies strictly inside the outer wall
    fn is_interior(&self, cell: Cell) -> bool {
        cell.x >= 1 && cell.y >= 1 && cell.x <= self.width - 2 && cell.y <= self.height - 2
    }

    /// The cell two steps away in `direction` and the wall cell between
    fn carve_target(&self, cell: Cell, direction: Direction) -> Option<(Cell, Cell)> {
        let wall = cell.step(direction)?;
        let next = wall.step(direction)?;
        if self.is_interior(next) {
            Some((wall, next))
        } else {
            None
        }
    }

    /// Randomised depth-first carve over odd-coordinate cells
    fn carve(&mut self) {
        let origin = Cell::new(1, 1);
        let mut visited = vec![false; self.width * self.height];
        let mut stack = vec![origin];
        visited[self.index(origin)] = true;
        self.open(origin);

        while let Some(&current) = stack.last() {
            let mut directions = Direction::ALL;
            directions.shuffle(&mut self.rng);

            let mut advanced = false;
            for direction in directions {
                let Some((wall, next)) = self.carve_target(current, direction) else {
                    continue;
                };
                let next_index = self.index(next);
                if visited[next_index] || self.is_open(wall) {
                    continue;
                }

                self.open(wall);
                self.open(next);
                visited[next_index] = true;
                stack.push(next);
                advanced = true;
                break;
            }

            if !advanced {
                stack.pop();
            }
        }
    }

    /// Knock out random interior walls that already touch two open cells
    fn braid(&mut self) {
        let attempts = ((self.width * self.height) as f32 * BRAID_RATIO) as usize;
        let mut opened = 0;

        for _ in 0..attempts {
            let x = self.rng.random_range(1..self.width - 1);
            let y = self.rng.random_range(1..self.height - 1);
            let cell = Cell::new(x, y);
            if self.is_open(cell) {
                continue;
            }

            let open_neighbors = Direction::ALL
                .iter()
                .filter_map(|direction| cell.step(*direction))
                .filter(|next| self.is_open(*next))
                .count();

            if open_neighbors >= 2 {
                self.open(cell);
                opened += 1;
            }
        }

        debug!("Braiding opened {} of {} attempted walls", opened, attempts);
    }

    /// With both dimensions even the finish lands off the carved lattice and
    /// can end up walled in; open the cell linking it to the lattice.
    fn connect_finish(&mut self, finish: Cell) {
        let has_open_neighbor = Direction::ALL
            .iter()
            .filter_map(|direction| finish.step(*direction))
            .any(|next| self.is_open(next));

        if !has_open_neighbor {
            self.open(Cell::new(finish.x - 1, finish.y));
        }
    }
}

/// Spread flags over `ceil(sqrt(flag_count))^2` sectors, taking the open cell
/// nearest each sector centre
fn place_flags(carver: &MazeCarver, flag_count: usize, start: Cell, finish: Cell) -> Vec<Cell> {
    let mut candidates: Vec<Cell> = (0..carver.height)
        .flat_map(|y| (0..carver.width).map(move |x| Cell::new(x, y)))
        .filter(|cell| carver.is_open(*cell) && *cell != start && *cell != finish)
        .collect();

    let sectors_per_side = (flag_count as f32).sqrt().ceil() as usize;
    let sector_width = carver.width as f32 / sectors_per_side as f32;
    let sector_height = carver.height as f32 / sectors_per_side as f32;

    let mut flags = Vec::with_capacity(flag_count);
    'sectors: for row in 0..sectors_per_side {
        for column in 0..sectors_per_side {
            if flags.len() == flag_count || candidates.is_empty() {
                break 'sectors;
            }

            let center_x = (column as f32 + 0.5) * sector_width;
            let center_y = (row as f32 + 0.5) * sector_height;

            let nearest = candidates
                .iter()
                .enumerate()
                .min_by_key(|(_, cell)| {
                    OrderedFloat((cell.x as f32 - center_x).abs() + (cell.y as f32 - center_y).abs())
                })
                .map(|(index, _)| index);

            if let Some(index) = nearest {
                flags.push(candidates.remove(index));
            }
        }
    }

    flags
}
