//! Track grid and the read-only view handed to the search algorithms
//!
//! A track is a rectangular grid stored as one contiguous buffer indexed by
//! `y * width + x`. It is never mutated once built.

use anyhow::{bail, Context, Result};
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::Bfs;
use serde::Serialize;
use std::collections::HashMap;

use super::types::{Cell, Direction};

/// Contents of a single grid cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CellKind {
    Wall,
    Open,
}

/// Read-only access to a grid, as needed by the search strategies.
///
/// Algorithms only ever see a track through this trait, so nothing they do
/// can change the layout the other racers are searching.
pub trait TrackView: Sync {
    fn width(&self) -> usize;

    fn height(&self) -> usize;

    fn is_open(&self, cell: Cell) -> bool;

    /// Cost of moving between two adjacent open cells
    fn move_cost(&self, _from: Cell, _to: Cell) -> u32 {
        1
    }

    /// Open neighbours of `cell` in [`Direction::ALL`] order
    fn open_neighbors(&self, cell: Cell) -> Vec<Cell> {
        Direction::ALL
            .iter()
            .filter_map(|direction| cell.step(*direction))
            .filter(|next| self.is_open(*next))
            .collect()
    }
}

/// A generated (or hand-built) race track
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Track {
    width: usize,
    height: usize,
    cells: Vec<CellKind>,
    start: Cell,
    finish: Cell,
    flags: Vec<Cell>,
}

impl Track {
    /// Assemble a track from parts. The caller is responsible for the
    /// layout; only the shape and markers are checked here.
    pub(crate) fn from_parts(
        width: usize,
        height: usize,
        cells: Vec<CellKind>,
        start: Cell,
        finish: Cell,
        flags: Vec<Cell>,
    ) -> Result<Self> {
        if cells.len() != width * height {
            bail!(
                "Track buffer holds {} cells but {}x{} needs {}",
                cells.len(),
                width,
                height,
                width * height
            );
        }

        let track = Self {
            width,
            height,
            cells,
            start,
            finish,
            flags,
        };

        if !track.is_open(start) {
            bail!("Start {:?} is not an open cell", start);
        }
        if !track.is_open(finish) {
            bail!("Finish {:?} is not an open cell", finish);
        }
        if start == finish {
            bail!("Start and finish must differ");
        }
        for (i, flag) in track.flags.iter().enumerate() {
            if !track.is_open(*flag) {
                bail!("Flag {:?} is not an open cell", flag);
            }
            if *flag == start || *flag == finish {
                bail!("Flag {:?} sits on the start or finish", flag);
            }
            if track.flags[..i].contains(flag) {
                bail!("Flag {:?} placed twice", flag);
            }
        }

        Ok(track)
    }

    /// Parse a hand-drawn layout.
    ///
    /// `#` is a wall, `.` open, `S` the start, `F` the finish and `*` a flag.
    /// Every row must have the same length. Connectivity is not required,
    /// which makes this the way to build unreachable-goal layouts.
    pub fn from_ascii(rows: &[&str]) -> Result<Self> {
        let height = rows.len();
        let width = rows.first().map(|row| row.chars().count()).unwrap_or(0);
        if width == 0 || height == 0 {
            bail!("Track layout is empty");
        }

        let mut cells = Vec::with_capacity(width * height);
        let mut start = None;
        let mut finish = None;
        let mut flags = Vec::new();

        for (y, row) in rows.iter().enumerate() {
            if row.chars().count() != width {
                bail!("Row {} has {} cells, expected {}", y, row.chars().count(), width);
            }
            for (x, symbol) in row.chars().enumerate() {
                let cell = Cell::new(x, y);
                let kind = match symbol {
                    '#' => CellKind::Wall,
                    '.' => CellKind::Open,
                    'S' => {
                        if start.replace(cell).is_some() {
                            bail!("Layout has more than one start");
                        }
                        CellKind::Open
                    }
                    'F' => {
                        if finish.replace(cell).is_some() {
                            bail!("Layout has more than one finish");
                        }
                        CellKind::Open
                    }
                    '*' => {
                        flags.push(cell);
                        CellKind::Open
                    }
                    other => bail!("Unknown track symbol {:?} at ({}, {})", other, x, y),
                };
                cells.push(kind);
            }
        }

        let start = start.context("Layout has no start")?;
        let finish = finish.context("Layout has no finish")?;
        Self::from_parts(width, height, cells, start, finish, flags)
    }

    /// Render the layout using the symbols accepted by [`Track::from_ascii`]
    pub fn to_ascii(&self) -> Vec<String> {
        (0..self.height)
            .map(|y| {
                (0..self.width)
                    .map(|x| self.symbol_at(Cell::new(x, y)))
                    .collect()
            })
            .collect()
    }

    pub(crate) fn symbol_at(&self, cell: Cell) -> char {
        if cell == self.start {
            'S'
        } else if cell == self.finish {
            'F'
        } else if self.flags.contains(&cell) {
            '*'
        } else if self.is_open(cell) {
            '.'
        } else {
            '#'
        }
    }

    pub fn start(&self) -> Cell {
        self.start
    }

    pub fn finish(&self) -> Cell {
        self.finish
    }

    pub fn flags(&self) -> &[Cell] {
        &self.flags
    }

    pub fn get(&self, cell: Cell) -> Option<CellKind> {
        self.index(cell).map(|i| self.cells[i])
    }

    fn index(&self, cell: Cell) -> Option<usize> {
        if cell.x < self.width && cell.y < self.height {
            Some(cell.y * self.width + cell.x)
        } else {
            None
        }
    }

    /// All open cells in row-major order
    pub fn open_cells(&self) -> impl Iterator<Item = Cell> + '_ {
        (0..self.height)
            .flat_map(move |y| (0..self.width).map(move |x| Cell::new(x, y)))
            .filter(|cell| self.is_open(*cell))
    }

    pub fn open_count(&self) -> usize {
        self.cells.iter().filter(|kind| **kind == CellKind::Open).count()
    }

    /// Build an undirected graph whose nodes are the open cells and whose
    /// edges join orthogonally adjacent open cells
    pub fn to_graph(&self) -> (UnGraph<Cell, u32>, HashMap<Cell, NodeIndex>) {
        let mut graph = UnGraph::new_undirected();
        let mut cell_to_node = HashMap::new();

        for cell in self.open_cells() {
            let node = graph.add_node(cell);
            cell_to_node.insert(cell, node);
        }

        // East and south only, so each edge is added once
        for cell in self.open_cells() {
            for direction in [Direction::East, Direction::South] {
                if let Some(next) = cell.step(direction) {
                    if let Some(next_node) = cell_to_node.get(&next) {
                        let cost = self.move_cost(cell, next);
                        graph.add_edge(cell_to_node[&cell], *next_node, cost);
                    }
                }
            }
        }

        (graph, cell_to_node)
    }

    /// Number of open cells reachable from the start, found by flooding the
    /// open-cell graph
    pub fn reachable_from_start(&self) -> usize {
        let (graph, cell_to_node) = self.to_graph();
        let Some(start_node) = cell_to_node.get(&self.start) else {
            return 0;
        };

        let mut bfs = Bfs::new(&graph, *start_node);
        let mut reached = 0;
        while bfs.next(&graph).is_some() {
            reached += 1;
        }
        reached
    }

    /// Whether every open cell can be reached from the start
    pub fn is_fully_connected(&self) -> bool {
        self.reachable_from_start() == self.open_count()
    }
}

impl TrackView for Track {
    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn is_open(&self, cell: Cell) -> bool {
        self.get(cell) == Some(CellKind::Open)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_round_trip_keeps_markers() {
        let rows = ["#####", "#S.*#", "#.#.#", "#..F#", "#####"];
        let track = Track::from_ascii(&rows).unwrap();

        assert_eq!(track.start(), Cell::new(1, 1));
        assert_eq!(track.finish(), Cell::new(3, 3));
        assert_eq!(track.flags(), &[Cell::new(3, 1)]);
        assert_eq!(track.to_ascii(), rows);
    }

    #[test]
    fn test_ascii_rejects_ragged_rows() {
        let result = Track::from_ascii(&["#####", "#S.F", "#####"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_ascii_rejects_missing_finish() {
        let result = Track::from_ascii(&["#####", "#S..#", "#####"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_neighbors_follow_fixed_order() {
        let track = Track::from_ascii(&["#####", "#...#", "#.S.#", "#..F#", "#####"]).unwrap();
        let neighbors = track.open_neighbors(Cell::new(2, 2));
        assert_eq!(
            neighbors,
            vec![
                Cell::new(2, 1),
                Cell::new(3, 2),
                Cell::new(2, 3),
                Cell::new(1, 2)
            ]
        );
    }

    #[test]
    fn test_connectivity_detects_isolated_region() {
        let connected = Track::from_ascii(&["#####", "#S..#", "#..F#", "#####"]).unwrap();
        assert!(connected.is_fully_connected());

        let split = Track::from_ascii(&["#####", "#S#.#", "###F#", "#####"]).unwrap();
        assert!(!split.is_fully_connected());
        assert_eq!(split.reachable_from_start(), 1);
    }
}
