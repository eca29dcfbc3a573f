//! The six search strategies
//!
//! All of them walk neighbours in [`Direction::ALL`](super::types::Direction)
//! order and break priority ties by insertion order, so a given track always
//! produces the same result.

use ordered_float::OrderedFloat;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};

use super::search::{
    heuristic, reconstruct_path, Algorithm, AlgorithmConfig, SearchBudget, SearchOutcome,
    SearchResult, SearchStrategy,
};
use super::track::TrackView;
use super::types::Cell;

/// Entry in a priority frontier
#[derive(Debug, Clone, Copy)]
struct FrontierNode {
    cell: Cell,
    priority: OrderedFloat<f32>,
    /// Insertion counter; earlier entries win ties
    order: u64,
}

impl PartialEq for FrontierNode {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.order == other.order
    }
}

impl Eq for FrontierNode {}

impl PartialOrd for FrontierNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FrontierNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so the max-heap pops the lowest priority, then the oldest
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.order.cmp(&self.order))
    }
}

/// Min-priority queue with first-in tie breaking
#[derive(Default)]
struct PriorityFrontier {
    heap: BinaryHeap<FrontierNode>,
    next_order: u64,
}

impl PriorityFrontier {
    fn push(&mut self, cell: Cell, priority: f32) {
        self.heap.push(FrontierNode {
            cell,
            priority: OrderedFloat(priority),
            order: self.next_order,
        });
        self.next_order += 1;
    }

    fn pop(&mut self) -> Option<Cell> {
        self.heap.pop().map(|node| node.cell)
    }
}

/// A start or goal on a wall can never be reached
fn endpoints_blocked(track: &dyn TrackView, start: Cell, goal: Cell) -> bool {
    !track.is_open(start) || !track.is_open(goal)
}

/// FIFO frontier; shortest path by move count
pub struct BreadthFirst;

impl SearchStrategy for BreadthFirst {
    fn search(
        &self,
        track: &dyn TrackView,
        start: Cell,
        goal: Cell,
        config: &AlgorithmConfig,
    ) -> SearchResult {
        let algorithm = Algorithm::BreadthFirst;
        let mut budget = SearchBudget::new(config);
        let mut explored = Vec::new();
        if endpoints_blocked(track, start, goal) {
            return budget.failed(algorithm, SearchOutcome::Unreachable, explored);
        }

        let mut queue = VecDeque::from([start]);
        let mut seen = HashSet::from([start]);
        let mut parents = HashMap::new();

        while let Some(cell) = queue.pop_front() {
            if let Err(outcome) = budget.try_step() {
                return budget.failed(algorithm, outcome, explored);
            }
            explored.push(cell);

            if cell == goal {
                let path = reconstruct_path(&parents, start, goal);
                return budget.found(algorithm, path, explored);
            }

            for next in track.open_neighbors(cell) {
                if seen.insert(next) {
                    parents.insert(next, cell);
                    queue.push_back(next);
                }
            }
        }

        budget.failed(algorithm, SearchOutcome::Unreachable, explored)
    }
}

/// LIFO frontier; finds a path, not necessarily a short one
pub struct DepthFirst;

impl SearchStrategy for DepthFirst {
    fn search(
        &self,
        track: &dyn TrackView,
        start: Cell,
        goal: Cell,
        config: &AlgorithmConfig,
    ) -> SearchResult {
        let algorithm = Algorithm::DepthFirst;
        let mut budget = SearchBudget::new(config);
        let mut explored = Vec::new();
        if endpoints_blocked(track, start, goal) {
            return budget.failed(algorithm, SearchOutcome::Unreachable, explored);
        }

        let mut stack: Vec<(Cell, Option<Cell>)> = vec![(start, None)];
        let mut visited = HashSet::new();
        let mut parents = HashMap::new();

        while let Some((cell, parent)) = stack.pop() {
            if visited.contains(&cell) {
                continue;
            }
            if let Err(outcome) = budget.try_step() {
                return budget.failed(algorithm, outcome, explored);
            }

            visited.insert(cell);
            if let Some(parent) = parent {
                parents.insert(cell, parent);
            }
            explored.push(cell);

            if cell == goal {
                let path = reconstruct_path(&parents, start, goal);
                return budget.found(algorithm, path, explored);
            }

            // Reversed so the first direction is popped first
            for next in track.open_neighbors(cell).into_iter().rev() {
                if !visited.contains(&next) {
                    stack.push((next, Some(cell)));
                }
            }
        }

        budget.failed(algorithm, SearchOutcome::Unreachable, explored)
    }
}

/// Uniform-cost search over accumulated move cost
pub struct Dijkstra;

impl SearchStrategy for Dijkstra {
    fn search(
        &self,
        track: &dyn TrackView,
        start: Cell,
        goal: Cell,
        config: &AlgorithmConfig,
    ) -> SearchResult {
        cost_ordered_search(Algorithm::Dijkstra, track, start, goal, config, 0.0)
    }
}

/// Accumulated cost plus weighted Manhattan distance
pub struct AStar;

impl SearchStrategy for AStar {
    fn search(
        &self,
        track: &dyn TrackView,
        start: Cell,
        goal: Cell,
        config: &AlgorithmConfig,
    ) -> SearchResult {
        cost_ordered_search(
            Algorithm::AStar,
            track,
            start,
            goal,
            config,
            config.heuristic_weight,
        )
    }
}

/// Dijkstra and A* differ only in the heuristic weight (zero for Dijkstra)
fn cost_ordered_search(
    algorithm: Algorithm,
    track: &dyn TrackView,
    start: Cell,
    goal: Cell,
    config: &AlgorithmConfig,
    weight: f32,
) -> SearchResult {
    let mut budget = SearchBudget::new(config);
    let mut explored = Vec::new();
    if endpoints_blocked(track, start, goal) {
        return budget.failed(algorithm, SearchOutcome::Unreachable, explored);
    }

    let mut frontier = PriorityFrontier::default();
    let mut costs: HashMap<Cell, u32> = HashMap::from([(start, 0)]);
    let mut parents = HashMap::new();
    let mut closed = HashSet::new();
    frontier.push(start, heuristic(start, goal, weight));

    while let Some(cell) = frontier.pop() {
        if closed.contains(&cell) {
            continue;
        }
        if let Err(outcome) = budget.try_step() {
            return budget.failed(algorithm, outcome, explored);
        }
        closed.insert(cell);
        explored.push(cell);

        if cell == goal {
            let path = reconstruct_path(&parents, start, goal);
            return budget.found(algorithm, path, explored);
        }

        let cost = costs[&cell];
        for next in track.open_neighbors(cell) {
            if closed.contains(&next) {
                continue;
            }
            let next_cost = cost + track.move_cost(cell, next);
            if costs.get(&next).map_or(true, |known| next_cost < *known) {
                costs.insert(next, next_cost);
                parents.insert(next, cell);
                frontier.push(next, next_cost as f32 + heuristic(next, goal, weight));
            }
        }
    }

    budget.failed(algorithm, SearchOutcome::Unreachable, explored)
}

/// Always expands whatever looks closest to the goal
pub struct GreedyBestFirst;

impl SearchStrategy for GreedyBestFirst {
    fn search(
        &self,
        track: &dyn TrackView,
        start: Cell,
        goal: Cell,
        config: &AlgorithmConfig,
    ) -> SearchResult {
        let algorithm = Algorithm::GreedyBestFirst;
        let mut budget = SearchBudget::new(config);
        let mut explored = Vec::new();
        if endpoints_blocked(track, start, goal) {
            return budget.failed(algorithm, SearchOutcome::Unreachable, explored);
        }

        let mut frontier = PriorityFrontier::default();
        let mut seen = HashSet::from([start]);
        let mut parents = HashMap::new();
        frontier.push(start, heuristic(start, goal, 1.0));

        while let Some(cell) = frontier.pop() {
            if let Err(outcome) = budget.try_step() {
                return budget.failed(algorithm, outcome, explored);
            }
            explored.push(cell);

            if cell == goal {
                let path = reconstruct_path(&parents, start, goal);
                return budget.found(algorithm, path, explored);
            }

            for next in track.open_neighbors(cell) {
                if seen.insert(next) {
                    parents.insert(next, cell);
                    frontier.push(next, heuristic(next, goal, 1.0));
                }
            }
        }

        budget.failed(algorithm, SearchOutcome::Unreachable, explored)
    }
}

/// Breadth-first from both ends, one whole layer at a time
pub struct Bidirectional;

/// One half of a bidirectional search
struct SearchSide {
    depth: HashMap<Cell, usize>,
    parents: HashMap<Cell, Cell>,
    layer: Vec<Cell>,
}

impl SearchSide {
    fn new(origin: Cell) -> Self {
        Self {
            depth: HashMap::from([(origin, 0)]),
            parents: HashMap::new(),
            layer: vec![origin],
        }
    }

    /// Cells from `cell` back to this side's origin, `cell` first
    fn chain_to_origin(&self, cell: Cell) -> Vec<Cell> {
        let mut chain = vec![cell];
        let mut current = cell;
        while let Some(parent) = self.parents.get(&current) {
            current = *parent;
            chain.push(current);
        }
        chain
    }
}

impl SearchStrategy for Bidirectional {
    fn search(
        &self,
        track: &dyn TrackView,
        start: Cell,
        goal: Cell,
        config: &AlgorithmConfig,
    ) -> SearchResult {
        let algorithm = Algorithm::Bidirectional;
        let mut budget = SearchBudget::new(config);
        let mut explored = Vec::new();
        if endpoints_blocked(track, start, goal) {
            return budget.failed(algorithm, SearchOutcome::Unreachable, explored);
        }

        if start == goal {
            if let Err(outcome) = budget.try_step() {
                return budget.failed(algorithm, outcome, explored);
            }
            explored.push(start);
            return budget.found(algorithm, vec![start], explored);
        }

        let mut forward = SearchSide::new(start);
        let mut backward = SearchSide::new(goal);

        loop {
            if forward.layer.is_empty() || backward.layer.is_empty() {
                return budget.failed(algorithm, SearchOutcome::Unreachable, explored);
            }

            let expand_forward = forward.layer.len() <= backward.layer.len();
            let (this, other) = if expand_forward {
                (&mut forward, &backward)
            } else {
                (&mut backward, &forward)
            };

            // Shortest (length, this-side cell, other-side cell) meeting seen
            // while expanding this layer
            let mut meeting: Option<(usize, Cell, Cell)> = None;
            let mut next_layer = Vec::new();

            for cell in std::mem::take(&mut this.layer) {
                if let Err(outcome) = budget.try_step() {
                    return budget.failed(algorithm, outcome, explored);
                }
                explored.push(cell);
                let depth = this.depth[&cell];

                for next in track.open_neighbors(cell) {
                    if let Some(other_depth) = other.depth.get(&next) {
                        let length = depth + 1 + other_depth;
                        if meeting.map_or(true, |(best, _, _)| length < best) {
                            meeting = Some((length, cell, next));
                        }
                    }
                    if !this.depth.contains_key(&next) {
                        this.depth.insert(next, depth + 1);
                        this.parents.insert(next, cell);
                        next_layer.push(next);
                    }
                }
            }
            this.layer = next_layer;

            if let Some((_, this_cell, other_cell)) = meeting {
                let (forward_cell, backward_cell) = if expand_forward {
                    (this_cell, other_cell)
                } else {
                    (other_cell, this_cell)
                };

                let mut path = forward.chain_to_origin(forward_cell);
                path.reverse();
                path.extend(backward.chain_to_origin(backward_cell));
                return budget.found(algorithm, path, explored);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frontier_pops_lowest_priority_first() {
        let mut frontier = PriorityFrontier::default();
        frontier.push(Cell::new(0, 0), 3.0);
        frontier.push(Cell::new(1, 0), 1.0);
        frontier.push(Cell::new(2, 0), 2.0);

        assert_eq!(frontier.pop(), Some(Cell::new(1, 0)));
        assert_eq!(frontier.pop(), Some(Cell::new(2, 0)));
        assert_eq!(frontier.pop(), Some(Cell::new(0, 0)));
        assert_eq!(frontier.pop(), None);
    }

    #[test]
    fn test_frontier_breaks_ties_by_insertion_order() {
        let mut frontier = PriorityFrontier::default();
        frontier.push(Cell::new(5, 5), 1.0);
        frontier.push(Cell::new(0, 0), 1.0);
        frontier.push(Cell::new(3, 3), 1.0);

        assert_eq!(frontier.pop(), Some(Cell::new(5, 5)));
        assert_eq!(frontier.pop(), Some(Cell::new(0, 0)));
        assert_eq!(frontier.pop(), Some(Cell::new(3, 3)));
    }
}
