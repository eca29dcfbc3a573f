//! Search algorithm tests
//!
//! Checks the shared contract: shortest paths where promised, clean failure
//! on unreachable goals and exhausted budgets, and identical output for
//! identical input.

use std::time::Duration;

use maze_racer::simulation::{
    generate, run_search, run_searches_parallel, validate_path, Algorithm, AlgorithmConfig, Cell,
    SearchOutcome, SearchResult, SearchStrategy, Track, TrackView,
};

fn run_all(track: &Track, config: AlgorithmConfig) -> Vec<(Algorithm, SearchResult)> {
    Algorithm::ALL
        .iter()
        .map(|algorithm| {
            (
                *algorithm,
                run_search(*algorithm, track, track.start(), track.finish(), &config),
            )
        })
        .collect()
}

fn walled_off_finish() -> Track {
    Track::from_ascii(&[
        "#######",
        "#S..#.#",
        "#.#.#F#",
        "#...#.#",
        "#######",
    ])
    .unwrap()
}

#[test]
fn test_optimal_algorithms_agree_on_default_track() {
    let track = generate(21, 21, 7, 42).unwrap();
    let results = run_all(&track, AlgorithmConfig::default());

    let shortest = results
        .iter()
        .find(|(algorithm, _)| *algorithm == Algorithm::BreadthFirst)
        .map(|(_, result)| result.path_length())
        .unwrap();
    assert!(shortest > 0);

    for (algorithm, result) in &results {
        assert!(result.success, "{} found no route", algorithm.name());
        assert_eq!(result.outcome, SearchOutcome::Found);
        assert!(validate_path(&track, &result.path, track.start(), track.finish()).is_ok());

        if algorithm.is_optimal() {
            assert_eq!(
                result.path_length(),
                shortest,
                "{} returned a longer path",
                algorithm.name()
            );
        } else {
            assert!(result.path_length() >= shortest);
        }
    }
}

#[test]
fn test_optimal_algorithms_agree_across_seeds() {
    for seed in 0..20 {
        let track = generate(25, 19, 3, seed).unwrap();
        let results = run_all(&track, AlgorithmConfig::default());
        let lengths: Vec<usize> = results
            .iter()
            .filter(|(algorithm, _)| algorithm.is_optimal())
            .map(|(_, result)| result.path_length())
            .collect();

        assert!(
            lengths.windows(2).all(|pair| pair[0] == pair[1]),
            "seed {} gave differing optimal lengths {:?}",
            seed,
            lengths
        );
        for (_, result) in results.iter().filter(|(algorithm, _)| !algorithm.is_optimal()) {
            assert!(result.path_length() >= lengths[0]);
        }
    }
}

#[test]
fn test_unreachable_goal_is_reported_not_raised() {
    let track = walled_off_finish();
    for (algorithm, result) in run_all(&track, AlgorithmConfig::default()) {
        assert!(!result.success, "{} claims a route", algorithm.name());
        assert_eq!(result.outcome, SearchOutcome::Unreachable);
        assert!(result.path.is_empty());
        assert!(!result.explored.is_empty());
        assert_eq!(result.efficiency(), 0.0);
    }
}

#[test]
fn test_step_limit_stops_every_algorithm() {
    let track = generate(31, 31, 1, 7).unwrap();
    let config = AlgorithmConfig {
        max_steps: 5,
        ..AlgorithmConfig::default()
    };

    for (algorithm, result) in run_all(&track, config) {
        assert!(!result.success, "{} ignored the step limit", algorithm.name());
        assert_eq!(result.outcome, SearchOutcome::StepLimitExceeded);
        assert_eq!(result.steps, 5);
        assert!(result.path.is_empty());
    }
}

#[test]
fn test_time_limit_stops_every_algorithm() {
    let track = generate(31, 31, 1, 7).unwrap();
    let config = AlgorithmConfig {
        time_limit: Duration::ZERO,
        ..AlgorithmConfig::default()
    };

    for (algorithm, result) in run_all(&track, config) {
        assert!(!result.success, "{} ignored the time limit", algorithm.name());
        assert_eq!(result.outcome, SearchOutcome::TimeLimitExceeded);
        assert!(result.path.is_empty());
    }
}

#[test]
fn test_same_input_same_output() {
    let track = generate(29, 23, 5, 1234).unwrap();
    for algorithm in Algorithm::ALL {
        let config = AlgorithmConfig::default();
        let first = run_search(algorithm, &track, track.start(), track.finish(), &config);
        let second = run_search(algorithm, &track, track.start(), track.finish(), &config);
        assert!(
            first.same_route(&second),
            "{} is not deterministic",
            algorithm.name()
        );
    }
}

#[test]
fn test_parallel_results_match_sequential_in_request_order() {
    let track = generate(21, 21, 7, 42).unwrap();
    let config = AlgorithmConfig::default();
    let requests: Vec<(Algorithm, AlgorithmConfig)> =
        Algorithm::ALL.iter().rev().map(|algorithm| (*algorithm, config)).collect();

    let parallel = run_searches_parallel(&track, track.start(), track.finish(), &requests);
    assert_eq!(parallel.len(), requests.len());

    for ((algorithm, _), result) in requests.iter().zip(&parallel) {
        assert_eq!(result.algorithm, *algorithm);
        let sequential = run_search(*algorithm, &track, track.start(), track.finish(), &config);
        assert!(result.same_route(&sequential));
    }
}

#[test]
fn test_start_equals_goal() {
    let track = generate(11, 11, 1, 3).unwrap();
    let here = track.start();
    for algorithm in Algorithm::ALL {
        let result = run_search(algorithm, &track, here, here, &AlgorithmConfig::default());
        assert!(result.success, "{} failed a zero-length search", algorithm.name());
        assert_eq!(result.path, vec![here]);
        assert_eq!(result.path_length(), 0);
    }
}

#[test]
fn test_weighted_astar_still_finds_a_valid_route() {
    let track = generate(41, 41, 1, 99).unwrap();
    let shortest = run_search(
        Algorithm::BreadthFirst,
        &track,
        track.start(),
        track.finish(),
        &AlgorithmConfig::default(),
    )
    .path_length();

    let config = AlgorithmConfig {
        heuristic_weight: 3.0,
        ..AlgorithmConfig::default()
    };
    let result = run_search(Algorithm::AStar, &track, track.start(), track.finish(), &config);
    assert!(result.success);
    assert!(result.path_length() >= shortest);
}

#[test]
fn test_explored_cells_are_open_and_unique() {
    let track = generate(21, 21, 7, 42).unwrap();
    for (algorithm, result) in run_all(&track, AlgorithmConfig::default()) {
        for cell in &result.explored {
            assert!(track.is_open(*cell), "{} explored a wall", algorithm.name());
        }
        let mut sorted = result.explored.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(
            sorted.len(),
            result.explored.len(),
            "{} expanded a cell twice",
            algorithm.name()
        );
    }
}

#[test]
fn test_validate_path_rejects_broken_paths() {
    let track = Track::from_ascii(&["#####", "#S..#", "#.#.#", "#..F#", "#####"]).unwrap();
    let start = track.start();
    let finish = track.finish();

    assert!(validate_path(&track, &[], start, finish).is_err());
    assert!(validate_path(&track, &[start, Cell::new(3, 1), finish], start, finish).is_err());
    assert!(validate_path(&track, &[start, Cell::new(2, 2), finish], start, finish).is_err());
    assert!(validate_path(
        &track,
        &[start, Cell::new(2, 1), Cell::new(3, 1), Cell::new(3, 2), finish],
        start,
        finish
    )
    .is_ok());
}

/// A view that charges extra for driving into one cell
struct Tolled {
    track: Track,
    toll: Cell,
}

impl TrackView for Tolled {
    fn width(&self) -> usize {
        self.track.width()
    }

    fn height(&self) -> usize {
        self.track.height()
    }

    fn is_open(&self, cell: Cell) -> bool {
        self.track.is_open(cell)
    }

    fn move_cost(&self, _from: Cell, to: Cell) -> u32 {
        if to == self.toll {
            10
        } else {
            1
        }
    }
}

#[test]
fn test_cost_aware_searches_avoid_expensive_cells() {
    let track = Track::from_ascii(&["#####", "#S..#", "#.#.#", "#..F#", "#####"]).unwrap();
    let start = track.start();
    let finish = track.finish();
    let config = AlgorithmConfig::default();

    // Breadth-first ignores cost and takes the eastern lane first
    let plain = Algorithm::BreadthFirst.search(&track, start, finish, &config);
    assert!(plain.path.contains(&Cell::new(2, 1)));

    let tolled = Tolled {
        track,
        toll: Cell::new(2, 1),
    };
    for algorithm in [Algorithm::Dijkstra, Algorithm::AStar] {
        let result = algorithm.search(&tolled, start, finish, &config);
        assert!(result.success);
        assert!(
            !result.path.contains(&Cell::new(2, 1)),
            "{} paid the toll",
            algorithm.name()
        );
        assert_eq!(result.path_length(), 4);
    }
}
