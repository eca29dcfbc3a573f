use std::process::{Command, Output};

fn run_race(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_maze_racer"))
        .args(args)
        .env("RUST_LOG", "warn,maze_racer=info")
        .output()
        .expect("Failed to execute race")
}

/// Test that a default race runs headless to the chequered flag
#[test]
fn test_headless_race_runs() {
    let output = run_race(&[]);

    assert!(
        output.status.success(),
        "Race failed to run. stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("RACE COMPLETE"),
        "Race did not complete properly. stderr: {}",
        stderr
    );
}

/// Test that the final results are logged
#[test]
fn test_race_results_logged() {
    let output = run_race(&["--seed", "7"]);
    assert!(output.status.success(), "Race failed to run");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Race time:"), "Missing 'Race time' line");
    assert!(stderr.contains("Finishers: 6/6"), "Not every racer finished");
    assert!(stderr.contains("P1 "), "Missing podium lines");
    assert!(stderr.contains("Winner: "), "Missing winner line");
    assert!(!stderr.contains("Winner: none"), "Nobody won");
}

/// Test that the winner line names a team with a shortest-path algorithm
#[test]
fn test_winner_uses_an_optimal_algorithm() {
    let output = run_race(&["--width", "25", "--height", "25", "--seed", "3"]);
    assert!(output.status.success(), "Race failed to run");

    let stderr = String::from_utf8_lossy(&output.stderr);
    let winner_line = stderr
        .lines()
        .find(|line| line.contains("Winner: "))
        .expect("No winner line");

    let optimal = ["Breadth-First)", "Dijkstra)", "A*)", "Bidirectional)"];
    assert!(
        optimal.iter().any(|name| winner_line.contains(name)),
        "Unexpected winner: {}",
        winner_line
    );
}

/// Test that a restricted entry list only races those algorithms
#[test]
fn test_selected_algorithms_only() {
    let output = run_race(&["--algorithm", "a-star", "--algorithm", "depth-first"]);
    assert!(output.status.success(), "Race failed to run");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Finishers: 2/2"));
    assert!(!stderr.contains("Dijkstra Dynamics"));
}

/// Test that flags mode reports flag collection on the summary
#[test]
fn test_flags_mode_completes() {
    let output = run_race(&["--mode", "flags", "--flags", "4", "--tick", "0.05"]);
    assert!(
        output.status.success(),
        "Flags race failed. stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Flags mode"));
    assert!(stderr.contains("RACE COMPLETE"));
}

/// Test that the JSON snapshot is printed and parses
#[test]
fn test_json_snapshot_output() {
    let output = run_race(&["--json"]);
    assert!(output.status.success(), "Race failed to run");

    let stdout = String::from_utf8_lossy(&output.stdout);
    let snapshot: serde_json::Value =
        serde_json::from_str(&stdout).expect("stdout was not a JSON snapshot");

    assert_eq!(snapshot["state"], "Finished");
    assert_eq!(snapshot["racers"].as_array().map(Vec::len), Some(6));
    assert_eq!(snapshot["standings"][0]["position"], 1);
}

/// Test that bad track dimensions fail cleanly
#[test]
fn test_invalid_track_size_fails() {
    let output = run_race(&["--width", "3"]);
    assert!(!output.status.success());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("Could not generate the track"),
        "Missing error context. stderr: {}",
        stderr
    );
}
