//! Maze Racer Library
//!
//! Generates maze tracks and races path-finding algorithms over them. The
//! engine runs headless; any UI only reads its snapshots.

pub mod simulation;
