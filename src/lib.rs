//! Adaptive Traffic Signal Simulation Library
//!
//! A headless four-way intersection simulation with load-adaptive signal
//! timing, emergency preemption and a structured event stream.

pub mod runner;
pub mod simulation;
