//! State module for tracking run progress
//!
//! # Components
//!
//! - `RunPhase`: the phase machine a pipeline run walks through, from
//!   authentication to the final summary

mod run_phase;

pub use run_phase::RunPhase;
