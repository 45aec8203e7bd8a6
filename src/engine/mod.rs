//! Validation engine.
//!
//! Stage execution, score aggregation and recommendation synthesis.

pub mod orchestrator;
pub mod recommend;
pub mod result;
pub mod score;
pub mod stage;
