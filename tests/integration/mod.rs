//! Integration tests for docauth.
//!
//! These tests drive the pipeline through scripted detectors and the
//! built-in detectors over generated images.

pub mod cli_tests;
pub mod pipeline_tests;
