//! Mock detectors and fixtures for testing without external detection
//! systems.


pub use detectors::*;
