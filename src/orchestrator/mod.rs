//! Snapshot loop orchestration.
//!
//! Drives capture, upload and sleep for one camera, forever. Failures
//! from either stage end the current cycle only; the next cycle always
//! runs after the configured interval.

mod runner;

pub use runner::{CycleReport, SnapshotLoop, StartupError};
