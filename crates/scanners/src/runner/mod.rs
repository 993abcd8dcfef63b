//! Scanner execution and orchestration.
//!
//! The engine runs registered scanners over one immutable snapshot,
//! in parallel when configured, and folds their findings into a
//! deterministically ordered report. The registry provides scanner
//! discovery by rule id; new detectors plug in without touching the
//! execution path.

pub mod engine;
pub mod registry;

pub use engine::{ScanReport, ScannerInfo, ScanningEngine, SeverityCount};
pub use registry::{ScannerRegistry, ScannerRegistryBuilder};
