//! Core abstractions for the detection framework.
//!
//! The [`Scanner`] trait defines the interface all detectors implement,
//! [`Finding`] is their only output, and [`AnalysisContext`] carries the
//! immutable program snapshot plus the injected semantic oracle that every
//! scan is a pure function of.

pub mod context;
pub mod result;
pub mod scanner;
pub mod severity;

pub use context::{AnalysisCache, AnalysisContext, ScannerConfig};
pub use result::{Finding, Location, ReplacementHint, Substitution};
pub use scanner::Scanner;
pub use severity::{Confidence, Severity};
