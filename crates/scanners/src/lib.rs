//! Futurelint Scanners - Async Anti-Pattern Detection Engine
//!
//! This crate provides a trait-based system for detecting async/await
//! anti-patterns over an immutable program model, with machine-readable
//! rewrite proposals for the findings it can prove safe.

pub mod analysis;
pub mod core;
pub mod model;
pub mod runner;

pub mod async_void;
pub mod blocking_call;
pub mod disposal_escape;
pub mod nested_future;
pub mod shape_mismatch;
pub mod unnecessary_async;

pub mod rewrite;

pub use crate::core::{AnalysisContext, Confidence, Finding, ReplacementHint, Scanner, Severity};

pub use model::ast::{NodeId, Program};
pub use model::build::AstBuilder;
pub use model::oracle::{SemanticOracle, TableOracle};

pub use runner::{ScanReport, ScannerRegistry, ScannerRegistryBuilder, ScanningEngine};

pub use async_void::AsyncVoidScanner;
pub use blocking_call::BlockingCallScanner;
pub use disposal_escape::DisposalEscapeScanner;
pub use nested_future::NestedFutureScanner;
pub use shape_mismatch::ShapeMismatchScanner;
pub use unnecessary_async::UnnecessaryAsyncScanner;

pub use rewrite::{Edit, RewritePlan, RewriteProposer};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scanner_registration() {
        let registry = ScannerRegistry::default();
        assert_eq!(registry.list_ids().len(), 0);
    }
}
