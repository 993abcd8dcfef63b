//! Scanner trait for pluggable anti-pattern detection.
//!
//! Detectors are independent and share no mutable state, so the engine can
//! run them concurrently over one immutable program snapshot. Each scanner
//! is a pure function of the [`AnalysisContext`]: invoking it twice on the
//! same snapshot yields the same findings.
//!
//! A scanner that cannot prove a finding stays silent. The three failure
//! categories (unresolvable symbol, unsupported shape, oracle internal
//! failure) all surface as "no finding", never as an unproved report.

use crate::core::{AnalysisContext, Confidence, Finding, Severity};
use anyhow::Result;

pub trait Scanner: Send + Sync {
    fn id(&self) -> &'static str;

    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str {
        "No description provided"
    }

    fn severity(&self) -> Severity;

    fn confidence(&self) -> Confidence;

    fn scan(&self, context: &AnalysisContext) -> Result<Vec<Finding>>;

    fn enabled_by_default(&self) -> bool {
        true
    }
}

#[macro_export]
macro_rules! impl_scanner {
    (
        $scanner:ty,
        id: $id:expr,
        name: $name:expr,
        severity: $severity:expr,
        confidence: $confidence:expr
        $(, description: $description:expr)?
    ) => {
        impl $crate::core::Scanner for $scanner {
            fn id(&self) -> &'static str {
                $id
            }

            fn name(&self) -> &'static str {
                $name
            }

            fn severity(&self) -> $crate::core::Severity {
                $severity
            }

            fn confidence(&self) -> $crate::core::Confidence {
                $confidence
            }

            $(
                fn description(&self) -> &'static str {
                    $description
                }
            )?

            fn scan(
                &self,
                context: &$crate::core::AnalysisContext,
            ) -> ::anyhow::Result<Vec<$crate::core::Finding>> {
                self.scan_impl(context)
            }
        }
    };
}
