//! Unnecessary-suspension removal safety proof.
//!
//! An asynchronous function whose every suspension is terminal can drop
//! the async qualifier and return the inner future directly. The hard part
//! is proving the rewrite preserves behavior:
//!
//! 1. **Tail position**: each suspension must be a return expression, the
//!    expression body, the body's final fire-and-forget statement, or the
//!    final statement of every branch of an exhaustive if/else chain.
//! 2. **Scope safety**: a suspension under a disposal or error-handling
//!    scope cannot be removed: the resource would be released, or the
//!    unwinding boundary moved, before the deferred work completes. The
//!    same applies when the exit statement reads a trailing-declaration
//!    disposal binding, possibly through a local helper definition.
//! 3. **Type compatibility**: the inner expression (continuation adapter
//!    stripped) must produce the declared result shape without implicit
//!    conversion. The two future flavors never interconvert, and result
//!    covariance is rejected outright.
//!
//! Any check the analyzer cannot complete suppresses the finding; it never
//! reports a rewrite it cannot also justify as reversible.

use crate::analysis::{
    classify, has_event_payload_param, has_state_object_param, has_suspended_iteration,
    terminal_sites, trailing_disposal_names,
};
use crate::core::{
    AnalysisContext, Confidence, Finding, Location, ReplacementHint, Severity, Substitution,
};
use crate::model::ast::{strip_continuation_adapter, FunctionDecl, ResultShape};
use crate::model::dataflow::read_accessed_names_stmt;
use crate::model::oracle::{FutureFlavor, OracleResult};
use crate::model::scope::ScopeChain;
use anyhow::Result;
use tracing::debug;

pub struct UnnecessaryAsyncScanner;

impl UnnecessaryAsyncScanner {
    pub fn new() -> Self {
        Self
    }

    fn analyze_function(
        &self,
        context: &AnalysisContext,
        func: &FunctionDecl,
    ) -> OracleResult<Option<Finding>> {
        let Some(info) = classify(func) else {
            return Ok(None);
        };

        if func.is_test || has_event_payload_param(func) || has_state_object_param(func) {
            return Ok(None);
        }
        if info.suspensions.is_empty() {
            return Ok(None);
        }
        if has_suspended_iteration(func) {
            return Ok(None);
        }

        let Some(sites) = terminal_sites(&func.body) else {
            return Ok(None);
        };
        // A leftover non-terminal suspension disqualifies the function.
        if sites.len() != info.suspensions.len() {
            return Ok(None);
        }

        let disposal_names = trailing_disposal_names(func);
        let oracle = context.oracle();
        let mut substitutions = Vec::with_capacity(sites.len());

        for site in &sites {
            if let Some(stmt) = site.stmt {
                let Some(chain) = ScopeChain::for_node(func, stmt.id()) else {
                    return Ok(None);
                };
                if chain.crosses_release_boundary() {
                    return Ok(None);
                }
                if !disposal_names.is_empty() {
                    let reads = read_accessed_names_stmt(func, stmt);
                    if disposal_names.iter().any(|n| reads.contains(n)) {
                        return Ok(None);
                    }
                }
            }

            // Result covariance: the awaited value converts implicitly to
            // another type, so returning the future directly would not.
            if oracle.is_implicit_conversion(site.suspension.id())? {
                return Ok(None);
            }

            let fixed = strip_continuation_adapter(site.inner());
            let Some(ty) = oracle.expr_type(fixed.id())? else {
                return Ok(None);
            };
            let Some(shape) = oracle.future_shape(&ty) else {
                return Ok(None);
            };
            let compatible = match shape.flavor {
                FutureFlavor::Heap => !func.result.is_inline(),
                FutureFlavor::Inline => func.result.is_inline(),
            };
            if !compatible {
                return Ok(None);
            }

            substitutions.push(Substitution {
                suspension: site.suspension.id(),
                inner: fixed.id(),
            });
        }

        let finding = Finding::new(
            self.id(),
            self.severity(),
            self.confidence(),
            format!("Function '{}' suspends only at its exits", func.name),
            format!(
                "'{}' wraps {} terminal suspension(s) in an asynchronous \
                 state machine for no behavioral gain; returning the inner \
                 future directly is equivalent and cheaper.",
                func.name,
                substitutions.len()
            ),
        )
        .with_location(Location::new(&func.name, func.id))
        .safe_to_rewrite(ReplacementHint::DropAsyncQualifier {
            function: func.id,
            substitutions,
            widen_result: func.result == ResultShape::None,
        });

        Ok(Some(finding))
    }
}

impl Default for UnnecessaryAsyncScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl crate::core::Scanner for UnnecessaryAsyncScanner {
    fn id(&self) -> &'static str {
        "unnecessary-async"
    }

    fn name(&self) -> &'static str {
        "Unnecessary Async Function Detector"
    }

    fn description(&self) -> &'static str {
        "Detects async functions whose suspensions are all terminal and can return the inner future directly"
    }

    fn severity(&self) -> Severity {
        Severity::Low
    }

    fn confidence(&self) -> Confidence {
        Confidence::High
    }

    fn scan(&self, context: &AnalysisContext) -> Result<Vec<Finding>> {
        let mut findings = Vec::new();
        for func in &context.program().functions {
            match self.analyze_function(context, func) {
                Ok(Some(finding)) => findings.push(finding),
                Ok(None) => {}
                Err(err) => {
                    // Host-oracle internal failure: suppress this
                    // declaration only, keep analyzing siblings.
                    debug!(function = %func.name, %err, "suppressing unnecessary-async analysis");
                }
            }
        }
        Ok(findings)
    }
}

use crate::core::Scanner;
