//! Future-shape mismatch at delegate boundaries.
//!
//! A synchronous closure handed to a plain-future delegate may return a
//! value-carrying future; the conversion compiles but the produced value
//! is unobservable through the delegate's type. Assertion helpers whose
//! name mentions `throws` intentionally accept any future shape and are
//! exempt.

use crate::core::{AnalysisContext, Confidence, Finding, Location, Severity};
use crate::impl_scanner;
use crate::model::ast::{
    for_each_expr_in_body, own_returns, ClosureBody, Expr, FunctionDecl, Nested, Stmt,
};
use crate::model::oracle::{MethodResult, OracleResult};
use anyhow::Result;
use tracing::debug;

pub struct ShapeMismatchScanner;

impl ShapeMismatchScanner {
    pub fn new() -> Self {
        Self
    }

    fn scan_impl(&self, context: &AnalysisContext) -> Result<Vec<Finding>> {
        let mut findings = Vec::new();
        for func in &context.program().functions {
            self.check_function(context, func, &mut findings);
        }
        Ok(findings)
    }

    fn check_function(
        &self,
        context: &AnalysisContext,
        func: &FunctionDecl,
        findings: &mut Vec<Finding>,
    ) {
        let mut sites = Vec::new();
        for_each_expr_in_body(&func.body, Nested::Enter, &mut |e| {
            if let Expr::Call { callee: _, args, .. } = e {
                for arg in args {
                    if matches!(arg, Expr::Closure { is_async: false, .. }) {
                        sites.push((e, arg));
                    }
                }
            }
        });

        for (call, closure) in sites {
            // Assertion helpers accept any shape on purpose.
            if call
                .callee_name()
                .is_some_and(|n| n.to_ascii_lowercase().contains("throws"))
            {
                continue;
            }
            match self.shape_mismatches(context, closure) {
                Ok(true) => findings.push(
                    Finding::new(
                        "future-shape-mismatch-in-closure",
                        Severity::Medium,
                        Confidence::Medium,
                        format!("Closure in '{}' narrows its future's value", func.name),
                        "The delegate expects a plain future but the closure \
                         body produces a value-carrying one; the value is \
                         unreachable through the delegate."
                            .to_string(),
                    )
                    .with_location(Location::new(&func.name, closure.id())),
                ),
                Ok(false) => {}
                Err(err) => {
                    debug!(function = %func.name, %err, "suppressing shape-mismatch check");
                }
            }
        }
    }

    fn shape_mismatches(&self, context: &AnalysisContext, closure: &Expr) -> OracleResult<bool> {
        let oracle = context.oracle();
        let Expr::Closure { body, .. } = closure else {
            return Ok(false);
        };

        let Some(delegate_ty) = oracle.expr_type(closure.id())? else {
            return Ok(false);
        };
        let Some(MethodResult::Future(expected)) = oracle.delegate_result(&delegate_ty)? else {
            return Ok(false);
        };
        if expected.value.is_some() {
            return Ok(false);
        }

        let Some(produced) = closure_result_expr(body) else {
            return Ok(false);
        };
        let Some(actual_ty) = oracle.expr_type(produced.id())? else {
            return Ok(false);
        };
        let Some(actual) = oracle.future_shape(&actual_ty) else {
            return Ok(false);
        };
        Ok(actual.value.is_some())
    }
}

/// The expression a closure's value flows out of: the expression body, or
/// the first returned value of a block body.
fn closure_result_expr(body: &ClosureBody) -> Option<&Expr> {
    match body {
        ClosureBody::Expr(expr) => Some(expr),
        ClosureBody::Block(stmts) => own_returns(stmts).into_iter().find_map(|stmt| match stmt {
            Stmt::Return { value, .. } => value.as_ref(),
            _ => None,
        }),
    }
}

impl Default for ShapeMismatchScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl_scanner!(
    ShapeMismatchScanner,
    id: "future-shape-mismatch-in-closure",
    name: "Future Shape Mismatch Detector",
    severity: Severity::Medium,
    confidence: Confidence::Medium,
    description: "Detects synchronous closures whose produced future shape is narrowed by the receiving delegate"
);
