//! Futures wrapping futures.
//!
//! A `Future<Future<T>>` almost always means a suspension or an unwrap was
//! forgotten: the outer future completes when the inner one is *created*,
//! not when it finishes. Three shapes are reported: a suspension whose
//! yielded value is itself a future, a binding whose declared plain-future
//! type hides a nested producer, and a return of a nested producer from a
//! plain-future function. The `when_any` combinator legitimately yields
//! the first completed future and is exempt.

use crate::core::{AnalysisContext, Confidence, Finding, Location, Severity};
use crate::impl_scanner;
use crate::model::ast::{
    for_each_expr_in_body, for_each_stmt, strip_continuation_adapter, Expr, FunctionDecl, Nested,
    ResultShape, Stmt, TypeRef,
};
use crate::model::oracle::{OracleResult, SemanticOracle};
use anyhow::Result;
use tracing::debug;

pub struct NestedFutureScanner;

impl NestedFutureScanner {
    pub fn new() -> Self {
        Self
    }

    fn scan_impl(&self, context: &AnalysisContext) -> Result<Vec<Finding>> {
        let mut findings = Vec::new();
        for func in &context.program().functions {
            self.check_suspensions(context, func, &mut findings);
            self.check_bindings(context, func, &mut findings);
        }
        Ok(findings)
    }

    fn check_suspensions(
        &self,
        context: &AnalysisContext,
        func: &FunctionDecl,
        findings: &mut Vec<Finding>,
    ) {
        let mut suspensions = Vec::new();
        for_each_expr_in_body(&func.body, Nested::Enter, &mut |e| {
            if let Expr::Suspend { inner, .. } = e {
                suspensions.push((e, strip_continuation_adapter(inner)));
            }
        });
        for (susp, inner) in suspensions {
            // The first-completed combinator yields a future on purpose.
            if inner.callee_name() == Some("when_any") {
                continue;
            }
            match self.produces_nested_future(context, inner) {
                Ok(true) => findings.push(self.finding(
                    func,
                    susp.id(),
                    format!(
                        "Suspension in '{}' yields another future",
                        func.name
                    ),
                    "The suspended expression produces a future of a future; \
                     the inner future is never awaited here.",
                )),
                Ok(false) => {}
                Err(err) => {
                    debug!(function = %func.name, %err, "suppressing nested-future check");
                }
            }
        }
    }

    fn check_bindings(
        &self,
        context: &AnalysisContext,
        func: &FunctionDecl,
        findings: &mut Vec<Finding>,
    ) {
        let plain_future_result = matches!(func.result, ResultShape::Future);
        let mut sites: Vec<(crate::model::ast::NodeId, &Expr, bool)> = Vec::new();
        for_each_stmt(func.body.stmts(), Nested::Skip, &mut |stmt| match stmt {
            Stmt::Local {
                id,
                value: Some(value),
                ..
            } => sites.push((*id, value, true)),
            Stmt::Assign { id, value, .. } => sites.push((*id, value, true)),
            Stmt::Return {
                id,
                value: Some(value),
                ..
            } if plain_future_result => sites.push((*id, value, false)),
            _ => {}
        });

        for (stmt_id, value, check_declared) in sites {
            match self.binding_hides_nesting(context, stmt_id, value, check_declared) {
                Ok(true) => findings.push(self.finding(
                    func,
                    value.id(),
                    format!("Nested future loses its value in '{}'", func.name),
                    "The producer returns a future of a future but the \
                     target holds a plain future; the inner future escapes \
                     unobserved.",
                )),
                Ok(false) => {}
                Err(err) => {
                    debug!(function = %func.name, %err, "suppressing nested-future check");
                }
            }
        }
    }

    /// Binding or return site where a nested producer meets a plain-future
    /// target. For bindings the declared type must itself be the plain
    /// future; for returns the function result already is.
    fn binding_hides_nesting(
        &self,
        context: &AnalysisContext,
        stmt_id: crate::model::ast::NodeId,
        value: &Expr,
        check_declared: bool,
    ) -> OracleResult<bool> {
        let oracle = context.oracle();
        if check_declared {
            let Some(declared) = oracle.expr_type(stmt_id)? else {
                return Ok(false);
            };
            let plain = oracle
                .future_shape(&declared)
                .is_some_and(|s| s.value.is_none());
            if !plain {
                return Ok(false);
            }
        }
        let fixed = strip_continuation_adapter(value);
        if fixed.callee_name() == Some("when_any") {
            return Ok(false);
        }
        self.produces_nested_future(context, fixed)
    }

    fn produces_nested_future(
        &self,
        context: &AnalysisContext,
        expr: &Expr,
    ) -> OracleResult<bool> {
        let oracle = context.oracle();
        let Some(ty) = oracle.expr_type(expr.id())? else {
            return Ok(false);
        };
        Ok(is_nested_future(oracle, &ty))
    }

    fn finding(
        &self,
        func: &FunctionDecl,
        node: crate::model::ast::NodeId,
        title: String,
        description: &str,
    ) -> Finding {
        Finding::new(
            "nested-future",
            Severity::Medium,
            Confidence::Medium,
            title,
            description,
        )
        .with_location(Location::new(&func.name, node))
    }
}

fn is_nested_future(oracle: &dyn SemanticOracle, ty: &TypeRef) -> bool {
    oracle
        .future_shape(ty)
        .and_then(|shape| shape.value)
        .is_some_and(|value| oracle.future_shape(&value).is_some())
}

impl Default for NestedFutureScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl_scanner!(
    NestedFutureScanner,
    id: "nested-future",
    name: "Nested Future Detector",
    severity: Severity::Medium,
    confidence: Confidence::Medium,
    description: "Detects futures of futures whose inner future is never awaited"
);
