//! Fire-and-forget asynchronous declarations.
//!
//! An async function with no result gives callers nothing to suspend on:
//! failures escape to the scheduler instead of the caller and completion
//! cannot be observed. Event-handler shapes (an event-payload parameter,
//! or a single untyped state parameter) are the sanctioned exception since
//! their signatures are fixed by the subscription site.
//!
//! Synchronous delegate targets get the same treatment: an async closure
//! bound to a void-returning delegate loses its future at the boundary.

use crate::core::{AnalysisContext, Confidence, Finding, Location, Severity};
use crate::model::ast::{
    for_each_expr_in_body, Expr, FunctionDecl, Nested, ResultShape,
};
use crate::model::oracle::{MethodResult, OracleResult};
use crate::{impl_scanner, analysis};
use anyhow::Result;
use tracing::debug;

pub struct AsyncVoidScanner;

impl AsyncVoidScanner {
    pub fn new() -> Self {
        Self
    }

    fn scan_impl(&self, context: &AnalysisContext) -> Result<Vec<Finding>> {
        let mut findings = Vec::new();
        for func in &context.program().functions {
            if func.is_async
                && func.result == ResultShape::None
                && !analysis::has_event_payload_param(func)
                && !analysis::has_state_object_param(func)
            {
                findings.push(
                    Finding::new(
                        "async-without-result",
                        Severity::Medium,
                        Confidence::High,
                        format!("Async function '{}' produces no future", func.name),
                        "Callers cannot suspend on the function or observe its \
                         failures; declare a future result."
                            .to_string(),
                    )
                    .with_location(Location::new(&func.name, func.id)),
                );
            }
            self.check_closures(context, func, &mut findings);
        }
        Ok(findings)
    }

    fn check_closures(
        &self,
        context: &AnalysisContext,
        func: &FunctionDecl,
        findings: &mut Vec<Finding>,
    ) {
        let mut closures = Vec::new();
        for_each_expr_in_body(&func.body, Nested::Enter, &mut |e| {
            if matches!(e, Expr::Closure { is_async: true, .. }) {
                closures.push(e);
            }
        });
        for closure in closures {
            match self.closure_loses_future(context, closure) {
                Ok(true) => findings.push(
                    Finding::new(
                        "async-without-result",
                        Severity::Medium,
                        Confidence::High,
                        format!("Async closure in '{}' bound to a void delegate", func.name),
                        "The delegate discards the closure's future; its \
                         failures and completion are unobservable."
                            .to_string(),
                    )
                    .with_location(Location::new(&func.name, closure.id())),
                ),
                Ok(false) => {}
                Err(err) => {
                    debug!(function = %func.name, %err, "suppressing async-closure check");
                }
            }
        }
    }

    fn closure_loses_future(
        &self,
        context: &AnalysisContext,
        closure: &Expr,
    ) -> OracleResult<bool> {
        let oracle = context.oracle();
        let Some(ty) = oracle.expr_type(closure.id())? else {
            return Ok(false);
        };
        Ok(matches!(
            oracle.delegate_result(&ty)?,
            Some(MethodResult::Void)
        ))
    }
}

impl Default for AsyncVoidScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl_scanner!(
    AsyncVoidScanner,
    id: "async-without-result",
    name: "Async Without Result Detector",
    severity: Severity::Medium,
    confidence: Confidence::High,
    description: "Detects async functions and closures whose completion and failures cannot be observed"
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{AnalysisContext, Scanner};
    use crate::model::ast::{ClosureBody, Program};
    use crate::model::build::AstBuilder;
    use crate::model::oracle::TableOracle;
    use std::sync::Arc;

    fn context(program: Program, oracle: TableOracle) -> AnalysisContext {
        AnalysisContext::new(Arc::new(program), Arc::new(oracle))
    }

    #[test]
    fn async_function_without_result_is_flagged() {
        let mut b = AstBuilder::new();
        let queue = b.ident("queue");
        let call = b.method_call(queue, "send", vec![]);
        let susp = b.suspend(call);
        let stmt = b.expr_stmt(susp);
        let func = b.func("notify").asynchronous().block(vec![stmt]);
        let program = b.program(vec![func]);

        let findings = AsyncVoidScanner::new()
            .scan(&context(program, TableOracle::new()))
            .unwrap();
        assert_eq!(findings.len(), 1);
    }

    #[test]
    fn event_handler_shape_is_exempt() {
        let mut b = AstBuilder::new();
        let queue = b.ident("queue");
        let call = b.method_call(queue, "send", vec![]);
        let susp = b.suspend(call);
        let stmt = b.expr_stmt(susp);
        let func = b
            .func("on_click")
            .param("sender", "object")
            .param("args", "ClickEventArgs")
            .asynchronous()
            .block(vec![stmt]);
        let program = b.program(vec![func]);

        let findings = AsyncVoidScanner::new()
            .scan(&context(program, TableOracle::new()))
            .unwrap();
        assert!(findings.is_empty());
    }

    #[test]
    fn async_closure_bound_to_void_delegate_is_flagged() {
        let mut b = AstBuilder::new();
        let queue = b.ident("queue");
        let call = b.method_call(queue, "send", vec![]);
        let susp = b.suspend(call);
        let inner = b.expr_stmt(susp);
        let closure = b.closure(true, ClosureBody::Block(vec![inner]));
        let closure_id = closure.id();
        let register = b.free_call("subscribe", vec![closure]);
        let stmt = b.expr_stmt(register);
        let func = b
            .func("wire")
            .result(crate::model::ast::ResultShape::Future)
            .asynchronous()
            .block(vec![stmt]);
        let program = b.program(vec![func]);

        let mut oracle = TableOracle::new();
        oracle.set_type(closure_id, "Action");
        oracle.set_delegate("Action", crate::model::oracle::MethodResult::Void);

        let findings = AsyncVoidScanner::new()
            .scan(&context(program, oracle))
            .unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].locations[0].node, closure_id);
    }
}
