//! Blocking-call resolution inside asynchronous functions.
//!
//! A synchronous block on a future inside an async function wastes the
//! scheduler thread and can deadlock single-threaded contexts. The scanner
//! recognizes three site families and resolves each to an asynchronous
//! equivalent:
//!
//! * the blocking `result` accessor on a future-typed receiver, rewritten
//!   to a suspension of the receiver;
//! * the fixed blocking members of the core library (thread sleep, future
//!   wait/wait_all/wait_any), rewritten to their well-known counterparts;
//! * any other core-library member with a sibling named `<name>_async`
//!   whose signature is prefix-compatible with the original.
//!
//! Asynchronity is tracked through nested contexts: a synchronous closure
//! or local function inside an async function is exempt, and an async
//! closure inside a synchronous one is not.

use crate::analysis::OrderIndex;
use crate::core::{AnalysisContext, Confidence, Finding, Location, ReplacementHint, Severity};
use crate::model::ast::{
    for_each_expr_in_body, mentions_ident, strip_continuation_adapter, ClosureBody, Expr, FnBody,
    FunctionDecl, Nested, NodeId, Stmt, TypeRef,
};
use crate::model::oracle::{MethodSym, OracleResult};
use anyhow::Result;
use tracing::debug;

/// Sleeps shorter than this are treated as deliberate sub-tick pauses and
/// left alone.
const NEGLIGIBLE_SLEEP_MS: i64 = 50;

/// Receiver types exempt from asynchronous-equivalent resolution: their
/// operations complete synchronously in memory anyway.
const SYNCHRONOUS_RECEIVERS: &[&str] = &["MemoryStream"];

pub struct BlockingCallScanner;

#[derive(Clone)]
struct WalkState<'a> {
    in_async: bool,
    /// Name of the function whose body is being walked; resolution never
    /// proposes the enclosing function as its own replacement.
    enclosing: &'a str,
    /// Enclosing iteration frames, innermost last.
    loops: Vec<LoopFrame<'a>>,
}

#[derive(Clone)]
struct LoopFrame<'a> {
    id: NodeId,
    var: &'a str,
    collection: Option<&'a str>,
}

impl BlockingCallScanner {
    pub fn new() -> Self {
        Self
    }

    fn analyze_function(
        &self,
        context: &AnalysisContext,
        func: &FunctionDecl,
        findings: &mut Vec<Finding>,
    ) -> Result<()> {
        let order = context.get_or_compute(&format!("order-index:{}", func.id.0), || {
            Ok(OrderIndex::build(func))
        })?;
        let mut suspensions = Vec::new();
        for_each_expr_in_body(&func.body, Nested::Enter, &mut |e| {
            if matches!(e, Expr::Suspend { .. }) {
                suspensions.push(e);
            }
        });
        let walker = Walker {
            context,
            func,
            order,
            suspensions,
        };
        let state = WalkState {
            in_async: func.is_async,
            enclosing: &func.name,
            loops: Vec::new(),
        };
        match &func.body {
            FnBody::Block(stmts) => walker.walk_stmts(stmts, &state, findings),
            FnBody::Expr(expr) => walker.walk_expr(expr, &state, false, findings),
        }
        Ok(())
    }
}

struct Walker<'a> {
    context: &'a AnalysisContext,
    func: &'a FunctionDecl,
    order: std::sync::Arc<OrderIndex>,
    /// Every suspension in the declaration, nested contexts included.
    suspensions: Vec<&'a Expr>,
}

impl<'a> Walker<'a> {
    fn walk_stmts(&self, stmts: &'a [Stmt], state: &WalkState<'a>, findings: &mut Vec<Finding>) {
        for stmt in stmts {
            match stmt {
                Stmt::LocalFn { func, .. } => {
                    let nested = WalkState {
                        in_async: func.is_async,
                        enclosing: &func.name,
                        loops: Vec::new(),
                    };
                    match &func.body {
                        FnBody::Block(inner) => self.walk_stmts(inner, &nested, findings),
                        FnBody::Expr(expr) => self.walk_expr(expr, &nested, false, findings),
                    }
                }
                Stmt::ForEach {
                    id,
                    var,
                    iterable,
                    body,
                    ..
                } => {
                    self.walk_expr(iterable, state, false, findings);
                    let mut inner = state.clone();
                    inner.loops.push(LoopFrame {
                        id: *id,
                        var,
                        collection: iterable.as_ident(),
                    });
                    self.walk_stmts(body, &inner, findings);
                }
                _ => {
                    for expr in stmt.top_exprs() {
                        self.walk_expr(expr, state, false, findings);
                    }
                    for list in stmt.sub_lists() {
                        self.walk_stmts(list, state, findings);
                    }
                }
            }
        }
    }

    fn walk_expr(
        &self,
        expr: &'a Expr,
        state: &WalkState<'a>,
        member_receiver: bool,
        findings: &mut Vec<Finding>,
    ) {
        match expr {
            Expr::Ident { .. } | Expr::IntLit { .. } => {}
            Expr::Member { recv, .. } => {
                if state.in_async {
                    match self.check_accessor(expr, recv, state, member_receiver) {
                        Ok(Some(finding)) => findings.push(finding),
                        Ok(None) => {}
                        Err(err) => {
                            debug!(function = %self.func.name, %err, "suppressing blocking-accessor site");
                        }
                    }
                }
                self.walk_expr(recv, state, true, findings);
            }
            Expr::Call { callee, args, .. } => {
                if state.in_async {
                    match self.check_invocation(expr, callee, args, state, member_receiver) {
                        Ok(Some(finding)) => findings.push(finding),
                        Ok(None) => {}
                        Err(err) => {
                            debug!(function = %self.func.name, %err, "suppressing blocking-invocation site");
                        }
                    }
                }
                self.walk_expr(callee, state, false, findings);
                for arg in args {
                    self.walk_expr(arg, state, false, findings);
                }
            }
            Expr::Suspend { inner, .. } => self.walk_expr(inner, state, false, findings),
            Expr::Closure { is_async, body, .. } => {
                let mut nested = state.clone();
                nested.in_async = *is_async;
                nested.loops.clear();
                match body {
                    ClosureBody::Expr(e) => self.walk_expr(e, &nested, false, findings),
                    ClosureBody::Block(stmts) => self.walk_stmts(stmts, &nested, findings),
                }
            }
        }
    }

    /// The blocking `result` accessor on a future-typed receiver.
    fn check_accessor(
        &self,
        member: &Expr,
        recv: &Expr,
        state: &WalkState<'a>,
        member_receiver: bool,
    ) -> OracleResult<Option<Finding>> {
        let oracle = self.context.oracle();
        let Some(prop) = oracle.resolve_property(member.id())? else {
            return Ok(None);
        };
        if prop.name != "result" || oracle.future_shape(&prop.declaring_type).is_none() {
            return Ok(None);
        }

        if let Some(name) = recv.as_ident() {
            // The future was already suspended upon: reading its result
            // afterwards is synchronous.
            if self.suspended_before(name, member.id()) {
                return Ok(None);
            }
            if self.completed_by_combinator(name, state) {
                return Ok(None);
            }
        }

        Ok(Some(self.finding(
            member.id(),
            format!(
                "Blocking result access in asynchronous function '{}'",
                state.enclosing
            ),
            "Reading 'result' synchronously blocks until the future \
             completes; suspend on the receiver instead."
                .to_string(),
            "suspend",
            member_receiver,
            state,
        )))
    }

    /// A blocking invocation with a known asynchronous counterpart.
    fn check_invocation(
        &self,
        call: &Expr,
        callee: &Expr,
        args: &'a [Expr],
        state: &WalkState<'a>,
        member_receiver: bool,
    ) -> OracleResult<Option<Finding>> {
        let oracle = self.context.oracle();
        let Some(sym) = oracle.resolve_call(call.id())? else {
            return Ok(None);
        };
        // Delegate dispatch and disposal are never rewritten.
        if sym.name == "invoke" || sym.name == "dispose" {
            return Ok(None);
        }
        if !sym.core_library {
            return Ok(None);
        }

        let receiver_ty = match callee {
            Expr::Member { recv, .. } => oracle
                .expr_type(recv.id())?
                .unwrap_or_else(|| sym.declaring_type.clone()),
            _ => sym.declaring_type.clone(),
        };
        if SYNCHRONOUS_RECEIVERS.contains(&receiver_ty.name()) {
            return Ok(None);
        }

        let Some(replacement) = self.resolve_replacement(&sym, &receiver_ty, args)? else {
            return Ok(None);
        };
        // Self-recursion guard: the enclosing function cannot be its own
        // asynchronous equivalent.
        if replacement.eq_ignore_ascii_case(state.enclosing) {
            return Ok(None);
        }

        Ok(Some(self.finding(
            call.id(),
            format!(
                "Blocking call '{}' in asynchronous function '{}'",
                sym.name, state.enclosing
            ),
            format!(
                "'{}' blocks the scheduler thread; '{}' performs the same \
                 operation asynchronously.",
                sym.name, replacement
            ),
            &replacement,
            member_receiver,
            state,
        )))
    }

    fn resolve_replacement(
        &self,
        sym: &MethodSym,
        receiver_ty: &TypeRef,
        args: &'a [Expr],
    ) -> OracleResult<Option<String>> {
        let oracle = self.context.oracle();

        if sym.declaring_type.name().ends_with("Thread") && sym.name == "sleep" {
            if let Some(Expr::IntLit { value, .. }) = args.first() {
                if *value < NEGLIGIBLE_SLEEP_MS {
                    return Ok(None);
                }
            }
            return Ok(Some("delay".to_string()));
        }

        if oracle.future_shape(receiver_ty).is_some() {
            return Ok(match sym.name.as_str() {
                "wait" => Some("suspend".to_string()),
                "wait_all" => Some("when_all".to_string()),
                "wait_any" => Some("when_any".to_string()),
                _ => None,
            });
        }

        let candidates = oracle.lookup_members(receiver_ty, &format!("{}_async", sym.name))?;
        Ok(candidates
            .into_iter()
            .find(|c| is_compatible_equivalent(sym, c))
            .map(|c| c.name))
    }

    /// True when a suspension earlier in the declaration mentions `name`
    /// in its awaited expression.
    fn suspended_before(&self, name: &str, site: NodeId) -> bool {
        self.suspensions.iter().any(|susp| {
            self.order.before(susp.id(), site)
                && matches!(susp, Expr::Suspend { inner, .. } if mentions_ident(inner, name))
        })
    }

    /// The iterate-after-join idiom: the receiver is the variable of an
    /// enclosing loop over a collection whose futures were already joined
    /// by an earlier `when_all` suspension. Their results are available
    /// synchronously.
    fn completed_by_combinator(&self, name: &str, state: &WalkState<'a>) -> bool {
        let Some(frame) = state.loops.iter().rev().find(|f| f.var == name) else {
            return false;
        };
        let Some(collection) = frame.collection else {
            return false;
        };
        self.suspensions.iter().any(|susp| {
            let Expr::Suspend { inner, .. } = susp else {
                return false;
            };
            if !self.order.before(susp.id(), frame.id) {
                return false;
            }
            let fixed = strip_continuation_adapter(inner);
            let Expr::Call { args, .. } = fixed else {
                return false;
            };
            fixed.callee_name() == Some("when_all")
                && args.iter().any(|a| mentions_ident(a, collection))
        })
    }

    fn finding(
        &self,
        node: NodeId,
        title: String,
        description: String,
        replacement: &str,
        needs_parens: bool,
        state: &WalkState<'a>,
    ) -> Finding {
        Finding::new(
            self.scanner_id(),
            Severity::Medium,
            Confidence::High,
            title,
            description,
        )
        .with_location(Location::new(state.enclosing, node))
        .safe_to_rewrite(ReplacementHint::SuspendOnAsyncEquivalent {
            call: node,
            replacement: replacement.to_string(),
            needs_parens,
        })
    }

    fn scanner_id(&self) -> &'static str {
        "blocking-call-in-async"
    }
}

impl Default for BlockingCallScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl crate::core::Scanner for BlockingCallScanner {
    fn id(&self) -> &'static str {
        "blocking-call-in-async"
    }

    fn name(&self) -> &'static str {
        "Blocking Call Resolver"
    }

    fn description(&self) -> &'static str {
        "Detects synchronous blocking calls inside async functions and resolves their asynchronous equivalents"
    }

    fn severity(&self) -> Severity {
        Severity::Medium
    }

    fn confidence(&self) -> Confidence {
        Confidence::High
    }

    fn scan(&self, context: &AnalysisContext) -> Result<Vec<Finding>> {
        let mut findings = Vec::new();
        for func in &context.program().functions {
            self.analyze_function(context, func, &mut findings)?;
        }
        Ok(findings)
    }
}

use crate::core::Scanner;

/// A member is an acceptable equivalent when it is concrete, current, has
/// the same generic arity, and accepts the original arguments: parameter
/// types match positionally and any extra parameters are optional.
fn is_compatible_equivalent(original: &MethodSym, candidate: &MethodSym) -> bool {
    if candidate.is_virtual || candidate.is_abstract || candidate.is_deprecated {
        return false;
    }
    if candidate.type_params != original.type_params {
        return false;
    }
    if candidate.params.len() < original.params.len() {
        return false;
    }
    let prefix_matches = original
        .params
        .iter()
        .zip(&candidate.params)
        .all(|(a, b)| a.ty == b.ty);
    let extras_optional = candidate.params[original.params.len()..]
        .iter()
        .all(|p| p.optional);
    prefix_matches && extras_optional
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::AnalysisContext;
    use crate::model::ast::Program;
    use crate::model::build::AstBuilder;
    use crate::model::oracle::{FutureShape, PropertySym, TableOracle};
    use std::sync::Arc;

    fn context(program: Program, oracle: TableOracle) -> AnalysisContext {
        AnalysisContext::new(Arc::new(program), Arc::new(oracle))
    }

    fn future_oracle() -> TableOracle {
        let mut oracle = TableOracle::new();
        oracle.set_future_type("Future", FutureShape::heap(None));
        oracle
    }

    fn replacement_of(finding: &Finding) -> &str {
        match finding.replacement.as_ref().unwrap() {
            ReplacementHint::SuspendOnAsyncEquivalent { replacement, .. } => replacement,
            other => panic!("unexpected hint: {other:?}"),
        }
    }

    #[test]
    fn long_thread_sleep_resolves_to_delay() {
        let mut b = AstBuilder::new();
        let thread = b.ident("Thread");
        let ms = b.int(1000);
        let call = b.method_call(thread, "sleep", vec![ms]);
        let call_id = call.id();
        let stmt = b.expr_stmt(call);
        let func = b.func("poll").asynchronous().block(vec![stmt]);
        let program = b.program(vec![func]);

        let mut oracle = future_oracle();
        oracle.set_call(
            call_id,
            MethodSym::new("sleep", "Thread")
                .with_param("int", false)
                .core(),
        );

        let findings = BlockingCallScanner::new()
            .scan(&context(program, oracle))
            .unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(replacement_of(&findings[0]), "delay");
    }

    #[test]
    fn negligible_sleep_is_left_alone() {
        let mut b = AstBuilder::new();
        let thread = b.ident("Thread");
        let ms = b.int(10);
        let call = b.method_call(thread, "sleep", vec![ms]);
        let call_id = call.id();
        let stmt = b.expr_stmt(call);
        let func = b.func("poll").asynchronous().block(vec![stmt]);
        let program = b.program(vec![func]);

        let mut oracle = future_oracle();
        oracle.set_call(
            call_id,
            MethodSym::new("sleep", "Thread")
                .with_param("int", false)
                .core(),
        );

        let findings = BlockingCallScanner::new()
            .scan(&context(program, oracle))
            .unwrap();
        assert!(findings.is_empty());
    }

    #[test]
    fn wait_all_resolves_to_when_all() {
        let mut b = AstBuilder::new();
        let future = b.ident("Future");
        let tasks = b.ident("tasks");
        let call = b.method_call(future, "wait_all", vec![tasks]);
        let call_id = call.id();
        let recv_id = match &call {
            Expr::Call { callee, .. } => match callee.as_ref() {
                Expr::Member { recv, .. } => recv.id(),
                _ => unreachable!(),
            },
            _ => unreachable!(),
        };
        let stmt = b.expr_stmt(call);
        let func = b.func("join_all").asynchronous().block(vec![stmt]);
        let program = b.program(vec![func]);

        let mut oracle = future_oracle();
        oracle.set_type(recv_id, "Future");
        oracle.set_call(call_id, MethodSym::new("wait_all", "Future").core());

        let findings = BlockingCallScanner::new()
            .scan(&context(program, oracle))
            .unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(replacement_of(&findings[0]), "when_all");
    }

    #[test]
    fn result_access_is_flagged_unless_already_suspended() {
        let mut b = AstBuilder::new();
        let t1 = b.ident("pending");
        let access1 = b.member(t1, "result");
        let access1_id = access1.id();
        let use1 = b.local("x", access1);

        let t2 = b.ident("joined");
        let access2 = b.member(t2, "result");
        let access2_id = access2.id();
        let use2 = b.local("y", access2);
        let t2_again = b.ident("joined");
        let susp = b.suspend(t2_again);
        let await_stmt = b.expr_stmt(susp);

        let func = b
            .func("collect")
            .asynchronous()
            .block(vec![use1, await_stmt, use2]);
        let program = b.program(vec![func]);

        let mut oracle = future_oracle();
        oracle.set_property(
            access1_id,
            PropertySym {
                name: "result".into(),
                declaring_type: crate::model::ast::TypeRef::new("Future"),
            },
        );
        oracle.set_property(
            access2_id,
            PropertySym {
                name: "result".into(),
                declaring_type: crate::model::ast::TypeRef::new("Future"),
            },
        );

        let findings = BlockingCallScanner::new()
            .scan(&context(program, oracle))
            .unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].locations[0].node, access1_id);
    }

    #[test]
    fn result_after_when_all_join_is_exempt() {
        let mut b = AstBuilder::new();
        let tasks = b.ident("tasks");
        let join = b.free_call("when_all", vec![tasks]);
        let susp = b.suspend(join);
        let join_stmt = b.expr_stmt(susp);

        let t = b.ident("t");
        let access = b.member(t, "result");
        let access_id = access.id();
        let collect = b.local("value", access);
        let iterable = b.ident("tasks");
        let each = b.for_each("t", iterable, vec![collect]);

        let func = b
            .func("collect")
            .asynchronous()
            .block(vec![join_stmt, each]);
        let program = b.program(vec![func]);

        let mut oracle = future_oracle();
        oracle.set_property(
            access_id,
            PropertySym {
                name: "result".into(),
                declaring_type: crate::model::ast::TypeRef::new("Future"),
            },
        );

        let findings = BlockingCallScanner::new()
            .scan(&context(program, oracle))
            .unwrap();
        assert!(findings.is_empty());
    }

    #[test]
    fn result_in_loop_without_prior_join_is_flagged() {
        let mut b = AstBuilder::new();
        let t = b.ident("t");
        let access = b.member(t, "result");
        let access_id = access.id();
        let collect = b.local("value", access);
        let iterable = b.ident("tasks");
        let each = b.for_each("t", iterable, vec![collect]);
        let func = b.func("collect").asynchronous().block(vec![each]);
        let program = b.program(vec![func]);

        let mut oracle = future_oracle();
        oracle.set_property(
            access_id,
            PropertySym {
                name: "result".into(),
                declaring_type: crate::model::ast::TypeRef::new("Future"),
            },
        );

        let findings = BlockingCallScanner::new()
            .scan(&context(program, oracle))
            .unwrap();
        assert_eq!(findings.len(), 1);
    }

    #[test]
    fn suffix_equivalent_is_resolved_with_optional_extras() {
        let mut b = AstBuilder::new();
        let stream = b.ident("stream");
        let buffer = b.ident("buffer");
        let call = b.method_call(stream, "read", vec![buffer]);
        let call_id = call.id();
        let recv_id = match &call {
            Expr::Call { callee, .. } => match callee.as_ref() {
                Expr::Member { recv, .. } => recv.id(),
                _ => unreachable!(),
            },
            _ => unreachable!(),
        };
        let stmt = b.expr_stmt(call);
        let func = b.func("pump").asynchronous().block(vec![stmt]);
        let program = b.program(vec![func]);

        let mut oracle = future_oracle();
        oracle.set_type(recv_id, "FileStream");
        oracle.set_call(
            call_id,
            MethodSym::new("read", "FileStream")
                .with_param("Buffer", false)
                .core(),
        );
        // Virtual overload is filtered, the concrete one with a trailing
        // optional parameter wins.
        oracle.add_member(
            "FileStream",
            MethodSym::new("read_async", "FileStream")
                .with_param("Buffer", false)
                .virtual_member(),
        );
        oracle.add_member(
            "FileStream",
            MethodSym::new("read_async", "FileStream")
                .with_param("Buffer", false)
                .with_param("CancelToken", true),
        );

        let findings = BlockingCallScanner::new()
            .scan(&context(program, oracle))
            .unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(replacement_of(&findings[0]), "read_async");
    }

    #[test]
    fn synchronous_closure_inside_async_function_is_exempt() {
        let mut b = AstBuilder::new();
        let thread = b.ident("Thread");
        let ms = b.int(1000);
        let call = b.method_call(thread, "sleep", vec![ms]);
        let call_id = call.id();
        let sleep_stmt = b.expr_stmt(call);
        let closure = b.closure(false, ClosureBody::Block(vec![sleep_stmt]));
        let handler = b.local("handler", closure);
        let func = b.func("schedule").asynchronous().block(vec![handler]);
        let program = b.program(vec![func]);

        let mut oracle = future_oracle();
        oracle.set_call(
            call_id,
            MethodSym::new("sleep", "Thread")
                .with_param("int", false)
                .core(),
        );

        let findings = BlockingCallScanner::new()
            .scan(&context(program, oracle))
            .unwrap();
        assert!(findings.is_empty());
    }

    #[test]
    fn self_recursive_equivalent_is_skipped() {
        let mut b = AstBuilder::new();
        let this = b.ident("this");
        let call = b.method_call(this, "flush", vec![]);
        let call_id = call.id();
        let recv_id = match &call {
            Expr::Call { callee, .. } => match callee.as_ref() {
                Expr::Member { recv, .. } => recv.id(),
                _ => unreachable!(),
            },
            _ => unreachable!(),
        };
        let stmt = b.expr_stmt(call);
        let func = b.func("flush_async").asynchronous().block(vec![stmt]);
        let program = b.program(vec![func]);

        let mut oracle = future_oracle();
        oracle.set_type(recv_id, "Writer");
        oracle.set_call(call_id, MethodSym::new("flush", "Writer").core());
        oracle.add_member("Writer", MethodSym::new("flush_async", "Writer"));

        let findings = BlockingCallScanner::new()
            .scan(&context(program, oracle))
            .unwrap();
        assert!(findings.is_empty());
    }
}
