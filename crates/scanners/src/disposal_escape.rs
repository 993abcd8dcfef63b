//! Disposal-scope escape analysis.
//!
//! An asynchronous call rooted at a disposable binding whose future is
//! neither suspended upon nor deliberately blocked upon before the scope
//! ends may still be running when the resource is released. Candidate
//! sites are dismissed by four increasingly expensive checks, short-
//! circuited in order:
//!
//! 1. the call is already inside a suspension expression;
//! 2. the call sits inside a closure literal (deferred execution,
//!    analyzed independently);
//! 3. the produced future is stored and a suspension somewhere in the
//!    same live region mentions the stored name, combinators included
//!    (the "store now, suspend later" idiom; any mention exempts, with
//!    no dominance proof, matching reference behavior);
//! 4. a blocking accessor or a blocks-caller-marked invocation wraps the
//!    call.
//!
//! Block-form declarations without an initializer, or with more than one
//! declarator, are skipped entirely: the primary binding is ambiguous.
//! That is a documented limitation, not a silent bug.

use crate::core::{AnalysisContext, Confidence, Finding, Location, Severity};
use crate::model::ast::{
    mentions_ident, for_each_expr, ClosureBody, Expr, FunctionDecl, Nested, NodeId, Stmt,
};
use crate::model::dataflow::read_accessed_names_expr;
use crate::model::oracle::OracleResult;
use anyhow::Result;
use tracing::debug;

/// Member names that synchronously block on a future.
const BLOCKING_ACCESSORS: &[&str] = &["result", "wait"];

pub struct DisposalEscapeScanner;

#[derive(Clone)]
struct SiteContext {
    in_suspend: bool,
    in_closure: bool,
    /// A blocking accessor wraps this position.
    blocked: bool,
    /// Invocations enclosing this position, outermost first; resolved
    /// lazily for the blocks-caller marker.
    enclosing_calls: Vec<NodeId>,
    /// Local or assignment target receiving the value of the enclosing
    /// statement, when there is one.
    stored: Option<String>,
}

impl SiteContext {
    fn at_stmt(stored: Option<String>) -> Self {
        Self {
            in_suspend: false,
            in_closure: false,
            blocked: false,
            enclosing_calls: Vec::new(),
            stored,
        }
    }
}

impl DisposalEscapeScanner {
    pub fn new() -> Self {
        Self
    }

    fn analyze_function(
        &self,
        context: &AnalysisContext,
        func: &FunctionDecl,
        findings: &mut Vec<Finding>,
    ) {
        for (binding, region) in disposal_regions(func) {
            self.analyze_region(context, func, binding, region, findings);
        }
    }

    fn analyze_region(
        &self,
        context: &AnalysisContext,
        func: &FunctionDecl,
        binding: &str,
        region: &[Stmt],
        findings: &mut Vec<Finding>,
    ) {
        self.walk_stmts(context, func, binding, region, region, findings);
    }

    fn walk_stmts(
        &self,
        context: &AnalysisContext,
        func: &FunctionDecl,
        binding: &str,
        region: &[Stmt],
        stmts: &[Stmt],
        findings: &mut Vec<Finding>,
    ) {
        for stmt in stmts {
            let stored = match stmt {
                Stmt::Local {
                    name,
                    value: Some(_),
                    ..
                } => Some(name.clone()),
                Stmt::Assign { target, .. } => Some(target.clone()),
                _ => None,
            };
            for expr in stmt.top_exprs() {
                self.walk_expr(
                    context,
                    func,
                    binding,
                    region,
                    expr,
                    SiteContext::at_stmt(stored.clone()),
                    findings,
                );
            }
            for list in stmt.sub_lists() {
                self.walk_stmts(context, func, binding, region, list, findings);
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn walk_expr(
        &self,
        context: &AnalysisContext,
        func: &FunctionDecl,
        binding: &str,
        region: &[Stmt],
        expr: &Expr,
        cx: SiteContext,
        findings: &mut Vec<Finding>,
    ) {
        match expr {
            Expr::Ident { .. } | Expr::IntLit { .. } => {}
            Expr::Member { recv, name, .. } => {
                let mut inner = cx;
                if BLOCKING_ACCESSORS.contains(&name.as_str()) {
                    inner.blocked = true;
                }
                self.walk_expr(context, func, binding, region, recv, inner, findings);
            }
            Expr::Call { callee, args, .. } => {
                match self.check_candidate(context, func, binding, region, expr, &cx) {
                    Ok(Some(finding)) => findings.push(finding),
                    Ok(None) => {}
                    Err(err) => {
                        debug!(function = %func.name, %err, "suppressing disposal-escape site");
                    }
                }
                let mut inner = cx;
                inner.enclosing_calls.push(expr.id());
                self.walk_expr(
                    context,
                    func,
                    binding,
                    region,
                    callee,
                    inner.clone(),
                    findings,
                );
                for arg in args {
                    self.walk_expr(context, func, binding, region, arg, inner.clone(), findings);
                }
            }
            Expr::Suspend { inner: awaited, .. } => {
                let mut inner = cx;
                inner.in_suspend = true;
                self.walk_expr(context, func, binding, region, awaited, inner, findings);
            }
            Expr::Closure { body, .. } => {
                let mut inner = cx;
                inner.in_closure = true;
                match body {
                    ClosureBody::Expr(e) => {
                        self.walk_expr(context, func, binding, region, e, inner, findings)
                    }
                    ClosureBody::Block(stmts) => {
                        // Candidates inside the closure keep the closure
                        // flag; statement structure is otherwise walked
                        // the same way.
                        for stmt in stmts {
                            for expr in stmt.top_exprs() {
                                self.walk_expr(
                                    context,
                                    func,
                                    binding,
                                    region,
                                    expr,
                                    inner.clone(),
                                    findings,
                                );
                            }
                        }
                    }
                }
            }
        }
    }

    fn check_candidate(
        &self,
        context: &AnalysisContext,
        func: &FunctionDecl,
        binding: &str,
        region: &[Stmt],
        call: &Expr,
        cx: &SiteContext,
    ) -> OracleResult<Option<Finding>> {
        if cx.in_suspend {
            return Ok(None);
        }
        if cx.in_closure {
            return Ok(None);
        }

        let oracle = context.oracle();
        let Some(sym) = oracle.resolve_call(call.id())? else {
            return Ok(None);
        };
        if sym.future_result().is_none() {
            return Ok(None);
        }
        if !read_accessed_names_expr(func, call).contains(binding) {
            return Ok(None);
        }

        if let Some(stored) = &cx.stored {
            if region_suspends_on(region, stored) {
                return Ok(None);
            }
        }

        if cx.blocked {
            return Ok(None);
        }
        for enclosing in &cx.enclosing_calls {
            if let Some(parent) = oracle.resolve_call(*enclosing)? {
                if parent.blocks_caller {
                    return Ok(None);
                }
            }
        }

        let finding = Finding::new(
            self.id(),
            self.severity(),
            self.confidence(),
            format!("Unawaited asynchronous call on disposable '{binding}'"),
            format!(
                "'{}' starts deferred work rooted at '{binding}' but the \
                 disposal scope may release the resource before that work \
                 completes; suspend on the call or block on its result \
                 inside the scope.",
                sym.name
            ),
        )
        .with_location(Location::new(&func.name, call.id()));
        Ok(Some(finding))
    }
}

impl Default for DisposalEscapeScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl crate::core::Scanner for DisposalEscapeScanner {
    fn id(&self) -> &'static str {
        "async-call-in-disposal-scope"
    }

    fn name(&self) -> &'static str {
        "Disposal-Scope Escape Analyzer"
    }

    fn description(&self) -> &'static str {
        "Detects asynchronous calls on a disposable binding whose future may outlive the disposal scope"
    }

    fn severity(&self) -> Severity {
        Severity::High
    }

    fn confidence(&self) -> Confidence {
        Confidence::Medium
    }

    fn scan(&self, context: &AnalysisContext) -> Result<Vec<Finding>> {
        let mut findings = Vec::new();
        for func in &context.program().functions {
            self.analyze_function(context, func, &mut findings);
        }
        Ok(findings)
    }
}

use crate::core::Scanner;

/// Disposal bindings of `func` with their live regions: the body of a
/// block-form scope, or the remaining sibling statements of a
/// trailing-declaration binding.
fn disposal_regions(func: &FunctionDecl) -> Vec<(&str, &[Stmt])> {
    let mut regions = Vec::new();
    collect_regions(func.body.stmts(), &mut regions, &func.name);
    regions
}

fn collect_regions<'a>(
    stmts: &'a [Stmt],
    regions: &mut Vec<(&'a str, &'a [Stmt])>,
    function: &str,
) {
    for (index, stmt) in stmts.iter().enumerate() {
        match stmt {
            Stmt::Disposal { bindings, body, .. } => {
                match bindings.as_slice() {
                    [declarator] if declarator.init.is_some() => {
                        regions.push((declarator.name.as_str(), body.as_slice()));
                    }
                    // Ambiguous primary binding: skipped, known limitation.
                    _ => {
                        debug!(
                            %function,
                            declarators = bindings.len(),
                            "skipping ambiguous disposal declaration"
                        );
                    }
                }
                collect_regions(body, regions, function);
            }
            Stmt::Local {
                name,
                value,
                disposal: true,
                ..
            } => {
                if value.is_some() {
                    regions.push((name.as_str(), &stmts[index + 1..]));
                } else {
                    debug!(%function, binding = %name, "skipping disposal binding without initializer");
                }
            }
            _ => {
                for list in stmt.sub_lists() {
                    collect_regions(list, regions, function);
                }
            }
        }
    }
}

/// True when any suspension in the region mentions `name`, directly or
/// through an enclosing combinator call.
fn region_suspends_on(region: &[Stmt], name: &str) -> bool {
    let mut found = false;
    for_each_expr(region, Nested::Enter, &mut |e| {
        if let Expr::Suspend { inner, .. } = e {
            if mentions_ident(inner, name) {
                found = true;
            }
        }
    });
    found
}
