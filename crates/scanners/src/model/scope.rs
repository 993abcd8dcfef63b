//! Lexical scope chains.
//!
//! The chain from a node up to its function boundary is materialized as an
//! immutable value per query instead of a mutable parent-pointer cursor,
//! so detectors stay pure. Only block-form disposal scopes and
//! error-handling scopes are disqualifying frames for suspension-removal;
//! trailing-declaration disposal bindings are covered separately by the
//! read-accessed-names check.

use crate::model::ast::{ClosureBody, Expr, FnBody, FunctionDecl, NodeId, Stmt};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeFrame {
    Block,
    DisposalScope(Vec<String>),
    ErrorHandling,
    /// A closure boundary or other frame irrelevant to scope safety.
    Other,
}

/// Frames from the function boundary (first) down to the queried node
/// (last). Built bottom-up once per query; never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeChain {
    frames: Vec<ScopeFrame>,
}

impl ScopeChain {
    /// Chain for `target` (a statement or expression id) inside `func`.
    /// `None` when the node does not belong to this function.
    pub fn for_node(func: &FunctionDecl, target: NodeId) -> Option<ScopeChain> {
        let mut frames = Vec::new();
        let found = match &func.body {
            FnBody::Block(stmts) => find_in_stmts(stmts, target, &mut frames),
            FnBody::Expr(expr) => find_in_expr(expr, target, &mut frames),
        };
        found.then_some(ScopeChain { frames })
    }

    pub fn frames(&self) -> &[ScopeFrame] {
        &self.frames
    }

    /// True when removing a suspension at the queried node would let a
    /// resource be released, or an exception boundary be crossed, before
    /// the deferred work completes.
    pub fn crosses_release_boundary(&self) -> bool {
        self.frames
            .iter()
            .any(|f| matches!(f, ScopeFrame::DisposalScope(_) | ScopeFrame::ErrorHandling))
    }
}

fn find_in_stmts(stmts: &[Stmt], target: NodeId, frames: &mut Vec<ScopeFrame>) -> bool {
    for stmt in stmts {
        if stmt.id() == target {
            return true;
        }
        for expr in stmt.top_exprs() {
            if find_in_expr(expr, target, frames) {
                return true;
            }
        }
        match stmt {
            Stmt::If {
                then_branch,
                else_branch,
                ..
            } => {
                if descend(ScopeFrame::Block, then_branch, target, frames) {
                    return true;
                }
                if let Some(els) = else_branch {
                    if descend(ScopeFrame::Block, els, target, frames) {
                        return true;
                    }
                }
            }
            Stmt::While { body, .. } | Stmt::ForEach { body, .. } => {
                if descend(ScopeFrame::Block, body, target, frames) {
                    return true;
                }
            }
            Stmt::Disposal { bindings, body, .. } => {
                let names = bindings.iter().map(|b| b.name.clone()).collect();
                if descend(ScopeFrame::DisposalScope(names), body, target, frames) {
                    return true;
                }
            }
            Stmt::Try {
                body,
                handler,
                finalizer,
                ..
            } => {
                for part in [body, handler, finalizer] {
                    if descend(ScopeFrame::ErrorHandling, part, target, frames) {
                        return true;
                    }
                }
            }
            // A local function is a separate function boundary.
            Stmt::LocalFn { .. } => {}
            _ => {}
        }
    }
    false
}

fn descend(
    frame: ScopeFrame,
    stmts: &[Stmt],
    target: NodeId,
    frames: &mut Vec<ScopeFrame>,
) -> bool {
    frames.push(frame);
    if find_in_stmts(stmts, target, frames) {
        return true;
    }
    frames.pop();
    false
}

fn find_in_expr(expr: &Expr, target: NodeId, frames: &mut Vec<ScopeFrame>) -> bool {
    if expr.id() == target {
        return true;
    }
    match expr {
        Expr::Ident { .. } | Expr::IntLit { .. } => false,
        Expr::Member { recv, .. } => find_in_expr(recv, target, frames),
        Expr::Call { callee, args, .. } => {
            find_in_expr(callee, target, frames)
                || args.iter().any(|a| find_in_expr(a, target, frames))
        }
        Expr::Suspend { inner, .. } => find_in_expr(inner, target, frames),
        Expr::Closure { body, .. } => {
            frames.push(ScopeFrame::Other);
            let found = match body {
                ClosureBody::Expr(e) => find_in_expr(e, target, frames),
                ClosureBody::Block(stmts) => find_in_stmts(stmts, target, frames),
            };
            if !found {
                frames.pop();
            }
            found
        }
    }
}
