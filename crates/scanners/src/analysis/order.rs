//! Textual-order index over one function body.
//!
//! Detectors ask "does this suspension occur before that loop" without the
//! tree carrying source positions; the index assigns every node a dense
//! pre-order position once per declaration and is cached on the analysis
//! context.

use crate::model::ast::{ClosureBody, Expr, FnBody, FunctionDecl, NodeId, Stmt};
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct OrderIndex {
    positions: HashMap<NodeId, u32>,
}

impl OrderIndex {
    pub fn build(func: &FunctionDecl) -> Self {
        let mut index = OrderIndex::default();
        let mut next = 0u32;
        match &func.body {
            FnBody::Block(stmts) => index.visit_stmts(stmts, &mut next),
            FnBody::Expr(expr) => index.visit_expr(expr, &mut next),
        }
        index
    }

    pub fn position(&self, node: NodeId) -> Option<u32> {
        self.positions.get(&node).copied()
    }

    /// True when both nodes are indexed and `a` precedes `b`.
    pub fn before(&self, a: NodeId, b: NodeId) -> bool {
        matches!(
            (self.position(a), self.position(b)),
            (Some(pa), Some(pb)) if pa < pb
        )
    }

    fn record(&mut self, id: NodeId, next: &mut u32) {
        self.positions.insert(id, *next);
        *next += 1;
    }

    fn visit_stmts(&mut self, stmts: &[Stmt], next: &mut u32) {
        for stmt in stmts {
            self.record(stmt.id(), next);
            for expr in stmt.top_exprs() {
                self.visit_expr(expr, next);
            }
            for list in stmt.sub_lists() {
                self.visit_stmts(list, next);
            }
            if let Stmt::LocalFn { func, .. } = stmt {
                match &func.body {
                    FnBody::Block(inner) => self.visit_stmts(inner, next),
                    FnBody::Expr(expr) => self.visit_expr(expr, next),
                }
            }
        }
    }

    fn visit_expr(&mut self, expr: &Expr, next: &mut u32) {
        self.record(expr.id(), next);
        match expr {
            Expr::Ident { .. } | Expr::IntLit { .. } => {}
            Expr::Member { recv, .. } => self.visit_expr(recv, next),
            Expr::Call { callee, args, .. } => {
                self.visit_expr(callee, next);
                for arg in args {
                    self.visit_expr(arg, next);
                }
            }
            Expr::Suspend { inner, .. } => self.visit_expr(inner, next),
            Expr::Closure { body, .. } => match body {
                ClosureBody::Expr(e) => self.visit_expr(e, next),
                ClosureBody::Block(stmts) => self.visit_stmts(stmts, next),
            },
        }
    }
}
