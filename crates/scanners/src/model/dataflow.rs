//! Read-accessed-names query.
//!
//! Shared by the suspension-removal and disposal-escape detectors: the set
//! of identifier names a node reads, chasing local-function and closure
//! definitions so indirect accesses count too. A binding can reach a
//! resource through a helper:
//!
//! ```text
//! disposal var stream = open("data");
//! fn stream_op() { return stream.read(); }
//! var t = run(|| stream_op());
//! suspend(t);                 // reads `stream` through two definitions
//! ```
//!
//! Definition chasing is capped at a fixed depth so self-referential
//! definitions terminate.

use crate::model::ast::{ClosureBody, Expr, FnBody, FunctionDecl, Nested, Stmt, for_each_expr_in_expr, for_each_stmt};
use std::collections::HashSet;

const MAX_CHASE_DEPTH: usize = 5;

/// Names read anywhere under `stmt`, transitively through definitions
/// declared in `func`.
pub fn read_accessed_names_stmt(func: &FunctionDecl, stmt: &Stmt) -> HashSet<String> {
    let mut names = HashSet::new();
    collect_stmt(stmt, &mut names);
    chase_definitions(func, &mut names);
    names
}

/// Names read anywhere under `expr`, transitively through definitions
/// declared in `func`.
pub fn read_accessed_names_expr(func: &FunctionDecl, expr: &Expr) -> HashSet<String> {
    let mut names = HashSet::new();
    collect_expr(expr, &mut names);
    chase_definitions(func, &mut names);
    names
}

fn chase_definitions(func: &FunctionDecl, names: &mut HashSet<String>) {
    for _ in 0..MAX_CHASE_DEPTH {
        let mut grown = false;
        let pending: Vec<String> = names.iter().cloned().collect();
        for name in pending {
            for defined in definition_reads(func, &name) {
                if names.insert(defined) {
                    grown = true;
                }
            }
        }
        if !grown {
            break;
        }
    }
}

/// Names read by the definition of `name` inside `func` (local-function
/// bodies and local-binding initializers).
fn definition_reads(func: &FunctionDecl, name: &str) -> HashSet<String> {
    let mut reads = HashSet::new();
    for_each_stmt(func.body.stmts(), Nested::Skip, &mut |stmt| match stmt {
        Stmt::LocalFn { func: nested, .. } if nested.name == name => match &nested.body {
            FnBody::Block(stmts) => {
                for s in stmts {
                    collect_stmt(s, &mut reads);
                }
            }
            FnBody::Expr(expr) => collect_expr(expr, &mut reads),
        },
        Stmt::Local {
            name: bound,
            value: Some(init),
            ..
        } if bound == name => {
            collect_expr(init, &mut reads);
        }
        _ => {}
    });
    reads
}

fn collect_stmt(stmt: &Stmt, names: &mut HashSet<String>) {
    for expr in stmt.top_exprs() {
        collect_expr(expr, names);
    }
    for list in stmt.sub_lists() {
        for nested in list {
            collect_stmt(nested, names);
        }
    }
    if let Stmt::LocalFn { func, .. } = stmt {
        match &func.body {
            FnBody::Block(stmts) => {
                for s in stmts {
                    collect_stmt(s, names);
                }
            }
            FnBody::Expr(expr) => collect_expr(expr, names),
        }
    }
}

fn collect_expr(expr: &Expr, names: &mut HashSet<String>) {
    for_each_expr_in_expr(expr, Nested::Skip, &mut |e| match e {
        Expr::Ident { name, .. } => {
            names.insert(name.clone());
        }
        Expr::Closure { body, .. } => match body {
            ClosureBody::Expr(inner) => collect_expr(inner, names),
            ClosureBody::Block(stmts) => {
                for s in stmts {
                    collect_stmt(s, names);
                }
            }
        },
        _ => {}
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::build::AstBuilder;

    #[test]
    fn reads_chase_through_a_call_initializer() {
        let mut b = AstBuilder::new();
        let opened = b.free_call("open", vec![]);
        let decl = b.disposal_local("stream", Some(opened));

        let stream = b.ident("stream");
        let read = b.method_call(stream, "read", vec![]);
        let helper = b.func("stream_op").expr_body(read);
        let helper_stmt = b.local_fn(helper);

        let invoke = b.free_call("stream_op", vec![]);
        let deferred = b.closure(false, ClosureBody::Expr(Box::new(invoke)));
        let run = b.free_call("run", vec![deferred]);
        let bind = b.local("t", run);

        let t = b.ident("t");
        let susp = b.suspend(t);
        let exit = b.expr_stmt(susp);

        let func = b
            .func("copy")
            .asynchronous()
            .block(vec![decl, helper_stmt, bind, exit]);

        let names = read_accessed_names_stmt(&func, &func.body.stmts()[3]);
        assert!(names.contains("t"));
        assert!(names.contains("stream_op"));
        assert!(names.contains("stream"));
    }

    #[test]
    fn closure_initializer_reads_are_chased() {
        let mut b = AstBuilder::new();
        let stream = b.ident("stream");
        let flush = b.method_call(stream, "flush", vec![]);
        let job = b.closure(false, ClosureBody::Expr(Box::new(flush)));
        let bind = b.local("job", job);
        let job_ref = b.ident("job");
        let susp = b.suspend(job_ref);
        let exit = b.expr_stmt(susp);
        let func = b.func("drain").asynchronous().block(vec![bind, exit]);

        let names = read_accessed_names_stmt(&func, &func.body.stmts()[1]);
        assert!(names.contains("stream"));
    }

    #[test]
    fn definition_chase_stops_at_the_depth_cap() {
        let mut b = AstBuilder::new();
        let mut stmts = Vec::new();
        for i in 0..8 {
            let next = b.ident(format!("a{}", i + 1));
            let bind = b.local(format!("a{i}"), next);
            stmts.push(bind);
        }
        let a0 = b.ident("a0");
        let exit = b.expr_stmt(a0);
        stmts.push(exit);
        let func = b.func("chain").block(stmts);

        let names = read_accessed_names_stmt(&func, func.body.stmts().last().unwrap());
        assert!(names.contains("a5"));
        assert!(!names.contains("a6"));
    }

    #[test]
    fn self_referential_definition_terminates() {
        let mut b = AstBuilder::new();
        let rec = b.free_call("echo", vec![]);
        let helper = b.func("echo").expr_body(rec);
        let helper_stmt = b.local_fn(helper);
        let call = b.free_call("echo", vec![]);
        let exit = b.expr_stmt(call);
        let func = b.func("relay").block(vec![helper_stmt, exit]);

        let names = read_accessed_names_stmt(&func, &func.body.stmts()[1]);
        assert!(names.contains("echo"));
    }
}
