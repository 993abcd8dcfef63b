//! Exit points and terminal-suspension analysis.
//!
//! A suspension is terminal when it sits in tail position: the expression
//! of a return statement, the whole expression body, the final
//! fire-and-forget statement of the body, or the final statement of every
//! branch of an exhaustive if/else-if/else chain that is itself the body's
//! last statement. Each chain branch must contain exactly one suspension
//! and a chain without a final else never qualifies (branch-coverage gap).
//!
//! The analysis returns `None` for any shape it does not recognize; the
//! caller treats that as "cannot prove" and stays silent.

use crate::model::ast::{Expr, FnBody, Nested, Stmt, for_each_expr, own_returns};

/// One terminal suspension together with its exit statement (`None` for an
/// expression-bodied function).
pub struct TerminalSite<'a> {
    pub stmt: Option<&'a Stmt>,
    pub suspension: &'a Expr,
}

impl TerminalSite<'_> {
    /// The awaited inner expression.
    pub fn inner(&self) -> &Expr {
        match self.suspension {
            Expr::Suspend { inner, .. } => inner,
            // TerminalSite is only constructed around Suspend nodes.
            other => other,
        }
    }
}

/// All exit points of `body` when every one of them is a lone terminal
/// suspension; `None` when any exit is not, or the shape is unsupported.
pub fn terminal_sites(body: &FnBody) -> Option<Vec<TerminalSite<'_>>> {
    match body {
        FnBody::Expr(expr) => match expr {
            Expr::Suspend { .. } => Some(vec![TerminalSite {
                stmt: None,
                suspension: expr,
            }]),
            _ => None,
        },
        FnBody::Block(stmts) => {
            let returns = own_returns(stmts);
            if !returns.is_empty() {
                return return_sites(returns);
            }
            // No returns: the body's last statement is the only exit.
            let last = stmts.last()?;
            match last {
                Stmt::Expr { expr, .. } if matches!(expr, Expr::Suspend { .. }) => {
                    Some(vec![TerminalSite {
                        stmt: Some(last),
                        suspension: expr,
                    }])
                }
                Stmt::If { .. } => chain_sites(last),
                _ => None,
            }
        }
    }
}

fn return_sites(returns: Vec<&Stmt>) -> Option<Vec<TerminalSite<'_>>> {
    let mut sites = Vec::with_capacity(returns.len());
    for stmt in returns {
        match stmt {
            Stmt::Return {
                value: Some(expr), ..
            } if matches!(expr, Expr::Suspend { .. }) => sites.push(TerminalSite {
                stmt: Some(stmt),
                suspension: expr,
            }),
            _ => return None,
        }
    }
    Some(sites)
}

/// Terminal sites of an exhaustive if/else-if/else chain. Every branch
/// must end in a lone fire-and-forget suspension; a single branch with a
/// second suspension, or a missing else, disqualifies the whole chain.
fn chain_sites(stmt: &Stmt) -> Option<Vec<TerminalSite<'_>>> {
    let Stmt::If {
        then_branch,
        else_branch,
        ..
    } = stmt
    else {
        return None;
    };

    let mut sites = branch_site(then_branch).map(|s| vec![s])?;

    let els = else_branch.as_ref()?;
    // `else if` arrives as an else branch holding a single nested chain.
    if let [nested @ Stmt::If { .. }] = els.as_slice() {
        sites.extend(chain_sites(nested)?);
    } else {
        sites.push(branch_site(els)?);
    }
    Some(sites)
}

fn branch_site(branch: &[Stmt]) -> Option<TerminalSite<'_>> {
    if count_suspensions(branch) != 1 {
        return None;
    }
    let last = branch.last()?;
    match last {
        Stmt::Expr { expr, .. } if matches!(expr, Expr::Suspend { .. }) => Some(TerminalSite {
            stmt: Some(last),
            suspension: expr,
        }),
        _ => None,
    }
}

fn count_suspensions(stmts: &[Stmt]) -> usize {
    let mut count = 0;
    for_each_expr(stmts, Nested::Skip, &mut |e| {
        if matches!(e, Expr::Suspend { .. }) {
            count += 1;
        }
    });
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ast::ResultShape;
    use crate::model::build::AstBuilder;

    fn suspend_stmt(b: &mut AstBuilder, name: &str) -> Stmt {
        let target = b.ident(name);
        let call = b.method_call(target, "send", vec![]);
        let susp = b.suspend(call);
        b.expr_stmt(susp)
    }

    #[test]
    fn final_fire_and_forget_statement_is_terminal() {
        let mut b = AstBuilder::new();
        let work = b.ident("prepare");
        let prep = b.expr_stmt(work);
        let last = suspend_stmt(&mut b, "queue");
        let func = b
            .func("flush")
            .asynchronous()
            .result(ResultShape::Future)
            .block(vec![prep, last]);

        let sites = terminal_sites(&func.body).unwrap();
        assert_eq!(sites.len(), 1);
    }

    #[test]
    fn if_without_else_never_qualifies() {
        let mut b = AstBuilder::new();
        let cond = b.ident("fast");
        let arm = suspend_stmt(&mut b, "queue");
        let chain = b.if_stmt(cond, vec![arm], None);
        let func = b.func("flush").asynchronous().block(vec![chain]);
        assert!(terminal_sites(&func.body).is_none());
    }

    #[test]
    fn exhaustive_chain_yields_one_site_per_branch() {
        let mut b = AstBuilder::new();
        let a = suspend_stmt(&mut b, "primary");
        let bstmt = suspend_stmt(&mut b, "secondary");
        let c = suspend_stmt(&mut b, "fallback");
        let cond2 = b.ident("warm");
        let inner = b.if_stmt(cond2, vec![bstmt], Some(vec![c]));
        let cond1 = b.ident("hot");
        let chain = b.if_stmt(cond1, vec![a], Some(vec![inner]));
        let func = b.func("route").asynchronous().block(vec![chain]);

        let sites = terminal_sites(&func.body).unwrap();
        assert_eq!(sites.len(), 3);
    }

    #[test]
    fn branch_with_two_suspensions_disqualifies_the_chain() {
        let mut b = AstBuilder::new();
        let extra = suspend_stmt(&mut b, "primary");
        let a = suspend_stmt(&mut b, "primary");
        let other = suspend_stmt(&mut b, "fallback");
        let cond = b.ident("hot");
        let chain = b.if_stmt(cond, vec![extra, a], Some(vec![other]));
        let func = b.func("route").asynchronous().block(vec![chain]);
        assert!(terminal_sites(&func.body).is_none());
    }

    #[test]
    fn non_suspend_return_disqualifies() {
        let mut b = AstBuilder::new();
        let value = b.ident("cached");
        let early = b.ret(value);
        let target = b.ident("queue");
        let call = b.method_call(target, "send", vec![]);
        let susp = b.suspend(call);
        let tail = b.ret(susp);
        let cond = b.ident("hit");
        let guard = b.if_stmt(cond, vec![early], None);
        let func = b.func("lookup").asynchronous().block(vec![guard, tail]);
        assert!(terminal_sites(&func.body).is_none());
    }
}
