//! Read-only program tree.
//!
//! The host's parser hands the engine one immutable [`Program`] per
//! analysis snapshot. Node kinds are closed tagged variants so every
//! detector can pattern-match exhaustively; semantic questions (symbols,
//! types, conversions) go through the injected oracle instead of living on
//! the tree.

use serde::{Deserialize, Serialize};

/// Stable identity of one tree node within a snapshot. The host maps ids
/// back to source spans when rendering findings or applying edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

/// An opaque, name-comparable reference to a type known to the oracle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeRef(String);

impl TypeRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

/// Declared result shape of a function. The two future flavors (heap and
/// inline) have no implicit conversion between them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultShape {
    None,
    Future,
    FutureOf(TypeRef),
    InlineFuture,
    InlineFutureOf(TypeRef),
}

impl ResultShape {
    pub fn is_inline(&self) -> bool {
        matches!(self, Self::InlineFuture | Self::InlineFutureOf(_))
    }
}

#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub ty: TypeRef,
}

#[derive(Debug)]
pub struct Program {
    pub functions: Vec<FunctionDecl>,
}

impl Program {
    pub fn function(&self, name: &str) -> Option<&FunctionDecl> {
        self.functions.iter().find(|f| f.name == name)
    }
}

#[derive(Debug)]
pub struct FunctionDecl {
    pub id: NodeId,
    pub name: String,
    /// Enclosing type, when the function is a member.
    pub owner: Option<String>,
    pub params: Vec<Param>,
    pub result: ResultShape,
    pub is_async: bool,
    pub is_test: bool,
    pub body: FnBody,
}

#[derive(Debug)]
pub enum FnBody {
    Block(Vec<Stmt>),
    Expr(Expr),
}

impl FnBody {
    pub fn stmts(&self) -> &[Stmt] {
        match self {
            FnBody::Block(stmts) => stmts,
            FnBody::Expr(_) => &[],
        }
    }
}

#[derive(Debug)]
pub struct DisposalDeclarator {
    pub name: String,
    pub init: Option<Expr>,
}

#[derive(Debug)]
pub enum Stmt {
    /// Local binding. `disposal == true` is the trailing-declaration
    /// disposal form: the binding stays live through the remaining sibling
    /// statements of the containing block.
    Local {
        id: NodeId,
        name: String,
        value: Option<Expr>,
        disposal: bool,
    },
    Assign {
        id: NodeId,
        target: String,
        value: Expr,
    },
    Expr {
        id: NodeId,
        expr: Expr,
    },
    Return {
        id: NodeId,
        value: Option<Expr>,
    },
    If {
        id: NodeId,
        cond: Expr,
        then_branch: Vec<Stmt>,
        else_branch: Option<Vec<Stmt>>,
    },
    While {
        id: NodeId,
        cond: Expr,
        body: Vec<Stmt>,
    },
    /// `suspended == true` marks the suspension-bearing iteration form
    /// (each step awaits the producer).
    ForEach {
        id: NodeId,
        var: String,
        iterable: Expr,
        body: Vec<Stmt>,
        suspended: bool,
    },
    /// Block-form disposal scope: resources released when the body exits.
    Disposal {
        id: NodeId,
        bindings: Vec<DisposalDeclarator>,
        body: Vec<Stmt>,
    },
    Try {
        id: NodeId,
        body: Vec<Stmt>,
        handler: Vec<Stmt>,
        finalizer: Vec<Stmt>,
    },
    /// Nested function declaration; analyzed independently of the
    /// enclosing function.
    LocalFn {
        id: NodeId,
        func: Box<FunctionDecl>,
    },
}

impl Stmt {
    pub fn id(&self) -> NodeId {
        match self {
            Stmt::Local { id, .. }
            | Stmt::Assign { id, .. }
            | Stmt::Expr { id, .. }
            | Stmt::Return { id, .. }
            | Stmt::If { id, .. }
            | Stmt::While { id, .. }
            | Stmt::ForEach { id, .. }
            | Stmt::Disposal { id, .. }
            | Stmt::Try { id, .. }
            | Stmt::LocalFn { id, .. } => *id,
        }
    }

    /// The expressions directly owned by this statement, not those of
    /// nested statements.
    pub fn top_exprs(&self) -> Vec<&Expr> {
        match self {
            Stmt::Local { value, .. } => value.iter().collect(),
            Stmt::Assign { value, .. } => vec![value],
            Stmt::Expr { expr, .. } => vec![expr],
            Stmt::Return { value, .. } => value.iter().collect(),
            Stmt::If { cond, .. } => vec![cond],
            Stmt::While { cond, .. } => vec![cond],
            Stmt::ForEach { iterable, .. } => vec![iterable],
            Stmt::Disposal { bindings, .. } => {
                bindings.iter().filter_map(|b| b.init.as_ref()).collect()
            }
            Stmt::Try { .. } | Stmt::LocalFn { .. } => Vec::new(),
        }
    }

    /// Nested statement lists (branch bodies, loop bodies, scope bodies).
    /// Closure and local-function bodies are not included; those belong to
    /// a different analysis boundary.
    pub fn sub_lists(&self) -> Vec<&[Stmt]> {
        match self {
            Stmt::If {
                then_branch,
                else_branch,
                ..
            } => {
                let mut lists = vec![then_branch.as_slice()];
                if let Some(els) = else_branch {
                    lists.push(els.as_slice());
                }
                lists
            }
            Stmt::While { body, .. } | Stmt::ForEach { body, .. } | Stmt::Disposal { body, .. } => {
                vec![body.as_slice()]
            }
            Stmt::Try {
                body,
                handler,
                finalizer,
                ..
            } => vec![body.as_slice(), handler.as_slice(), finalizer.as_slice()],
            _ => Vec::new(),
        }
    }
}

#[derive(Debug)]
pub enum Expr {
    Ident {
        id: NodeId,
        name: String,
    },
    IntLit {
        id: NodeId,
        value: i64,
    },
    /// Property or field access `recv.name`.
    Member {
        id: NodeId,
        recv: Box<Expr>,
        name: String,
    },
    Call {
        id: NodeId,
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    /// Wait for the inner future and yield its result.
    Suspend {
        id: NodeId,
        inner: Box<Expr>,
    },
    Closure {
        id: NodeId,
        is_async: bool,
        params: Vec<String>,
        body: ClosureBody,
    },
}

#[derive(Debug)]
pub enum ClosureBody {
    Expr(Box<Expr>),
    Block(Vec<Stmt>),
}

impl Expr {
    pub fn id(&self) -> NodeId {
        match self {
            Expr::Ident { id, .. }
            | Expr::IntLit { id, .. }
            | Expr::Member { id, .. }
            | Expr::Call { id, .. }
            | Expr::Suspend { id, .. }
            | Expr::Closure { id, .. } => *id,
        }
    }

    pub fn as_ident(&self) -> Option<&str> {
        match self {
            Expr::Ident { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Callee name for calls of the `recv.name(..)` or `name(..)` form.
    pub fn callee_name(&self) -> Option<&str> {
        match self {
            Expr::Call { callee, .. } => match callee.as_ref() {
                Expr::Member { name, .. } => Some(name),
                Expr::Ident { name, .. } => Some(name),
                _ => None,
            },
            _ => None,
        }
    }
}

/// Name of the no-op continuation-configuration adapter. Awaiting
/// `e.configure(..)` is behaviorally `await e` for rewrite purposes, so
/// type-compatibility checks strip the suffix first.
pub const CONTINUATION_ADAPTER: &str = "configure";

/// Strips trailing `configure(..)` adapter calls from a future-producing
/// expression.
pub fn strip_continuation_adapter(expr: &Expr) -> &Expr {
    let mut current = expr;
    while let Expr::Call { callee, .. } = current {
        match callee.as_ref() {
            Expr::Member { recv, name, .. } if name == CONTINUATION_ADAPTER => {
                current = recv;
            }
            _ => break,
        }
    }
    current
}

/// Whether a traversal descends into closure and local-function bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nested {
    Enter,
    Skip,
}

/// Pre-order visit of every expression under `stmts`.
pub fn for_each_expr<'a>(stmts: &'a [Stmt], nested: Nested, f: &mut dyn FnMut(&'a Expr)) {
    for stmt in stmts {
        if let Stmt::LocalFn { func, .. } = stmt {
            if nested == Nested::Enter {
                for_each_expr_in_body(&func.body, nested, f);
            }
            continue;
        }
        for expr in stmt.top_exprs() {
            for_each_expr_in_expr(expr, nested, f);
        }
        for list in stmt.sub_lists() {
            for_each_expr(list, nested, f);
        }
    }
}

pub fn for_each_expr_in_body<'a>(body: &'a FnBody, nested: Nested, f: &mut dyn FnMut(&'a Expr)) {
    match body {
        FnBody::Block(stmts) => for_each_expr(stmts, nested, f),
        FnBody::Expr(expr) => for_each_expr_in_expr(expr, nested, f),
    }
}

pub fn for_each_expr_in_expr<'a>(expr: &'a Expr, nested: Nested, f: &mut dyn FnMut(&'a Expr)) {
    f(expr);
    match expr {
        Expr::Ident { .. } | Expr::IntLit { .. } => {}
        Expr::Member { recv, .. } => for_each_expr_in_expr(recv, nested, f),
        Expr::Call { callee, args, .. } => {
            for_each_expr_in_expr(callee, nested, f);
            for arg in args {
                for_each_expr_in_expr(arg, nested, f);
            }
        }
        Expr::Suspend { inner, .. } => for_each_expr_in_expr(inner, nested, f),
        Expr::Closure { body, .. } => {
            if nested == Nested::Enter {
                match body {
                    ClosureBody::Expr(e) => for_each_expr_in_expr(e, nested, f),
                    ClosureBody::Block(stmts) => for_each_expr(stmts, nested, f),
                }
            }
        }
    }
}

/// Pre-order visit of every statement under `stmts`.
pub fn for_each_stmt<'a>(stmts: &'a [Stmt], nested: Nested, f: &mut dyn FnMut(&'a Stmt)) {
    for stmt in stmts {
        f(stmt);
        for list in stmt.sub_lists() {
            for_each_stmt(list, nested, f);
        }
        if nested == Nested::Enter {
            match stmt {
                Stmt::LocalFn { func, .. } => {
                    if let FnBody::Block(inner) = &func.body {
                        for_each_stmt(inner, nested, f);
                    }
                }
                _ => {
                    for expr in stmt.top_exprs() {
                        for_each_expr_in_expr(expr, Nested::Skip, &mut |e| {
                            if let Expr::Closure {
                                body: ClosureBody::Block(inner),
                                ..
                            } = e
                            {
                                for_each_stmt(inner, nested, f);
                            }
                        });
                    }
                }
            }
        }
    }
}

/// Suspension expressions belonging to this function: those not nested
/// inside a closure or local function, which are analyzed independently.
pub fn own_suspensions(body: &FnBody) -> Vec<&Expr> {
    let mut suspensions = Vec::new();
    for_each_expr_in_body(body, Nested::Skip, &mut |e| {
        if matches!(e, Expr::Suspend { .. }) {
            suspensions.push(e);
        }
    });
    suspensions
}

/// Return statements belonging to this function (closures excluded).
pub fn own_returns(stmts: &[Stmt]) -> Vec<&Stmt> {
    let mut returns = Vec::new();
    for_each_stmt(stmts, Nested::Skip, &mut |s| {
        if matches!(s, Stmt::Return { .. }) {
            returns.push(s);
        }
    });
    returns
}

/// True when any identifier named `name` occurs under `expr`, including
/// inside closure literals.
pub fn mentions_ident(expr: &Expr, name: &str) -> bool {
    let mut found = false;
    for_each_expr_in_expr(expr, Nested::Enter, &mut |e| {
        if let Expr::Ident { name: n, .. } = e {
            if n == name {
                found = true;
            }
        }
    });
    found
}
