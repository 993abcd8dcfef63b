//! Construction helpers for the program tree.
//!
//! Hosts translate their parsed representation into the model through an
//! [`AstBuilder`], which hands out fresh node ids in construction order.
//! The same builder backs the crate's own tests.

use crate::model::ast::{
    ClosureBody, DisposalDeclarator, Expr, FnBody, FunctionDecl, NodeId, Param, Program,
    ResultShape, Stmt, TypeRef,
};

#[derive(Debug, Default)]
pub struct AstBuilder {
    next_id: u32,
}

impl AstBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fresh_id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    // Expressions

    pub fn ident(&mut self, name: impl Into<String>) -> Expr {
        Expr::Ident {
            id: self.fresh_id(),
            name: name.into(),
        }
    }

    pub fn int(&mut self, value: i64) -> Expr {
        Expr::IntLit {
            id: self.fresh_id(),
            value,
        }
    }

    pub fn member(&mut self, recv: Expr, name: impl Into<String>) -> Expr {
        Expr::Member {
            id: self.fresh_id(),
            recv: Box::new(recv),
            name: name.into(),
        }
    }

    pub fn call(&mut self, callee: Expr, args: Vec<Expr>) -> Expr {
        Expr::Call {
            id: self.fresh_id(),
            callee: Box::new(callee),
            args,
        }
    }

    /// `recv.name(args)`, the common method-invocation shape.
    pub fn method_call(&mut self, recv: Expr, name: impl Into<String>, args: Vec<Expr>) -> Expr {
        let callee = self.member(recv, name);
        self.call(callee, args)
    }

    /// `name(args)`, a free-function invocation.
    pub fn free_call(&mut self, name: impl Into<String>, args: Vec<Expr>) -> Expr {
        let callee = self.ident(name);
        self.call(callee, args)
    }

    pub fn suspend(&mut self, inner: Expr) -> Expr {
        Expr::Suspend {
            id: self.fresh_id(),
            inner: Box::new(inner),
        }
    }

    pub fn closure(&mut self, is_async: bool, body: ClosureBody) -> Expr {
        Expr::Closure {
            id: self.fresh_id(),
            is_async,
            params: Vec::new(),
            body,
        }
    }

    // Statements

    pub fn local(&mut self, name: impl Into<String>, value: Expr) -> Stmt {
        Stmt::Local {
            id: self.fresh_id(),
            name: name.into(),
            value: Some(value),
            disposal: false,
        }
    }

    /// Trailing-declaration disposal binding: live through the remaining
    /// statements of the containing block.
    pub fn disposal_local(&mut self, name: impl Into<String>, value: Option<Expr>) -> Stmt {
        Stmt::Local {
            id: self.fresh_id(),
            name: name.into(),
            value,
            disposal: true,
        }
    }

    pub fn assign(&mut self, target: impl Into<String>, value: Expr) -> Stmt {
        Stmt::Assign {
            id: self.fresh_id(),
            target: target.into(),
            value,
        }
    }

    pub fn expr_stmt(&mut self, expr: Expr) -> Stmt {
        Stmt::Expr {
            id: self.fresh_id(),
            expr,
        }
    }

    pub fn ret(&mut self, value: Expr) -> Stmt {
        Stmt::Return {
            id: self.fresh_id(),
            value: Some(value),
        }
    }

    pub fn ret_none(&mut self) -> Stmt {
        Stmt::Return {
            id: self.fresh_id(),
            value: None,
        }
    }

    pub fn if_stmt(
        &mut self,
        cond: Expr,
        then_branch: Vec<Stmt>,
        else_branch: Option<Vec<Stmt>>,
    ) -> Stmt {
        Stmt::If {
            id: self.fresh_id(),
            cond,
            then_branch,
            else_branch,
        }
    }

    pub fn while_stmt(&mut self, cond: Expr, body: Vec<Stmt>) -> Stmt {
        Stmt::While {
            id: self.fresh_id(),
            cond,
            body,
        }
    }

    pub fn for_each(&mut self, var: impl Into<String>, iterable: Expr, body: Vec<Stmt>) -> Stmt {
        Stmt::ForEach {
            id: self.fresh_id(),
            var: var.into(),
            iterable,
            body,
            suspended: false,
        }
    }

    pub fn suspended_for_each(
        &mut self,
        var: impl Into<String>,
        iterable: Expr,
        body: Vec<Stmt>,
    ) -> Stmt {
        Stmt::ForEach {
            id: self.fresh_id(),
            var: var.into(),
            iterable,
            body,
            suspended: true,
        }
    }

    /// Block-form disposal scope with a single binding.
    pub fn disposal_scope(
        &mut self,
        name: impl Into<String>,
        init: Expr,
        body: Vec<Stmt>,
    ) -> Stmt {
        Stmt::Disposal {
            id: self.fresh_id(),
            bindings: vec![DisposalDeclarator {
                name: name.into(),
                init: Some(init),
            }],
            body,
        }
    }

    pub fn disposal_scope_multi(
        &mut self,
        bindings: Vec<DisposalDeclarator>,
        body: Vec<Stmt>,
    ) -> Stmt {
        Stmt::Disposal {
            id: self.fresh_id(),
            bindings,
            body,
        }
    }

    pub fn try_stmt(&mut self, body: Vec<Stmt>, handler: Vec<Stmt>) -> Stmt {
        Stmt::Try {
            id: self.fresh_id(),
            body,
            handler,
            finalizer: Vec::new(),
        }
    }

    pub fn local_fn(&mut self, func: FunctionDecl) -> Stmt {
        Stmt::LocalFn {
            id: self.fresh_id(),
            func: Box::new(func),
        }
    }

    // Declarations

    pub fn func(&mut self, name: impl Into<String>) -> FunctionBuilder<'_> {
        FunctionBuilder {
            builder: self,
            name: name.into(),
            owner: None,
            params: Vec::new(),
            result: ResultShape::None,
            is_async: false,
            is_test: false,
        }
    }

    pub fn program(&mut self, functions: Vec<FunctionDecl>) -> Program {
        Program { functions }
    }
}

pub struct FunctionBuilder<'a> {
    builder: &'a mut AstBuilder,
    name: String,
    owner: Option<String>,
    params: Vec<Param>,
    result: ResultShape,
    is_async: bool,
    is_test: bool,
}

impl FunctionBuilder<'_> {
    pub fn owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    pub fn param(mut self, name: impl Into<String>, ty: impl Into<String>) -> Self {
        self.params.push(Param {
            name: name.into(),
            ty: TypeRef::new(ty),
        });
        self
    }

    pub fn result(mut self, shape: ResultShape) -> Self {
        self.result = shape;
        self
    }

    pub fn asynchronous(mut self) -> Self {
        self.is_async = true;
        self
    }

    pub fn test_method(mut self) -> Self {
        self.is_test = true;
        self
    }

    pub fn block(self, stmts: Vec<Stmt>) -> FunctionDecl {
        self.finish(FnBody::Block(stmts))
    }

    pub fn expr_body(self, expr: Expr) -> FunctionDecl {
        self.finish(FnBody::Expr(expr))
    }

    fn finish(self, body: FnBody) -> FunctionDecl {
        FunctionDecl {
            id: self.builder.fresh_id(),
            name: self.name,
            owner: self.owner,
            params: self.params,
            result: self.result,
            is_async: self.is_async,
            is_test: self.is_test,
            body,
        }
    }
}
