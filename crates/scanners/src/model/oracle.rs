//! Injected semantic-resolution oracle.
//!
//! The engine never parses or type-checks source itself; symbol binding,
//! type lookup, and conversion classification come from the host through
//! this trait. Implementations must be safe for concurrent read-only use.
//!
//! Query outcomes follow the failure taxonomy: an unresolvable symbol is
//! `Ok(None)` (the detector cannot prove safety and stays silent); an
//! internal host failure is `Err(OracleError::Internal)` and is caught at
//! each detector's boundary, suppressing that site only.

use crate::model::ast::{NodeId, TypeRef};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

pub type OracleResult<T> = Result<T, OracleError>;

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("semantic oracle internal failure: {0}")]
    Internal(String),
}

/// The two future flavors. No implicit conversion exists between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FutureFlavor {
    Heap,
    Inline,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FutureShape {
    pub flavor: FutureFlavor,
    /// The produced value type; `None` for the non-generic future.
    pub value: Option<TypeRef>,
}

impl FutureShape {
    pub fn heap(value: Option<TypeRef>) -> Self {
        Self {
            flavor: FutureFlavor::Heap,
            value,
        }
    }

    pub fn inline(value: Option<TypeRef>) -> Self {
        Self {
            flavor: FutureFlavor::Inline,
            value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodResult {
    Void,
    Value(TypeRef),
    Future(FutureShape),
}

#[derive(Debug, Clone)]
pub struct ParamSym {
    pub ty: TypeRef,
    pub optional: bool,
}

#[derive(Debug, Clone)]
pub struct MethodSym {
    pub name: String,
    pub declaring_type: TypeRef,
    pub result: MethodResult,
    pub params: Vec<ParamSym>,
    pub type_params: usize,
    pub is_virtual: bool,
    pub is_abstract: bool,
    pub is_deprecated: bool,
    /// Marker attribute: callers of this method are allowed to block on
    /// the produced future.
    pub blocks_caller: bool,
    /// Declared in the platform's core libraries; only those participate
    /// in asynchronous-equivalent resolution.
    pub core_library: bool,
}

impl MethodSym {
    pub fn new(name: impl Into<String>, declaring_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declaring_type: TypeRef::new(declaring_type),
            result: MethodResult::Void,
            params: Vec::new(),
            type_params: 0,
            is_virtual: false,
            is_abstract: false,
            is_deprecated: false,
            blocks_caller: false,
            core_library: false,
        }
    }

    pub fn with_result(mut self, result: MethodResult) -> Self {
        self.result = result;
        self
    }

    pub fn returning_future(self, shape: FutureShape) -> Self {
        self.with_result(MethodResult::Future(shape))
    }

    pub fn with_param(mut self, ty: impl Into<String>, optional: bool) -> Self {
        self.params.push(ParamSym {
            ty: TypeRef::new(ty),
            optional,
        });
        self
    }

    pub fn core(mut self) -> Self {
        self.core_library = true;
        self
    }

    pub fn virtual_member(mut self) -> Self {
        self.is_virtual = true;
        self
    }

    pub fn deprecated(mut self) -> Self {
        self.is_deprecated = true;
        self
    }

    pub fn blocking_allowed(mut self) -> Self {
        self.blocks_caller = true;
        self
    }

    pub fn future_result(&self) -> Option<&FutureShape> {
        match &self.result {
            MethodResult::Future(shape) => Some(shape),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PropertySym {
    pub name: String,
    pub declaring_type: TypeRef,
}

pub trait SemanticOracle: Send + Sync {
    /// Method symbol for a call expression, `Ok(None)` when unresolved.
    fn resolve_call(&self, call: NodeId) -> OracleResult<Option<MethodSym>>;

    /// Property symbol for a member-access expression.
    fn resolve_property(&self, member: NodeId) -> OracleResult<Option<PropertySym>>;

    /// Static type of an expression, or the declared type of a binding
    /// node.
    fn expr_type(&self, expr: NodeId) -> OracleResult<Option<TypeRef>>;

    /// True when the expression's value undergoes an implicit conversion
    /// to a different target type at its use site.
    fn is_implicit_conversion(&self, expr: NodeId) -> OracleResult<bool>;

    /// Future classification of a type; `None` for non-future types.
    fn future_shape(&self, ty: &TypeRef) -> Option<FutureShape>;

    /// Result of the invocation member of a delegate type.
    fn delegate_result(&self, ty: &TypeRef) -> OracleResult<Option<MethodResult>>;

    /// Members named `name` on `receiver`, reduced extension members
    /// included.
    fn lookup_members(&self, receiver: &TypeRef, name: &str) -> OracleResult<Vec<MethodSym>>;
}

/// Table-backed oracle. Hosts without a live semantic service, and the
/// crate's own tests, populate it per snapshot; queries not present in a
/// table resolve to "unknown", and poisoned nodes raise an internal
/// failure like a misbehaving host service would.
#[derive(Default)]
pub struct TableOracle {
    calls: HashMap<NodeId, MethodSym>,
    properties: HashMap<NodeId, PropertySym>,
    types: HashMap<NodeId, TypeRef>,
    implicit_conversions: HashSet<NodeId>,
    future_types: HashMap<String, FutureShape>,
    delegates: HashMap<String, MethodResult>,
    members: HashMap<(String, String), Vec<MethodSym>>,
    poisoned: HashSet<NodeId>,
}

impl TableOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_call(&mut self, call: NodeId, sym: MethodSym) {
        self.calls.insert(call, sym);
    }

    pub fn set_property(&mut self, member: NodeId, sym: PropertySym) {
        self.properties.insert(member, sym);
    }

    pub fn set_type(&mut self, node: NodeId, ty: impl Into<String>) {
        self.types.insert(node, TypeRef::new(ty));
    }

    pub fn set_implicit_conversion(&mut self, node: NodeId) {
        self.implicit_conversions.insert(node);
    }

    pub fn set_future_type(&mut self, name: impl Into<String>, shape: FutureShape) {
        self.future_types.insert(name.into(), shape);
    }

    pub fn set_delegate(&mut self, name: impl Into<String>, result: MethodResult) {
        self.delegates.insert(name.into(), result);
    }

    pub fn add_member(&mut self, receiver: impl Into<String>, sym: MethodSym) {
        self.members
            .entry((receiver.into(), sym.name.clone()))
            .or_default()
            .push(sym);
    }

    /// Any query touching this node raises `OracleError::Internal`.
    pub fn poison(&mut self, node: NodeId) {
        self.poisoned.insert(node);
    }

    fn check(&self, node: NodeId) -> OracleResult<()> {
        if self.poisoned.contains(&node) {
            return Err(OracleError::Internal(format!(
                "flow analysis failed at node {}",
                node.0
            )));
        }
        Ok(())
    }
}

impl SemanticOracle for TableOracle {
    fn resolve_call(&self, call: NodeId) -> OracleResult<Option<MethodSym>> {
        self.check(call)?;
        Ok(self.calls.get(&call).cloned())
    }

    fn resolve_property(&self, member: NodeId) -> OracleResult<Option<PropertySym>> {
        self.check(member)?;
        Ok(self.properties.get(&member).cloned())
    }

    fn expr_type(&self, expr: NodeId) -> OracleResult<Option<TypeRef>> {
        self.check(expr)?;
        Ok(self.types.get(&expr).cloned())
    }

    fn is_implicit_conversion(&self, expr: NodeId) -> OracleResult<bool> {
        self.check(expr)?;
        Ok(self.implicit_conversions.contains(&expr))
    }

    fn future_shape(&self, ty: &TypeRef) -> Option<FutureShape> {
        self.future_types.get(ty.name()).cloned()
    }

    fn delegate_result(&self, ty: &TypeRef) -> OracleResult<Option<MethodResult>> {
        Ok(self.delegates.get(ty.name()).cloned())
    }

    fn lookup_members(&self, receiver: &TypeRef, name: &str) -> OracleResult<Vec<MethodSym>> {
        Ok(self
            .members
            .get(&(receiver.name().to_string(), name.to_string()))
            .cloned()
            .unwrap_or_default())
    }
}
