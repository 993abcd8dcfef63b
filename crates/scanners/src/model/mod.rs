//! Program Model facade.
//!
//! A read-only view of one parsed, semantically resolved program: the
//! tagged-variant tree ([`ast`]), per-query lexical scope chains
//! ([`scope`]), the injected semantic oracle ([`oracle`]), and the shared
//! read-accessed-names data-flow query ([`dataflow`]). Everything here is
//! immutable after construction and safe for concurrent reads.

pub mod ast;
pub mod build;
pub mod dataflow;
pub mod oracle;
pub mod scope;

pub use ast::{Expr, FnBody, FunctionDecl, NodeId, Program, ResultShape, Stmt, TypeRef};
pub use build::AstBuilder;
pub use oracle::{
    FutureFlavor, FutureShape, MethodResult, MethodSym, OracleError, OracleResult, PropertySym,
    SemanticOracle, TableOracle,
};
pub use scope::{ScopeChain, ScopeFrame};
