//! Async function classification.
//!
//! Collects the suspension set belonging to a declaration (suspensions
//! under nested closures or local functions are excluded; those closures
//! are analyzed independently) and evaluates the global disqualifiers the
//! flow-sensitive detectors share.

use crate::model::ast::{
    FnBody, FunctionDecl, Nested, Stmt, for_each_stmt, own_suspensions, Expr,
};

/// Suffix marking an event-notification payload parameter type.
const EVENT_PAYLOAD_SUFFIX: &str = "EventArgs";

/// The untyped state-object parameter convention.
const STATE_OBJECT_TYPE: &str = "object";

pub struct AsyncFnInfo<'a> {
    pub func: &'a FunctionDecl,
    /// Suspension expressions owned by this declaration, in textual order.
    pub suspensions: Vec<&'a Expr>,
}

/// Classifies `func` when it is asynchronous; `None` otherwise.
pub fn classify(func: &FunctionDecl) -> Option<AsyncFnInfo<'_>> {
    if !func.is_async {
        return None;
    }
    Some(AsyncFnInfo {
        func,
        suspensions: own_suspensions(&func.body),
    })
}

/// Event-handler convention: any parameter whose type name carries the
/// event-payload suffix.
pub fn has_event_payload_param(func: &FunctionDecl) -> bool {
    func.params.iter().any(|p| {
        p.ty.name()
            .to_ascii_lowercase()
            .ends_with(&EVENT_PAYLOAD_SUFFIX.to_ascii_lowercase())
    })
}

/// Callback convention: exactly one untyped state parameter.
pub fn has_state_object_param(func: &FunctionDecl) -> bool {
    func.params.len() == 1 && func.params[0].ty.name() == STATE_OBJECT_TYPE
}

/// True when any suspension-bearing iteration construct appears anywhere
/// under the declaration, nested closures included. Such a loop cannot be
/// expressed without the async qualifier, so it disqualifies removal even
/// when its own suspensions are excluded from the outer count.
pub fn has_suspended_iteration(func: &FunctionDecl) -> bool {
    let stmts = match &func.body {
        FnBody::Block(stmts) => stmts,
        FnBody::Expr(_) => return false,
    };
    let mut found = false;
    for_each_stmt(stmts, Nested::Enter, &mut |s| {
        if matches!(s, Stmt::ForEach { suspended: true, .. }) {
            found = true;
        }
    });
    found
}

/// Names bound by trailing-declaration disposal bindings in this function.
/// Block-form disposal scopes are handled through scope chains instead.
pub fn trailing_disposal_names(func: &FunctionDecl) -> Vec<String> {
    let mut names = Vec::new();
    for_each_stmt(func.body.stmts(), Nested::Skip, &mut |s| {
        if let Stmt::Local {
            name,
            disposal: true,
            ..
        } = s
        {
            names.push(name.clone());
        }
    });
    names
}
