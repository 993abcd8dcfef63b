//! Rewrite plans for proved-safe findings.
//!
//! The engine never touches source text; it emits node-addressed edit
//! templates the host expands against its own syntax tree. A template may
//! splice other nodes in:
//!
//! * `$node(N)`: the source text of node `N`;
//! * `$rename(N, name)`: node `N` with its member or callee name
//!   replaced by `name`;
//! * `$drop_async_qualifier` / `$widen_result`: declaration-level
//!   directives on the edited node.
//!
//! Only findings a detector marked safe produce a plan; report-only
//! findings propose nothing.

use crate::core::{Finding, ReplacementHint};
use crate::model::ast::NodeId;
use serde::{Deserialize, Serialize};

/// Replace the source text of `node` by the expanded `template`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Edit {
    pub node: NodeId,
    pub template: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RewritePlan {
    pub rule_id: String,
    pub edits: Vec<Edit>,
}

#[derive(Debug, Default)]
pub struct RewriteProposer;

impl RewriteProposer {
    pub fn new() -> Self {
        Self
    }

    pub fn propose(&self, finding: &Finding) -> Option<RewritePlan> {
        if !finding.safe {
            return None;
        }
        match finding.replacement.as_ref()? {
            ReplacementHint::DropAsyncQualifier {
                function,
                substitutions,
                widen_result,
            } => {
                let mut edits = vec![Edit {
                    node: *function,
                    template: "$drop_async_qualifier".to_string(),
                }];
                if *widen_result {
                    edits.push(Edit {
                        node: *function,
                        template: "$widen_result".to_string(),
                    });
                }
                for sub in substitutions {
                    edits.push(Edit {
                        node: sub.suspension,
                        template: format!("$node({})", sub.inner.0),
                    });
                }
                Some(RewritePlan {
                    rule_id: "remove-async-qualifier".to_string(),
                    edits,
                })
            }
            ReplacementHint::SuspendOnAsyncEquivalent {
                call,
                replacement,
                needs_parens,
            } => {
                let suspended = format!("suspend($rename({}, {replacement}))", call.0);
                let template = if *needs_parens {
                    format!("({suspended})")
                } else {
                    suspended
                };
                Some(RewritePlan {
                    rule_id: "suspend-on-async-equivalent".to_string(),
                    edits: vec![Edit {
                        node: *call,
                        template,
                    }],
                })
            }
        }
    }
}
