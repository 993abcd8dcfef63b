use crate::core::{Confidence, Severity};
use crate::model::ast::NodeId;
use serde::{Deserialize, Serialize};

/// A position inside the analyzed program: the enclosing declaration plus
/// the node the finding points at. Spans are the host's concern; the host
/// resolves a `NodeId` back to source text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Location {
    pub function: String,
    pub node: NodeId,
}

impl Location {
    pub fn new(function: impl Into<String>, node: NodeId) -> Self {
        Self {
            function: function.into(),
            node,
        }
    }
}

/// Machine-readable description of the rewrite a safe finding licenses.
/// Consumed by the rewrite proposer; carries node identities, never text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ReplacementHint {
    /// Remove the async qualifier and substitute each terminal suspension
    /// by its inner future-producing expression.
    DropAsyncQualifier {
        function: NodeId,
        substitutions: Vec<Substitution>,
        /// The declared result must widen from no-result to `Future`.
        widen_result: bool,
    },
    /// Replace a blocking call by its asynchronous equivalent, wrapped in a
    /// suspension expression.
    SuspendOnAsyncEquivalent {
        call: NodeId,
        replacement: String,
        /// The call is itself the receiver of a member access and the
        /// suspension must be parenthesized.
        needs_parens: bool,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Substitution {
    pub suspension: NodeId,
    pub inner: NodeId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub scanner_id: String,

    pub finding_type: String,

    pub severity: Severity,

    pub confidence: Confidence,

    pub confidence_score: f64,

    pub title: String,

    pub description: String,

    pub locations: Vec<Location>,

    /// True only when the detector proved the associated rewrite preserves
    /// behavior. Findings with `safe == false` are report-only.
    pub safe: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub replacement: Option<ReplacementHint>,
}

impl Finding {
    pub fn new(
        scanner_id: impl Into<String>,
        severity: Severity,
        confidence: Confidence,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        let scanner_id = scanner_id.into();
        Self {
            finding_type: scanner_id.clone(),
            scanner_id,
            severity,
            confidence,
            confidence_score: confidence.to_score(),
            title: title.into(),
            description: description.into(),
            locations: Vec::new(),
            safe: false,
            replacement: None,
        }
    }

    pub fn with_location(mut self, location: Location) -> Self {
        self.locations.push(location);
        self
    }

    /// Attach a proved-safe rewrite. Only detectors that completed a full
    /// safety proof may call this.
    pub fn safe_to_rewrite(mut self, hint: ReplacementHint) -> Self {
        self.safe = true;
        self.replacement = Some(hint);
        self
    }

    pub fn primary_location(&self) -> Option<&Location> {
        self.locations.first()
    }
}
