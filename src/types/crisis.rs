//! Safety gate output types.

use serde::{Deserialize, Serialize};

/// How a crisis resource can be reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContactMethod {
    /// Voice call.
    Phone { number: String, display: String },
    /// SMS / text line.
    Text { number: String, display: String },
}

impl ContactMethod {
    /// Text shown to the user, e.g. "Call or text 988".
    pub fn display(&self) -> &str {
        match self {
            Self::Phone { display, .. } | Self::Text { display, .. } => display,
        }
    }

    /// Number to dial or text.
    pub fn number(&self) -> &str {
        match self {
            Self::Phone { number, .. } | Self::Text { number, .. } => number,
        }
    }
}

/// A support resource surfaced alongside a crisis message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrisisResource {
    /// Service name.
    pub name: String,
    /// How to reach it.
    pub contact: ContactMethod,
    /// Informational URL.
    pub url: String,
}

/// Result of a safety gate match.
///
/// Produced only by [`SafetyGate`](crate::safety::SafetyGate). Never cached
/// and never passed to the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrisisResult {
    /// Always `true`; kept explicit for consumers that serialise the result.
    pub is_crisis: bool,
    /// Supportive message rendered in place of any requested content.
    pub message: String,
    /// Resources in display order.
    pub resources: Vec<CrisisResource>,
}
