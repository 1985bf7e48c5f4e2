use crate::dsl::StepKind;
use thiserror::Error;

/// Build-time and structural errors. A script that produces one of these
/// never runs.
#[derive(Error, Debug)]
pub enum WorkError {
    #[error("Invalid operator: '{0}'")]
    InvalidOperator(String),

    #[error("Operator '{operator}' requires a second operand")]
    MissingOperand { operator: String },

    #[error("Unary operator '{operator}' does not take a second operand")]
    UnexpectedOperand { operator: String },

    #[error("Condition '{0}' has no action to run")]
    IncompleteCondition(String),

    #[error("'{id}' is referenced by '{referenced_by}' but is not defined in the script")]
    DanglingReference { id: String, referenced_by: String },

    #[error("'{id}' is not a {expected}")]
    KindMismatch { id: String, expected: String },

    #[error("Entry '{key}' holds an item with id '{id}'")]
    IdMismatch { key: String, id: String },

    #[error("Duplicate id: {0}")]
    DuplicateId(String),

    #[error("Step '{0}' is not used anywhere in the script")]
    UnusedStep(String),

    #[error("Circular reference through '{0}'")]
    CircularReference(String),

    #[error("Invalid step '{id}': {reason}")]
    InvalidStep { id: String, reason: String },

    #[error("No handler registered for {kind} step '{step}'")]
    MissingHandler { step: String, kind: StepKind },

    #[error("Malformed script document: {0}")]
    Json(#[from] serde_json::Error),
}
