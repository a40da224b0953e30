//! Domain error types.
//!
//! Every authoring, scoring, and lifecycle failure is a typed value so callers
//! can surface it as a form error. These are defined here rather than in the
//! I/O layers so the grading engine and CLI can downcast an `anyhow::Error`
//! back to the precise condition.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::GradeStatus;

/// Machine-readable classification of a domain error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    // Question authoring
    MissingOptions,
    EmptyOptionText,
    NoCorrectOption,
    MultipleCorrectOptions,
    InvalidAnswerLiteral,
    EmptyField,
    InvalidMarks,
    // Rubric authoring
    CriteriaSumMismatch,
    DuplicateCriterionName,
    NegativeMaxPoints,
    // Access control
    EmptyStudentSelection,
    InvalidClassSemester,
    UnknownStudent,
    DuplicateQuestionId,
    EmptyQuiz,
    // Scoring
    ScoreOutOfRange,
    MissingCriterionScore,
    UnknownCriterion,
    ScoringModeConflict,
    // Lifecycle
    InvalidTransition,
    MissingRejectionReason,
    // Quiz attempts
    QuizNotPublished,
    QuizClosed,
    AttemptsExhausted,
    StudentNotAssigned,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Debug output is already the variant name.
        write!(f, "{self:?}")
    }
}

/// A validation failure: `{ kind, field?, message }`.
///
/// `position` is set when the failure belongs to one element of an ordered
/// collection (the offending question during quiz assembly).
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct ValidationError {
    pub kind: ErrorKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<usize>,
}

impl ValidationError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            field: None,
            message: message.into(),
            position: None,
        }
    }

    /// Attach the name of the offending input field.
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    /// Attach the index of the offending element.
    pub fn at_position(mut self, position: usize) -> Self {
        self.position = Some(position);
        self
    }
}

/// Errors returned by grade lifecycle transitions.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LifecycleError {
    /// The requested transition is not allowed from the grade's current state.
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition { from: GradeStatus, to: GradeStatus },

    /// The score or input failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl LifecycleError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LifecycleError::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            LifecycleError::Validation(e) => e.kind,
        }
    }
}
