//! Grade lifecycle state machine.
//!
//! ```text
//! UNGRADED --save draft--> DRAFT --publish--> PUBLISHED
//!                          DRAFT <--unpublish-- PUBLISHED
//! UNGRADED | DRAFT | PUBLISHED --reject--> REJECTED
//! ```
//!
//! Every transition takes the current grade by reference and returns the next
//! value. Nothing is written unless every guard passes, so a failed
//! transition leaves the caller's grade untouched.

use chrono::{DateTime, Utc};

use crate::error::{ErrorKind, LifecycleError, ValidationError};
use crate::model::{
    CriterionScore, Grade, GradeRevision, GradeStatus, LatePenalty, Rubric, ScoringMode,
};
use crate::scoring::{complete_criterion_scores, score_from_manual_marks, score_from_rubric};

/// The scoring context a grade is evaluated against.
#[derive(Debug, Clone, Copy)]
pub enum GradingScheme<'a> {
    Rubric(&'a Rubric),
    Manual { max_marks: f64 },
}

impl GradingScheme<'_> {
    pub fn mode(&self) -> ScoringMode {
        match self {
            GradingScheme::Rubric(rubric) => ScoringMode::Rubric {
                rubric_id: rubric.id.clone(),
            },
            GradingScheme::Manual { max_marks } => ScoringMode::Manual {
                max_marks: *max_marks,
            },
        }
    }
}

/// The score a grader entered.
#[derive(Debug, Clone, PartialEq)]
pub enum ScoreInput {
    Criteria(Vec<CriterionScore>),
    Marks(f64),
}

/// A complete candidate for the "save as draft" action.
#[derive(Debug, Clone)]
pub struct DraftInput {
    pub grader_id: Option<String>,
    pub score: ScoreInput,
    pub feedback: String,
    pub penalty: Option<LatePenalty>,
    /// Report criteria without a score instead of defaulting them to 0.
    pub strict: bool,
}

impl DraftInput {
    pub fn new(score: ScoreInput, feedback: impl Into<String>) -> Self {
        Self {
            grader_id: None,
            score,
            feedback: feedback.into(),
            penalty: None,
            strict: false,
        }
    }

    pub fn with_grader(mut self, grader_id: impl Into<String>) -> Self {
        self.grader_id = Some(grader_id.into());
        self
    }

    pub fn with_penalty(mut self, penalty: LatePenalty) -> Self {
        self.penalty = Some(penalty);
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }
}

/// Whether the state machine has an edge from `from` to `to`.
pub fn transition_allowed(from: GradeStatus, to: GradeStatus) -> bool {
    use GradeStatus::*;
    matches!(
        (from, to),
        (Ungraded, Draft)
            | (Draft, Draft)
            | (Draft, Published)
            | (Published, Draft)
            | (Ungraded, Rejected)
            | (Draft, Rejected)
            | (Published, Rejected)
    )
}

fn ensure_transition(from: GradeStatus, to: GradeStatus) -> Result<(), LifecycleError> {
    if transition_allowed(from, to) {
        Ok(())
    } else {
        Err(LifecycleError::InvalidTransition { from, to })
    }
}

/// Save a score as a draft. Allowed from UNGRADED and DRAFT.
///
/// The scoring mode is fixed by the first save; later saves must use the same
/// rubric (or stay manual). Re-saving a draft records the previous marks and
/// feedback in the grade's history.
pub fn save_draft(
    grade: &Grade,
    scheme: &GradingScheme<'_>,
    input: DraftInput,
    now: DateTime<Utc>,
) -> Result<Grade, LifecycleError> {
    // PUBLISHED -> DRAFT exists only as unpublish, which keeps the score.
    if !matches!(grade.status, GradeStatus::Ungraded | GradeStatus::Draft) {
        return Err(LifecycleError::InvalidTransition {
            from: grade.status,
            to: GradeStatus::Draft,
        });
    }
    ensure_same_mode(grade, scheme)?;

    let (raw_marks, criterion_scores) = match (scheme, input.score) {
        (GradingScheme::Rubric(rubric), ScoreInput::Criteria(scores)) => {
            let completed = complete_criterion_scores(rubric, &scores, input.strict)?;
            let total = score_from_rubric(rubric, &completed)?.total;
            (total, completed)
        }
        (GradingScheme::Manual { max_marks }, ScoreInput::Marks(marks)) => {
            (score_from_manual_marks(marks, *max_marks)?, Vec::new())
        }
        (GradingScheme::Rubric(_), ScoreInput::Marks(_)) => {
            return Err(mode_conflict("rubric-graded submissions take criterion scores").into());
        }
        (GradingScheme::Manual { .. }, ScoreInput::Criteria(_)) => {
            return Err(mode_conflict("manually graded submissions take plain marks").into());
        }
    };

    let deduction = match &input.penalty {
        Some(penalty) => {
            if !penalty.marks.is_finite() || penalty.marks < 0.0 {
                return Err(ValidationError::new(
                    ErrorKind::InvalidMarks,
                    format!("late penalty must be non-negative, got {}", penalty.marks),
                )
                .with_field("penalty")
                .into());
            }
            penalty.marks
        }
        None => 0.0,
    };

    let mut next = grade.clone();
    if grade.status == GradeStatus::Draft {
        next.history.push(GradeRevision {
            revision: grade.revision,
            marks: grade.marks,
            feedback: grade.feedback.clone(),
            recorded_at: grade.graded_at.unwrap_or(now),
        });
    }
    next.revision = grade.revision + 1;
    next.marks = (raw_marks - deduction).max(0.0);
    next.feedback = input.feedback;
    next.status = GradeStatus::Draft;
    next.scoring = Some(scheme.mode());
    next.criterion_scores = criterion_scores;
    next.penalty = input.penalty;
    if input.grader_id.is_some() {
        next.grader_id = input.grader_id;
    }
    next.graded_at = Some(now);

    tracing::debug!(
        submission = %grade.submission_id,
        revision = next.revision,
        marks = next.marks,
        "grade saved as draft"
    );
    Ok(next)
}

/// Publish a draft, making it visible to the submission's owner.
///
/// The stored score is re-validated against the current rubric or maximum
/// marks, so a rubric edited after drafting cannot publish an out-of-range
/// grade.
pub fn publish(
    grade: &Grade,
    scheme: &GradingScheme<'_>,
    now: DateTime<Utc>,
) -> Result<Grade, LifecycleError> {
    ensure_transition(grade.status, GradeStatus::Published)?;
    ensure_same_mode(grade, scheme)?;

    match scheme {
        GradingScheme::Rubric(rubric) => {
            score_from_rubric(rubric, &grade.criterion_scores)?;
        }
        GradingScheme::Manual { max_marks } => {
            score_from_manual_marks(grade.marks, *max_marks)?;
        }
    }

    let mut next = grade.clone();
    next.status = GradeStatus::Published;
    next.published_at = Some(now);

    tracing::debug!(submission = %grade.submission_id, "grade published");
    Ok(next)
}

/// Hide a published grade again. Scores and feedback are kept.
pub fn unpublish(grade: &Grade) -> Result<Grade, LifecycleError> {
    if grade.status != GradeStatus::Published {
        return Err(LifecycleError::InvalidTransition {
            from: grade.status,
            to: GradeStatus::Draft,
        });
    }

    let mut next = grade.clone();
    next.status = GradeStatus::Draft;
    next.published_at = None;

    tracing::debug!(submission = %grade.submission_id, "grade unpublished");
    Ok(next)
}

/// Reject a submission.
///
/// When no grade exists yet, one is materialized with zero marks and then
/// rejected, so a grade id always exists once any grading action happened.
/// A rejected grade is final; grading again requires a new grade.
pub fn reject(
    existing: Option<&Grade>,
    submission_id: &str,
    reason: &str,
    grader_id: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Grade, LifecycleError> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(ValidationError::new(
            ErrorKind::MissingRejectionReason,
            "a reason is required to reject a submission",
        )
        .with_field("rejection_reason")
        .into());
    }

    let current = match existing {
        Some(grade) => grade.clone(),
        None => Grade::ungraded(submission_id),
    };
    ensure_transition(current.status, GradeStatus::Rejected)?;

    let mut next = current;
    next.status = GradeStatus::Rejected;
    next.rejection_reason = Some(reason.to_string());
    if let Some(grader) = grader_id {
        next.grader_id = Some(grader.to_string());
    }
    next.graded_at = Some(now);
    next.published_at = Some(now);

    tracing::debug!(submission = %next.submission_id, grade = %next.id, "submission rejected");
    Ok(next)
}

fn ensure_same_mode(grade: &Grade, scheme: &GradingScheme<'_>) -> Result<(), ValidationError> {
    let compatible = match (&grade.scoring, scheme) {
        (None, _) => true,
        (Some(ScoringMode::Rubric { rubric_id }), GradingScheme::Rubric(rubric)) => {
            *rubric_id == rubric.id
        }
        (Some(ScoringMode::Manual { .. }), GradingScheme::Manual { .. }) => true,
        _ => false,
    };
    if compatible {
        Ok(())
    } else {
        Err(mode_conflict(
            "this grade was first saved with a different scoring mode",
        ))
    }
}

fn mode_conflict(message: &str) -> ValidationError {
    ValidationError::new(ErrorKind::ScoringModeConflict, message).with_field("scoring")
}
