//! Score computation from rubric criteria or manual marks.
//!
//! Out-of-range input is always an error here; nothing is silently clamped.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, ValidationError};
use crate::model::{CriterionScore, Rubric};

/// Fraction of the rubric total needed to pass.
pub const PASS_THRESHOLD: f64 = 0.6;

/// Aggregate result of rubric scoring.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RubricScore {
    /// Sum of criterion scores.
    pub total: f64,
    /// `total / total_marks * 100`, rounded. Zero when the rubric total is zero.
    pub percentage: f64,
    /// Whether `total` reaches 60% of the rubric total.
    pub pass: bool,
}

/// `part / whole * 100`, or 0 when `whole` is zero.
pub fn percentage_of(part: f64, whole: f64) -> f64 {
    if whole == 0.0 {
        0.0
    } else {
        part / whole * 100.0
    }
}

/// Sum criterion scores against a rubric.
///
/// Every score must reference a criterion of the rubric, appear at most once,
/// and lie within `[0, max_points]`. Criteria without a score contribute 0.
pub fn score_from_rubric(
    rubric: &Rubric,
    scores: &[CriterionScore],
) -> Result<RubricScore, ValidationError> {
    check_criterion_scores(rubric, scores)?;

    let total: f64 = scores.iter().map(|s| s.score).sum();
    Ok(RubricScore {
        total,
        percentage: percentage_of(total, rubric.total_marks).round(),
        pass: total >= rubric.total_marks * PASS_THRESHOLD,
    })
}

/// Validate manually entered marks: `0 <= marks <= max_marks`.
pub fn score_from_manual_marks(marks: f64, max_marks: f64) -> Result<f64, ValidationError> {
    if !max_marks.is_finite() || max_marks < 0.0 {
        return Err(ValidationError::new(
            ErrorKind::InvalidMarks,
            format!("maximum marks must be non-negative, got {max_marks}"),
        )
        .with_field("max_marks"));
    }
    if !marks.is_finite() || marks < 0.0 || marks > max_marks {
        return Err(ValidationError::new(
            ErrorKind::ScoreOutOfRange,
            format!("marks {marks} must be between 0 and {max_marks}"),
        )
        .with_field("marks"));
    }
    Ok(marks)
}

/// Produce one score per rubric criterion, in rubric order.
///
/// Missing criteria default to a score of 0 unless `strict` is set, in which
/// case they are reported as `MissingCriterionScore`.
pub fn complete_criterion_scores(
    rubric: &Rubric,
    scores: &[CriterionScore],
    strict: bool,
) -> Result<Vec<CriterionScore>, ValidationError> {
    check_criterion_scores(rubric, scores)?;

    rubric
        .criteria
        .iter()
        .map(|criterion| {
            match scores.iter().find(|s| s.criterion_id == criterion.id) {
                Some(score) => Ok(score.clone()),
                None if strict => Err(ValidationError::new(
                    ErrorKind::MissingCriterionScore,
                    format!("no score given for criterion '{}'", criterion.name),
                )
                .with_field("criterion_scores")),
                None => Ok(CriterionScore::new(criterion.id.clone(), 0.0)),
            }
        })
        .collect()
}

fn check_criterion_scores(
    rubric: &Rubric,
    scores: &[CriterionScore],
) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();
    for (i, score) in scores.iter().enumerate() {
        let Some(criterion) = rubric.criterion(&score.criterion_id) else {
            return Err(ValidationError::new(
                ErrorKind::UnknownCriterion,
                format!(
                    "criterion '{}' is not part of rubric '{}'",
                    score.criterion_id, rubric.title
                ),
            )
            .with_field(format!("criterion_scores[{i}]"))
            .at_position(i));
        };
        if !seen.insert(score.criterion_id.as_str()) {
            return Err(ValidationError::new(
                ErrorKind::DuplicateCriterionName,
                format!("criterion '{}' is scored more than once", criterion.name),
            )
            .with_field(format!("criterion_scores[{i}]"))
            .at_position(i));
        }
        if !score.score.is_finite() || score.score < 0.0 || score.score > criterion.max_points {
            return Err(ValidationError::new(
                ErrorKind::ScoreOutOfRange,
                format!(
                    "score {} for '{}' must be between 0 and {}",
                    score.score, criterion.name, criterion.max_points
                ),
            )
            .with_field(format!("criterion_scores[{i}].score"))
            .at_position(i));
        }
    }
    Ok(())
}
