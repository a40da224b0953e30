//! Rubric definition validation.

use std::collections::HashSet;

use crate::error::{ErrorKind, ValidationError};
use crate::model::Rubric;

/// Allowed difference between the criteria sum and the rubric total.
pub const SUM_TOLERANCE: f64 = 0.01;

/// Validate a rubric definition.
///
/// Rejects blank titles and criterion names, negative maximum points,
/// duplicate criterion names or ids, and criteria whose points do not add up
/// to `total_marks`. A mismatched rubric is never renormalized.
pub fn validate_rubric(rubric: &Rubric) -> Result<(), ValidationError> {
    if rubric.title.trim().is_empty() {
        return Err(
            ValidationError::new(ErrorKind::EmptyField, "rubric title is empty")
                .with_field("title"),
        );
    }

    if !rubric.total_marks.is_finite() || rubric.total_marks < 0.0 {
        return Err(ValidationError::new(
            ErrorKind::InvalidMarks,
            format!("total marks must be non-negative, got {}", rubric.total_marks),
        )
        .with_field("total_marks"));
    }

    let mut names = HashSet::new();
    let mut ids = HashSet::new();
    for (i, criterion) in rubric.criteria.iter().enumerate() {
        let name = criterion.name.trim();
        if name.is_empty() {
            return Err(ValidationError::new(
                ErrorKind::EmptyField,
                format!("criterion {} has no name", i + 1),
            )
            .with_field(format!("criteria[{i}].name"))
            .at_position(i));
        }
        if !criterion.max_points.is_finite() || criterion.max_points < 0.0 {
            return Err(ValidationError::new(
                ErrorKind::NegativeMaxPoints,
                format!(
                    "criterion '{name}' has invalid max points {}",
                    criterion.max_points
                ),
            )
            .with_field(format!("criteria[{i}].max_points"))
            .at_position(i));
        }
        if !names.insert(name.to_lowercase()) {
            return Err(ValidationError::new(
                ErrorKind::DuplicateCriterionName,
                format!("duplicate criterion name: {name}"),
            )
            .with_field(format!("criteria[{i}].name"))
            .at_position(i));
        }
        if !ids.insert(criterion.id.as_str()) {
            return Err(ValidationError::new(
                ErrorKind::DuplicateCriterionName,
                format!("duplicate criterion id: {}", criterion.id),
            )
            .with_field(format!("criteria[{i}].id"))
            .at_position(i));
        }
    }

    let sum = rubric.max_points_sum();
    if (sum - rubric.total_marks).abs() > SUM_TOLERANCE {
        return Err(ValidationError::new(
            ErrorKind::CriteriaSumMismatch,
            format!(
                "sum of criteria points ({sum}) must equal total marks ({})",
                rubric.total_marks
            ),
        )
        .with_field("criteria"));
    }

    Ok(())
}
