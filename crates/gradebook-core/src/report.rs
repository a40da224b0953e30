//! Student-facing grade reports with JSON export.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{Grade, GradeStatus, LatePenalty, Rubric, ScoringMode};
use crate::scoring::{percentage_of, PASS_THRESHOLD};

/// What a student sees for one graded submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeReport {
    pub grade_id: Uuid,
    pub submission_id: String,
    pub status: GradeStatus,
    pub marks: f64,
    /// Maximum attainable marks, when the scoring mode is known.
    pub max_marks: Option<f64>,
    pub percentage: Option<f64>,
    pub passed: Option<bool>,
    pub feedback: String,
    pub rejection_reason: Option<String>,
    pub penalty: Option<LatePenalty>,
    pub breakdown: Vec<CriterionLine>,
    pub published_at: Option<DateTime<Utc>>,
}

/// One rubric criterion in a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriterionLine {
    pub criterion: String,
    pub score: f64,
    pub max_points: f64,
    pub comments: String,
}

impl GradeReport {
    /// Build the report for a grade, or `None` while the grade is hidden from
    /// the student (ungraded or still a draft).
    ///
    /// `rubric` is required to produce a criterion breakdown; criteria no
    /// longer in the rubric are listed under their id with a max of 0.
    pub fn for_student(grade: &Grade, rubric: Option<&Rubric>) -> Option<Self> {
        if !grade.is_visible_to_student() {
            return None;
        }

        let breakdown = grade
            .criterion_scores
            .iter()
            .map(|cs| {
                let criterion = rubric.and_then(|r| r.criterion(&cs.criterion_id));
                CriterionLine {
                    criterion: criterion
                        .map(|c| c.name.clone())
                        .unwrap_or_else(|| cs.criterion_id.clone()),
                    score: cs.score,
                    max_points: criterion.map(|c| c.max_points).unwrap_or(0.0),
                    comments: cs.comments.clone(),
                }
            })
            .collect();

        let max_marks = match (&grade.scoring, rubric) {
            _ if grade.status == GradeStatus::Rejected => None,
            (Some(ScoringMode::Manual { max_marks }), _) => Some(*max_marks),
            (Some(ScoringMode::Rubric { .. }), Some(r)) => Some(r.total_marks),
            _ => None,
        };

        Some(Self {
            grade_id: grade.id,
            submission_id: grade.submission_id.clone(),
            status: grade.status,
            marks: grade.marks,
            max_marks,
            percentage: max_marks.map(|max| percentage_of(grade.marks, max)),
            passed: max_marks.map(|max| grade.marks >= PASS_THRESHOLD * max),
            feedback: grade.feedback.clone(),
            rejection_reason: grade.rejection_reason.clone(),
            penalty: grade.penalty.clone(),
            breakdown,
            published_at: grade.published_at,
        })
    }

    /// Save the report as JSON to a file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize report")?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        Ok(())
    }

    /// Load a report from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read report from {}", path.display()))?;
        serde_json::from_str(&content).context("failed to parse report JSON")
    }
}
