//! Aggregate statistics over grades and quiz attempts.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::evaluation::AttemptResult;
use crate::model::{Grade, GradeStatus};

/// Counts per grade status plus marks statistics for published grades.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GradeSummary {
    pub total: usize,
    pub ungraded: usize,
    pub draft: usize,
    pub published: usize,
    pub rejected: usize,
    /// Grades carrying a late penalty.
    pub penalized: usize,
    /// Mean marks over published grades; `None` when nothing is published.
    pub average_published_marks: Option<f64>,
    pub highest_published_marks: Option<f64>,
    pub lowest_published_marks: Option<f64>,
    /// Published grades per grader. Grades without a grader are not counted.
    pub published_by_grader: BTreeMap<String, usize>,
}

impl GradeSummary {
    /// Fraction of grades that have been published, in `[0, 1]`.
    pub fn published_ratio(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.published as f64 / self.total as f64
        }
    }
}

/// Summarize a set of grades.
pub fn summarize_grades(grades: &[Grade]) -> GradeSummary {
    let mut summary = GradeSummary {
        total: grades.len(),
        ..Default::default()
    };
    let mut published_marks = Vec::new();

    for grade in grades {
        match grade.status {
            GradeStatus::Ungraded => summary.ungraded += 1,
            GradeStatus::Draft => summary.draft += 1,
            GradeStatus::Rejected => summary.rejected += 1,
            GradeStatus::Published => {
                summary.published += 1;
                published_marks.push(grade.marks);
                if let Some(grader) = &grade.grader_id {
                    *summary
                        .published_by_grader
                        .entry(grader.clone())
                        .or_default() += 1;
                }
            }
        }
        if grade.penalty.is_some() {
            summary.penalized += 1;
        }
    }

    if !published_marks.is_empty() {
        let sum: f64 = published_marks.iter().sum();
        summary.average_published_marks = Some(sum / published_marks.len() as f64);
        summary.highest_published_marks = published_marks.iter().copied().reduce(f64::max);
        summary.lowest_published_marks = published_marks.iter().copied().reduce(f64::min);
    }

    summary
}

/// Statistics over several attempts at the same quiz.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttemptStats {
    pub attempts: usize,
    pub passed: usize,
    pub mean_percentage: f64,
    /// Per question id: fraction of attempts that answered it correctly.
    pub question_success: BTreeMap<String, f64>,
}

pub fn summarize_attempts(results: &[AttemptResult]) -> AttemptStats {
    if results.is_empty() {
        return AttemptStats::default();
    }

    let n = results.len() as f64;
    let mut correct_by_question: BTreeMap<String, usize> = BTreeMap::new();
    for result in results {
        for outcome in &result.outcomes {
            let entry = correct_by_question
                .entry(outcome.question_id.clone())
                .or_default();
            if outcome.correct {
                *entry += 1;
            }
        }
    }

    AttemptStats {
        attempts: results.len(),
        passed: results.iter().filter(|r| r.passed).count(),
        mean_percentage: results.iter().map(|r| r.percentage).sum::<f64>() / n,
        question_success: correct_by_question
            .into_iter()
            .map(|(id, correct)| (id, correct as f64 / n))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::QuestionOutcome;
    use crate::model::LatePenalty;

    fn grade(status: GradeStatus, marks: f64, grader: Option<&str>) -> Grade {
        let mut g = Grade::ungraded("sub");
        g.status = status;
        g.marks = marks;
        g.grader_id = grader.map(String::from);
        g
    }

    #[test]
    fn counts_per_status() {
        let mut late = grade(GradeStatus::Published, 6.0, Some("t1"));
        late.penalty = Some(LatePenalty {
            marks: 2.0,
            reason: "two days late".into(),
        });
        let grades = vec![
            grade(GradeStatus::Ungraded, 0.0, None),
            grade(GradeStatus::Draft, 5.0, Some("t1")),
            grade(GradeStatus::Published, 8.0, Some("t1")),
            late,
            grade(GradeStatus::Published, 10.0, None),
            grade(GradeStatus::Rejected, 0.0, Some("t2")),
        ];
        let summary = summarize_grades(&grades);
        assert_eq!(summary.total, 6);
        assert_eq!(summary.ungraded, 1);
        assert_eq!(summary.draft, 1);
        assert_eq!(summary.published, 3);
        assert_eq!(summary.rejected, 1);
        assert_eq!(summary.penalized, 1);
        assert_eq!(summary.average_published_marks, Some(8.0));
        assert_eq!(summary.highest_published_marks, Some(10.0));
        assert_eq!(summary.lowest_published_marks, Some(6.0));
        assert_eq!(summary.published_by_grader.get("t1"), Some(&2));
        assert_eq!(summary.published_ratio(), 0.5);
    }

    #[test]
    fn empty_summary() {
        let summary = summarize_grades(&[]);
        assert_eq!(summary.total, 0);
        assert_eq!(summary.average_published_marks, None);
        assert_eq!(summary.published_ratio(), 0.0);
    }

    fn attempt(percentage: f64, passed: bool, q1_correct: bool) -> AttemptResult {
        AttemptResult {
            score: 0.0,
            total_marks: 0.0,
            percentage,
            passed,
            correct_count: usize::from(q1_correct),
            outcomes: vec![QuestionOutcome {
                question_id: "q1".into(),
                answered: true,
                correct: q1_correct,
                awarded: 0.0,
                marks: 1.0,
            }],
        }
    }

    #[test]
    fn attempt_statistics() {
        let stats = summarize_attempts(&[
            attempt(100.0, true, true),
            attempt(50.0, false, false),
        ]);
        assert_eq!(stats.attempts, 2);
        assert_eq!(stats.passed, 1);
        assert_eq!(stats.mean_percentage, 75.0);
        assert_eq!(stats.question_success.get("q1"), Some(&0.5));
        assert_eq!(summarize_attempts(&[]), AttemptStats::default());
    }
}
