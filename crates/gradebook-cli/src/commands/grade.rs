//! The `gradebook grade` command family.

use anyhow::Result;
use clap::Subcommand;
use comfy_table::{Cell, Table};

use gradebook_core::engine::SchemeRef;
use gradebook_core::lifecycle::{DraftInput, ScoreInput};
use gradebook_core::model::{CriterionScore, Grade, LatePenalty, ScoringMode};
use gradebook_core::report::GradeReport;
use gradebook_core::traits::Persistence;

use super::{fmt_marks, parse_key_value, print_json, GlobalOpts, OutputFormat, Session};

#[derive(Debug, Subcommand)]
pub enum GradeCommand {
    /// Save (or re-save) a draft grade
    Draft {
        /// Submission id
        submission: String,

        /// Score against this stored rubric id
        #[arg(long, conflicts_with = "marks")]
        rubric: Option<String>,

        /// Criterion score as CRITERION_ID=POINTS (repeatable)
        #[arg(long = "score", value_parser = parse_key_value, requires = "rubric")]
        scores: Vec<(String, f64)>,

        /// Manually entered marks
        #[arg(long, requires = "max")]
        marks: Option<f64>,

        /// Maximum marks for manual grading
        #[arg(long)]
        max: Option<f64>,

        #[arg(long, default_value = "")]
        feedback: String,

        #[arg(long)]
        grader: Option<String>,

        /// Late penalty deducted from the score
        #[arg(long)]
        penalty: Option<f64>,

        #[arg(long, default_value = "late submission", requires = "penalty")]
        penalty_reason: String,
    },

    /// Publish one or more draft grades
    Publish {
        #[arg(required = true)]
        submissions: Vec<String>,
    },

    /// Return a published grade to draft
    Unpublish { submission: String },

    /// Reject a submission
    Reject {
        submission: String,

        #[arg(long)]
        reason: String,

        #[arg(long)]
        grader: Option<String>,
    },

    /// Show a grade
    Show {
        submission: String,

        /// Show only what the student can see
        #[arg(long)]
        student_view: bool,

        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,
    },
}

pub async fn execute(command: GradeCommand, opts: &GlobalOpts) -> Result<()> {
    let session = Session::open(opts)?;
    let engine = &session.engine;

    match command {
        GradeCommand::Draft {
            submission,
            rubric,
            scores,
            marks,
            max,
            feedback,
            grader,
            penalty,
            penalty_reason,
        } => {
            let (scheme, score) = match (rubric, marks, max) {
                (Some(rubric_id), None, _) => (
                    SchemeRef::Rubric(rubric_id),
                    ScoreInput::Criteria(
                        scores
                            .into_iter()
                            .map(|(id, points)| CriterionScore::new(id, points))
                            .collect(),
                    ),
                ),
                (None, Some(marks), Some(max_marks)) => {
                    (SchemeRef::Manual { max_marks }, ScoreInput::Marks(marks))
                }
                _ => anyhow::bail!(
                    "pass either --rubric with --score entries, or --marks with --max"
                ),
            };

            let mut input = DraftInput::new(score, feedback);
            if let Some(grader) = grader {
                input = input.with_grader(grader);
            }
            if let Some(marks) = penalty {
                input = input.with_penalty(LatePenalty {
                    marks,
                    reason: penalty_reason,
                });
            }

            let grade = engine.save_draft(&submission, &scheme, input).await?;
            println!(
                "Draft saved for {submission}: {} marks (revision {})",
                fmt_marks(grade.marks),
                grade.revision
            );
        }

        GradeCommand::Publish { submissions } => {
            if let [submission] = submissions.as_slice() {
                let grade = engine.publish(submission).await?;
                println!("Published {submission}: {} marks", fmt_marks(grade.marks));
            } else {
                let results = engine.publish_all(&submissions).await;
                let failed = results.iter().filter(|(_, r)| r.is_err()).count();
                for (submission, result) in &results {
                    match result {
                        Ok(grade) => {
                            println!("Published {submission}: {} marks", fmt_marks(grade.marks))
                        }
                        Err(e) => eprintln!("  FAILED {submission}: {e:#}"),
                    }
                }
                anyhow::ensure!(failed == 0, "{failed} of {} publish(es) failed", results.len());
            }
        }

        GradeCommand::Unpublish { submission } => {
            engine.unpublish(&submission).await?;
            println!("Unpublished {submission}");
        }

        GradeCommand::Reject {
            submission,
            reason,
            grader,
        } => {
            engine
                .reject(&submission, &reason, grader.as_deref())
                .await?;
            println!("Rejected {submission}");
        }

        GradeCommand::Show {
            submission,
            student_view,
            format,
        } => {
            let Some(grade) = engine.grade(&submission).await? else {
                anyhow::bail!("no grade for submission {submission}");
            };

            if student_view {
                let rubric = match &grade.scoring {
                    Some(ScoringMode::Rubric { rubric_id }) => {
                        Some(session.store.load_rubric(rubric_id).await?)
                    }
                    _ => None,
                };
                let Some(report) = GradeReport::for_student(&grade, rubric.as_ref()) else {
                    anyhow::bail!("grade for {submission} is not visible to the student yet");
                };
                match format {
                    OutputFormat::Json => print_json(&report)?,
                    OutputFormat::Table => print_report(&report),
                }
            } else {
                match format {
                    OutputFormat::Json => print_json(&grade)?,
                    OutputFormat::Table => print_grade(&grade),
                }
            }
        }
    }

    Ok(())
}

fn print_grade(grade: &Grade) {
    let mut table = Table::new();
    table.set_header(vec!["Field", "Value"]);
    table.add_row(vec![Cell::new("Submission"), Cell::new(&grade.submission_id)]);
    table.add_row(vec![Cell::new("Status"), Cell::new(grade.status)]);
    table.add_row(vec![Cell::new("Marks"), Cell::new(fmt_marks(grade.marks))]);
    table.add_row(vec![Cell::new("Revision"), Cell::new(grade.revision)]);
    if let Some(grader) = &grade.grader_id {
        table.add_row(vec![Cell::new("Grader"), Cell::new(grader)]);
    }
    if !grade.feedback.is_empty() {
        table.add_row(vec![Cell::new("Feedback"), Cell::new(&grade.feedback)]);
    }
    if let Some(reason) = &grade.rejection_reason {
        table.add_row(vec![Cell::new("Rejection reason"), Cell::new(reason)]);
    }
    if let Some(penalty) = &grade.penalty {
        table.add_row(vec![
            Cell::new("Penalty"),
            Cell::new(format!("-{} ({})", fmt_marks(penalty.marks), penalty.reason)),
        ]);
    }
    for cs in &grade.criterion_scores {
        table.add_row(vec![
            Cell::new(format!("  {}", cs.criterion_id)),
            Cell::new(fmt_marks(cs.score)),
        ]);
    }
    println!("{table}");
}

fn print_report(report: &GradeReport) {
    match &report.rejection_reason {
        Some(reason) => println!("Submission {} was rejected: {reason}", report.submission_id),
        None => {
            let out_of = report
                .max_marks
                .map(|m| format!(" / {}", fmt_marks(m)))
                .unwrap_or_default();
            println!(
                "Submission {}: {}{out_of}",
                report.submission_id,
                fmt_marks(report.marks)
            );
        }
    }

    if !report.breakdown.is_empty() {
        let mut table = Table::new();
        table.set_header(vec!["Criterion", "Score", "Max", "Comments"]);
        for line in &report.breakdown {
            table.add_row(vec![
                Cell::new(&line.criterion),
                Cell::new(fmt_marks(line.score)),
                Cell::new(fmt_marks(line.max_points)),
                Cell::new(&line.comments),
            ]);
        }
        println!("{table}");
    }
    if !report.feedback.is_empty() {
        println!("Feedback: {}", report.feedback);
    }
}
