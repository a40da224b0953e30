//! The `gradebook evaluate` command.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use comfy_table::{Cell, Table};

use gradebook_core::evaluation::{check_attempt_allowed, evaluate_attempt, Answer, AttemptResult};
use gradebook_core::model::Quiz;
use gradebook_core::statistics::summarize_attempts;
use gradebook_core::traits::Persistence;

use super::{fmt_marks, print_json, GlobalOpts, OutputFormat, Session};

pub async fn execute(
    quiz_id: String,
    answer_files: Vec<PathBuf>,
    student: Option<String>,
    attempts_used: u32,
    format: OutputFormat,
    opts: &GlobalOpts,
) -> Result<()> {
    let session = Session::open(opts)?;
    let Some(quiz) = session.store.load_quiz(&quiz_id).await? else {
        anyhow::bail!("quiz not found: {quiz_id}");
    };

    if let Some(student_id) = &student {
        let Some(student) = session.students.iter().find(|s| &s.id == student_id) else {
            anyhow::bail!("student {student_id} is not in the roster");
        };
        check_attempt_allowed(&quiz, student, Utc::now(), attempts_used)?;
    }

    let results = answer_files
        .iter()
        .map(|path| evaluate_file(&quiz, path))
        .collect::<Result<Vec<_>>>()?;

    match (format, results.as_slice()) {
        (OutputFormat::Json, [result]) => print_json(result)?,
        (OutputFormat::Json, _) => print_json(&summarize_attempts(&results))?,
        (OutputFormat::Table, [result]) => print_attempt(result),
        (OutputFormat::Table, _) => {
            let mut table = Table::new();
            table.set_header(vec!["Answers", "Score", "Percentage", "Result"]);
            for (path, result) in answer_files.iter().zip(&results) {
                table.add_row(vec![
                    Cell::new(path.display()),
                    Cell::new(format!(
                        "{} / {}",
                        fmt_marks(result.score),
                        fmt_marks(result.total_marks)
                    )),
                    Cell::new(format!("{:.1}%", result.percentage)),
                    Cell::new(if result.passed { "PASSED" } else { "FAILED" }),
                ]);
            }
            println!("{table}");

            let stats = summarize_attempts(&results);
            println!(
                "{} of {} attempt(s) passed, mean {:.1}%",
                stats.passed, stats.attempts, stats.mean_percentage
            );
        }
    }

    Ok(())
}

fn evaluate_file(quiz: &Quiz, path: &Path) -> Result<AttemptResult> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read answers from {}", path.display()))?;
    let answers: HashMap<String, Answer> = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse answers JSON in {}", path.display()))?;
    Ok(evaluate_attempt(quiz, &answers))
}

fn print_attempt(result: &AttemptResult) {
    let mut table = Table::new();
    table.set_header(vec!["Question", "Answered", "Correct", "Marks"]);
    for outcome in &result.outcomes {
        table.add_row(vec![
            Cell::new(&outcome.question_id),
            Cell::new(if outcome.answered { "yes" } else { "no" }),
            Cell::new(if outcome.correct { "yes" } else { "no" }),
            Cell::new(format!(
                "{} / {}",
                fmt_marks(outcome.awarded),
                fmt_marks(outcome.marks)
            )),
        ]);
    }
    println!("{table}");
    println!(
        "Score: {} / {} ({:.1}%) {}",
        fmt_marks(result.score),
        fmt_marks(result.total_marks),
        result.percentage,
        if result.passed { "PASSED" } else { "FAILED" }
    );
}
