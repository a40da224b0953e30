//! The `gradebook validate` command.

use std::path::{Path, PathBuf};

use anyhow::Result;

use gradebook_core::model::Student;
use gradebook_core::parser::{self, Definition, QuizDefinition};
use gradebook_core::question::validate_question;
use gradebook_core::quiz::assemble_quiz;

use super::{fmt_marks, load_roster, GlobalOpts};

pub fn execute(path: PathBuf, opts: &GlobalOpts) -> Result<()> {
    let files = if path.is_dir() {
        parser::collect_definition_files(&path)?
    } else {
        vec![path]
    };

    let config = opts.load_config()?;
    let roster = match &config.roster_path {
        Some(p) => Some(load_roster(p)?),
        None => None,
    };

    let mut invalid = 0;
    for file in &files {
        let problems = check_file(file, roster.as_deref());
        if !problems.is_empty() {
            invalid += 1;
            for problem in &problems {
                println!("  ERROR: {problem}");
            }
        }
    }

    if invalid == 0 {
        println!("All definitions valid.");
        Ok(())
    } else {
        anyhow::bail!("{invalid} of {} definition file(s) invalid", files.len())
    }
}

fn check_file(file: &Path, roster: Option<&[Student]>) -> Vec<String> {
    let definition = match parser::parse_definition(file) {
        Ok(d) => d,
        Err(e) => {
            println!("{}", file.display());
            return vec![format!("{e:#}")];
        }
    };

    match definition {
        Definition::Quiz(quiz) => check_quiz(file, quiz, roster),
        Definition::Rubric(rubric) => {
            println!(
                "Rubric: {} ({} criteria, {} marks)",
                rubric.title,
                rubric.criteria.len(),
                fmt_marks(rubric.total_marks)
            );
            Vec::new()
        }
        Definition::Roster(students) => {
            println!("Roster: {} ({} students)", file.display(), students.len());
            Vec::new()
        }
    }
}

fn check_quiz(file: &Path, quiz: QuizDefinition, roster: Option<&[Student]>) -> Vec<String> {
    let total: f64 = quiz.questions.iter().map(|q| q.marks).sum();
    println!(
        "Quiz: {} ({} questions, {} marks)",
        quiz.meta.title,
        quiz.questions.len(),
        fmt_marks(total)
    );

    // Report every bad question rather than stopping at the first.
    let mut problems: Vec<String> = quiz
        .questions
        .iter()
        .enumerate()
        .filter_map(|(i, q)| {
            validate_question(q.clone())
                .err()
                .map(|e| format!("[{}] question {} ({}): {e}", e.kind, i + 1, q.id))
        })
        .collect();

    if problems.is_empty() {
        match roster {
            Some(students) => {
                if let Err(e) = assemble_quiz(quiz.meta, quiz.questions, quiz.access, students) {
                    problems.push(format!("[{}] {e}", e.kind));
                }
            }
            None => tracing::info!(
                "{}: no roster configured, student selection not checked",
                file.display()
            ),
        }
    }
    problems
}
