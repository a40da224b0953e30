//! The `gradebook assemble` command.

use std::path::PathBuf;

use anyhow::{Context, Result};

use gradebook_core::parser::{self, Definition};
use gradebook_core::traits::Persistence;

use super::{fmt_marks, GlobalOpts, Session};

pub async fn execute(files: Vec<PathBuf>, publish: bool, opts: &GlobalOpts) -> Result<()> {
    let session = Session::open(opts)?;

    for file in &files {
        match parser::parse_definition(file)? {
            Definition::Quiz(def) => {
                let mut quiz = session
                    .engine
                    .create_quiz(def.meta, def.questions, def.access)
                    .await
                    .with_context(|| format!("failed to assemble {}", file.display()))?;
                if publish {
                    quiz = session.engine.publish_quiz(&quiz.id).await?;
                }
                println!(
                    "Stored quiz {}: {} ({} questions, {} marks, {}, {})",
                    quiz.id,
                    quiz.title,
                    quiz.questions.len(),
                    fmt_marks(quiz.total_marks()),
                    quiz.access_type,
                    quiz.visibility
                );
            }
            Definition::Rubric(rubric) => {
                session.store.save_rubric(&rubric).await?;
                println!(
                    "Stored rubric {}: {} ({} criteria, {} marks)",
                    rubric.id,
                    rubric.title,
                    rubric.criteria.len(),
                    fmt_marks(rubric.total_marks)
                );
            }
            Definition::Roster(_) => anyhow::bail!(
                "{} is a roster; point roster_path or --roster at it instead",
                file.display()
            ),
        }
    }

    Ok(())
}
