//! The `gradebook score` command: compute a score without touching the gradebook.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{Cell, Table};
use serde::Serialize;

use gradebook_core::model::CriterionScore;
use gradebook_core::parser;
use gradebook_core::scoring::{
    complete_criterion_scores, percentage_of, score_from_manual_marks, score_from_rubric,
    PASS_THRESHOLD,
};

use super::{fmt_marks, print_json, OutputFormat};

#[derive(Serialize)]
struct ScoreOutput {
    total: f64,
    max_marks: f64,
    percentage: f64,
    pass: bool,
    criteria: Vec<CriterionScore>,
}

pub fn execute(
    rubric: Option<PathBuf>,
    scores: Vec<(String, f64)>,
    marks: Option<f64>,
    max_marks: Option<f64>,
    strict: bool,
    format: OutputFormat,
) -> Result<()> {
    let output = match (rubric, marks) {
        (Some(path), None) => {
            let rubric = parser::parse_rubric(&path)?;
            let given: Vec<CriterionScore> = scores
                .into_iter()
                .map(|(id, score)| CriterionScore::new(id, score))
                .collect();
            let completed = complete_criterion_scores(&rubric, &given, strict)?;
            let result = score_from_rubric(&rubric, &completed)?;
            ScoreOutput {
                total: result.total,
                max_marks: rubric.total_marks,
                percentage: result.percentage,
                pass: result.pass,
                criteria: completed,
            }
        }
        (None, Some(marks)) => {
            let Some(max_marks) = max_marks else {
                anyhow::bail!("--marks requires --max");
            };
            let total = score_from_manual_marks(marks, max_marks)?;
            ScoreOutput {
                total,
                max_marks,
                percentage: percentage_of(total, max_marks).round(),
                pass: total >= PASS_THRESHOLD * max_marks,
                criteria: Vec::new(),
            }
        }
        _ => anyhow::bail!("pass either --rubric with --score entries, or --marks with --max"),
    };

    match format {
        OutputFormat::Json => print_json(&output)?,
        OutputFormat::Table => {
            if !output.criteria.is_empty() {
                let mut table = Table::new();
                table.set_header(vec!["Criterion", "Score"]);
                for cs in &output.criteria {
                    table.add_row(vec![
                        Cell::new(&cs.criterion_id),
                        Cell::new(fmt_marks(cs.score)),
                    ]);
                }
                println!("{table}");
            }
            println!(
                "Total: {} / {} ({}%) {}",
                fmt_marks(output.total),
                fmt_marks(output.max_marks),
                output.percentage,
                if output.pass { "PASS" } else { "FAIL" }
            );
        }
    }

    Ok(())
}
