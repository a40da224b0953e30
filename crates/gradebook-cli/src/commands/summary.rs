//! The `gradebook summary` command.

use anyhow::Result;
use comfy_table::{Cell, Table};

use gradebook_core::statistics::summarize_grades;
use gradebook_core::traits::Persistence;

use super::{fmt_marks, print_json, GlobalOpts, OutputFormat, Session};

pub async fn execute(list: bool, format: OutputFormat, opts: &GlobalOpts) -> Result<()> {
    let session = Session::open(opts)?;
    let grades = session.store.list_grades().await?;
    let summary = summarize_grades(&grades);

    if format == OutputFormat::Json {
        return print_json(&summary);
    }

    if list && !grades.is_empty() {
        let mut table = Table::new();
        table.set_header(vec!["Submission", "Status", "Marks", "Revision", "Grader"]);
        for grade in &grades {
            table.add_row(vec![
                Cell::new(&grade.submission_id),
                Cell::new(grade.status),
                Cell::new(fmt_marks(grade.marks)),
                Cell::new(grade.revision),
                Cell::new(grade.grader_id.as_deref().unwrap_or("-")),
            ]);
        }
        println!("{table}");
    }

    let mut table = Table::new();
    table.set_header(vec!["Status", "Count"]);
    table.add_row(vec![Cell::new("UNGRADED"), Cell::new(summary.ungraded)]);
    table.add_row(vec![Cell::new("DRAFT"), Cell::new(summary.draft)]);
    table.add_row(vec![Cell::new("PUBLISHED"), Cell::new(summary.published)]);
    table.add_row(vec![Cell::new("REJECTED"), Cell::new(summary.rejected)]);
    println!("{table}");

    println!(
        "{} of {} grade(s) published",
        summary.published, summary.total
    );
    if let Some(avg) = summary.average_published_marks {
        println!("Average published marks: {avg:.2}");
    }

    Ok(())
}
