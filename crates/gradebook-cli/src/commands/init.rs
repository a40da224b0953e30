//! The `gradebook init` command.

use std::path::Path;

use anyhow::Result;

pub fn execute() -> Result<()> {
    write_if_missing(Path::new("gradebook.toml"), SAMPLE_CONFIG)?;

    std::fs::create_dir_all("definitions")?;
    write_if_missing(Path::new("definitions/roster.toml"), EXAMPLE_ROSTER)?;
    write_if_missing(Path::new("definitions/quiz.toml"), EXAMPLE_QUIZ)?;
    write_if_missing(Path::new("definitions/rubric.toml"), EXAMPLE_RUBRIC)?;

    println!("\nNext steps:");
    println!("  1. Run: gradebook validate definitions");
    println!("  2. Run: gradebook assemble definitions/quiz.toml definitions/rubric.toml");
    println!("  3. Run: gradebook grade draft sub-1 --rubric lab-report --score method=8");

    Ok(())
}

fn write_if_missing(path: &Path, content: &str) -> Result<()> {
    if path.exists() {
        println!("{} already exists, skipping.", path.display());
    } else {
        std::fs::write(path, content)?;
        println!("Created {}", path.display());
    }
    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# gradebook configuration

gradebook_path = "gradebook.json"
roster_path = "definitions/roster.toml"
strict_criteria = false
notify = true
parallelism = 4
"#;

const EXAMPLE_ROSTER: &str = r#"[[students]]
id = "s1"
username = "ana"
class_semester = "CS-2A"

[[students]]
id = "s2"
username = "ben"
class_semester = "CS-2A"
"#;

const EXAMPLE_QUIZ: &str = r#"[quiz]
id = "ownership-1"
title = "Ownership basics"
subject = "Rust"
class_semester = "CS-2A"
access = "all_class"

[[questions]]
text = "Which keyword forces a closure to take ownership of its captures?"
type = "mcq"
marks = 2
options = [
  { text = "move", correct = true },
  { text = "ref" },
  { text = "own" },
]

[[questions]]
text = "A `String` is copied implicitly on assignment."
type = "true_false"
answer = "False"

[[questions]]
text = "Name the smart pointer for single-threaded shared ownership."
type = "short_answer"
marks = 2
answer = "Rc"
"#;

const EXAMPLE_RUBRIC: &str = r#"[rubric]
id = "lab-report"
title = "Lab report"
total_marks = 25

[[criteria]]
id = "method"
name = "Method"
max_points = 10

[[criteria]]
id = "results"
name = "Results"
max_points = 10

[[criteria]]
id = "writing"
name = "Writing"
max_points = 5
"#;
