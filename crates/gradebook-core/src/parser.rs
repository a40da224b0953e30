//! TOML definition parser.
//!
//! Loads quizzes, rubrics, and rosters from authoring files. This is the only
//! place where lenient input is coerced (a question without usable marks is
//! worth 1); everything past this point goes through strict validation.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::model::{
    AccessType, AnswerOption, Question, QuestionType, Rubric, RubricCriterion, Student,
};
use crate::quiz::{AccessSpec, QuizMeta};
use crate::rubric::validate_rubric;

/// A parsed quiz file: everything `assemble_quiz` needs except the roster.
#[derive(Debug, Clone)]
pub struct QuizDefinition {
    pub meta: QuizMeta,
    pub questions: Vec<Question>,
    pub access: AccessSpec,
}

/// Any definition file, classified by its top-level table.
#[derive(Debug, Clone)]
pub enum Definition {
    Quiz(QuizDefinition),
    Rubric(Rubric),
    Roster(Vec<Student>),
}

impl Definition {
    pub fn kind(&self) -> &'static str {
        match self {
            Definition::Quiz(_) => "quiz",
            Definition::Rubric(_) => "rubric",
            Definition::Roster(_) => "roster",
        }
    }
}

#[derive(Debug, Deserialize)]
struct TomlQuizFile {
    quiz: TomlQuizHeader,
    #[serde(default)]
    questions: Vec<TomlQuestion>,
}

#[derive(Debug, Deserialize)]
struct TomlQuizHeader {
    #[serde(default)]
    id: String,
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    subject: String,
    #[serde(default)]
    class_semester: String,
    #[serde(default)]
    total_marks: Option<f64>,
    #[serde(default = "default_passing_percentage")]
    passing_percentage: f64,
    #[serde(default)]
    time_limit_minutes: Option<u32>,
    #[serde(default = "default_max_attempts")]
    max_attempts: u32,
    #[serde(default)]
    starts_at: Option<String>,
    #[serde(default)]
    ends_at: Option<String>,
    #[serde(default = "default_access")]
    access: String,
    #[serde(default)]
    students: Vec<String>,
}

fn default_passing_percentage() -> f64 {
    60.0
}

fn default_max_attempts() -> u32 {
    1
}

fn default_access() -> String {
    "all_class".to_string()
}

#[derive(Debug, Deserialize)]
struct TomlQuestion {
    #[serde(default)]
    id: Option<String>,
    text: String,
    #[serde(rename = "type")]
    question_type: String,
    #[serde(default)]
    marks: Option<toml::Value>,
    #[serde(default)]
    answer: Option<toml::Value>,
    #[serde(default)]
    options: Vec<TomlOption>,
}

#[derive(Debug, Deserialize)]
struct TomlOption {
    text: String,
    #[serde(default)]
    correct: bool,
}

#[derive(Debug, Deserialize)]
struct TomlRubricFile {
    rubric: TomlRubricHeader,
    #[serde(default)]
    criteria: Vec<TomlCriterion>,
}

#[derive(Debug, Deserialize)]
struct TomlRubricHeader {
    id: String,
    title: String,
    total_marks: f64,
}

#[derive(Debug, Deserialize)]
struct TomlCriterion {
    #[serde(default)]
    id: Option<String>,
    name: String,
    #[serde(default)]
    description: String,
    max_points: f64,
}

#[derive(Debug, Deserialize)]
struct TomlRosterFile {
    #[serde(default)]
    students: Vec<Student>,
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .with_context(|| format!("failed to read definition file: {}", path.display()))
}

/// Parse a quiz file.
pub fn parse_quiz(path: &Path) -> Result<QuizDefinition> {
    parse_quiz_str(&read(path)?, path)
}

/// Parse quiz TOML. Questions are not validated here; that happens at
/// assembly so errors carry the question's position.
pub fn parse_quiz_str(content: &str, source_path: &Path) -> Result<QuizDefinition> {
    let parsed: TomlQuizFile = toml::from_str(content)
        .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?;
    let header = parsed.quiz;

    let access_type: AccessType = header
        .access
        .parse()
        .map_err(|e: String| anyhow::anyhow!("{}", e))?;
    let access = match access_type {
        AccessType::AllClass => AccessSpec::all_class(),
        AccessType::SelectedStudents => AccessSpec::selected(header.students),
    };

    let questions = parsed
        .questions
        .into_iter()
        .enumerate()
        .map(|(i, q)| convert_question(i, q))
        .collect::<Result<Vec<_>>>()?;

    let meta = QuizMeta {
        id: header.id,
        title: header.title,
        description: header.description,
        subject: header.subject,
        class_semester: header.class_semester,
        total_marks: header.total_marks,
        passing_percentage: header.passing_percentage,
        time_limit_minutes: header.time_limit_minutes,
        max_attempts: header.max_attempts,
        starts_at: parse_timestamp(header.starts_at.as_deref(), "starts_at")?,
        ends_at: parse_timestamp(header.ends_at.as_deref(), "ends_at")?,
    };

    Ok(QuizDefinition {
        meta,
        questions,
        access,
    })
}

fn parse_timestamp(value: Option<&str>, field: &str) -> Result<Option<DateTime<Utc>>> {
    value
        .map(|s| {
            DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&Utc))
                .with_context(|| format!("{field} is not an RFC 3339 timestamp: {s}"))
        })
        .transpose()
}

fn convert_question(index: usize, q: TomlQuestion) -> Result<Question> {
    let id = q.id.unwrap_or_else(|| format!("q{}", index + 1));
    let question_type: QuestionType = q
        .question_type
        .parse()
        .map_err(|e: String| anyhow::anyhow!("question {id}: {e}"))?;

    let marks = coerce_marks(&id, q.marks.as_ref());

    let correct_answer_text = match q.answer {
        Some(toml::Value::String(s)) if question_type == QuestionType::TrueFalse => {
            normalize_boolean_literal(&s)
        }
        Some(toml::Value::String(s)) => s,
        Some(toml::Value::Boolean(b)) => (if b { "True" } else { "False" }).to_string(),
        Some(other) => anyhow::bail!("question {id}: answer must be a string, got {other}"),
        None => String::new(),
    };

    Ok(Question {
        id,
        text: q.text,
        question_type,
        marks,
        options: q
            .options
            .into_iter()
            .map(|o| AnswerOption::new(o.text, o.correct))
            .collect(),
        correct_answer_text,
    })
}

/// Missing, zero, or non-numeric marks become 1. Negative marks are kept so
/// validation can reject them.
fn coerce_marks(question_id: &str, value: Option<&toml::Value>) -> f64 {
    let marks = match value {
        Some(toml::Value::Integer(n)) => Some(*n as f64),
        Some(toml::Value::Float(f)) if f.is_finite() => Some(*f),
        Some(toml::Value::String(s)) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    };
    match marks {
        Some(m) if m != 0.0 => m,
        _ => {
            if value.is_some() {
                tracing::warn!("question {question_id}: unusable marks {value:?}, defaulting to 1");
            }
            1.0
        }
    }
}

fn normalize_boolean_literal(s: &str) -> String {
    match s.trim().to_lowercase().as_str() {
        "true" => "True".to_string(),
        "false" => "False".to_string(),
        _ => s.to_string(),
    }
}

/// Parse a rubric file.
pub fn parse_rubric(path: &Path) -> Result<Rubric> {
    parse_rubric_str(&read(path)?, path)
}

/// Parse and validate rubric TOML. A criterion without an id gets one derived
/// from its name.
pub fn parse_rubric_str(content: &str, source_path: &Path) -> Result<Rubric> {
    let parsed: TomlRubricFile = toml::from_str(content)
        .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?;

    let rubric = Rubric {
        id: parsed.rubric.id,
        title: parsed.rubric.title,
        total_marks: parsed.rubric.total_marks,
        criteria: parsed
            .criteria
            .into_iter()
            .map(|c| RubricCriterion {
                id: c.id.unwrap_or_else(|| slug(&c.name)),
                name: c.name,
                description: c.description,
                max_points: c.max_points,
            })
            .collect(),
    };

    validate_rubric(&rubric)
        .with_context(|| format!("invalid rubric in {}", source_path.display()))?;
    Ok(rubric)
}

fn slug(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Parse a roster file.
pub fn parse_roster(path: &Path) -> Result<Vec<Student>> {
    parse_roster_str(&read(path)?, path)
}

pub fn parse_roster_str(content: &str, source_path: &Path) -> Result<Vec<Student>> {
    let parsed: TomlRosterFile = toml::from_str(content)
        .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?;
    Ok(parsed.students)
}

/// Parse any definition file, picking the format from its top-level table.
pub fn parse_definition(path: &Path) -> Result<Definition> {
    parse_definition_str(&read(path)?, path)
}

pub fn parse_definition_str(content: &str, source_path: &Path) -> Result<Definition> {
    let table: toml::Table = toml::from_str(content)
        .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?;

    if table.contains_key("quiz") {
        parse_quiz_str(content, source_path).map(Definition::Quiz)
    } else if table.contains_key("rubric") {
        parse_rubric_str(content, source_path).map(Definition::Rubric)
    } else if table.contains_key("students") {
        parse_roster_str(content, source_path).map(Definition::Roster)
    } else {
        anyhow::bail!(
            "{}: expected a [quiz], [rubric], or [[students]] table",
            source_path.display()
        )
    }
}

/// Recursively collect all `.toml` files under `dir`, sorted by path.
pub fn collect_definition_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        anyhow::bail!("not a directory: {}", dir.display());
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
    {
        let path = entry?.path();
        if path.is_dir() {
            files.extend(collect_definition_files(&path)?);
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Load every roster file under `dir`. Files that are not rosters are skipped.
pub fn load_roster_directory(dir: &Path) -> Result<Vec<Student>> {
    let mut students = Vec::new();
    for path in collect_definition_files(dir)? {
        match parse_definition(&path) {
            Ok(Definition::Roster(found)) => students.extend(found),
            Ok(_) => {}
            Err(e) => tracing::warn!("skipping {}: {:#}", path.display(), e),
        }
    }
    Ok(students)
}
