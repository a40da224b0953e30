//! Core data model types for gradebook.
//!
//! Questions, quizzes, rubrics, and grades as plain serde values. Validation
//! lives in the `question`, `rubric`, `quiz`, and `lifecycle` modules; the
//! types here only carry data and a few derived accessors.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Questions
// ---------------------------------------------------------------------------

/// How a question captures its answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuestionType {
    Mcq,
    TrueFalse,
    ShortAnswer,
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuestionType::Mcq => write!(f, "MCQ"),
            QuestionType::TrueFalse => write!(f, "TRUE_FALSE"),
            QuestionType::ShortAnswer => write!(f, "SHORT_ANSWER"),
        }
    }
}

impl FromStr for QuestionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "mcq" | "multiple_choice" => Ok(QuestionType::Mcq),
            "true_false" | "tf" => Ok(QuestionType::TrueFalse),
            "short_answer" | "short" => Ok(QuestionType::ShortAnswer),
            other => Err(format!("unknown question type: {other}")),
        }
    }
}

/// One answer choice, owned by exactly one question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerOption {
    pub option_text: String,
    #[serde(default)]
    pub is_correct: bool,
}

impl AnswerOption {
    pub fn new(option_text: impl Into<String>, is_correct: bool) -> Self {
        Self {
            option_text: option_text.into(),
            is_correct,
        }
    }
}

/// A quiz question and its answer key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub text: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub marks: f64,
    /// Answer choices. Only MCQ questions carry authored options; TRUE_FALSE
    /// options are synthesized during validation.
    #[serde(default)]
    pub options: Vec<AnswerOption>,
    #[serde(default)]
    pub correct_answer_text: String,
}

impl Question {
    /// The option flagged as correct, if any.
    pub fn correct_option(&self) -> Option<&AnswerOption> {
        self.options.iter().find(|o| o.is_correct)
    }
}

// ---------------------------------------------------------------------------
// Quizzes
// ---------------------------------------------------------------------------

/// Who may see a quiz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccessType {
    AllClass,
    SelectedStudents,
}

impl fmt::Display for AccessType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessType::AllClass => write!(f, "ALL_CLASS"),
            AccessType::SelectedStudents => write!(f, "SELECTED_STUDENTS"),
        }
    }
}

impl FromStr for AccessType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "all_class" | "all" => Ok(AccessType::AllClass),
            "selected_students" | "selected" => Ok(AccessType::SelectedStudents),
            other => Err(format!("unknown access type: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Visibility {
    #[default]
    Draft,
    Published,
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Visibility::Draft => write!(f, "DRAFT"),
            Visibility::Published => write!(f, "PUBLISHED"),
        }
    }
}

/// A roster entry as returned by the roster lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub id: String,
    pub username: String,
    pub class_semester: String,
}

/// An assembled quiz definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quiz {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub subject: String,
    pub class_semester: String,
    pub access_type: AccessType,
    /// Non-empty iff `access_type` is `SelectedStudents`.
    #[serde(default)]
    pub assigned_student_ids: BTreeSet<String>,
    pub questions: Vec<Question>,
    #[serde(default)]
    pub visibility: Visibility,
    /// Minimum percentage required to pass an attempt.
    pub passing_percentage: f64,
    #[serde(default)]
    pub time_limit_minutes: Option<u32>,
    pub max_attempts: u32,
    #[serde(default)]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ends_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Quiz {
    /// Sum of the current question marks. Always recomputed.
    pub fn total_marks(&self) -> f64 {
        self.questions.iter().map(|q| q.marks).sum()
    }

    /// Whether the given student may see this quiz.
    pub fn is_visible_to(&self, student: &Student) -> bool {
        match self.access_type {
            AccessType::AllClass => student.class_semester == self.class_semester,
            AccessType::SelectedStudents => self.assigned_student_ids.contains(&student.id),
        }
    }
}

// ---------------------------------------------------------------------------
// Rubrics
// ---------------------------------------------------------------------------

/// One independently scored dimension of a rubric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RubricCriterion {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub max_points: f64,
}

/// A named set of grading criteria whose points sum to `total_marks`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rubric {
    pub id: String,
    pub title: String,
    pub total_marks: f64,
    pub criteria: Vec<RubricCriterion>,
}

impl Rubric {
    pub fn criterion(&self, id: &str) -> Option<&RubricCriterion> {
        self.criteria.iter().find(|c| c.id == id)
    }

    pub fn max_points_sum(&self) -> f64 {
        self.criteria.iter().map(|c| c.max_points).sum()
    }
}

/// The score awarded for one criterion of one submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriterionScore {
    pub criterion_id: String,
    pub score: f64,
    #[serde(default)]
    pub comments: String,
}

impl CriterionScore {
    pub fn new(criterion_id: impl Into<String>, score: f64) -> Self {
        Self {
            criterion_id: criterion_id.into(),
            score,
            comments: String::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Grades
// ---------------------------------------------------------------------------

/// Lifecycle state of a grade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GradeStatus {
    Ungraded,
    Draft,
    Published,
    Rejected,
}

impl fmt::Display for GradeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GradeStatus::Ungraded => write!(f, "UNGRADED"),
            GradeStatus::Draft => write!(f, "DRAFT"),
            GradeStatus::Published => write!(f, "PUBLISHED"),
            GradeStatus::Rejected => write!(f, "REJECTED"),
        }
    }
}

/// How a grade's marks are produced. Fixed at first save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ScoringMode {
    Rubric { rubric_id: String },
    Manual { max_marks: f64 },
}

/// Deduction applied for a late submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatePenalty {
    pub marks: f64,
    #[serde(default)]
    pub reason: String,
}

/// A snapshot of a grade before it was re-saved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeRevision {
    pub revision: u32,
    pub marks: f64,
    pub feedback: String,
    pub recorded_at: DateTime<Utc>,
}

/// The evaluation of exactly one submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grade {
    pub id: Uuid,
    pub submission_id: String,
    #[serde(default)]
    pub grader_id: Option<String>,
    /// Net marks after any late penalty.
    pub marks: f64,
    #[serde(default)]
    pub feedback: String,
    pub status: GradeStatus,
    /// Present iff `status` is `Rejected`.
    #[serde(default)]
    pub rejection_reason: Option<String>,
    #[serde(default)]
    pub scoring: Option<ScoringMode>,
    /// Present iff a rubric is attached.
    #[serde(default)]
    pub criterion_scores: Vec<CriterionScore>,
    #[serde(default)]
    pub penalty: Option<LatePenalty>,
    #[serde(default)]
    pub revision: u32,
    #[serde(default)]
    pub history: Vec<GradeRevision>,
    #[serde(default)]
    pub graded_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
}

impl Grade {
    /// A fresh, ungraded record for a submission.
    pub fn ungraded(submission_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            submission_id: submission_id.into(),
            grader_id: None,
            marks: 0.0,
            feedback: String::new(),
            status: GradeStatus::Ungraded,
            rejection_reason: None,
            scoring: None,
            criterion_scores: Vec::new(),
            penalty: None,
            revision: 0,
            history: Vec::new(),
            graded_at: None,
            published_at: None,
        }
    }

    /// Whether the submission's owner can see this grade.
    pub fn is_visible_to_student(&self) -> bool {
        matches!(self.status, GradeStatus::Published | GradeStatus::Rejected)
    }
}
