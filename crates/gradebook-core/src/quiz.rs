//! Quiz assembly and publication.
//!
//! Turns authored questions plus an access specification into a [`Quiz`].
//! Assembly validates every question (fail-fast) and checks the student
//! selection against the roster of the quiz's class.

use std::collections::{BTreeSet, HashSet};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{ErrorKind, ValidationError};
use crate::model::{AccessType, Question, Quiz, Student, Visibility};
use crate::question::validate_question;

/// Descriptive and policy fields supplied by the quiz author.
#[derive(Debug, Clone)]
pub struct QuizMeta {
    /// Left empty to have an id generated.
    pub id: String,
    pub title: String,
    pub description: String,
    pub subject: String,
    pub class_semester: String,
    /// Author-declared total. Informational only; the assembled quiz always
    /// reports the sum of its question marks.
    pub total_marks: Option<f64>,
    pub passing_percentage: f64,
    pub time_limit_minutes: Option<u32>,
    pub max_attempts: u32,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
}

impl Default for QuizMeta {
    fn default() -> Self {
        Self {
            id: String::new(),
            title: String::new(),
            description: String::new(),
            subject: String::new(),
            class_semester: String::new(),
            total_marks: None,
            passing_percentage: 60.0,
            time_limit_minutes: None,
            max_attempts: 1,
            starts_at: None,
            ends_at: None,
        }
    }
}

/// Who the quiz is for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessSpec {
    pub access_type: AccessType,
    pub assigned_student_ids: BTreeSet<String>,
}

impl AccessSpec {
    pub fn all_class() -> Self {
        Self {
            access_type: AccessType::AllClass,
            assigned_student_ids: BTreeSet::new(),
        }
    }

    pub fn selected<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            access_type: AccessType::SelectedStudents,
            assigned_student_ids: ids.into_iter().map(Into::into).collect(),
        }
    }
}

/// Assemble a draft quiz.
///
/// `roster` is the result of the roster lookup; only students of
/// `meta.class_semester` may be selected.
pub fn assemble_quiz(
    meta: QuizMeta,
    questions: Vec<Question>,
    access: AccessSpec,
    roster: &[Student],
) -> Result<Quiz, ValidationError> {
    if meta.title.trim().is_empty() {
        return Err(
            ValidationError::new(ErrorKind::EmptyField, "quiz title is empty").with_field("title"),
        );
    }
    if !(0.0..=100.0).contains(&meta.passing_percentage) {
        return Err(ValidationError::new(
            ErrorKind::InvalidMarks,
            format!(
                "passing percentage must be between 0 and 100, got {}",
                meta.passing_percentage
            ),
        )
        .with_field("passing_percentage"));
    }
    if meta.max_attempts == 0 {
        return Err(ValidationError::new(
            ErrorKind::InvalidMarks,
            "a quiz must allow at least one attempt",
        )
        .with_field("max_attempts"));
    }

    let mut validated = Vec::with_capacity(questions.len());
    let mut seen_ids = HashSet::new();
    for (position, question) in questions.into_iter().enumerate() {
        if !seen_ids.insert(question.id.clone()) {
            return Err(ValidationError::new(
                ErrorKind::DuplicateQuestionId,
                format!("duplicate question id: {}", question.id),
            )
            .with_field(format!("questions[{position}].id"))
            .at_position(position));
        }
        let valid = validate_question(question).map_err(|e| {
            let field = match &e.field {
                Some(f) => format!("questions[{position}].{f}"),
                None => format!("questions[{position}]"),
            };
            e.with_field(field).at_position(position)
        })?;
        validated.push(valid.into_inner());
    }

    let class_semester = meta.class_semester.trim().to_string();
    let assigned_student_ids = resolve_access(&class_semester, access, roster)?;

    let quiz = Quiz {
        id: if meta.id.trim().is_empty() {
            Uuid::new_v4().to_string()
        } else {
            meta.id
        },
        title: meta.title,
        description: meta.description,
        subject: meta.subject,
        class_semester,
        access_type: if assigned_student_ids.is_empty() {
            AccessType::AllClass
        } else {
            AccessType::SelectedStudents
        },
        assigned_student_ids,
        questions: validated,
        visibility: Visibility::Draft,
        passing_percentage: meta.passing_percentage,
        time_limit_minutes: meta.time_limit_minutes,
        max_attempts: meta.max_attempts,
        starts_at: meta.starts_at,
        ends_at: meta.ends_at,
        created_at: Utc::now(),
    };

    if let Some(declared) = meta.total_marks {
        let computed = quiz.total_marks();
        if (declared - computed).abs() > f64::EPSILON {
            tracing::debug!(
                quiz = %quiz.id,
                declared,
                computed,
                "declared total marks differ from question sum, using computed"
            );
        }
    }

    Ok(quiz)
}

/// Returns the assigned student set, empty for class-wide access.
fn resolve_access(
    class_semester: &str,
    access: AccessSpec,
    roster: &[Student],
) -> Result<BTreeSet<String>, ValidationError> {
    if class_semester.is_empty() {
        return Err(ValidationError::new(
            ErrorKind::InvalidClassSemester,
            "a class/semester is required",
        )
        .with_field("class_semester"));
    }

    match access.access_type {
        AccessType::AllClass => {
            if !access.assigned_student_ids.is_empty() {
                tracing::debug!(
                    count = access.assigned_student_ids.len(),
                    "ignoring student selection for class-wide quiz"
                );
            }
            Ok(BTreeSet::new())
        }
        AccessType::SelectedStudents => {
            if access.assigned_student_ids.is_empty() {
                return Err(ValidationError::new(
                    ErrorKind::EmptyStudentSelection,
                    "select at least one student",
                )
                .with_field("assigned_student_ids"));
            }

            let eligible: HashSet<&str> = roster
                .iter()
                .filter(|s| s.class_semester == class_semester)
                .map(|s| s.id.as_str())
                .collect();

            if let Some(unknown) = access
                .assigned_student_ids
                .iter()
                .find(|id| !eligible.contains(id.as_str()))
            {
                return Err(ValidationError::new(
                    ErrorKind::UnknownStudent,
                    format!("student {unknown} is not enrolled in {class_semester}"),
                )
                .with_field("assigned_student_ids"));
            }

            Ok(access.assigned_student_ids)
        }
    }
}

/// Make a quiz visible to its students. Requires at least one question.
pub fn publish_quiz(quiz: &Quiz) -> Result<Quiz, ValidationError> {
    if quiz.questions.is_empty() {
        return Err(ValidationError::new(
            ErrorKind::EmptyQuiz,
            format!("quiz '{}' has no questions", quiz.title),
        )
        .with_field("questions"));
    }
    let mut next = quiz.clone();
    next.visibility = Visibility::Published;
    Ok(next)
}

/// Return a quiz to draft.
pub fn unpublish_quiz(quiz: &Quiz) -> Quiz {
    let mut next = quiz.clone();
    next.visibility = Visibility::Draft;
    next
}
