//! Question bank validation.
//!
//! `validate_question` is the only way to obtain a [`ValidQuestion`]. It is
//! pure: it normalizes the answer key and synthesizes TRUE_FALSE options but
//! never coerces marks or other authored values.

use std::ops::Deref;

use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, ValidationError};
use crate::model::{AnswerOption, Question, QuestionType};

pub const TRUE_LITERAL: &str = "True";
pub const FALSE_LITERAL: &str = "False";

/// A question that passed structural validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidQuestion(Question);

impl ValidQuestion {
    pub fn into_inner(self) -> Question {
        self.0
    }
}

impl Deref for ValidQuestion {
    type Target = Question;

    fn deref(&self) -> &Question {
        &self.0
    }
}

impl From<ValidQuestion> for Question {
    fn from(valid: ValidQuestion) -> Self {
        valid.0
    }
}

/// Validate a candidate question and normalize its answer key.
///
/// - MCQ: at least two options, all with text, exactly one correct. The
///   answer text is set to the correct option's text.
/// - TRUE_FALSE: the answer must be `"True"` or `"False"`; options are
///   replaced by the synthesized `True`/`False` pair.
/// - SHORT_ANSWER: the answer must be non-empty; options are dropped.
pub fn validate_question(mut question: Question) -> Result<ValidQuestion, ValidationError> {
    if question.text.trim().is_empty() {
        return Err(
            ValidationError::new(ErrorKind::EmptyField, "question text is empty")
                .with_field("text"),
        );
    }

    if !question.marks.is_finite() || question.marks <= 0.0 {
        return Err(ValidationError::new(
            ErrorKind::InvalidMarks,
            format!("marks must be a positive number, got {}", question.marks),
        )
        .with_field("marks"));
    }

    match question.question_type {
        QuestionType::Mcq => {
            let correct_text = validate_mcq_options(&question.options)?;
            question.correct_answer_text = correct_text;
        }
        QuestionType::TrueFalse => {
            let answer = question.correct_answer_text.trim();
            let is_true = match answer {
                TRUE_LITERAL => true,
                FALSE_LITERAL => false,
                other => {
                    return Err(ValidationError::new(
                        ErrorKind::InvalidAnswerLiteral,
                        format!("true/false answer must be \"True\" or \"False\", got {other:?}"),
                    )
                    .with_field("correct_answer_text"));
                }
            };
            question.correct_answer_text = answer.to_string();
            question.options = true_false_options(is_true);
        }
        QuestionType::ShortAnswer => {
            if question.correct_answer_text.trim().is_empty() {
                return Err(ValidationError::new(
                    ErrorKind::EmptyField,
                    "short answer question has no expected answer",
                )
                .with_field("correct_answer_text"));
            }
            question.options.clear();
        }
    }

    Ok(ValidQuestion(question))
}

/// Returns the correct option's text.
fn validate_mcq_options(options: &[AnswerOption]) -> Result<String, ValidationError> {
    if options.len() < 2 {
        return Err(ValidationError::new(
            ErrorKind::MissingOptions,
            format!(
                "multiple choice question needs at least 2 options, got {}",
                options.len()
            ),
        )
        .with_field("options"));
    }

    if let Some(index) = options.iter().position(|o| o.option_text.trim().is_empty()) {
        return Err(ValidationError::new(
            ErrorKind::EmptyOptionText,
            format!("option {} has no text", index + 1),
        )
        .with_field(format!("options[{index}]")));
    }

    let mut correct = options.iter().filter(|o| o.is_correct);
    match (correct.next(), correct.next()) {
        (Some(option), None) => Ok(option.option_text.clone()),
        (None, _) => Err(ValidationError::new(
            ErrorKind::NoCorrectOption,
            "no option is marked correct",
        )
        .with_field("options")),
        (Some(_), Some(_)) => Err(ValidationError::new(
            ErrorKind::MultipleCorrectOptions,
            "more than one option is marked correct",
        )
        .with_field("options")),
    }
}

/// The synthesized option pair, always `True` first.
fn true_false_options(is_true: bool) -> Vec<AnswerOption> {
    vec![
        AnswerOption::new(TRUE_LITERAL, is_true),
        AnswerOption::new(FALSE_LITERAL, !is_true),
    ]
}
