//! Automatic evaluation of quiz attempts.
//!
//! Objective questions are marked against the answer key; each question is
//! all-or-nothing. Unanswered questions score zero.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, ValidationError};
use crate::model::{Question, QuestionType, Quiz, Student, Visibility};
use crate::scoring::percentage_of;

/// A student's answer to one question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Answer {
    Bool(bool),
    Text(String),
}

impl From<bool> for Answer {
    fn from(value: bool) -> Self {
        Answer::Bool(value)
    }
}

impl From<&str> for Answer {
    fn from(value: &str) -> Self {
        Answer::Text(value.to_string())
    }
}

/// How one question was marked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionOutcome {
    pub question_id: String,
    pub answered: bool,
    pub correct: bool,
    pub awarded: f64,
    pub marks: f64,
}

/// The marked attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptResult {
    pub score: f64,
    pub total_marks: f64,
    pub percentage: f64,
    pub passed: bool,
    pub correct_count: usize,
    pub outcomes: Vec<QuestionOutcome>,
}

/// Mark an attempt. `answers` is keyed by question id.
pub fn evaluate_attempt(quiz: &Quiz, answers: &HashMap<String, Answer>) -> AttemptResult {
    let outcomes: Vec<QuestionOutcome> = quiz
        .questions
        .iter()
        .map(|question| {
            let answer = answers.get(&question.id);
            let correct = answer.is_some_and(|a| is_correct(question, a));
            QuestionOutcome {
                question_id: question.id.clone(),
                answered: answer.is_some(),
                correct,
                awarded: if correct { question.marks } else { 0.0 },
                marks: question.marks,
            }
        })
        .collect();

    let score: f64 = outcomes.iter().map(|o| o.awarded).sum();
    let total_marks = quiz.total_marks();
    let percentage = percentage_of(score, total_marks);

    AttemptResult {
        score,
        total_marks,
        percentage,
        passed: percentage >= quiz.passing_percentage,
        correct_count: outcomes.iter().filter(|o| o.correct).count(),
        outcomes,
    }
}

fn is_correct(question: &Question, answer: &Answer) -> bool {
    match (question.question_type, answer) {
        (QuestionType::Mcq, Answer::Text(chosen)) => question
            .correct_option()
            .is_some_and(|o| o.option_text.trim().eq_ignore_ascii_case(chosen.trim())),
        (QuestionType::TrueFalse, answer) => {
            let expected = question
                .correct_option()
                .map(|o| o.option_text.eq_ignore_ascii_case("true"));
            let given = match answer {
                Answer::Bool(b) => Some(*b),
                Answer::Text(t) => match t.trim().to_lowercase().as_str() {
                    "true" => Some(true),
                    "false" => Some(false),
                    _ => None,
                },
            };
            expected.is_some() && expected == given
        }
        (QuestionType::ShortAnswer, Answer::Text(text)) => {
            text.trim().to_lowercase() == question.correct_answer_text.trim().to_lowercase()
        }
        _ => false,
    }
}

/// Check whether `student` may start another attempt at `now`.
pub fn check_attempt_allowed(
    quiz: &Quiz,
    student: &Student,
    now: DateTime<Utc>,
    attempts_used: u32,
) -> Result<(), ValidationError> {
    if quiz.visibility != Visibility::Published {
        return Err(ValidationError::new(
            ErrorKind::QuizNotPublished,
            format!("quiz '{}' is not published", quiz.title),
        ));
    }
    if !quiz.is_visible_to(student) {
        return Err(ValidationError::new(
            ErrorKind::StudentNotAssigned,
            format!("student {} is not assigned to '{}'", student.id, quiz.title),
        ));
    }
    if quiz.starts_at.is_some_and(|start| now < start) {
        return Err(ValidationError::new(
            ErrorKind::QuizClosed,
            format!("quiz '{}' has not opened yet", quiz.title),
        ));
    }
    if quiz.ends_at.is_some_and(|end| now > end) {
        return Err(ValidationError::new(
            ErrorKind::QuizClosed,
            format!("quiz '{}' has closed", quiz.title),
        ));
    }
    if attempts_used >= quiz.max_attempts {
        return Err(ValidationError::new(
            ErrorKind::AttemptsExhausted,
            format!(
                "all {} attempt(s) at '{}' have been used",
                quiz.max_attempts, quiz.title
            ),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AccessType, AnswerOption};
    use crate::question::validate_question;
    use chrono::Duration;
    use std::collections::BTreeSet;

    fn quiz() -> Quiz {
        let questions = vec![
            Question {
                id: "q1".into(),
                text: "Which trait enables `?` on Option?".into(),
                question_type: QuestionType::Mcq,
                marks: 2.0,
                options: vec![
                    AnswerOption::new("Try", true),
                    AnswerOption::new("From", false),
                ],
                correct_answer_text: String::new(),
            },
            Question {
                id: "q2".into(),
                text: "Slices own their data.".into(),
                question_type: QuestionType::TrueFalse,
                marks: 1.0,
                options: vec![],
                correct_answer_text: "False".into(),
            },
            Question {
                id: "q3".into(),
                text: "Keyword for a trait object?".into(),
                question_type: QuestionType::ShortAnswer,
                marks: 2.0,
                options: vec![],
                correct_answer_text: "dyn".into(),
            },
        ]
        .into_iter()
        .map(|q| validate_question(q).unwrap().into_inner())
        .collect();

        Quiz {
            id: "quiz".into(),
            title: "Traits".into(),
            description: String::new(),
            subject: "Rust".into(),
            class_semester: "CS-2A".into(),
            access_type: AccessType::AllClass,
            assigned_student_ids: BTreeSet::new(),
            questions,
            visibility: Visibility::Published,
            passing_percentage: 60.0,
            time_limit_minutes: Some(20),
            max_attempts: 2,
            starts_at: None,
            ends_at: None,
            created_at: Utc::now(),
        }
    }

    fn student(class_semester: &str) -> Student {
        Student {
            id: "s1".into(),
            username: "ana".into(),
            class_semester: class_semester.into(),
        }
    }

    #[test]
    fn all_correct() {
        let answers = HashMap::from([
            ("q1".to_string(), Answer::from(" try ")),
            ("q2".to_string(), Answer::from(false)),
            ("q3".to_string(), Answer::from("DYN")),
        ]);
        let result = evaluate_attempt(&quiz(), &answers);
        assert_eq!(result.score, 5.0);
        assert_eq!(result.percentage, 100.0);
        assert_eq!(result.correct_count, 3);
        assert!(result.passed);
    }

    #[test]
    fn partial_and_unanswered() {
        let answers = HashMap::from([
            ("q1".to_string(), Answer::from("From")),
            ("q2".to_string(), Answer::from("false")),
        ]);
        let result = evaluate_attempt(&quiz(), &answers);
        assert_eq!(result.score, 1.0);
        assert_eq!(result.percentage, 20.0);
        assert!(!result.passed);
        assert!(!result.outcomes[2].answered);
        assert_eq!(result.outcomes[1].awarded, 1.0);
    }

    #[test]
    fn mismatched_answer_shape_is_wrong() {
        let answers = HashMap::from([("q1".to_string(), Answer::from(true))]);
        let result = evaluate_attempt(&quiz(), &answers);
        assert!(!result.outcomes[0].correct);
        assert!(result.outcomes[0].answered);
    }

    #[test]
    fn answers_deserialize_untagged() {
        let answers: HashMap<String, Answer> =
            serde_json::from_str(r#"{"q1": "Try", "q2": false}"#).unwrap();
        assert_eq!(answers["q2"], Answer::Bool(false));
        assert_eq!(answers["q1"], Answer::Text("Try".into()));
    }

    #[test]
    fn attempt_gating() {
        let now = Utc::now();
        let mut q = quiz();
        assert!(check_attempt_allowed(&q, &student("CS-2A"), now, 1).is_ok());
        assert_eq!(
            check_attempt_allowed(&q, &student("CS-2A"), now, 2)
                .unwrap_err()
                .kind,
            ErrorKind::AttemptsExhausted
        );
        assert_eq!(
            check_attempt_allowed(&q, &student("CS-4B"), now, 0)
                .unwrap_err()
                .kind,
            ErrorKind::StudentNotAssigned
        );

        q.ends_at = Some(now - Duration::hours(1));
        assert_eq!(
            check_attempt_allowed(&q, &student("CS-2A"), now, 0)
                .unwrap_err()
                .kind,
            ErrorKind::QuizClosed
        );

        q.visibility = Visibility::Draft;
        assert_eq!(
            check_attempt_allowed(&q, &student("CS-2A"), now, 0)
                .unwrap_err()
                .kind,
            ErrorKind::QuizNotPublished
        );
    }
}
