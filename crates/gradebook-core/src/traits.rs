//! External collaborator traits.
//!
//! The core never talks to a database, a roster service, or a mail system
//! directly. These async traits are the boundary; `store` provides file-backed
//! implementations and tests provide in-memory ones.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{Grade, Quiz, Rubric, Student};

// ---------------------------------------------------------------------------
// Roster lookup
// ---------------------------------------------------------------------------

/// Source of enrolled students.
#[async_trait]
pub trait RosterLookup: Send + Sync {
    /// All students enrolled in the given class/semester.
    async fn students_by_class(&self, class_semester: &str) -> anyhow::Result<Vec<Student>>;
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

/// Storage for quiz definitions, rubrics, and grades.
///
/// Grades are keyed by submission id: a submission has at most one grade.
#[async_trait]
pub trait Persistence: Send + Sync {
    async fn save_quiz(&self, quiz: &Quiz) -> anyhow::Result<()>;

    async fn load_quiz(&self, quiz_id: &str) -> anyhow::Result<Option<Quiz>>;

    async fn save_rubric(&self, rubric: &Rubric) -> anyhow::Result<()>;

    /// Load a rubric, failing if it does not exist.
    async fn load_rubric(&self, rubric_id: &str) -> anyhow::Result<Rubric>;

    async fn save_grade(&self, grade: &Grade) -> anyhow::Result<()>;

    async fn load_grade(&self, submission_id: &str) -> anyhow::Result<Option<Grade>>;

    async fn list_grades(&self) -> anyhow::Result<Vec<Grade>>;
}

// ---------------------------------------------------------------------------
// Notification
// ---------------------------------------------------------------------------

/// What a notification is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum NotificationTarget {
    Quiz(String),
    Grade(Uuid),
}

/// Fire-and-forget delivery of "something was published" messages.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Human-readable notifier name (e.g. "log").
    fn name(&self) -> &str;

    async fn notify_students(&self, target: &NotificationTarget) -> anyhow::Result<()>;
}

/// Notifier that drops every message.
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    fn name(&self) -> &str {
        "noop"
    }

    async fn notify_students(&self, _: &NotificationTarget) -> anyhow::Result<()> {
        Ok(())
    }
}
