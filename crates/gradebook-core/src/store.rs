//! File-backed collaborators: a JSON gradebook, a static roster, and a
//! notifier that writes to the log.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::model::{Grade, Quiz, Rubric, Student};
use crate::traits::{NotificationTarget, Notifier, Persistence, RosterLookup};

/// Everything the gradebook file holds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GradebookData {
    #[serde(default)]
    pub quizzes: BTreeMap<String, Quiz>,
    #[serde(default)]
    pub rubrics: BTreeMap<String, Rubric>,
    /// Keyed by submission id.
    #[serde(default)]
    pub grades: BTreeMap<String, Grade>,
}

/// A gradebook persisted as one pretty-printed JSON file.
///
/// Every write rewrites the whole file through a temporary sibling and a
/// rename. A write that fails leaves both the file and the in-memory copy
/// unchanged. Without a path the gradebook lives in memory only.
pub struct JsonGradebook {
    path: Option<PathBuf>,
    data: RwLock<GradebookData>,
}

impl JsonGradebook {
    pub fn in_memory() -> Self {
        Self {
            path: None,
            data: RwLock::new(GradebookData::default()),
        }
    }

    /// Open the gradebook at `path`, starting empty if the file does not exist.
    pub fn open(path: &Path) -> Result<Self> {
        let data = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read gradebook from {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("failed to parse gradebook {}", path.display()))?
        } else {
            tracing::debug!("no gradebook at {}, starting empty", path.display());
            GradebookData::default()
        };

        Ok(Self {
            path: Some(path.to_path_buf()),
            data: RwLock::new(data),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// A copy of the current contents.
    pub async fn snapshot(&self) -> GradebookData {
        self.data.read().await.clone()
    }

    /// Apply `change` to a copy, persist it, then make it current.
    async fn update(&self, change: impl FnOnce(&mut GradebookData)) -> Result<()> {
        let mut data = self.data.write().await;
        let mut next = data.clone();
        change(&mut next);
        self.persist(&next).await?;
        *data = next;
        Ok(())
    }

    async fn persist(&self, data: &GradebookData) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let json = serde_json::to_string_pretty(data).context("failed to serialize gradebook")?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let mut tmp = path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        tokio::fs::write(&tmp, json)
            .await
            .with_context(|| format!("failed to write gradebook to {}", tmp.display()))?;
        if let Err(e) = tokio::fs::rename(&tmp, path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e)
                .with_context(|| format!("failed to replace gradebook at {}", path.display()));
        }
        Ok(())
    }
}

#[async_trait]
impl Persistence for JsonGradebook {
    async fn save_quiz(&self, quiz: &Quiz) -> Result<()> {
        self.update(|data| {
            data.quizzes.insert(quiz.id.clone(), quiz.clone());
        })
        .await
    }

    async fn load_quiz(&self, quiz_id: &str) -> Result<Option<Quiz>> {
        Ok(self.data.read().await.quizzes.get(quiz_id).cloned())
    }

    async fn save_rubric(&self, rubric: &Rubric) -> Result<()> {
        self.update(|data| {
            data.rubrics.insert(rubric.id.clone(), rubric.clone());
        })
        .await
    }

    async fn load_rubric(&self, rubric_id: &str) -> Result<Rubric> {
        self.data
            .read()
            .await
            .rubrics
            .get(rubric_id)
            .cloned()
            .with_context(|| format!("rubric not found: {rubric_id}"))
    }

    async fn save_grade(&self, grade: &Grade) -> Result<()> {
        self.update(|data| {
            data.grades
                .insert(grade.submission_id.clone(), grade.clone());
        })
        .await
    }

    async fn load_grade(&self, submission_id: &str) -> Result<Option<Grade>> {
        Ok(self.data.read().await.grades.get(submission_id).cloned())
    }

    async fn list_grades(&self) -> Result<Vec<Grade>> {
        Ok(self.data.read().await.grades.values().cloned().collect())
    }
}

/// A roster known up front, e.g. loaded from a roster file.
pub struct StaticRoster {
    students: Vec<Student>,
}

impl StaticRoster {
    pub fn new(students: Vec<Student>) -> Self {
        Self { students }
    }
}

#[async_trait]
impl RosterLookup for StaticRoster {
    async fn students_by_class(&self, class_semester: &str) -> Result<Vec<Student>> {
        Ok(self
            .students
            .iter()
            .filter(|s| s.class_semester == class_semester)
            .cloned()
            .collect())
    }
}

/// Notifier that records publications in the log instead of delivering them.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &str {
        "log"
    }

    async fn notify_students(&self, target: &NotificationTarget) -> Result<()> {
        match target {
            NotificationTarget::Quiz(id) => tracing::info!(quiz = %id, "students notified"),
            NotificationTarget::Grade(id) => tracing::info!(grade = %id, "student notified"),
        }
        Ok(())
    }
}
