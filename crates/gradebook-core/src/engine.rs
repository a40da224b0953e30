//! Grading engine orchestrator.
//!
//! Runs lifecycle transitions against the persistence and notification
//! collaborators. Transitions for the same submission are serialized, as are
//! writes to the same quiz. A notification failure is logged and never undoes
//! a transition.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use chrono::Utc;
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::{OwnedMutexGuard, Semaphore};

use crate::error::LifecycleError;
use crate::lifecycle::{self, DraftInput, GradingScheme};
use crate::model::{Grade, GradeStatus, Question, Quiz, Rubric, ScoringMode};
use crate::quiz::{self, AccessSpec, QuizMeta};
use crate::traits::{NotificationTarget, Notifier, Persistence, RosterLookup};

/// Configuration for the grading engine.
#[derive(Debug, Clone)]
pub struct GradingEngineConfig {
    /// Treat unscored rubric criteria as an error instead of 0.
    pub strict_criteria: bool,
    /// Send notifications after publish-type transitions.
    pub notify: bool,
    /// Maximum concurrent transitions in batch operations.
    pub parallelism: usize,
}

impl Default for GradingEngineConfig {
    fn default() -> Self {
        Self {
            strict_criteria: false,
            notify: true,
            parallelism: 4,
        }
    }
}

/// How a submission is scored when a draft is saved.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemeRef {
    /// Score against the stored rubric with this id.
    Rubric(String),
    Manual { max_marks: f64 },
}

type LockMap = Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>;

/// One async mutex per key, created on demand and dropped with its last user.
#[derive(Default)]
struct KeyedLocks {
    locks: Arc<LockMap>,
}

impl KeyedLocks {
    async fn lock(&self, key: String) -> KeyedGuard {
        let lock = {
            let mut locks = self
                .locks
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            Arc::clone(locks.entry(key.clone()).or_default())
        };
        KeyedGuard {
            guard: Some(lock.lock_owned().await),
            key,
            locks: Arc::clone(&self.locks),
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

struct KeyedGuard {
    guard: Option<OwnedMutexGuard<()>>,
    key: String,
    locks: Arc<LockMap>,
}

impl Drop for KeyedGuard {
    fn drop(&mut self) {
        self.guard.take();
        let mut locks = self
            .locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // Waiters hold their own clone, so a count of one means only the map is left.
        if locks
            .get(&self.key)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.key);
        }
    }
}

/// The central grading engine.
pub struct GradingEngine {
    persistence: Arc<dyn Persistence>,
    roster: Arc<dyn RosterLookup>,
    notifier: Arc<dyn Notifier>,
    config: GradingEngineConfig,
    locks: KeyedLocks,
}

impl GradingEngine {
    pub fn new(
        persistence: Arc<dyn Persistence>,
        roster: Arc<dyn RosterLookup>,
        notifier: Arc<dyn Notifier>,
        config: GradingEngineConfig,
    ) -> Self {
        Self {
            persistence,
            roster,
            notifier,
            config,
            locks: KeyedLocks::default(),
        }
    }

    /// Wait for exclusive access to a submission's grade.
    async fn lock_submission(&self, submission_id: &str) -> KeyedGuard {
        self.locks.lock(format!("grade:{submission_id}")).await
    }

    async fn lock_quiz(&self, quiz_id: &str) -> KeyedGuard {
        self.locks.lock(format!("quiz:{quiz_id}")).await
    }

    async fn current_grade(&self, submission_id: &str) -> Result<Grade> {
        Ok(self
            .persistence
            .load_grade(submission_id)
            .await?
            .unwrap_or_else(|| Grade::ungraded(submission_id)))
    }

    async fn notify(&self, target: NotificationTarget) {
        if !self.config.notify {
            return;
        }
        if let Err(e) = self.notifier.notify_students(&target).await {
            tracing::warn!(
                notifier = self.notifier.name(),
                "notification for {target:?} failed: {e:#}"
            );
        }
    }

    /// The grade for a submission, if any grading action has happened.
    pub async fn grade(&self, submission_id: &str) -> Result<Option<Grade>> {
        self.persistence.load_grade(submission_id).await
    }

    /// Save (or re-save) a draft grade.
    pub async fn save_draft(
        &self,
        submission_id: &str,
        scheme: &SchemeRef,
        input: DraftInput,
    ) -> Result<Grade> {
        let _guard = self.lock_submission(submission_id).await;
        let grade = self.current_grade(submission_id).await?;

        let input = if self.config.strict_criteria {
            input.strict(true)
        } else {
            input
        };

        let next = match scheme {
            SchemeRef::Rubric(rubric_id) => {
                let rubric = self.persistence.load_rubric(rubric_id).await?;
                lifecycle::save_draft(&grade, &GradingScheme::Rubric(&rubric), input, Utc::now())?
            }
            SchemeRef::Manual { max_marks } => lifecycle::save_draft(
                &grade,
                &GradingScheme::Manual {
                    max_marks: *max_marks,
                },
                input,
                Utc::now(),
            )?,
        };

        self.persistence.save_grade(&next).await?;
        tracing::info!(submission = submission_id, marks = next.marks, "draft saved");
        Ok(next)
    }

    /// Publish a draft grade and notify the student.
    pub async fn publish(&self, submission_id: &str) -> Result<Grade> {
        let _guard = self.lock_submission(submission_id).await;
        let grade = self.current_grade(submission_id).await?;

        let next = match &grade.scoring {
            Some(ScoringMode::Rubric { rubric_id }) => {
                let rubric: Rubric = self.persistence.load_rubric(rubric_id).await?;
                lifecycle::publish(&grade, &GradingScheme::Rubric(&rubric), Utc::now())?
            }
            Some(ScoringMode::Manual { max_marks }) => lifecycle::publish(
                &grade,
                &GradingScheme::Manual {
                    max_marks: *max_marks,
                },
                Utc::now(),
            )?,
            // Never scored, so it cannot be a draft.
            None => {
                return Err(LifecycleError::InvalidTransition {
                    from: grade.status,
                    to: GradeStatus::Published,
                }
                .into())
            }
        };

        self.persistence.save_grade(&next).await?;
        tracing::info!(submission = submission_id, "grade published");
        self.notify(NotificationTarget::Grade(next.id)).await;
        Ok(next)
    }

    /// Return a published grade to draft.
    pub async fn unpublish(&self, submission_id: &str) -> Result<Grade> {
        let _guard = self.lock_submission(submission_id).await;
        let grade = self.current_grade(submission_id).await?;
        let next = lifecycle::unpublish(&grade)?;
        self.persistence.save_grade(&next).await?;
        tracing::info!(submission = submission_id, "grade unpublished");
        Ok(next)
    }

    /// Reject a submission, creating its grade first if none exists.
    pub async fn reject(
        &self,
        submission_id: &str,
        reason: &str,
        grader_id: Option<&str>,
    ) -> Result<Grade> {
        let _guard = self.lock_submission(submission_id).await;
        let existing = self.persistence.load_grade(submission_id).await?;
        let next = lifecycle::reject(
            existing.as_ref(),
            submission_id,
            reason,
            grader_id,
            Utc::now(),
        )?;
        self.persistence.save_grade(&next).await?;
        tracing::info!(submission = submission_id, grade = %next.id, "submission rejected");
        self.notify(NotificationTarget::Grade(next.id)).await;
        Ok(next)
    }

    /// Publish several drafts concurrently.
    ///
    /// Returns one result per submission id, in completion order.
    pub async fn publish_all(&self, submission_ids: &[String]) -> Vec<(String, Result<Grade>)> {
        let semaphore = Semaphore::new(self.config.parallelism.max(1));
        let mut futures = FuturesUnordered::new();

        for submission_id in submission_ids {
            let semaphore = &semaphore;
            futures.push(async move {
                let result = match semaphore.acquire().await {
                    Ok(_permit) => self.publish(submission_id).await,
                    Err(_) => Err(anyhow::anyhow!("semaphore closed")),
                };
                (submission_id.clone(), result)
            });
        }

        let mut results = Vec::with_capacity(submission_ids.len());
        while let Some((submission_id, result)) = futures.next().await {
            if let Err(e) = &result {
                tracing::error!("publish failed for {submission_id}: {e:#}");
            }
            results.push((submission_id, result));
        }
        results
    }

    /// Assemble a quiz against the class roster and store it as a draft.
    pub async fn create_quiz(
        &self,
        meta: QuizMeta,
        questions: Vec<Question>,
        access: AccessSpec,
    ) -> Result<Quiz> {
        let class_semester = meta.class_semester.trim().to_string();
        let roster = if class_semester.is_empty() {
            Vec::new()
        } else {
            self.roster.students_by_class(&class_semester).await?
        };

        let quiz = quiz::assemble_quiz(meta, questions, access, &roster)?;
        let _guard = self.lock_quiz(&quiz.id).await;
        self.persistence.save_quiz(&quiz).await?;
        tracing::info!(
            quiz = %quiz.id,
            questions = quiz.questions.len(),
            total_marks = quiz.total_marks(),
            "quiz created"
        );
        Ok(quiz)
    }

    /// Publish a stored quiz and notify its students.
    pub async fn publish_quiz(&self, quiz_id: &str) -> Result<Quiz> {
        let _guard = self.lock_quiz(quiz_id).await;
        let Some(stored) = self.persistence.load_quiz(quiz_id).await? else {
            anyhow::bail!("quiz not found: {quiz_id}");
        };
        let published = quiz::publish_quiz(&stored)?;
        self.persistence.save_quiz(&published).await?;
        tracing::info!(quiz = quiz_id, "quiz published");
        self.notify(NotificationTarget::Quiz(published.id.clone()))
            .await;
        Ok(published)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;

    use crate::error::ErrorKind;
    use crate::lifecycle::ScoreInput;
    use crate::model::{CriterionScore, QuestionType, RubricCriterion, Student, Visibility};
    use crate::store::{JsonGradebook, StaticRoster};

    struct CountingNotifier {
        calls: AtomicU32,
        fail: bool,
    }

    #[async_trait]
    impl Notifier for CountingNotifier {
        fn name(&self) -> &str {
            "counting"
        }

        async fn notify_students(&self, _: &NotificationTarget) -> anyhow::Result<()> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            if self.fail {
                anyhow::bail!("mail server unreachable");
            }
            Ok(())
        }
    }

    fn engine(fail_notify: bool) -> (GradingEngine, Arc<JsonGradebook>, Arc<CountingNotifier>) {
        let store = Arc::new(JsonGradebook::in_memory());
        let notifier = Arc::new(CountingNotifier {
            calls: AtomicU32::new(0),
            fail: fail_notify,
        });
        let roster = Arc::new(StaticRoster::new(vec![Student {
            id: "s1".into(),
            username: "ana".into(),
            class_semester: "CS-2A".into(),
        }]));
        let engine = GradingEngine::new(
            store.clone(),
            roster,
            notifier.clone(),
            GradingEngineConfig::default(),
        );
        (engine, store, notifier)
    }

    fn lifecycle_kind(err: &anyhow::Error) -> ErrorKind {
        err.downcast_ref::<LifecycleError>()
            .map(LifecycleError::kind)
            .expect("expected a lifecycle error")
    }

    #[tokio::test]
    async fn draft_then_publish_notifies() {
        let (engine, store, notifier) = engine(false);
        engine
            .save_draft(
                "sub-1",
                &SchemeRef::Manual { max_marks: 10.0 },
                DraftInput::new(ScoreInput::Marks(8.0), "Good"),
            )
            .await
            .unwrap();
        let published = engine.publish("sub-1").await.unwrap();
        assert_eq!(published.status, GradeStatus::Published);
        assert_eq!(notifier.calls.load(Ordering::Relaxed), 1);

        let stored = store.load_grade("sub-1").await.unwrap().unwrap();
        assert_eq!(stored.status, GradeStatus::Published);
        assert_eq!(stored.marks, 8.0);
    }

    #[tokio::test]
    async fn notification_failure_does_not_roll_back() {
        let (engine, store, notifier) = engine(true);
        engine
            .save_draft(
                "sub-1",
                &SchemeRef::Manual { max_marks: 10.0 },
                DraftInput::new(ScoreInput::Marks(8.0), ""),
            )
            .await
            .unwrap();
        engine.publish("sub-1").await.unwrap();
        assert_eq!(notifier.calls.load(Ordering::Relaxed), 1);
        let stored = store.load_grade("sub-1").await.unwrap().unwrap();
        assert_eq!(stored.status, GradeStatus::Published);
    }

    #[tokio::test]
    async fn publish_without_grade_writes_nothing() {
        let (engine, store, _) = engine(false);
        let err = engine.publish("sub-404").await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<LifecycleError>(),
            Some(&LifecycleError::InvalidTransition {
                from: GradeStatus::Ungraded,
                to: GradeStatus::Published,
            })
        );
        assert!(store.load_grade("sub-404").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn reject_without_grade_is_stable_on_reload() {
        let (engine, store, _) = engine(false);
        let rejected = engine
            .reject("sub-2", "Submitted the wrong file", Some("t1"))
            .await
            .unwrap();
        assert_eq!(rejected.marks, 0.0);
        assert_eq!(rejected.status, GradeStatus::Rejected);

        let reloaded = store.load_grade("sub-2").await.unwrap().unwrap();
        assert_eq!(reloaded.id, rejected.id);
        assert_eq!(
            reloaded.rejection_reason.as_deref(),
            Some("Submitted the wrong file")
        );
    }

    #[tokio::test]
    async fn rubric_draft_uses_stored_rubric() {
        let (engine, store, _) = engine(false);
        store
            .save_rubric(&Rubric {
                id: "r1".into(),
                title: "Lab".into(),
                total_marks: 15.0,
                criteria: vec![
                    RubricCriterion {
                        id: "logic".into(),
                        name: "Logic".into(),
                        description: String::new(),
                        max_points: 10.0,
                    },
                    RubricCriterion {
                        id: "style".into(),
                        name: "Style".into(),
                        description: String::new(),
                        max_points: 5.0,
                    },
                ],
            })
            .await
            .unwrap();

        let draft = engine
            .save_draft(
                "sub-3",
                &SchemeRef::Rubric("r1".into()),
                DraftInput::new(
                    ScoreInput::Criteria(vec![CriterionScore::new("logic", 7.0)]),
                    "",
                ),
            )
            .await
            .unwrap();
        assert_eq!(draft.marks, 7.0);
        assert_eq!(draft.criterion_scores.len(), 2);

        let err = engine
            .save_draft(
                "sub-3",
                &SchemeRef::Manual { max_marks: 15.0 },
                DraftInput::new(ScoreInput::Marks(1.0), ""),
            )
            .await
            .unwrap_err();
        assert_eq!(lifecycle_kind(&err), ErrorKind::ScoringModeConflict);
    }

    #[tokio::test]
    async fn strict_config_applies_to_drafts() {
        let store = Arc::new(JsonGradebook::in_memory());
        store
            .save_rubric(&Rubric {
                id: "r1".into(),
                title: "Lab".into(),
                total_marks: 5.0,
                criteria: vec![RubricCriterion {
                    id: "logic".into(),
                    name: "Logic".into(),
                    description: String::new(),
                    max_points: 5.0,
                }],
            })
            .await
            .unwrap();
        let engine = GradingEngine::new(
            store,
            Arc::new(StaticRoster::new(vec![])),
            Arc::new(crate::traits::NoopNotifier),
            GradingEngineConfig {
                strict_criteria: true,
                ..Default::default()
            },
        );
        let err = engine
            .save_draft(
                "sub-4",
                &SchemeRef::Rubric("r1".into()),
                DraftInput::new(ScoreInput::Criteria(vec![]), ""),
            )
            .await
            .unwrap_err();
        assert_eq!(lifecycle_kind(&err), ErrorKind::MissingCriterionScore);
    }

    #[tokio::test]
    async fn publish_all_reports_each_submission() {
        let (engine, _, notifier) = engine(false);
        for id in ["a", "b"] {
            engine
                .save_draft(
                    id,
                    &SchemeRef::Manual { max_marks: 5.0 },
                    DraftInput::new(ScoreInput::Marks(4.0), ""),
                )
                .await
                .unwrap();
        }
        let ids = vec!["a".to_string(), "b".to_string(), "missing".to_string()];
        let results = engine.publish_all(&ids).await;
        assert_eq!(results.len(), 3);
        let failed: Vec<_> = results
            .iter()
            .filter(|(_, r)| r.is_err())
            .map(|(id, _)| id.as_str())
            .collect();
        assert_eq!(failed, vec!["missing"]);
        assert_eq!(notifier.calls.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn concurrent_transitions_are_serialized() {
        let (engine, store, _) = engine(false);
        let engine = Arc::new(engine);
        engine
            .save_draft(
                "sub-5",
                &SchemeRef::Manual { max_marks: 10.0 },
                DraftInput::new(ScoreInput::Marks(5.0), ""),
            )
            .await
            .unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let engine = Arc::clone(&engine);
                tokio::spawn(async move { engine.publish("sub-5").await })
            })
            .collect();

        let mut succeeded = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                succeeded += 1;
            }
        }
        assert_eq!(succeeded, 1);
        let stored = store.load_grade("sub-5").await.unwrap().unwrap();
        assert_eq!(stored.status, GradeStatus::Published);
        assert_eq!(engine.locks.len(), 0);
    }

    #[tokio::test]
    async fn submission_locks_are_released() {
        let (engine, _, _) = engine(false);
        for i in 0..20 {
            let submission = format!("sub-{i}");
            engine
                .save_draft(
                    &submission,
                    &SchemeRef::Manual { max_marks: 10.0 },
                    DraftInput::new(ScoreInput::Marks(5.0), ""),
                )
                .await
                .unwrap();
            engine.publish(&submission).await.unwrap();
        }
        assert!(engine.publish("never-drafted").await.is_err());
        assert_eq!(engine.locks.len(), 0);
    }

    #[tokio::test]
    async fn quiz_publication_waits_for_quiz_lock() {
        let (engine, store, _) = engine(false);
        let engine = Arc::new(engine);
        engine
            .create_quiz(quiz_meta("quiz-2"), vec![tf_question()], AccessSpec::selected(["s1"]))
            .await
            .unwrap();

        let held = engine.lock_quiz("quiz-2").await;
        let publishing = {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.publish_quiz("quiz-2").await })
        };
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        let stored = store.load_quiz("quiz-2").await.unwrap().unwrap();
        assert_eq!(stored.visibility, Visibility::Draft);

        drop(held);
        let published = publishing.await.unwrap().unwrap();
        assert_eq!(published.visibility, Visibility::Published);
        assert_eq!(engine.locks.len(), 0);
    }

    fn quiz_meta(id: &str) -> QuizMeta {
        QuizMeta {
            id: id.into(),
            title: "Borrowing".into(),
            class_semester: "CS-2A".into(),
            ..Default::default()
        }
    }

    fn tf_question() -> Question {
        Question {
            id: "q1".into(),
            text: "References are non-owning.".into(),
            question_type: QuestionType::TrueFalse,
            marks: 1.0,
            options: vec![],
            correct_answer_text: "True".into(),
        }
    }

    #[tokio::test]
    async fn create_and_publish_quiz() {
        let (engine, store, notifier) = engine(false);
        let quiz = engine
            .create_quiz(
                QuizMeta {
                    id: "quiz-1".into(),
                    title: "Borrowing".into(),
                    class_semester: "CS-2A".into(),
                    ..Default::default()
                },
                vec![Question {
                    id: "q1".into(),
                    text: "References are non-owning.".into(),
                    question_type: QuestionType::TrueFalse,
                    marks: 1.0,
                    options: vec![],
                    correct_answer_text: "True".into(),
                }],
                AccessSpec::selected(["s1"]),
            )
            .await
            .unwrap();
        assert_eq!(quiz.visibility, Visibility::Draft);

        let published = engine.publish_quiz("quiz-1").await.unwrap();
        assert_eq!(published.visibility, Visibility::Published);
        assert_eq!(notifier.calls.load(Ordering::Relaxed), 1);
        let stored = store.load_quiz("quiz-1").await.unwrap().unwrap();
        assert_eq!(stored.visibility, Visibility::Published);

        assert!(engine.publish_quiz("nope").await.is_err());
    }
}
