//! Async quiz engine.
//!
//! Wraps the pure `AdaptiveManager` in a load → process → save cycle against
//! injected collaborators. Requests for the same session are serialized with a
//! per-session lock that is dropped from the lock table once no request holds
//! or awaits it; the store's version check catches writers outside this
//! engine.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tokio::sync::OwnedMutexGuard;
use tracing::info;
use uuid::Uuid;

use crate::config::AdaptiveConfig;
use crate::document::{SessionDocument, SessionStatus};
use crate::error::{AdaptiveError, EngineError};
use crate::manager::AdaptiveManager;
use crate::model::{CompletionType, Question};
use crate::results::QuizResult;
use crate::session::{AdaptiveSession, AnswerResult, SessionSummary};
use crate::traits::{QuestionRepository, ResultPublisher, SessionStore};

/// What `submit_answer` hands back.
#[derive(Debug, Clone)]
pub struct AnswerOutcome {
    pub answer: AnswerResult,
    /// Present when this answer completed the session.
    pub result: Option<QuizResult>,
}

/// Reason recorded when `pause_session` is given none.
pub const DEFAULT_PAUSE_REASON: &str = "user_requested";

type LockTable = Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>;

/// The central quiz engine.
pub struct QuizEngine {
    sessions: Arc<dyn SessionStore>,
    questions: Arc<dyn QuestionRepository>,
    publisher: Arc<dyn ResultPublisher>,
    manager: AdaptiveManager,
    locks: LockTable,
}

impl QuizEngine {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        questions: Arc<dyn QuestionRepository>,
        publisher: Arc<dyn ResultPublisher>,
        config: AdaptiveConfig,
    ) -> Self {
        Self {
            sessions,
            questions,
            publisher,
            manager: AdaptiveManager::new(config),
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn manager(&self) -> &AdaptiveManager {
        &self.manager
    }

    /// Create a session with a fresh v4 ID.
    pub async fn start_session(&self) -> Result<SessionDocument, EngineError> {
        self.start_session_with_id(Uuid::new_v4().to_string()).await
    }

    /// Create a session with a caller-chosen ID.
    pub async fn start_session_with_id(
        &self,
        id: impl Into<String>,
    ) -> Result<SessionDocument, EngineError> {
        let doc = self.sessions.create(SessionDocument::new(id)).await?;
        info!(session = %doc.id, "session started");
        Ok(doc)
    }

    /// Ask the repository for the next question of `session_id`.
    ///
    /// Fails with `SessionComplete` once finished, `InvalidState` while
    /// paused and `NoQuestionAvailable` when the pool has nothing left for
    /// the current stage.
    pub async fn next_question(&self, session_id: &str) -> Result<Question, EngineError> {
        let (doc, session) = self.load(session_id).await?;
        ensure_not_paused(&doc)?;
        let request = self.manager.get_next_question_criteria(&session)?;
        Ok(self.questions.find_question(&request).await?)
    }

    /// Record an answer to `question_id`.
    ///
    /// When the answer completes the session the compiled result is
    /// published and returned alongside the answer.
    pub async fn submit_answer(
        &self,
        session_id: &str,
        question_id: &str,
        is_correct: bool,
        time_spent_secs: u64,
    ) -> Result<AnswerOutcome, EngineError> {
        let _guard = self.lock_session(session_id).await;

        let (mut doc, mut session) = self.load(session_id).await?;
        ensure_not_paused(&doc)?;
        let question = self.questions.get_question(question_id).await?;
        let answer =
            self.manager
                .process_answer(&mut session, &question, is_correct, time_spent_secs)?;

        session.apply_to_document(&mut doc);
        self.sessions.save(doc).await?;

        let result = if answer.is_complete {
            Some(self.finish(&session, CompletionType::ManualSubmit))
        } else {
            None
        };
        Ok(AnswerOutcome { answer, result })
    }

    /// End a session early and compile its result.
    ///
    /// Paused sessions can be submitted. An already-complete session keeps
    /// its completion reason, is not saved again and is not republished.
    pub async fn submit_session(&self, session_id: &str) -> Result<QuizResult, EngineError> {
        let _guard = self.lock_session(session_id).await;

        let (mut doc, mut session) = self.load(session_id).await?;
        if session.is_complete {
            return Ok(self.compile(&session));
        }
        session.mark_complete(CompletionType::ManualSubmit);
        session.apply_to_document(&mut doc);
        self.sessions.save(doc).await?;
        Ok(self.finish(&session, CompletionType::ManualSubmit))
    }

    /// Suspend an active session. Questions and answers are refused until
    /// `resume_session`.
    pub async fn pause_session(
        &self,
        session_id: &str,
        reason: Option<&str>,
    ) -> Result<SessionDocument, EngineError> {
        let _guard = self.lock_session(session_id).await;

        let mut doc = self.sessions.load(session_id).await?;
        if doc.is_completed() {
            return Err(AdaptiveError::SessionComplete.into());
        }
        let reason = reason.unwrap_or(DEFAULT_PAUSE_REASON).to_string();
        info!(session = %session_id, reason = %reason, "session paused");
        doc.status = SessionStatus::Paused;
        doc.pause_reason = Some(reason);
        doc.updated_at = Utc::now();
        Ok(self.sessions.save(doc).await?)
    }

    /// Reactivate a paused session.
    pub async fn resume_session(&self, session_id: &str) -> Result<SessionDocument, EngineError> {
        let _guard = self.lock_session(session_id).await;

        let mut doc = self.sessions.load(session_id).await?;
        if !doc.is_paused() {
            return Err(AdaptiveError::InvalidState(format!(
                "session {session_id} is not paused"
            ))
            .into());
        }
        info!(session = %session_id, "session resumed");
        doc.status = SessionStatus::Active;
        doc.pause_reason = None;
        doc.updated_at = Utc::now();
        Ok(self.sessions.save(doc).await?)
    }

    /// Compile the result of a completed session without publishing it.
    pub async fn result(&self, session_id: &str) -> Result<QuizResult, EngineError> {
        let (_, session) = self.load(session_id).await?;
        if !session.is_complete {
            return Err(AdaptiveError::InvalidState(format!(
                "session {session_id} is still active"
            ))
            .into());
        }
        Ok(self.compile(&session))
    }

    pub async fn summary(&self, session_id: &str) -> Result<SessionSummary, EngineError> {
        let (_, session) = self.load(session_id).await?;
        Ok(self.manager.summary(&session))
    }

    async fn load(&self, session_id: &str) -> Result<(SessionDocument, AdaptiveSession), EngineError> {
        let doc = self.sessions.load(session_id).await?;
        let session = AdaptiveSession::from_document(&doc)?;
        Ok((doc, session))
    }

    fn compile(&self, session: &AdaptiveSession) -> QuizResult {
        QuizResult::compile(
            session,
            &self.manager.config().profile,
            CompletionType::ManualSubmit,
        )
    }

    fn finish(&self, session: &AdaptiveSession, fallback: CompletionType) -> QuizResult {
        let result = QuizResult::compile(session, &self.manager.config().profile, fallback);
        info!(
            session = %result.session_id,
            completion = %result.completion_type,
            score = result.final_score,
            percentage = result.percentage,
            "session complete"
        );
        self.publisher.publish(&result);
        result
    }

    async fn lock_session(&self, session_id: &str) -> SessionGuard<'_> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            Arc::clone(locks.entry(session_id.to_string()).or_default())
        };
        let mut guard = SessionGuard {
            locks: &self.locks,
            session_id: session_id.to_string(),
            lock,
            held: None,
        };
        guard.held = Some(Arc::clone(&guard.lock).lock_owned().await);
        guard
    }

    #[cfg(test)]
    fn tracked_locks(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

fn ensure_not_paused(doc: &SessionDocument) -> Result<(), AdaptiveError> {
    if doc.is_paused() {
        return Err(AdaptiveError::InvalidState(format!(
            "session {} is paused",
            doc.id
        )));
    }
    Ok(())
}

/// Holds one session's lock. Dropping it releases the lock and removes the
/// table entry when no other request references it.
struct SessionGuard<'a> {
    locks: &'a LockTable,
    session_id: String,
    lock: Arc<tokio::sync::Mutex<()>>,
    held: Option<OwnedMutexGuard<()>>,
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        drop(self.held.take());
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        // New waiters clone under the table lock, so the count cannot grow here.
        let unshared = Arc::strong_count(&self.lock) == 2;
        if unshared
            && locks
                .get(&self.session_id)
                .is_some_and(|entry| Arc::ptr_eq(entry, &self.lock))
        {
            locks.remove(&self.session_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StageConfig;
    use crate::error::StoreError;
    use crate::memory::{InMemoryQuestionBank, InMemorySessionStore, RecordingPublisher};
    use crate::model::{BloomLevel, Stage};

    fn bank(per_stage: usize) -> InMemoryQuestionBank {
        let mut questions = Vec::new();
        for stage in Stage::PLAYABLE {
            for i in 0..per_stage {
                questions.push(Question::new(
                    format!("{stage}-{i}"),
                    BloomLevel::ALL[i % BloomLevel::ALL.len()],
                    stage,
                ));
            }
        }
        InMemoryQuestionBank::new(questions)
    }

    fn engine(
        config: AdaptiveConfig,
        per_stage: usize,
    ) -> (QuizEngine, Arc<InMemorySessionStore>, Arc<RecordingPublisher>) {
        let store = Arc::new(InMemorySessionStore::new());
        let publisher = Arc::new(RecordingPublisher::new());
        let engine = QuizEngine::new(
            store.clone(),
            Arc::new(bank(per_stage)),
            publisher.clone(),
            config,
        );
        (engine, store, publisher)
    }

    #[tokio::test]
    async fn full_pass_publishes_result() {
        let (engine, store, publisher) = engine(AdaptiveConfig::default(), 6);
        let doc = engine.start_session().await.unwrap();

        let mut last = None;
        loop {
            let question = match engine.next_question(&doc.id).await {
                Ok(q) => q,
                Err(e) if e.is_complete() => break,
                Err(e) => panic!("unexpected error: {e}"),
            };
            let outcome = engine
                .submit_answer(&doc.id, &question.id, true, 20)
                .await
                .unwrap();
            last = Some(outcome);
        }

        let outcome = last.unwrap();
        assert!(outcome.answer.is_complete);
        assert_eq!(outcome.answer.next_stage, Some(Stage::Complete));
        let result = outcome.result.unwrap();
        assert_eq!(result.completion_type, CompletionType::AllStagesPassed);
        assert_eq!(result.questions_attempted, 15);
        assert_eq!(result.percentage, 100.0);
        assert_eq!(publisher.results().len(), 1);

        let stored = store.load(&doc.id).await.unwrap();
        assert!(stored.is_completed());
        assert_eq!(stored.version, 16);
        assert_eq!(engine.result(&doc.id).await.unwrap().final_score, result.final_score);
    }

    #[tokio::test]
    async fn answers_after_completion_are_rejected() {
        let (engine, _, _) = engine(AdaptiveConfig::default(), 6);
        let doc = engine.start_session_with_id("s1").await.unwrap();
        engine.submit_session("s1").await.unwrap();

        let err = engine.next_question("s1").await.unwrap_err();
        assert!(err.is_complete());
        let err = engine
            .submit_answer(&doc.id, "easy-0", true, 5)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Adaptive(AdaptiveError::InvalidState(_))));
    }

    #[tokio::test]
    async fn manual_submit_compiles_partial_result() {
        let (engine, _, publisher) = engine(AdaptiveConfig::default(), 6);
        engine.start_session_with_id("s1").await.unwrap();
        engine.submit_answer("s1", "easy-0", true, 10).await.unwrap();
        engine.submit_answer("s1", "easy-1", false, 10).await.unwrap();

        assert!(engine.result("s1").await.is_err());
        let result = engine.submit_session("s1").await.unwrap();
        assert_eq!(result.completion_type, CompletionType::ManualSubmit);
        assert_eq!(result.questions_attempted, 2);
        assert_eq!(result.questions_correct, 1);
        assert_eq!(publisher.results().len(), 1);
    }

    #[tokio::test]
    async fn exhausted_pool_is_reported() {
        let (engine, _, _) = engine(AdaptiveConfig::default(), 2);
        engine.start_session_with_id("s1").await.unwrap();
        engine.submit_answer("s1", "easy-0", true, 1).await.unwrap();
        engine.submit_answer("s1", "easy-1", true, 1).await.unwrap();
        let err = engine.next_question("s1").await.unwrap_err();
        assert!(err.is_pool_exhausted());
    }

    #[tokio::test]
    async fn unknown_session_and_question() {
        let (engine, _, _) = engine(AdaptiveConfig::default(), 2);
        assert!(matches!(
            engine.summary("missing").await,
            Err(EngineError::Store(StoreError::SessionNotFound(_)))
        ));
        engine.start_session_with_id("s1").await.unwrap();
        assert!(matches!(
            engine.submit_answer("s1", "nope", true, 1).await,
            Err(EngineError::Store(StoreError::QuestionNotFound(_)))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_answers_on_one_session_are_serialized() {
        let config = AdaptiveConfig {
            max_questions: None,
            ..AdaptiveConfig::uniform(StageConfig {
                initial_questions: 20,
                ..StageConfig::default()
            })
        };
        let (engine, store, _) = engine(config, 12);
        let engine = Arc::new(engine);
        engine.start_session_with_id("s1").await.unwrap();

        let mut handles = Vec::new();
        for i in 0..12 {
            let engine = Arc::clone(&engine);
            handles.push(tokio::spawn(async move {
                engine
                    .submit_answer("s1", &format!("easy-{i}"), i % 2 == 0, 3)
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let summary = engine.summary("s1").await.unwrap();
        assert_eq!(summary.total_questions_asked, 12);
        assert!(!summary.is_complete);
        let doc = store.load("s1").await.unwrap();
        assert_eq!(doc.questions_used.len(), 12);
        assert_eq!(doc.version, 13);
        assert_eq!(engine.tracked_locks(), 0);
    }

    #[tokio::test]
    async fn resubmitting_a_finished_session_does_not_republish() {
        let (engine, store, publisher) = engine(AdaptiveConfig::default(), 6);
        engine.start_session_with_id("s1").await.unwrap();
        while let Ok(question) = engine.next_question("s1").await {
            engine.submit_answer("s1", &question.id, true, 20).await.unwrap();
        }
        assert_eq!(publisher.results().len(), 1);

        for _ in 0..2 {
            let result = engine.submit_session("s1").await.unwrap();
            assert_eq!(result.completion_type, CompletionType::AllStagesPassed);
            assert_eq!(result.questions_attempted, 15);
        }
        assert_eq!(publisher.results().len(), 1);
        assert_eq!(store.load("s1").await.unwrap().version, 16);
    }

    #[tokio::test]
    async fn lock_table_is_pruned_after_requests() {
        let (engine, _, publisher) = engine(AdaptiveConfig::default(), 6);
        for i in 0..100 {
            let id = format!("s{i}");
            engine.start_session_with_id(&id).await.unwrap();
            engine.submit_answer(&id, "easy-0", true, 5).await.unwrap();
            engine.pause_session(&id, None).await.unwrap();
            engine.resume_session(&id).await.unwrap();
            engine.submit_session(&id).await.unwrap();
        }
        // Failed requests release their entry too.
        assert!(engine.submit_session("missing").await.is_err());

        assert_eq!(publisher.results().len(), 100);
        assert_eq!(engine.tracked_locks(), 0);
    }

    #[tokio::test]
    async fn paused_sessions_refuse_questions_until_resumed() {
        let (engine, store, _) = engine(AdaptiveConfig::default(), 6);
        engine.start_session_with_id("s1").await.unwrap();
        engine.submit_answer("s1", "easy-0", true, 5).await.unwrap();

        let paused = engine.pause_session("s1", None).await.unwrap();
        assert_eq!(paused.status, SessionStatus::Paused);
        assert_eq!(paused.pause_reason.as_deref(), Some(DEFAULT_PAUSE_REASON));

        let err = engine.next_question("s1").await.unwrap_err();
        assert!(matches!(err, EngineError::Adaptive(AdaptiveError::InvalidState(_))));
        let err = engine
            .submit_answer("s1", "easy-1", true, 5)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Adaptive(AdaptiveError::InvalidState(_))));
        assert_eq!(engine.summary("s1").await.unwrap().total_questions_asked, 1);

        let resumed = engine.resume_session("s1").await.unwrap();
        assert_eq!(resumed.status, SessionStatus::Active);
        assert_eq!(resumed.pause_reason, None);
        let question = engine.next_question("s1").await.unwrap();
        engine.submit_answer("s1", &question.id, true, 5).await.unwrap();

        let doc = store.load("s1").await.unwrap();
        assert_eq!(doc.status, SessionStatus::Active);
        assert_eq!(doc.total_questions_asked, 2);
        // create, answer, pause, resume, answer
        assert_eq!(doc.version, 5);
    }

    #[tokio::test]
    async fn pause_and_resume_respect_session_state() {
        let (engine, store, publisher) = engine(AdaptiveConfig::default(), 6);
        engine.start_session_with_id("s1").await.unwrap();

        let err = engine.resume_session("s1").await.unwrap_err();
        assert!(matches!(err, EngineError::Adaptive(AdaptiveError::InvalidState(_))));

        let paused = engine.pause_session("s1", Some("network")).await.unwrap();
        assert_eq!(paused.pause_reason.as_deref(), Some("network"));

        let result = engine.submit_session("s1").await.unwrap();
        assert_eq!(result.completion_type, CompletionType::ManualSubmit);
        assert_eq!(publisher.results().len(), 1);
        let doc = store.load("s1").await.unwrap();
        assert!(doc.is_completed());
        assert_eq!(doc.pause_reason, None);

        let err = engine.pause_session("s1", None).await.unwrap_err();
        assert!(matches!(err, EngineError::Adaptive(AdaptiveError::SessionComplete)));
    }
}
