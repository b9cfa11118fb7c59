//! In-memory collaborators.
//!
//! Used by the CLI replay path and by tests. Nothing here persists across
//! process restarts.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::document::SessionDocument;
use crate::error::StoreError;
use crate::model::Question;
use crate::results::QuizResult;
use crate::selection::pick_question;
use crate::session::QuestionRequest;
use crate::traits::{QuestionRepository, ResultPublisher, SessionStore};

/// Session documents kept in a map, with optimistic version checks.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    docs: RwLock<HashMap<String, SessionDocument>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.docs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.docs.read().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create(&self, mut doc: SessionDocument) -> Result<SessionDocument, StoreError> {
        let mut docs = self.docs.write().await;
        if docs.contains_key(&doc.id) {
            return Err(StoreError::SessionExists(doc.id));
        }
        doc.version = 1;
        docs.insert(doc.id.clone(), doc.clone());
        Ok(doc)
    }

    async fn load(&self, id: &str) -> Result<SessionDocument, StoreError> {
        self.docs
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::SessionNotFound(id.to_string()))
    }

    async fn save(&self, mut doc: SessionDocument) -> Result<SessionDocument, StoreError> {
        let mut docs = self.docs.write().await;
        let stored = docs
            .get(&doc.id)
            .ok_or_else(|| StoreError::SessionNotFound(doc.id.clone()))?;
        if stored.version != doc.version {
            return Err(StoreError::VersionConflict {
                id: doc.id.clone(),
                expected: doc.version,
                found: stored.version,
            });
        }
        doc.version += 1;
        docs.insert(doc.id.clone(), doc.clone());
        Ok(doc)
    }
}

/// A fixed question pool.
///
/// `find_question` picks by the stage's Bloom mix, or the recovery mix when
/// the request is for a recovery round. See [`pick_question`].
#[derive(Debug, Default, Clone)]
pub struct InMemoryQuestionBank {
    questions: Vec<Question>,
}

impl InMemoryQuestionBank {
    pub fn new(questions: Vec<Question>) -> Self {
        Self { questions }
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }
}

#[async_trait]
impl QuestionRepository for InMemoryQuestionBank {
    async fn find_question(&self, request: &QuestionRequest) -> Result<Question, StoreError> {
        pick_question(&self.questions, request)
            .cloned()
            .ok_or(StoreError::NoQuestionAvailable {
                stage: request.stage,
            })
    }

    async fn get_question(&self, id: &str) -> Result<Question, StoreError> {
        self.questions
            .iter()
            .find(|q| q.id == id)
            .cloned()
            .ok_or_else(|| StoreError::QuestionNotFound(id.to_string()))
    }
}

/// Discards results.
pub struct NoopPublisher;

impl ResultPublisher for NoopPublisher {
    fn publish(&self, _: &QuizResult) {}
}

/// Keeps every published result.
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    results: Mutex<Vec<QuizResult>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn results(&self) -> Vec<QuizResult> {
        self.results
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl ResultPublisher for RecordingPublisher {
    fn publish(&self, result: &QuizResult) {
        self.results
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(result.clone());
    }
}
