//! Collaborator traits for the quiz engine.
//!
//! The engine never owns storage or question content: sessions live behind a
//! `SessionStore`, questions come from a `QuestionRepository`, and finished
//! results go to a `ResultPublisher`. In-memory implementations live in
//! `crate::memory`.

use async_trait::async_trait;

use crate::document::SessionDocument;
use crate::error::StoreError;
use crate::model::Question;
use crate::results::QuizResult;
use crate::session::QuestionRequest;

// ---------------------------------------------------------------------------
// Session store
// ---------------------------------------------------------------------------

/// Persistence for session documents.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Insert a new document. Fails with `SessionExists` on a duplicate ID.
    async fn create(&self, doc: SessionDocument) -> Result<SessionDocument, StoreError>;

    /// Fetch a document by ID.
    async fn load(&self, id: &str) -> Result<SessionDocument, StoreError>;

    /// Replace a document if its `version` still matches the stored one.
    ///
    /// Returns the saved document with its version bumped; fails with
    /// `VersionConflict` when another writer saved first.
    async fn save(&self, doc: SessionDocument) -> Result<SessionDocument, StoreError>;
}

// ---------------------------------------------------------------------------
// Question repository
// ---------------------------------------------------------------------------

/// Source of questions for a session.
#[async_trait]
pub trait QuestionRepository: Send + Sync {
    /// Pick a question matching `request`.
    ///
    /// Fails with `NoQuestionAvailable` when every candidate is excluded.
    async fn find_question(&self, request: &QuestionRequest) -> Result<Question, StoreError>;

    /// Resolve a question by ID.
    async fn get_question(&self, id: &str) -> Result<Question, StoreError>;
}

// ---------------------------------------------------------------------------
// Result publisher
// ---------------------------------------------------------------------------

/// Receives every compiled result.
pub trait ResultPublisher: Send + Sync {
    fn publish(&self, result: &QuizResult);
}
