//! Error types for the adaptive engine and its collaborators.
//!
//! `AdaptiveError` covers the pure state machine; `StoreError` is what the
//! session store and question repository report. `EngineError` wraps both for
//! the async request cycle.

use thiserror::Error;

use crate::model::Stage;

/// Errors raised by the adaptive state machine.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AdaptiveError {
    /// Mutating a session that is already complete, or re-using a question.
    #[error("invalid session state: {0}")]
    InvalidState(String),

    /// A stored stage value could not be parsed.
    #[error("unknown stage: {0:?}")]
    UnknownStage(String),

    /// A stored Bloom level could not be parsed.
    #[error("unknown bloom level: {0:?}")]
    UnknownBloomLevel(String),

    /// No stage config exists for the stage; callers fall back to defaults.
    #[error("no stage config for stage {0}")]
    ConfigMissing(Stage),

    /// Next-question criteria were requested after completion.
    #[error("session is complete")]
    SessionComplete,
}

/// Errors reported by session stores and question repositories.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    /// No session document with this ID.
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// A session document with this ID already exists.
    #[error("session already exists: {0}")]
    SessionExists(String),

    /// The stored document changed since it was loaded.
    #[error("version conflict on session {id}: expected {expected}, found {found}")]
    VersionConflict { id: String, expected: u64, found: u64 },

    /// The question pool has nothing left for this stage.
    #[error("no question available for stage {stage}")]
    NoQuestionAvailable { stage: Stage },

    /// A question ID could not be resolved.
    #[error("question not found: {0}")]
    QuestionNotFound(String),
}

/// Errors from the async request cycle.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Adaptive(#[from] AdaptiveError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl EngineError {
    /// Returns `true` when the session can accept no further answers.
    pub fn is_complete(&self) -> bool {
        matches!(self, EngineError::Adaptive(AdaptiveError::SessionComplete))
    }

    /// Returns `true` when the question pool ran dry.
    pub fn is_pool_exhausted(&self) -> bool {
        matches!(
            self,
            EngineError::Store(StoreError::NoQuestionAvailable { .. })
        )
    }
}
