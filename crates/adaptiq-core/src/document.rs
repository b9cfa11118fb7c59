//! Persisted form of an adaptive session.
//!
//! Stores keep sessions as `SessionDocument`s with string-keyed maps so the
//! JSON shape stays stable if enums gain variants. `AdaptiveSession` is
//! rebuilt from a document before each answer and flushed back afterwards.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AdaptiveError;
use crate::model::{BloomLevel, CompletionType, Stage};
use crate::session::{AdaptiveSession, BloomLevelPerformance, StageStatus};

/// Lifecycle of a stored session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    Active,
    /// Suspended by the examinee or host; resumable.
    Paused,
    Completed,
}

/// Stored progress for one stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageProgress {
    /// Answers in the current round.
    pub attempted: u32,
    /// Correct answers in the current round.
    pub correct: u32,
    /// 0 for the initial round, 1 once recovery started.
    pub recovery_round: u32,
    pub passed: bool,
    pub score: f64,
    #[serde(default)]
    pub total_attempted: u32,
    #[serde(default)]
    pub total_correct: u32,
    #[serde(default)]
    pub time_spent_secs: u64,
}

impl StageProgress {
    pub fn in_recovery(&self) -> bool {
        self.recovery_round > 0
    }
}

/// A session as the store keeps it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionDocument {
    pub id: String,
    pub current_stage: String,
    #[serde(default)]
    pub stage_progress: BTreeMap<String, StageProgress>,
    #[serde(default)]
    pub questions_used: Vec<String>,
    #[serde(default)]
    pub total_questions_asked: u32,
    #[serde(default)]
    pub final_score: f64,
    #[serde(default)]
    pub status: SessionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pause_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_type: Option<CompletionType>,
    #[serde(default)]
    pub bloom_performance: BTreeMap<String, BloomLevelPerformance>,
    /// Bumped by the store on every successful save.
    #[serde(default)]
    pub version: u64,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SessionDocument {
    /// A fresh, active document at the easy stage.
    pub fn new(id: impl Into<String>) -> Self {
        let now = Utc::now();
        let mut doc = Self {
            id: id.into(),
            current_stage: Stage::Easy.to_string(),
            stage_progress: BTreeMap::new(),
            questions_used: Vec::new(),
            total_questions_asked: 0,
            final_score: 0.0,
            status: SessionStatus::Active,
            pause_reason: None,
            completion_type: None,
            bloom_performance: BTreeMap::new(),
            version: 0,
            started_at: now,
            updated_at: now,
        };
        AdaptiveSession::new(doc.id.clone()).apply_to_document(&mut doc);
        doc.updated_at = now;
        doc
    }

    pub fn is_completed(&self) -> bool {
        self.status == SessionStatus::Completed
    }

    pub fn is_paused(&self) -> bool {
        self.status == SessionStatus::Paused
    }
}

impl AdaptiveSession {
    /// Rebuild the in-memory session from its stored form.
    ///
    /// # Errors
    ///
    /// `UnknownStage` / `UnknownBloomLevel` when a stored key is malformed.
    pub fn from_document(doc: &SessionDocument) -> Result<Self, AdaptiveError> {
        let mut session = AdaptiveSession::new(doc.id.clone());
        session.current_stage = doc.current_stage.parse()?;

        for (key, progress) in &doc.stage_progress {
            let stage: Stage = key.parse()?;
            session.stage_statuses.insert(
                stage,
                StageStatus {
                    stage,
                    questions_asked: progress.attempted,
                    correct_answers: progress.correct,
                    in_recovery: progress.in_recovery(),
                    recovery_round: progress.recovery_round,
                    passed: progress.passed,
                    score: progress.score,
                    total_asked: progress.total_attempted,
                    total_correct: progress.total_correct,
                    time_spent_secs: progress.time_spent_secs,
                },
            );
        }

        for (key, perf) in &doc.bloom_performance {
            let level: BloomLevel = key.parse()?;
            session.bloom_performance.insert(level, perf.clone());
        }

        session.used_question_ids = doc.questions_used.iter().cloned().collect();
        session.total_questions_asked = doc.total_questions_asked;
        session.total_score = doc.final_score;
        session.is_complete = doc.is_completed();
        session.completion = doc.completion_type;
        Ok(session)
    }

    /// Write every field of this session back into `doc`.
    ///
    /// The document's `version` is left for the store to bump. A paused
    /// document stays paused unless the session is now complete.
    pub fn apply_to_document(&self, doc: &mut SessionDocument) {
        doc.current_stage = self.current_stage.to_string();
        doc.stage_progress = self
            .stage_statuses
            .iter()
            .map(|(stage, s)| {
                (
                    stage.to_string(),
                    StageProgress {
                        attempted: s.questions_asked,
                        correct: s.correct_answers,
                        recovery_round: s.recovery_round,
                        passed: s.passed,
                        score: s.score,
                        total_attempted: s.total_asked,
                        total_correct: s.total_correct,
                        time_spent_secs: s.time_spent_secs,
                    },
                )
            })
            .collect();
        doc.bloom_performance = self
            .bloom_performance
            .iter()
            .map(|(level, perf)| (level.to_string(), perf.clone()))
            .collect();
        doc.questions_used = self.used_question_ids.iter().cloned().collect();
        doc.total_questions_asked = self.total_questions_asked;
        doc.final_score = self.total_score;
        if self.is_complete {
            doc.status = SessionStatus::Completed;
            doc.pause_reason = None;
        } else if !doc.is_paused() {
            doc.status = SessionStatus::Active;
        }
        doc.completion_type = self.completion;
        doc.updated_at = Utc::now();
    }
}
