//! The adaptive state machine.
//!
//! `AdaptiveManager` is pure logic: it mutates an `AdaptiveSession` in place,
//! performs no I/O, and is deterministic for identical inputs. Callers own
//! loading and persisting the session and must serialize access per session.

use tracing::{debug, info};

use crate::config::{AdaptiveConfig, StageConfig};
use crate::error::AdaptiveError;
use crate::model::{CompletionType, Question, Stage};
use crate::session::{AdaptiveSession, AnswerResult, QuestionRequest, SessionSummary};

/// Slack when comparing a round ratio to a threshold.
///
/// Thresholds are two-decimal policy values, so 2/3 must meet 0.67.
pub const THRESHOLD_TOLERANCE: f64 = 0.005;

/// Whether `ratio` meets `threshold`.
pub fn meets_threshold(ratio: f64, threshold: f64) -> bool {
    ratio + THRESHOLD_TOLERANCE >= threshold
}

/// Drives stage progression, recovery rounds, and scoring.
#[derive(Debug, Clone, Default)]
pub struct AdaptiveManager {
    config: AdaptiveConfig,
}

impl AdaptiveManager {
    pub fn new(config: AdaptiveConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AdaptiveConfig {
        &self.config
    }

    /// Apply one answer to the session.
    ///
    /// # Errors
    ///
    /// `InvalidState` if the session is already complete or the question was
    /// already used in this session.
    pub fn process_answer(
        &self,
        session: &mut AdaptiveSession,
        question: &Question,
        is_correct: bool,
        time_spent_secs: u64,
    ) -> Result<AnswerResult, AdaptiveError> {
        let stage = session.current_stage;
        if session.is_complete || !stage.is_playable() {
            return Err(AdaptiveError::InvalidState(format!(
                "session {} is already complete",
                session.session_id
            )));
        }
        if session.used_question_ids.contains(&question.id) {
            return Err(AdaptiveError::InvalidState(format!(
                "question {} was already used in session {}",
                question.id, session.session_id
            )));
        }

        let stage_config = self.config.stage_config_or_default(stage);
        let in_recovery = session.status_mut(stage).in_recovery;

        let possible = self
            .config
            .scoring
            .points_for(question, stage, in_recovery, &stage_config);
        let points = if is_correct { possible } else { 0.0 };

        session
            .status_mut(stage)
            .record(is_correct, points, time_spent_secs);
        session.total_score += points;
        session.total_questions_asked += 1;
        session.used_question_ids.insert(question.id.clone());
        session
            .bloom_performance
            .entry(question.bloom_level)
            .or_default()
            .record(is_correct, points, possible, time_spent_secs);

        debug!(
            session = %session.session_id,
            question = %question.id,
            %stage,
            is_correct,
            points,
            "answer processed"
        );

        let mut result = AnswerResult {
            is_correct,
            points_earned: points,
            stage_update: false,
            next_stage: None,
            is_complete: false,
        };

        self.update_stage_progression(session, &stage_config, &mut result);

        if !session.is_complete {
            if let Some(cap) = self.config.question_cap() {
                if session.total_questions_asked >= cap {
                    info!(session = %session.session_id, cap, "question cap reached");
                    session.mark_complete(CompletionType::MaxQuestions);
                }
            }
        }

        result.is_complete = session.is_complete;
        Ok(result)
    }

    /// Decide pass, recovery, or terminal failure once a round is full.
    fn update_stage_progression(
        &self,
        session: &mut AdaptiveSession,
        config: &StageConfig,
        result: &mut AnswerResult,
    ) {
        let stage = session.current_stage;
        let status = session.status_mut(stage);
        let in_recovery = status.in_recovery;
        let required = config.round_size(in_recovery).max(1);

        if status.questions_asked < required {
            return;
        }

        let ratio = f64::from(status.correct_answers) / f64::from(required);
        let threshold = config.round_threshold(in_recovery);

        if meets_threshold(ratio, threshold) {
            status.passed = true;
            info!(
                session = %session.session_id,
                %stage,
                ratio,
                recovery = in_recovery,
                "stage passed"
            );
            self.move_to_next_stage(session, result);
        } else if !in_recovery && config.recovery_questions > 0 {
            status.enter_recovery();
            info!(session = %session.session_id, %stage, ratio, "entering recovery round");
        } else {
            info!(session = %session.session_id, %stage, ratio, "stage failed");
            session.mark_complete(CompletionType::RecoveryFailed);
        }
    }

    fn move_to_next_stage(&self, session: &mut AdaptiveSession, result: &mut AnswerResult) {
        let next = session.current_stage.successor();
        session.current_stage = next;
        result.stage_update = true;
        result.next_stage = Some(next);
        if next == Stage::Complete {
            session.mark_complete(CompletionType::AllStagesPassed);
        }
    }

    /// What the question repository should look for next.
    ///
    /// # Errors
    ///
    /// `SessionComplete` once the session has finished.
    pub fn get_next_question_criteria(
        &self,
        session: &AdaptiveSession,
    ) -> Result<QuestionRequest, AdaptiveError> {
        if session.is_complete || !session.current_stage.is_playable() {
            return Err(AdaptiveError::SessionComplete);
        }

        let is_recovery = session
            .status(session.current_stage)
            .is_some_and(|s| s.in_recovery);

        Ok(QuestionRequest {
            session_id: session.session_id.clone(),
            stage: session.current_stage,
            exclude_ids: session.used_question_ids.iter().cloned().collect(),
            is_recovery,
        })
    }

    /// Running snapshot of a session.
    pub fn summary(&self, session: &AdaptiveSession) -> SessionSummary {
        let possible = session.possible_score();
        let running_percentage = if possible > 0.0 {
            (session.total_score / possible * 100.0).min(100.0)
        } else {
            0.0
        };
        SessionSummary {
            session_id: session.session_id.clone(),
            current_stage: session.current_stage,
            in_recovery: session
                .status(session.current_stage)
                .is_some_and(|s| s.in_recovery),
            total_questions_asked: session.total_questions_asked,
            total_score: session.total_score,
            running_percentage,
            is_complete: session.is_complete,
            completion: session.completion,
        }
    }
}
