//! Transcript replay.
//!
//! A transcript is a scripted examinee: an ordered list of correct/incorrect
//! answers. Replaying one drives a session through the engine, asking the
//! question repository for each next question, until the session completes,
//! the pool runs dry, or the transcript ends (then the session is submitted).

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

use crate::engine::QuizEngine;
use crate::error::EngineError;
use crate::model::{BloomLevel, Stage};
use crate::results::QuizResult;

/// A scripted sequence of answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub answers: Vec<TranscriptAnswer>,
}

/// One scripted answer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TranscriptAnswer {
    pub correct: bool,
    /// Seconds spent; the replay default applies when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_secs: Option<u64>,
}

/// One answered question during a replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayStep {
    pub index: usize,
    pub question_id: String,
    pub stage: Stage,
    pub bloom_level: BloomLevel,
    pub is_correct: bool,
    pub points_earned: f64,
    pub time_secs: u64,
    pub stage_update: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_stage: Option<Stage>,
}

/// Everything a single replay produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayOutcome {
    pub transcript_id: String,
    pub transcript_name: String,
    pub session_id: String,
    pub steps: Vec<ReplayStep>,
    /// Scripted answers never used because the session ended first.
    pub unused_answers: usize,
    /// Whether the question pool ran out before the session completed.
    pub pool_exhausted: bool,
    pub result: QuizResult,
}

/// Progress reporting during replays.
pub trait ReplayReporter: Send + Sync {
    fn on_replay_start(&self, transcript_id: &str);
    fn on_answer(&self, transcript_id: &str, step: &ReplayStep);
    fn on_replay_complete(&self, outcome: &ReplayOutcome);
    fn on_replay_error(&self, transcript_id: &str, error: &str);
    fn on_all_complete(&self, total: usize, completed: usize, failed: usize, elapsed: Duration);
}

/// No-op progress reporter.
pub struct NoopReporter;

impl ReplayReporter for NoopReporter {
    fn on_replay_start(&self, _: &str) {}
    fn on_answer(&self, _: &str, _: &ReplayStep) {}
    fn on_replay_complete(&self, _: &ReplayOutcome) {}
    fn on_replay_error(&self, _: &str, _: &str) {}
    fn on_all_complete(&self, _: usize, _: usize, _: usize, _: Duration) {}
}

/// Replay one transcript in a fresh session.
pub async fn replay(
    engine: &QuizEngine,
    transcript: &Transcript,
    default_time_secs: u64,
    reporter: &dyn ReplayReporter,
) -> Result<ReplayOutcome, EngineError> {
    reporter.on_replay_start(&transcript.id);
    let doc = engine.start_session().await?;
    let session_id = doc.id;

    let mut steps = Vec::new();
    let mut result = None;
    let mut pool_exhausted = false;

    for (index, answer) in transcript.answers.iter().enumerate() {
        let question = match engine.next_question(&session_id).await {
            Ok(q) => q,
            Err(e) if e.is_complete() => break,
            Err(e) if e.is_pool_exhausted() => {
                tracing::warn!(transcript = %transcript.id, "{e}; submitting early");
                pool_exhausted = true;
                break;
            }
            Err(e) => return Err(e),
        };

        let time_secs = answer.time_secs.unwrap_or(default_time_secs);
        let outcome = engine
            .submit_answer(&session_id, &question.id, answer.correct, time_secs)
            .await?;

        let step = ReplayStep {
            index,
            question_id: question.id,
            stage: question.difficulty_level,
            bloom_level: question.bloom_level,
            is_correct: answer.correct,
            points_earned: outcome.answer.points_earned,
            time_secs,
            stage_update: outcome.answer.stage_update,
            next_stage: outcome.answer.next_stage,
        };
        reporter.on_answer(&transcript.id, &step);
        steps.push(step);

        if outcome.result.is_some() {
            result = outcome.result;
            break;
        }
    }

    let result = match result {
        Some(r) => r,
        None => engine.submit_session(&session_id).await?,
    };

    let outcome = ReplayOutcome {
        transcript_id: transcript.id.clone(),
        transcript_name: transcript.name.clone(),
        session_id,
        unused_answers: transcript.answers.len() - steps.len(),
        steps,
        pool_exhausted,
        result,
    };
    reporter.on_replay_complete(&outcome);
    Ok(outcome)
}

/// Replay many transcripts concurrently, at most `parallelism` at a time.
///
/// Failed replays are logged and reported, not returned. Outcomes come back
/// in transcript order.
pub async fn replay_all(
    engine: Arc<QuizEngine>,
    transcripts: &[Transcript],
    default_time_secs: u64,
    parallelism: usize,
    reporter: &dyn ReplayReporter,
) -> Vec<ReplayOutcome> {
    let start = Instant::now();
    let semaphore = Arc::new(Semaphore::new(parallelism.max(1)));
    let mut futures = FuturesUnordered::new();

    for (position, transcript) in transcripts.iter().enumerate() {
        let engine = Arc::clone(&engine);
        let semaphore = Arc::clone(&semaphore);
        futures.push(async move {
            let outcome = match semaphore.acquire_owned().await {
                Ok(_permit) => replay(&engine, transcript, default_time_secs, reporter)
                    .await
                    .map_err(|e| e.to_string()),
                Err(_) => Err("semaphore closed".to_string()),
            };
            (position, transcript.id.clone(), outcome)
        });
    }

    let total = futures.len();
    let mut outcomes = Vec::new();
    let mut failed = 0usize;

    while let Some((position, transcript_id, outcome)) = futures.next().await {
        match outcome {
            Ok(outcome) => outcomes.push((position, outcome)),
            Err(e) => {
                tracing::error!("replay failed for {transcript_id}: {e}");
                reporter.on_replay_error(&transcript_id, &e);
                failed += 1;
            }
        }
    }

    reporter.on_all_complete(total, outcomes.len(), failed, start.elapsed());
    outcomes.sort_by_key(|(position, _)| *position);
    outcomes.into_iter().map(|(_, outcome)| outcome).collect()
}
