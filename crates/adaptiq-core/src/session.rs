//! Adaptive session state and per-stage / per-level aggregates.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::model::{BloomLevel, CompletionType, Stage};
use crate::scoring::EfficiencyRating;

/// Progress within one stage.
///
/// `questions_asked` and `correct_answers` count the current round only and
/// are reset when a recovery round starts; the `total_*` fields never reset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageStatus {
    pub stage: Stage,
    pub questions_asked: u32,
    pub correct_answers: u32,
    pub in_recovery: bool,
    pub recovery_round: u32,
    pub passed: bool,
    pub score: f64,
    #[serde(default)]
    pub total_asked: u32,
    #[serde(default)]
    pub total_correct: u32,
    #[serde(default)]
    pub time_spent_secs: u64,
}

impl StageStatus {
    pub fn new(stage: Stage) -> Self {
        Self {
            stage,
            questions_asked: 0,
            correct_answers: 0,
            in_recovery: false,
            recovery_round: 0,
            passed: false,
            score: 0.0,
            total_asked: 0,
            total_correct: 0,
            time_spent_secs: 0,
        }
    }

    /// Count one answer in the current round.
    pub(crate) fn record(&mut self, is_correct: bool, points: f64, time_spent_secs: u64) {
        self.questions_asked += 1;
        self.total_asked += 1;
        if is_correct {
            self.correct_answers += 1;
            self.total_correct += 1;
        }
        self.score += points;
        self.time_spent_secs += time_spent_secs;
    }

    /// Switch into the recovery round with fresh round counters.
    pub(crate) fn enter_recovery(&mut self) {
        self.in_recovery = true;
        self.recovery_round = 1;
        self.questions_asked = 0;
        self.correct_answers = 0;
    }
}

/// Whole-session performance at one Bloom level, independent of stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BloomLevelPerformance {
    pub questions_attempted: u32,
    pub questions_correct: u32,
    pub actual_score: f64,
    pub possible_score: f64,
    pub accuracy_percentage: f64,
    pub score_percentage: f64,
    pub efficiency_rating: EfficiencyRating,
    pub total_time_spent: u64,
    pub avg_time_per_question: f64,
}

impl BloomLevelPerformance {
    /// Count one answer and refresh the derived percentages.
    pub fn record(&mut self, is_correct: bool, points: f64, possible: f64, time_spent_secs: u64) {
        self.questions_attempted += 1;
        if is_correct {
            self.questions_correct += 1;
        }
        self.actual_score += points;
        self.possible_score += possible;
        self.total_time_spent += time_spent_secs;
        self.refresh();
    }

    /// Recompute accuracy, score percentage, rating, and average time.
    pub fn refresh(&mut self) {
        if self.questions_attempted == 0 {
            self.accuracy_percentage = 0.0;
            self.score_percentage = 0.0;
            self.efficiency_rating = EfficiencyRating::NotAttempted;
            self.avg_time_per_question = 0.0;
            return;
        }
        let attempted = f64::from(self.questions_attempted);
        self.accuracy_percentage = f64::from(self.questions_correct) / attempted * 100.0;
        self.score_percentage = if self.possible_score > 0.0 {
            self.actual_score / self.possible_score * 100.0
        } else {
            0.0
        };
        self.efficiency_rating = EfficiencyRating::from_score_percentage(self.score_percentage);
        self.avg_time_per_question = self.total_time_spent as f64 / attempted;
    }

    pub fn is_attempted(&self) -> bool {
        self.questions_attempted > 0
    }
}

/// In-memory state of one quiz attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptiveSession {
    pub session_id: String,
    pub current_stage: Stage,
    pub stage_statuses: BTreeMap<Stage, StageStatus>,
    pub bloom_performance: BTreeMap<BloomLevel, BloomLevelPerformance>,
    pub used_question_ids: BTreeSet<String>,
    pub total_questions_asked: u32,
    pub total_score: f64,
    pub is_complete: bool,
    /// Why the session completed, once it has.
    #[serde(default)]
    pub completion: Option<CompletionType>,
}

impl AdaptiveSession {
    /// A fresh session at the easy stage.
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            current_stage: Stage::Easy,
            stage_statuses: Stage::PLAYABLE
                .iter()
                .map(|&s| (s, StageStatus::new(s)))
                .collect(),
            bloom_performance: BTreeMap::new(),
            used_question_ids: BTreeSet::new(),
            total_questions_asked: 0,
            total_score: 0.0,
            is_complete: false,
            completion: None,
        }
    }

    /// Status of `stage`, created on first access.
    pub fn status_mut(&mut self, stage: Stage) -> &mut StageStatus {
        self.stage_statuses
            .entry(stage)
            .or_insert_with(|| StageStatus::new(stage))
    }

    pub fn status(&self, stage: Stage) -> Option<&StageStatus> {
        self.stage_statuses.get(&stage)
    }

    /// Performance at `level`, zero-valued if never attempted.
    pub fn bloom(&self, level: BloomLevel) -> BloomLevelPerformance {
        self.bloom_performance
            .get(&level)
            .cloned()
            .unwrap_or_default()
    }

    /// Sum of all stage scores.
    pub fn stage_score_sum(&self) -> f64 {
        self.stage_statuses.values().map(|s| s.score).sum()
    }

    /// Sum of all Bloom-level actual scores.
    pub fn bloom_score_sum(&self) -> f64 {
        self.bloom_performance.values().map(|p| p.actual_score).sum()
    }

    /// Sum of all Bloom-level possible scores.
    pub fn possible_score(&self) -> f64 {
        self.bloom_performance.values().map(|p| p.possible_score).sum()
    }

    /// Total correct answers across every stage and round.
    pub fn total_correct(&self) -> u32 {
        self.stage_statuses.values().map(|s| s.total_correct).sum()
    }

    pub(crate) fn mark_complete(&mut self, completion: CompletionType) {
        self.is_complete = true;
        self.completion.get_or_insert(completion);
    }
}

/// Criteria for the external question repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionRequest {
    pub session_id: String,
    pub stage: Stage,
    /// Already-used question IDs, sorted.
    pub exclude_ids: Vec<String>,
    pub is_recovery: bool,
}

/// Outcome of processing one answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerResult {
    pub is_correct: bool,
    pub points_earned: f64,
    pub stage_update: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_stage: Option<Stage>,
    pub is_complete: bool,
}

/// Point-in-time view of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub current_stage: Stage,
    pub in_recovery: bool,
    pub total_questions_asked: u32,
    pub total_score: f64,
    /// Earned share of the points offered so far, 0–100.
    pub running_percentage: f64,
    pub is_complete: bool,
    pub completion: Option<CompletionType>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_starts_easy_with_three_stages() {
        let session = AdaptiveSession::new("s1");
        assert_eq!(session.current_stage, Stage::Easy);
        assert_eq!(session.stage_statuses.len(), 3);
        assert!(!session.is_complete);
        assert!(session.used_question_ids.is_empty());
    }

    #[test]
    fn bloom_performance_recomputes_percentages() {
        let mut perf = BloomLevelPerformance::default();
        perf.record(true, 20.0, 20.0, 30);
        perf.record(false, 0.0, 20.0, 50);
        assert_eq!(perf.questions_attempted, 2);
        assert_eq!(perf.questions_correct, 1);
        assert_eq!(perf.accuracy_percentage, 50.0);
        assert_eq!(perf.score_percentage, 50.0);
        assert_eq!(perf.efficiency_rating, EfficiencyRating::Fair);
        assert_eq!(perf.total_time_spent, 80);
        assert_eq!(perf.avg_time_per_question, 40.0);
    }

    #[test]
    fn unattempted_level_is_zero_valued() {
        let session = AdaptiveSession::new("s1");
        let perf = session.bloom(BloomLevel::Create);
        assert!(!perf.is_attempted());
        assert_eq!(perf.efficiency_rating, EfficiencyRating::NotAttempted);
    }

    #[test]
    fn recovery_resets_round_counters_only() {
        let mut status = StageStatus::new(Stage::Easy);
        status.record(true, 10.0, 5);
        status.record(false, 0.0, 5);
        status.enter_recovery();
        assert_eq!(status.questions_asked, 0);
        assert_eq!(status.correct_answers, 0);
        assert_eq!(status.total_asked, 2);
        assert_eq!(status.total_correct, 1);
        assert_eq!(status.recovery_round, 1);
        assert_eq!(status.score, 10.0);
    }

    #[test]
    fn first_completion_reason_sticks() {
        let mut session = AdaptiveSession::new("s1");
        session.mark_complete(CompletionType::RecoveryFailed);
        session.mark_complete(CompletionType::MaxQuestions);
        assert_eq!(session.completion, Some(CompletionType::RecoveryFailed));
    }
}
