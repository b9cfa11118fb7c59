//! Core data model types for adaptiq.
//!
//! Difficulty stages, Bloom's-taxonomy levels, the questions an external
//! repository hands to the adaptive engine, and quiz definitions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::config::AdaptiveConfig;
use crate::error::AdaptiveError;
use crate::scoring;

/// Difficulty stage of an adaptive session.
///
/// Progression is strictly linear: `Easy → Medium → Hard → Complete`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Easy,
    Medium,
    Hard,
    /// Terminal marker reached after passing `Hard`.
    Complete,
}

impl Stage {
    /// The three stages that actually ask questions, in order.
    pub const PLAYABLE: [Stage; 3] = [Stage::Easy, Stage::Medium, Stage::Hard];

    /// The stage that follows this one.
    pub fn successor(self) -> Stage {
        match self {
            Stage::Easy => Stage::Medium,
            Stage::Medium => Stage::Hard,
            Stage::Hard | Stage::Complete => Stage::Complete,
        }
    }

    /// Whether questions are asked at this stage.
    pub fn is_playable(self) -> bool {
        !matches!(self, Stage::Complete)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Easy => "easy",
            Stage::Medium => "medium",
            Stage::Hard => "hard",
            Stage::Complete => "complete",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = AdaptiveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "easy" => Ok(Stage::Easy),
            "medium" => Ok(Stage::Medium),
            "hard" => Ok(Stage::Hard),
            "complete" | "completed" => Ok(Stage::Complete),
            _ => Err(AdaptiveError::UnknownStage(s.to_string())),
        }
    }
}

/// Bloom's-taxonomy cognitive level, in increasing complexity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BloomLevel {
    Remember,
    Understand,
    Apply,
    Analyze,
    Evaluate,
    Create,
}

impl BloomLevel {
    pub const ALL: [BloomLevel; 6] = [
        BloomLevel::Remember,
        BloomLevel::Understand,
        BloomLevel::Apply,
        BloomLevel::Analyze,
        BloomLevel::Evaluate,
        BloomLevel::Create,
    ];

    /// Fixed base score before the stage multiplier is applied.
    pub fn base_score(self) -> u32 {
        match self {
            BloomLevel::Remember => 10,
            BloomLevel::Understand => 15,
            BloomLevel::Apply => 20,
            BloomLevel::Analyze => 25,
            BloomLevel::Evaluate => 30,
            BloomLevel::Create => 35,
        }
    }

    /// Complexity weight, 1 (remember) through 6 (create).
    pub fn complexity(self) -> u32 {
        self as u32 + 1
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BloomLevel::Remember => "remember",
            BloomLevel::Understand => "understand",
            BloomLevel::Apply => "apply",
            BloomLevel::Analyze => "analyze",
            BloomLevel::Evaluate => "evaluate",
            BloomLevel::Create => "create",
        }
    }
}

impl fmt::Display for BloomLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BloomLevel {
    type Err = AdaptiveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "remember" => Ok(BloomLevel::Remember),
            "understand" => Ok(BloomLevel::Understand),
            "apply" => Ok(BloomLevel::Apply),
            "analyze" | "analyse" => Ok(BloomLevel::Analyze),
            "evaluate" => Ok(BloomLevel::Evaluate),
            "create" => Ok(BloomLevel::Create),
            _ => Err(AdaptiveError::UnknownBloomLevel(s.to_string())),
        }
    }
}

/// A question as resolved by the external question repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    /// Unique identifier within the quiz.
    pub id: String,
    /// Cognitive level the question targets.
    pub bloom_level: BloomLevel,
    /// Stage the question is meant to be asked at.
    pub difficulty_level: Stage,
    /// Question text shown to the examinee.
    #[serde(default)]
    pub content: String,
    /// Free-form topic tags.
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Question {
    pub fn new(id: impl Into<String>, bloom_level: BloomLevel, difficulty_level: Stage) -> Self {
        Self {
            id: id.into(),
            bloom_level,
            difficulty_level,
            content: String::new(),
            tags: Vec::new(),
        }
    }

    /// Point value of this question when answered at `stage`.
    pub fn score_for_stage(&self, stage: Stage) -> u32 {
        scoring::score_for_stage(self.bloom_level, stage)
    }
}

/// A quiz: its question pool and optional adaptive policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizDefinition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Policy from the quiz file; the tool-level policy applies when absent.
    #[serde(default)]
    pub policy: Option<AdaptiveConfig>,
    pub questions: Vec<Question>,
}

impl QuizDefinition {
    /// The policy to run this quiz with.
    pub fn effective_policy(&self, fallback: &AdaptiveConfig) -> AdaptiveConfig {
        self.policy.clone().unwrap_or_else(|| fallback.clone())
    }

    /// Number of questions pooled for `stage`.
    pub fn pool_size(&self, stage: Stage) -> usize {
        self.questions
            .iter()
            .filter(|q| q.difficulty_level == stage)
            .count()
    }
}

/// Why a session reached completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionType {
    /// Every stage was passed.
    AllStagesPassed,
    /// A recovery round was failed.
    RecoveryFailed,
    /// The question cap was reached.
    MaxQuestions,
    /// The session was submitted before the state machine finished.
    ManualSubmit,
}

impl fmt::Display for CompletionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompletionType::AllStagesPassed => write!(f, "all_stages_passed"),
            CompletionType::RecoveryFailed => write!(f, "recovery_failed"),
            CompletionType::MaxQuestions => write!(f, "max_questions"),
            CompletionType::ManualSubmit => write!(f, "manual_submit"),
        }
    }
}
