//! Bloom scoring model.
//!
//! A question's point value is its Bloom base score scaled by the stage
//! multiplier and rounded: `round(base * multiplier)`.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::StageConfig;
use crate::model::{BloomLevel, Question, Stage};

/// Score-percentage floor for an `Excellent` rating.
pub const EXCELLENT_THRESHOLD: f64 = 90.0;
/// Score-percentage floor for a `Good` rating.
pub const GOOD_THRESHOLD: f64 = 70.0;
/// Score-percentage floor for a `Fair` rating.
pub const FAIR_THRESHOLD: f64 = 50.0;

/// Per-stage multiplier applied to Bloom base scores.
pub fn stage_multiplier(stage: Stage) -> f64 {
    match stage {
        Stage::Easy => 1.0,
        Stage::Medium => 1.2,
        Stage::Hard => 1.5,
        // Nothing is scored once the session is complete.
        Stage::Complete => 0.0,
    }
}

/// Stage-specific point value of a question at `level`.
pub fn score_for_stage(level: BloomLevel, stage: Stage) -> u32 {
    (f64::from(level.base_score()) * stage_multiplier(stage)).round() as u32
}

/// How points are awarded for a correct answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ScoringMode {
    /// Bloom base score times stage multiplier; recovery answers are scaled
    /// by `recovery_multiplier`.
    Bloom {
        #[serde(default = "default_recovery_multiplier")]
        recovery_multiplier: f64,
    },
    /// Fixed `base_points` / `recovery_points` from the stage config.
    Flat,
}

fn default_recovery_multiplier() -> f64 {
    1.0
}

impl Default for ScoringMode {
    fn default() -> Self {
        ScoringMode::Bloom {
            recovery_multiplier: default_recovery_multiplier(),
        }
    }
}

impl ScoringMode {
    /// Points a correct answer to `question` is worth right now.
    ///
    /// This is also the question's contribution to `PossibleScore`.
    pub fn points_for(
        &self,
        question: &Question,
        stage: Stage,
        in_recovery: bool,
        config: &StageConfig,
    ) -> f64 {
        match self {
            ScoringMode::Bloom {
                recovery_multiplier,
            } => {
                let base = f64::from(question.score_for_stage(stage));
                if in_recovery {
                    base * recovery_multiplier
                } else {
                    base
                }
            }
            ScoringMode::Flat => {
                if in_recovery {
                    config.recovery_points
                } else {
                    config.base_points
                }
            }
        }
    }
}

/// Qualitative bucket of a score percentage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EfficiencyRating {
    #[default]
    NotAttempted,
    Poor,
    Fair,
    Good,
    Excellent,
}

impl EfficiencyRating {
    pub fn from_score_percentage(pct: f64) -> Self {
        if pct >= EXCELLENT_THRESHOLD {
            EfficiencyRating::Excellent
        } else if pct >= GOOD_THRESHOLD {
            EfficiencyRating::Good
        } else if pct >= FAIR_THRESHOLD {
            EfficiencyRating::Fair
        } else {
            EfficiencyRating::Poor
        }
    }
}

impl fmt::Display for EfficiencyRating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EfficiencyRating::NotAttempted => write!(f, "not_attempted"),
            EfficiencyRating::Poor => write!(f, "poor"),
            EfficiencyRating::Fair => write!(f, "fair"),
            EfficiencyRating::Good => write!(f, "good"),
            EfficiencyRating::Excellent => write!(f, "excellent"),
        }
    }
}
