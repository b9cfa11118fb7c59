//! Result compilation.
//!
//! Turns a finished (or manually submitted) session into a `QuizResult`:
//! stage breakdown, time breakdown, Bloom breakdown, and cognitive profile.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::ProfilePolicy;
use crate::model::{BloomLevel, CompletionType, Stage};
use crate::session::{AdaptiveSession, BloomLevelPerformance};

/// Per-stage figures for the final result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageBreakdown {
    pub attempted: u32,
    pub correct: u32,
    pub score: f64,
    pub percentage: f64,
    pub passed: bool,
    pub recovery_used: bool,
}

/// Time spent, totalled and grouped by stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeBreakdown {
    pub total_time_secs: u64,
    pub average_time_per_question: f64,
    pub time_by_stage: BTreeMap<Stage, u64>,
}

/// Strengths, growth areas, and recommendations derived from Bloom scores.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CognitiveProfile {
    /// Strong levels, most complex first.
    pub dominant_strengths: Vec<BloomLevel>,
    /// Weak levels, least complex first.
    pub growth_areas: Vec<BloomLevel>,
    /// Complexity-weighted mean score, 0–1.
    pub cognitive_complexity: f64,
    pub learning_recommendations: Vec<String>,
}

/// Qualitative label for the final percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BadgeLevel {
    Participant,
    Bronze,
    Silver,
    Gold,
    Platinum,
}

impl BadgeLevel {
    pub fn from_percentage(pct: f64) -> Self {
        if pct >= 90.0 {
            BadgeLevel::Platinum
        } else if pct >= 75.0 {
            BadgeLevel::Gold
        } else if pct >= 60.0 {
            BadgeLevel::Silver
        } else if pct >= 40.0 {
            BadgeLevel::Bronze
        } else {
            BadgeLevel::Participant
        }
    }
}

impl fmt::Display for BadgeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BadgeLevel::Participant => write!(f, "participant"),
            BadgeLevel::Bronze => write!(f, "bronze"),
            BadgeLevel::Silver => write!(f, "silver"),
            BadgeLevel::Gold => write!(f, "gold"),
            BadgeLevel::Platinum => write!(f, "platinum"),
        }
    }
}

/// Final outcome of a quiz attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizResult {
    pub session_id: String,
    pub final_score: f64,
    /// Earned share of possible points, 0–100.
    pub percentage: f64,
    pub badge_level: BadgeLevel,
    pub questions_attempted: u32,
    pub questions_correct: u32,
    pub stage_breakdown: BTreeMap<Stage, StageBreakdown>,
    pub time_breakdown: TimeBreakdown,
    pub bloom_breakdown: BTreeMap<BloomLevel, BloomLevelPerformance>,
    pub cognitive_profile: CognitiveProfile,
    pub completion_type: CompletionType,
    pub created_at: DateTime<Utc>,
}

impl QuizResult {
    /// Compile the result for `session`.
    ///
    /// `completion` is used when the session has not recorded its own
    /// completion reason (manual submission).
    pub fn compile(
        session: &AdaptiveSession,
        policy: &ProfilePolicy,
        completion: CompletionType,
    ) -> Self {
        let bloom_breakdown = build_bloom_breakdown(session);
        let possible: f64 = bloom_breakdown.values().map(|p| p.possible_score).sum();
        let percentage = if possible > 0.0 {
            (session.total_score / possible * 100.0).clamp(0.0, 100.0)
        } else {
            0.0
        };

        QuizResult {
            session_id: session.session_id.clone(),
            final_score: session.total_score,
            percentage,
            badge_level: BadgeLevel::from_percentage(percentage),
            questions_attempted: session.total_questions_asked,
            questions_correct: session.total_correct(),
            stage_breakdown: build_stage_breakdown(session),
            time_breakdown: build_time_breakdown(session),
            cognitive_profile: build_cognitive_profile(&bloom_breakdown, policy),
            bloom_breakdown,
            completion_type: session.completion.unwrap_or(completion),
            created_at: Utc::now(),
        }
    }

    /// Share of answers that were correct, 0–100.
    pub fn accuracy(&self) -> f64 {
        if self.questions_attempted == 0 {
            0.0
        } else {
            f64::from(self.questions_correct) / f64::from(self.questions_attempted) * 100.0
        }
    }
}

pub fn build_stage_breakdown(session: &AdaptiveSession) -> BTreeMap<Stage, StageBreakdown> {
    Stage::PLAYABLE
        .iter()
        .map(|&stage| {
            let breakdown = session
                .status(stage)
                .map(|s| StageBreakdown {
                    attempted: s.total_asked,
                    correct: s.total_correct,
                    score: s.score,
                    percentage: if s.total_asked > 0 {
                        f64::from(s.total_correct) / f64::from(s.total_asked) * 100.0
                    } else {
                        0.0
                    },
                    passed: s.passed,
                    recovery_used: s.recovery_round > 0,
                })
                .unwrap_or_default();
            (stage, breakdown)
        })
        .collect()
}

pub fn build_time_breakdown(session: &AdaptiveSession) -> TimeBreakdown {
    let time_by_stage: BTreeMap<Stage, u64> = Stage::PLAYABLE
        .iter()
        .map(|&stage| {
            let secs = session.status(stage).map_or(0, |s| s.time_spent_secs);
            (stage, secs)
        })
        .collect();
    let total_time_secs: u64 = time_by_stage.values().sum();
    let average_time_per_question = if session.total_questions_asked > 0 {
        total_time_secs as f64 / f64::from(session.total_questions_asked)
    } else {
        0.0
    };

    TimeBreakdown {
        total_time_secs,
        average_time_per_question,
        time_by_stage,
    }
}

/// One entry per Bloom level, zero-valued if never attempted.
pub fn build_bloom_breakdown(
    session: &AdaptiveSession,
) -> BTreeMap<BloomLevel, BloomLevelPerformance> {
    BloomLevel::ALL
        .iter()
        .map(|&level| (level, session.bloom(level)))
        .collect()
}

pub fn build_cognitive_profile(
    breakdown: &BTreeMap<BloomLevel, BloomLevelPerformance>,
    policy: &ProfilePolicy,
) -> CognitiveProfile {
    let attempted: Vec<(BloomLevel, &BloomLevelPerformance)> = breakdown
        .iter()
        .filter(|(_, p)| p.is_attempted())
        .map(|(&level, p)| (level, p))
        .collect();

    let mut dominant_strengths: Vec<BloomLevel> = attempted
        .iter()
        .filter(|(_, p)| p.score_percentage >= policy.strength_threshold)
        .map(|(level, _)| *level)
        .collect();
    dominant_strengths.sort_by(|a, b| b.cmp(a));

    let mut growth_areas: Vec<BloomLevel> = attempted
        .iter()
        .filter(|(_, p)| p.score_percentage < policy.growth_threshold)
        .map(|(level, _)| *level)
        .collect();
    let reached_beyond_recall = attempted
        .iter()
        .any(|(level, _)| *level > BloomLevel::Remember);
    // Recall is the fallback growth area, never alongside a recall strength.
    if growth_areas.is_empty()
        && !reached_beyond_recall
        && !dominant_strengths.contains(&BloomLevel::Remember)
    {
        growth_areas.push(BloomLevel::Remember);
    }
    growth_areas.sort();

    let weight_sum: f64 = attempted
        .iter()
        .map(|(level, _)| f64::from(level.complexity()))
        .sum();
    let cognitive_complexity = if weight_sum > 0.0 {
        let weighted: f64 = attempted
            .iter()
            .map(|(level, p)| f64::from(level.complexity()) * p.score_percentage)
            .sum();
        (weighted / weight_sum / 100.0).clamp(0.0, 1.0)
    } else {
        0.0
    };

    let learning_recommendations = if growth_areas.is_empty() {
        vec!["Keep stretching yourself with higher-order evaluate and create questions.".to_string()]
    } else {
        growth_areas
            .iter()
            .map(|&level| recommendation_for(level).to_string())
            .collect()
    };

    CognitiveProfile {
        dominant_strengths,
        growth_areas,
        cognitive_complexity,
        learning_recommendations,
    }
}

fn recommendation_for(level: BloomLevel) -> &'static str {
    match level {
        BloomLevel::Remember => {
            "Remember: reinforce core facts and terminology with short, spaced recall practice."
        }
        BloomLevel::Understand => {
            "Understand: explain each concept in your own words and summarise worked examples."
        }
        BloomLevel::Apply => {
            "Apply: work through hands-on exercises that put the procedures into practice."
        }
        BloomLevel::Analyze => {
            "Analyze: break problems into parts and compare alternative approaches."
        }
        BloomLevel::Evaluate => {
            "Evaluate: critique solutions against explicit criteria and justify the trade-offs."
        }
        BloomLevel::Create => {
            "Create: design small original projects that combine several concepts."
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AdaptiveConfig, StageConfig};
    use crate::manager::AdaptiveManager;
    use crate::model::Question;

    fn perf(attempted: u32, actual: f64, possible: f64) -> BloomLevelPerformance {
        let mut p = BloomLevelPerformance {
            questions_attempted: attempted,
            questions_correct: attempted,
            actual_score: actual,
            possible_score: possible,
            ..Default::default()
        };
        p.refresh();
        p
    }

    #[test]
    fn badge_thresholds() {
        assert_eq!(BadgeLevel::from_percentage(95.0), BadgeLevel::Platinum);
        assert_eq!(BadgeLevel::from_percentage(75.0), BadgeLevel::Gold);
        assert_eq!(BadgeLevel::from_percentage(60.0), BadgeLevel::Silver);
        assert_eq!(BadgeLevel::from_percentage(40.0), BadgeLevel::Bronze);
        assert_eq!(BadgeLevel::from_percentage(39.9), BadgeLevel::Participant);
    }

    #[test]
    fn bloom_breakdown_covers_every_level() {
        let session = AdaptiveSession::new("s");
        let breakdown = build_bloom_breakdown(&session);
        assert_eq!(breakdown.len(), 6);
        assert!(breakdown.values().all(|p| !p.is_attempted()));
    }

    #[test]
    fn profile_orders_strengths_and_growth_areas() {
        let mut breakdown: BTreeMap<BloomLevel, BloomLevelPerformance> = BloomLevel::ALL
            .iter()
            .map(|&l| (l, BloomLevelPerformance::default()))
            .collect();
        breakdown.insert(BloomLevel::Remember, perf(2, 20.0, 20.0));
        breakdown.insert(BloomLevel::Apply, perf(2, 10.0, 40.0));
        breakdown.insert(BloomLevel::Analyze, perf(1, 25.0, 25.0));
        breakdown.insert(BloomLevel::Understand, perf(1, 0.0, 15.0));

        let profile = build_cognitive_profile(&breakdown, &ProfilePolicy::default());
        assert_eq!(
            profile.dominant_strengths,
            vec![BloomLevel::Analyze, BloomLevel::Remember]
        );
        assert_eq!(
            profile.growth_areas,
            vec![BloomLevel::Understand, BloomLevel::Apply]
        );
        assert_eq!(profile.learning_recommendations.len(), 2);
        assert!(profile.learning_recommendations[0].starts_with("Understand"));

        // (1*100 + 2*0 + 3*25 + 4*100) / (1+2+3+4) / 100
        assert!((profile.cognitive_complexity - 0.575).abs() < 1e-9);
    }

    #[test]
    fn strong_recall_is_not_a_growth_area() {
        let mut breakdown: BTreeMap<BloomLevel, BloomLevelPerformance> = BTreeMap::new();
        breakdown.insert(BloomLevel::Remember, perf(3, 30.0, 30.0));
        let profile = build_cognitive_profile(&breakdown, &ProfilePolicy::default());
        assert_eq!(profile.dominant_strengths, vec![BloomLevel::Remember]);
        assert!(profile.growth_areas.is_empty());
        assert_eq!(profile.cognitive_complexity, 1.0);
        assert_eq!(profile.learning_recommendations.len(), 1);
    }

    #[test]
    fn middling_recall_falls_back_to_remember() {
        let policy = ProfilePolicy::default();
        let mut breakdown: BTreeMap<BloomLevel, BloomLevelPerformance> = BTreeMap::new();

        // 70% is neither a strength nor below the growth threshold.
        breakdown.insert(BloomLevel::Remember, perf(3, 21.0, 30.0));
        let profile = build_cognitive_profile(&breakdown, &policy);
        assert!(profile.dominant_strengths.is_empty());
        assert_eq!(profile.growth_areas, vec![BloomLevel::Remember]);

        breakdown.insert(BloomLevel::Remember, perf(3, 9.0, 30.0));
        let profile = build_cognitive_profile(&breakdown, &policy);
        assert_eq!(profile.growth_areas, vec![BloomLevel::Remember]);
    }

    #[test]
    fn compile_after_full_run() {
        let manager = AdaptiveManager::new(AdaptiveConfig {
            max_questions: None,
            ..AdaptiveConfig::uniform(StageConfig {
                initial_questions: 2,
                passing_threshold: 0.5,
                recovery_questions: 2,
                recovery_threshold: 0.5,
                base_points: 1.0,
                recovery_points: 1.0,
            })
        });
        let mut session = AdaptiveSession::new("s");
        let plan = [
            (BloomLevel::Remember, false),
            (BloomLevel::Remember, false), // easy: 0/2 -> recovery
            (BloomLevel::Understand, true),
            (BloomLevel::Apply, false), // recovery 1/2 passes
            (BloomLevel::Apply, true),
            (BloomLevel::Analyze, true), // medium passes
            (BloomLevel::Create, true),
            (BloomLevel::Evaluate, true), // hard passes
        ];
        for (i, (level, ok)) in plan.iter().enumerate() {
            let q = Question::new(format!("q{i}"), *level, session.current_stage);
            manager.process_answer(&mut session, &q, *ok, 10).unwrap();
        }
        assert!(session.is_complete);

        let result = QuizResult::compile(
            &session,
            &manager.config().profile,
            CompletionType::ManualSubmit,
        );
        assert_eq!(result.completion_type, CompletionType::AllStagesPassed);
        assert_eq!(result.questions_attempted, 8);
        assert_eq!(result.questions_correct, 5);
        assert_eq!(result.final_score, session.total_score);

        let easy = &result.stage_breakdown[&Stage::Easy];
        assert_eq!(easy.attempted, 4);
        assert_eq!(easy.correct, 1);
        assert_eq!(easy.percentage, 25.0);
        assert!(easy.passed);
        assert!(easy.recovery_used);
        assert!(!result.stage_breakdown[&Stage::Hard].recovery_used);

        assert_eq!(result.time_breakdown.total_time_secs, 80);
        assert_eq!(result.time_breakdown.average_time_per_question, 10.0);
        assert_eq!(result.time_breakdown.time_by_stage[&Stage::Medium], 20);

        let total_stage_score: f64 = result.stage_breakdown.values().map(|s| s.score).sum();
        let total_bloom_score: f64 = result.bloom_breakdown.values().map(|b| b.actual_score).sum();
        assert!((total_stage_score - result.final_score).abs() < 1e-9);
        assert!((total_bloom_score - result.final_score).abs() < 1e-9);
        assert!(result.percentage > 0.0 && result.percentage <= 100.0);
    }

    #[test]
    fn manual_submit_uses_given_completion() {
        let session = AdaptiveSession::new("s");
        let result =
            QuizResult::compile(&session, &ProfilePolicy::default(), CompletionType::ManualSubmit);
        assert_eq!(result.completion_type, CompletionType::ManualSubmit);
        assert_eq!(result.percentage, 0.0);
        assert_eq!(result.badge_level, BadgeLevel::Participant);
        assert_eq!(result.accuracy(), 0.0);
        assert_eq!(result.cognitive_profile.growth_areas, vec![BloomLevel::Remember]);
    }
}
