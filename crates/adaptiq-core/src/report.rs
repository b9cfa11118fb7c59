//! Quiz run reports with JSON persistence and regression detection.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::AdaptiveConfig;
use crate::model::{CompletionType, QuizDefinition, Stage};
use crate::replay::ReplayOutcome;

/// A complete run report: one quiz replayed against one or more transcripts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizReport {
    /// Unique report identifier.
    pub id: Uuid,
    /// When the report was created.
    pub created_at: DateTime<Utc>,
    /// Summary of the quiz.
    pub quiz: QuizSummary,
    /// The policy the run used.
    pub policy: AdaptiveConfig,
    /// One entry per replayed transcript.
    pub runs: Vec<ReplayOutcome>,
    /// Total wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

/// Summary of a quiz (without the full question pool).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizSummary {
    pub id: String,
    pub name: String,
    pub question_count: usize,
    pub pool_sizes: BTreeMap<Stage, usize>,
}

impl QuizSummary {
    pub fn from_quiz(quiz: &QuizDefinition) -> Self {
        Self {
            id: quiz.id.clone(),
            name: quiz.name.clone(),
            question_count: quiz.questions.len(),
            pool_sizes: Stage::PLAYABLE
                .iter()
                .map(|&stage| (stage, quiz.pool_size(stage)))
                .collect(),
        }
    }
}

impl QuizReport {
    pub fn new(
        quiz: &QuizDefinition,
        policy: AdaptiveConfig,
        runs: Vec<ReplayOutcome>,
        duration_ms: u64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            quiz: QuizSummary::from_quiz(quiz),
            policy,
            runs,
            duration_ms,
        }
    }

    /// Mean final percentage across runs (0 with no runs).
    pub fn mean_percentage(&self) -> f64 {
        if self.runs.is_empty() {
            return 0.0;
        }
        self.runs.iter().map(|r| r.result.percentage).sum::<f64>() / self.runs.len() as f64
    }

    /// Number of runs that passed every stage.
    pub fn passed_all_stages(&self) -> usize {
        self.runs
            .iter()
            .filter(|r| r.result.completion_type == CompletionType::AllStagesPassed)
            .count()
    }

    /// Save the report as JSON to a file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize report")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        Ok(())
    }

    /// Load a report from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read report from {}", path.display()))?;
        let report: QuizReport =
            serde_json::from_str(&content).context("failed to parse report JSON")?;
        Ok(report)
    }

    /// Compare this report against a baseline, per transcript.
    ///
    /// Overall percentage and each Bloom level's score percentage (where both
    /// runs attempted it) are compared; a change larger than `threshold`
    /// percentage points counts as a regression or improvement.
    pub fn compare(&self, baseline: &QuizReport, threshold: f64) -> RegressionReport {
        let baseline_runs: BTreeMap<&str, &ReplayOutcome> = baseline
            .runs
            .iter()
            .map(|r| (r.transcript_id.as_str(), r))
            .collect();
        let current_runs: BTreeMap<&str, &ReplayOutcome> = self
            .runs
            .iter()
            .map(|r| (r.transcript_id.as_str(), r))
            .collect();

        let mut regressions = Vec::new();
        let mut improvements = Vec::new();
        let mut unchanged = 0usize;
        let mut new_transcripts = 0usize;

        for (&transcript_id, current) in &current_runs {
            let Some(base) = baseline_runs.get(transcript_id) else {
                new_transcripts += 1;
                continue;
            };

            let mut metrics = vec![(
                "overall".to_string(),
                base.result.percentage,
                current.result.percentage,
            )];
            for (level, cur) in &current.result.bloom_breakdown {
                let Some(old) = base.result.bloom_breakdown.get(level) else {
                    continue;
                };
                if cur.is_attempted() && old.is_attempted() {
                    metrics.push((level.to_string(), old.score_percentage, cur.score_percentage));
                }
            }

            for (metric, baseline_score, current_score) in metrics {
                let delta = current_score - baseline_score;
                let change = ScoreChange {
                    transcript_id: transcript_id.to_string(),
                    metric,
                    baseline_score,
                    current_score,
                    delta,
                };
                if delta < -threshold {
                    regressions.push(change);
                } else if delta > threshold {
                    improvements.push(change);
                } else {
                    unchanged += 1;
                }
            }
        }

        let removed_transcripts = baseline_runs
            .keys()
            .filter(|k| !current_runs.contains_key(*k))
            .count();

        RegressionReport {
            regressions,
            improvements,
            unchanged,
            new_transcripts,
            removed_transcripts,
        }
    }
}

/// Result of comparing two reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionReport {
    /// Metrics that went down.
    pub regressions: Vec<ScoreChange>,
    /// Metrics that went up.
    pub improvements: Vec<ScoreChange>,
    /// Metrics with no significant change.
    pub unchanged: usize,
    /// Transcripts in current but not baseline.
    pub new_transcripts: usize,
    /// Transcripts in baseline but not current.
    pub removed_transcripts: usize,
}

/// A significant change in one metric of one transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreChange {
    pub transcript_id: String,
    /// `overall` or a Bloom level name.
    pub metric: String,
    pub baseline_score: f64,
    pub current_score: f64,
    pub delta: f64,
}

impl RegressionReport {
    /// Format the regression report as markdown.
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();

        md.push_str(&format!(
            "**Summary:** {} regressions, {} improvements, {} unchanged\n\n",
            self.regressions.len(),
            self.improvements.len(),
            self.unchanged
        ));

        for (title, changes) in [
            ("Regressions", &self.regressions),
            ("Improvements", &self.improvements),
        ] {
            if changes.is_empty() {
                continue;
            }
            md.push_str(&format!("### {title}\n\n"));
            md.push_str("| Transcript | Metric | Baseline | Current | Delta |\n");
            md.push_str("|------------|--------|----------|---------|-------|\n");
            for c in changes {
                md.push_str(&format!(
                    "| {} | {} | {:.1}% | {:.1}% | {:+.1}% |\n",
                    c.transcript_id, c.metric, c.baseline_score, c.current_score, c.delta
                ));
            }
            md.push('\n');
        }

        if self.new_transcripts > 0 || self.removed_transcripts > 0 {
            md.push_str(&format!(
                "{} new transcript(s), {} removed\n",
                self.new_transcripts, self.removed_transcripts
            ));
        }

        md
    }

    /// Returns true if there are any regressions.
    pub fn has_regressions(&self) -> bool {
        !self.regressions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProfilePolicy;
    use crate::manager::AdaptiveManager;
    use crate::model::{BloomLevel, Question};
    use crate::results::QuizResult;
    use crate::session::AdaptiveSession;

    /// A run where the examinee answers `pattern` on apply-level easy questions.
    fn run(transcript_id: &str, pattern: &[bool]) -> ReplayOutcome {
        let manager = AdaptiveManager::default();
        let mut session = AdaptiveSession::new(transcript_id);
        for (i, &ok) in pattern.iter().enumerate() {
            let q = Question::new(format!("q{i}"), BloomLevel::Apply, session.current_stage);
            manager.process_answer(&mut session, &q, ok, 10).unwrap();
        }
        ReplayOutcome {
            transcript_id: transcript_id.into(),
            transcript_name: transcript_id.into(),
            session_id: transcript_id.into(),
            steps: vec![],
            unused_answers: 0,
            pool_exhausted: false,
            result: QuizResult::compile(
                &session,
                &ProfilePolicy::default(),
                CompletionType::ManualSubmit,
            ),
        }
    }

    fn make_report(runs: Vec<ReplayOutcome>) -> QuizReport {
        let quiz = QuizDefinition {
            id: "test".into(),
            name: "Test".into(),
            description: String::new(),
            policy: None,
            questions: vec![Question::new("q", BloomLevel::Apply, Stage::Easy)],
        };
        QuizReport::new(&quiz, AdaptiveConfig::default(), runs, 0)
    }

    #[test]
    fn compare_identical_reports() {
        let baseline = make_report(vec![run("t1", &[true, true, false])]);
        let current = make_report(vec![run("t1", &[true, true, false])]);

        let report = current.compare(&baseline, 5.0);
        assert!(report.regressions.is_empty());
        assert!(report.improvements.is_empty());
        // overall + apply
        assert_eq!(report.unchanged, 2);
    }

    #[test]
    fn compare_with_regression() {
        let baseline = make_report(vec![run("t1", &[true, true, true])]);
        let current = make_report(vec![run("t1", &[true, false, false])]);

        let report = current.compare(&baseline, 5.0);
        assert!(report.has_regressions());
        let metrics: Vec<&str> = report.regressions.iter().map(|r| r.metric.as_str()).collect();
        assert_eq!(metrics, vec!["overall", "apply"]);
        assert!(report.regressions[0].delta < -60.0);
    }

    #[test]
    fn compare_with_new_and_removed() {
        let baseline = make_report(vec![run("old", &[true])]);
        let current = make_report(vec![run("new", &[true])]);

        let report = current.compare(&baseline, 5.0);
        assert_eq!(report.new_transcripts, 1);
        assert_eq!(report.removed_transcripts, 1);
        assert!(report.to_markdown().contains("1 new transcript(s), 1 removed"));
    }

    #[test]
    fn json_roundtrip() {
        let report = make_report(vec![run("t1", &[true, false])]);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("report.json");

        report.save_json(&path).unwrap();
        let loaded = QuizReport::load_json(&path).unwrap();

        assert_eq!(loaded.id, report.id);
        assert_eq!(loaded.quiz.id, "test");
        assert_eq!(loaded.quiz.pool_sizes[&Stage::Easy], 1);
        assert_eq!(loaded.runs.len(), 1);
        assert_eq!(loaded.runs[0].result.questions_attempted, 2);
    }

    #[test]
    fn markdown_output() {
        let baseline = make_report(vec![run("t1", &[true, true, true])]);
        let current = make_report(vec![run("t1", &[false, false, false])]);

        let md = current.compare(&baseline, 5.0).to_markdown();
        assert!(md.contains("### Regressions"));
        assert!(md.contains("| t1 | overall |"));
    }

    #[test]
    fn aggregates() {
        let report = make_report(vec![run("a", &[true, true]), run("b", &[false, false])]);
        assert_eq!(report.mean_percentage(), 50.0);
        assert_eq!(report.passed_all_stages(), 0);
        assert_eq!(make_report(vec![]).mean_percentage(), 0.0);
    }
}
