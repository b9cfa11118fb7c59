//! Regression detection integration tests.
//!
//! Builds reports from real replays, then exercises JSON persistence and
//! per-transcript comparison.
//!
//! The quiz asks `remember` at easy (10 pts), `apply` at medium (24 pts) and
//! `evaluate` at hard (45 pts), so a perfect run is worth 395 points.

use std::sync::Arc;

use adaptiq_core::config::AdaptiveConfig;
use adaptiq_core::engine::QuizEngine;
use adaptiq_core::memory::{InMemoryQuestionBank, InMemorySessionStore, NoopPublisher};
use adaptiq_core::model::{BloomLevel, Question, QuizDefinition, Stage};
use adaptiq_core::parser::parse_pattern;
use adaptiq_core::replay::{replay_all, NoopReporter, Transcript};
use adaptiq_core::report::QuizReport;

const PERFECT: &str = "TTTTT TTTTT TTTTT";
const ONE_HARD_MISS: &str = "TTTTT TTTTT TTTTF";

fn graded_quiz() -> QuizDefinition {
    let mut questions = Vec::new();
    for (stage, level) in [
        (Stage::Easy, BloomLevel::Remember),
        (Stage::Medium, BloomLevel::Apply),
        (Stage::Hard, BloomLevel::Evaluate),
    ] {
        for i in 0..8 {
            questions.push(Question::new(format!("{stage}-{i}"), level, stage));
        }
    }
    QuizDefinition {
        id: "graded".into(),
        name: "Graded".into(),
        description: String::new(),
        policy: None,
        questions,
    }
}

async fn make_report(runs: &[(&str, &str)]) -> QuizReport {
    let quiz = graded_quiz();
    let policy = quiz.effective_policy(&AdaptiveConfig::default());
    let engine = Arc::new(QuizEngine::new(
        Arc::new(InMemorySessionStore::new()),
        Arc::new(InMemoryQuestionBank::new(quiz.questions.clone())),
        Arc::new(NoopPublisher),
        policy.clone(),
    ));
    let transcripts: Vec<Transcript> = runs
        .iter()
        .map(|(id, pattern)| Transcript {
            id: id.to_string(),
            name: id.to_string(),
            answers: parse_pattern(pattern).unwrap(),
        })
        .collect();

    let outcomes = replay_all(engine, &transcripts, 30, 2, &NoopReporter).await;
    assert_eq!(outcomes.len(), runs.len());
    QuizReport::new(&quiz, policy, outcomes, 0)
}

#[tokio::test]
async fn detect_regression_when_hard_answer_is_missed() {
    let baseline = make_report(&[("alice", PERFECT), ("bob", PERFECT)]).await;
    let current = make_report(&[("alice", ONE_HARD_MISS), ("bob", PERFECT)]).await;

    let report = current.compare(&baseline, 5.0);

    assert!(report.has_regressions());
    // 395 -> 350 overall, evaluate 100% -> 80%.
    assert_eq!(report.regressions.len(), 2);
    assert!(report.regressions.iter().all(|c| c.transcript_id == "alice"));

    let overall = report
        .regressions
        .iter()
        .find(|c| c.metric == "overall")
        .unwrap();
    assert!((overall.current_score - 350.0 / 395.0 * 100.0).abs() < 1e-9);
    assert!(overall.delta < 0.0);

    let evaluate = report
        .regressions
        .iter()
        .find(|c| c.metric == "evaluate")
        .unwrap();
    assert!((evaluate.delta + 20.0).abs() < 1e-9);
}

#[tokio::test]
async fn detect_regression_when_recovery_fails() {
    let baseline = make_report(&[("alice", PERFECT)]).await;
    let current = make_report(&[("alice", "FFTFF FTF")]).await;

    let report = current.compare(&baseline, 5.0);

    assert!(report.has_regressions());
    let overall = report
        .regressions
        .iter()
        .find(|c| c.metric == "overall")
        .unwrap();
    assert!(overall.current_score < 30.0);
}

#[tokio::test]
async fn detect_improvement() {
    let baseline = make_report(&[("alice", ONE_HARD_MISS)]).await;
    let current = make_report(&[("alice", PERFECT)]).await;

    let report = current.compare(&baseline, 5.0);

    assert!(!report.has_regressions());
    assert_eq!(report.improvements.len(), 2);
    assert!(report.improvements.iter().all(|c| c.delta > 0.0));
}

#[tokio::test]
async fn no_change_with_identical_results() {
    let baseline = make_report(&[("alice", PERFECT), ("bob", ONE_HARD_MISS)]).await;

    let report = baseline.compare(&baseline, 5.0);

    assert!(!report.has_regressions());
    assert!(report.improvements.is_empty());
    // overall plus remember, apply, evaluate for each transcript
    assert_eq!(report.unchanged, 8);
}

#[tokio::test]
async fn detect_new_and_removed_transcripts() {
    let baseline = make_report(&[("old", PERFECT), ("shared", PERFECT)]).await;
    let current = make_report(&[("shared", PERFECT), ("new", PERFECT)]).await;

    let report = current.compare(&baseline, 5.0);

    assert_eq!(report.new_transcripts, 1);
    assert_eq!(report.removed_transcripts, 1);
    assert!(!report.has_regressions());
}

#[tokio::test]
async fn unattempted_levels_are_not_compared() {
    // The baseline never reaches medium or hard.
    let baseline = make_report(&[("alice", "FFTFF FTF")]).await;
    let current = make_report(&[("alice", PERFECT)]).await;

    let report = current.compare(&baseline, 5.0);

    let metrics: Vec<&str> = report
        .improvements
        .iter()
        .map(|c| c.metric.as_str())
        .collect();
    assert!(metrics.contains(&"overall"));
    assert!(!metrics.contains(&"apply"));
    assert!(!metrics.contains(&"evaluate"));
}

#[tokio::test]
async fn json_roundtrip_preserves_data() {
    let report = make_report(&[("alice", PERFECT), ("bob", "FFTFF FTF")]).await;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("report.json");

    report.save_json(&path).unwrap();
    let loaded = QuizReport::load_json(&path).unwrap();

    assert_eq!(loaded.id, report.id);
    assert_eq!(loaded.quiz.id, "graded");
    assert_eq!(loaded.runs.len(), 2);
    assert_eq!(loaded.runs[0].transcript_id, "alice");
    assert_eq!(loaded.runs[1].steps.len(), 8);
    assert_eq!(loaded.policy, report.policy);
    assert_eq!(loaded.passed_all_stages(), 1);
}

#[tokio::test]
async fn markdown_report_format() {
    let baseline = make_report(&[("alice", PERFECT)]).await;
    let current = make_report(&[("alice", ONE_HARD_MISS)]).await;

    let md = current.compare(&baseline, 5.0).to_markdown();

    assert!(md.contains("### Regressions"));
    assert!(md.contains("| alice | overall | 100.0% |"));
    assert!(md.contains("| alice | evaluate | 100.0% | 80.0% | -20.0% |"));
    assert!(md.contains("2 regressions"));
}

#[tokio::test]
async fn threshold_controls_sensitivity() {
    let baseline = make_report(&[("alice", PERFECT)]).await;
    let current = make_report(&[("alice", ONE_HARD_MISS)]).await;

    // overall -11.4, evaluate -20.0
    assert_eq!(current.compare(&baseline, 5.0).regressions.len(), 2);
    assert_eq!(current.compare(&baseline, 15.0).regressions.len(), 1);
    assert!(!current.compare(&baseline, 25.0).has_regressions());
}
