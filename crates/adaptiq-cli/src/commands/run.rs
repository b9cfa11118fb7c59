//! The `adaptiq run` command.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;

use adaptiq_core::config::load_config_from;
use adaptiq_core::engine::QuizEngine;
use adaptiq_core::memory::{InMemoryQuestionBank, InMemorySessionStore, NoopPublisher};
use adaptiq_core::parser;
use adaptiq_core::replay::{replay_all, ReplayOutcome, ReplayReporter, ReplayStep};
use adaptiq_core::report::QuizReport;
use adaptiq_report::html::write_html_report;

/// Console progress reporter.
struct ConsoleReporter;

impl ReplayReporter for ConsoleReporter {
    fn on_replay_start(&self, transcript_id: &str) {
        eprintln!("  Starting: {transcript_id}");
    }

    fn on_answer(&self, transcript_id: &str, step: &ReplayStep) {
        if let (true, Some(next)) = (step.stage_update, step.next_stage) {
            eprintln!(
                "  {transcript_id}: passed {} after {} answers, now {next}",
                step.stage,
                step.index + 1
            );
        }
    }

    fn on_replay_complete(&self, outcome: &ReplayOutcome) {
        let r = &outcome.result;
        eprintln!(
            "  Done: {} [{}] {:.1}% {} ({}/{} correct)",
            outcome.transcript_id,
            r.completion_type,
            r.percentage,
            r.badge_level,
            r.questions_correct,
            r.questions_attempted,
        );
    }

    fn on_replay_error(&self, transcript_id: &str, error: &str) {
        eprintln!("  ERROR: {transcript_id}: {error}");
    }

    fn on_all_complete(&self, total: usize, completed: usize, failed: usize, elapsed: Duration) {
        eprintln!(
            "\nComplete: {completed}/{total} replayed, {failed} failed ({:.1}s)",
            elapsed.as_secs_f64()
        );
    }
}

#[allow(clippy::too_many_arguments)]
pub async fn execute(
    quiz_path: PathBuf,
    transcript_path: Option<PathBuf>,
    pattern: Option<String>,
    time_per_answer: Option<u64>,
    parallelism: Option<usize>,
    output: Option<PathBuf>,
    format: String,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;

    let parallelism = parallelism.unwrap_or(config.parallelism);
    anyhow::ensure!(parallelism >= 1, "parallelism must be at least 1");
    let time_per_answer = time_per_answer.unwrap_or(config.default_time_secs);
    let output = output.unwrap_or_else(|| config.output_dir.clone());

    let formats: Vec<&str> = match format.as_str() {
        "all" => vec!["json", "html"],
        "none" => vec![],
        other => other.split(',').map(str::trim).collect(),
    };
    if let Some(bad) = formats.iter().find(|f| !matches!(**f, "json" | "html")) {
        anyhow::bail!("unknown output format: {bad} (expected json, html, all, or none)");
    }

    let quizzes = parser::load_quizzes(&quiz_path)?;
    anyhow::ensure!(!quizzes.is_empty(), "no quizzes found in {}", quiz_path.display());

    let transcripts = match (&pattern, &transcript_path) {
        (Some(p), _) => vec![parser::transcript_from_pattern(p)?],
        (None, Some(path)) => parser::load_transcripts(path)?,
        (None, None) => anyhow::bail!("either --transcript or --pattern is required"),
    };
    anyhow::ensure!(!transcripts.is_empty(), "no transcripts to replay");

    for quiz in &quizzes {
        for w in parser::validate_quiz(quiz, &config.policy) {
            match w.question_id {
                Some(id) => eprintln!("Warning: [{id}] {}", w.message),
                None => eprintln!("Warning: {}", w.message),
            }
        }

        let policy = quiz.effective_policy(&config.policy);
        tracing::debug!(quiz = %quiz.id, ?policy, "effective policy");
        let engine = Arc::new(QuizEngine::new(
            Arc::new(InMemorySessionStore::new()),
            Arc::new(InMemoryQuestionBank::new(quiz.questions.clone())),
            Arc::new(NoopPublisher),
            policy.clone(),
        ));

        eprintln!(
            "adaptiq v{} - Replaying {} transcript(s) through {} ({} questions)",
            env!("CARGO_PKG_VERSION"),
            transcripts.len(),
            quiz.name,
            quiz.questions.len()
        );
        eprintln!();

        let start = Instant::now();
        let runs = replay_all(
            engine,
            &transcripts,
            time_per_answer,
            parallelism,
            &ConsoleReporter,
        )
        .await;
        anyhow::ensure!(!runs.is_empty(), "every replay of {} failed", quiz.id);

        let report = QuizReport::new(quiz, policy, runs, start.elapsed().as_millis() as u64);

        print_summary(&report);

        if formats.is_empty() {
            continue;
        }
        std::fs::create_dir_all(&output)?;
        let timestamp = chrono::Utc::now().format("%Y-%m-%dT%H%M%S");

        for fmt in &formats {
            match *fmt {
                "json" => {
                    let path = output.join(format!("{}-{timestamp}.json", quiz.id));
                    report.save_json(&path)?;
                    eprintln!("Results saved to: {}", path.display());
                }
                "html" => {
                    let path = output.join(format!("{}-{timestamp}.html", quiz.id));
                    write_html_report(&report, &path)?;
                    eprintln!("HTML report: {}", path.display());
                }
                _ => eprintln!("Unknown format: {fmt}"),
            }
        }
    }

    Ok(())
}

fn print_summary(report: &QuizReport) {
    use comfy_table::{Cell, Table};

    let mut table = Table::new();
    table.set_header(vec![
        "Transcript",
        "Completion",
        "Score",
        "Percentage",
        "Badge",
        "Correct",
        "Easy",
        "Medium",
        "Hard",
    ]);

    for run in &report.runs {
        let r = &run.result;
        let mut row = vec![
            Cell::new(&run.transcript_name),
            Cell::new(r.completion_type),
            Cell::new(format!("{:.1}", r.final_score)),
            Cell::new(format!("{:.1}%", r.percentage)),
            Cell::new(r.badge_level),
            Cell::new(format!("{}/{}", r.questions_correct, r.questions_attempted)),
        ];
        for s in r.stage_breakdown.values() {
            let mark = match (s.attempted, s.passed, s.recovery_used) {
                (0, _, _) => "-".to_string(),
                (_, true, false) => format!("pass {}/{}", s.correct, s.attempted),
                (_, true, true) => format!("pass* {}/{}", s.correct, s.attempted),
                (_, false, _) => format!("fail {}/{}", s.correct, s.attempted),
            };
            row.push(Cell::new(mark));
        }
        table.add_row(row);
    }

    eprintln!("\n{table}");
    eprintln!(
        "Mean: {:.1}% | passed all stages: {}/{}",
        report.mean_percentage(),
        report.passed_all_stages(),
        report.runs.len()
    );
}
