//! The `adaptiq compare` command.

use std::path::PathBuf;

use anyhow::Result;

use adaptiq_core::report::QuizReport;

pub fn execute(
    baseline_path: PathBuf,
    current_path: PathBuf,
    threshold: f64,
    fail_on_regression: bool,
    format: String,
) -> Result<()> {
    anyhow::ensure!(threshold >= 0.0, "threshold must not be negative");

    let baseline = QuizReport::load_json(&baseline_path)?;
    let current = QuizReport::load_json(&current_path)?;

    if baseline.quiz.id != current.quiz.id {
        eprintln!(
            "Warning: comparing different quizzes ({} vs {})",
            baseline.quiz.id, current.quiz.id
        );
    }

    let report = current.compare(&baseline, threshold);

    match format.as_str() {
        "markdown" | "md" => {
            println!("{}", report.to_markdown());
        }
        "json" => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        _ => {
            println!(
                "Comparison: {} regressions, {} improvements, {} unchanged",
                report.regressions.len(),
                report.improvements.len(),
                report.unchanged
            );

            for (title, changes) in [
                ("Regressions", &report.regressions),
                ("Improvements", &report.improvements),
            ] {
                if changes.is_empty() {
                    continue;
                }
                println!("\n{title}:");
                for c in changes {
                    println!(
                        "  {} ({}) {:.1}% -> {:.1}% ({:+.1}%)",
                        c.transcript_id, c.metric, c.baseline_score, c.current_score, c.delta
                    );
                }
            }

            if report.new_transcripts > 0 {
                println!("\n{} new transcript(s)", report.new_transcripts);
            }
            if report.removed_transcripts > 0 {
                println!("{} removed transcript(s)", report.removed_transcripts);
            }
        }
    }

    if fail_on_regression && report.has_regressions() {
        std::process::exit(1);
    }

    Ok(())
}
