//! The `adaptiq validate` command.

use std::path::PathBuf;

use anyhow::Result;

use adaptiq_core::config::load_config_from;
use adaptiq_core::model::Stage;
use adaptiq_core::parser;

pub fn execute(quiz_path: PathBuf, config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let quizzes = parser::load_quizzes(&quiz_path)?;
    anyhow::ensure!(!quizzes.is_empty(), "no quizzes found in {}", quiz_path.display());

    let mut total_warnings = 0;

    for quiz in &quizzes {
        let pools: Vec<String> = Stage::PLAYABLE
            .iter()
            .map(|&stage| format!("{stage} {}", quiz.pool_size(stage)))
            .collect();
        println!(
            "Quiz: {} ({} questions: {})",
            quiz.name,
            quiz.questions.len(),
            pools.join(", ")
        );

        let warnings = parser::validate_quiz(quiz, &config.policy);
        for w in &warnings {
            let prefix = w
                .question_id
                .as_ref()
                .map(|id| format!("  [{id}]"))
                .unwrap_or_else(|| "  ".to_string());
            println!("{prefix} WARNING: {}", w.message);
        }
        total_warnings += warnings.len();
    }

    if total_warnings == 0 {
        println!("All quizzes valid.");
    } else {
        println!("\n{total_warnings} warning(s) found.");
    }

    Ok(())
}
