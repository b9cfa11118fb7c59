//! The `adaptiq init` command.

use std::path::Path;

use anyhow::{Context, Result};

pub fn execute() -> Result<()> {
    write_if_missing(Path::new("adaptiq.toml"), SAMPLE_CONFIG)?;

    std::fs::create_dir_all("quizzes").context("failed to create quizzes/")?;
    write_if_missing(Path::new("quizzes/example.toml"), EXAMPLE_QUIZ)?;

    std::fs::create_dir_all("transcripts").context("failed to create transcripts/")?;
    write_if_missing(Path::new("transcripts/example.toml"), EXAMPLE_TRANSCRIPT)?;

    println!("\nNext steps:");
    println!("  1. Edit quizzes/example.toml with your own questions");
    println!("  2. Run: adaptiq validate --quiz quizzes/example.toml");
    println!("  3. Run: adaptiq run --quiz quizzes/example.toml --transcript transcripts");

    Ok(())
}

fn write_if_missing(path: &Path, content: &str) -> Result<()> {
    if path.exists() {
        println!("{} already exists, skipping.", path.display());
    } else {
        std::fs::write(path, content)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("Created {}", path.display());
    }
    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# adaptiq configuration

output_dir = "./adaptiq-results"
default_time_secs = 30
parallelism = 4

# Policy for quizzes that have no [policy] section of their own.
[policy]
max_questions = 25

[policy.scoring]
mode = "bloom"
recovery_multiplier = 1.0

[policy.profile]
strength_threshold = 80.0
growth_threshold = 60.0

[policy.stages.easy]
initial_questions = 5
passing_threshold = 0.8
recovery_questions = 3
recovery_threshold = 0.67

[policy.stages.medium]
initial_questions = 5
passing_threshold = 0.8
recovery_questions = 3
recovery_threshold = 0.67

[policy.stages.hard]
initial_questions = 5
passing_threshold = 0.6
recovery_questions = 3
recovery_threshold = 0.67
"#;

const EXAMPLE_QUIZ: &str = r#"[quiz]
id = "example"
name = "Example Quiz"
description = "A small adaptive quiz to get started"

[policy]
max_questions = 12

[policy.stages.easy]
initial_questions = 2
passing_threshold = 0.5
recovery_questions = 1
recovery_threshold = 1.0

[policy.stages.medium]
initial_questions = 2
passing_threshold = 0.5
recovery_questions = 1
recovery_threshold = 1.0

[policy.stages.hard]
initial_questions = 2
passing_threshold = 0.5
recovery_questions = 1
recovery_threshold = 1.0

[[questions]]
id = "easy-1"
bloom_level = "remember"
stage = "easy"
content = "Which keyword declares an immutable binding?"

[[questions]]
id = "easy-2"
bloom_level = "understand"
stage = "easy"
content = "Explain what happens to a String after it is moved."

[[questions]]
id = "easy-3"
bloom_level = "remember"
stage = "easy"
content = "What does `&mut` denote?"

[[questions]]
id = "medium-1"
bloom_level = "apply"
stage = "medium"
content = "Rewrite the loop to borrow the vector instead of consuming it."

[[questions]]
id = "medium-2"
bloom_level = "analyze"
stage = "medium"
content = "Why does this closure fail to compile?"

[[questions]]
id = "medium-3"
bloom_level = "apply"
stage = "medium"
content = "Return a slice of the longest word."

[[questions]]
id = "hard-1"
bloom_level = "evaluate"
stage = "hard"
content = "Compare Rc<RefCell<T>> with passing &mut T for this graph."

[[questions]]
id = "hard-2"
bloom_level = "create"
stage = "hard"
content = "Design a borrow-friendly API for an in-memory cache."

[[questions]]
id = "hard-3"
bloom_level = "evaluate"
stage = "hard"
content = "Judge whether this unsafe block upholds its invariants."
"#;

const EXAMPLE_TRANSCRIPT: &str = r#"[transcript]
id = "example"
name = "Example learner"

[[answers]]
correct = true
time_secs = 20

[[answers]]
correct = false
time_secs = 45

[[answers]]
correct = true
time_secs = 30

[[answers]]
correct = true
time_secs = 35

[[answers]]
correct = true
time_secs = 60

[[answers]]
correct = false
time_secs = 90
"#;
