//! TOML quiz and transcript parser.
//!
//! Loads quiz definitions and answer transcripts from TOML files and
//! directories, and validates quizzes against their policy.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::config::{AdaptiveConfig, StageConfig};
use crate::model::{BloomLevel, Question, QuizDefinition, Stage};
use crate::replay::{Transcript, TranscriptAnswer};
use crate::selection::{self, MIN_LEVELS_PER_STAGE, REQUIRED_LEVELS};

/// Intermediate TOML structure for quiz files.
#[derive(Debug, Deserialize)]
struct TomlQuizFile {
    quiz: TomlQuizHeader,
    #[serde(default)]
    policy: Option<AdaptiveConfig>,
    #[serde(default)]
    questions: Vec<TomlQuestion>,
}

#[derive(Debug, Deserialize)]
struct TomlQuizHeader {
    id: String,
    name: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct TomlQuestion {
    id: String,
    bloom_level: String,
    #[serde(alias = "difficulty_level")]
    stage: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    tags: Vec<String>,
}

/// Intermediate TOML structure for transcript files.
#[derive(Debug, Deserialize)]
struct TomlTranscriptFile {
    transcript: TomlTranscriptHeader,
    #[serde(default)]
    answers: Vec<TranscriptAnswer>,
}

#[derive(Debug, Deserialize)]
struct TomlTranscriptHeader {
    id: String,
    #[serde(default)]
    name: String,
    /// Shorthand for `[[answers]]`: a string of `T`/`F` marks.
    #[serde(default)]
    pattern: Option<String>,
}

/// Parse a single TOML file into a `QuizDefinition`.
pub fn parse_quiz(path: &Path) -> Result<QuizDefinition> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read quiz file: {}", path.display()))?;

    parse_quiz_str(&content, path)
}

/// Parse a TOML string into a `QuizDefinition`.
pub fn parse_quiz_str(content: &str, source_path: &Path) -> Result<QuizDefinition> {
    let parsed: TomlQuizFile = toml::from_str(content)
        .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?;

    let questions = parsed
        .questions
        .into_iter()
        .map(|q| {
            let bloom_level: BloomLevel = q
                .bloom_level
                .parse()
                .with_context(|| format!("question {}", q.id))?;
            let stage: Stage = q.stage.parse().with_context(|| format!("question {}", q.id))?;
            Ok(Question {
                id: q.id,
                bloom_level,
                difficulty_level: stage,
                content: q.content,
                tags: q.tags,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(QuizDefinition {
        id: parsed.quiz.id,
        name: parsed.quiz.name,
        description: parsed.quiz.description,
        policy: parsed.policy,
        questions,
    })
}

/// Load a quiz from a file, or every quiz under a directory.
pub fn load_quizzes(path: &Path) -> Result<Vec<QuizDefinition>> {
    if path.is_dir() {
        load_quiz_directory(path)
    } else {
        Ok(vec![parse_quiz(path)?])
    }
}

/// Recursively load all `.toml` quiz files from a directory.
///
/// Files that fail to parse are skipped with a warning.
pub fn load_quiz_directory(dir: &Path) -> Result<Vec<QuizDefinition>> {
    let mut quizzes = Vec::new();
    for path in toml_files(dir)? {
        match parse_quiz(&path) {
            Ok(quiz) => quizzes.push(quiz),
            Err(e) => tracing::warn!("skipping {}: {e:#}", path.display()),
        }
    }
    Ok(quizzes)
}

/// Parse a single TOML file into a `Transcript`.
pub fn parse_transcript(path: &Path) -> Result<Transcript> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read transcript file: {}", path.display()))?;

    parse_transcript_str(&content, path)
}

/// Parse a TOML string into a `Transcript`.
pub fn parse_transcript_str(content: &str, source_path: &Path) -> Result<Transcript> {
    let parsed: TomlTranscriptFile = toml::from_str(content)
        .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?;

    let answers = match parsed.transcript.pattern {
        Some(_) if !parsed.answers.is_empty() => anyhow::bail!(
            "{}: transcript sets both `pattern` and [[answers]]",
            source_path.display()
        ),
        Some(pattern) => parse_pattern(&pattern)
            .with_context(|| format!("bad pattern in {}", source_path.display()))?,
        None => parsed.answers,
    };

    let name = if parsed.transcript.name.is_empty() {
        parsed.transcript.id.clone()
    } else {
        parsed.transcript.name
    };

    Ok(Transcript {
        id: parsed.transcript.id,
        name,
        answers,
    })
}

/// Load a transcript from a file, or every transcript under a directory.
pub fn load_transcripts(path: &Path) -> Result<Vec<Transcript>> {
    if path.is_dir() {
        load_transcript_directory(path)
    } else {
        Ok(vec![parse_transcript(path)?])
    }
}

/// Recursively load all `.toml` transcript files from a directory.
pub fn load_transcript_directory(dir: &Path) -> Result<Vec<Transcript>> {
    let mut transcripts = Vec::new();
    for path in toml_files(dir)? {
        match parse_transcript(&path) {
            Ok(t) => transcripts.push(t),
            Err(e) => tracing::warn!("skipping {}: {e:#}", path.display()),
        }
    }
    Ok(transcripts)
}

/// Parse a `T`/`F` answer pattern such as `"TTFTF"`.
///
/// `T`/`Y`/`1` are correct, `F`/`N`/`0` incorrect (case-insensitive);
/// whitespace, commas, and dashes are ignored.
pub fn parse_pattern(pattern: &str) -> Result<Vec<TranscriptAnswer>> {
    pattern
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(*c, ',' | '-'))
        .map(|c| {
            let correct = match c.to_ascii_uppercase() {
                'T' | 'Y' | '1' => true,
                'F' | 'N' | '0' => false,
                other => anyhow::bail!("unexpected answer mark {other:?}"),
            };
            Ok(TranscriptAnswer {
                correct,
                time_secs: None,
            })
        })
        .collect()
}

/// Build a transcript from a pattern given on the command line.
pub fn transcript_from_pattern(pattern: &str) -> Result<Transcript> {
    let answers = parse_pattern(pattern)?;
    if answers.is_empty() {
        anyhow::bail!("answer pattern is empty");
    }
    Ok(Transcript {
        id: "pattern".to_string(),
        name: format!("pattern {pattern}"),
        answers,
    })
}

/// `.toml` files under `dir`, recursively, in path order.
fn toml_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        anyhow::bail!("not a directory: {}", dir.display());
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
    {
        let path = entry?.path();
        if path.is_dir() {
            files.extend(toml_files(&path)?);
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// A warning from quiz validation.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    /// The question ID (if applicable).
    pub question_id: Option<String>,
    /// Warning message.
    pub message: String,
}

impl ValidationWarning {
    fn quiz(message: impl Into<String>) -> Self {
        Self {
            question_id: None,
            message: message.into(),
        }
    }

    fn question(id: &str, message: impl Into<String>) -> Self {
        Self {
            question_id: Some(id.to_string()),
            message: message.into(),
        }
    }
}

/// Validate a quiz for common issues.
///
/// `fallback` is the policy used when the quiz has none of its own.
pub fn validate_quiz(quiz: &QuizDefinition, fallback: &AdaptiveConfig) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    if quiz.questions.is_empty() {
        warnings.push(ValidationWarning::quiz("quiz has no questions"));
    }

    let mut seen_ids = HashSet::new();
    for q in &quiz.questions {
        if !seen_ids.insert(&q.id) {
            warnings.push(ValidationWarning::question(
                &q.id,
                format!("duplicate question ID: {}", q.id),
            ));
        }
        if q.content.trim().is_empty() {
            warnings.push(ValidationWarning::question(&q.id, "content is empty"));
        }
        if !q.difficulty_level.is_playable() {
            warnings.push(ValidationWarning::question(
                &q.id,
                "targets the complete stage and will never be asked",
            ));
        }
    }

    let policy = quiz.effective_policy(fallback);
    for stage in Stage::PLAYABLE {
        let config = match policy.stage_config(stage) {
            Ok(config) => config.clone(),
            Err(_) => {
                warnings.push(ValidationWarning::quiz(format!(
                    "no policy for stage {stage}; defaults apply"
                )));
                StageConfig::default_for(stage)
            }
        };

        for (label, value) in [
            ("passing_threshold", config.passing_threshold),
            ("recovery_threshold", config.recovery_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                warnings.push(ValidationWarning::quiz(format!(
                    "stage {stage}: {label} {value} is outside [0, 1]"
                )));
            }
        }
        if config.initial_questions == 0 {
            warnings.push(ValidationWarning::quiz(format!(
                "stage {stage}: initial_questions is 0; the round completes after one answer"
            )));
        }

        let needed = (config.initial_questions + config.recovery_questions) as usize;
        let pooled = quiz.pool_size(stage);
        if pooled < needed {
            warnings.push(ValidationWarning::quiz(format!(
                "stage {stage} has {pooled} question(s) but a run may need {needed}"
            )));
        }
    }

    if !quiz.questions.is_empty() {
        for level in REQUIRED_LEVELS {
            if !quiz.questions.iter().any(|q| q.bloom_level == level) {
                warnings.push(ValidationWarning::quiz(format!(
                    "no questions for Bloom level {level}"
                )));
            }
        }
    }

    for (stage, levels) in selection::bloom_matrix(&quiz.questions) {
        if stage.is_playable() && levels.len() < MIN_LEVELS_PER_STAGE {
            warnings.push(ValidationWarning::quiz(format!(
                "stage {stage} has too little Bloom diversity (only {} level(s))",
                levels.len()
            )));
        }
    }

    warnings
}
