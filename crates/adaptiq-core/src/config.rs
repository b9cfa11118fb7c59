//! Stage policy and tool configuration.
//!
//! `AdaptiveConfig` is the quiz-specific policy handed to the manager.
//! `AdaptiqConfig` is the tool-level configuration loaded from `adaptiq.toml`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::AdaptiveError;
use crate::model::Stage;
use crate::scoring::ScoringMode;

/// Per-stage thresholds and question quotas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageConfig {
    /// Questions in the initial round.
    pub initial_questions: u32,
    /// Fraction correct needed to pass the initial round.
    pub passing_threshold: f64,
    /// Questions in the recovery round.
    pub recovery_questions: u32,
    /// Fraction correct needed to pass the recovery round.
    pub recovery_threshold: f64,
    /// Points per correct answer in flat scoring mode.
    #[serde(default)]
    pub base_points: f64,
    /// Points per correct recovery answer in flat scoring mode.
    #[serde(default)]
    pub recovery_points: f64,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            initial_questions: 5,
            passing_threshold: 0.8,
            recovery_questions: 3,
            recovery_threshold: 0.67,
            base_points: 3.0,
            recovery_points: 2.0,
        }
    }
}

impl StageConfig {
    /// Documented default policy for a stage.
    pub fn default_for(stage: Stage) -> Self {
        match stage {
            Stage::Easy | Stage::Complete => Self::default(),
            Stage::Medium => Self {
                base_points: 7.0,
                recovery_points: 4.0,
                ..Self::default()
            },
            // 3/5 is enough at the hardest stage.
            Stage::Hard => Self {
                passing_threshold: 0.6,
                base_points: 10.0,
                recovery_points: 6.0,
                ..Self::default()
            },
        }
    }

    /// Question quota of the current round.
    pub fn round_size(&self, in_recovery: bool) -> u32 {
        if in_recovery {
            self.recovery_questions
        } else {
            self.initial_questions
        }
    }

    /// Pass threshold of the current round.
    pub fn round_threshold(&self, in_recovery: bool) -> f64 {
        if in_recovery {
            self.recovery_threshold
        } else {
            self.passing_threshold
        }
    }
}

/// Thresholds used to build the cognitive profile (score-percentage units).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfilePolicy {
    #[serde(default = "default_strength_threshold")]
    pub strength_threshold: f64,
    #[serde(default = "default_growth_threshold")]
    pub growth_threshold: f64,
}

fn default_strength_threshold() -> f64 {
    80.0
}

fn default_growth_threshold() -> f64 {
    60.0
}

impl Default for ProfilePolicy {
    fn default() -> Self {
        Self {
            strength_threshold: default_strength_threshold(),
            growth_threshold: default_growth_threshold(),
        }
    }
}

/// Quiz-specific adaptive policy.
///
/// Omitted sections take their defaults; a `stages` table that names only
/// some stages leaves the others to `StageConfig::default_for`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptiveConfig {
    /// Hard cap on questions per session (None or 0 = no cap).
    pub max_questions: Option<u32>,
    pub scoring: ScoringMode,
    pub profile: ProfilePolicy,
    pub stages: BTreeMap<Stage, StageConfig>,
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self {
            max_questions: Some(25),
            scoring: ScoringMode::default(),
            profile: ProfilePolicy::default(),
            stages: Stage::PLAYABLE
                .iter()
                .map(|&s| (s, StageConfig::default_for(s)))
                .collect(),
        }
    }
}

impl AdaptiveConfig {
    /// Build a config with the same policy at every stage.
    pub fn uniform(stage_config: StageConfig) -> Self {
        Self {
            stages: Stage::PLAYABLE
                .iter()
                .map(|&s| (s, stage_config.clone()))
                .collect(),
            ..Self::default()
        }
    }

    /// Effective question cap, if any.
    pub fn question_cap(&self) -> Option<u32> {
        self.max_questions.filter(|&max| max > 0)
    }

    /// Look up the policy for `stage`.
    pub fn stage_config(&self, stage: Stage) -> Result<&StageConfig, AdaptiveError> {
        self.stages
            .get(&stage)
            .ok_or(AdaptiveError::ConfigMissing(stage))
    }

    /// Policy for `stage`, falling back to the documented default.
    pub fn stage_config_or_default(&self, stage: Stage) -> StageConfig {
        match self.stage_config(stage) {
            Ok(config) => config.clone(),
            Err(e) => {
                tracing::warn!("{e}; using default policy");
                StageConfig::default_for(stage)
            }
        }
    }
}

/// Top-level adaptiq tool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaptiqConfig {
    /// Output directory for reports.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Seconds recorded per answer when a transcript omits timing.
    #[serde(default = "default_time_secs")]
    pub default_time_secs: u64,
    /// Max concurrent transcript replays.
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,
    /// Policy used when a quiz file has no `[policy]` section.
    #[serde(default)]
    pub policy: AdaptiveConfig,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./adaptiq-results")
}
fn default_time_secs() -> u64 {
    30
}
fn default_parallelism() -> usize {
    4
}

impl Default for AdaptiqConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            default_time_secs: default_time_secs(),
            parallelism: default_parallelism(),
            policy: AdaptiveConfig::default(),
        }
    }
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `adaptiq.toml` in the current directory
/// 2. `~/.config/adaptiq/config.toml`
///
/// Environment variable overrides: `ADAPTIQ_OUTPUT_DIR`, `ADAPTIQ_PARALLELISM`.
pub fn load_config() -> Result<AdaptiqConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<AdaptiqConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("adaptiq.toml");
        if local.exists() {
            Some(local)
        } else {
            dirs_path()
                .map(|home| home.join("config.toml"))
                .filter(|global| global.exists())
        }
    };

    let mut config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            tracing::debug!("loaded config from {}", path.display());
            toml::from_str::<AdaptiqConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => AdaptiqConfig::default(),
    };

    if let Ok(dir) = std::env::var("ADAPTIQ_OUTPUT_DIR") {
        config.output_dir = PathBuf::from(dir);
    }
    if let Ok(raw) = std::env::var("ADAPTIQ_PARALLELISM") {
        config.parallelism = raw
            .parse()
            .with_context(|| format!("invalid ADAPTIQ_PARALLELISM: {raw}"))?;
    }

    Ok(config)
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("adaptiq"))
}
