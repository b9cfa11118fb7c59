//! The `adaptiq` command-line tool: replay transcripts, validate quizzes, compare reports.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "adaptiq", version, about = "Adaptive Bloom-scored quiz engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay answer transcripts through a quiz
    Run {
        /// Path to .toml quiz file or directory
        #[arg(long)]
        quiz: PathBuf,

        /// Transcript .toml file or directory of transcripts
        #[arg(long, conflicts_with = "pattern", required_unless_present = "pattern")]
        transcript: Option<PathBuf>,

        /// Inline answer pattern, e.g. "TTFTT"
        #[arg(long)]
        pattern: Option<String>,

        /// Seconds recorded per answer when a transcript omits timing
        #[arg(long)]
        time_per_answer: Option<u64>,

        /// Max concurrent transcript replays
        #[arg(long)]
        parallelism: Option<usize>,

        /// Output directory
        #[arg(long)]
        output: Option<PathBuf>,

        /// Output format: json, html, all, none
        #[arg(long, default_value = "json")]
        format: String,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Compare two run reports
    Compare {
        /// Baseline report JSON
        #[arg(long)]
        baseline: PathBuf,

        /// Current report JSON
        #[arg(long)]
        current: PathBuf,

        /// Regression threshold in percentage points
        #[arg(long, default_value = "5.0")]
        threshold: f64,

        /// Exit code 1 if regressions found
        #[arg(long)]
        fail_on_regression: bool,

        /// Output format: text, json, markdown
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Validate quiz TOML files
    Validate {
        /// Path to quiz file or directory
        #[arg(long)]
        quiz: PathBuf,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Create starter config, example quiz, and transcripts
    Init,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("adaptiq=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            quiz,
            transcript,
            pattern,
            time_per_answer,
            parallelism,
            output,
            format,
            config,
        } => {
            commands::run::execute(
                quiz,
                transcript,
                pattern,
                time_per_answer,
                parallelism,
                output,
                format,
                config,
            )
            .await
        }
        Commands::Compare {
            baseline,
            current,
            threshold,
            fail_on_regression,
            format,
        } => commands::compare::execute(baseline, current, threshold, fail_on_regression, format),
        Commands::Validate { quiz, config } => commands::validate::execute(quiz, config),
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
