//! Flag Benchmark CLI

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use flag_benchmark::{
    config::Config,
    corpus::load_corpus,
    providers::create_provider,
    reporting::{print_console_report, write_outcomes, FailureEntry, FailureRecorder, RunSummary},
    runner::{ConsoleProgress, Executor},
};

#[derive(Parser)]
#[command(name = "flag-benchmark")]
#[command(about = "Measure how well LLM backends recover flags from challenge descriptions")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate every challenge against every model
    Run {
        /// Directory containing one JSON file per challenge
        #[arg(long, default_value = ".")]
        corpus: PathBuf,

        /// Comma-separated model list (overrides config)
        #[arg(short, long)]
        models: Option<String>,

        /// Maximum requests per challenge and model
        #[arg(long, conflicts_with = "unbounded")]
        max_attempts: Option<u32>,

        /// Re-prompt until a flag is produced or the backend fails
        #[arg(long)]
        unbounded: bool,

        /// Evaluate all models of a challenge concurrently
        #[arg(long)]
        parallel_models: bool,

        /// Output directory for results
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Also write every pair outcome to outcomes.json
        #[arg(long)]
        save_outcomes: bool,

        /// Print per-pair progress
        #[arg(long)]
        progress: bool,
    },

    /// Load the corpus and list its challenges without calling a backend
    List {
        /// Directory containing one JSON file per challenge
        #[arg(long, default_value = ".")]
        corpus: PathBuf,
    },

    /// Generate sample configuration
    InitConfig {
        /// Output path for configuration file
        #[arg(short, long, default_value = "config/benchmark.toml")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("flag_benchmark=debug,info")
    } else {
        EnvFilter::new("flag_benchmark=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .init();

    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::load_or_default(),
    };

    match cli.command {
        Commands::Run {
            corpus,
            models,
            max_attempts,
            unbounded,
            parallel_models,
            output,
            save_outcomes,
            progress,
        } => {
            let mut config = config;
            if let Some(models) = models {
                config.benchmark.models = models
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect();
            }
            if let Some(n) = max_attempts {
                config.benchmark.max_attempts = n;
            }
            if unbounded {
                config.benchmark.max_attempts = 0;
            }
            if parallel_models {
                config.benchmark.parallel_models = true;
            }
            if let Some(output) = output {
                config.output.output_dir = output.to_string_lossy().to_string();
            }
            if save_outcomes {
                config.output.save_outcomes = true;
            }
            run_benchmark(corpus, config, progress).await?;
        }

        Commands::List { corpus } => {
            list_corpus(corpus)?;
        }

        Commands::InitConfig { output } => {
            init_config(output)?;
        }
    }

    Ok(())
}

async fn run_benchmark(
    corpus: PathBuf,
    config: Config,
    progress: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let run_id = Utc::now().format("%Y%m%d-%H%M%S").to_string();

    println!("=== Flag Benchmark ===");
    println!("Run ID: {}", run_id);
    println!("Models: {}", config.benchmark.models.join(", "));
    match config.benchmark.max_attempts {
        0 => println!("Attempts: unbounded"),
        n => println!("Attempts: up to {} per pair", n),
    }
    println!();

    if config.benchmark.models.is_empty() {
        eprintln!("Error: No models configured");
        std::process::exit(1);
    }

    let provider = create_provider(&config.backend)?;

    let mut failures = FailureRecorder::new();
    let records = load_corpus(&corpus, &mut failures)?;
    println!("Challenges: {} ({} unreadable)", records.len(), failures.len());

    let mut executor = Executor::new(
        provider,
        config.benchmark.models.clone(),
        config.executor_config(),
    );
    if progress {
        executor = executor.with_progress(Arc::new(ConsoleProgress));
    }

    println!("Running benchmark...");
    let report = executor.run(&records, &mut failures).await;

    print_console_report(&report.stats);

    std::fs::create_dir_all(&config.output.output_dir)?;

    failures.write_to_file(config.failures_path())?;
    println!("Failures: {} written to {}", failures.len(), config.failures_path().display());

    RunSummary::from_report(&run_id, &report, &failures).write_to_file(config.summary_path())?;
    println!("Summary written to {}", config.summary_path().display());

    if config.output.save_outcomes {
        write_outcomes(&report.outcomes, config.outcomes_path())?;
        println!("Outcomes written to {}", config.outcomes_path().display());
    }

    Ok(())
}

fn list_corpus(corpus: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let mut failures = FailureRecorder::new();
    let records = load_corpus(&corpus, &mut failures)?;

    println!("Challenges in {}:", corpus.display());
    println!("{:-<60}", "");
    for record in &records {
        let preview: String = record.description.chars().take(50).collect();
        let flag = if record.correct_answer.is_empty() {
            "<no flag>"
        } else {
            record.correct_answer.as_str()
        };
        println!("  {} | {} | {}", record.source, flag, preview);
    }

    if !failures.is_empty() {
        println!("\nUnreadable:");
        for entry in failures.entries() {
            if let FailureEntry::LoadFailure { source, error } = entry {
                println!("  {}: {}", source, error);
            }
        }
    }

    println!("\nTotal: {} challenges, {} unreadable", records.len(), failures.len());
    Ok(())
}

fn init_config(output: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    Config::default().save_toml(&output)?;
    println!("Configuration written to {}", output.display());
    Ok(())
}
