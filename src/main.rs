//! CLI entry point for the storyline recommendation engine.
//!
//! Provides commands for initializing a workspace, building the artifact
//! set from a catalog CSV, and ranking storylines against a query.

use clap::{
    Parser, Subcommand,
    builder::styling::{AnsiColor, Effects, Styles},
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use storymatch::artifact::ArtifactSet;
use storymatch::display::with_spinner;
use storymatch::embedding::FastEmbedEncoder;
use storymatch::error::{EngineError, EngineResult, ErrorContext};
use storymatch::io::format::format_utc_timestamp;
use storymatch::io::{ExitCode, OutputFormat, OutputManager, ResponseMeta};
use storymatch::normalize::Normalizer;
use storymatch::pipeline::{BuildOptions, BuildPipeline};
use storymatch::{Recommender, Settings};

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

/// Semantic movie recommendations
#[derive(Parser)]
#[command(
    name = "storymatch",
    version = env!("CARGO_PKG_VERSION"),
    about = "Semantic movie recommendations",
    long_about = "Embed movie storylines and rank them against free-text descriptions.",
    styles = clap_cargo_style()
)]
struct Cli {
    /// Path to custom settings.toml file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
enum Commands {
    /// Initialize project
    #[command(about = "Set up .storymatch directory with default configuration")]
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Build the artifact set from a catalog CSV
    #[command(
        about = "Embed storylines and publish a searchable artifact set",
        after_help = "Examples:\n  storymatch build movies.csv\n  storymatch build movies.csv --out data/artifacts --batch-size 128"
    )]
    Build {
        /// Path to the catalog CSV (title and storyline columns)
        input: PathBuf,

        /// Output directory (overrides config)
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Storylines per embedding call (overrides config)
        #[arg(long)]
        batch_size: Option<usize>,

        /// Show progress during embedding
        #[arg(short, long)]
        progress: bool,
    },

    /// Recommend movies for a storyline description
    #[command(
        about = "Rank catalog storylines against a free-text description",
        after_help = "Examples:\n  storymatch recommend \"a heist that goes wrong\"\n  storymatch recommend \"ghost ship in the arctic\" --top-n 10 --json"
    )]
    Recommend {
        /// Free-text description to match against storylines
        text: String,

        /// Number of results (defaults to search.default_top_n)
        #[arg(short = 'n', long)]
        top_n: Option<usize>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show current configuration settings
    #[command(about = "Display active settings from .storymatch/settings.toml")]
    Config,
}

/// Entry point.
///
/// Handles config initialization, command dispatch, and exit codes.
/// Auto-initializes config for the build command.
fn main() {
    let cli = Cli::parse();

    // For build command, auto-initialize if needed
    if matches!(cli.command, Commands::Build { .. }) {
        if Settings::check_init().is_err() {
            eprintln!("Initializing project configuration...");
            match Settings::init_config_file(false) {
                Ok(path) => {
                    eprintln!("Created configuration file at: {}", path.display());
                }
                Err(e) => {
                    eprintln!("Warning: Could not create config file: {e}");
                    eprintln!("Using default configuration.");
                }
            }
        }
    } else if !matches!(cli.command, Commands::Init { .. }) {
        // For other commands, just warn
        if let Err(warning) = Settings::check_init() {
            eprintln!("Warning: {warning}");
            eprintln!("Using default configuration for now.");
        }
    }

    // Load configuration
    let mut config = if let Some(config_path) = &cli.config {
        Settings::load_from(config_path).unwrap_or_else(|e| {
            eprintln!(
                "Configuration error loading from {}: {}",
                config_path.display(),
                e
            );
            std::process::exit(1);
        })
    } else {
        Settings::load().unwrap_or_else(|e| {
            eprintln!("Configuration error: {e}");
            Settings::default()
        })
    };

    init_tracing(config.debug);

    let exit_code = match cli.command {
        Commands::Init { force } => run_init(force),
        Commands::Config => run_config(&config),
        Commands::Build {
            input,
            out,
            batch_size,
            progress,
        } => {
            // Override config with CLI args
            if let Some(batch) = batch_size {
                config.embedding.batch_size = batch;
            }
            run_build(&config, &input, out, progress)
        }
        Commands::Recommend { text, top_n, json } => run_recommend(&config, &text, top_n, json),
    };

    std::process::exit(exit_code as i32);
}

/// Route log output to stderr so it never mixes with command output.
/// `STORYMATCH_LOG` overrides the level derived from the debug setting.
fn init_tracing(debug: bool) {
    let default_level = if debug { "debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_env("STORYMATCH_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run_init(force: bool) -> ExitCode {
    let config_path = PathBuf::from(".storymatch/settings.toml");

    if config_path.exists() && !force {
        eprintln!(
            "Configuration file already exists at: {}",
            config_path.display()
        );
        eprintln!("Use --force to overwrite");
        return ExitCode::GeneralError;
    }

    match Settings::init_config_file(force) {
        Ok(path) => {
            println!("Created configuration file at: {}", path.display());
            println!("Edit this file to customize your settings.");
            ExitCode::Success
        }
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::GeneralError
        }
    }
}

fn run_config(config: &Settings) -> ExitCode {
    let mut output = OutputManager::new(OutputFormat::Text);

    println!("Current Configuration:");
    println!("{}", "=".repeat(50));
    match toml::to_string_pretty(config).context("Failed to render configuration") {
        Ok(toml_str) => {
            println!("{toml_str}");
            ExitCode::Success
        }
        Err(e) => report_error(&mut output, &e),
    }
}

fn run_build(
    config: &Settings,
    input: &Path,
    out: Option<PathBuf>,
    progress: bool,
) -> ExitCode {
    let mut output = OutputManager::new(OutputFormat::Text);
    let out_dir = out.unwrap_or_else(|| config.resolved_artifacts_dir());

    let encoder = match load_encoder(config) {
        Ok(encoder) => encoder,
        Err(e) => return report_error(&mut output, &e),
    };

    let options = BuildOptions {
        batch_size: config.embedding.batch_size,
        show_progress: progress,
    };
    let pipeline = match BuildPipeline::new(encoder, Normalizer::new(config.normalizer.clone()), options)
    {
        Ok(pipeline) => pipeline,
        Err(e) => return report_error(&mut output, &e),
    };

    match pipeline.run(input, &out_dir) {
        Ok(outcome) => {
            println!(
                "Built {} records into {} ({} dims, model {}) in {:.2}s",
                outcome.record_count,
                outcome.output_dir.display(),
                outcome.dimension,
                outcome.model_name,
                outcome.elapsed.as_secs_f64()
            );
            ExitCode::Success
        }
        Err(e) => report_error(&mut output, &e),
    }
}

fn run_recommend(config: &Settings, text: &str, top_n: Option<usize>, json: bool) -> ExitCode {
    let started = Instant::now();
    let mut output = OutputManager::new(OutputFormat::from_json_flag(json));

    let requested = top_n.unwrap_or(config.search.default_top_n);
    if requested == 0 || requested > config.search.max_top_n {
        let error = EngineError::InvalidArgument {
            reason: format!(
                "top_n must be between 1 and {} (got {requested})",
                config.search.max_top_n
            ),
        };
        return report_error(&mut output, &error);
    }

    let engine = match load_engine(config) {
        Ok(engine) => engine,
        Err(e) => return report_error(&mut output, &e),
    };

    match engine.recommend(text, requested) {
        Ok(results) => {
            let meta = ResponseMeta {
                version: env!("CARGO_PKG_VERSION").to_string(),
                timestamp: Some(format_utc_timestamp()),
                execution_time_ms: Some(started.elapsed().as_millis() as u64),
            };
            output
                .recommendations(results, text, Some(meta))
                .unwrap_or(ExitCode::GeneralError)
        }
        Err(e) => report_error(&mut output, &e),
    }
}

/// Check the artifacts before paying for model load; a missing set
/// should fail fast with its own exit code.
fn load_engine(config: &Settings) -> EngineResult<Recommender> {
    let artifacts = ArtifactSet::load(&config.resolved_artifacts_dir())?;
    let encoder = load_encoder(config)?;
    Recommender::new(artifacts, encoder)
}

fn load_encoder(config: &Settings) -> EngineResult<Arc<FastEmbedEncoder>> {
    let cache_dir = config.resolved_model_cache_dir();
    let encoder = with_spinner("Loading embedding model...", || {
        FastEmbedEncoder::with_progress(
            &config.embedding.model,
            &cache_dir,
            config.embedding.show_download_progress,
        )
    })?;
    Ok(Arc::new(encoder))
}

fn report_error(output: &mut OutputManager, error: &EngineError) -> ExitCode {
    output.error(error).unwrap_or(ExitCode::GeneralError)
}
