//! Lectern CLI — offline operator tooling.
//!
//! Commands:
//! - `ingest`   — Normalize a lecture and print its shape
//! - `search`   — Rank segments against a query
//! - `context`  — Show the context bundle a query would receive
//! - `verify`   — Check the citations in a generated response
//! - `config`   — Show or initialize configuration

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

use commands::lecture::LectureArgs;

#[derive(Parser)]
#[command(
    name = "lectern",
    about = "Lectern — lecture grounding and retrieval tooling",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file to use instead of ~/.lectern/config.toml
    #[arg(long, global = true, env = "LECTERN_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Normalize and index a lecture, then print a summary
    Ingest {
        #[command(flatten)]
        lecture: LectureArgs,

        /// Also print every segment
        #[arg(long)]
        segments: bool,
    },

    /// Rank lecture segments by similarity to a query
    Search {
        #[command(flatten)]
        lecture: LectureArgs,

        /// Query text
        query: String,

        /// Number of results
        #[arg(short = 'k', long, default_value_t = 5)]
        top: usize,
    },

    /// Print the context bundle selected for a query
    Context {
        #[command(flatten)]
        lecture: LectureArgs,

        /// Query text
        query: String,

        /// Pin the query to a playback position (MM:SS or seconds)
        #[arg(long, conflicts_with = "slide")]
        at: Option<String>,

        /// Pin the query to a slide number
        #[arg(long)]
        slide: Option<usize>,

        /// Token budget (defaults to context.token_budget)
        #[arg(long)]
        budget: Option<usize>,
    },

    /// Verify the citations in a generated JSON response
    Verify {
        #[command(flatten)]
        lecture: LectureArgs,

        /// File holding the generated JSON response
        response: PathBuf,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the config file path
    Path,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config;
    match cli.command {
        Commands::Ingest { lecture, segments } => {
            commands::ingest::run(config_path, lecture, segments).await?
        }
        Commands::Search { lecture, query, top } => {
            commands::search::run(config_path, lecture, &query, top).await?
        }
        Commands::Context {
            lecture,
            query,
            at,
            slide,
            budget,
        } => commands::context::run(config_path, lecture, &query, at, slide, budget).await?,
        Commands::Verify { lecture, response } => {
            commands::verify::run(config_path, lecture, &response).await?
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show(config_path).await?,
            ConfigAction::Init { force } => commands::config_cmd::init(config_path, force).await?,
            ConfigAction::Path => commands::config_cmd::path(config_path).await?,
        },
    }

    Ok(())
}
