//! Command-line interface.

mod cache;
mod generate;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use vidscribe::config::Config;
use vidscribe::stages::{Platform, DEFAULT_LANGUAGE};

#[derive(Parser, Debug)]
#[command(name = "vidscribe", version, about = "Summaries, translations and post kits from video transcripts")]
pub(crate) struct Cli {
    /// Config file (default: ~/.vidscribe/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Bypass the LLM response cache for this run
    #[arg(long, global = true)]
    no_cache: bool,

    /// Log output format on stderr
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Commands {
    /// Summarize a transcript
    Summarize {
        /// Transcript text file
        #[arg(long)]
        transcript: PathBuf,
        /// Video title
        #[arg(long)]
        title: String,
        #[arg(long, default_value = DEFAULT_LANGUAGE)]
        language: String,
        /// Model override (default: llm.summarizer_model)
        #[arg(long)]
        model: Option<String>,
    },
    /// Translate a text file
    Translate {
        #[arg(long)]
        input: PathBuf,
        /// Target language
        #[arg(long)]
        to: String,
        /// Model override (default: llm.translator_model)
        #[arg(long)]
        model: Option<String>,
    },
    /// Generate a LinkedIn post or Twitter/X thread from a summary
    PostKit {
        /// Summary text file
        #[arg(long)]
        summary: PathBuf,
        #[arg(long)]
        title: String,
        /// linkedin or twitter
        #[arg(long)]
        platform: Platform,
        #[arg(long, default_value = DEFAULT_LANGUAGE)]
        language: String,
        /// Model override (default: llm.post_kits_model)
        #[arg(long)]
        model: Option<String>,
        /// Also translate the post into this language (uses llm.translator_model)
        #[arg(long)]
        translate_to: Option<String>,
    },
    /// Inspect or clean the LLM response cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub(crate) enum CacheAction {
    /// Show cache location and size
    Stats,
    /// Delete expired and unreadable entries
    ClearExpired,
    /// Delete every entry
    Purge,
}

/// Parse arguments, set up logging and dispatch.
pub(crate) async fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let config = Config::load_with(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Commands::Summarize {
            transcript,
            title,
            language,
            model,
        } => {
            generate::cmd_summarize(&config, cli.no_cache, &transcript, &title, &language, model)
                .await
        }
        Commands::Translate { input, to, model } => {
            generate::cmd_translate(&config, cli.no_cache, &input, &to, model).await
        }
        Commands::PostKit {
            summary,
            title,
            platform,
            language,
            model,
            translate_to,
        } => {
            generate::cmd_post_kit(
                &config,
                cli.no_cache,
                &summary,
                &title,
                platform,
                &language,
                model,
                translate_to.as_deref(),
            )
            .await
        }
        Commands::Cache { action } => cache::cmd_cache(&config, action),
    }
}

/// Logs go to stderr so stdout carries only generated text.
fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}
