//! Quill CLI: writing feedback from the Gemini API.
//!
//! Analyzes a submission, replays the recovery pipeline over a saved raw
//! response, and runs the local development proxy.

mod commands;
mod report;

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Quill: writing feedback for language learners
#[derive(Parser, Debug)]
#[command(name = "quill", version, about, long_about = None)]
struct Cli {
    /// Gemini model to use
    #[arg(short, long, global = true)]
    model: Option<String>,

    /// Workspace directory
    #[arg(short, long, default_value = ".", global = true)]
    workspace: PathBuf,

    /// Send requests through the development proxy instead of the API
    #[arg(long, global = true)]
    proxy: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Analyze a piece of writing
    Analyze {
        /// Topic the learner wrote about
        #[arg(short, long)]
        topic: String,

        /// Difficulty label shown to the model
        #[arg(short, long, default_value = "Intermediate")]
        difficulty: String,

        /// File containing the writing (reads stdin if omitted)
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Minutes spent writing
        #[arg(long, default_value = "0")]
        minutes: u64,

        /// Print the normalized analysis as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run the recovery pipeline over a saved raw model response
    Recover {
        /// File containing the raw response (reads stdin if omitted)
        file: Option<PathBuf>,

        /// File containing the original submission text
        #[arg(short, long)]
        submission: Option<PathBuf>,

        /// Topic recorded in the metadata
        #[arg(short, long, default_value = "Untitled")]
        topic: String,

        /// Print the normalized analysis as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run the local development proxy
    Serve {
        /// Address to bind
        #[arg(long)]
        host: Option<String>,

        /// Port to bind
        #[arg(short, long)]
        port: Option<u16>,

        /// Directory of static files served alongside the API
        #[arg(long)]
        static_dir: Option<PathBuf>,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Manage the stored Gemini API key
    Auth {
        #[command(subcommand)]
        action: AuthAction,
    },
    /// Show the most recent raw model response
    Last,
}

#[derive(clap::Subcommand, Debug)]
enum ConfigAction {
    /// Create default configuration file
    Init,
    /// Show current configuration
    Show,
    /// Show where configuration files are read from
    Path,
}

#[derive(clap::Subcommand, Debug)]
enum AuthAction {
    /// Store the Gemini API key (reads stdin if omitted)
    SetKey {
        /// API key
        key: Option<String>,
    },
    /// Show whether a key is configured and where it comes from
    Status,
    /// Remove the stored key
    Clear,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Set up tracing: human-readable stderr + JSON file logging
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(filter));

    let log_dir = quill_core::config::project_dirs()
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "quill.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    let mut config = quill_core::load_config(Some(&workspace), None)
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;

    // Apply CLI overrides
    if let Some(model) = &cli.model {
        config.gemini.model = model.clone();
    }
    if cli.proxy {
        config.gemini.use_proxy = true;
    }
    for warning in config.validate() {
        tracing::warn!("{}", warning);
    }

    commands::handle_command(cli.command, &workspace, config).await
}
