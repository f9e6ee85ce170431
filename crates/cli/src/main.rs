//! recollect CLI: the main entry point.
//!
//! Commands:
//! - `estimate` : Token estimate and threshold status for a session
//! - `compact`  : Compact a session transcript into a new session
//! - `context`  : Assemble per-turn retrieval context for a chat
//! - `config`   : Show the effective configuration

use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use recollect_config::AppConfig;

mod commands;
mod runtime;

#[derive(Parser)]
#[command(
    name = "recollect",
    about = "recollect: conversation context budgeting, retrieval and compaction",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Override the data directory (transcripts, chats, memory)
    #[arg(long, global = true, env = "RECOLLECT_DATA_DIR")]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Estimate tokens for a session and report compaction thresholds
    Estimate {
        /// Session id
        #[arg(short, long)]
        session: String,
    },

    /// Compact a session into a new one
    Compact {
        /// Session id
        #[arg(short, long)]
        session: String,

        /// Chat the session belongs to (enables session memory extraction)
        #[arg(short, long)]
        chat: Option<String>,

        /// Compact even if no threshold is reached
        #[arg(long)]
        force: bool,
    },

    /// Build the retrieval context for a query
    Context {
        /// Chat id
        #[arg(short, long)]
        chat: String,

        /// The user's query
        query: String,

        /// Also search messages from other chats
        #[arg(long)]
        all_chats: bool,

        /// Skip long-term knowledge search
        #[arg(long)]
        no_knowledge: bool,

        /// Skip chat history search
        #[arg(long)]
        no_feed: bool,
    },

    /// Show the effective configuration
    Config {
        /// Print the config file path only
        #[arg(long)]
        path: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let mut config = AppConfig::load().context("Failed to load config")?;
    if let Some(dir) = cli.data_dir {
        config.storage.data_dir = Some(dir);
    }

    match cli.command {
        Commands::Estimate { session } => {
            let rt = runtime::Runtime::new(config)?;
            commands::estimate::run(&rt, &session).await?
        }
        Commands::Compact {
            session,
            chat,
            force,
        } => {
            let rt = runtime::Runtime::new(config)?;
            commands::compact::run(&rt, &session, chat.as_deref(), force).await?
        }
        Commands::Context {
            chat,
            query,
            all_chats,
            no_knowledge,
            no_feed,
        } => {
            let rt = runtime::Runtime::new(config)?;
            let args = commands::context::ContextArgs {
                chat,
                query,
                all_chats,
                include_knowledge: !no_knowledge,
                include_feed: !no_feed,
            };
            commands::context::run(&rt, args).await?
        }
        Commands::Config { path } => commands::config_cmd::run(&config, path)?,
    }

    Ok(())
}
