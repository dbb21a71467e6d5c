use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod assistant;
mod commands;
mod config;
mod embeddings;
mod news;
mod retry;
mod sandbox;
mod templates;
mod tools;

#[derive(Parser)]
#[command(name = "proofrun")]
#[command(
    author,
    version,
    about = "Verify assistant-written code in disposable Docker sandboxes"
)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write proofrun.toml and .env.example in the current project
    Init {
        /// Force overwrite existing files
        #[arg(short, long)]
        force: bool,
    },

    /// Run a program in the sandbox, retrying until it succeeds
    Run {
        /// Program to execute
        file: PathBuf,

        /// Maximum number of attempts (defaults to [retry].max_attempts)
        #[arg(short, long)]
        max_attempts: Option<u32>,

        /// Per-run timeout in seconds (defaults to [sandbox].timeout_secs)
        #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
        timeout: Option<u64>,

        /// Print the tool result JSON instead of a report
        #[arg(long)]
        json: bool,
    },

    /// Manage the hosted assistant
    Assistant {
        #[command(subcommand)]
        action: commands::assistant::AssistantAction,
    },

    /// Chat with the assistant, running its tool calls locally
    Chat {
        /// Assistant id (defaults to [assistant].id)
        #[arg(short, long, env = "PROOFRUN_ASSISTANT_ID")]
        assistant_id: Option<String>,

        /// Poll the run instead of streaming events
        #[arg(long)]
        poll: bool,

        /// Message to send (repeatable)
        #[arg(short, long = "message", required = true)]
        message: Vec<String>,

        /// Extra instructions for this run only
        #[arg(long)]
        instructions: Option<String>,
    },

    /// Fetch, embed and search news articles
    News {
        #[command(subcommand)]
        action: commands::news::NewsAction,
    },

    /// Remove orphaned sandbox containers
    Clean {
        /// Also remove cached news responses
        #[arg(long)]
        cache: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine; real environment variables still apply.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("proofrun=debug")
    } else {
        EnvFilter::new("proofrun=info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    match cli.command {
        Commands::Init { force } => {
            commands::init::run(force)?;
        }
        Commands::Run {
            file,
            max_attempts,
            timeout,
            json,
        } => {
            commands::run::run(&file, max_attempts, timeout, json).await?;
        }
        Commands::Assistant { action } => {
            commands::assistant::run(action).await?;
        }
        Commands::Chat {
            assistant_id,
            poll,
            message,
            instructions,
        } => {
            commands::chat::run(assistant_id, poll, message, instructions).await?;
        }
        Commands::News { action } => {
            commands::news::run(action).await?;
        }
        Commands::Clean { cache } => {
            commands::clean::run(cache).await?;
        }
    }

    Ok(())
}
