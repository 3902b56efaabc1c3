mod cli;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use recollect::config::RecollectConfig;

#[derive(Parser)]
#[command(name = "recollect", version, about = "Document retrieval and agent memory backed by SQLite")]
struct Cli {
    /// Config file (defaults to ~/.recollect/config.toml)
    #[arg(long, global = true)]
    config: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Manage knowledge collections
    Collection {
        #[command(subcommand)]
        action: cli::knowledge::CollectionAction,
    },
    /// Ingest a text file into a collection
    Ingest(cli::knowledge::IngestArgs),
    /// Inspect or delete ingested documents
    Document {
        #[command(subcommand)]
        action: cli::knowledge::DocumentAction,
    },
    /// Similarity search over ingested chunks
    Search(cli::knowledge::SearchArgs),
    /// Build a prompt-ready context block from the best-matching chunks
    Rag(cli::knowledge::RagArgs),
    /// Embed one or more texts and print the vectors
    Embed(cli::knowledge::EmbedArgs),
    /// Store, recall, and manage memories
    Memory {
        #[command(subcommand)]
        action: cli::memory::MemoryAction,
    },
    /// Manage conversation sessions
    Session {
        #[command(subcommand)]
        action: cli::memory::SessionAction,
    },
    /// Promote or discard aged session memories
    Consolidate(cli::memory::ConsolidateArgs),
    /// Show knowledge and memory statistics
    Stats,
    /// Run database diagnostics
    Doctor,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => RecollectConfig::load_from(path)?,
        None => RecollectConfig::load()?,
    };

    // Logs go to stderr so stdout carries only command output.
    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let command = match cli.command {
        Command::Doctor => return cli::doctor::doctor(&config),
        other => other,
    };

    let app = cli::App::from_config(&config)?;
    match command {
        Command::Collection { action } => cli::knowledge::collection(&app, action).await?,
        Command::Ingest(args) => cli::knowledge::ingest(&app, args).await?,
        Command::Document { action } => cli::knowledge::document(&app, action).await?,
        Command::Search(args) => cli::knowledge::search(&app, args).await?,
        Command::Rag(args) => cli::knowledge::rag(&app, args).await?,
        Command::Embed(args) => cli::knowledge::embed(&app, args).await?,
        Command::Memory { action } => cli::memory::memory(&app, action).await?,
        Command::Session { action } => cli::memory::session(&app, action).await?,
        Command::Consolidate(args) => cli::memory::consolidate(&app, args).await?,
        Command::Stats => cli::stats::stats(&app)?,
        Command::Doctor => {}
    }

    Ok(())
}
