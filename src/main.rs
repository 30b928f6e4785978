//! # docqa CLI
//!
//! The `docqa` binary ingests documents into a local vector store and
//! answers questions about them, from the terminal or over HTTP.
//!
//! ## Usage
//!
//! ```bash
//! docqa --config ./config/docqa.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docqa init` | Create the SQLite database and the collection |
//! | `docqa ingest <paths>...` | Load, chunk, embed, and store PDF/TXT/Word files |
//! | `docqa ask "<question>"` | Answer one question from the documents |
//! | `docqa chat` | Interactive multi-turn conversation |
//! | `docqa run "<input>"` | Route input through a search tool and summarize |
//! | `docqa info` | Show collection name, record count, and metadata |
//! | `docqa reset` | Delete every stored chunk |
//! | `docqa serve` | Start the HTTP API |
//!
//! Logging goes to stderr and is controlled with `RUST_LOG`
//! (default `info`). Variables in `.env` are loaded before the config.

use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use docqa::app::AppContext;
use docqa::config::{self, Config};
use docqa::discover::discover_files;
use docqa::server;
use docqa::sqlite_store::SqliteStore;
use docqa::{db, migrate};
use docqa_core::models::Answer;
use docqa_core::workflow::WorkflowRequest;

/// docqa: ask questions about your PDF, text, and Word documents.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/docqa.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "docqa",
    about = "Ask questions about your documents with retrieval-augmented generation",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/docqa.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema and collection.
    ///
    /// Idempotent; running it on an existing database is safe.
    Init,

    /// Ingest files or directories.
    ///
    /// Directories are walked using the `[ingest]` globs. A file that cannot
    /// be loaded is reported and skipped; the rest of the batch continues.
    /// Re-ingesting a file replaces its previous chunks.
    Ingest {
        /// Files or directories to ingest.
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Answer a single question from the indexed documents.
    Ask {
        question: String,
    },

    /// Interactive conversation. `/clear` resets history, `/exit` quits.
    Chat,

    /// Summarize input, optionally routed through a search tool first.
    Run {
        /// Text to summarize or query to search for.
        input: String,

        /// Search with a tool before summarizing.
        #[arg(long)]
        connected: bool,

        /// Tool to use: `rag`, `duckduckgo`, or `wikipedia`. Implies `--connected`.
        #[arg(long)]
        tool: Option<String>,

        /// Override the summarization system prompt.
        #[arg(long)]
        system_prompt: Option<String>,

        /// Override the LLM model for this request.
        #[arg(long)]
        model: Option<String>,

        /// Register no web tools; connected requests search local documents.
        #[arg(long)]
        offline: bool,
    },

    /// Show collection name, record count, and metadata.
    Info,

    /// Delete every chunk in the collection.
    Reset,

    /// Start the HTTP API on `[server].bind`.
    Serve {
        /// Register no web tools.
        #[arg(long)]
        offline: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&cfg.db.path).await?;
            migrate::run_migrations(&pool).await?;
            SqliteStore::open(pool, &cfg.collection.name).await?;
            println!("Database initialized successfully.");
        }
        Commands::Ingest { paths } => {
            run_ingest(cfg, &paths).await?;
        }
        Commands::Ask { question } => {
            let ctx = AppContext::from_config(cfg, true).await?;
            let answer = ctx.conversation().ask(&question).await?;
            print_answer(&answer);
        }
        Commands::Chat => {
            let ctx = AppContext::from_config(cfg, true).await?;
            run_chat(&ctx).await?;
        }
        Commands::Run {
            input,
            connected,
            tool,
            system_prompt,
            model,
            offline,
        } => {
            let ctx = AppContext::from_config(cfg, offline).await?;
            let request = WorkflowRequest {
                user_input: input,
                connected: connected || tool.is_some(),
                tool,
                system_prompt,
                model,
            };
            let response = ctx.workflow.run(&request).await?;
            println!("{}", response.output);
        }
        Commands::Info => {
            let ctx = AppContext::from_config(cfg, true).await?;
            let info = ctx.store.info().await?;
            println!("Collection: {}", info.name);
            println!("Records:    {}", info.count);
            println!("Metadata:   {}", info.metadata);
        }
        Commands::Reset => {
            let ctx = AppContext::from_config(cfg, true).await?;
            ctx.store.delete_collection().await?;
            println!("Collection '{}' deleted.", ctx.store.name());
        }
        Commands::Serve { offline } => {
            let ctx = AppContext::from_config(cfg, offline).await?;
            server::run_server(Arc::new(ctx)).await?;
        }
    }

    Ok(())
}

async fn run_ingest(cfg: Config, paths: &[PathBuf]) -> anyhow::Result<()> {
    let files = discover_files(paths, &cfg.ingest)?;
    if files.is_empty() {
        println!("No matching files found.");
        return Ok(());
    }

    let ctx = AppContext::from_config(cfg, true).await?;
    let report = ctx.ingestor.ingest_files(&files).await;

    println!("Ingestion complete:");
    println!("  files:       {}", report.files.len());
    println!("  succeeded:   {}", report.succeeded());
    println!("  chunks:      {}", report.total_chunks());

    let failures: Vec<_> = report.failures().collect();
    if !failures.is_empty() {
        println!("  failed:");
        for (path, err) in failures {
            println!("    {} ({}): {}", path.display(), err.code(), err);
        }
    }
    Ok(())
}

async fn run_chat(ctx: &AppContext) -> anyhow::Result<()> {
    let mut conv = ctx.conversation();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("Ask a question about your documents. /clear resets, /exit quits.");
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        match line {
            "" => continue,
            "/exit" | "/quit" => break,
            "/clear" => {
                conv.clear();
                println!("History cleared.");
            }
            question => match conv.ask(question).await {
                Ok(answer) => print_answer(&answer),
                Err(e) => eprintln!("Error ({}): {}", e.code(), e),
            },
        }
    }
    Ok(())
}

fn print_answer(answer: &Answer) {
    println!("{}", answer.answer);
    if !answer.sources.is_empty() {
        println!();
        println!("Sources:");
        for (i, source) in answer.sources.iter().enumerate() {
            println!("  {}. {}", i + 1, source.file);
            println!("     {}", source.content.replace('\n', " "));
        }
    }
}
