//! # Sales Insight CLI (`insight`)
//!
//! The `insight` binary is the operator interface for Sales Insight. It
//! provides commands for database initialization, raw-record ingestion,
//! batch processing, question answering, product listing, and starting the
//! HTTP server.
//!
//! ## Usage
//!
//! ```bash
//! insight --config ./config/insight.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `insight init` | Create the SQLite database and run schema migrations |
//! | `insight ingest <source> <payload>` | Store a raw JSON payload for later processing |
//! | `insight process` | Classify pending raw records into documents and sales |
//! | `insight ask "<question>"` | Ask a question against the ingested knowledge |
//! | `insight products` | List all documents (inventory view) |
//! | `insight stats` | Show inventory counters |
//! | `insight serve` | Start the HTTP API server |
//!
//! ## Examples
//!
//! ```bash
//! # Initialize the database
//! insight init --config ./config/insight.toml
//!
//! # Ingest a sale payload
//! insight ingest n8n '{"sale_date": "2024-01-01 10:00:00", "product_name": "Widget", "price_total": 100}'
//!
//! # Turn pending raw records into entities
//! insight process --limit 50
//!
//! # Ask as an admin (unfiltered retrieval)
//! insight ask "qué compró Alpha Systems?" --role admin
//!
//! # Start the HTTP server
//! insight serve
//! ```

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use sales_insight::completion;
use sales_insight::config::load_config;
use sales_insight::embedding;
use sales_insight::matching::SubstringMatcher;
use sales_insight::models::{RawRecord, Role};
use sales_insight::sqlite_store::SqliteStore;
use sales_insight::store::EntityStore;
use sales_insight::{answer, db, migrate, processor, server};

/// Sales Insight CLI — a retrieval-augmented business knowledge backend.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/insight.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "insight",
    about = "Sales Insight — record ingestion, classification, and grounded question answering",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/insight.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables
    /// (documents, sales, raw_records). Idempotent — running it multiple
    /// times is safe.
    Init,

    /// Store a raw JSON payload for later processing.
    ///
    /// The payload must be a JSON object or a list of objects; it is kept
    /// untouched until `insight process` classifies it.
    Ingest {
        /// Origin tag recorded with the payload (e.g. `n8n`, `manual`).
        source: String,

        /// The JSON payload, inline.
        payload: String,
    },

    /// Classify pending raw records into documents and sales.
    ///
    /// Fetches up to `--limit` raw records, classifies every payload
    /// element, embeds document text, and commits the whole batch in one
    /// transaction. Requires an embedding provider in the config.
    Process {
        /// Maximum number of raw records to process.
        #[arg(long, default_value_t = 10)]
        limit: i64,
    },

    /// Ask a question against the ingested knowledge.
    ///
    /// Retrieves the nearest documents under the given role's access
    /// filter plus recent sales for any mentioned customer, and forwards
    /// everything to the completion provider.
    Ask {
        /// The question text.
        question: String,

        /// Caller role: `customer` (public documents only) or `admin`.
        #[arg(long, default_value = "admin")]
        role: String,
    },

    /// List all documents (inventory view).
    Products,

    /// Show inventory counters.
    Stats,

    /// Start the HTTP API server.
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&config).await?;
            println!("initialized: {}", config.db.path.display());
        }

        Commands::Ingest { source, payload } => {
            let payload: serde_json::Value =
                serde_json::from_str(&payload).context("payload is not valid JSON")?;
            if !payload.is_object() && !payload.is_array() {
                anyhow::bail!("payload must be a JSON object or a list of objects");
            }

            let pool = db::connect(&config).await?;
            let store = SqliteStore::new(pool);
            let record = RawRecord::new(source, payload);
            store.insert_raw_record(&record).await?;
            println!("ingested: {}", record.id);
        }

        Commands::Process { limit } => {
            let pool = db::connect(&config).await?;
            let store = SqliteStore::new(pool);
            let embedder = embedding::create_provider(&config.embedding)?;

            let count = processor::process_batch(&store, embedder.as_ref(), limit).await?;
            println!("processed: {} elements", count);
        }

        Commands::Ask { question, role } => {
            let role = Role::from_str(&role)?;
            let pool = db::connect(&config).await?;
            let store = SqliteStore::new(pool);
            let embedder = embedding::create_provider(&config.embedding)?;
            let completer = completion::create_provider(&config.completion)?;
            let matcher = SubstringMatcher::new(config.retrieval.min_match_word_len);

            let text = answer::ask(
                &store,
                embedder.as_ref(),
                completer.as_ref(),
                &matcher,
                &config.retrieval,
                &question,
                role,
            )
            .await?;
            println!("{}", text);
        }

        Commands::Products => {
            let pool = db::connect(&config).await?;
            let store = SqliteStore::new(pool);
            let products = store.list_documents().await?;

            if products.is_empty() {
                println!("No products.");
            } else {
                println!("{:<38} {:<10} NAME", "ID", "ACCESS");
                println!("{}", "-".repeat(72));
                for p in &products {
                    println!("{:<38} {:<10} {}", p.id, p.access_level.as_str(), p.name);
                }
            }
        }

        Commands::Stats => {
            let pool = db::connect(&config).await?;
            let store = SqliteStore::new(pool);
            let stats = store.stats().await?;

            println!("Sales Insight — Database Stats");
            println!("==============================");
            println!();
            println!("  Database:     {}", config.db.path.display());
            println!();
            println!("  Documents:    {}", stats.total_documents);
            println!("    public:     {}", stats.public_documents);
            println!("    private:    {}", stats.private_documents);
            println!("  Sales:        {}", stats.total_sales);
            println!("  Pending raw:  {}", stats.pending_raw_records);
        }

        Commands::Serve => {
            server::run_server(&config).await?;
        }
    }

    Ok(())
}
