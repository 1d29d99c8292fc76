//! # Receipt Harness CLI (`rcpt`)
//!
//! The `rcpt` binary is the primary interface for Receipt Harness. It
//! provides commands for database initialization, receipt ingestion,
//! receipt retrieval, and starting the HTTP server.
//!
//! ## Usage
//!
//! ```bash
//! rcpt --config ./config/rcpt.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `rcpt init` | Create the SQLite database and run schema migrations |
//! | `rcpt ingest <file>` | Ingest receipt records from a JSON file |
//! | `rcpt get <receipt_id>` | Retrieve a persisted receipt by identifier |
//! | `rcpt serve` | Start the ingestion HTTP server |
//!
//! ## Examples
//!
//! ```bash
//! # Initialize the database
//! rcpt init --config ./config/rcpt.toml
//!
//! # Ingest a batch of receipts, forcing enrichment on every record
//! rcpt ingest receipts.json --force-enrichment
//!
//! # Fetch a persisted receipt
//! rcpt get R-2024-001
//!
//! # Start the HTTP server
//! rcpt serve --config ./config/rcpt.toml
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use receipt_harness::{config, get, ingest, migrate, server};

/// Receipt Harness CLI — a receipt line-item ingestion service with
/// LLM-backed product enrichment.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/rcpt.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "rcpt",
    about = "Receipt Harness — a receipt ingestion service with LLM-backed product enrichment",
    version,
    long_about = "Receipt Harness normalizes retail receipt line items, optionally enriches \
    missing product attributes (brand, category, UPC, size, color, material, model, weight) \
    via a text-generation call, reconciles enriched fields against caller-supplied data under \
    confidence tiers, and persists merged records to SQLite keyed by receipt identifier."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/rcpt.toml`. Database, enrichment, and server
    /// settings are read from this file.
    #[arg(long, global = true, default_value = "./config/rcpt.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the receipts table with its
    /// unique receipt-identifier index. This command is idempotent —
    /// running it multiple times is safe.
    Init,

    /// Ingest receipt records from a JSON file.
    ///
    /// The file may contain a single receipt object or an array of them.
    /// Each record is normalized, conditionally enriched, reconciled, and
    /// inserted. Invalid records and duplicate identifiers are reported
    /// and skipped; they do not abort the batch.
    Ingest {
        /// Path to a JSON file with one receipt object or an array.
        file: PathBuf,

        /// Invoke the enrichment provider even when brand and category are
        /// already present.
        #[arg(long)]
        force_enrichment: bool,
    },

    /// Retrieve a persisted receipt by its external identifier.
    ///
    /// Prints the receipt's fields and, when enrichment was attempted, the
    /// enriched attributes with their confidence tier.
    Get {
        /// External receipt identifier.
        receipt_id: String,
    },

    /// Start the ingestion HTTP server.
    ///
    /// Binds to the address configured in `[server].bind` and exposes
    /// `POST /receipts`, `GET /receipts/{receipt_id}`, and `GET /health`.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Ingest {
            file,
            force_enrichment,
        } => {
            ingest::run_ingest(&cfg, &file, force_enrichment).await?;
        }
        Commands::Get { receipt_id } => {
            get::run_get(&cfg, &receipt_id).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
