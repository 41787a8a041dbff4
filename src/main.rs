//! # Pocket Poem CLI (`poemdb`)
//!
//! Builds and inspects the Pocket Poem database artifact.
//!
//! ## Usage
//!
//! ```bash
//! poemdb --config ./config/poemdb.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `poemdb init` | Create the database file and schema |
//! | `poemdb sources` | Show which corpus files the catalog resolves |
//! | `poemdb convert` | Write simplified-script siblings of every corpus file |
//! | `poemdb build` | Recreate the database from the corpus |
//! | `poemdb rank` | Extract the popularity shortlist |
//! | `poemdb mark-hot` | Flag shortlisted poems as hot |
//! | `poemdb pipeline` | convert, build, rank, mark-hot |
//! | `poemdb stats` | Verification report |
//! | `poemdb collection <action>` | Inspect and edit collections |
//! | `poemdb ask "<prompt>"` | One request to the AI text service |

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use pocket_poem::progress::ProgressMode;
use pocket_poem::{
    chat, collections, config, convert, hot, ingest, migrate, pipeline, rank, sources, stats,
};

/// Pocket Poem database builder.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/poemdb.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "poemdb",
    about = "Pocket Poem — build the classical poetry database",
    version,
    long_about = "Pocket Poem discovers classical Chinese poetry corpora, normalizes every \
    record into one shape, loads them into a single SQLite file, and marks the most \
    searched-for poems as hot."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/poemdb.toml`.
    #[arg(long, global = true, default_value = "./config/poemdb.toml")]
    config: PathBuf,

    /// Progress output on stderr. Defaults to `human` on a terminal, `off` otherwise.
    #[arg(long, global = true, value_enum)]
    progress: Option<ProgressMode>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the tables, indexes, and the default collection. Safe to run
    /// any number of times.
    Init,

    /// List corpus families and the files each one resolves to.
    Sources,

    /// Convert every corpus file to simplified script.
    ///
    /// Writes `<name>.simplified.json` next to each source file and a JSON
    /// report to `[conversion].report`. Originals are never modified.
    Convert {
        /// Exit nonzero if any file failed to convert.
        #[arg(long)]
        strict: bool,
    },

    /// Recreate the database from the corpus.
    ///
    /// Removes the existing database file, initializes the schema, and
    /// loads every resolved corpus file.
    Build {
        /// Resolve and normalize everything, print counts, write nothing.
        #[arg(long)]
        dry_run: bool,
    },

    /// Extract the popularity shortlist from the ranking files.
    Rank,

    /// Flag the shortlisted poems as hot.
    MarkHot,

    /// Run convert, build, rank, and mark-hot in order.
    Pipeline {
        /// Skip the conversion stage.
        #[arg(long)]
        skip_convert: bool,
    },

    /// Print the verification report for the built database.
    Stats,

    /// Inspect and edit collections.
    Collection {
        #[command(subcommand)]
        action: CollectionAction,
    },

    /// Send one prompt to the configured AI text service.
    Ask {
        /// The user prompt.
        prompt: String,

        /// Optional system message sent before the prompt.
        #[arg(long)]
        system: Option<String>,
    },
}

#[derive(Subcommand)]
enum CollectionAction {
    /// List all collections.
    List,
    /// Create a collection.
    Create {
        name: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// Add a poem to a collection.
    Add { collection_id: i64, poem_id: i64 },
    /// Remove a poem from a collection.
    Remove { collection_id: i64, poem_id: i64 },
    /// Delete a collection and its items.
    Delete { collection_id: i64 },
    /// Show a page of a collection's poems.
    Show {
        collection_id: i64,
        #[arg(long, default_value_t = 20)]
        limit: i64,
        #[arg(long, default_value_t = 0)]
        offset: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;
    let reporter = cli
        .progress
        .unwrap_or_else(ProgressMode::default_for_tty)
        .reporter();

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Sources => {
            sources::list_sources(&cfg)?;
        }
        Commands::Convert { strict } => {
            convert::run_conversion(&cfg, strict, reporter.as_ref())?;
        }
        Commands::Build { dry_run } => {
            ingest::run_build(&cfg, dry_run, reporter.as_ref()).await?;
        }
        Commands::Rank => {
            rank::run_rank(&cfg)?;
        }
        Commands::MarkHot => {
            hot::run_mark_hot(&cfg, reporter.as_ref()).await?;
        }
        Commands::Pipeline { skip_convert } => {
            pipeline::run_pipeline(&cfg, skip_convert, reporter.as_ref()).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
        Commands::Collection { action } => match action {
            CollectionAction::List => collections::run_list(&cfg).await?,
            CollectionAction::Create { name, description } => {
                collections::run_create(&cfg, &name, description.as_deref()).await?
            }
            CollectionAction::Add {
                collection_id,
                poem_id,
            } => collections::run_add(&cfg, collection_id, poem_id).await?,
            CollectionAction::Remove {
                collection_id,
                poem_id,
            } => collections::run_remove(&cfg, collection_id, poem_id).await?,
            CollectionAction::Delete { collection_id } => {
                collections::run_delete(&cfg, collection_id).await?
            }
            CollectionAction::Show {
                collection_id,
                limit,
                offset,
            } => collections::run_show(&cfg, collection_id, limit, offset).await?,
        },
        Commands::Ask { prompt, system } => {
            chat::run_ask(&cfg, &prompt, system.as_deref()).await?;
        }
    }

    Ok(())
}
