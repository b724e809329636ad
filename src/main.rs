//! # Entity Query CLI (`eqe`)
//!
//! The `eqe` binary initializes the graph database, loads snapshots into it,
//! runs read-only queries, and starts the HTTP server.
//!
//! ## Usage
//!
//! ```bash
//! eqe --config ./config/eqe.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `eqe init` | Create the SQLite database and schema |
//! | `eqe import <file>` | Load a JSON graph snapshot |
//! | `eqe list` | Paginated entity listing |
//! | `eqe search "<query>"` | Ranked search over entity ids |
//! | `eqe types` | Entity count per type |
//! | `eqe get <id>` | One entity record |
//! | `eqe relationships <id>` | Filtered relationships of an entity |
//! | `eqe documents <id>` | Filtered source chunks of an entity |
//! | `eqe full <id>` | Composite view with statistics |
//! | `eqe serve` | Start the HTTP server |
//!
//! ## Examples
//!
//! ```bash
//! eqe init
//! eqe import ./graph.json
//! eqe list --types person --sort-by created_at
//! eqe search "alice" --limit 5
//! eqe relationships Alice --direction outgoing --min-weight 0.5
//! eqe documents Alice --since 2024-01-01 --max-chunks 20
//! eqe full Alice --related
//! ```

use clap::{Parser, Subcommand};
use entity_query::commands::{self, DocumentArgs, FullArgs, ListArgs, RelationshipArgs};
use entity_query::{config, import, logging, migrate, server};
use std::path::PathBuf;

/// Entity Query: read-only queries over a knowledge graph of entities,
/// relationships, and source chunks.
#[derive(Parser)]
#[command(name = "eqe", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/eqe.toml`. See `config/eqe.example.toml`.
    #[arg(long, global = true, default_value = "./config/eqe.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Idempotent; running it against an existing database is safe.
    Init,

    /// Load a JSON snapshot (`entities`, `relationships`, `chunks`).
    ///
    /// Existing rows with the same key are replaced.
    Import {
        /// Path to the snapshot file.
        path: PathBuf,
    },

    /// List entities with filtering, sorting, and pagination.
    List {
        /// Comma-separated entity types (case-insensitive).
        #[arg(long)]
        types: Option<String>,

        /// Case-insensitive substring of the entity id.
        #[arg(long)]
        name: Option<String>,

        /// `id`, `type`, or `created_at`.
        #[arg(long)]
        sort_by: Option<String>,

        /// `asc` or `desc`.
        #[arg(long)]
        sort_order: Option<String>,

        #[arg(long)]
        limit: Option<i64>,

        #[arg(long, default_value_t = 0)]
        offset: i64,
    },

    /// Search entity ids by exact, prefix, substring, and fuzzy match.
    Search {
        /// The search query string.
        query: String,

        /// Comma-separated entity types (case-insensitive).
        #[arg(long)]
        types: Option<String>,

        #[arg(long)]
        limit: Option<i64>,
    },

    /// Show the number of entities per type.
    Types,

    /// Print one entity as JSON.
    Get {
        /// Entity id.
        id: String,
    },

    /// Print the relationships of an entity as JSON.
    Relationships {
        /// Entity id.
        id: String,

        /// `incoming`, `outgoing`, or `both`.
        #[arg(long)]
        direction: Option<String>,

        /// Comma-separated relation types or keywords.
        #[arg(long)]
        relation_types: Option<String>,

        /// Comma-separated types the related entity must have.
        #[arg(long)]
        related_types: Option<String>,

        #[arg(long)]
        min_weight: Option<f64>,

        #[arg(long)]
        max_weight: Option<f64>,

        /// Comma-separated substrings of description or keywords.
        #[arg(long)]
        keywords: Option<String>,

        /// Comma-separated source file paths.
        #[arg(long)]
        files: Option<String>,

        /// Only relationships created on or after this date (YYYY-MM-DD).
        #[arg(long)]
        since: Option<String>,

        /// Only relationships created on or before this date (YYYY-MM-DD).
        #[arg(long)]
        until: Option<String>,

        /// Page size applied to each side.
        #[arg(long)]
        limit: Option<i64>,

        #[arg(long, default_value_t = 0)]
        offset: i64,
    },

    /// Print the source chunks of an entity as JSON.
    Documents {
        /// Entity id.
        id: String,

        /// Comma-separated file paths.
        #[arg(long)]
        files: Option<String>,

        /// Comma-separated document ids.
        #[arg(long)]
        doc_ids: Option<String>,

        /// Comma-separated chunk ids.
        #[arg(long)]
        chunk_ids: Option<String>,

        #[arg(long)]
        since: Option<String>,

        #[arg(long)]
        until: Option<String>,

        #[arg(long)]
        max_chunks: Option<i64>,

        #[arg(long, default_value_t = 0)]
        offset: i64,

        /// Omit chunk content.
        #[arg(long)]
        no_text: bool,

        /// Omit file path, order index, token count, and timestamp.
        #[arg(long)]
        no_metadata: bool,
    },

    /// Print the composite view of an entity as JSON.
    Full {
        /// Entity id.
        id: String,

        #[arg(long)]
        no_entity: bool,

        #[arg(long)]
        no_relationships: bool,

        #[arg(long)]
        no_documents: bool,

        #[arg(long)]
        no_statistics: bool,

        /// Include the strongest related entities.
        #[arg(long)]
        related: bool,

        /// `incoming`, `outgoing`, or `both`.
        #[arg(long)]
        direction: Option<String>,

        #[arg(long)]
        max_relationships: Option<i64>,

        #[arg(long)]
        min_weight: Option<f64>,

        #[arg(long)]
        max_chunks: Option<i64>,

        #[arg(long)]
        max_related: Option<i64>,
    },

    /// Start the HTTP server.
    ///
    /// Binds to the address configured in `[server].bind`.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;
    logging::init(&cfg.logging.level)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Import { path } => {
            import::run_import(&cfg, &path).await?;
        }
        Commands::List {
            types,
            name,
            sort_by,
            sort_order,
            limit,
            offset,
        } => {
            let args = ListArgs {
                types,
                name,
                sort_by,
                sort_order,
                limit,
                offset,
            };
            commands::run_list(&cfg, args).await?;
        }
        Commands::Search {
            query,
            types,
            limit,
        } => {
            commands::run_search(&cfg, &query, types, limit).await?;
        }
        Commands::Types => {
            commands::run_types(&cfg).await?;
        }
        Commands::Get { id } => {
            commands::run_get(&cfg, &id).await?;
        }
        Commands::Relationships {
            id,
            direction,
            relation_types,
            related_types,
            min_weight,
            max_weight,
            keywords,
            files,
            since,
            until,
            limit,
            offset,
        } => {
            let args = RelationshipArgs {
                direction,
                relation_types,
                related_types,
                min_weight,
                max_weight,
                keywords,
                files,
                since,
                until,
                limit,
                offset,
            };
            commands::run_relationships(&cfg, &id, args).await?;
        }
        Commands::Documents {
            id,
            files,
            doc_ids,
            chunk_ids,
            since,
            until,
            max_chunks,
            offset,
            no_text,
            no_metadata,
        } => {
            let args = DocumentArgs {
                files,
                doc_ids,
                chunk_ids,
                since,
                until,
                max_chunks,
                offset,
                no_text,
                no_metadata,
            };
            commands::run_documents(&cfg, &id, args).await?;
        }
        Commands::Full {
            id,
            no_entity,
            no_relationships,
            no_documents,
            no_statistics,
            related,
            direction,
            max_relationships,
            min_weight,
            max_chunks,
            max_related,
        } => {
            let args = FullArgs {
                no_entity,
                no_relationships,
                no_documents,
                no_statistics,
                related,
                direction,
                max_relationships,
                min_weight,
                max_chunks,
                max_related,
            };
            commands::run_full(&cfg, &id, args).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
