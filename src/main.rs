//! # Split Catalog CLI (`catalog`)
//!
//! The `catalog` binary stores metacards in SQLite, one table per
//! collection, and answers queries across all of them through an alias
//! view.
//!
//! ## Usage
//!
//! ```bash
//! catalog --config ./config/catalog.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `catalog init` | Create the SQLite schema and the alias view |
//! | `catalog collections` | List collections with record counts |
//! | `catalog route <file>` | Show which collection each metacard goes to |
//! | `catalog ingest <dir>` | Ingest JSON metacard files |
//! | `catalog query [text]` | Query across every collection |
//! | `catalog get <id>` | Real-time get of one metacard |
//! | `catalog update <file>` | Replace metacards by id |
//! | `catalog delete <id>...` | Delete metacards from every collection |
//! | `catalog completions <shell>` | Print shell completions |

mod catalog;
mod collections;
mod config;
mod db;
mod ingest;
mod logging;
mod migrate;
mod modify;
mod query;
mod sqlite_store;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// Split Catalog: a metacard catalog partitioned into collections.
#[derive(Parser)]
#[command(name = "catalog", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/catalog.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// List provisioned collections.
    Collections,

    /// Print the collection each metacard in a JSON file resolves to.
    ///
    /// Evaluates the configured rules only; nothing is written.
    Route {
        /// JSON file holding one metacard or an array of them.
        file: PathBuf,
    },

    /// Ingest JSON metacard files from a directory.
    Ingest {
        /// Directory to scan.
        dir: PathBuf,

        /// Show per-collection counts without writing.
        #[arg(long)]
        dry_run: bool,
    },

    /// Query every collection.
    Query {
        /// Free-text terms matched against titles and string attributes.
        text: Option<String>,

        #[arg(long)]
        tag: Option<String>,

        /// Metacard type.
        #[arg(long = "type")]
        metacard_type: Option<String>,

        /// Restrict to these ids. Repeatable.
        #[arg(long = "id")]
        ids: Vec<String>,

        /// Attribute match as `name=value`. Repeatable.
        #[arg(long = "attr", value_parser = parse_key_val)]
        attributes: Vec<(String, String)>,

        /// Offset of the first result.
        #[arg(long, default_value_t = 0)]
        start: usize,

        /// Page size.
        #[arg(long, default_value_t = 10)]
        limit: usize,

        /// Run as a real-time get, seeing writes not yet committed.
        #[arg(long)]
        realtime: bool,
    },

    /// Fetch one metacard by id.
    Get { id: String },

    /// Replace stored metacards with the versions in a JSON file.
    Update { file: PathBuf },

    /// Delete metacards by id from every collection.
    Delete {
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Print a shell completion script.
    Completions { shell: Shell },
}

/// Parse a `key=value` pair for `--attr` arguments.
fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let pos = s
        .find('=')
        .ok_or_else(|| format!("invalid KEY=VALUE: no '=' found in '{}'", s))?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Commands that don't require config
    if let Commands::Completions { shell } = cli.command {
        clap_complete::generate(shell, &mut Cli::command(), "catalog", &mut std::io::stdout());
        return Ok(());
    }

    let cfg = config::load_config(&cli.config)?;
    logging::init(&cfg.logging.level);

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Collections => {
            collections::list_collections(&cfg).await?;
        }
        Commands::Route { file } => {
            collections::run_route(&cfg, &file)?;
        }
        Commands::Ingest { dir, dry_run } => {
            ingest::run_ingest(&cfg, &dir, dry_run).await?;
        }
        Commands::Query {
            text,
            tag,
            metacard_type,
            ids,
            attributes,
            start,
            limit,
            realtime,
        } => {
            let args = query::QueryArgs {
                text,
                tag,
                metacard_type,
                ids,
                attributes,
                start,
                limit,
                realtime,
            };
            query::run_query(&cfg, &args).await?;
        }
        Commands::Get { id } => {
            query::run_get(&cfg, &id).await?;
        }
        Commands::Update { file } => {
            modify::run_update(&cfg, &file).await?;
        }
        Commands::Delete { ids } => {
            modify::run_delete(&cfg, &ids).await?;
        }
        Commands::Completions { .. } => unreachable!("handled before config loading"),
    }

    Ok(())
}
