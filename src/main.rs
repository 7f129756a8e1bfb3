//! flatfs CLI - Command line interface for flatfs
//!
//! Manages a persisted file tree from the command line. Every mutating
//! command re-encodes the whole tree and rewrites the record store.

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use flatfs::model::ID_KEY;
use flatfs::{
    decode_untagged, Config, Container, FileStore, Layout, Leaf, RecordStore, Sealer, Vault,
};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "flatfs")]
#[command(about = "Persist a nested file tree as a flat, deduplicated record store")]
#[command(version)]
struct Cli {
    /// Path to the record store file (overrides the config file)
    #[arg(short, long)]
    store: Option<PathBuf>,

    /// Pointer layout used when writing (first-child or child-list)
    #[arg(short, long)]
    layout: Option<Layout>,

    /// Output format (json or text)
    #[arg(short, long, default_value = "json")]
    format: OutputFormat,

    /// Enable debug logging on stderr
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    Json,
    Text,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the store, seeding it with the default tree
    Init,

    /// Print the whole tree
    Show,

    // === File Commands ===
    /// List a directory
    Ls {
        /// Directory path
        #[arg(default_value = "/")]
        path: String,
    },

    /// Print a file or directory
    Cat {
        /// Path to read
        path: String,
    },

    /// Create or overwrite a file
    Write {
        /// File path
        path: String,
        /// Value; parsed as a JSON scalar when possible, otherwise a string
        value: String,
        /// Always store the value as a string
        #[arg(long)]
        raw: bool,
    },

    /// Create an empty directory
    Mkdir {
        /// Directory path
        path: String,
    },

    /// Remove a file or directory
    Rm {
        /// Path to remove
        path: String,
    },

    // === Record Commands ===
    /// Print the records the current tree encodes to
    Records {
        /// Untagged shape with positional ids
        #[arg(long)]
        legacy: bool,
    },

    /// Replace the tree with the contents of a JSON file
    Import {
        /// JSON object describing the tree
        file: PathBuf,
    },

    /// Replace the tree by decoding a JSON array of untagged records
    ImportLegacy {
        /// JSON array of records
        file: PathBuf,
    },

    // === Seal Commands ===
    /// Seal a value into an opaque token
    Seal {
        /// Value to seal
        value: String,
        /// Passphrase (defaults to seal_key from the config file)
        #[arg(short, long)]
        key: Option<String>,
    },

    /// Open a sealed token
    Unseal {
        /// Token produced by `seal`
        token: String,
        /// Passphrase (defaults to seal_key from the config file)
        #[arg(short, long)]
        key: Option<String>,
    },

    /// Delete the store file
    Destroy,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = Config::load()?;
    let store_path = cli.store.clone().unwrap_or_else(|| config.store_path());
    let layout = cli.layout.unwrap_or_else(|| config.layout());

    match cli.command {
        Commands::Init => {
            let vault = open_vault(&store_path, layout, &config)?;
            output(
                &cli.format,
                &serde_json::json!({
                    "status": "ok",
                    "store": store_path.display().to_string(),
                    "layout": layout.to_string(),
                    "records": vault.store().len()?
                }),
            )?;
        }

        Commands::Show => {
            let vault = open_vault(&store_path, layout, &config)?;
            output(&cli.format, &serde_json::to_value(vault.tree())?)?;
        }

        Commands::Ls { path } => {
            let vault = open_vault(&store_path, layout, &config)?;
            let items: Vec<_> = vault
                .list(&path)?
                .into_iter()
                .map(|(name, is_dir)| {
                    serde_json::json!({
                        "name": name,
                        "type": if is_dir { "dir" } else { "file" }
                    })
                })
                .collect();
            output(
                &cli.format,
                &serde_json::json!({
                    "path": path,
                    "count": items.len(),
                    "entries": items
                }),
            )?;
        }

        Commands::Cat { path } => {
            let vault = open_vault(&store_path, layout, &config)?;
            let node = vault.get(&path)?;
            output(&cli.format, &serde_json::to_value(node)?)?;
        }

        Commands::Write { path, value, raw } => {
            let vault = open_vault(&store_path, layout, &config)?;
            vault.write_file(&path, parse_leaf(value, raw))?;
            output(
                &cli.format,
                &serde_json::json!({
                    "status": "ok",
                    "path": path,
                    "version": vault.version()
                }),
            )?;
        }

        Commands::Mkdir { path } => {
            let vault = open_vault(&store_path, layout, &config)?;
            vault.mkdir(&path)?;
            output(
                &cli.format,
                &serde_json::json!({
                    "status": "ok",
                    "path": path
                }),
            )?;
        }

        Commands::Rm { path } => {
            let vault = open_vault(&store_path, layout, &config)?;
            vault.remove(&path)?;
            output(
                &cli.format,
                &serde_json::json!({
                    "status": "ok",
                    "path": path
                }),
            )?;
        }

        Commands::Records { legacy } => {
            let vault = open_vault(&store_path, layout, &config)?;
            let records = vault.records();
            let items = if legacy {
                legacy_records(&records)?
            } else {
                records
                    .iter()
                    .map(serde_json::to_value)
                    .collect::<Result<Vec<_>, _>>()?
            };
            output(
                &cli.format,
                &serde_json::json!({
                    "layout": layout.to_string(),
                    "count": items.len(),
                    "records": items
                }),
            )?;
        }

        Commands::Import { file } => {
            let content = read_file(&file)?;
            let tree: Container = serde_json::from_str(&content)
                .with_context(|| format!("{} is not a valid tree", file.display()))?;
            let vault = open_vault(&store_path, layout, &config)?;
            vault.replace_tree(tree)?;
            output(
                &cli.format,
                &serde_json::json!({
                    "status": "ok",
                    "records": vault.store().len()?
                }),
            )?;
        }

        Commands::ImportLegacy { file } => {
            let content = read_file(&file)?;
            let records: Vec<serde_json::Map<String, serde_json::Value>> =
                serde_json::from_str(&content)
                    .with_context(|| format!("{} is not a JSON array of records", file.display()))?;
            let tree = decode_untagged(records)?;
            let vault = open_vault(&store_path, layout, &config)?;
            vault.replace_tree(tree)?;
            output(
                &cli.format,
                &serde_json::json!({
                    "status": "ok",
                    "records": vault.store().len()?
                }),
            )?;
        }

        Commands::Seal { value, key } => {
            let sealer = sealer(key, &config)?;
            let token = sealer.seal(&parse_leaf(value, false))?;
            output(&cli.format, &serde_json::json!({ "token": token }))?;
        }

        Commands::Unseal { token, key } => {
            let sealer = sealer(key, &config)?;
            let value = sealer.open(&token)?;
            output(&cli.format, &serde_json::json!({ "value": value }))?;
        }

        Commands::Destroy => {
            if !store_path.exists() {
                bail!("No store at {}", store_path.display());
            }
            FileStore::open(&store_path)?.destroy()?;
            output(
                &cli.format,
                &serde_json::json!({
                    "status": "ok",
                    "message": format!("Destroyed store at {}", store_path.display())
                }),
            )?;
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "flatfs=debug" } else { "flatfs=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn open_vault(path: &Path, layout: Layout, config: &Config) -> anyhow::Result<Vault<FileStore>> {
    let store = FileStore::open(path)?;
    let vault = Vault::open(store, layout, config.default_tree())?;
    Ok(vault)
}

fn sealer(key: Option<String>, config: &Config) -> anyhow::Result<flatfs::AesGcmSealer> {
    match key {
        Some(key) => Ok(flatfs::AesGcmSealer::new(&key)),
        None => config
            .sealer()
            .ok_or_else(|| anyhow!("No passphrase: pass --key or set seal_key in the config file")),
    }
}

fn read_file(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

/// JSON scalar if `value` parses as one, otherwise the literal string
fn parse_leaf(value: String, raw: bool) -> Leaf {
    if raw {
        return Leaf::String(value);
    }
    serde_json::from_str(&value)
        .ok()
        .and_then(Leaf::from_json)
        .unwrap_or(Leaf::String(value))
}

fn legacy_records(records: &[flatfs::Record]) -> anyhow::Result<Vec<serde_json::Value>> {
    records
        .iter()
        .enumerate()
        .map(|(position, record)| {
            let mut map = record.to_untagged().ok_or_else(|| {
                anyhow!(
                    "record {} carries a child list; use --layout first-child for the legacy shape",
                    position
                )
            })?;
            if map.contains_key(ID_KEY) {
                bail!("record {} has an entry named '{}'", position, ID_KEY);
            }
            map.insert(ID_KEY.to_string(), position.into());
            Ok(serde_json::Value::Object(map))
        })
        .collect()
}

fn output(format: &OutputFormat, value: &serde_json::Value) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string(value)?),
        OutputFormat::Text => println!("{}", serde_json::to_string_pretty(value)?),
    }
    Ok(())
}
