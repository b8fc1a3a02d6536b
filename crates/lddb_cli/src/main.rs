//! Command-line access to a versioned document store.
//!
//! # Responsibility
//! - Map subcommands onto `RecordRepository` operations.
//! - Read JSON input from a file or stdin and print JSON results to stdout.
//!
//! Logs go to stderr (or `--log-dir`), so stdout stays machine-readable.

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use lddb_core::{
    default_log_level, init_logging, LoggingConfig, Manifest, RecordRepository, Storage,
    StorageConfig, StoreRequest,
};
use log::info;
use serde_json::{json, Value};
use std::io::Read;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "lddb", version, about = "Versioned linked-data document store")]
struct Cli {
    /// SQLite database file, created when missing
    #[arg(long, default_value = "lddb.db")]
    db: PathBuf,

    /// JSON storage config; missing keys take defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Base table name, overriding the config
    #[arg(long)]
    table: Option<String>,

    /// Bypass the version ledger
    #[arg(long)]
    no_versioning: bool,

    /// trace|debug|info|warn|error; defaults by build mode
    #[arg(long)]
    log_level: Option<String>,

    /// Write rotating log files here instead of stderr
    #[arg(long)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store one document
    Store {
        /// Record identifier
        id: String,
        /// Document JSON file; stdin when omitted
        #[arg(long)]
        file: Option<PathBuf>,
        /// Manifest JSON file
        #[arg(long)]
        manifest: Option<PathBuf>,
        /// Store as a tombstone
        #[arg(long)]
        deleted: bool,
    },
    /// Store a JSON array of `{"identifier", "data", "manifest"?}` atomically
    BulkStore {
        /// Items JSON file; stdin when omitted
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Print the current record
    Get { id: String },
    /// Print existence and timestamps
    Status { id: String },
    /// Print the full history, oldest first
    Versions { id: String },
    /// Print identifiers of records describing a node
    FindIds { id: String },
    /// Print records referencing a target through a relation
    FindRelation {
        relation: String,
        target: String,
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long)]
        offset: Option<u32>,
    },
    /// Print records quoting a graph
    FindQuotation {
        id: String,
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long)]
        offset: Option<u32>,
    },
    /// Print live record counts per entry type
    TypeCount,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(&logging_config(&cli)?).map_err(|err| anyhow!(err))?;

    let config = storage_config(&cli)?;
    let mut store = Storage::open(&cli.db, config)
        .with_context(|| format!("failed to open store at `{}`", cli.db.display()))?;

    let output = run(&mut store, cli.command)?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn run(store: &mut Storage, command: Commands) -> anyhow::Result<Value> {
    let output = match command {
        Commands::Store {
            id,
            file,
            manifest,
            deleted,
        } => {
            let data = read_json(file.as_deref())?;
            let mut manifest = match manifest {
                Some(path) => {
                    let value = read_json(Some(path.as_path()))?;
                    Some(serde_json::from_value::<Manifest>(value)?)
                }
                None => None,
            };
            if deleted {
                manifest.get_or_insert_with(Manifest::default).deleted = true;
            }
            serde_json::to_value(store.store(&id, data, manifest)?)?
        }
        Commands::BulkStore { file } => {
            let items = bulk_items(read_json(file.as_deref())?)?;
            let total = items.len();
            let new_items = store.bulk_store(items)?;
            json!({ "items": total, "new": new_items })
        }
        Commands::Get { id } => serde_json::to_value(store.get_record(&id)?)?,
        Commands::Status { id } => serde_json::to_value(store.get_record_status(&id)?)?,
        Commands::Versions { id } => serde_json::to_value(store.get_all_versions(&id)?)?,
        Commands::FindIds { id } => {
            let ids = store.find_record_ids(&id).collect::<Result<Vec<_>, _>>()?;
            json!(ids)
        }
        Commands::FindRelation {
            relation,
            target,
            limit,
            offset,
        } => serde_json::to_value(store.find_by_relation(&relation, &target, limit, offset)?)?,
        Commands::FindQuotation { id, limit, offset } => {
            serde_json::to_value(store.find_by_quotation(&id, limit, offset)?)?
        }
        Commands::TypeCount => Value::Array(
            store
                .count_by_type()?
                .into_iter()
                .map(|(rtype, count)| json!({ "type": rtype, "count": count }))
                .collect(),
        ),
    };
    info!("event=cli_command module=cli status=ok");
    Ok(output)
}

fn logging_config(cli: &Cli) -> anyhow::Result<LoggingConfig> {
    let log_dir = match &cli.log_dir {
        Some(dir) if dir.is_relative() => Some(std::env::current_dir()?.join(dir)),
        other => other.clone(),
    };
    Ok(LoggingConfig {
        level: cli
            .log_level
            .clone()
            .unwrap_or_else(|| default_log_level().to_string()),
        log_dir,
    })
}

fn storage_config(cli: &Cli) -> anyhow::Result<StorageConfig> {
    let mut config = match &cli.config {
        Some(path) => StorageConfig::load(path)
            .with_context(|| format!("failed to load config `{}`", path.display()))?,
        None => StorageConfig::default(),
    };
    if let Some(table) = &cli.table {
        config.base_table = table.clone();
    }
    if cli.no_versioning {
        config.versioning = false;
    }
    config.validate()?;
    Ok(config)
}

fn read_json(path: Option<&Path>) -> anyhow::Result<Value> {
    let text = match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read `{}`", path.display()))?,
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("failed to read stdin")?;
            text
        }
    };
    serde_json::from_str(&text).context("input is not valid JSON")
}

fn bulk_items(input: Value) -> anyhow::Result<Vec<StoreRequest>> {
    let Value::Array(entries) = input else {
        bail!("bulk input must be a JSON array");
    };
    entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| bulk_item(index, entry))
        .collect()
}

fn bulk_item(index: usize, entry: Value) -> anyhow::Result<StoreRequest> {
    let Value::Object(mut fields) = entry else {
        bail!("bulk item {index} must be an object");
    };
    let identifier = match fields.remove("identifier") {
        Some(Value::String(identifier)) => identifier,
        _ => bail!("bulk item {index} needs a string `identifier`"),
    };
    let data = fields
        .remove("data")
        .ok_or_else(|| anyhow!("bulk item {index} needs `data`"))?;
    let mut request = StoreRequest::new(identifier, data);
    if let Some(manifest) = fields.remove("manifest") {
        let manifest = serde_json::from_value::<Manifest>(manifest)
            .with_context(|| format!("bulk item {index} has an invalid manifest"))?;
        request = request.with_manifest(manifest);
    }
    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::{bulk_items, Cli};
    use clap::Parser;
    use serde_json::json;

    #[test]
    fn bulk_items_accept_optional_manifest() {
        let items = bulk_items(json!([
            {"identifier": "/work/1", "data": {"title": "A"}},
            {"identifier": "/work/2", "data": {"title": "B"}, "manifest": {"deleted": true}}
        ]))
        .unwrap();
        assert_eq!(items.len(), 2);
        assert!(items[0].manifest.is_none());
        assert!(items[1].manifest.as_ref().unwrap().deleted);
    }

    #[test]
    fn bulk_items_reject_malformed_entries() {
        assert!(bulk_items(json!({"identifier": "/work/1"})).is_err());
        assert!(bulk_items(json!([{"data": {}}])).is_err());
        assert!(bulk_items(json!([{"identifier": "/work/1"}])).is_err());
    }

    #[test]
    fn global_flags_parse_before_subcommand() {
        let cli = Cli::try_parse_from([
            "lddb",
            "--db",
            "/tmp/x.db",
            "--no-versioning",
            "find-relation",
            "instanceOf",
            "/work/1",
            "--limit",
            "5",
        ])
        .unwrap();
        assert!(cli.no_versioning);
        assert!(cli.log_level.is_none());
    }
}
