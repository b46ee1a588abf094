//! docgraph command line interface.

use std::{
    io::{self, BufRead, Write},
    path::{Path, PathBuf},
    process,
    time::Duration,
};

use anyhow::{Context, Result, anyhow, bail};
use bson::{Bson, Document, oid::ObjectId};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::Value;
use tracing::warn;
use tracing_subscriber::{EnvFilter, fmt};

use docgraph::{
    BackendKind, Connection, EdgeRepository, ImportOptions, ListOptions, NodeRepository, Note,
    NoteRepository, SnapshotOptions, SortDirection, StoreConfig,
    config::{
        DEFAULT_CONNECTION_STRING, DEFAULT_DATABASE, DEFAULT_SQLITE_PATH, DEFAULT_TIMEOUT_MS,
    },
    document_from_json,
    model::DEFAULT_NODE_TYPE,
    snapshot::{self, DEFAULT_SNAPSHOT_DIR, DEFAULT_SNAPSHOT_PREFIX},
    transfer,
};

#[derive(Parser)]
#[command(name = "docgraph", version)]
#[command(about = "Node, edge and snapshot tooling for a document database", long_about = None)]
struct Cli {
    /// Storage backend
    #[arg(long, env = "DOCGRAPH_BACKEND", default_value = "sqlite", global = true)]
    backend: BackendKind,
    /// Database name
    #[arg(long = "db", env = "DOCGRAPH_DB", default_value = DEFAULT_DATABASE, global = true)]
    database: String,
    /// MongoDB connection string
    #[arg(long, env = "DOCGRAPH_URI", default_value = DEFAULT_CONNECTION_STRING, global = true)]
    uri: String,
    /// SQLite database file
    #[arg(long, env = "DOCGRAPH_PATH", default_value = DEFAULT_SQLITE_PATH, global = true)]
    path: PathBuf,
    /// MongoDB server selection timeout in milliseconds
    #[arg(long, env = "DOCGRAPH_TIMEOUT_MS", default_value_t = DEFAULT_TIMEOUT_MS, global = true)]
    timeout_ms: u64,
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Node operations
    Node {
        #[command(subcommand)]
        op: NodeCommand,
    },
    /// Edge operations
    Edge {
        #[command(subcommand)]
        op: EdgeCommand,
    },
    /// Interaction note operations
    Note {
        #[command(subcommand)]
        op: NoteCommand,
    },
    /// Database snapshot operations
    Snapshot {
        #[command(subcommand)]
        op: SnapshotCommand,
    },
    /// Show database statistics
    Stats,
    /// Show backend, database and schema information
    Status,
    /// Clear a collection, or every collection with `--collection all`
    Clear {
        #[arg(short, long)]
        collection: String,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        force: bool,
    },
    /// Import nodes from a JSON or CSV file
    Import {
        #[arg(short, long)]
        file: PathBuf,
        /// Input format (inferred from the extension when omitted)
        #[arg(long, value_enum)]
        format: Option<Format>,
        /// Replace nodes that already exist instead of skipping them
        #[arg(short, long)]
        update: bool,
    },
    /// Export nodes to a JSON or CSV file
    Export {
        #[arg(short, long)]
        file: PathBuf,
        #[arg(long, value_enum)]
        format: Option<Format>,
        /// Keep identifiers (as hex strings) in JSON output
        #[arg(long)]
        include_ids: bool,
        /// CSV columns, dotted paths allowed
        #[arg(long, value_delimiter = ',')]
        fields: Vec<String>,
    },
    /// Drop the whole database
    Drop {
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(Subcommand)]
enum NodeCommand {
    /// Add a new node
    Add {
        /// JSON file containing node data
        #[arg(short, long, conflicts_with = "name")]
        file: Option<PathBuf>,
        #[arg(short, long)]
        name: Option<String>,
        #[arg(short = 't', long = "type")]
        kind: Option<String>,
    },
    /// Get a node
    Get {
        #[arg(short, long)]
        name: String,
    },
    /// Update a node
    Update {
        #[arg(short, long)]
        name: String,
        /// JSON file containing updates
        #[arg(short, long)]
        file: Option<PathBuf>,
        /// Update in key=value form; values are parsed as JSON when possible
        #[arg(short, long = "set")]
        set: Vec<String>,
    },
    /// Delete a node
    Delete {
        #[arg(short, long)]
        name: String,
    },
    /// List nodes
    List {
        #[arg(short, long)]
        limit: Option<i64>,
        /// Field to sort by
        #[arg(short, long)]
        sort: Option<String>,
        /// Sort descending
        #[arg(long)]
        desc: bool,
    },
}

#[derive(Subcommand)]
enum EdgeCommand {
    /// Add an edge between two nodes
    Add {
        #[arg(short, long = "from")]
        from: String,
        #[arg(short, long)]
        to: String,
        /// JSON object with edge properties
        #[arg(short, long, conflicts_with = "file")]
        data: Option<String>,
        /// JSON file with edge properties
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// List the connections of a node
    Get {
        #[arg(short, long)]
        name: String,
    },
    /// Remove every edge between two nodes
    Remove {
        #[arg(short, long = "from")]
        from: String,
        #[arg(short, long)]
        to: String,
    },
}

#[derive(Subcommand)]
enum NoteCommand {
    /// Queue a note on a node
    Add {
        #[arg(short, long)]
        name: String,
        #[arg(long)]
        trigger: Option<String>,
        #[arg(long)]
        effect: Option<String>,
        /// Drop the note once it has been processed
        #[arg(long)]
        clear_after_use: bool,
    },
    /// Trigger queued notes and clear the one-shot ones
    Process {
        #[arg(short, long)]
        name: String,
    },
}

#[derive(Subcommand)]
enum SnapshotCommand {
    /// Create a database snapshot
    Create {
        #[arg(short, long, default_value = DEFAULT_SNAPSHOT_DIR)]
        dir: PathBuf,
        #[arg(long, default_value = DEFAULT_SNAPSHOT_PREFIX)]
        prefix: String,
    },
    /// Restore a database from a snapshot
    Restore {
        #[arg(short, long)]
        file: PathBuf,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    Json,
    Csv,
}

impl Format {
    fn resolve(explicit: Option<Format>, path: &Path) -> Result<Format> {
        if let Some(format) = explicit {
            return Ok(format);
        }
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Ok(Format::Json),
            Some(ext) if ext.eq_ignore_ascii_case("csv") => Ok(Format::Csv),
            _ => bail!(
                "cannot infer format of {}; pass --format json|csv",
                path.display()
            ),
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    if let Err(err) = run(cli) {
        eprintln!("error: {err:#}");
        process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    fmt()
        .with_writer(io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn store_config(cli: &Cli) -> StoreConfig {
    StoreConfig::new(cli.backend)
        .with_database(cli.database.clone())
        .with_sqlite_path(cli.path.clone())
        .with_connection_string(cli.uri.clone())
        .with_timeout(Duration::from_millis(cli.timeout_ms))
}

fn run(cli: Cli) -> Result<()> {
    let config = store_config(&cli);
    let conn = Connection::open(&config)
        .with_context(|| format!("failed to open {} backend", config.backend))?;
    let result = match cli.command {
        Command::Node { op } => node_command(&conn, op),
        Command::Edge { op } => edge_command(&conn, op),
        Command::Note { op } => note_command(&conn, op),
        Command::Snapshot { op } => snapshot_command(&conn, op),
        Command::Stats => stats(&conn),
        Command::Status => status(&conn),
        Command::Clear { collection, force } => clear(&conn, &collection, force),
        Command::Import {
            file,
            format,
            update,
        } => import(&conn, &file, format, update),
        Command::Export {
            file,
            format,
            include_ids,
            fields,
        } => export(&conn, &file, format, include_ids, &fields),
        Command::Drop { force } => drop_database(&conn, force),
    };
    if let Err(err) = conn.close() {
        warn!(%err, "failed to close connection");
    }
    result
}

fn read_json(path: &Path) -> Result<Value> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid JSON in {}", path.display()))
}

fn print_document(document: Document) -> Result<()> {
    let value = Bson::Document(document).into_relaxed_extjson();
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

fn node_id(nodes: &NodeRepository<'_>, name: &str, role: &str) -> Result<ObjectId> {
    let node = nodes
        .get_by_name(name)?
        .ok_or_else(|| anyhow!("{role} node '{name}' not found"))?;
    node.get_object_id("_id")
        .with_context(|| format!("node '{name}' has no ObjectId identifier"))
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{prompt} (y/N): ");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(answer.trim().eq_ignore_ascii_case("y"))
}

fn node_command(conn: &Connection, op: NodeCommand) -> Result<()> {
    let nodes = NodeRepository::new(conn);
    match op {
        NodeCommand::Add { file, name, kind } => {
            let id = match (file, name) {
                (Some(file), _) => nodes.add_value(read_json(&file)?)?,
                (None, Some(name)) => {
                    let mut document = Document::new();
                    document.insert("name", name);
                    document.insert("type", kind.unwrap_or_else(|| DEFAULT_NODE_TYPE.into()));
                    nodes.add(document)?
                }
                (None, None) => bail!("node name is required (--name or --file)"),
            };
            println!("Node added successfully with ID: {}", display_id(&id));
        }
        NodeCommand::Get { name } => match nodes.get_by_name(&name)? {
            Some(node) => print_document(node)?,
            None => println!("Node '{name}' not found"),
        },
        NodeCommand::Update { name, file, set } => {
            let id = node_id(&nodes, &name, "Target")?;
            let updates = match file {
                Some(file) => document_from_json(read_json(&file)?)?,
                None => parse_assignments(&set)?,
            };
            if updates.is_empty() {
                bail!("no updates provided");
            }
            let modified = nodes.update(id, updates)?;
            println!("Updated {modified} node(s)");
        }
        NodeCommand::Delete { name } => {
            if nodes.delete_by_name(&name)? > 0 {
                println!("Node '{name}' deleted successfully");
            } else {
                println!("Node '{name}' not found");
            }
        }
        NodeCommand::List { limit, sort, desc } => {
            let direction = if desc {
                SortDirection::Descending
            } else {
                SortDirection::Ascending
            };
            let options = ListOptions {
                limit,
                sort_field: sort,
                sort_direction: direction,
            };
            let listed = nodes.list(&options)?;
            if listed.is_empty() {
                println!("No nodes found");
                return Ok(());
            }
            println!("Found {} nodes:", listed.len());
            for node in &listed {
                println!(
                    "- {} (Type: {})",
                    node.get_str("name").unwrap_or("<unnamed>"),
                    node.get_str("type").unwrap_or("unknown")
                );
            }
        }
    }
    Ok(())
}

fn display_id(id: &Bson) -> String {
    match id {
        Bson::ObjectId(oid) => oid.to_hex(),
        other => other.to_string(),
    }
}

/// Parses `key=value` pairs; values that are not valid JSON are kept as strings.
fn parse_assignments(assignments: &[String]) -> Result<Document> {
    let mut object = serde_json::Map::new();
    for assignment in assignments {
        let (key, raw) = assignment
            .split_once('=')
            .with_context(|| format!("expected key=value, got '{assignment}'"))?;
        let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        object.insert(key.to_string(), value);
    }
    Ok(document_from_json(Value::Object(object))?)
}

fn edge_command(conn: &Connection, op: EdgeCommand) -> Result<()> {
    let nodes = NodeRepository::new(conn);
    let edges = EdgeRepository::new(conn);
    match op {
        EdgeCommand::Add {
            from,
            to,
            data,
            file,
        } => {
            let source = node_id(&nodes, &from, "Source")?;
            let target = node_id(&nodes, &to, "Target")?;
            let properties = match (data, file) {
                (Some(data), _) => Some(document_from_json(
                    serde_json::from_str(&data).context("invalid JSON in edge data")?,
                )?),
                (None, Some(file)) => Some(document_from_json(read_json(&file)?)?),
                (None, None) => None,
            };
            if edges.add_edge(source, target, properties)? {
                println!("Edge added from '{from}' to '{to}'");
            } else {
                println!("Failed to add edge");
            }
        }
        EdgeCommand::Get { name } => {
            let source = node_id(&nodes, &name, "Source")?;
            let connections = edges.get_connections(source)?;
            if connections.is_empty() {
                println!("No connections found for node '{name}'");
                return Ok(());
            }
            println!("Connections from '{name}':");
            for (index, edge) in connections.iter().enumerate() {
                let target = match edge.get("to_node") {
                    Some(Bson::ObjectId(id)) => nodes
                        .get_by_id(*id)?
                        .and_then(|node| node.get_str("name").ok().map(String::from))
                        .unwrap_or_else(|| id.to_hex()),
                    _ => "Unknown".to_string(),
                };
                let kind = edge.get_str("type").unwrap_or("connection");
                println!("{}. To: {target} (Type: {kind})", index + 1);
                for (key, value) in edge {
                    if key != "to_node" && key != "type" {
                        println!("   - {key}: {value}");
                    }
                }
            }
        }
        EdgeCommand::Remove { from, to } => {
            let source = node_id(&nodes, &from, "Source")?;
            let target = node_id(&nodes, &to, "Target")?;
            if edges.remove_edge(source, target)? {
                println!("Edge removed from '{from}' to '{to}'");
            } else {
                println!("Edge not found or could not be removed");
            }
        }
    }
    Ok(())
}

fn note_command(conn: &Connection, op: NoteCommand) -> Result<()> {
    let nodes = NodeRepository::new(conn);
    let notes = NoteRepository::new(conn);
    match op {
        NoteCommand::Add {
            name,
            trigger,
            effect,
            clear_after_use,
        } => {
            let id = node_id(&nodes, &name, "Target")?;
            let note = Note::Structured {
                trigger,
                effect,
                clear_after_use,
            };
            if notes.add_note(id, &note)? {
                println!("Added interaction note to '{name}'");
            } else {
                println!("Failed to add interaction note");
            }
        }
        NoteCommand::Process { name } => {
            let id = node_id(&nodes, &name, "Target")?;
            match notes.process_notes(id)? {
                Some(effects) => {
                    for effect in effects {
                        println!("Triggered Note: {effect}");
                    }
                }
                None => println!("No interaction notes found for '{name}'"),
            }
        }
    }
    Ok(())
}

fn snapshot_command(conn: &Connection, op: SnapshotCommand) -> Result<()> {
    match op {
        SnapshotCommand::Create { dir, prefix } => {
            let options = SnapshotOptions::with_prefix(prefix);
            let path = snapshot::create_snapshot(conn, &dir, &options)?;
            println!("Database snapshot created: {}", path.display());
        }
        SnapshotCommand::Restore { file } => {
            let report = snapshot::restore_snapshot(conn, &file)?;
            println!(
                "Database restored from {}: {} documents in {} collections",
                file.display(),
                report.documents(),
                report.collections.len()
            );
        }
    }
    Ok(())
}

fn stats(conn: &Connection) -> Result<()> {
    let stats = snapshot::database_stats(conn)?;
    println!("Database: {}", conn.database_name());
    println!("Collections:");
    for (index, name) in stats.collections.iter().enumerate() {
        let count = stats.counts.get(name).copied().unwrap_or(0);
        println!("{}. {name}: {count} documents", index + 1);
    }
    println!("Total document count: {}", stats.total());
    Ok(())
}

fn status(conn: &Connection) -> Result<()> {
    let nodes = NodeRepository::new(conn).count()?;
    print!("backend={} database={} nodes={nodes}", conn.backend(), conn.database_name());
    if let Some(version) = conn.schema_version()? {
        print!(" schema_version={version}");
    }
    println!();
    Ok(())
}

fn clear(conn: &Connection, collection: &str, force: bool) -> Result<()> {
    if collection.eq_ignore_ascii_case("all") {
        if !force
            && !confirm("Are you sure you want to clear ALL collections? This cannot be undone!")?
        {
            println!("Operation cancelled");
            return Ok(());
        }
        let cleared = snapshot::clear_all_collections(conn)?;
        for (name, count) in &cleared {
            println!("Cleared {count} documents from '{name}'");
        }
        let total: u64 = cleared.values().sum();
        println!("Cleared {total} documents from {} collections", cleared.len());
        return Ok(());
    }
    if !force
        && !confirm(&format!(
            "Are you sure you want to clear collection '{collection}'? This cannot be undone!"
        ))?
    {
        println!("Operation cancelled");
        return Ok(());
    }
    let cleared = snapshot::clear_collection(conn, collection)?;
    println!("Cleared {cleared} documents from '{collection}'");
    Ok(())
}

fn import(conn: &Connection, file: &Path, format: Option<Format>, update: bool) -> Result<()> {
    let options = ImportOptions {
        update_existing: update,
    };
    let summary = match Format::resolve(format, file)? {
        Format::Json => transfer::import_nodes_from_json_path(conn, file, options)?,
        Format::Csv => transfer::import_nodes_from_csv_path(conn, file, options)?,
    };
    println!("{}", serde_json::to_string(&summary)?);
    Ok(())
}

fn export(
    conn: &Connection,
    file: &Path,
    format: Option<Format>,
    include_ids: bool,
    fields: &[String],
) -> Result<()> {
    let count = match Format::resolve(format, file)? {
        Format::Json => transfer::export_nodes_to_json_path(conn, file, include_ids)?,
        Format::Csv => {
            let fields = (!fields.is_empty()).then_some(fields);
            transfer::export_nodes_to_csv_path(conn, file, fields)?
        }
    };
    println!("Exported {count} node(s) to {}", file.display());
    Ok(())
}

fn drop_database(conn: &Connection, force: bool) -> Result<()> {
    let name = conn.database_name().to_string();
    if !force
        && !confirm(&format!(
            "Are you sure you want to drop database '{name}'? This cannot be undone!"
        ))?
    {
        println!("Operation cancelled");
        return Ok(());
    }
    snapshot::drop_database(conn, &name)?;
    println!("Database '{name}' dropped");
    Ok(())
}
