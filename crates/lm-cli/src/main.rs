mod server;

use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use lm_core::{
    ContinuityStore, EvidenceEvent, IngestOutcome, Partition, QueryEngine,
    Transition, export_json, import_json,
};
use lm_store::Store;
use lm_store::config::{default_config_path, ensure_db_path};
use rmcp::{ServiceExt, transport::stdio};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "lm", about = "Liquidity memory CLI and MCP server")]
struct Cli {
    /// Data directory (defaults to $LM_DATA_DIR, then ~/.liquidity-memory)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// TOML config file (defaults to <data-dir>/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start MCP server on stdio transport
    Serve,

    /// Replay evidence events from JSON Lines files
    Ingest {
        /// File path(s), one event object per line
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Decay every node to a point in time
    Tick {
        /// Unix seconds (defaults to the current time)
        #[arg(long)]
        now: Option<f64>,

        /// Current market price, enables invalidation checks
        #[arg(long)]
        price: Option<f64>,
    },

    /// Show partition counts and storage statistics
    Stats,

    /// List nodes, optionally restricted to one partition
    Nodes {
        /// active, dormant or archived
        #[arg(long)]
        partition: Option<String>,
    },

    /// Show one node with its buffer and decay state
    Node {
        id: String,
    },

    /// List a node's motifs in lexicographic order
    Motifs {
        id: String,

        #[arg(long, default_value_t = 1)]
        min_count: u64,
    },

    /// Export state to a JSON file
    Export {
        /// Output file path
        path: PathBuf,
    },

    /// Import state from a JSON file, replacing the current state
    Import {
        /// Input file path
        path: PathBuf,
    },
}

struct Workspace {
    store: Store,
    memory: ContinuityStore,
}

fn open_workspace(cli: &Cli) -> Result<Workspace> {
    let data_dir = lm_store::resolve_data_dir(cli.data_dir.as_deref());
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| default_config_path(&data_dir));
    let config = lm_store::load_config(&config_path)
        .with_context(|| format!("failed to load config {}", config_path.display()))?;

    let db_path = ensure_db_path(&data_dir)
        .with_context(|| format!("failed to create data dir {}", data_dir.display()))?;
    let store = Store::open(&db_path)
        .with_context(|| format!("failed to open store {}", db_path.display()))?;
    let mut memory = store
        .load_memory(&config)
        .context("failed to load memory")?;

    // An explicit config file overrides whatever the database was saved with.
    if config_path.exists() && memory.config() != &config {
        tracing::debug!("applying config from {}", config_path.display());
        memory = ContinuityStore::from_entries(config, memory.into_entries())
            .context("stored nodes rejected under new config")?;
    }

    Ok(Workspace { store, memory })
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Commands::Serve => cmd_serve(&cli).await,
        Commands::Ingest { files } => cmd_ingest(&cli, files),
        Commands::Tick { now, price } => cmd_tick(&cli, *now, *price),
        Commands::Stats => cmd_stats(&cli),
        Commands::Nodes { partition } => cmd_nodes(&cli, partition.as_deref()),
        Commands::Node { id } => cmd_node(&cli, id),
        Commands::Motifs { id, min_count } => cmd_motifs(&cli, id, *min_count),
        Commands::Export { path } => cmd_export(&cli, path),
        Commands::Import { path } => cmd_import(&cli, path),
    }
}

async fn cmd_serve(cli: &Cli) -> Result<()> {
    let Workspace { store, memory } = open_workspace(cli)?;
    tracing::info!(nodes = memory.len(), "starting MCP server");

    let server = server::LmServer::new(store, memory);
    let service = server
        .serve(stdio())
        .await
        .context("failed to start MCP server")?;
    service.waiting().await?;
    Ok(())
}

#[derive(Default)]
struct IngestTally {
    created: usize,
    recorded: usize,
    revived: usize,
    ignored: usize,
    rejected: usize,
}

impl IngestTally {
    fn add(&mut self, outcome: &IngestOutcome) {
        match outcome {
            IngestOutcome::Created { .. } => self.created += 1,
            IngestOutcome::Recorded(rec) => {
                self.recorded += 1;
                if rec.revived {
                    self.revived += 1;
                }
            }
            IngestOutcome::Ignored => self.ignored += 1,
        }
    }
}

fn cmd_ingest(cli: &Cli, files: &[PathBuf]) -> Result<()> {
    let mut ws = open_workspace(cli)?;
    let mut tally = IngestTally::default();

    for path in files {
        let file = std::fs::File::open(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let mut events = 0usize;
        for (lineno, line) in BufReader::new(file).lines().enumerate() {
            let line = line.with_context(|| format!("failed to read {}", path.display()))?;
            if line.trim().is_empty() {
                continue;
            }
            let event: EvidenceEvent = serde_json::from_str(&line)
                .with_context(|| format!("{}:{}: malformed event", path.display(), lineno + 1))?;
            events += 1;
            match ws.memory.ingest(&event) {
                Ok(outcome) => tally.add(&outcome),
                Err(e) => {
                    tracing::warn!("{}:{}: rejected: {e}", path.display(), lineno + 1);
                    tally.rejected += 1;
                }
            }
        }
        println!("ingested {} ({events} events)", path.display());
    }

    ws.store
        .save_memory(&ws.memory)
        .context("failed to save memory")?;

    println!(
        "done. created={}, recorded={}, revived={}, ignored={}, rejected={}, nodes={}",
        tally.created,
        tally.recorded,
        tally.revived,
        tally.ignored,
        tally.rejected,
        ws.memory.len()
    );
    Ok(())
}

fn cmd_tick(cli: &Cli, now: Option<f64>, price: Option<f64>) -> Result<()> {
    let mut ws = open_workspace(cli)?;
    let now = now.unwrap_or_else(lm_core::time::now_unix_secs);
    if !now.is_finite() {
        bail!("--now must be a finite number of seconds");
    }

    let report = ws.memory.tick(now, price);
    for t in &report.transitions {
        match t {
            Transition::Dormant { id, strength } => {
                tracing::debug!(%id, strength, "node went dormant");
            }
            Transition::Archived { id, from } => {
                tracing::debug!(%id, from = from.as_str(), "node archived");
            }
        }
    }

    ws.store
        .save_memory(&ws.memory)
        .context("failed to save memory")?;

    let counts = ws.memory.counts();
    println!(
        "tick at {}: decayed={}, invalidated={}, transitions={}",
        lm_core::time::unix_to_iso8601(now),
        report.decayed,
        report.invalidated.len(),
        report.transitions.len()
    );
    println!(
        "active={}, dormant={}, archived={}",
        counts.active, counts.dormant, counts.archived
    );
    Ok(())
}

fn cmd_stats(cli: &Cli) -> Result<()> {
    let ws = open_workspace(cli)?;
    let counts = ws.memory.counts();
    let motifs = QueryEngine::global_motif_statistics(&ws.memory);
    let db_size = ws.store.db_size().context("failed to read db size")?;

    println!("nodes:      {}", counts.total());
    println!("active:     {}", counts.active);
    println!("dormant:    {}", counts.dormant);
    println!("archived:   {}", counts.archived);
    println!("bigrams:    {}", motifs.distinct_bigrams);
    println!("trigrams:   {}", motifs.distinct_trigrams);
    println!("db_size:    {:.1}KB", db_size as f64 / 1024.0);
    if let Some(saved) = ws.store.last_saved().context("failed to read metadata")? {
        println!("saved_at:   {saved}");
    }
    Ok(())
}

fn cmd_nodes(cli: &Cli, partition: Option<&str>) -> Result<()> {
    let ws = open_workspace(cli)?;
    let nodes = match partition {
        Some(name) => {
            let Some(p) = Partition::parse(name) else {
                bail!("unknown partition '{name}' (expected active, dormant or archived)");
            };
            QueryEngine::partition(&ws.memory, p)
        }
        None => {
            let mut all = QueryEngine::active_nodes(&ws.memory);
            all.extend(QueryEngine::dormant_nodes(&ws.memory));
            all.extend(QueryEngine::archived_nodes(&ws.memory));
            all
        }
    };
    println!("{}", serde_json::to_string_pretty(&nodes)?);
    Ok(())
}

fn parse_id(id: &str) -> Result<Uuid> {
    Uuid::parse_str(id.trim()).with_context(|| format!("invalid node id '{id}'"))
}

fn cmd_node(cli: &Cli, id: &str) -> Result<()> {
    let ws = open_workspace(cli)?;
    let id = parse_id(id)?;
    let Some(summary) = QueryEngine::summary(&ws.memory, id) else {
        println!("null");
        return Ok(());
    };
    let now = lm_core::time::now_unix_secs().max(summary.last_interaction_ts);

    let view = serde_json::json!({
        "node": summary,
        "buffer": QueryEngine::buffer(&ws.memory, id),
        "buffer_metadata": QueryEngine::buffer_metadata(&ws.memory, id),
        "token_histogram": QueryEngine::token_histogram(&ws.memory, id),
        "decay_state": QueryEngine::decay_state(&ws.memory, id, now),
        "motif_statistics": QueryEngine::motif_statistics(&ws.memory, id),
    });
    println!("{}", serde_json::to_string_pretty(&view)?);
    Ok(())
}

fn cmd_motifs(cli: &Cli, id: &str, min_count: u64) -> Result<()> {
    let ws = open_workspace(cli)?;
    let id = parse_id(id)?;
    for entry in QueryEngine::motifs_with_min_count(&ws.memory, id, min_count) {
        let pattern: Vec<&str> = entry.motif.tokens().iter().map(|t| t.as_str()).collect();
        println!(
            "{}  count={} strength={:.4}",
            pattern.join(" "),
            entry.stats.count,
            entry.stats.strength
        );
    }
    Ok(())
}

fn cmd_export(cli: &Cli, path: &Path) -> Result<()> {
    let ws = open_workspace(cli)?;
    let json = export_json(&ws.memory).context("failed to serialize state")?;
    std::fs::write(path, &json).with_context(|| format!("failed to write {}", path.display()))?;

    println!("exported {} nodes to {}", ws.memory.len(), path.display());
    Ok(())
}

fn cmd_import(cli: &Cli, path: &Path) -> Result<()> {
    let ws = open_workspace(cli)?;
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let memory = import_json(&json).context("failed to import JSON")?;

    ws.store
        .save_memory(&memory)
        .context("failed to save imported memory")?;

    let counts = memory.counts();
    println!(
        "imported from {}. nodes={}, active={}, dormant={}, archived={}",
        path.display(),
        counts.total(),
        counts.active,
        counts.dormant,
        counts.archived
    );
    Ok(())
}
