//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr};
use tracing::{info, warn};

use docgraph_core::{load_bundle, preview, select_and_sync};
use docgraph_shared::{AppConfig, init_config, load_config, load_config_from};
use docgraph_storage::GraphStore;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// docgraph: select salient document sections and keep a graph store in sync.
#[derive(Parser)]
#[command(
    name = "docgraph",
    version,
    about = "Select salient sections from a document bundle and reconcile them into a graph store.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file (defaults to ~/.docgraph/docgraph.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Dry run: print the selection payload without touching the store.
    Select {
        /// Bundle directory (`<KIND>.<slug>.md` files) or `.json` bundle.
        bundle: PathBuf,
    },

    /// Select and reconcile the result into the graph store.
    Sync {
        /// Bundle directory (`<KIND>.<slug>.md` files) or `.json` bundle.
        bundle: PathBuf,

        /// Graph store path (overrides `store.path`).
        #[arg(long)]
        db: Option<PathBuf>,

        /// Feature gate override (overrides `sync.enabled`).
        #[arg(long, env = "DOCGRAPH_SYNC_ENABLED")]
        sync_enabled: Option<bool>,
    },

    /// Show node and edge counts of the graph store.
    Stats {
        /// Graph store path (overrides `store.path`).
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "docgraph=info",
        1 => "docgraph=debug",
        _ => "docgraph=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Select { bundle } => cmd_select(config_path, &bundle),
        Command::Sync {
            bundle,
            db,
            sync_enabled,
        } => cmd_sync(config_path, &bundle, db, sync_enabled).await,
        Command::Stats { db } => cmd_stats(config_path, db).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(config_path),
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    Ok(config)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

fn cmd_select(config_path: Option<&Path>, bundle_path: &Path) -> Result<()> {
    let config = resolve_config(config_path)?;
    let bundle = load_bundle(bundle_path)
        .wrap_err_with(|| format!("failed to load bundle {}", bundle_path.display()))?;

    let payload = preview(&bundle, &config)?;
    info!(
        documents = payload.documents.len(),
        components = payload.components.len(),
        "selection preview"
    );
    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}

async fn cmd_sync(
    config_path: Option<&Path>,
    bundle_path: &Path,
    db: Option<PathBuf>,
    sync_enabled: Option<bool>,
) -> Result<()> {
    let mut config = resolve_config(config_path)?;
    if let Some(db) = db {
        config.store.path = db.display().to_string();
    }
    if let Some(enabled) = sync_enabled {
        config.sync.enabled = enabled;
    }

    let bundle = load_bundle(bundle_path)
        .wrap_err_with(|| format!("failed to load bundle {}", bundle_path.display()))?;

    let report = select_and_sync(&bundle, &config).await?;
    if !report.outcome.is_success() {
        warn!(outcome = %report.outcome, "graph not updated; rerun to retry");
    }
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn cmd_stats(config_path: Option<&Path>, db: Option<PathBuf>) -> Result<()> {
    let path = match db {
        Some(db) => db,
        None => resolve_config(config_path)?.store.resolved_path()?,
    };

    let store = GraphStore::open_readonly(&path).await?;
    let stats = store.session().await?.stats().await?;

    println!("Graph store: {}", path.display());
    println!("  documents:          {}", stats.documents);
    println!("  stub documents:     {}", stats.stub_documents);
    println!("  components:         {}", stats.components);
    println!("  containment edges:  {}", stats.containment_edges);
    println!("  reference edges:    {}", stats.reference_edges);
    println!("  derivation edges:   {}", stats.derivation_edges);
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_sync_overrides() {
        let cli = Cli::try_parse_from([
            "docgraph",
            "-vv",
            "sync",
            "bundle/",
            "--db",
            "/tmp/g.db",
            "--sync-enabled",
            "false",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Sync {
                bundle,
                db,
                sync_enabled,
            } => {
                assert_eq!(bundle, PathBuf::from("bundle/"));
                assert_eq!(db, Some(PathBuf::from("/tmp/g.db")));
                assert_eq!(sync_enabled, Some(false));
            }
            _ => panic!("expected sync command"),
        }
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "docgraph",
            "select",
            "b.json",
            "--config",
            "dg.toml",
            "--log-format",
            "json",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("dg.toml")));
        assert!(matches!(cli.log_format, LogFormat::Json));
    }
}
