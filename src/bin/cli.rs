//! gol CLI
//!
//! Command-line interface for GOL containers:
//! - Look up features
//! - Verify lookups and time them
//! - Build ID indexes
//! - Pack containers from JSON lines
//! - Inspect containers

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use gol_lookup::config::{generate_default_config, Config};
use gol_lookup::index::build_index;
use gol_lookup::report::{self, CheckTargets};
use gol_lookup::storage::{Container, FeatureId, FeatureKey, FeatureType, IndexMode, StoreError};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "gol")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Feature lookup over GOL containers")]
#[command(long_about = "Look up nodes, ways and relations by ID in a GOL container.\nUses the ID index next to the container when present and scans otherwise.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: search standard locations)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Ignore any ID index and scan
    #[arg(long, global = true)]
    pub no_index: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Look up one feature and print its tags
    Lookup {
        /// Path to the GOL file
        gol: PathBuf,
        /// Feature type: node, way, or relation
        #[arg(value_parser = parse_feature_type)]
        feature_type: FeatureType,
        /// Feature ID
        id: FeatureId,
    },

    /// Verify ID lookup on found and not-found paths
    Check {
        /// Path to the GOL file
        gol: PathBuf,
        /// Node ID (default: Monaco IDs for all three types)
        node_id: Option<FeatureId>,
        /// Way ID
        way_id: Option<FeatureId>,
        /// Relation ID
        relation_id: Option<FeatureId>,
    },

    /// Build or rebuild the ID index of a container
    Index {
        /// Path to the GOL file
        gol: PathBuf,
    },

    /// Build a container from a JSON-lines feature dump
    Pack {
        /// JSON-lines source, one feature per line
        source: PathBuf,
        /// Output GOL file
        out: PathBuf,
        /// Also build the ID index
        #[arg(short, long)]
        index: bool,
    },

    /// Show container header, counts and index status
    Info {
        /// Path to the GOL file
        gol: PathBuf,
    },

    /// Print or write the default configuration
    Config {
        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn parse_feature_type(s: &str) -> Result<FeatureType, String> {
    s.parse::<FeatureType>().map_err(|e| e.to_string())
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let config = Config::resolve(cli.config.as_deref()).context("Failed to load config")?;
    gol_lookup::logging::init(&config.logging);

    run(cli, &config).map_err(|err| {
        let hint = err
            .chain()
            .find_map(|e| e.downcast_ref::<StoreError>())
            .and_then(StoreError::recovery_hint);
        if let Some(hint) = hint {
            eprintln!("hint: {}", hint);
        }
        err
    })
}

fn run(cli: Cli, config: &Config) -> anyhow::Result<ExitCode> {
    let mut options = config.options();
    if cli.no_index {
        options = options.index_mode(IndexMode::Disabled);
    }

    let mut stdout = std::io::stdout().lock();

    match cli.command {
        Commands::Lookup {
            gol,
            feature_type,
            id,
        } => {
            let key = FeatureKey::new(feature_type, id);
            let found = report::lookup(&gol, key, &options, &mut stdout)
                .with_context(|| format!("Lookup of {} in {} failed", key, gol.display()))?;
            if !found {
                return Ok(ExitCode::FAILURE);
            }
        }

        Commands::Check {
            gol,
            node_id,
            way_id,
            relation_id,
        } => {
            if !gol.exists() {
                writeln!(stdout, "Error: GOL file not found: {}", gol.display())?;
                return Ok(ExitCode::FAILURE);
            }

            let explicit = node_id.is_some();
            let targets = if explicit {
                CheckTargets {
                    node: node_id,
                    way: way_id,
                    relation: relation_id,
                }
            } else {
                CheckTargets::default()
            };

            report::check(&gol, targets, explicit, &options, &config.check, &mut stdout)
                .with_context(|| format!("Check of {} failed", gol.display()))?;
        }

        Commands::Index { gol } => {
            let container = Container::open(&gol)
                .with_context(|| format!("Cannot open container {}", gol.display()))?;
            let path = build_index(&container, &options.layout)
                .with_context(|| format!("Cannot build index for {}", gol.display()))?;

            report::index_summary(&container, &path, &mut stdout)?;
        }

        Commands::Pack { source, out, index } => {
            if !source.exists() {
                bail!("Source file not found: {}", source.display());
            }

            let packed = gol_lookup::import::pack(&source, &out, index, &options.layout)
                .with_context(|| format!("Cannot pack {}", source.display()))?;

            report::pack_summary(&packed, &mut stdout)?;
        }

        Commands::Info { gol } => {
            report::info(&gol, &options, &mut stdout)
                .with_context(|| format!("Cannot inspect {}", gol.display()))?;
        }

        Commands::Config { output } => {
            let content = generate_default_config();
            match output {
                Some(path) => {
                    std::fs::write(&path, content)
                        .with_context(|| format!("Cannot write {}", path.display()))?;
                    writeln!(stdout, "Wrote default config to {}", path.display())?;
                }
                None => write!(stdout, "{}", content)?,
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}
