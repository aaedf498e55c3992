//! gol-lookup
//!
//! Look up one feature by type and ID and print its tags:
//!
//! ```text
//! gol-lookup data/monaco.gol node 4416197078
//! gol-lookup data/monaco.gol way 626967072
//! gol-lookup data/monaco.gol relation 2214022 --no-index
//! ```

use anyhow::Context;
use clap::Parser;
use gol_lookup::config::Config;
use gol_lookup::storage::{FeatureId, FeatureKey, FeatureType, IndexMode};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "gol-lookup")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Look up a feature by type and ID")]
struct Args {
    /// Path to the GOL file
    gol: PathBuf,

    /// Feature type: node, way, or relation
    #[arg(value_parser = parse_feature_type)]
    feature_type: FeatureType,

    /// Feature ID
    id: FeatureId,

    /// Ignore any ID index and scan
    #[arg(long)]
    no_index: bool,

    /// Config file (default: search standard locations)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn parse_feature_type(s: &str) -> Result<FeatureType, String> {
    s.parse::<FeatureType>().map_err(|e| e.to_string())
}

fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    let config = Config::resolve(args.config.as_deref()).context("Failed to load config")?;
    gol_lookup::logging::init(&config.logging);

    let mut options = config.options();
    if args.no_index {
        options = options.index_mode(IndexMode::Disabled);
    }

    let key = FeatureKey::new(args.feature_type, args.id);
    let mut stdout = std::io::stdout().lock();

    let found = match gol_lookup::report::lookup(&args.gol, key, &options, &mut stdout) {
        Ok(found) => found,
        Err(err) => {
            if let Some(hint) = err.recovery_hint() {
                eprintln!("hint: {}", hint);
            }
            return Err(anyhow::Error::new(err)
                .context(format!("Lookup of {} in {} failed", key, args.gol.display())));
        }
    };

    Ok(if found {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
