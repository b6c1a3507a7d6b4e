//! p4bisect - Find by binary search the change that introduced a bug
//!
//! Interactive bisection over Perforce label or changelist history. The
//! revision list comes from the p4 command line client; any candidate can
//! be synced into the workspace and judged good or bad until the first bad
//! revision is isolated.

mod catalog;
mod config;
mod engine;
mod p4;
mod sync;
mod tui;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use crate::catalog::{Catalog, UndatedPolicy};
use crate::config::Config;
use crate::engine::BisectEngine;
use crate::p4::{P4Cli, QueryMode, RangeQuery};

#[derive(Parser)]
#[command(name = "p4bisect")]
#[command(about = "Find by binary search the change that introduced a bug")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct QueryArgs {
    /// Depot path to bisect (e.g. //depot/project/...)
    #[arg(short, long)]
    file: String,

    /// Known-good boundary revision (label or changelist)
    #[arg(short, long)]
    good: String,

    /// Known-bad boundary revision (label or changelist)
    #[arg(short, long)]
    bad: String,

    /// Revision source: labels or changes
    #[arg(short, long, default_value = "labels")]
    mode: String,

    /// p4 executable to use instead of the configured one
    #[arg(long)]
    p4: Option<String>,

    /// Handling of records with unparsable dates: reject, first, or last
    #[arg(long)]
    undated: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Bisect interactively with the TUI
    Run {
        #[command(flatten)]
        query: QueryArgs,
    },

    /// Print the revision catalog for a range and exit
    List {
        #[command(flatten)]
        query: QueryArgs,
    },

    /// Create a default config file
    InitConfig,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { query } => cmd_run(query),
        Commands::List { query } => cmd_list(query),
        Commands::InitConfig => cmd_init_config(),
    }
}

/// Resolve config and the backend query from the shared CLI arguments
fn resolve(args: &QueryArgs) -> Result<(Config, RangeQuery)> {
    let mode =
        QueryMode::from_str(&args.mode).context("Invalid mode. Use: labels or changes")?;

    let undated = match &args.undated {
        Some(s) => Some(
            UndatedPolicy::from_str(s)
                .context("Invalid undated policy. Use: reject, first, or last")?,
        ),
        None => None,
    };

    let config = Config::load()?.with_overrides(args.p4.clone(), undated);

    let query = RangeQuery {
        path: args.file.clone(),
        good: args.good.clone(),
        bad: args.bad.clone(),
        mode,
    };

    Ok((config, query))
}

fn backend_for(config: &Config) -> P4Cli {
    P4Cli::new(
        config.p4_bin.clone(),
        config.port.clone(),
        config.user.clone(),
        config.client.clone(),
    )
}

fn cmd_run(args: QueryArgs) -> Result<()> {
    let (config, query) = resolve(&args)?;
    let backend = backend_for(&config);

    let catalog = Catalog::fetch(&backend, &query, config.undated).with_context(|| {
        format!("Failed to list {} for {}", query.mode.as_str(), query.path)
    })?;
    let engine = BisectEngine::start(catalog)
        .with_context(|| format!("No revisions between {} and {}", query.good, query.bad))?;

    tui::run(Box::new(backend), config, query, engine)
}

fn cmd_list(args: QueryArgs) -> Result<()> {
    let (config, query) = resolve(&args)?;
    let backend = backend_for(&config);

    let catalog = Catalog::fetch(&backend, &query, config.undated).with_context(|| {
        format!("Failed to list {} for {}", query.mode.as_str(), query.path)
    })?;

    if catalog.is_empty() {
        println!("No revisions between {} and {}", query.good, query.bad);
        return Ok(());
    }

    for (idx, record) in catalog.records().iter().enumerate() {
        println!("{:>4}  {}", idx, record.descriptor);
    }
    if catalog.undated_count() > 0 {
        println!(
            "({} records had unparsable dates, policy: {})",
            catalog.undated_count(),
            config.undated.as_str()
        );
    }

    Ok(())
}

fn cmd_init_config() -> Result<()> {
    Config::create_default()?;
    println!("Wrote {}", Config::default_path().display());
    Ok(())
}
