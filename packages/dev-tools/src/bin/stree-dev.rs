//! Development driver for the service tree engine
//!
//! Runs ensure, query and delete requests against a local libsql database
//! and prints the results as JSON. Decision events are logged through
//! `tracing` on stderr.
//!
//! # Usage
//!
//! ```bash
//! stree-dev add inf.monitor.kafka inf.monitor.thanos
//! stree-dev query 3 inf.monitor
//! stree-dev delete --force inf
//! stree-dev --config ./stree.json seed
//! ```
//!
//! The database location comes from the config file, `STREE_DB_PATH`, or
//! `~/.stree/database/stree.db`.

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use stree_core::{DatabaseService, NodeRequest, StreeConfig, StreeService, TursoStore};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, reload, EnvFilter, Registry};

type FilterHandle = reload::Handle<EnvFilter, Registry>;

/// Command-line driver for the g.p.a hierarchy
#[derive(Parser, Debug)]
#[command(name = "stree-dev")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON config file
    #[arg(short, long, global = true, env = "STREE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ensure full group.parent.asset chains exist
    Add {
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Query mode 1 (parents of a group), 2 (assets of a group) or 3 (assets of group.parent)
    Query {
        #[arg(value_parser = clap::value_parser!(i64).range(1..=3))]
        mode: i64,
        #[arg(required = true)]
        nodes: Vec<String>,
    },

    /// Delete groups, parents or assets
    Delete {
        /// Remove a group together with its whole subtree
        #[arg(long)]
        force: bool,
        #[arg(required = true)]
        nodes: Vec<String>,
    },

    /// Insert the demo data set and run the sample queries
    Seed,
}

const SEED_PATHS: [&str; 4] = [
    "inf.monitor.thanos",
    "inf.monitor.kafka",
    "inf.monitor.prometheus",
    "inf.monitor.m3db",
];

const SEED_QUERIES: [(i64, &[&str]); 3] = [
    (1, &["a", "b", "b", "inf", "waimai"]),
    (2, &["a", "b", "inf", "ts"]),
    (3, &["inf.monitor", "sz.monitor", "hk.monitor"]),
];

/// Subscriber whose filter can be swapped once the config is known
fn build_subscriber<W>(
    bootstrap: EnvFilter,
    writer: W,
) -> (impl tracing::Subscriber + Send + Sync + 'static, FilterHandle)
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let (filter, handle) = reload::Layer::new(bootstrap);
    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(writer));
    (subscriber, handle)
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<StreeConfig> {
    let mut config = match path {
        Some(path) => StreeConfig::load_file(path)?,
        None => StreeConfig::default(),
    };
    config.apply_env();
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;
    Ok(config)
}

async fn run_queries(service: &StreeService, mode: i64, nodes: &[&str]) {
    for node in nodes {
        let result = service.query(&NodeRequest::query(*node, mode)).await;
        println!(
            "{}",
            json!({ "node": node, "queryType": mode, "result": result })
        );
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins; otherwise log at info until the config filter is loaded
    let env_filter = EnvFilter::try_from_default_env().ok();
    let bootstrap = env_filter
        .clone()
        .unwrap_or_else(|| EnvFilter::new("info"));
    let (subscriber, filter_handle) = build_subscriber(bootstrap, std::io::stderr);
    subscriber.init();

    let config = load_config(cli.config.as_ref())?;
    if env_filter.is_none() {
        filter_handle
            .reload(EnvFilter::new(&config.log_filter))
            .context("Failed to apply log filter from config")?;
    }

    tracing::info!("Database: {}", config.database_path.display());

    let db = DatabaseService::new(config.database_path.clone(), config.busy_timeout_ms)
        .await
        .with_context(|| {
            format!(
                "Failed to open database at {}",
                config.database_path.display()
            )
        })?;
    let service = StreeService::new(Arc::new(TursoStore::new(Arc::new(db))));

    match cli.command {
        Commands::Add { paths } => {
            for path in &paths {
                let created = service.ensure(&NodeRequest::new(path.as_str())).await;
                println!("{}", json!({ "node": path, "created": created }));
            }
        }
        Commands::Query { mode, nodes } => {
            let nodes: Vec<&str> = nodes.iter().map(String::as_str).collect();
            run_queries(&service, mode, &nodes).await;
        }
        Commands::Delete { force, nodes } => {
            for node in &nodes {
                let deleted = service
                    .delete(&NodeRequest::delete(node.as_str(), force))
                    .await;
                println!(
                    "{}",
                    json!({ "node": node, "forceDelete": force, "deleted": deleted })
                );
            }
        }
        Commands::Seed => {
            for path in SEED_PATHS {
                let created = service.ensure(&NodeRequest::new(path)).await;
                println!("{}", json!({ "node": path, "created": created }));
            }
            for (mode, nodes) in SEED_QUERIES {
                run_queries(&service, mode, nodes).await;
            }
        }
    }

    Ok(())
}
