//! Command-line runner for pipekit pipelines.

#![forbid(unsafe_code)]

mod project;

use anyhow::Context;
use clap::{Parser, Subcommand};
use pipekit::prelude::*;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pipekit")]
#[command(about = "Run and inspect pipekit pipelines", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a pipeline, optionally narrowed to nodes matching tags.
    Run {
        /// Pipeline to run; defaults to the composed default pipeline.
        #[arg(long)]
        pipeline: Option<String>,
        /// Comma-separated tags; only nodes with at least one matching
        /// tag are run.
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,
        /// Run independent branches concurrently.
        #[arg(long)]
        parallel: bool,
        /// Configuration directory.
        #[arg(long, default_value = "conf")]
        conf: PathBuf,
        /// Configuration environment overlaying `base`.
        #[arg(long, default_value = "local")]
        env: String,
    },
    /// List registered pipelines with their nodes and tags.
    Registry,
    /// List configured catalog entries.
    Catalog {
        /// Configuration directory.
        #[arg(long, default_value = "conf")]
        conf: PathBuf,
        /// Configuration environment overlaying `base`.
        #[arg(long, default_value = "local")]
        env: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();

    match dispatch(cli.command).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(err) => {
            error!("{err:#}");
            ExitCode::from(2)
        }
    }
}

async fn dispatch(command: Commands) -> anyhow::Result<bool> {
    match command {
        Commands::Run {
            pipeline,
            tags,
            parallel,
            conf,
            env,
        } => run(pipeline, tags, parallel, &conf, &env).await,
        Commands::Registry => {
            list_registry()?;
            Ok(true)
        }
        Commands::Catalog { conf, env } => {
            list_catalog(&conf, &env)?;
            Ok(true)
        }
    }
}

async fn run(
    pipeline: Option<String>,
    tags: Vec<String>,
    parallel: bool,
    conf: &std::path::Path,
    env: &str,
) -> anyhow::Result<bool> {
    let registry = project::build_registry().context("failed to build pipeline registry")?;
    let name = pipeline.unwrap_or_else(|| project::DEFAULT_PIPELINE.to_string());
    let pipeline = registry.get(&name)?;

    let tag_set: BTreeSet<String> = tags.into_iter().filter(|t| !t.is_empty()).collect();
    let selected = pipeline.filter_by_tags(&tag_set)?;

    let config = ProjectConfig::load(conf, env)
        .with_context(|| format!("failed to load configuration from '{}'", conf.display()))?;
    let catalog = DataCatalog::with_entries(config.catalog);
    catalog.insert_parameters(&project::default_parameters());
    catalog.insert_parameters(&config.parameters);

    let ctx = RunContext::new().with_sink(Arc::new(LoggingEventSink::new()));
    let runner: Box<dyn Runner> = if parallel {
        Box::new(ParallelRunner::new())
    } else {
        Box::new(SequentialRunner::new())
    };

    info!(
        pipeline = %selected.name(),
        nodes = selected.node_count(),
        tags = %if tag_set.is_empty() {
            "<all>".to_string()
        } else {
            tag_set.iter().cloned().collect::<Vec<_>>().join(",")
        },
        "starting run"
    );

    let result = runner.run(&selected, Arc::new(catalog), &ctx).await?;

    if result.success {
        info!(
            run_id = %result.run_id,
            duration_ms = result.duration_ms,
            "all {} node(s) succeeded",
            result.node_results.len()
        );
    }

    Ok(result.success)
}

fn list_registry() -> anyhow::Result<()> {
    let registry = project::build_registry()?;
    for name in registry.names() {
        let pipeline = registry.get(&name)?;
        let tags: Vec<String> = pipeline.tags().into_iter().collect();
        println!(
            "{name}: {} node(s), tags [{}]",
            pipeline.node_count(),
            tags.join(", ")
        );
        for node in pipeline.ordered_nodes() {
            println!(
                "  {} ({} -> {})",
                node.name,
                node.inputs.join(", "),
                node.outputs.join(", ")
            );
        }
    }
    Ok(())
}

fn list_catalog(conf: &std::path::Path, env: &str) -> anyhow::Result<()> {
    let config = ProjectConfig::load(conf, env)?;
    let catalog = DataCatalog::with_entries(config.catalog);

    if catalog.entry_names().is_empty() {
        println!("no catalog entries configured");
        return Ok(());
    }
    for name in catalog.entry_names() {
        if let Some(entry) = catalog.entry(&name) {
            println!(
                "{name}: {} at {}{}",
                entry.format,
                entry.location.display(),
                if entry.versioned { " (versioned)" } else { "" }
            );
        }
    }
    Ok(())
}
