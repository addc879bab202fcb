//! Command-line front-end for the reconcile library.
//!
//! Loads a chat export and catalog files, runs the reconciliation and
//! writes the exports. Interrupting a run with Ctrl-C stops it after the
//! current cluster; rerunning with the same `--checkpoint` resumes it.

mod config;
mod export;
mod load;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use reconcile::{
    classify, type_sequence, CatalogEntity, CheckpointStore, JsonFileCheckpointStore,
    ReconcileConfig, ReconcileError, Reconciler, SegmentConfig, Summary,
};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::load::Stream;

#[derive(Parser)]
#[command(name = "reconcile-cli")]
#[command(about = "Reconcile a chat stream with spreadsheet catalogs")]
struct Cli {
    /// JSON configuration file (partial files are fine)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline and write the exports
    Run {
        /// Chat export JSON
        #[arg(long)]
        export: PathBuf,

        /// Catalog JSON file (repeatable)
        #[arg(long = "catalog")]
        catalogs: Vec<PathBuf>,

        /// Output directory
        #[arg(long, default_value = "out")]
        out: PathBuf,

        /// Checkpoint file for resumable runs
        #[arg(long)]
        checkpoint: Option<PathBuf>,

        /// Prefix to strip from topic titles
        #[arg(long)]
        topic_prefix: Option<String>,

        /// Use the 30-minute time-only segmentation
        #[arg(long)]
        coarse: bool,
    },

    /// List clusters and their patterns without extracting or merging
    Segment {
        /// Chat export JSON
        #[arg(long)]
        export: PathBuf,

        /// Prefix to strip from topic titles
        #[arg(long)]
        topic_prefix: Option<String>,

        /// Use the 30-minute time-only segmentation
        #[arg(long)]
        coarse: bool,
    },

    /// Print the effective configuration as JSON
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,reconcile=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();

    let cli = Cli::parse();
    let config = config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Run {
            export,
            catalogs,
            out,
            checkpoint,
            topic_prefix,
            coarse,
        } => {
            let config = with_coarse(config, coarse);
            let stream = load::load_stream(&export, topic_prefix.as_deref())?;
            let mut catalog = Vec::new();
            for path in &catalogs {
                catalog.extend(load::load_catalog(path, &config.extract)?);
            }

            let cancel = CancellationToken::new();
            let on_signal = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("Interrupt received, stopping after the current cluster");
                    on_signal.cancel();
                }
            });

            match checkpoint {
                Some(path) => {
                    let store = JsonFileCheckpointStore::new(path);
                    let reconciler = Reconciler::with_store(config, store);
                    run(reconciler, stream, &catalog, &out, cancel).await
                }
                None => {
                    let reconciler = Reconciler::new(config);
                    run(reconciler, stream, &catalog, &out, cancel).await
                }
            }
        }
        Commands::Segment {
            export,
            topic_prefix,
            coarse,
        } => {
            let config = with_coarse(config, coarse);
            let stream = load::load_stream(&export, topic_prefix.as_deref())?;
            segment(config, stream);
            Ok(())
        }
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

fn with_coarse(config: ReconcileConfig, coarse: bool) -> ReconcileConfig {
    if coarse {
        config.with_segment(SegmentConfig::coarse())
    } else {
        config
    }
}

async fn run<S: CheckpointStore>(
    reconciler: Reconciler<S>,
    stream: Stream,
    catalog: &[CatalogEntity],
    out: &std::path::Path,
    cancel: CancellationToken,
) -> Result<()> {
    let result = match reconciler
        .reconcile(stream.messages, &stream.categories, catalog, cancel)
        .await
    {
        Ok(result) => result,
        Err(ReconcileError::Cancelled { last_completed }) => {
            let after = last_completed
                .map(|id| format!("after cluster {id}"))
                .unwrap_or_else(|| "before the first cluster".to_string());
            anyhow::bail!("Run interrupted {after}; rerun with the same --checkpoint to resume");
        }
        Err(e) => return Err(e).context("Reconciliation failed"),
    };

    let written = export::write_outputs(out, &result)?;
    for path in &written {
        println!("✓ Wrote {}", path.display());
    }
    println!();
    print!("{}", Summary::from_reconciliation(&result));
    Ok(())
}

fn segment(config: ReconcileConfig, stream: Stream) {
    let reconciler = Reconciler::new(config);
    let by_id: HashMap<_, _> = stream.messages.iter().map(|m| (m.id, m.clone())).collect();
    let (_, clusters) = reconciler.segment(stream.messages, &stream.categories);

    for cluster in &clusters {
        let sequence = type_sequence(cluster.message_ids.iter().filter_map(|id| by_id.get(id)));
        println!(
            "{}\t{}\t{} messages\t{}",
            cluster.id,
            cluster.category,
            cluster.len(),
            classify(&sequence)
        );
    }
    println!("{} clusters", clusters.len());
}
