use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dept_etl::{
    config::AppConfig,
    convert::{self, SofficeLauncher},
    export,
    load::{LoadCoordinator, MySqlStore},
    pipeline::{self, RunOptions},
    process::CalamineReader,
    schema::SchemaRegistry,
    CanonicalDataset,
};
use serde_json::json;
use std::path::PathBuf;
use tokio::time::Instant;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "dept-etl", version, about = "Billing extract ETL into the dept_master table")]
struct Cli {
    /// YAML settings file.
    #[arg(long, env = "DEPT_ETL_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Convert, clean and load everything in the staging directory.
    Batch {
        /// Stop after aggregation; leave the target table alone.
        #[arg(long)]
        no_load: bool,
        /// Also write the aggregated dataset to this CSV file.
        #[arg(long)]
        export: Option<PathBuf>,
    },
    /// Clean one .xlsx file without touching the staging directory.
    Clean {
        file: PathBuf,
        #[arg(long)]
        export: Option<PathBuf>,
        /// Replace the target table with this file's rows.
        #[arg(long)]
        load: bool,
    },
    /// Only convert legacy .xls files in the staging directory.
    Convert,
}

fn init_logging() {
    // RUST_LOG wins, then LOG_LEVEL, then info
    let env = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_from_env("LOG_LEVEL"))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    init_logging();
    let cli = Cli::parse();
    let start = Instant::now();

    // ─── 2) settings ─────────────────────────────────────────────────
    let cfg = AppConfig::load(cli.config.as_deref()).context("loading settings")?;
    let ctx = cfg.batch_context();
    let registry = SchemaRegistry::standard();
    info!(staging = %ctx.staging_dir.display(), archive = %ctx.archive_dir.display(), "startup");

    // ─── 3) run ──────────────────────────────────────────────────────
    let output = match cli.command {
        Command::Batch { no_load, export } => {
            let store = if no_load {
                None
            } else {
                Some(MySqlStore::connect(&cfg.database).await?)
            };
            let opts = RunOptions {
                export,
                history_dir: cfg.history_dir.clone(),
            };
            let summary = pipeline::run_batch(
                ctx,
                SofficeLauncher::new(&cfg.soffice_path),
                CalamineReader,
                registry,
                store.as_ref(),
                &cfg.load,
                &opts,
            )
            .await?;
            if let Some(store) = &store {
                store.close().await;
            }
            serde_json::to_value(&summary)?
        }

        Command::Clean {
            file,
            export: export_path,
            load,
        } => {
            let cleaned = pipeline::clean_single_file(&file, &CalamineReader, registry)?;
            let stats = cleaned.stats;
            let dataset = CanonicalDataset::from_records(cleaned.records);
            if let Some(path) = &export_path {
                export::write_csv(&dataset, path)?;
            }
            let mut rows_loaded = None;
            if load {
                if dataset.is_empty() {
                    warn!("no rows cleaned; target table left untouched");
                } else {
                    let store = MySqlStore::connect(&cfg.database).await?;
                    let written = LoadCoordinator::new(&store, cfg.load.clone())
                        .load(&dataset)
                        .await?;
                    store.close().await;
                    rows_loaded = Some(written);
                }
            }
            json!({
                "file": file,
                "stats": stats,
                "exported_to": export_path,
                "rows_loaded": rows_loaded,
            })
        }

        Command::Convert => {
            let launcher = SofficeLauncher::new(&cfg.soffice_path);
            let summary =
                tokio::task::spawn_blocking(move || convert::convert_all(&ctx, &launcher))
                    .await??;
            serde_json::to_value(&summary)?
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    info!(elapsed = ?start.elapsed(), "all done");
    Ok(())
}
