use anyhow::Context;
use clap::Parser;
use tracing::{error, info};

use bqmirror::clients::bigquery::BigQueryWarehouse;
use bqmirror::clients::gcs::GcsStorage;
use bqmirror::pipeline::MirrorPipeline;
use bqmirror_config::MirrorConfig;
use bqmirror_telemetry::init_tracing;

/// Copies the tables missing from one BigQuery dataset into another.
#[derive(Debug, Parser)]
#[command(name = "bqmirror", version)]
struct AppArgs {
    /// GCP project that owns the source dataset.
    #[arg(long)]
    source_project: String,

    /// Dataset to copy tables from.
    #[arg(long)]
    source_dataset: String,

    /// GCP project that owns the destination dataset.
    #[arg(long)]
    destination_project: String,

    /// Dataset to copy tables into. Defaults to the source dataset name.
    #[arg(long)]
    destination_dataset: Option<String>,

    /// Regex that table names must fully match to be considered.
    #[arg(long)]
    table_filter: Option<String>,

    /// GCS bucket used to stage exported table data, e.g. gs://my-bucket or
    /// gs://my-bucket/staging.
    #[arg(long)]
    staging_bucket: String,

    /// Maximum number of tables to copy per run.
    #[arg(long, default_value_t = 100)]
    limit: usize,

    /// Number of tables copied concurrently.
    #[arg(long, default_value_t = 4)]
    agents: u16,

    /// Delay in milliseconds between consecutive status polls of a remote
    /// job.
    #[arg(long, default_value_t = 30_000)]
    poll_interval_ms: u64,

    /// Path to the service account key file used for BigQuery. GCS access
    /// uses application default credentials.
    #[arg(long)]
    sa_key_file: String,
}

impl AppArgs {
    fn into_config(self) -> (MirrorConfig, String) {
        let config = MirrorConfig {
            source_project: self.source_project,
            source_dataset: self.source_dataset,
            destination_project: self.destination_project,
            destination_dataset: self.destination_dataset,
            table_filter: self.table_filter,
            staging_bucket: self.staging_bucket,
            limit: self.limit,
            agents: self.agents,
            poll_interval_ms: self.poll_interval_ms,
        };

        (config, self.sa_key_file)
    }
}

fn main() -> anyhow::Result<()> {
    let args = AppArgs::parse();

    init_tracing(env!("CARGO_PKG_NAME"))?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main(args))
}

async fn async_main(args: AppArgs) -> anyhow::Result<()> {
    let (config, sa_key_file) = args.into_config();
    config.validate().context("invalid configuration")?;

    let warehouse = BigQueryWarehouse::new_with_key_path(&sa_key_file)
        .await
        .context("failed to create the BigQuery client")?;
    let storage = GcsStorage::new()
        .await
        .context("failed to create the GCS client")?;

    let report = MirrorPipeline::new(config, warehouse, storage).run().await?;

    info!(
        total = report.total(),
        completed = report.completed(),
        failed = report.failed(),
        "mirror run finished"
    );

    if !report.all_completed() {
        for task in report.tasks.iter().filter(|task| task.is_failed()) {
            if let Some(cause) = &task.failure {
                error!(table = %task.source, %cause, "table copy failed");
            }
        }

        std::process::exit(1);
    }

    Ok(())
}
