pub mod table_copy;

use bqmirror_config::MirrorConfig;
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::bail;
use crate::catalog::resolve_targets;
use crate::error::{ErrorKind, MirrorResult};
use crate::state::task::CopyTask;
use crate::storage::Storage;
use crate::types::TableRef;
use crate::warehouse::Warehouse;
use crate::workers::pool::CopyWorkerPool;

/// Orchestrates a full mirroring run.
///
/// Resolves the tables missing from the destination dataset, copies each of
/// them on a bounded worker pool and collects every outcome into a
/// [`MirrorReport`].
#[derive(Debug)]
pub struct MirrorPipeline<W, S> {
    config: MirrorConfig,
    warehouse: W,
    storage: S,
}

impl<W, S> MirrorPipeline<W, S>
where
    W: Warehouse + Clone + Send + Sync + 'static,
    S: Storage + Clone + Send + Sync + 'static,
{
    pub fn new(config: MirrorConfig, warehouse: W, storage: S) -> MirrorPipeline<W, S> {
        MirrorPipeline {
            config,
            warehouse,
            storage,
        }
    }

    /// Runs the pipeline to completion.
    ///
    /// Individual table failures do not abort the run. They come back as
    /// failed tasks in the report, and an error is only returned when the
    /// run itself cannot proceed.
    pub async fn run(self) -> MirrorResult<MirrorReport> {
        self.config.validate()?;

        let destination_dataset = self.config.destination_dataset().to_string();

        let targets = resolve_targets(
            &self.warehouse,
            &self.config.source_project,
            &self.config.source_dataset,
            &self.config.destination_project,
            &destination_dataset,
            self.config.table_filter.as_deref(),
            self.config.limit,
        )
        .await?;

        let total = targets.len();
        info!(
            source_dataset = %self.config.source_dataset,
            destination_dataset = %destination_dataset,
            total,
            "resolved tables to copy"
        );

        if total == 0 {
            return Ok(MirrorReport { tasks: Vec::new() });
        }

        let (task_tx, task_rx) = mpsc::channel(total);
        let (results_tx, mut results_rx) = mpsc::channel(total);

        for source in targets {
            let destination = TableRef::new(
                self.config.destination_project.clone(),
                destination_dataset.clone(),
                source.table.clone(),
            );
            let task = CopyTask::new(source, destination, self.config.staging_bucket.clone());

            if task_tx.send(task).await.is_err() {
                bail!(
                    ErrorKind::InvalidState,
                    "the task queue closed before all tasks were enqueued"
                );
            }
        }
        drop(task_tx);

        let agents = usize::from(self.config.agents).min(total);
        let pool = CopyWorkerPool::start(
            agents,
            self.warehouse,
            self.storage,
            task_rx,
            results_tx,
            self.config.poll_interval(),
        )
        .await?;

        let mut tasks = Vec::with_capacity(total);
        while let Some(task) = results_rx.recv().await {
            match &task.failure {
                Some(cause) => error!(
                    table = %task.source,
                    %cause,
                    "table copy failed ({}/{total})",
                    tasks.len() + 1
                ),
                None => info!(
                    table = %task.source,
                    "table copy completed ({}/{total})",
                    tasks.len() + 1
                ),
            }

            tasks.push(task);
        }

        pool.wait_all().await?;

        if tasks.len() != total {
            bail!(
                ErrorKind::InvalidState,
                "not every dispatched table copy reported an outcome",
                format!("expected {total}, got {}", tasks.len())
            );
        }

        Ok(MirrorReport { tasks })
    }
}

/// Outcome of a mirroring run, one terminal task per dispatched table.
#[derive(Debug)]
pub struct MirrorReport {
    pub tasks: Vec<CopyTask>,
}

impl MirrorReport {
    pub fn total(&self) -> usize {
        self.tasks.len()
    }

    pub fn completed(&self) -> usize {
        self.tasks.iter().filter(|task| task.is_completed()).count()
    }

    pub fn failed(&self) -> usize {
        self.tasks.iter().filter(|task| task.is_failed()).count()
    }

    pub fn all_completed(&self) -> bool {
        self.tasks.iter().all(CopyTask::is_completed)
    }
}
