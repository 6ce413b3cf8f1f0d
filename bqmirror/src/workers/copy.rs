use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, info_span, Instrument};

use crate::bail;
use crate::error::{ErrorKind, MirrorResult};
use crate::mirror_error;
use crate::pipeline::table_copy::run_to_terminal;
use crate::state::task::CopyTask;
use crate::storage::Storage;
use crate::warehouse::Warehouse;
use crate::workers::base::{Worker, WorkerHandle};

/// Task queue shared by all copy workers of a pool.
///
/// Wrapping the receiver in a mutex turns the single-consumer channel into a
/// multi-consumer queue. Whichever worker grabs the lock first gets the next
/// task.
pub type SharedTaskQueue = Arc<Mutex<mpsc::Receiver<CopyTask>>>;

/// Shared state of a copy worker, observable while the worker runs.
#[derive(Debug, Clone, Default)]
pub struct CopyWorkerState {
    processed: Arc<AtomicUsize>,
}

impl CopyWorkerState {
    /// Number of tasks this worker has driven to a terminal phase.
    pub fn tasks_processed(&self) -> usize {
        self.processed.load(Ordering::Relaxed)
    }
}

/// Handle to a running copy worker.
#[derive(Debug)]
pub struct CopyWorkerHandle {
    state: CopyWorkerState,
    handle: Option<JoinHandle<MirrorResult<()>>>,
}

impl WorkerHandle<CopyWorkerState> for CopyWorkerHandle {
    fn state(&self) -> CopyWorkerState {
        self.state.clone()
    }

    async fn wait(mut self) -> MirrorResult<()> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };

        handle.await.map_err(|err| {
            mirror_error!(
                ErrorKind::WorkerPanic,
                "a copy worker terminated abnormally",
                err
            )
        })?
    }
}

/// Worker that pulls copy tasks off the shared queue, drives each one to a
/// terminal phase and reports the outcome.
#[derive(Debug)]
pub struct CopyWorker<W, S> {
    id: usize,
    warehouse: W,
    storage: S,
    queue: SharedTaskQueue,
    results_tx: mpsc::Sender<CopyTask>,
    poll_interval: Duration,
}

impl<W, S> CopyWorker<W, S> {
    pub fn new(
        id: usize,
        warehouse: W,
        storage: S,
        queue: SharedTaskQueue,
        results_tx: mpsc::Sender<CopyTask>,
        poll_interval: Duration,
    ) -> CopyWorker<W, S> {
        CopyWorker {
            id,
            warehouse,
            storage,
            queue,
            results_tx,
            poll_interval,
        }
    }
}

impl<W, S> Worker<CopyWorkerHandle, CopyWorkerState> for CopyWorker<W, S>
where
    W: Warehouse + Send + Sync + 'static,
    S: Storage + Send + Sync + 'static,
{
    type Error = crate::error::MirrorError;

    async fn start(self) -> Result<CopyWorkerHandle, Self::Error> {
        let state = CopyWorkerState::default();

        let span = info_span!("copy_worker", worker_id = self.id);
        let worker_state = state.clone();
        let handle = tokio::spawn(
            async move { run_worker_loop(self, worker_state).await }.instrument(span),
        );

        Ok(CopyWorkerHandle {
            state,
            handle: Some(handle),
        })
    }
}

async fn run_worker_loop<W, S>(
    worker: CopyWorker<W, S>,
    state: CopyWorkerState,
) -> MirrorResult<()>
where
    W: Warehouse + Send + Sync + 'static,
    S: Storage + Send + Sync + 'static,
{
    info!("copy worker started");

    loop {
        // Hold the lock only while receiving, so other workers can pick up
        // tasks while this one is copying.
        let task = {
            let mut queue = worker.queue.lock().await;
            queue.recv().await
        };

        let Some(task) = task else {
            break;
        };

        debug!(table = %task.source, "picked up copy task");

        let task =
            run_to_terminal(task, &worker.warehouse, &worker.storage, worker.poll_interval).await;

        info!(table = %task.source, phase = %task.phase, "copy task finished");

        if worker.results_tx.send(task).await.is_err() {
            bail!(
                ErrorKind::InvalidState,
                "the results channel closed while workers were still running"
            );
        }

        state.processed.fetch_add(1, Ordering::Relaxed);
    }

    info!(
        tasks_processed = state.tasks_processed(),
        "copy worker exiting, task queue drained"
    );

    Ok(())
}
