use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};

use crate::error::{MirrorError, MirrorResult};
use crate::state::task::CopyTask;
use crate::storage::Storage;
use crate::warehouse::Warehouse;
use crate::workers::base::{Worker, WorkerHandle};
use crate::workers::copy::{CopyWorker, CopyWorkerHandle, CopyWorkerState};

/// A fixed-size pool of copy workers draining a shared task queue.
///
/// The number of workers bounds how many table copies are in flight at any
/// moment. Workers exit on their own once the queue is drained.
#[derive(Debug)]
pub struct CopyWorkerPool {
    handles: Vec<CopyWorkerHandle>,
}

impl CopyWorkerPool {
    /// Starts `agents` workers over the given task queue. Each worker gets a
    /// clone of the warehouse and storage clients and a clone of the results
    /// sender, so the pool's copy of the sender is dropped here and the
    /// results channel closes once the last worker finishes.
    pub async fn start<W, S>(
        agents: usize,
        warehouse: W,
        storage: S,
        task_rx: mpsc::Receiver<CopyTask>,
        results_tx: mpsc::Sender<CopyTask>,
        poll_interval: Duration,
    ) -> MirrorResult<CopyWorkerPool>
    where
        W: Warehouse + Clone + Send + Sync + 'static,
        S: Storage + Clone + Send + Sync + 'static,
    {
        let queue = Arc::new(Mutex::new(task_rx));

        let mut handles = Vec::with_capacity(agents);
        for id in 0..agents {
            let worker = CopyWorker::new(
                id,
                warehouse.clone(),
                storage.clone(),
                Arc::clone(&queue),
                results_tx.clone(),
                poll_interval,
            );

            handles.push(worker.start().await?);
        }

        drop(results_tx);

        Ok(CopyWorkerPool { handles })
    }

    /// Returns a state snapshot per worker.
    pub fn states(&self) -> Vec<CopyWorkerState> {
        self.handles.iter().map(WorkerHandle::state).collect()
    }

    /// Waits for every worker to finish, aggregating their failures.
    pub async fn wait_all(self) -> MirrorResult<()> {
        let mut errors = Vec::new();

        for handle in self.handles {
            if let Err(err) = handle.wait().await {
                errors.push(err);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(MirrorError::many(errors))
        }
    }
}
