use std::future::Future;

use crate::error::MirrorResult;

/// A unit of background work that can be started and then awaited through a
/// handle.
pub trait Worker<H, S>
where
    H: WorkerHandle<S>,
{
    type Error;

    /// Starts the worker, returning a handle to await its completion.
    fn start(self) -> impl Future<Output = Result<H, Self::Error>> + Send;
}

/// Handle to a started worker.
pub trait WorkerHandle<S> {
    /// Returns a snapshot of the worker's shared state.
    fn state(&self) -> S;

    /// Waits for the worker to finish.
    ///
    /// An error is returned when the worker itself failed, not when the work
    /// items it processed failed.
    fn wait(self) -> impl Future<Output = MirrorResult<()>> + Send;
}
