use std::future::Future;

use crate::error::MirrorResult;
use crate::types::{JobHandle, JobStatus, LoadJobSpec, TableRef};

/// Data warehouse operations needed to mirror tables between datasets.
///
/// Extract and load jobs are asynchronous on the remote side. Submitting one
/// returns a [`JobHandle`] immediately and the caller polls
/// [`Warehouse::get_job_status`] until the job reports
/// [`JobState::Done`](crate::types::JobState::Done).
pub trait Warehouse {
    /// Lists all tables in a dataset.
    fn list_tables(
        &self,
        project: &str,
        dataset: &str,
    ) -> impl Future<Output = MirrorResult<Vec<TableRef>>> + Send;

    /// Returns the schema of a table as an opaque JSON value, suitable for
    /// passing back verbatim in a [`LoadJobSpec`].
    fn get_table_schema(
        &self,
        table: &TableRef,
    ) -> impl Future<Output = MirrorResult<serde_json::Value>> + Send;

    /// Submits a job that exports a table to the given destination URI.
    fn submit_extract_job(
        &self,
        table: &TableRef,
        destination_uri: &str,
    ) -> impl Future<Output = MirrorResult<JobHandle>> + Send;

    /// Submits a job that loads staged files into a table.
    fn submit_load_job(
        &self,
        spec: &LoadJobSpec,
    ) -> impl Future<Output = MirrorResult<JobHandle>> + Send;

    /// Polls the current status of a previously submitted job.
    fn get_job_status(
        &self,
        job: &JobHandle,
    ) -> impl Future<Output = MirrorResult<JobStatus>> + Send;
}
