use std::time::Duration;

use tracing::{debug, warn};

use crate::bail;
use crate::error::{ErrorKind, MirrorResult};
use crate::mirror_error;
use crate::state::task::{CopyPhase, CopyTask};
use crate::storage::Storage;
use crate::types::{CreateDisposition, JobState, LoadJobSpec, WriteDisposition};
use crate::warehouse::Warehouse;

const STAGING_SCHEME: &str = "gs://";

/// Drives a copy task until it reaches a terminal phase.
///
/// Errors never escape this function. Any failure moves the task into
/// [`CopyPhase::Failed`] with its cause attached, so the caller always gets
/// the task back and can report it.
pub async fn run_to_terminal<W, S>(
    mut task: CopyTask,
    warehouse: &W,
    storage: &S,
    poll_interval: Duration,
) -> CopyTask
where
    W: Warehouse,
    S: Storage,
{
    while !task.phase.is_terminal() {
        let snapshot = task.clone();

        task = match step(task, warehouse, storage, poll_interval).await {
            Ok(next) => next,
            Err(err) => {
                warn!(
                    table = %snapshot.source,
                    phase = %snapshot.phase,
                    error = %err,
                    "table copy failed"
                );

                snapshot.failed(err)
            }
        };
    }

    task
}

/// Executes the work of the task's current phase and returns the task in its
/// next phase. Waiting phases return the task unchanged while the remote job
/// is still running.
async fn step<W, S>(
    task: CopyTask,
    warehouse: &W,
    storage: &S,
    poll_interval: Duration,
) -> MirrorResult<CopyTask>
where
    W: Warehouse,
    S: Storage,
{
    match task.phase {
        CopyPhase::Extract => start_extract(task, warehouse).await,
        CopyPhase::WaitForExtract => {
            poll_job(task, warehouse, poll_interval, CopyPhase::Load).await
        }
        CopyPhase::Load => start_load(task, warehouse).await,
        CopyPhase::WaitForLoad => {
            poll_job(task, warehouse, poll_interval, CopyPhase::Cleanup).await
        }
        CopyPhase::Cleanup => cleanup_staging(task, storage).await,
        CopyPhase::Completed | CopyPhase::Failed => {
            bail!(
                ErrorKind::InvalidState,
                "cannot step a task in a terminal phase"
            )
        }
    }
}

async fn start_extract<W: Warehouse>(mut task: CopyTask, warehouse: &W) -> MirrorResult<CopyTask> {
    let (bucket, path) = split_bucket_uri(&task.staging_bucket)?;

    let staging_prefix = match path {
        Some(path) => format!("{path}/{}/{}/", task.source.dataset, task.source.table),
        None => format!("{}/{}/", task.source.dataset, task.source.table),
    };
    let extract_uri = format!("{STAGING_SCHEME}{bucket}/{staging_prefix}*");

    let job = warehouse.submit_extract_job(&task.source, &extract_uri).await?;

    debug!(table = %task.source, job_id = %job.id, uri = %extract_uri, "extract job submitted");

    task.job = Some(job);
    task.extract_uri = Some(extract_uri);
    task.staging_prefix = Some(staging_prefix);

    Ok(task.advanced(CopyPhase::WaitForExtract))
}

async fn poll_job<W: Warehouse>(
    mut task: CopyTask,
    warehouse: &W,
    poll_interval: Duration,
    next_phase: CopyPhase,
) -> MirrorResult<CopyTask> {
    let Some(job) = task.job.as_mut() else {
        bail!(ErrorKind::InvalidState, "no job to poll in a waiting phase");
    };

    let status = warehouse.get_job_status(job).await?;
    job.state = status.state;

    match status.state {
        JobState::Done if status.errors.is_empty() => {
            debug!(table = %task.source, job_id = %job.id, "job finished");

            Ok(task.advanced(next_phase))
        }
        JobState::Done => Err(mirror_error!(
            ErrorKind::JobFailed,
            "remote job finished with errors",
            format!("job {}: {}", job.id, status.errors.join("; "))
        )),
        JobState::Pending | JobState::Running => {
            tokio::time::sleep(poll_interval).await;

            Ok(task)
        }
    }
}

async fn start_load<W: Warehouse>(mut task: CopyTask, warehouse: &W) -> MirrorResult<CopyTask> {
    let Some(extract_uri) = task.extract_uri.clone() else {
        bail!(ErrorKind::InvalidState, "cannot load before extracting");
    };

    let schema = warehouse.get_table_schema(&task.source).await?;

    let spec = LoadJobSpec {
        destination: task.destination.clone(),
        schema,
        source_uris: vec![extract_uri],
        create_disposition: CreateDisposition::CreateIfNeeded,
        // A failed load must not leave partial data in the destination
        // table, so appending and truncating are off the table.
        write_disposition: WriteDisposition::WriteEmpty,
    };

    let job = warehouse.submit_load_job(&spec).await?;

    debug!(table = %task.destination, job_id = %job.id, "load job submitted");

    task.job = Some(job);

    Ok(task.advanced(CopyPhase::WaitForLoad))
}

async fn cleanup_staging<S: Storage>(task: CopyTask, storage: &S) -> MirrorResult<CopyTask> {
    let (bucket, _) = split_bucket_uri(&task.staging_bucket)?;
    let Some(prefix) = task.staging_prefix.as_deref() else {
        bail!(ErrorKind::InvalidState, "no staging prefix to clean up");
    };

    let blobs = storage.list_blobs(bucket, prefix).await?;

    for blob in &blobs {
        if let Err(err) = storage.delete_blob(blob).await {
            return Err(mirror_error!(
                ErrorKind::StorageError,
                "failed to delete a staged object",
                format!("{blob}: {err}")
            ));
        }
    }

    debug!(table = %task.source, staged_objects = blobs.len(), "staging cleaned up");

    Ok(task.advanced(CopyPhase::Completed))
}

/// Splits a `gs://bucket[/path]` URI into its bucket name and optional
/// object name prefix.
fn split_bucket_uri(uri: &str) -> MirrorResult<(&str, Option<&str>)> {
    let Some(rest) = uri.strip_prefix(STAGING_SCHEME) else {
        bail!(
            ErrorKind::ValidationError,
            "the staging bucket must be a gs:// uri",
            uri
        );
    };

    let (bucket, path) = match rest.split_once('/') {
        Some((bucket, path)) => {
            let path = path.trim_end_matches('/');
            (bucket, (!path.is_empty()).then_some(path))
        }
        None => (rest, None),
    };

    if bucket.is_empty() {
        bail!(ErrorKind::ValidationError, "the staging bucket name is empty", uri);
    }

    Ok((bucket, path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::storage::memory::MemoryStorage;
    use crate::types::{BlobId, JobStatus, TableRef};
    use crate::warehouse::memory::MemoryWarehouse;

    const POLL: Duration = Duration::from_millis(1);

    fn task() -> CopyTask {
        CopyTask::new(
            TableRef::new("src", "events", "t1"),
            TableRef::new("dst", "events", "t1"),
            "gs://staging",
        )
    }

    #[test]
    fn split_bucket_uri_accepts_bare_buckets() {
        assert_eq!(split_bucket_uri("gs://staging").unwrap(), ("staging", None));
        assert_eq!(split_bucket_uri("gs://staging/").unwrap(), ("staging", None));
    }

    #[test]
    fn split_bucket_uri_keeps_the_path() {
        assert_eq!(
            split_bucket_uri("gs://staging/exports/daily").unwrap(),
            ("staging", Some("exports/daily"))
        );
        assert_eq!(
            split_bucket_uri("gs://staging/exports/").unwrap(),
            ("staging", Some("exports"))
        );
    }

    #[test]
    fn split_bucket_uri_rejects_bad_uris() {
        let error = split_bucket_uri("staging").unwrap_err();
        assert_eq!(error.kind(), ErrorKind::ValidationError);

        let error = split_bucket_uri("gs:///path").unwrap_err();
        assert_eq!(error.kind(), ErrorKind::ValidationError);
    }

    #[tokio::test]
    async fn happy_path_reaches_completed() {
        let warehouse = MemoryWarehouse::new();
        let storage = MemoryStorage::new();
        storage
            .insert_blob(BlobId::new("staging", "events/t1/000.avro"))
            .await;

        let task = run_to_terminal(task(), &warehouse, &storage, POLL).await;

        assert!(task.is_completed());
        assert_eq!(
            task.extract_uri.as_deref(),
            Some("gs://staging/events/t1/*")
        );

        let extracts = warehouse.submitted_extracts().await;
        assert_eq!(extracts.len(), 1);
        assert_eq!(extracts[0].1, "gs://staging/events/t1/*");

        let loads = warehouse.submitted_loads().await;
        assert_eq!(loads.len(), 1);
        assert_eq!(loads[0].destination, TableRef::new("dst", "events", "t1"));
        assert_eq!(loads[0].create_disposition, CreateDisposition::CreateIfNeeded);
        assert_eq!(loads[0].write_disposition, WriteDisposition::WriteEmpty);

        assert!(storage.blobs().await.is_empty());
    }

    #[tokio::test]
    async fn bucket_path_is_part_of_the_staging_prefix() {
        let warehouse = MemoryWarehouse::new();
        let storage = MemoryStorage::new();
        let mut task = task();
        task.staging_bucket = "gs://staging/exports".to_string();

        let task = run_to_terminal(task, &warehouse, &storage, POLL).await;

        assert!(task.is_completed());
        assert_eq!(
            task.extract_uri.as_deref(),
            Some("gs://staging/exports/events/t1/*")
        );
        assert_eq!(task.staging_prefix.as_deref(), Some("exports/events/t1/"));
    }

    #[tokio::test]
    async fn invalid_staging_bucket_fails_before_any_submission() {
        let warehouse = MemoryWarehouse::new();
        let storage = MemoryStorage::new();
        let mut task = task();
        task.staging_bucket = "staging".to_string();

        let task = run_to_terminal(task, &warehouse, &storage, POLL).await;

        assert!(task.is_failed());
        assert_eq!(
            task.failure.as_ref().map(|e| e.kind()),
            Some(ErrorKind::ValidationError)
        );
        assert!(warehouse.submitted_extracts().await.is_empty());
    }

    #[tokio::test]
    async fn failed_extract_submits_no_load() {
        let warehouse = MemoryWarehouse::new();
        let storage = MemoryStorage::new();
        warehouse
            .script_extract_job("t1", vec![JobStatus::failed(vec!["quota".to_string()])])
            .await;

        let task = run_to_terminal(task(), &warehouse, &storage, POLL).await;

        assert!(task.is_failed());
        assert_eq!(
            task.failure.as_ref().map(|e| e.kind()),
            Some(ErrorKind::JobFailed)
        );
        assert!(warehouse.submitted_loads().await.is_empty());
    }

    #[tokio::test]
    async fn failed_load_reports_the_job_errors() {
        let warehouse = MemoryWarehouse::new();
        let storage = MemoryStorage::new();
        warehouse
            .script_load_job("t1", vec![JobStatus::failed(vec!["table not empty".to_string()])])
            .await;

        let task = run_to_terminal(task(), &warehouse, &storage, POLL).await;

        assert!(task.is_failed());
        let failure = task.failure.as_ref().unwrap();
        assert_eq!(failure.kind(), ErrorKind::JobFailed);
        assert!(failure.detail().unwrap().contains("table not empty"));
    }

    #[tokio::test]
    async fn cleanup_failure_names_the_blob_and_keeps_earlier_deletions() {
        let warehouse = MemoryWarehouse::new();
        let storage = MemoryStorage::new();
        let b1 = BlobId::new("staging", "events/t1/000.avro");
        let b2 = BlobId::new("staging", "events/t1/001.avro");
        storage.insert_blob(b1.clone()).await;
        storage.insert_blob(b2.clone()).await;
        storage.fail_delete_of(b2.clone()).await;

        let task = run_to_terminal(task(), &warehouse, &storage, POLL).await;

        assert!(task.is_failed());
        let failure = task.failure.as_ref().unwrap();
        assert_eq!(failure.kind(), ErrorKind::StorageError);
        assert!(failure.detail().unwrap().contains("events/t1/001.avro"));

        assert_eq!(storage.deleted().await, vec![b1]);
        assert_eq!(storage.blobs().await, vec![b2]);
    }

    #[tokio::test]
    async fn phases_never_move_backwards() {
        let warehouse = MemoryWarehouse::new();
        let storage = MemoryStorage::new();
        warehouse
            .script_extract_job(
                "t1",
                vec![JobStatus::pending(), JobStatus::running(), JobStatus::done()],
            )
            .await;
        warehouse
            .script_load_job("t1", vec![JobStatus::running(), JobStatus::done()])
            .await;

        let mut current = task();
        let mut last_index = current.phase.step_index();

        while !current.phase.is_terminal() {
            current = step(current, &warehouse, &storage, POLL).await.unwrap();

            let index = current.phase.step_index();
            assert!(index >= last_index, "phase moved backwards");
            last_index = index;
        }

        assert!(current.is_completed());
    }
}
