use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use bqmirror::error::MirrorResult;
use bqmirror::types::{JobHandle, JobStatus, LoadJobSpec, TableRef};
use bqmirror::warehouse::memory::MemoryWarehouse;
use bqmirror::warehouse::Warehouse;
use bqmirror_config::MirrorConfig;

pub fn mirror_config(agents: u16) -> MirrorConfig {
    MirrorConfig {
        source_project: "src-proj".to_string(),
        source_dataset: "events".to_string(),
        destination_project: "dst-proj".to_string(),
        destination_dataset: None,
        table_filter: None,
        staging_bucket: "gs://staging".to_string(),
        limit: 100,
        agents,
        poll_interval_ms: 1,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JobKind {
    Extract,
    Load,
}

#[derive(Debug, Default)]
struct Probe {
    current: AtomicUsize,
    max: AtomicUsize,
    job_kinds: Mutex<HashMap<String, JobKind>>,
    finished_jobs: Mutex<HashSet<String>>,
}

/// [`Warehouse`] wrapper that tracks how many table copies have an active
/// remote job at any moment.
///
/// A copy counts as in flight from the submission of its extract job until
/// its load job succeeds or any of its jobs fails.
#[derive(Debug, Clone, Default)]
pub struct ProbedWarehouse {
    inner: MemoryWarehouse,
    probe: Arc<Probe>,
}

impl ProbedWarehouse {
    pub fn new(inner: MemoryWarehouse) -> ProbedWarehouse {
        ProbedWarehouse {
            inner,
            probe: Arc::default(),
        }
    }

    /// Highest number of copies observed in flight at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.probe.max.load(Ordering::SeqCst)
    }

    fn record_start(&self) {
        let current = self.probe.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.probe.max.fetch_max(current, Ordering::SeqCst);
    }

    fn record_end(&self, job_id: &str) {
        let mut finished = self.probe.finished_jobs.lock().unwrap();
        if finished.insert(job_id.to_string()) {
            self.probe.current.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl Warehouse for ProbedWarehouse {
    async fn list_tables(&self, project: &str, dataset: &str) -> MirrorResult<Vec<TableRef>> {
        self.inner.list_tables(project, dataset).await
    }

    async fn get_table_schema(&self, table: &TableRef) -> MirrorResult<serde_json::Value> {
        self.inner.get_table_schema(table).await
    }

    async fn submit_extract_job(
        &self,
        table: &TableRef,
        destination_uri: &str,
    ) -> MirrorResult<JobHandle> {
        let job = self.inner.submit_extract_job(table, destination_uri).await?;

        self.record_start();
        self.probe
            .job_kinds
            .lock()
            .unwrap()
            .insert(job.id.clone(), JobKind::Extract);

        Ok(job)
    }

    async fn submit_load_job(&self, spec: &LoadJobSpec) -> MirrorResult<JobHandle> {
        let job = self.inner.submit_load_job(spec).await?;

        self.probe
            .job_kinds
            .lock()
            .unwrap()
            .insert(job.id.clone(), JobKind::Load);

        Ok(job)
    }

    async fn get_job_status(&self, job: &JobHandle) -> MirrorResult<JobStatus> {
        let status = self.inner.get_job_status(job).await?;

        if status.state == bqmirror::types::JobState::Done {
            let kind = self.probe.job_kinds.lock().unwrap().get(&job.id).copied();

            let copy_over = !status.errors.is_empty() || kind == Some(JobKind::Load);
            if copy_over {
                self.record_end(&job.id);
            }
        }

        Ok(status)
    }
}
