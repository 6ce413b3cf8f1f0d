use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::bail;
use crate::error::{ErrorKind, MirrorResult};
use crate::types::{JobHandle, JobState, JobStatus, LoadJobSpec, TableRef};
use crate::warehouse::Warehouse;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JobKind {
    Extract,
    Load,
}

#[derive(Debug)]
struct ScriptedJob {
    kind: JobKind,
    /// Destination of a load job, used to materialize the table once the job
    /// completes.
    destination: Option<TableRef>,
    /// Statuses returned by successive polls. The last one is repeated.
    statuses: VecDeque<JobStatus>,
    completed_recorded: bool,
}

#[derive(Debug, Default)]
struct Inner {
    tables: HashMap<(String, String), Vec<TableRef>>,
    schemas: HashMap<TableRef, serde_json::Value>,
    extract_scripts: HashMap<String, VecDeque<JobStatus>>,
    load_scripts: HashMap<String, VecDeque<JobStatus>>,
    jobs: HashMap<String, ScriptedJob>,
    submitted_extracts: Vec<(TableRef, String)>,
    submitted_loads: Vec<LoadJobSpec>,
    completed_loads: Vec<TableRef>,
    next_job_id: u64,
}

impl Inner {
    fn next_job_id(&mut self) -> String {
        self.next_job_id += 1;
        format!("job-{}", self.next_job_id)
    }
}

/// In-memory [`Warehouse`] used in tests and examples.
///
/// Jobs complete according to scripts installed per table name. Without a
/// script a job reports done on the first poll. Once a load job completes
/// successfully its destination table becomes visible to
/// [`Warehouse::list_tables`].
#[derive(Debug, Clone, Default)]
pub struct MemoryWarehouse {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryWarehouse {
    pub fn new() -> MemoryWarehouse {
        MemoryWarehouse::default()
    }

    /// Registers a table as existing in its dataset.
    pub async fn add_table(&self, table: TableRef) {
        let mut inner = self.inner.lock().await;
        inner
            .tables
            .entry((table.project.clone(), table.dataset.clone()))
            .or_default()
            .push(table);
    }

    /// Sets the schema returned for a table. Tables without an explicit
    /// schema report an empty field list.
    pub async fn set_table_schema(&self, table: TableRef, schema: serde_json::Value) {
        let mut inner = self.inner.lock().await;
        inner.schemas.insert(table, schema);
    }

    /// Scripts the poll statuses of the next extract job submitted for the
    /// given table name.
    pub async fn script_extract_job(&self, table_name: &str, statuses: Vec<JobStatus>) {
        let mut inner = self.inner.lock().await;
        inner
            .extract_scripts
            .insert(table_name.to_string(), statuses.into());
    }

    /// Scripts the poll statuses of the next load job submitted for the
    /// given destination table name.
    pub async fn script_load_job(&self, table_name: &str, statuses: Vec<JobStatus>) {
        let mut inner = self.inner.lock().await;
        inner
            .load_scripts
            .insert(table_name.to_string(), statuses.into());
    }

    /// Returns every extract job submitted so far, with its destination URI.
    pub async fn submitted_extracts(&self) -> Vec<(TableRef, String)> {
        self.inner.lock().await.submitted_extracts.clone()
    }

    /// Returns every load job submitted so far.
    pub async fn submitted_loads(&self) -> Vec<LoadJobSpec> {
        self.inner.lock().await.submitted_loads.clone()
    }

    /// Returns the destinations of the load jobs that completed
    /// successfully, in completion order.
    pub async fn completed_loads(&self) -> Vec<TableRef> {
        self.inner.lock().await.completed_loads.clone()
    }
}

impl Warehouse for MemoryWarehouse {
    async fn list_tables(&self, project: &str, dataset: &str) -> MirrorResult<Vec<TableRef>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .tables
            .get(&(project.to_string(), dataset.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn get_table_schema(&self, table: &TableRef) -> MirrorResult<serde_json::Value> {
        let inner = self.inner.lock().await;
        Ok(inner
            .schemas
            .get(table)
            .cloned()
            .unwrap_or_else(|| serde_json::json!({ "fields": [] })))
    }

    async fn submit_extract_job(
        &self,
        table: &TableRef,
        destination_uri: &str,
    ) -> MirrorResult<JobHandle> {
        let mut inner = self.inner.lock().await;

        let statuses = inner
            .extract_scripts
            .remove(&table.table)
            .unwrap_or_else(|| VecDeque::from([JobStatus::done()]));

        let id = inner.next_job_id();
        inner.jobs.insert(
            id.clone(),
            ScriptedJob {
                kind: JobKind::Extract,
                destination: None,
                statuses,
                completed_recorded: false,
            },
        );
        inner
            .submitted_extracts
            .push((table.clone(), destination_uri.to_string()));

        Ok(JobHandle::new(id, table.project.clone(), JobState::Pending))
    }

    async fn submit_load_job(&self, spec: &LoadJobSpec) -> MirrorResult<JobHandle> {
        let mut inner = self.inner.lock().await;

        let statuses = inner
            .load_scripts
            .remove(&spec.destination.table)
            .unwrap_or_else(|| VecDeque::from([JobStatus::done()]));

        let id = inner.next_job_id();
        inner.jobs.insert(
            id.clone(),
            ScriptedJob {
                kind: JobKind::Load,
                destination: Some(spec.destination.clone()),
                statuses,
                completed_recorded: false,
            },
        );
        inner.submitted_loads.push(spec.clone());

        Ok(JobHandle::new(
            id,
            spec.destination.project.clone(),
            JobState::Pending,
        ))
    }

    async fn get_job_status(&self, job: &JobHandle) -> MirrorResult<JobStatus> {
        let mut inner = self.inner.lock().await;

        let Some(scripted) = inner.jobs.get_mut(&job.id) else {
            bail!(
                ErrorKind::WarehouseError,
                "unknown job id",
                job.id.clone()
            );
        };

        let status = if scripted.statuses.len() > 1 {
            scripted.statuses.pop_front().unwrap_or_else(JobStatus::done)
        } else {
            scripted
                .statuses
                .front()
                .cloned()
                .unwrap_or_else(JobStatus::done)
        };

        let record_completion = scripted.kind == JobKind::Load
            && status.is_successful()
            && !scripted.completed_recorded;
        if record_completion {
            scripted.completed_recorded = true;
        }
        let destination = scripted.destination.clone();

        if record_completion {
            if let Some(destination) = destination {
                inner.completed_loads.push(destination.clone());
                inner
                    .tables
                    .entry((destination.project.clone(), destination.dataset.clone()))
                    .or_default()
                    .push(destination);
            }
        }

        Ok(status)
    }
}
