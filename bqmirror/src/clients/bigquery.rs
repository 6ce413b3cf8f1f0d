use gcp_bigquery_client::model::job::Job;
use gcp_bigquery_client::model::query_request::QueryRequest;
use gcp_bigquery_client::model::query_response::ResultSet;
use gcp_bigquery_client::Client;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::{ErrorKind, MirrorResult};
use crate::mirror_error;
use crate::types::{JobHandle, JobState, JobStatus, LoadJobSpec, TableRef};
use crate::warehouse::Warehouse;

/// Export format used for staged table data. AVRO is self-describing and
/// survives the round trip without header or type ambiguities.
const STAGING_FORMAT: &str = "AVRO";

/// [`Warehouse`] backed by the BigQuery API.
#[derive(Clone)]
pub struct BigQueryWarehouse {
    client: Client,
}

impl BigQueryWarehouse {
    /// Creates a warehouse authenticated with a service account key file.
    pub async fn new_with_key_path(sa_key_file: &str) -> MirrorResult<BigQueryWarehouse> {
        let client = Client::from_service_account_key_file(sa_key_file).await?;

        Ok(BigQueryWarehouse { client })
    }

    async fn insert_job(&self, project: &str, payload: Value) -> MirrorResult<JobHandle> {
        let job: Job = serde_json::from_value(payload)?;
        let inserted = self.client.job().insert(project, job).await?;

        job_handle(project, &inserted)
    }
}

impl Warehouse for BigQueryWarehouse {
    async fn list_tables(&self, project: &str, dataset: &str) -> MirrorResult<Vec<TableRef>> {
        let sql = format!(
            "SELECT table_name FROM `{project}.{dataset}.INFORMATION_SCHEMA.TABLES` \
             WHERE table_type = 'BASE TABLE' ORDER BY table_name"
        );

        let response = self
            .client
            .job()
            .query(project, QueryRequest::new(sql))
            .await?;

        let mut rows = ResultSet::new_from_query_response(response);
        let mut tables = Vec::new();
        while rows.next_row() {
            if let Some(name) = rows.get_string_by_name("table_name")? {
                tables.push(TableRef::new(project, dataset, name));
            }
        }

        debug!(project, dataset, tables = tables.len(), "listed dataset tables");

        Ok(tables)
    }

    async fn get_table_schema(&self, table: &TableRef) -> MirrorResult<Value> {
        let response = self
            .client
            .table()
            .get(&table.project, &table.dataset, &table.table, None)
            .await?;

        serde_json::to_value(&response)?
            .get("schema")
            .cloned()
            .ok_or_else(|| {
                mirror_error!(
                    ErrorKind::WarehouseError,
                    "the table response carries no schema",
                    table
                )
            })
    }

    async fn submit_extract_job(
        &self,
        table: &TableRef,
        destination_uri: &str,
    ) -> MirrorResult<JobHandle> {
        let payload = json!({
            "configuration": {
                "extract": {
                    "sourceTable": {
                        "projectId": table.project,
                        "datasetId": table.dataset,
                        "tableId": table.table,
                    },
                    "destinationUris": [destination_uri],
                    "destinationFormat": STAGING_FORMAT,
                }
            }
        });

        self.insert_job(&table.project, payload).await
    }

    async fn submit_load_job(&self, spec: &LoadJobSpec) -> MirrorResult<JobHandle> {
        let payload = json!({
            "configuration": {
                "load": {
                    "destinationTable": {
                        "projectId": spec.destination.project,
                        "datasetId": spec.destination.dataset,
                        "tableId": spec.destination.table,
                    },
                    "sourceUris": spec.source_uris,
                    "schema": spec.schema,
                    "sourceFormat": STAGING_FORMAT,
                    "useAvroLogicalTypes": true,
                    "createDisposition": spec.create_disposition.as_str(),
                    "writeDisposition": spec.write_disposition.as_str(),
                }
            }
        });

        self.insert_job(&spec.destination.project, payload).await
    }

    async fn get_job_status(&self, job: &JobHandle) -> MirrorResult<JobStatus> {
        let response = self
            .client
            .job()
            .get_job(&job.project, &job.id, None)
            .await?;

        let value = serde_json::to_value(&response)?;

        Ok(JobStatus {
            state: job_state(&value),
            errors: job_errors(&value),
        })
    }
}

fn job_handle(project: &str, job: &Job) -> MirrorResult<JobHandle> {
    let value = serde_json::to_value(job)?;

    let id = value
        .pointer("/jobReference/jobId")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            mirror_error!(
                ErrorKind::WarehouseError,
                "the job response carries no job id"
            )
        })?;

    Ok(JobHandle::new(id, project, job_state(&value)))
}

/// Maps the `status.state` of a job response. A missing or unknown state is
/// treated as pending so the caller keeps polling instead of giving up.
fn job_state(value: &Value) -> JobState {
    match value.pointer("/status/state").and_then(Value::as_str) {
        Some("DONE") => JobState::Done,
        Some("RUNNING") => JobState::Running,
        _ => JobState::Pending,
    }
}

fn job_errors(value: &Value) -> Vec<String> {
    value
        .pointer("/status/errors")
        .and_then(Value::as_array)
        .map(|errors| {
            errors
                .iter()
                .map(|error| {
                    error
                        .pointer("/message")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .unwrap_or_else(|| error.to_string())
                })
                .collect()
        })
        .unwrap_or_default()
}
