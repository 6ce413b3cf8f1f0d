use std::fmt;

use serde::{Deserialize, Serialize};

/// Fully qualified reference to a BigQuery table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableRef {
    pub project: String,
    pub dataset: String,
    pub table: String,
}

impl TableRef {
    pub fn new(
        project: impl Into<String>,
        dataset: impl Into<String>,
        table: impl Into<String>,
    ) -> TableRef {
        TableRef {
            project: project.into(),
            dataset: dataset.into(),
            table: table.into(),
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.project, self.dataset, self.table)
    }
}

/// Lifecycle state of a remote warehouse job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Running,
    Done,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Pending => write!(f, "pending"),
            JobState::Running => write!(f, "running"),
            JobState::Done => write!(f, "done"),
        }
    }
}

/// Handle to a remote job, returned when the job is submitted and used to
/// poll its status afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle {
    pub id: String,
    pub project: String,
    pub state: JobState,
}

impl JobHandle {
    pub fn new(id: impl Into<String>, project: impl Into<String>, state: JobState) -> JobHandle {
        JobHandle {
            id: id.into(),
            project: project.into(),
            state,
        }
    }
}

/// Status of a remote job as observed by a single poll.
///
/// A job is only successful when its state is [`JobState::Done`] and the
/// error list is empty. A done job with errors has failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobStatus {
    pub state: JobState,
    pub errors: Vec<String>,
}

impl JobStatus {
    pub fn pending() -> JobStatus {
        JobStatus {
            state: JobState::Pending,
            errors: Vec::new(),
        }
    }

    pub fn running() -> JobStatus {
        JobStatus {
            state: JobState::Running,
            errors: Vec::new(),
        }
    }

    pub fn done() -> JobStatus {
        JobStatus {
            state: JobState::Done,
            errors: Vec::new(),
        }
    }

    pub fn failed(errors: Vec<String>) -> JobStatus {
        JobStatus {
            state: JobState::Done,
            errors,
        }
    }

    pub fn is_successful(&self) -> bool {
        self.state == JobState::Done && self.errors.is_empty()
    }
}

/// Identifies an object in a GCS bucket.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlobId {
    pub bucket: String,
    pub name: String,
}

impl BlobId {
    pub fn new(bucket: impl Into<String>, name: impl Into<String>) -> BlobId {
        BlobId {
            bucket: bucket.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for BlobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bucket, self.name)
    }
}

/// Whether a load job may create its destination table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateDisposition {
    CreateIfNeeded,
    CreateNever,
}

impl CreateDisposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            CreateDisposition::CreateIfNeeded => "CREATE_IF_NEEDED",
            CreateDisposition::CreateNever => "CREATE_NEVER",
        }
    }
}

/// How a load job treats existing data in its destination table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteDisposition {
    /// Fail the job unless the destination table is empty. Guarantees that a
    /// failed load leaves no partial data behind.
    WriteEmpty,
    WriteAppend,
    WriteTruncate,
}

impl WriteDisposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            WriteDisposition::WriteEmpty => "WRITE_EMPTY",
            WriteDisposition::WriteAppend => "WRITE_APPEND",
            WriteDisposition::WriteTruncate => "WRITE_TRUNCATE",
        }
    }
}

/// Full description of a load job to submit to the warehouse.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadJobSpec {
    pub destination: TableRef,
    /// Table schema as returned by the warehouse for the source table.
    pub schema: serde_json::Value,
    pub source_uris: Vec<String>,
    pub create_disposition: CreateDisposition,
    pub write_disposition: WriteDisposition,
}
