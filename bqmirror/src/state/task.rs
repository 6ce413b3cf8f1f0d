use std::fmt;

use crate::error::MirrorError;
use crate::types::{JobHandle, TableRef};

/// Phase of a single table copy.
///
/// A copy moves forward through the non-terminal phases in order and ends in
/// either [`CopyPhase::Completed`] or [`CopyPhase::Failed`]. Phases never
/// move backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyPhase {
    /// Submit the extract job that exports the source table to staging.
    Extract,
    /// Poll the extract job until it finishes.
    WaitForExtract,
    /// Submit the load job that imports the staged files.
    Load,
    /// Poll the load job until it finishes.
    WaitForLoad,
    /// Delete the staged files.
    Cleanup,
    /// The table was copied and staging was cleaned up.
    Completed,
    /// The copy failed and was abandoned.
    Failed,
}

impl CopyPhase {
    /// Returns the position of this phase in the forward progression, or
    /// `None` for [`CopyPhase::Failed`], which can be entered from any
    /// non-terminal phase.
    pub fn step_index(&self) -> Option<usize> {
        match self {
            CopyPhase::Extract => Some(0),
            CopyPhase::WaitForExtract => Some(1),
            CopyPhase::Load => Some(2),
            CopyPhase::WaitForLoad => Some(3),
            CopyPhase::Cleanup => Some(4),
            CopyPhase::Completed => Some(5),
            CopyPhase::Failed => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, CopyPhase::Completed | CopyPhase::Failed)
    }
}

impl fmt::Display for CopyPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CopyPhase::Extract => write!(f, "extract"),
            CopyPhase::WaitForExtract => write!(f, "wait_for_extract"),
            CopyPhase::Load => write!(f, "load"),
            CopyPhase::WaitForLoad => write!(f, "wait_for_load"),
            CopyPhase::Cleanup => write!(f, "cleanup"),
            CopyPhase::Completed => write!(f, "completed"),
            CopyPhase::Failed => write!(f, "failed"),
        }
    }
}

/// State of a single table copy as it moves through its phases.
#[derive(Debug, Clone)]
pub struct CopyTask {
    pub source: TableRef,
    pub destination: TableRef,
    pub staging_bucket: String,
    pub phase: CopyPhase,
    /// Handle to the job currently being waited on, if any.
    pub job: Option<JobHandle>,
    /// Wildcard URI the extract job writes to.
    pub extract_uri: Option<String>,
    /// Object name prefix of the staged files within the bucket.
    pub staging_prefix: Option<String>,
    /// Cause of failure, set once the task enters [`CopyPhase::Failed`].
    pub failure: Option<MirrorError>,
}

impl CopyTask {
    pub fn new(source: TableRef, destination: TableRef, staging_bucket: impl Into<String>) -> CopyTask {
        CopyTask {
            source,
            destination,
            staging_bucket: staging_bucket.into(),
            phase: CopyPhase::Extract,
            job: None,
            extract_uri: None,
            staging_prefix: None,
            failure: None,
        }
    }

    /// Returns this task moved into the given phase.
    pub fn advanced(mut self, phase: CopyPhase) -> CopyTask {
        self.phase = phase;
        self
    }

    /// Returns this task moved into [`CopyPhase::Failed`] with the given
    /// cause.
    pub fn failed(mut self, cause: MirrorError) -> CopyTask {
        self.phase = CopyPhase::Failed;
        self.failure = Some(cause);
        self
    }

    pub fn is_completed(&self) -> bool {
        self.phase == CopyPhase::Completed
    }

    pub fn is_failed(&self) -> bool {
        self.phase == CopyPhase::Failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::mirror_error;

    fn task() -> CopyTask {
        CopyTask::new(
            TableRef::new("src", "events", "t1"),
            TableRef::new("dst", "events", "t1"),
            "gs://staging",
        )
    }

    #[test]
    fn new_task_starts_in_extract() {
        let task = task();

        assert_eq!(task.phase, CopyPhase::Extract);
        assert!(task.job.is_none());
        assert!(task.failure.is_none());
        assert!(!task.phase.is_terminal());
    }

    #[test]
    fn phase_indices_are_strictly_increasing() {
        let ordered = [
            CopyPhase::Extract,
            CopyPhase::WaitForExtract,
            CopyPhase::Load,
            CopyPhase::WaitForLoad,
            CopyPhase::Cleanup,
            CopyPhase::Completed,
        ];

        for pair in ordered.windows(2) {
            assert!(pair[0].step_index() < pair[1].step_index());
        }
        assert_eq!(CopyPhase::Failed.step_index(), None);
    }

    #[test]
    fn only_completed_and_failed_are_terminal() {
        assert!(CopyPhase::Completed.is_terminal());
        assert!(CopyPhase::Failed.is_terminal());
        assert!(!CopyPhase::Cleanup.is_terminal());
        assert!(!CopyPhase::WaitForLoad.is_terminal());
    }

    #[test]
    fn failed_task_records_cause() {
        let task = task().failed(mirror_error!(ErrorKind::JobFailed, "extract blew up"));

        assert!(task.is_failed());
        assert_eq!(task.failure.as_ref().map(|e| e.kind()), Some(ErrorKind::JobFailed));
    }
}
