use std::error::Error;
use std::fmt;

/// Result type used throughout the crate.
pub type MirrorResult<T> = Result<T, MirrorError>;

/// Classifies a [`MirrorError`] by its origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The supplied configuration is invalid.
    ConfigError,
    /// An input value failed validation, e.g. a malformed filter pattern.
    ValidationError,
    /// The warehouse rejected a request or returned an unexpected response.
    WarehouseError,
    /// The object store rejected a request or returned an unexpected
    /// response.
    StorageError,
    /// A remote job finished in an error state.
    JobFailed,
    /// An operation was attempted in a state that does not allow it.
    InvalidState,
    /// A worker task panicked or was aborted.
    WorkerPanic,
    /// Serializing or deserializing a payload failed.
    SerializationError,
    /// An error that does not fit any other kind.
    Unknown,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::ConfigError => "config error",
            ErrorKind::ValidationError => "validation error",
            ErrorKind::WarehouseError => "warehouse error",
            ErrorKind::StorageError => "storage error",
            ErrorKind::JobFailed => "job failed",
            ErrorKind::InvalidState => "invalid state",
            ErrorKind::WorkerPanic => "worker panic",
            ErrorKind::SerializationError => "serialization error",
            ErrorKind::Unknown => "unknown error",
        };

        write!(f, "{name}")
    }
}

/// Error type used throughout the crate.
///
/// Carries a kind, a static description and an optional detail string.
/// Multiple errors can be aggregated into a single [`MirrorError`] when
/// several independent operations fail, e.g. across workers in a pool.
#[derive(Debug, Clone)]
pub struct MirrorError {
    repr: ErrorRepr,
}

#[derive(Debug, Clone)]
enum ErrorRepr {
    WithDescription(ErrorKind, &'static str),
    WithDescriptionAndDetail(ErrorKind, &'static str, String),
    Many(Vec<MirrorError>),
}

impl MirrorError {
    /// Returns the kind of this error.
    ///
    /// For aggregated errors the kind of the first inner error is returned,
    /// or [`ErrorKind::Unknown`] when the aggregate is empty.
    pub fn kind(&self) -> ErrorKind {
        match &self.repr {
            ErrorRepr::WithDescription(kind, _) => *kind,
            ErrorRepr::WithDescriptionAndDetail(kind, _, _) => *kind,
            ErrorRepr::Many(errors) => {
                errors.first().map(MirrorError::kind).unwrap_or(ErrorKind::Unknown)
            }
        }
    }

    /// Returns the kinds of all errors contained in this error.
    pub fn kinds(&self) -> Vec<ErrorKind> {
        match &self.repr {
            ErrorRepr::WithDescription(kind, _) => vec![*kind],
            ErrorRepr::WithDescriptionAndDetail(kind, _, _) => vec![*kind],
            ErrorRepr::Many(errors) => errors.iter().flat_map(MirrorError::kinds).collect(),
        }
    }

    /// Returns the detail string of this error, if any.
    pub fn detail(&self) -> Option<&str> {
        match &self.repr {
            ErrorRepr::WithDescription(_, _) => None,
            ErrorRepr::WithDescriptionAndDetail(_, _, detail) => Some(detail),
            ErrorRepr::Many(_) => None,
        }
    }

    /// Aggregates multiple errors into one.
    pub fn many(errors: Vec<MirrorError>) -> MirrorError {
        MirrorError {
            repr: ErrorRepr::Many(errors),
        }
    }
}

impl fmt::Display for MirrorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.repr {
            ErrorRepr::WithDescription(kind, description) => {
                write!(f, "{kind}: {description}")
            }
            ErrorRepr::WithDescriptionAndDetail(kind, description, detail) => {
                write!(f, "{kind}: {description} ({detail})")
            }
            ErrorRepr::Many(errors) => {
                write!(f, "multiple errors occurred:")?;
                for error in errors {
                    write!(f, "\n  - {error}")?;
                }
                Ok(())
            }
        }
    }
}

impl Error for MirrorError {}

/// Two errors are equal when they carry the same kinds, regardless of
/// descriptions and details.
impl PartialEq for MirrorError {
    fn eq(&self, other: &Self) -> bool {
        self.kinds() == other.kinds()
    }
}

impl From<(ErrorKind, &'static str)> for MirrorError {
    fn from((kind, description): (ErrorKind, &'static str)) -> Self {
        MirrorError {
            repr: ErrorRepr::WithDescription(kind, description),
        }
    }
}

impl From<(ErrorKind, &'static str, String)> for MirrorError {
    fn from((kind, description, detail): (ErrorKind, &'static str, String)) -> Self {
        MirrorError {
            repr: ErrorRepr::WithDescriptionAndDetail(kind, description, detail),
        }
    }
}

impl<E> From<Vec<E>> for MirrorError
where
    E: Into<MirrorError>,
{
    fn from(errors: Vec<E>) -> Self {
        MirrorError::many(errors.into_iter().map(Into::into).collect())
    }
}

impl From<serde_json::Error> for MirrorError {
    fn from(error: serde_json::Error) -> Self {
        MirrorError {
            repr: ErrorRepr::WithDescriptionAndDetail(
                ErrorKind::SerializationError,
                "failed to serialize or deserialize a payload",
                error.to_string(),
            ),
        }
    }
}

impl From<regex::Error> for MirrorError {
    fn from(error: regex::Error) -> Self {
        MirrorError {
            repr: ErrorRepr::WithDescriptionAndDetail(
                ErrorKind::ValidationError,
                "invalid table filter pattern",
                error.to_string(),
            ),
        }
    }
}

impl From<bqmirror_config::ValidationError> for MirrorError {
    fn from(error: bqmirror_config::ValidationError) -> Self {
        MirrorError {
            repr: ErrorRepr::WithDescriptionAndDetail(
                ErrorKind::ConfigError,
                "invalid mirror configuration",
                error.to_string(),
            ),
        }
    }
}

#[cfg(feature = "bigquery")]
impl From<gcp_bigquery_client::error::BQError> for MirrorError {
    fn from(error: gcp_bigquery_client::error::BQError) -> Self {
        MirrorError {
            repr: ErrorRepr::WithDescriptionAndDetail(
                ErrorKind::WarehouseError,
                "a BigQuery operation failed",
                error.to_string(),
            ),
        }
    }
}
