#[cfg(feature = "bigquery")]
pub mod bigquery;
#[cfg(feature = "gcs")]
pub mod gcs;
