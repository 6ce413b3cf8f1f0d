//! Copies the tables missing from one BigQuery dataset into another.
//!
//! A mirroring run resolves the set of tables present in the source dataset
//! but absent from the destination, then copies each of them through GCS:
//! the table is exported to a staging prefix, loaded into the destination
//! dataset, and the staged files are deleted. Table copies run concurrently
//! on a bounded worker pool and every outcome, success or failure, is
//! reported back to the caller.

pub mod catalog;
pub mod clients;
pub mod error;
mod macros;
pub mod pipeline;
pub mod state;
pub mod storage;
pub mod types;
pub mod warehouse;
pub mod workers;
