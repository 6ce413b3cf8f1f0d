use std::collections::HashSet;

use regex::Regex;
use tracing::debug;

use crate::error::MirrorResult;
use crate::types::TableRef;
use crate::warehouse::Warehouse;

/// Computes the tables that exist in the source dataset but not in the
/// destination dataset.
///
/// Both listings are filtered with `name_pattern` before the difference is
/// taken, so a destination table outside the pattern never suppresses a
/// source table. The pattern must match the whole table name. Membership is
/// decided by table name alone because the datasets live in different
/// projects.
///
/// The result is sorted by table name in descending order and truncated to
/// `limit` entries. Datasets named after dates sort newest first, so the
/// most recent missing tables are copied when the limit cuts the list.
pub async fn resolve_targets<W: Warehouse>(
    warehouse: &W,
    source_project: &str,
    source_dataset: &str,
    destination_project: &str,
    destination_dataset: &str,
    name_pattern: Option<&str>,
    limit: usize,
) -> MirrorResult<Vec<TableRef>> {
    let filter = match name_pattern {
        Some(pattern) => Some(Regex::new(&format!("\\A(?:{pattern})\\z"))?),
        None => None,
    };

    let matches = |table: &TableRef| {
        filter
            .as_ref()
            .map(|re| re.is_match(&table.table))
            .unwrap_or(true)
    };

    let source_tables: Vec<TableRef> = warehouse
        .list_tables(source_project, source_dataset)
        .await?
        .into_iter()
        .filter(matches)
        .collect();

    let destination_names: HashSet<String> = warehouse
        .list_tables(destination_project, destination_dataset)
        .await?
        .into_iter()
        .filter(matches)
        .map(|table| table.table)
        .collect();

    let mut missing: Vec<TableRef> = source_tables
        .into_iter()
        .filter(|table| !destination_names.contains(&table.table))
        .collect();

    missing.sort_by(|a, b| b.table.cmp(&a.table));

    debug!(
        source = source_dataset,
        destination = destination_dataset,
        missing = missing.len(),
        limit,
        "resolved missing tables"
    );

    missing.truncate(limit);

    Ok(missing)
}
