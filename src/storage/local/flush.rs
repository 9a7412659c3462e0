//! Flush protocol (§4.4): drains one table's staged rows into its base
//! table, under the committing transaction's write lock on that table.

use crate::error::{Result, StorageError};
use crate::storage::base_table::BaseTable;
use crate::storage::local::table_storage::LocalTableStorage;
use crate::types::{Row, RowId};

/// What happened when a table's staging was flushed.
///
/// Returned so the caller (the commit orchestrator) can log the append
/// event on the write-ahead log; logging isn't done here so that flush
/// stays independent of the WAL's presence, keeping storage mutation
/// separate from its WAL record.
pub struct FlushResult {
    pub table_name: String,
    pub row_start: RowId,
    pub appended_rows: u64,
}

/// Drain `local` into `table`. Consumes `local`: whether this call
/// succeeds or raises a constraint violation, the `LocalTableStorage` is
/// dropped at the end, so no local identifier outlives a flush attempt.
pub fn flush(table: &BaseTable, local: LocalTableStorage) -> Result<Option<FlushResult>> {
    let appended_rows = local.added_rows();
    if appended_rows == 0 {
        return Ok(None);
    }

    let mut state = table.initialize_append(appended_rows);
    let row_start = state.row_start;
    let mut installed: Vec<(Vec<Row>, RowId)> = Vec::new();
    let mut constraint_violated = false;

    for chunk in local.live_chunks() {
        if chunk.is_empty() {
            continue;
        }
        let base_id = state.current_row;
        match table.append_to_indexes(&chunk, base_id)? {
            true => {
                table.append(&chunk, &mut state);
                installed.push((chunk, base_id));
            }
            false => {
                constraint_violated = true;
                break;
            }
        }
    }

    if constraint_violated {
        for (chunk, base_id) in &installed {
            table.remove_from_indexes(chunk, *base_id, state.current_row)?;
        }
        table.revert_append_internal(row_start, appended_rows);
        return Err(StorageError::Constraint(table.name().to_string()));
    }

    Ok(Some(FlushResult {
        table_name: table.name().to_string(),
        row_start,
        appended_rows,
    }))
}
