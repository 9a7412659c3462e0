//! Local Storage: the per-transaction staging façade.
//!
//! Maps base-table identity to [`LocalTableStorage`] and exposes
//! append/scan/delete/update/flush/commit to the executor and transaction
//! manager. Single-writer-per-transaction: every method takes `&mut self`
//! and there is no internal locking (§5).

use crate::error::{Result, StorageError};
use crate::storage::base_table::BaseTable;
use crate::storage::local::flush::{flush, FlushResult};
use crate::storage::local::row_group::ParallelScanState;
use crate::storage::local::table_storage::LocalTableStorage;
use crate::types::{Row, RowId, Value, MAX_ROW_ID};
use std::collections::HashMap;
use std::sync::Arc;

pub struct LocalStorage {
    tables: HashMap<String, LocalTableStorage>,
}

impl LocalStorage {
    pub fn new() -> Self {
        Self {
            tables: HashMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn staged_table_names(&self) -> impl Iterator<Item = &String> {
        self.tables.keys()
    }

    /// On failure, leaves `self` exactly as it was before the call (§4.3):
    /// if this table had no staging entry yet, the entry created to attempt
    /// the append is removed again rather than left behind empty.
    pub fn append(&mut self, table: &Arc<BaseTable>, batch: &[Row]) -> Result<()> {
        let table_name = table.name().to_string();
        let is_new = !self.tables.contains_key(&table_name);
        let storage = self
            .tables
            .entry(table_name.clone())
            .or_insert_with(|| LocalTableStorage::new(table.clone()));
        let result = storage.append(batch);
        if result.is_err() && is_new {
            self.tables.remove(&table_name);
        }
        result
    }

    pub fn scan(&self, table_name: &str) -> Vec<(RowId, Row)> {
        self.tables
            .get(table_name)
            .map(|t| t.scan())
            .unwrap_or_default()
    }

    /// `InitializeParallelScan`: an empty partitioning when the table has
    /// no staging entry at all, per the design notes.
    pub fn initialize_parallel_scan(&self, table_name: &str) -> ParallelScanState {
        self.tables
            .get(table_name)
            .map(|t| t.initialize_parallel_scan())
            .unwrap_or_else(ParallelScanState::empty)
    }

    /// `NextParallelScan`'s yield for a partition claimed via
    /// [`Self::initialize_parallel_scan`]'s `ParallelScanState`.
    pub fn scan_group(&self, table_name: &str, idx: usize) -> Vec<(RowId, Row)> {
        self.tables
            .get(table_name)
            .map(|t| t.scan_group(idx))
            .unwrap_or_default()
    }

    /// Delete or update a row identified by `row_id`: committed rows
    /// (`row_id < MAX_ROW_ID`) forward to the base table's transactional
    /// path; staged rows (`row_id >= MAX_ROW_ID`) mutate this
    /// transaction's staging collection directly.
    pub fn delete(&mut self, table: &Arc<BaseTable>, row_id: RowId) -> Result<()> {
        if row_id < MAX_ROW_ID {
            table.delete_committed(row_id)
        } else {
            let storage = self.tables.get_mut(table.name()).ok_or_else(|| {
                StorageError::InvalidData(format!("no staged rows for table '{}'", table.name()))
            })?;
            storage.delete_local(row_id)
        }
    }

    pub fn update(
        &mut self,
        table: &Arc<BaseTable>,
        row_id: RowId,
        column_ids: &[usize],
        values: &[Value],
    ) -> Result<()> {
        if row_id < MAX_ROW_ID {
            table.update_committed(row_id, column_ids, values)
        } else {
            let storage = self.tables.get_mut(table.name()).ok_or_else(|| {
                StorageError::InvalidData(format!("no staged rows for table '{}'", table.name()))
            })?;
            storage.update_local(row_id, column_ids, values)
        }
    }

    pub fn added_rows(&self, table_name: &str) -> u64 {
        self.tables.get(table_name).map(|t| t.added_rows()).unwrap_or(0)
    }

    pub fn estimated_size(&self, row_byte_size: &dyn Fn(&str) -> usize) -> usize {
        self.tables
            .iter()
            .map(|(name, storage)| storage.estimated_size(row_byte_size(name)))
            .sum()
    }

    /// Schema evolution with staged data present: re-materialize the
    /// staging collection under the extended schema, filling `default`
    /// into the new column on every staged row. A no-op if the table has
    /// no staging entry.
    pub fn add_column(&mut self, table_name: &str, default: Value) {
        if let Some(storage) = self.tables.get_mut(table_name) {
            storage.add_column(default);
        }
    }

    /// Apply a type change across staged data. Fails cleanly, without
    /// touching the staging collection, if any staged value doesn't cast.
    pub fn change_type(
        &mut self,
        table_name: &str,
        column: usize,
        caster: impl Fn(&Value) -> Result<Value>,
    ) -> Result<()> {
        match self.tables.get_mut(table_name) {
            Some(storage) => storage.change_type(column, caster),
            None => Ok(()),
        }
    }

    /// Flush one staged table into its base table, per §4.4. On success
    /// or constraint failure the table's `LocalTableStorage` is gone from
    /// this `LocalStorage` either way.
    pub fn flush_table(&mut self, table: &Arc<BaseTable>) -> Result<Option<FlushResult>> {
        let storage = match self.tables.remove(table.name()) {
            Some(s) => s,
            None => return Ok(None),
        };
        flush(table, storage)
    }

    /// Drain every staged table name. Buffered up front rather than
    /// removed while iterating the map, per the design notes' warning
    /// about erasing a table's entry mid-iteration in `Commit`.
    pub fn staged_table_names_snapshot(&self) -> Vec<String> {
        self.tables.keys().cloned().collect()
    }

    /// Discard all staged state, as on transaction abort.
    pub fn clear(&mut self) {
        self.tables.clear();
    }
}

impl Default for LocalStorage {
    fn default() -> Self {
        Self::new()
    }
}
