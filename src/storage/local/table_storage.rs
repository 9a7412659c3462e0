//! Local Table Storage: one (transaction, table) pair's staged writes.
//!
//! Owns the row group collection, the shadow index set, and column stats
//! for a single base table within one transaction. Constructed lazily on
//! the table's first `Append` (see [`super::local_storage::LocalStorage`]).

use crate::error::{Result, StorageError};
use crate::storage::base_table::BaseTable;
use crate::storage::local::index_set::LocalIndexSet;
use crate::storage::local::row_group::{ParallelScanState, RowGroupCollection};
use crate::storage::local::stats::ColumnStatsAccumulator;
use crate::types::{Row, RowId, Value, MAX_ROW_ID};
use std::sync::Arc;

pub struct LocalTableStorage {
    table: Arc<BaseTable>,
    rows: RowGroupCollection,
    indexes: LocalIndexSet,
    stats: ColumnStatsAccumulator,
    deleted_rows: u64,
}

impl LocalTableStorage {
    pub fn new(table: Arc<BaseTable>) -> Self {
        let num_columns = table.schema().column_count();
        let indexes = LocalIndexSet::for_table(&table);
        Self {
            table,
            rows: RowGroupCollection::new(),
            indexes,
            stats: ColumnStatsAccumulator::new(num_columns),
            deleted_rows: 0,
        }
    }

    pub fn table(&self) -> &Arc<BaseTable> {
        &self.table
    }

    pub fn total_rows(&self) -> u64 {
        self.rows.total_rows()
    }

    pub fn deleted_rows(&self) -> u64 {
        self.deleted_rows
    }

    /// `total_rows - deleted_rows`: what a flush will actually install.
    pub fn added_rows(&self) -> u64 {
        self.rows.total_rows() - self.deleted_rows
    }

    pub fn append(&mut self, batch: &[Row]) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let base_id = self.rows.next_local_id();
        if !self.indexes.try_append(batch, base_id)? {
            return Err(StorageError::Constraint(self.table.name().to_string()));
        }
        self.rows.append(batch);
        for row in batch {
            self.stats.observe_row(row);
        }
        Ok(())
    }

    pub fn scan(&self) -> Vec<(RowId, Row)> {
        self.rows.scan_live()
    }

    pub fn initialize_parallel_scan(&self) -> ParallelScanState {
        ParallelScanState::new(&self.rows)
    }

    /// `NextParallelScan`'s yield: the live rows of the row group at `idx`,
    /// as claimed from a [`ParallelScanState`] returned by
    /// [`Self::initialize_parallel_scan`].
    pub fn scan_group(&self, idx: usize) -> Vec<(RowId, Row)> {
        self.rows.group_live_rows(idx)
    }

    /// Rows whose keys were actually installed, chunked by row group, in
    /// append order, with deleted rows already filtered out.
    pub fn live_chunks(&self) -> Vec<Vec<Row>> {
        self.rows.live_chunks()
    }

    pub fn delete_local(&mut self, row_id: RowId) -> Result<()> {
        if row_id < MAX_ROW_ID {
            return Err(StorageError::InvalidData(format!(
                "row {} is not a staged row",
                row_id
            )));
        }
        if self.rows.is_deleted(row_id) {
            return Ok(());
        }
        let row = self
            .rows
            .row(row_id)
            .cloned()
            .ok_or_else(|| StorageError::InvalidData(format!("staged row {} not found", row_id)))?;
        self.indexes.remove(&row, row_id)?;
        self.rows.mark_deleted(row_id);
        self.deleted_rows += 1;
        Ok(())
    }

    pub fn update_local(&mut self, row_id: RowId, column_ids: &[usize], values: &[Value]) -> Result<()> {
        if row_id < MAX_ROW_ID {
            return Err(StorageError::InvalidData(format!(
                "row {} is not a staged row",
                row_id
            )));
        }
        let old_row = self
            .rows
            .row(row_id)
            .cloned()
            .ok_or_else(|| StorageError::InvalidData(format!("staged row {} not found", row_id)))?;

        let mut new_row = old_row.clone();
        for (&col, value) in column_ids.iter().zip(values) {
            new_row[col] = value.clone();
        }

        if !self.indexes.replace(&old_row, &new_row, row_id)? {
            return Err(StorageError::Constraint(self.table.name().to_string()));
        }

        *self.rows.row_mut(row_id).expect("checked above") = new_row;
        Ok(())
    }

    pub fn estimated_size(&self, row_byte_size: usize) -> usize {
        self.added_rows() as usize * row_byte_size
    }

    /// Re-materialize staging under a schema with one extra column,
    /// filling it with `default` on every staged row.
    pub fn add_column(&mut self, default: Value) {
        self.rows.add_column(default);
        self.stats.add_column();
    }

    /// Apply a type cast to `column` across all staged rows. Fails
    /// without mutating anything if any current value doesn't cast.
    pub fn change_type(&mut self, column: usize, caster: impl Fn(&Value) -> Result<Value>) -> Result<()> {
        self.rows.cast_column(column, caster)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ColumnDef, ColumnType, IndexDef, TableSchema};

    fn table() -> Arc<BaseTable> {
        let mut schema = TableSchema::new(
            "t".into(),
            vec![ColumnDef::new("a".into(), ColumnType::Integer, 0)],
        );
        schema.add_index(IndexDef::unique("t_a_idx".into(), "t".into(), vec!["a".into()]));
        Arc::new(BaseTable::new(schema))
    }

    #[test]
    fn append_then_scan_yields_appended_rows() {
        let mut local = LocalTableStorage::new(table());
        local
            .append(&[vec![Value::Integer(1)], vec![Value::Integer(2)], vec![Value::Integer(3)]])
            .unwrap();

        let scanned: Vec<Value> = local.scan().into_iter().map(|(_, r)| r[0].clone()).collect();
        assert_eq!(scanned, vec![Value::Integer(1), Value::Integer(2), Value::Integer(3)]);
        assert_eq!(local.added_rows(), 3);
    }

    #[test]
    fn intra_transaction_duplicate_is_rejected_but_state_unchanged() {
        let mut local = LocalTableStorage::new(table());
        local.append(&[vec![Value::Integer(1)], vec![Value::Integer(2)]]).unwrap();
        assert!(local.append(&[vec![Value::Integer(2)]]).is_err());
        assert_eq!(local.total_rows(), 2);

        local.append(&[vec![Value::Integer(3)]]).unwrap();
        assert_eq!(local.total_rows(), 3);
    }

    #[test]
    fn delete_staged_row_updates_added_rows() {
        let mut local = LocalTableStorage::new(table());
        local
            .append(&[vec![Value::Integer(1)], vec![Value::Integer(2)], vec![Value::Integer(3)]])
            .unwrap();
        let to_delete = local.scan()[1].0;
        local.delete_local(to_delete).unwrap();
        assert_eq!(local.added_rows(), 2);
    }

    #[test]
    fn parallel_scan_claims_yield_every_staged_row() {
        let mut local = LocalTableStorage::new(table());
        local
            .append(&[vec![Value::Integer(1)], vec![Value::Integer(2)], vec![Value::Integer(3)]])
            .unwrap();

        let scan = local.initialize_parallel_scan();
        let mut collected = Vec::new();
        while let Some(idx) = scan.claim_next() {
            collected.extend(local.scan_group(idx));
        }
        assert_eq!(collected.len(), 3);
    }

    #[test]
    fn size_estimate_scales_with_added_rows() {
        let mut local = LocalTableStorage::new(table());
        let batch: Vec<Row> = (0..100).map(|i| vec![Value::Integer(i)]).collect();
        local.append(&batch).unwrap();
        assert_eq!(local.estimated_size(16), 1600);

        for i in 0..40 {
            let id = local.scan()[i].0;
            local.delete_local(id).unwrap();
        }
        assert_eq!(local.estimated_size(16), 60 * 16);
    }
}
