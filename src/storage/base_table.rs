//! Base table: the committed row store a transaction's staging buffer
//! flushes into.
//!
//! This stands in for the real row-group-backed `DataTable` the staging
//! subsystem is designed against (see [`crate::storage::local`]). It
//! implements exactly the collaborator interface the flush protocol
//! consumes: reserve-then-append row space, install/remove index entries,
//! and revert a reservation that was never fully installed.

use crate::error::{Result, StorageError};
use crate::index::{KeyIndex, UniqueIndex};
use crate::types::{IndexDef, Row, RowId, TableSchema};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

/// Cursor state for a reserved append region.
///
/// `row_start` is the first row id of the reservation; `current_row`
/// advances as chunks are actually installed, so a failed flush knows
/// exactly which prefix needs compensating removal.
pub struct AppendState {
    pub row_start: RowId,
    pub current_row: RowId,
}

impl AppendState {
    pub fn rows_installed(&self) -> u64 {
        self.current_row - self.row_start
    }
}

/// A committed table: row storage plus its declared unique indexes.
pub struct BaseTable {
    schema: TableSchema,
    rows: RwLock<Vec<Row>>,
    indexes: RwLock<Vec<UniqueIndex>>,
    next_row_id: AtomicU64,
}

impl BaseTable {
    pub fn new(schema: TableSchema) -> Self {
        let indexes = schema
            .unique_indexes()
            .map(|def| build_shadow(def, &schema))
            .collect();

        Self {
            schema,
            rows: RwLock::new(Vec::new()),
            indexes: RwLock::new(indexes),
            next_row_id: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.schema.name
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    pub fn row_count(&self) -> usize {
        self.rows.read().len()
    }

    pub fn row(&self, row_id: RowId) -> Option<Row> {
        self.rows.read().get(row_id as usize).cloned()
    }

    pub fn scan(&self) -> Vec<Row> {
        self.rows.read().clone()
    }

    /// Enumerate this table's index definitions, for shadow construction
    /// in a transaction's local index set.
    pub fn index_defs(&self) -> impl Iterator<Item = &IndexDef> {
        self.schema.unique_indexes()
    }

    /// `InitializeAppend(transaction, state, count)`: reserve `count` row
    /// ids starting at the table's current high-water mark.
    pub fn initialize_append(&self, count: u64) -> AppendState {
        let row_start = self.next_row_id.fetch_add(count, Ordering::SeqCst);
        AppendState {
            row_start,
            current_row: row_start,
        }
    }

    /// `Append(transaction, chunk, state)`: write a chunk at the current
    /// cursor and advance it.
    pub fn append(&self, chunk: &[Row], state: &mut AppendState) {
        let mut rows = self.rows.write();
        rows.extend(chunk.iter().cloned());
        state.current_row += chunk.len() as u64;
    }

    /// `AppendToIndexes(index_set, chunk, base_id) -> bool`: insert each
    /// row's key into every unique index, keyed starting at `base_id`.
    /// Returns `false` on the first conflict, having rolled back whatever
    /// this call itself installed.
    pub fn append_to_indexes(&self, chunk: &[Row], base_id: RowId) -> Result<bool> {
        let mut indexes = self.indexes.write();
        let mut installed: Vec<(usize, Vec<u8>, RowId)> = Vec::new();

        for (offset, row) in chunk.iter().enumerate() {
            let row_id = base_id + offset as u64;
            let mut conflict = false;

            for (idx_pos, index) in indexes.iter_mut().enumerate() {
                let key = index.key_for(row)?;
                match index.insert(key.clone(), row_id) {
                    Ok(true) => installed.push((idx_pos, key, row_id)),
                    Ok(false) => {
                        conflict = true;
                        break;
                    }
                    Err(e) => {
                        for (i, k, r) in installed.drain(..) {
                            indexes[i].remove(&k, r);
                        }
                        return Err(e);
                    }
                }
            }

            if conflict {
                for (i, k, r) in installed.drain(..) {
                    indexes[i].remove(&k, r);
                }
                return Ok(false);
            }
        }

        Ok(true)
    }

    /// `RemoveFromIndexes(state, chunk, current_row)`: compensating removal
    /// for a chunk that starts at `base_id`. Only rows strictly below
    /// `current_row` were ever installed and need removing.
    pub fn remove_from_indexes(&self, chunk: &[Row], base_id: RowId, current_row: RowId) -> Result<()> {
        let mut indexes = self.indexes.write();
        for (offset, row) in chunk.iter().enumerate() {
            let row_id = base_id + offset as u64;
            if row_id >= current_row {
                break;
            }
            for index in indexes.iter_mut() {
                let key = index.key_for(row)?;
                index.remove(&key, row_id);
            }
        }
        Ok(())
    }

    /// `RevertAppendInternal(row_start, count)`: abandon a reservation,
    /// truncating any rows physically written under it.
    pub fn revert_append_internal(&self, row_start: RowId, _count: u64) {
        let mut rows = self.rows.write();
        rows.truncate(row_start as usize);
        self.next_row_id.store(row_start, Ordering::SeqCst);
    }

    /// Committed-row delete, forwarded from the staging façade for row ids
    /// below `MAX_ROW_ID`.
    pub fn delete_committed(&self, row_id: RowId) -> Result<()> {
        let mut rows = self.rows.write();
        let idx = row_id as usize;
        if idx >= rows.len() {
            return Err(StorageError::InvalidData(format!(
                "row {} does not exist in table '{}'",
                row_id, self.schema.name
            )));
        }
        let removed = std::mem::take(&mut rows[idx]);
        drop(rows);
        let mut indexes = self.indexes.write();
        for index in indexes.iter_mut() {
            let key = index.key_for(&removed)?;
            index.remove(&key, row_id);
        }
        Ok(())
    }

    /// Committed-row update, forwarded from the staging façade for row ids
    /// below `MAX_ROW_ID`.
    pub fn update_committed(&self, row_id: RowId, column_ids: &[usize], values: &[crate::types::Value]) -> Result<()> {
        let mut rows = self.rows.write();
        let idx = row_id as usize;
        let row = rows.get_mut(idx).ok_or_else(|| {
            StorageError::InvalidData(format!(
                "row {} does not exist in table '{}'",
                row_id, self.schema.name
            ))
        })?;
        let old_row = row.clone();
        for (&col, value) in column_ids.iter().zip(values) {
            row[col] = value.clone();
        }
        let new_row = row.clone();
        drop(rows);

        let mut indexes = self.indexes.write();
        for index in indexes.iter_mut() {
            if index.columns().iter().any(|c| column_ids.contains(c)) {
                let old_key = index.key_for(&old_row)?;
                index.remove(&old_key, row_id);
                let new_key = index.key_for(&new_row)?;
                if !index.insert(new_key, row_id)? {
                    return Err(StorageError::Constraint(self.schema.name.clone()));
                }
            }
        }
        Ok(())
    }
}

fn build_shadow(def: &IndexDef, schema: &TableSchema) -> UniqueIndex {
    let columns = def
        .columns
        .iter()
        .map(|name| schema.get_column_position(name).expect("index column must exist in schema"))
        .collect();
    UniqueIndex::new(def.name.clone(), columns, def.is_unique)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ColumnDef, ColumnType, IndexDef, Value};

    fn schema() -> TableSchema {
        let mut s = TableSchema::new(
            "t".into(),
            vec![ColumnDef::new("a".into(), ColumnType::Integer, 0)],
        );
        s.add_index(IndexDef::unique("t_a_idx".into(), "t".into(), vec!["a".into()]));
        s
    }

    #[test]
    fn append_reserves_and_writes() {
        let table = BaseTable::new(schema());
        let mut state = table.initialize_append(3);
        assert_eq!(state.row_start, 0);

        let chunk = vec![vec![Value::Integer(1)], vec![Value::Integer(2)], vec![Value::Integer(3)]];
        assert!(table.append_to_indexes(&chunk, state.row_start).unwrap());
        table.append(&chunk, &mut state);

        assert_eq!(table.row_count(), 3);
        assert_eq!(state.current_row, 3);
    }

    #[test]
    fn append_to_indexes_rejects_duplicate_and_rolls_back() {
        let table = BaseTable::new(schema());
        let mut state = table.initialize_append(1);
        table.append(&[vec![Value::Integer(10)]], &mut state);
        table.append_to_indexes(&[vec![Value::Integer(10)]], 0).unwrap();

        let mut state2 = table.initialize_append(2);
        let chunk = vec![vec![Value::Integer(20)], vec![Value::Integer(10)]];
        let ok = table.append_to_indexes(&chunk, state2.row_start).unwrap();
        assert!(!ok);

        // the 20 key must have been rolled back: a later index for it succeeds.
        let reinsert = table.append_to_indexes(&[vec![Value::Integer(20)]], state2.row_start).unwrap();
        assert!(reinsert);
        table.revert_append_internal(state2.row_start, 2);
        let _ = &mut state2;
    }

    #[test]
    fn revert_append_truncates_rows() {
        let table = BaseTable::new(schema());
        let mut state = table.initialize_append(2);
        table.append(&[vec![Value::Integer(1)], vec![Value::Integer(2)]], &mut state);
        table.revert_append_internal(state.row_start, 2);
        assert_eq!(table.row_count(), 0);

        let mut state2 = table.initialize_append(1);
        assert_eq!(state2.row_start, 0);
        table.append(&[vec![Value::Integer(5)]], &mut state2);
        assert_eq!(table.row_count(), 1);
    }

    #[test]
    fn delete_committed_removes_row_and_index_entry() {
        let table = BaseTable::new(schema());
        let mut state = table.initialize_append(1);
        table.append_to_indexes(&[vec![Value::Integer(7)]], 0).unwrap();
        table.append(&[vec![Value::Integer(7)]], &mut state);

        table.delete_committed(0).unwrap();
        let reinsert = table.append_to_indexes(&[vec![Value::Integer(7)]], 5).unwrap();
        assert!(reinsert);
    }
}
