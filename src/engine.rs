//! Engine: wires the transaction coordinator, write-ahead log, table
//! catalog, and per-transaction staging buffers into the surface an
//! executor drives.
//!
//! This is the `Commit(commit_state, transaction, wal, commit_id)`
//! orchestrator of §4.5: it owns one [`LocalStorage`] per active
//! transaction and, on commit, flushes every staged table into its base
//! table in turn, logging each successful flush to the write-ahead log.

use crate::catalog::TableRegistry;
use crate::config::DBConfig;
use crate::error::{Result, StorageError};
use crate::storage::base_table::BaseTable;
use crate::storage::local::LocalStorage;
use crate::txn::version_store::Timestamp;
use crate::txn::{IsolationLevel, LockManager, TransactionCoordinator, TransactionId, VersionStore, WALManager};
use crate::types::{PartitionId, Row, RowId, TableSchema, Value};
use dashmap::DashMap;
use std::hash::{Hash, Hasher};
use std::path::Path;
use std::sync::Arc;

pub struct Engine {
    config: DBConfig,
    registry: TableRegistry,
    tables: DashMap<String, Arc<BaseTable>>,
    coordinator: TransactionCoordinator,
    locks: LockManager,
    wal: WALManager,
    staging: DashMap<TransactionId, LocalStorage>,
}

impl Engine {
    pub fn open<P: AsRef<Path>>(data_dir: P, config: DBConfig) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        let registry = TableRegistry::new(data_dir)?;
        let version_store = Arc::new(VersionStore::new());
        let wal = WALManager::create_with_config(
            data_dir.join(&config.wal_config.wal_dir),
            config.num_partitions,
            config.wal_config.clone().into(),
        )?;

        let tables = DashMap::new();
        for name in registry.list_tables()? {
            let schema = registry.get_table(&name)?;
            tables.insert(name, Arc::new(BaseTable::new(schema)));
        }

        Ok(Self {
            config,
            registry,
            tables,
            coordinator: TransactionCoordinator::new(version_store),
            locks: LockManager::new(),
            wal,
            staging: DashMap::new(),
        })
    }

    pub fn create_table(&self, schema: TableSchema) -> Result<()> {
        self.registry.create_table(schema.clone())?;
        self.tables
            .insert(schema.name.clone(), Arc::new(BaseTable::new(schema)));
        Ok(())
    }

    fn table(&self, name: &str) -> Result<Arc<BaseTable>> {
        self.tables
            .get(name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| StorageError::TableNotFound(name.to_string()))
    }

    fn staging_err(txn_id: TransactionId) -> StorageError {
        StorageError::Transaction(format!("transaction {} not found", txn_id))
    }

    pub fn begin(&self, isolation_level: IsolationLevel) -> Result<TransactionId> {
        let txn_id = self.coordinator.begin(isolation_level)?;
        self.staging.insert(txn_id, LocalStorage::new());
        Ok(txn_id)
    }

    pub fn append(&self, txn_id: TransactionId, table_name: &str, batch: &[Row]) -> Result<()> {
        let table = self.table(table_name)?;
        let mut staging = self
            .staging
            .get_mut(&txn_id)
            .ok_or_else(|| Self::staging_err(txn_id))?;
        staging.append(&table, batch)
    }

    pub fn scan(&self, txn_id: TransactionId, table_name: &str) -> Result<Vec<(RowId, Row)>> {
        let staging = self
            .staging
            .get(&txn_id)
            .ok_or_else(|| Self::staging_err(txn_id))?;
        Ok(staging.scan(table_name))
    }

    pub fn delete(&self, txn_id: TransactionId, table_name: &str, row_id: RowId) -> Result<()> {
        let table = self.table(table_name)?;
        let mut staging = self
            .staging
            .get_mut(&txn_id)
            .ok_or_else(|| Self::staging_err(txn_id))?;
        staging.delete(&table, row_id)
    }

    pub fn update(
        &self,
        txn_id: TransactionId,
        table_name: &str,
        row_id: RowId,
        column_ids: &[usize],
        values: &[Value],
    ) -> Result<()> {
        let table = self.table(table_name)?;
        let mut staging = self
            .staging
            .get_mut(&txn_id)
            .ok_or_else(|| Self::staging_err(txn_id))?;
        staging.update(&table, row_id, column_ids, values)
    }

    pub fn added_rows(&self, txn_id: TransactionId, table_name: &str) -> Result<u64> {
        let staging = self
            .staging
            .get(&txn_id)
            .ok_or_else(|| Self::staging_err(txn_id))?;
        Ok(staging.added_rows(table_name))
    }

    /// Flush every staged table for `txn_id`, then mark the transaction
    /// committed. On the first constraint violation the whole commit is
    /// aborted at the manager level (§7): tables flushed earlier in this
    /// loop stay visible, per §4.5's note that cross-table rollback is
    /// out of scope here.
    pub fn commit(&self, txn_id: TransactionId) -> Result<Timestamp> {
        let staging = self
            .staging
            .remove(&txn_id)
            .map(|(_, s)| s)
            .ok_or_else(|| Self::staging_err(txn_id))?;
        match self.flush_all(txn_id, staging) {
            Ok(()) => {
                self.locks.release_locks(txn_id)?;
                self.coordinator.commit(txn_id)
            }
            Err(e) => {
                let _ = self.locks.release_locks(txn_id);
                let _ = self.coordinator.rollback(txn_id);
                Err(e)
            }
        }
    }

    fn flush_all(&self, txn_id: TransactionId, mut staging: LocalStorage) -> Result<()> {
        for name in staging.staged_table_names_snapshot() {
            let table = self.table(&name)?;
            self.locks.acquire_exclusive(txn_id, table_lock_key(&name))?;
            if let Some(result) = staging.flush_table(&table)? {
                let partition = (txn_id % self.config.num_partitions as u64) as PartitionId;
                self.wal.log_append(
                    partition,
                    &result.table_name,
                    result.row_start,
                    result.appended_rows,
                )?;
            }
        }
        Ok(())
    }

    /// Abort: discard staged state untouched, release locks, roll back.
    pub fn rollback(&self, txn_id: TransactionId) -> Result<()> {
        self.staging.remove(&txn_id);
        self.locks.release_locks(txn_id)?;
        self.coordinator.rollback(txn_id)
    }
}

/// The lock manager addresses rows; a table-level write lock is modeled
/// as an exclusive lock on a fixed sentinel id derived from the table's
/// name, distinct from any real row id range (see [`crate::types::MAX_ROW_ID`]).
fn table_lock_key(table_name: &str) -> RowId {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    table_name.hash(&mut hasher);
    hasher.finish() | (1 << 63)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ColumnDef, ColumnType, IndexDef, TableSchema};

    fn open_engine() -> (tempfile::TempDir, Engine) {
        let dir = tempfile::tempdir().unwrap();
        let engine = Engine::open(dir.path(), DBConfig::for_testing()).unwrap();
        (dir, engine)
    }

    fn create_table(engine: &Engine) {
        let mut schema = TableSchema::new(
            "t".into(),
            vec![ColumnDef::new("a".into(), ColumnType::Integer, 0)],
        );
        schema.add_index(IndexDef::unique("t_a_idx".into(), "t".into(), vec!["a".into()]));
        engine.create_table(schema).unwrap();
    }

    #[test]
    fn plain_staged_insert_then_commit() {
        let (_dir, engine) = open_engine();
        create_table(&engine);

        let txn = engine.begin(IsolationLevel::ReadCommitted).unwrap();
        engine
            .append(txn, "t", &[vec![Value::Integer(1)], vec![Value::Integer(2)], vec![Value::Integer(3)]])
            .unwrap();

        let scanned = engine.scan(txn, "t").unwrap();
        assert_eq!(scanned.len(), 3);

        engine.commit(txn).unwrap();
        let table = engine.table("t").unwrap();
        assert_eq!(table.row_count(), 3);
    }

    #[test]
    fn abort_leaves_base_table_untouched() {
        let (_dir, engine) = open_engine();
        create_table(&engine);

        let txn = engine.begin(IsolationLevel::ReadCommitted).unwrap();
        engine
            .append(txn, "t", &[vec![Value::Integer(7)], vec![Value::Integer(8)]])
            .unwrap();
        engine.rollback(txn).unwrap();

        let table = engine.table("t").unwrap();
        assert_eq!(table.row_count(), 0);
    }

    #[test]
    fn commit_time_conflict_reports_constraint_violation() {
        let (_dir, engine) = open_engine();
        create_table(&engine);

        let seed = engine.begin(IsolationLevel::ReadCommitted).unwrap();
        engine.append(seed, "t", &[vec![Value::Integer(10)]]).unwrap();
        engine.commit(seed).unwrap();

        let txn = engine.begin(IsolationLevel::ReadCommitted).unwrap();
        engine
            .append(txn, "t", &[vec![Value::Integer(20)], vec![Value::Integer(10)]])
            .unwrap();
        let err = engine.commit(txn).unwrap_err();
        assert!(matches!(err, StorageError::Constraint(_)));

        let table = engine.table("t").unwrap();
        assert_eq!(table.row_count(), 1);
    }
}
