//! Local Index Set: shadow unique indexes over a transaction's staged rows.
//!
//! One shadow index exists per unique index declared on the base table,
//! over the same columns and also marked unique (invariant 4). They let
//! `Append` reject an intra-transaction duplicate before it ever reaches
//! the row group collection.

use crate::error::Result;
use crate::index::{KeyIndex, UniqueIndex};
use crate::storage::base_table::BaseTable;
use crate::types::{Row, RowId};

pub struct LocalIndexSet {
    entries: Vec<UniqueIndex>,
}

impl LocalIndexSet {
    /// Build one shadow per unique index declared on `table`.
    pub fn for_table(table: &BaseTable) -> Self {
        let schema = table.schema();
        let entries = table
            .index_defs()
            .map(|def| {
                let columns = def
                    .columns
                    .iter()
                    .map(|name| schema.get_column_position(name).expect("index column must exist"))
                    .collect();
                UniqueIndex::new(def.name.clone(), columns, true)
            })
            .collect();
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append protocol (§4.2): insert `chunk`'s keys into every shadow
    /// index at identifiers `[base, base + chunk.len())`. Rolls back
    /// everything this call installed on the first conflict.
    pub fn try_append(&mut self, chunk: &[Row], base: RowId) -> Result<bool> {
        let mut installed: Vec<(usize, Vec<u8>, RowId)> = Vec::new();

        for (offset, row) in chunk.iter().enumerate() {
            let row_id = base + offset as u64;
            let mut conflict = false;

            for (pos, index) in self.entries.iter_mut().enumerate() {
                let key = index.key_for(row)?;
                if index.insert(key.clone(), row_id)? {
                    installed.push((pos, key, row_id));
                } else {
                    conflict = true;
                    break;
                }
            }

            if conflict {
                for (pos, key, row_id) in installed.drain(..) {
                    self.entries[pos].remove(&key, row_id);
                }
                return Ok(false);
            }
        }

        Ok(true)
    }

    /// Remove `row`'s entries (used when a staged row is deleted locally).
    pub fn remove(&mut self, row: &Row, row_id: RowId) -> Result<()> {
        for index in self.entries.iter_mut() {
            let key = index.key_for(row)?;
            index.remove(&key, row_id);
        }
        Ok(())
    }

    /// Re-validate shadow uniqueness after an in-place column update:
    /// remove `old_row`'s keys, then attempt to install `new_row`'s keys
    /// for every index whose key actually changed. Restores the original
    /// keys and returns `Ok(false)` if a new key collides.
    pub fn replace(&mut self, old_row: &Row, new_row: &Row, row_id: RowId) -> Result<bool> {
        let mut changed = Vec::new();
        for (pos, index) in self.entries.iter().enumerate() {
            let old_key = index.key_for(old_row)?;
            let new_key = index.key_for(new_row)?;
            if old_key != new_key {
                changed.push((pos, old_key, new_key));
            }
        }
        if changed.is_empty() {
            return Ok(true);
        }

        for (pos, old_key, _) in &changed {
            self.entries[*pos].remove(old_key, row_id);
        }

        let mut installed = Vec::new();
        for (pos, _, new_key) in &changed {
            if self.entries[*pos].insert(new_key.clone(), row_id)? {
                installed.push(*pos);
            } else {
                for pos in installed {
                    // only the new keys we actually installed need removing
                    let key = changed.iter().find(|(p, _, _)| *p == pos).unwrap().2.clone();
                    self.entries[pos].remove(&key, row_id);
                }
                for (pos, old_key, _) in &changed {
                    self.entries[*pos].insert(old_key.clone(), row_id)?;
                }
                return Ok(false);
            }
        }

        Ok(true)
    }
}
