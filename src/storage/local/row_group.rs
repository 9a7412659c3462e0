//! Row Group Collection: the staging subsystem's append-only row store.
//!
//! Rows are addressed by local identifiers starting at [`MAX_ROW_ID`].
//! Physical storage is chunked into row groups, the unit of scan
//! parallelism; a row group fills to [`ROW_GROUP_SIZE`] before a new one
//! is started.

use crate::types::{Row, RowId, Value, MAX_ROW_ID};

pub const ROW_GROUP_SIZE: usize = 2048;

pub struct RowGroupCollection {
    groups: Vec<Vec<Row>>,
    deleted: Vec<bool>,
    total_rows: u64,
}

impl RowGroupCollection {
    pub fn new() -> Self {
        Self {
            groups: Vec::new(),
            deleted: Vec::new(),
            total_rows: 0,
        }
    }

    pub fn total_rows(&self) -> u64 {
        self.total_rows
    }

    pub fn row_group_count(&self) -> usize {
        self.groups.len()
    }

    /// Local identifier the next appended row will receive.
    pub fn next_local_id(&self) -> RowId {
        MAX_ROW_ID + self.total_rows
    }

    pub fn append(&mut self, batch: &[Row]) {
        if batch.is_empty() {
            return;
        }
        let mut remaining = batch;
        loop {
            if self.groups.last().map_or(true, |g| g.len() >= ROW_GROUP_SIZE) {
                self.groups.push(Vec::with_capacity(ROW_GROUP_SIZE));
            }
            let group = self.groups.last_mut().unwrap();
            let space = ROW_GROUP_SIZE - group.len();
            let take = space.min(remaining.len());
            group.extend_from_slice(&remaining[..take]);
            self.deleted.extend(std::iter::repeat(false).take(take));
            remaining = &remaining[take..];
            if remaining.is_empty() {
                break;
            }
        }
        self.total_rows += batch.len() as u64;
    }

    fn offset(&self, local_id: RowId) -> Option<usize> {
        if local_id < MAX_ROW_ID {
            return None;
        }
        let offset = local_id - MAX_ROW_ID;
        if offset >= self.total_rows {
            None
        } else {
            Some(offset as usize)
        }
    }

    pub fn row(&self, local_id: RowId) -> Option<&Row> {
        let offset = self.offset(local_id)?;
        let mut remaining = offset;
        for group in &self.groups {
            if remaining < group.len() {
                return Some(&group[remaining]);
            }
            remaining -= group.len();
        }
        None
    }

    pub fn row_mut(&mut self, local_id: RowId) -> Option<&mut Row> {
        let offset = self.offset(local_id)?;
        let mut remaining = offset;
        for group in &mut self.groups {
            if remaining < group.len() {
                return Some(&mut group[remaining]);
            }
            remaining -= group.len();
        }
        None
    }

    pub fn is_deleted(&self, local_id: RowId) -> bool {
        self.offset(local_id)
            .map(|off| self.deleted[off])
            .unwrap_or(false)
    }

    pub fn mark_deleted(&mut self, local_id: RowId) -> bool {
        match self.offset(local_id) {
            Some(off) if !self.deleted[off] => {
                self.deleted[off] = true;
                true
            }
            _ => false,
        }
    }

    pub fn deleted_count(&self) -> u64 {
        self.deleted.iter().filter(|d| **d).count() as u64
    }

    /// Every live row, in append order, with its local identifier.
    pub fn scan_live(&self) -> Vec<(RowId, Row)> {
        let mut result = Vec::with_capacity((self.total_rows - self.deleted_count()) as usize);
        let mut offset = 0u64;
        for group in &self.groups {
            for row in group {
                if !self.deleted[offset as usize] {
                    result.push((MAX_ROW_ID + offset, row.clone()));
                }
                offset += 1;
            }
        }
        result
    }

    /// Live rows of row group `idx`, with local identifiers, skipping
    /// tombstoned entries. This is what a caller reads after claiming
    /// `idx` from a [`ParallelScanState`]; out-of-range `idx` yields an
    /// empty partition rather than panicking.
    pub fn group_live_rows(&self, idx: usize) -> Vec<(RowId, Row)> {
        let Some(group) = self.groups.get(idx) else {
            return Vec::new();
        };
        let start: usize = self.groups[..idx].iter().map(|g| g.len()).sum();
        let mut result = Vec::with_capacity(group.len());
        for (offset, row) in group.iter().enumerate() {
            let global = start + offset;
            if !self.deleted[global] {
                result.push((MAX_ROW_ID + global as u64, row.clone()));
            }
        }
        result
    }

    /// Live rows, chunked by row-group boundary, skipping tombstoned
    /// entries. Used by the flush path to drain staging into a base
    /// table; the per-group chunking matches the collection's natural
    /// parallel-scan partitioning.
    pub fn live_chunks(&self) -> Vec<Vec<Row>> {
        let mut result = Vec::with_capacity(self.groups.len());
        let mut offset = 0usize;
        for group in &self.groups {
            let mut chunk = Vec::new();
            for row in group {
                if !self.deleted[offset] {
                    chunk.push(row.clone());
                }
                offset += 1;
            }
            result.push(chunk);
        }
        result
    }

    pub fn add_column(&mut self, default: Value) {
        for group in &mut self.groups {
            for row in group.iter_mut() {
                row.push(default.clone());
            }
        }
    }

    /// Validate `caster` against every current value in `column` before
    /// applying it, so a mid-cast failure never leaves the collection
    /// partially converted.
    pub fn cast_column(
        &mut self,
        column: usize,
        caster: impl Fn(&Value) -> crate::Result<Value>,
    ) -> crate::Result<()> {
        for group in &self.groups {
            for row in group {
                caster(&row[column])?;
            }
        }
        for group in &mut self.groups {
            for row in group.iter_mut() {
                row[column] = caster(&row[column]).expect("validated in first pass");
            }
        }
        Ok(())
    }
}

/// Coordinator state for a parallel scan over a staging collection.
///
/// When the owning table has no staging entry at all, callers should use
/// [`ParallelScanState::empty`] rather than constructing one from a
/// collection: that is the "empty partitioning" sentinel the design notes
/// call for in place of a null row-group pointer.
pub struct ParallelScanState {
    next_group: std::sync::atomic::AtomicUsize,
    group_count: usize,
}

impl ParallelScanState {
    pub fn new(collection: &RowGroupCollection) -> Self {
        Self {
            next_group: std::sync::atomic::AtomicUsize::new(0),
            group_count: collection.row_group_count(),
        }
    }

    pub fn empty() -> Self {
        Self {
            next_group: std::sync::atomic::AtomicUsize::new(0),
            group_count: 0,
        }
    }

    /// Claim the next row group for the calling thread. Returns `None`
    /// once every group has been claimed.
    pub fn claim_next(&self) -> Option<usize> {
        let idx = self
            .next_group
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        if idx < self.group_count {
            Some(idx)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(v: i64) -> Row {
        vec![Value::Integer(v)]
    }

    #[test]
    fn append_assigns_monotonic_local_ids() {
        let mut rg = RowGroupCollection::new();
        assert_eq!(rg.next_local_id(), MAX_ROW_ID);
        rg.append(&[row(1), row(2), row(3)]);
        assert_eq!(rg.total_rows(), 3);
        assert_eq!(rg.next_local_id(), MAX_ROW_ID + 3);
        assert_eq!(rg.row(MAX_ROW_ID), Some(&row(1)));
        assert_eq!(rg.row(MAX_ROW_ID + 2), Some(&row(3)));
    }

    #[test]
    fn delete_marks_row_and_excludes_from_scan() {
        let mut rg = RowGroupCollection::new();
        rg.append(&[row(1), row(2), row(3)]);
        assert!(rg.mark_deleted(MAX_ROW_ID + 1));
        assert!(!rg.mark_deleted(MAX_ROW_ID + 1));

        let live = rg.scan_live();
        assert_eq!(live.len(), 2);
        assert_eq!(live[0].1, row(1));
        assert_eq!(live[1].1, row(3));
        assert_eq!(rg.deleted_count(), 1);
    }

    #[test]
    fn row_groups_split_at_capacity() {
        let mut rg = RowGroupCollection::new();
        let batch: Vec<Row> = (0..(ROW_GROUP_SIZE + 10) as i64).map(row).collect();
        rg.append(&batch);
        assert_eq!(rg.row_group_count(), 2);
        assert_eq!(rg.total_rows(), batch.len() as u64);
    }

    #[test]
    fn live_chunks_skip_deleted_rows() {
        let mut rg = RowGroupCollection::new();
        rg.append(&[row(1), row(2), row(3)]);
        rg.mark_deleted(MAX_ROW_ID + 1);
        let chunks = rg.live_chunks();
        let flattened: Vec<&Row> = chunks.iter().flatten().collect();
        assert_eq!(flattened, vec![&row(1), &row(3)]);
    }

    #[test]
    fn group_live_rows_reads_a_claimed_partition() {
        let mut rg = RowGroupCollection::new();
        let batch: Vec<Row> = (0..(ROW_GROUP_SIZE + 10) as i64).map(row).collect();
        rg.append(&batch);
        assert_eq!(rg.row_group_count(), 2);

        let scan = ParallelScanState::new(&rg);
        let mut seen = Vec::new();
        while let Some(idx) = scan.claim_next() {
            seen.extend(rg.group_live_rows(idx));
        }
        assert_eq!(scan.claim_next(), None);
        assert_eq!(seen.len(), batch.len());
        assert_eq!(seen[0], (MAX_ROW_ID, row(0)));
        assert_eq!(seen[ROW_GROUP_SIZE], (MAX_ROW_ID + ROW_GROUP_SIZE as u64, row(ROW_GROUP_SIZE as i64)));
    }

    #[test]
    fn group_live_rows_skips_deleted_entries_in_second_group() {
        let mut rg = RowGroupCollection::new();
        let batch: Vec<Row> = (0..(ROW_GROUP_SIZE + 3) as i64).map(row).collect();
        rg.append(&batch);
        rg.mark_deleted(MAX_ROW_ID + ROW_GROUP_SIZE as u64 + 1);

        let second = rg.group_live_rows(1);
        assert_eq!(second.len(), 2);
        assert_eq!(second[0].1, row(ROW_GROUP_SIZE as i64));
        assert_eq!(second[1].1, row(ROW_GROUP_SIZE as i64 + 2));
    }

    #[test]
    fn group_live_rows_out_of_range_is_empty() {
        let mut rg = RowGroupCollection::new();
        rg.append(&[row(1)]);
        assert!(rg.group_live_rows(5).is_empty());
    }

    #[test]
    fn add_column_appends_default_everywhere() {
        let mut rg = RowGroupCollection::new();
        rg.append(&[row(1), row(2)]);
        rg.add_column(Value::Null);
        assert_eq!(rg.row(MAX_ROW_ID), Some(&vec![Value::Integer(1), Value::Null]));
    }

    #[test]
    fn cast_column_fails_without_partial_mutation() {
        let mut rg = RowGroupCollection::new();
        rg.append(&[vec![Value::Integer(1)], vec![Value::Integer(-1)]]);
        let result = rg.cast_column(0, |v| match v {
            Value::Integer(i) if *i >= 0 => Ok(Value::Integer(*i)),
            _ => Err(crate::StorageError::NotSupported("negative".into())),
        });
        assert!(result.is_err());
        assert_eq!(rg.row(MAX_ROW_ID), Some(&vec![Value::Integer(1)]));
    }
}
