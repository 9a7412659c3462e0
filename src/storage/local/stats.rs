//! Column Stats Accumulator: running min/max/null-count per staged column.
//!
//! Updated synchronously on every `Append`; consumed by the flush path to
//! hand the base table's planner fresh statistics without a separate scan.

use crate::types::Value;
use std::cmp::Ordering;

#[derive(Debug, Clone, Default)]
pub struct ColumnStats {
    min: Option<Value>,
    max: Option<Value>,
    null_count: u64,
}

impl ColumnStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, value: &Value) {
        if matches!(value, Value::Null) {
            self.null_count += 1;
            return;
        }

        if self.min.as_ref().and_then(|m| value.partial_cmp(m)) != Some(Ordering::Greater) {
            self.min = Some(value.clone());
        }
        if self.max.as_ref().and_then(|m| value.partial_cmp(m)) != Some(Ordering::Less) {
            self.max = Some(value.clone());
        }
    }

    pub fn min(&self) -> Option<&Value> {
        self.min.as_ref()
    }

    pub fn max(&self) -> Option<&Value> {
        self.max.as_ref()
    }

    pub fn null_count(&self) -> u64 {
        self.null_count
    }
}

/// One `ColumnStats` per staged column, indexed by column position.
#[derive(Debug, Clone)]
pub struct ColumnStatsAccumulator {
    columns: Vec<ColumnStats>,
}

impl ColumnStatsAccumulator {
    pub fn new(num_columns: usize) -> Self {
        Self {
            columns: vec![ColumnStats::new(); num_columns],
        }
    }

    pub fn observe_row(&mut self, row: &[Value]) {
        for (stats, value) in self.columns.iter_mut().zip(row) {
            stats.observe(value);
        }
    }

    pub fn column(&self, position: usize) -> &ColumnStats {
        &self.columns[position]
    }

    /// A new column has no history; append a fresh accumulator for it.
    pub fn add_column(&mut self) {
        self.columns.push(ColumnStats::new());
    }
}
