//! Core data types for the storage engine

mod timestamp;
mod table;

pub use timestamp::Timestamp;
pub use table::{TableSchema, ColumnDef, ColumnType, IndexDef, Column};

use serde::{Deserialize, Serialize};

/// Unified value type for row columns
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Value {
    /// Integer value
    Integer(i64),

    /// Floating point value
    Float(f64),

    /// Boolean value
    Bool(bool),

    /// Text string
    Text(String),

    /// Timestamp data
    Timestamp(Timestamp),

    /// Null value
    Null,
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a.partial_cmp(b),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Text(a), Value::Text(b)) => a.partial_cmp(b),
            (Value::Bool(a), Value::Bool(b)) => a.partial_cmp(b),
            (Value::Timestamp(a), Value::Timestamp(b)) => a.partial_cmp(b),
            (Value::Integer(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
            (Value::Float(a), Value::Integer(b)) => a.partial_cmp(&(*b as f64)),
            _ => None,
        }
    }
}

/// A row contains multiple values, ordered by column position.
pub type Row = Vec<Value>;

/// Row identifier, unique within a table.
pub type RowId = u64;

/// Partition identifier for parallel writes.
pub type PartitionId = u8;

/// Sentinel separating committed row identifiers from transaction-local ones.
///
/// Identifiers strictly below this boundary are assigned by a base table;
/// identifiers at or above it are assigned by a transaction's staging
/// collection. The index layer relies on this disjointness to tell staged
/// rows apart from committed ones without consulting transaction state.
pub const MAX_ROW_ID: RowId = 1 << 62;
