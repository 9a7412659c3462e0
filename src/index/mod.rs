//! Index layer: unique-key indexes used by both base tables and the
//! transaction-local staging area.

pub mod unique;

pub use unique::UniqueIndex;

use crate::types::RowId;
use crate::Result;

/// Capability interface a concrete index type must provide.
///
/// Both a base table's unique indexes and a transaction's shadow indexes
/// (see [`crate::storage::local::index_set`]) implement this trait, so the
/// flush protocol can treat them uniformly.
pub trait KeyIndex: Send + Sync {
    /// Whether this index enforces uniqueness across its key.
    fn is_unique(&self) -> bool;

    /// Insert `key -> row_id`. Returns `Ok(false)` without mutating the
    /// index when `is_unique()` and `key` already maps to a different row.
    fn insert(&mut self, key: Vec<u8>, row_id: RowId) -> Result<bool>;

    /// Remove the `(key, row_id)` entry, if present.
    fn remove(&mut self, key: &[u8], row_id: RowId);

    /// Enumerate every `(key, row_id)` pair currently indexed.
    fn scan(&self) -> Vec<(Vec<u8>, RowId)>;

    /// Number of indexed entries.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
