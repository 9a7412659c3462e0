//! Transaction-local write buffer.
//!
//! Stages a transaction's uncommitted row insertions, deletions, and
//! updates outside the shared base tables, enforces uniqueness against
//! in-flight data, and atomically folds staged data into the base tables
//! at commit time (see [`flush`]).

pub mod flush;
pub mod index_set;
pub mod local_storage;
pub mod row_group;
pub mod stats;
pub mod table_storage;

pub use flush::{flush, FlushResult};
pub use local_storage::LocalStorage;
pub use row_group::{ParallelScanState, RowGroupCollection, ROW_GROUP_SIZE};
pub use stats::{ColumnStats, ColumnStatsAccumulator};
pub use table_storage::LocalTableStorage;
