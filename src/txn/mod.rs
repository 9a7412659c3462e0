//! Transaction layer implementation

pub mod wal;
pub mod mvcc;
pub mod version_store;
pub mod coordinator;
pub mod lock_manager;

pub use wal::{WALManager, LogSequenceNumber, WALRecord};
pub use mvcc::{TransactionCoordinator, TransactionContext, IsolationLevel, TransactionState};
pub use version_store::{VersionStore, Snapshot, Timestamp, TransactionId, VersionStoreStats};
pub use coordinator::TransactionCoordinatorStats;
pub use lock_manager::{LockManager, LockMode, LockManagerStats};
