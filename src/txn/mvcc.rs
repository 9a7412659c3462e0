//! MVCC transaction coordinator
//!
//! Re-exports the full transaction coordinator implementation

pub use crate::txn::coordinator::{
    TransactionCoordinator,
    TransactionContext,
    IsolationLevel,
    TransactionState,
    TransactionCoordinatorStats,
};
