//! Transaction-local write buffer for an embedded analytical database.
//!
//! ## Architecture
//! - `storage::base_table`: the committed row store each transaction stages against.
//! - `storage::local`: the staging subsystem. Row group collection, shadow
//!   unique indexes, column stats, and the flush protocol that folds staged
//!   rows into a base table at commit.
//! - `txn`: MVCC transaction bookkeeping, write-ahead logging, row locking.
//! - `index`: the `KeyIndex` capability interface shared by base and shadow
//!   indexes.
//! - `catalog`: table schema registry.

pub mod config;
pub mod storage;
pub mod index;
pub mod txn;
pub mod types;
pub mod catalog;
pub mod engine;

mod error;

pub use config::{DBConfig, DurabilityLevel, WALConfig};
pub use error::{Result, StorageError};
pub use catalog::TableRegistry;
pub use engine::Engine;
