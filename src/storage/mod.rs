//! Storage layer.
//!
//! `base_table` holds committed rows and their indexes; `local` is the
//! transaction-local staging buffer that drains into a base table at commit.

pub mod checksum;
pub mod base_table;
pub mod local;

pub use checksum::{Checksum, ChecksumType, ChecksumError};
pub use base_table::{AppendState, BaseTable};
pub use local::LocalStorage;
