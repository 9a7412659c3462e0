//! Table catalog: persisted schema and index metadata.

pub mod registry;

pub use registry::TableRegistry;
