//! Database configuration and durability levels
//!
//! Provides flexible configuration options for balancing performance and safety.

use serde::{Deserialize, Serialize};

/// Durability level.
///
/// Trades data safety against write throughput:
/// - Synchronous: safest, fsyncs on every write.
/// - GroupCommit: balances safety and throughput by sharing an fsync across
///   concurrently committing transactions.
/// - Periodic: highest throughput, flushes on a background timer.
/// - NoSync: fastest but unsafe, test-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DurabilityLevel {
    /// fsync immediately after every WAL append.
    ///
    /// Equivalent to MySQL's `innodb_flush_log_at_trx_commit = 1` or
    /// PostgreSQL's `synchronous_commit = on`.
    Synchronous,

    /// Multiple concurrently committing transactions share one fsync.
    ///
    /// Equivalent to `innodb_flush_log_at_trx_commit` batching behavior.
    /// Recommended for most production workloads.
    GroupCommit {
        /// Maximum records flushed together.
        max_batch_size: usize,
        /// Maximum wait before a forced flush, in microseconds.
        max_wait_us: u64,
    },

    /// A background thread flushes on a fixed interval.
    ///
    /// Equivalent to `innodb_flush_log_at_trx_commit = 2`. A crash can lose
    /// up to `interval_ms` of committed data.
    Periodic { interval_ms: u64 },

    /// Never fsync; data lives only in the OS page cache until a natural
    /// flush. Test and benchmark use only.
    NoSync,
}

impl Default for DurabilityLevel {
    fn default() -> Self {
        DurabilityLevel::GroupCommit {
            max_batch_size: 1000,
            max_wait_us: 1000,
        }
    }
}

impl DurabilityLevel {
    pub fn synchronous() -> Self {
        Self::Synchronous
    }

    pub fn group_commit() -> Self {
        Self::GroupCommit {
            max_batch_size: 1000,
            max_wait_us: 1000,
        }
    }

    pub fn group_commit_custom(max_batch_size: usize, max_wait_us: u64) -> Self {
        Self::GroupCommit {
            max_batch_size,
            max_wait_us,
        }
    }

    pub fn periodic(interval_ms: u64) -> Self {
        Self::Periodic { interval_ms }
    }

    pub fn no_sync() -> Self {
        Self::NoSync
    }

    pub fn requires_immediate_sync(&self) -> bool {
        matches!(self, Self::Synchronous)
    }

    pub fn is_no_sync(&self) -> bool {
        matches!(self, Self::NoSync)
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Synchronous => "synchronous (safest)",
            Self::GroupCommit { .. } => "group commit (recommended)",
            Self::Periodic { .. } => "periodic flush (high throughput)",
            Self::NoSync => "no fsync (tests only)",
        }
    }

    pub fn expected_throughput(&self) -> &'static str {
        match self {
            Self::Synchronous => "50 ops/s",
            Self::GroupCommit { .. } => "5K-10K ops/s",
            Self::Periodic { .. } => "50K+ ops/s",
            Self::NoSync => "100K+ ops/s",
        }
    }
}

/// WAL configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WALConfig {
    /// Durability level governing fsync behavior.
    pub durability_level: DurabilityLevel,

    /// WAL directory, relative to the database data directory.
    pub wal_dir: String,

    /// Maximum size of a single WAL file, in bytes.
    pub max_wal_size: u64,
}

impl Default for WALConfig {
    fn default() -> Self {
        Self {
            durability_level: DurabilityLevel::default(),
            wal_dir: "wal".to_string(),
            max_wal_size: 64 * 1024 * 1024,
        }
    }
}

impl WALConfig {
    pub fn for_financial() -> Self {
        Self {
            durability_level: DurabilityLevel::Synchronous,
            ..Default::default()
        }
    }

    pub fn for_general() -> Self {
        Self {
            durability_level: DurabilityLevel::group_commit(),
            ..Default::default()
        }
    }

    pub fn for_testing() -> Self {
        Self {
            durability_level: DurabilityLevel::NoSync,
            ..Default::default()
        }
    }
}

/// Top-level database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DBConfig {
    /// WAL configuration
    pub wal_config: WALConfig,

    /// Number of row partitions used for WAL sharding and parallel scans.
    pub num_partitions: u8,

    /// Row cache size, in rows (`None` uses the default of 10,000).
    pub row_cache_size: Option<usize>,

    /// Maximum time allowed for a single query, in seconds (`None` = unbounded).
    pub query_timeout_secs: Option<u64>,
}

impl Default for DBConfig {
    fn default() -> Self {
        Self {
            wal_config: WALConfig::default(),
            num_partitions: 4,
            row_cache_size: None,
            query_timeout_secs: None,
        }
    }
}

impl DBConfig {
    pub fn for_financial() -> Self {
        Self {
            wal_config: WALConfig::for_financial(),
            ..Default::default()
        }
    }

    pub fn for_general() -> Self {
        Self {
            wal_config: WALConfig::for_general(),
            ..Default::default()
        }
    }

    pub fn for_testing() -> Self {
        Self {
            wal_config: WALConfig::for_testing(),
            ..Default::default()
        }
    }
}
