//! PostgreSQL persistence module.
//!
//! Provides the process-wide connection pool, dynamic row records and the
//! `QueryExecutor` seam used by the verification routine.

pub mod error;
pub mod executor;
pub mod pool;
pub mod row;

pub use error::{ErrorCategory, PostgresPoolError};
pub use executor::QueryExecutor;
pub use pool::{forced_ssl_mode, mask_url, PostgresPool};
pub use row::DbRow;
