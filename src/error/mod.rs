use thiserror::Error;

use crate::postgres::{ErrorCategory, PostgresPoolError};
use crate::verify::VerifyError;

/// Top-level failure of a verification run. Every variant is fatal.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] PostgresPoolError),

    #[error("Verification failed: {0}")]
    Verify(#[from] VerifyError),

    #[error("Required tables missing: {}", .0.join(", "))]
    MissingTables(Vec<String>),
}

impl AppError {
    /// Process exit status for this failure.
    pub fn exit_code(&self) -> u8 {
        1
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            AppError::Config(_) => ErrorCategory::Configuration,
            AppError::Database(e) => e.category(),
            AppError::Verify(e) => e.category(),
            AppError::MissingTables(_) => ErrorCategory::Other,
        }
    }

    /// SQLSTATE of the underlying database error, if any.
    pub fn code(&self) -> Option<&str> {
        match self {
            AppError::Database(e) => e.code(),
            AppError::Verify(e) => e.database_error().and_then(PostgresPoolError::code),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
