//! Error types for the PostgreSQL connection provider.

use std::fmt;

use thiserror::Error;

/// SQLSTATE: unique_violation
pub const UNIQUE_VIOLATION: &str = "23505";
/// SQLSTATE: invalid_password
pub const INVALID_PASSWORD: &str = "28P01";
/// SQLSTATE: invalid_authorization_specification
pub const INVALID_AUTHORIZATION: &str = "28000";
/// SQLSTATE: invalid_catalog_name (database does not exist)
pub const INVALID_CATALOG_NAME: &str = "3D000";

/// Errors that can occur with the PostgreSQL pool.
#[derive(Debug, Error)]
pub enum PostgresPoolError {
    #[error("DATABASE_URL is not set")]
    MissingDatabaseUrl,

    #[error("Invalid connection string: {0}")]
    InvalidUrl(#[source] sqlx::Error),

    #[error("{message}")]
    Database {
        /// SQLSTATE reported by the server, if any
        code: Option<String>,
        message: String,
    },

    #[error("Connection unavailable: {0}")]
    ConnectionUnavailable(String),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("Column `{column}` has unsupported type {type_name}; cast it in SQL (e.g. `{column}::text`)")]
    UnsupportedType { column: String, type_name: String },

    #[error("SQLx error: {0}")]
    Sqlx(sqlx::Error),
}

/// Coarse classification used to pick a remediation hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Host not found, connection refused or timed out
    Network,
    Tls,
    Authentication,
    MissingDatabase,
    UniqueViolation,
    Configuration,
    Other,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Network => "network",
            ErrorCategory::Tls => "tls",
            ErrorCategory::Authentication => "authentication",
            ErrorCategory::MissingDatabase => "missing_database",
            ErrorCategory::UniqueViolation => "unique_violation",
            ErrorCategory::Configuration => "configuration",
            ErrorCategory::Other => "other",
        }
    }

    fn from_sqlstate(code: &str) -> Self {
        match code {
            UNIQUE_VIOLATION => ErrorCategory::UniqueViolation,
            INVALID_PASSWORD | INVALID_AUTHORIZATION => ErrorCategory::Authentication,
            INVALID_CATALOG_NAME => ErrorCategory::MissingDatabase,
            _ => ErrorCategory::Other,
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PostgresPoolError {
    /// Build a server-side error from its SQLSTATE and message.
    pub fn database(code: impl Into<String>, message: impl Into<String>) -> Self {
        PostgresPoolError::Database {
            code: Some(code.into()),
            message: message.into(),
        }
    }

    /// SQLSTATE of a server-side error.
    pub fn code(&self) -> Option<&str> {
        match self {
            PostgresPoolError::Database { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            PostgresPoolError::MissingDatabaseUrl | PostgresPoolError::InvalidUrl(_) => {
                ErrorCategory::Configuration
            }
            PostgresPoolError::Database { code, .. } => code
                .as_deref()
                .map(ErrorCategory::from_sqlstate)
                .unwrap_or(ErrorCategory::Other),
            PostgresPoolError::ConnectionUnavailable(_) => ErrorCategory::Network,
            PostgresPoolError::Tls(_) => ErrorCategory::Tls,
            PostgresPoolError::Sqlx(sqlx::Error::Configuration(_)) => ErrorCategory::Configuration,
            PostgresPoolError::UnsupportedType { .. } | PostgresPoolError::Sqlx(_) => {
                ErrorCategory::Other
            }
        }
    }

    pub fn is_unique_violation(&self) -> bool {
        self.code() == Some(UNIQUE_VIOLATION)
    }
}

impl From<sqlx::Error> for PostgresPoolError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db) => PostgresPoolError::Database {
                code: db.code().map(|c| c.into_owned()),
                message: db.message().to_string(),
            },
            sqlx::Error::Io(e) => PostgresPoolError::ConnectionUnavailable(e.to_string()),
            sqlx::Error::PoolTimedOut => PostgresPoolError::ConnectionUnavailable(
                "timed out waiting for a connection".to_string(),
            ),
            sqlx::Error::Tls(e) => PostgresPoolError::Tls(e.to_string()),
            other => PostgresPoolError::Sqlx(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_types() {
        let err = PostgresPoolError::MissingDatabaseUrl;
        assert!(format!("{}", err).contains("DATABASE_URL"));
        assert_eq!(err.category(), ErrorCategory::Configuration);

        let err = PostgresPoolError::ConnectionUnavailable("test error".to_string());
        assert!(format!("{}", err).contains("test error"));
        assert_eq!(err.category(), ErrorCategory::Network);
    }

    #[test]
    fn test_sqlstate_categories() {
        let cases = [
            ("23505", ErrorCategory::UniqueViolation),
            ("28P01", ErrorCategory::Authentication),
            ("28000", ErrorCategory::Authentication),
            ("3D000", ErrorCategory::MissingDatabase),
            ("42P01", ErrorCategory::Other),
        ];
        for (code, expected) in cases {
            let err = PostgresPoolError::database(code, "boom");
            assert_eq!(err.code(), Some(code));
            assert_eq!(err.category(), expected, "code {code}");
        }

        let no_code = PostgresPoolError::Database {
            code: None,
            message: "boom".to_string(),
        };
        assert_eq!(no_code.category(), ErrorCategory::Other);
    }

    #[test]
    fn test_unique_violation() {
        assert!(PostgresPoolError::database(UNIQUE_VIOLATION, "duplicate key").is_unique_violation());
        assert!(!PostgresPoolError::database("23503", "fk").is_unique_violation());
        assert!(!PostgresPoolError::MissingDatabaseUrl.is_unique_violation());
    }

    #[test]
    fn test_from_sqlx_io_error() {
        let io = std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            "failed to lookup address information",
        );
        let err = PostgresPoolError::from(sqlx::Error::Io(io));
        assert_eq!(err.category(), ErrorCategory::Network);
        assert!(err.to_string().contains("lookup address"));

        let err = PostgresPoolError::from(sqlx::Error::PoolTimedOut);
        assert_eq!(err.category(), ErrorCategory::Network);

        let err = PostgresPoolError::from(sqlx::Error::RowNotFound);
        assert_eq!(err.category(), ErrorCategory::Other);
    }

    #[test]
    fn test_unsupported_type_names_column_and_cast() {
        let err = PostgresPoolError::UnsupportedType {
            column: "span".to_string(),
            type_name: "TSRANGE".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("`span`"));
        assert!(msg.contains("TSRANGE"));
        assert!(msg.contains("span::text"));
        assert_eq!(err.category(), ErrorCategory::Other);
        assert_eq!(err.code(), None);
    }
}
