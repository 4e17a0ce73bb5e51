//! The sequential verification routine.
//!
//! Checks run strictly one after another against a [`QueryExecutor`]:
//! connectivity, schema presence, table structure, then an insert/delete
//! write check. Progress is written to the given output as it happens.

use std::io::{self, Write};

use chrono::Utc;
use serde_json::Value;
use thiserror::Error;

use crate::config::VerifyConfig;
use crate::postgres::{DbRow, ErrorCategory, PostgresPoolError, QueryExecutor};

use super::report::{
    ColumnInfo, ServerInfo, Step, TableStructure, VerificationReport, WriteCheckOutcome,
};

const CONNECTIVITY_SQL: &str = "SELECT NOW() AS current_time, version() AS pg_version";

const TABLES_SQL: &str = r#"
    SELECT table_name::text AS table_name
    FROM information_schema.tables
    WHERE table_schema = $1
    AND table_type = 'BASE TABLE'
    ORDER BY table_name
"#;

const COLUMNS_SQL: &str = r#"
    SELECT column_name::text AS column_name,
           data_type::text AS data_type,
           is_nullable::text AS is_nullable
    FROM information_schema.columns
    WHERE table_schema = $1
    AND table_name = $2
    ORDER BY ordinal_position
"#;

const TEST_USER_NAME: &str = "Test User";
const TEST_USER_PASSWORD: &str = "test_password_hash";

/// Fatal verification failures.
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("{step} failed: {source}")]
    Step {
        step: Step,
        #[source]
        source: PostgresPoolError,
    },

    #[error("{step} returned an unexpected result: missing column `{column}`")]
    UnexpectedShape { step: Step, column: &'static str },

    #[error("Failed to write report: {0}")]
    Output(#[from] io::Error),
}

impl VerifyError {
    /// The database error behind a failed step, if any.
    pub fn database_error(&self) -> Option<&PostgresPoolError> {
        match self {
            VerifyError::Step { source, .. } => Some(source),
            _ => None,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        self.database_error()
            .map(PostgresPoolError::category)
            .unwrap_or(ErrorCategory::Other)
    }
}

fn step_failed(step: Step) -> impl FnOnce(PostgresPoolError) -> VerifyError {
    move |source| VerifyError::Step { step, source }
}

/// Runs the checks against one executor with one configuration.
pub struct Verifier<'a> {
    db: &'a dyn QueryExecutor,
    config: &'a VerifyConfig,
    clock: Box<dyn Fn() -> i64 + Send + Sync>,
}

impl<'a> Verifier<'a> {
    pub fn new(db: &'a dyn QueryExecutor, config: &'a VerifyConfig) -> Self {
        Self {
            db,
            config,
            clock: Box::new(|| Utc::now().timestamp_millis()),
        }
    }

    /// Replace the millisecond clock used to build the test email.
    pub fn with_clock(mut self, clock: impl Fn() -> i64 + Send + Sync + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Run every check in order.
    ///
    /// Missing tables are reported but never returned as an error; the caller
    /// decides what they mean through [`VerificationReport::passed`].
    pub async fn run<W: Write>(&self, out: &mut W) -> Result<VerificationReport, VerifyError> {
        writeln!(out, "Testing database connection...")?;
        writeln!(out)?;

        let server = self.check_connectivity(out).await?;
        let (found_tables, missing_tables) = self.check_tables(out).await?;
        let structures = self.check_structures(out, &found_tables).await?;
        let write_check = self.check_write(out, &found_tables).await?;

        Ok(VerificationReport {
            server,
            found_tables,
            missing_tables,
            structures,
            write_check,
        })
    }

    async fn check_connectivity<W: Write>(&self, out: &mut W) -> Result<ServerInfo, VerifyError> {
        let step = Step::Connectivity;
        writeln!(out, "{}: testing basic connection...", step)?;
        tracing::debug!(step = %step, "Running connectivity check");

        let rows = self
            .db
            .query(CONNECTIVITY_SQL, &[])
            .await
            .map_err(step_failed(step))?;
        let row = rows.first().ok_or(VerifyError::UnexpectedShape {
            step,
            column: "current_time",
        })?;

        let server = ServerInfo {
            current_time: text_column(row, step, "current_time")?,
            version: text_column(row, step, "pg_version")?,
        };

        writeln!(out, "   ok   connection successful")?;
        writeln!(out, "        current time: {}", server.current_time)?;
        writeln!(out, "        server version: {}", server.short_version())?;
        writeln!(out)?;

        Ok(server)
    }

    async fn check_tables<W: Write>(
        &self,
        out: &mut W,
    ) -> Result<(Vec<String>, Vec<String>), VerifyError> {
        let step = Step::SchemaPresence;
        writeln!(out, "{}: checking if tables exist...", step)?;

        let rows = self
            .db
            .query(TABLES_SQL, &[Value::from(self.config.schema.as_str())])
            .await
            .map_err(step_failed(step))?;
        let found = rows
            .iter()
            .map(|row| text_column(row, step, "table_name"))
            .collect::<Result<Vec<_>, _>>()?;

        writeln!(
            out,
            "        found {} table(s): {}",
            found.len(),
            found.join(", ")
        )?;

        let mut missing = Vec::new();
        for table in &self.config.required_tables {
            if found.contains(table) {
                writeln!(out, "   ok   table '{}' exists", table)?;
            } else {
                writeln!(out, "   MISSING table '{}'", table)?;
                tracing::warn!(table = %table, schema = %self.config.schema, "Required table is missing");
                missing.push(table.clone());
            }
        }

        writeln!(out)?;
        if missing.is_empty() {
            writeln!(out, "   ok   all required tables exist")?;
        } else {
            writeln!(
                out,
                "   warning: {} required table(s) missing: {}",
                missing.len(),
                missing.join(", ")
            )?;
        }
        writeln!(out)?;

        Ok((found, missing))
    }

    async fn check_structures<W: Write>(
        &self,
        out: &mut W,
        found: &[String],
    ) -> Result<Vec<TableStructure>, VerifyError> {
        let step = Step::Structure;
        writeln!(out, "{}: checking table structures...", step)?;

        let mut structures = Vec::new();
        for table in self.config.required_tables.iter().filter(|t| found.contains(t)) {
            let rows = self
                .db
                .query(
                    COLUMNS_SQL,
                    &[
                        Value::from(self.config.schema.as_str()),
                        Value::from(table.as_str()),
                    ],
                )
                .await
                .map_err(step_failed(step))?;

            let columns = rows
                .iter()
                .map(|row| -> Result<ColumnInfo, VerifyError> {
                    Ok(ColumnInfo {
                        name: text_column(row, step, "column_name")?,
                        data_type: text_column(row, step, "data_type")?,
                        nullable: text_column(row, step, "is_nullable")? != "NO",
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;

            writeln!(out)?;
            writeln!(out, "        table: {}", table)?;
            for column in &columns {
                writeln!(out, "          - {}", column)?;
            }

            structures.push(TableStructure {
                table: table.clone(),
                columns,
            });
        }
        writeln!(out)?;

        Ok(structures)
    }

    async fn check_write<W: Write>(
        &self,
        out: &mut W,
        found: &[String],
    ) -> Result<WriteCheckOutcome, VerifyError> {
        let step = Step::WriteCheck;
        let table = &self.config.write_check_table;
        if !found.contains(table) {
            writeln!(out, "{}: skipped, table '{}' does not exist", step, table)?;
            writeln!(out)?;
            return Ok(WriteCheckOutcome::Skipped);
        }

        writeln!(out, "{}: testing write operation...", step)?;

        let email = test_email((self.clock)());
        let insert = format!(
            "INSERT INTO {} (name, email, password) VALUES ($1, $2, $3)",
            quote_ident(table)
        );
        let inserted = self
            .db
            .query(
                &insert,
                &[
                    Value::from(TEST_USER_NAME),
                    Value::from(email.as_str()),
                    Value::from(TEST_USER_PASSWORD),
                ],
            )
            .await;

        let outcome = match inserted {
            Ok(_) => {
                writeln!(out, "   ok   write operation successful")?;
                let removed = self
                    .delete_test_row(table, &email)
                    .await
                    .map_err(step_failed(step))?;
                writeln!(out, "   ok   test data cleaned up ({} row(s) removed)", removed)?;
                WriteCheckOutcome::Written { email, removed }
            }
            Err(e) if e.is_unique_violation() => {
                tracing::info!(email = %email, "Test row already exists, treating write access as confirmed");
                let cleaned_up = match self.delete_test_row(table, &email).await {
                    Ok(_) => true,
                    Err(e) => {
                        tracing::warn!(error = %e, email = %email, "Failed to clean up existing test row");
                        false
                    }
                };
                writeln!(
                    out,
                    "   ok   write operation works (test user already exists{})",
                    if cleaned_up { ", cleaned up" } else { "" }
                )?;
                WriteCheckOutcome::AlreadyPresent { email, cleaned_up }
            }
            Err(e) => return Err(step_failed(step)(e)),
        };
        writeln!(out)?;

        Ok(outcome)
    }

    async fn delete_test_row(&self, table: &str, email: &str) -> Result<usize, PostgresPoolError> {
        let delete = format!(
            "DELETE FROM {} WHERE email = $1 RETURNING email::text AS email",
            quote_ident(table)
        );
        let rows = self.db.query(&delete, &[Value::from(email)]).await?;
        Ok(rows.len())
    }
}

/// Email used by the write check.
pub fn test_email(timestamp_millis: i64) -> String {
    format!("test_{}@test.com", timestamp_millis)
}

/// Quote an SQL identifier.
fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn text_column(row: &DbRow, step: Step, column: &'static str) -> Result<String, VerifyError> {
    match row.get(column) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Null) | None => Err(VerifyError::UnexpectedShape { step, column }),
        Some(other) => Ok(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_from_clock() {
        assert_eq!(test_email(1_700_000_000_123), "test_1700000000123@test.com");
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("users"), "\"users\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_text_column() {
        let row = DbRow::new()
            .with("table_name", "users")
            .with("n", 4)
            .with("gone", Value::Null);

        assert_eq!(text_column(&row, Step::SchemaPresence, "table_name").unwrap(), "users");
        assert_eq!(text_column(&row, Step::SchemaPresence, "n").unwrap(), "4");
        assert!(matches!(
            text_column(&row, Step::SchemaPresence, "gone"),
            Err(VerifyError::UnexpectedShape { column: "gone", .. })
        ));
        assert!(matches!(
            text_column(&row, Step::SchemaPresence, "absent"),
            Err(VerifyError::UnexpectedShape { column: "absent", .. })
        ));
    }

    #[test]
    fn test_error_category() {
        let err = VerifyError::Step {
            step: Step::Connectivity,
            source: PostgresPoolError::database("28P01", "password authentication failed"),
        };
        assert_eq!(err.category(), ErrorCategory::Authentication);
        assert!(err.to_string().starts_with("Test 1 (basic connection) failed"));

        let err = VerifyError::UnexpectedShape {
            step: Step::Connectivity,
            column: "pg_version",
        };
        assert_eq!(err.category(), ErrorCategory::Other);
        assert!(err.database_error().is_none());
    }
}
