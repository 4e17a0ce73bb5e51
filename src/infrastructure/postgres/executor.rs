//! Query execution seam.
//!
//! Consumers take a `&dyn QueryExecutor` instead of a concrete pool so that
//! tests can run them against scripted substitutes.

use async_trait::async_trait;
use serde_json::Value;

use super::{DbRow, PostgresPoolError};

#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Run `sql` with positional (`$1`, `$2`, ...) parameters and return its rows.
    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<DbRow>, PostgresPoolError>;

    /// Alias of [`QueryExecutor::query`] for call sites written against
    /// execute-style client APIs.
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<Vec<DbRow>, PostgresPoolError> {
        self.query(sql, params).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Echoes the SQL and parameters back as one row per parameter.
    struct EchoExecutor;

    #[async_trait]
    impl QueryExecutor for EchoExecutor {
        async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<DbRow>, PostgresPoolError> {
            if sql.contains("fail") {
                return Err(PostgresPoolError::database("42601", "syntax error"));
            }
            Ok(params
                .iter()
                .enumerate()
                .map(|(i, p)| {
                    DbRow::new()
                        .with("sql", sql)
                        .with("position", i + 1)
                        .with("value", p.clone())
                })
                .collect())
        }
    }

    #[tokio::test]
    async fn test_execute_matches_query() {
        let db = EchoExecutor;
        let cases: Vec<(&str, Vec<Value>)> = vec![
            ("SELECT 1", vec![]),
            ("SELECT $1", vec![json!("a")]),
            ("INSERT INTO t VALUES ($1, $2, $3)", vec![json!(1), json!(null), json!(true)]),
        ];

        for (sql, params) in cases {
            let queried = db.query(sql, &params).await.unwrap();
            let executed = db.execute(sql, &params).await.unwrap();
            assert_eq!(queried, executed);
            assert_eq!(queried.len(), params.len());
        }
    }

    #[tokio::test]
    async fn test_execute_propagates_errors() {
        let db = EchoExecutor;
        let queried = db.query("fail", &[]).await.unwrap_err();
        let executed = db.execute("fail", &[]).await.unwrap_err();
        assert_eq!(queried.code(), executed.code());
        assert_eq!(queried.to_string(), executed.to_string());
    }
}
