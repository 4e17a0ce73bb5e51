//! Results collected by the verification routine.

use std::fmt;

/// The four checks, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Connectivity,
    SchemaPresence,
    Structure,
    WriteCheck,
}

impl Step {
    pub fn number(&self) -> u8 {
        match self {
            Step::Connectivity => 1,
            Step::SchemaPresence => 2,
            Step::Structure => 3,
            Step::WriteCheck => 4,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Step::Connectivity => "basic connection",
            Step::SchemaPresence => "required tables",
            Step::Structure => "table structures",
            Step::WriteCheck => "write operation",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Test {} ({})", self.number(), self.title())
    }
}

/// What the server said about itself during the connectivity check.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerInfo {
    pub current_time: String,
    /// Full `version()` string
    pub version: String,
}

impl ServerInfo {
    /// Product name and version number, e.g. `PostgreSQL 16.2`.
    pub fn short_version(&self) -> String {
        self.version
            .split_whitespace()
            .take(2)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
}

impl fmt::Display for ColumnInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.data_type)?;
        if !self.nullable {
            f.write_str(" NOT NULL")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableStructure {
    pub table: String,
    pub columns: Vec<ColumnInfo>,
}

/// Outcome of the insert/delete write check.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteCheckOutcome {
    /// The test row was inserted and `removed` rows were deleted afterwards
    Written { email: String, removed: usize },
    /// The insert hit the unique constraint; a row with this email already existed
    AlreadyPresent { email: String, cleaned_up: bool },
    /// The write-check table does not exist
    Skipped,
}

impl WriteCheckOutcome {
    /// True when write access was confirmed.
    pub fn confirmed(&self) -> bool {
        !matches!(self, WriteCheckOutcome::Skipped)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VerificationReport {
    pub server: ServerInfo,
    /// Base tables found in the schema, sorted by name
    pub found_tables: Vec<String>,
    /// Required tables that were not found, in configured order
    pub missing_tables: Vec<String>,
    pub structures: Vec<TableStructure>,
    pub write_check: WriteCheckOutcome,
}

impl VerificationReport {
    pub fn all_tables_present(&self) -> bool {
        self.missing_tables.is_empty()
    }

    /// Whether the run counts as a pass. Missing tables only fail in strict mode.
    pub fn passed(&self, strict: bool) -> bool {
        !strict || self.all_tables_present()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(missing: &[&str]) -> VerificationReport {
        VerificationReport {
            server: ServerInfo {
                current_time: "2026-01-01T00:00:00+00:00".to_string(),
                version: "PostgreSQL 16.2 on x86_64-pc-linux-gnu".to_string(),
            },
            found_tables: vec![],
            missing_tables: missing.iter().map(|t| t.to_string()).collect(),
            structures: vec![],
            write_check: WriteCheckOutcome::Skipped,
        }
    }

    #[test]
    fn test_short_version() {
        let r = report(&[]);
        assert_eq!(r.server.short_version(), "PostgreSQL 16.2");

        let info = ServerInfo {
            current_time: String::new(),
            version: "PostgreSQL".to_string(),
        };
        assert_eq!(info.short_version(), "PostgreSQL");
    }

    #[test]
    fn test_column_display() {
        let col = ColumnInfo {
            name: "email".to_string(),
            data_type: "character varying".to_string(),
            nullable: false,
        };
        assert_eq!(col.to_string(), "email (character varying) NOT NULL");

        let col = ColumnInfo {
            name: "note".to_string(),
            data_type: "text".to_string(),
            nullable: true,
        };
        assert_eq!(col.to_string(), "note (text)");
    }

    #[test]
    fn test_passed_depends_on_strictness() {
        let complete = report(&[]);
        assert!(complete.passed(false));
        assert!(complete.passed(true));

        let partial = report(&["budgets"]);
        assert!(partial.passed(false));
        assert!(!partial.passed(true));
    }

    #[test]
    fn test_step_display() {
        assert_eq!(Step::Connectivity.to_string(), "Test 1 (basic connection)");
        assert_eq!(Step::WriteCheck.to_string(), "Test 4 (write operation)");
    }
}
