//! Schema and connectivity verification.
//!
//! - `routine`: the four sequential checks
//! - `report`: typed results of a run
//! - `diagnostics`: failure output and remediation hints

pub mod diagnostics;
pub mod report;
pub mod routine;

pub use diagnostics::{remediation, write_failure, write_missing_url_help, write_success, Remediation};
pub use report::{
    ColumnInfo, ServerInfo, Step, TableStructure, VerificationReport, WriteCheckOutcome,
};
pub use routine::{test_email, Verifier, VerifyError};
