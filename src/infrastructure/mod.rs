//! Infrastructure layer modules
//!
//! - `postgres`: PostgreSQL connection pool, dynamic rows and the query seam

pub mod postgres;
