//! # Schema Definition
//!
//! The same logical tables, described twice —
//! once per backend — with matching indexes. Applied at startup by
//! `DbBackend::migrate`; this crate does not ship a migration framework
//! (schema migration tooling design is an explicit Non-goal), just a
//! fixed, versionless `CREATE TABLE IF NOT EXISTS` schema.

mod postgres_ddl;
mod sqlite_ddl;

pub use postgres_ddl::STATEMENTS as POSTGRES_STATEMENTS;
pub use sqlite_ddl::STATEMENTS as SQLITE_STATEMENTS;
