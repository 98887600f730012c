#![forbid(unsafe_code)]
//! Parses SOQL statements embedded in an Apex debug log, lints them against a
//! fixed rule set, and aggregates database access across a parsed log by
//! query/DML shape (spec.md §4.9).
//!
//! This crate holds no global state and performs no I/O: [`parse_soql`] and
//! [`lint`] operate on a borrowed string, and [`aggregate_database_access`]
//! operates on a borrowed, already-frozen `apex_log_parser::ApexLog`.

mod aggregator;
mod error;
mod linter;
mod parser;

pub use aggregator::{aggregate_database_access, AccessKind, DatabaseAccessSummary};
pub use error::SoqlSyntaxError;
pub use linter::{lint, Finding};
pub use parser::{parse_soql, LimitValue, SoqlQuery};
