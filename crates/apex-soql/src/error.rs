use thiserror::Error;

/// The only `Result::Err` path in this crate (spec.md §7): a query the
/// parser cannot confidently make sense of, rather than a silent best guess.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
#[error("{message} at {line}:{column}")]
pub struct SoqlSyntaxError {
    pub line: u32,
    pub column: u32,
    pub message: String,
}
