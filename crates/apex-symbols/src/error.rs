use thiserror::Error;

/// The one fatal error in the symbol path (spec.md §4.7/§7).
#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum SymbolError {
    #[error("Invalid symbol: {0}")]
    InvalidSymbol(String),
}
