#![forbid(unsafe_code)]
//! Parses fully-qualified Apex debug-log symbols
//! (`[namespace.]OuterClass[.InnerClass].method(paramTypes)`) and locates
//! them inside an Apex source file (spec.md §4.7/§4.8).
//!
//! This crate holds no global state: [`locate_symbol`] takes the source text
//! by value and does no file I/O of its own, so callers across multiple
//! files may invoke it concurrently (spec.md §5).

mod ast;
mod error;
mod locator;
mod parser;

pub use error::SymbolError;
pub use locator::{locate_symbol, SymbolLocation};
pub use parser::{parse_symbol, ApexSymbol};
