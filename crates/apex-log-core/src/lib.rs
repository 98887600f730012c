#![forbid(unsafe_code)]
//! Shared primitives used across the Apex debug log analyzer crates.
//!
//! This crate is intentionally small and has no knowledge of the log format
//! itself: it holds the handful of types ([`Severity`], [`Namespace`],
//! [`LineIndex`]) that `apex-log-parser`, `apex-symbols`, and `apex-soql` all
//! need and would otherwise each redefine.

mod duration;
mod namespace;
mod severity;
pub mod text;

pub use duration::{Counter, Duration, Nanos};
pub use namespace::{parse_object_namespace, parse_vf_namespace, Namespace};
pub use severity::Severity;
