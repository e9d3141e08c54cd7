//! # strata-core
//!
//! Foundational types for the STRATA multi-resolution hierarchy:
//!
//! - **Adjacency**: packed CSR-style weighted adjacency storage ([`AdjacencyStore`], [`Link`])
//! - **Errors**: unified error handling with [`StrataError`]
//! - **Progress**: the [`ProgressCallback`] protocol for long-running operations
//! - **Constants**: shared numeric constants used across the hierarchy crates

pub mod adjacency;
pub mod constants;
pub mod errors;
pub mod progress;

pub use adjacency::{AdjacencyStore, Link, LINK_RECORD_SIZE};
pub use constants::{GRAIN_SIZE, INVALID, MAX_DEPTH, RCPOVERFLOW};
pub use errors::{Result, StrataError};
pub use progress::ProgressCallback;
