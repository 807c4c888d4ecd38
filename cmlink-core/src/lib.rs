//! Shared primitives for the cmlink covariance model comparison tool.
//!
//! `cmlink-core` provides the foundation the other cmlink crates build on:
//!
//! - **Error types** — [`CmLinkError`] and [`Result`] for structured error handling
//! - **Scores** — [`BitScore`], log-odds bit scores with an impossible sentinel
//! - **Alphabet** — canonical RNA nucleotide and base-pair orderings

pub mod alphabet;
pub mod error;
pub mod score;

pub use error::{CmLinkError, Result};
pub use score::BitScore;
