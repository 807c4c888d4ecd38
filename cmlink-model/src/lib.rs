//! Covariance model data structures and Infernal `.cm` parsing.
//!
//! A covariance model (CM) is a stochastic context-free grammar over RNA
//! whose typed states describe both sequence and secondary structure of a
//! family. This crate provides:
//!
//! - **[`Cm`]** — the validated in-memory model: states, transitions,
//!   emissions, local begin/end score maps
//! - **[`parser`]** — reader for Infernal ASCII `.cm` files
//! - **Local configuration** — Infernal-style local begin/end setup
//! - **[`mocks`]** — small hand-built models used across the test suites

pub mod mocks;
pub mod model;
pub mod parser;
pub mod state;

pub use model::{Cm, NodeKind};
pub use parser::{parse_cm_file, parse_cm_str};
pub use state::{Emission, NodeId, State, StateId, StateType};
