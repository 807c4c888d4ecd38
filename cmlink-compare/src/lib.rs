//! Joint comparison of two covariance models.
//!
//! Given two models of RNA families, this crate computes the *link score*:
//! the best score a single sequence can achieve under both models at once,
//! together with that sequence, its secondary structure, and the states
//! visited. The computation is a dynamic program over pairs of model states,
//! parameterised by an evaluation [`Algebra`] so the same recursion yields
//! scores, strings, or node traces.
//!
//! # Quick start
//!
//! ```
//! use cmlink_compare::compare;
//! use cmlink_model::mocks;
//!
//! let m = mocks::single_pair();
//! let result = compare(&m, &m, false).unwrap();
//! assert_eq!(result.score1, result.score2);
//! assert_eq!(result.sequence, "AU");
//! assert_eq!(result.structure, "()");
//! ```

pub mod algebra;
pub mod driver;
pub mod engine;
pub mod product;

pub use algebra::{Algebra, Value};
pub use driver::{compare, parse_selector, run_selector, Comparison, OutputPart};
pub use engine::{joint_optima, JointTable};
