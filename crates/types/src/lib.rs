//! Shared expression model for the Stencil template engine.
//!
//! Expressions are produced once when a template is parsed and are then reused,
//! unchanged, by every render of that template. Nothing in this crate evaluates
//! an expression; the engine crate owns evaluation.

pub mod expression;

pub use expression::{Expression, Origin, Part};
