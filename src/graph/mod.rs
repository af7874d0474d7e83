//! Minimal symbolic graph
//!
//! Step rules do not compute numbers directly: they build expressions over
//! persistent storage cells, and those expressions are evaluated (and the
//! cells updated) each time a compiled [`Function`] runs.
//!
//! - [`SharedVariable`]: a named, shaped cell that keeps its value between calls
//! - [`Expr`]: a lazily evaluated expression node
//! - [`grad`]: reverse-mode symbolic differentiation
//! - [`Function`]: evaluates outputs and commits an update list atomically

mod eval;
mod expr;
mod function;
mod grad;
mod shared;


use std::collections::HashMap;

pub use expr::{l2_norm, Expr};
pub use function::{Function, Update, Updates};
pub use grad::grad;
pub use shared::SharedVariable;

/// Numeric payload of every cell and expression
pub type Value = ndarray::ArrayD<f32>;

/// Named input values supplied for one call of a [`Function`]
pub type Batch = HashMap<String, Value>;
