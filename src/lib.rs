//! # Pasos: Composable Step Rules for Gradient Training
//!
//! Pasos turns gradients into parameter steps. A step rule maps each
//! parameter's gradient to a step plus the state updates it needs (momentum
//! velocities, running averages, time counters); rules compose into chains
//! and can be restricted to a subset of parameters. A gradient descent
//! driver compiles `p ← p − step` together with all state updates into one
//! atomic procedure run once per batch.
//!
//! ## Architecture
//!
//! - **graph**: Shared variables, lazy expressions, symbolic gradients, compiled functions
//! - **roles**: Semantic role tags on graph variables
//! - **algorithms**: Step rules (Scale, Momentum, AdaDelta, RMSProp, Adam, ...) and
//!   the gradient descent driver
//! - **config**: Declarative YAML description of step rules
//!
//! ## Example
//!
//! ```
//! use pasos::algorithms::{CompositeRule, GradientDescent, Momentum, StepClipping, TrainingAlgorithm};
//! use pasos::graph::{Batch, SharedVariable};
//!
//! let w = SharedVariable::from_vec(vec![3.0, -4.0], "W");
//! let cost = w.expr().square().sum();
//!
//! let rule = CompositeRule::default()
//!     .with(StepClipping::new(Some(1.0))?)
//!     .with(Momentum::new(0.1, 0.5)?);
//!
//! let mut algorithm = GradientDescent::builder()
//!     .cost(cost)
//!     .parameters([w.clone()])
//!     .step_rule(rule)
//!     .build()?;
//! algorithm.initialize()?;
//!
//! for _ in 0..200 {
//!     algorithm.process_batch(&Batch::new())?;
//! }
//! assert!(w.get_value().iter().all(|x| x.abs() < 1e-2));
//! # Ok::<(), pasos::Error>(())
//! ```

pub mod algorithms;
pub mod config;
pub mod graph;
pub mod roles;

pub mod error;

// Re-export commonly used types
pub use algorithms::{GradientDescent, StepMap, StepRule, TrainingAlgorithm};
pub use error::{Error, Result};
pub use graph::{Expr, SharedVariable};
