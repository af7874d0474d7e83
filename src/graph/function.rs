//! Compiled procedures with atomic updates

use super::eval::Evaluator;
use super::expr::schedule;
use super::{Batch, Expr, SharedVariable, Value};
use crate::error::{Error, Result};
use std::collections::HashSet;
use tracing::debug;

/// Assignment of a new value expression to a shared variable
pub type Update = (SharedVariable, Expr);

/// Ordered list of assignments
pub type Updates = Vec<Update>;

/// Procedure that evaluates outputs and commits updates
///
/// On each [`call`](Function::call) every output and every update
/// expression is evaluated against the cell values as they were when the
/// call started; only then are the new values written. If anything fails
/// nothing is written.
///
/// The evaluation order of every node is fixed at compile time, so a call
/// visits each node of the combined graph once.
pub struct Function {
    outputs: Vec<Expr>,
    updates: Updates,
    schedule: Vec<Expr>,
}

impl Function {
    /// Build a function, rejecting update lists that assign a cell twice
    pub fn compile(outputs: Vec<Expr>, updates: Updates) -> Result<Self> {
        let mut targets = HashSet::new();
        for (variable, _) in &updates {
            if !targets.insert(variable.id()) {
                return Err(Error::DuplicateUpdate(variable.name().to_string()));
            }
        }

        let roots = outputs.iter().chain(updates.iter().map(|(_, expr)| expr));
        let schedule = schedule(roots, |_| false);

        debug!(
            outputs = outputs.len(),
            updates = updates.len(),
            nodes = schedule.len(),
            "compiled function"
        );

        Ok(Self {
            outputs,
            updates,
            schedule,
        })
    }

    pub fn outputs(&self) -> &[Expr] {
        &self.outputs
    }

    pub fn updates(&self) -> &[Update] {
        &self.updates
    }

    /// Number of distinct nodes evaluated per call
    pub fn node_count(&self) -> usize {
        self.schedule.len()
    }

    /// Evaluate outputs, then commit all updates together
    pub fn call(&self, batch: &Batch) -> Result<Vec<Value>> {
        let mut evaluator = Evaluator::new(batch);
        evaluator.run(&self.schedule)?;

        let outputs = self
            .outputs
            .iter()
            .map(|output| evaluator.value(output))
            .collect::<Result<Vec<_>>>()?;

        let mut staged = Vec::with_capacity(self.updates.len());
        for (variable, expr) in &self.updates {
            let value = evaluator.value(expr)?;
            let expected = variable.shape();
            if value.shape() != expected.as_slice() {
                return Err(Error::ShapeMismatch {
                    expected,
                    got: value.shape().to_vec(),
                });
            }
            staged.push((variable, value));
        }

        for (variable, value) in staged {
            variable.set_value(value);
        }

        Ok(outputs)
    }
}
