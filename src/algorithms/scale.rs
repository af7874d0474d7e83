//! Learning-rate scaling

use super::step_rule::{hyperparameter, scalar_value, StepRule};
use crate::error::Result;
use crate::graph::{Expr, SharedVariable, Updates};

/// Multiplies every step by a learning rate
///
/// The learning rate lives in a scalar shared variable, so it can be
/// changed between batches without rebuilding the training function.
pub struct Scale {
    learning_rate: SharedVariable,
}

impl Scale {
    pub fn new(learning_rate: f32) -> Self {
        Self {
            learning_rate: hyperparameter(learning_rate, "learning_rate"),
        }
    }

    /// Shared cell holding the learning rate
    pub fn learning_rate(&self) -> &SharedVariable {
        &self.learning_rate
    }

    /// Current learning rate
    pub fn lr(&self) -> f32 {
        scalar_value(&self.learning_rate)
    }

    pub fn set_lr(&self, learning_rate: f32) {
        self.learning_rate
            .set_value(ndarray::arr0(learning_rate).into_dyn());
    }
}

impl Default for Scale {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl StepRule for Scale {
    fn compute_step(
        &mut self,
        _parameter: &SharedVariable,
        previous_step: &Expr,
    ) -> Result<(Expr, Updates)> {
        Ok((self.learning_rate.expr() * previous_step, Updates::new()))
    }

    fn name(&self) -> &'static str {
        "Scale"
    }
}
