//! Replacement of non-finite steps

use super::step_rule::StepRule;
use crate::error::Result;
use crate::graph::{Expr, SharedVariable, Updates};

/// Replaces a step containing NaN or infinity by a multiple of the parameter
///
/// If any element of a parameter's incoming step is not finite, the whole
/// step becomes `scaler · parameter`, which shrinks the parameter towards
/// zero when subtracted. Finite steps pass through untouched.
pub struct RemoveNotFinite {
    scaler: f32,
}

impl RemoveNotFinite {
    pub fn new(scaler: f32) -> Self {
        Self { scaler }
    }

    pub fn scaler(&self) -> f32 {
        self.scaler
    }
}

impl Default for RemoveNotFinite {
    fn default() -> Self {
        Self::new(0.1)
    }
}

impl StepRule for RemoveNotFinite {
    fn compute_step(
        &mut self,
        parameter: &SharedVariable,
        previous_step: &Expr,
    ) -> Result<(Expr, Updates)> {
        let step = Expr::switch(
            &previous_step.any_not_finite(),
            &(self.scaler * parameter.expr()),
            previous_step,
        );
        Ok((step, Updates::new()))
    }

    fn name(&self) -> &'static str {
        "RemoveNotFinite"
    }
}
