//! RMSProp step rules

use super::composite::chain;
use super::step_rule::{algorithm_buffer, BufferArena, StepMap, StepRule};
use super::Scale;
use crate::error::{Error, Result};
use crate::graph::{Expr, SharedVariable, Updates};

/// Divides steps by a running root mean square of past steps
///
/// ```text
/// E[s²] ← ρ·E[s²] + (1 − ρ)·s²
/// step  = s / max(sqrt(E[s²]), 1 / max_scaling)
/// ```
///
/// The floor on the denominator bounds the effective scaling of any step
/// by `max_scaling`.
pub struct BasicRMSProp {
    decay_rate: f32,
    max_scaling: f32,
    mean_squares: BufferArena<SharedVariable>,
}

impl BasicRMSProp {
    /// `decay_rate` must lie in `[0, 1]`, `max_scaling` must be positive
    pub fn new(decay_rate: f32, max_scaling: f32) -> Result<Self> {
        if !(0.0..=1.0).contains(&decay_rate) {
            return Err(Error::InvalidParameter(format!(
                "decay rate must be in [0, 1], got {}",
                decay_rate
            )));
        }
        if max_scaling.is_nan() || max_scaling <= 0.0 {
            return Err(Error::InvalidParameter(format!(
                "max scaling must be positive, got {}",
                max_scaling
            )));
        }
        Ok(Self {
            decay_rate,
            max_scaling,
            mean_squares: BufferArena::new(),
        })
    }

    /// BasicRMSProp with `decay_rate = 0.9`, `max_scaling = 1e5`
    pub fn default_params() -> Self {
        Self {
            decay_rate: 0.9,
            max_scaling: 1e5,
            mean_squares: BufferArena::new(),
        }
    }

    pub fn decay_rate(&self) -> f32 {
        self.decay_rate
    }

    pub fn max_scaling(&self) -> f32 {
        self.max_scaling
    }

    /// Smallest allowed root mean square, `1 / max_scaling`
    pub fn epsilon(&self) -> f32 {
        1.0 / self.max_scaling
    }
}

impl StepRule for BasicRMSProp {
    fn compute_step(
        &mut self,
        parameter: &SharedVariable,
        previous_step: &Expr,
    ) -> Result<(Expr, Updates)> {
        let decay = self.decay_rate;
        let epsilon = Expr::scalar(self.epsilon());
        let mean_square = self
            .mean_squares
            .get_or_allocate(parameter, |p| algorithm_buffer(p, "mean_square_step"));

        let mean_square_t =
            decay * mean_square.expr() + (1.0 - decay) * previous_step.square();
        let rms = mean_square_t.sqrt().maximum(&epsilon);
        let step = previous_step / rms;

        Ok((step, vec![(mean_square.clone(), mean_square_t)]))
    }

    fn name(&self) -> &'static str {
        "BasicRMSProp"
    }
}

/// RMSProp: [`BasicRMSProp`] followed by [`Scale`]
pub struct RMSProp {
    basic: BasicRMSProp,
    scale: Scale,
}

impl RMSProp {
    pub fn new(learning_rate: f32, decay_rate: f32, max_scaling: f32) -> Result<Self> {
        Ok(Self {
            basic: BasicRMSProp::new(decay_rate, max_scaling)?,
            scale: Scale::new(learning_rate),
        })
    }

    pub fn learning_rate(&self) -> &SharedVariable {
        self.scale.learning_rate()
    }

    pub fn decay_rate(&self) -> f32 {
        self.basic.decay_rate()
    }

    pub fn max_scaling(&self) -> f32 {
        self.basic.max_scaling()
    }
}

impl StepRule for RMSProp {
    fn compute_steps(&mut self, previous_steps: &StepMap) -> Result<(StepMap, Updates)> {
        let rules: [&mut (dyn StepRule + 'static); 2] = [&mut self.basic, &mut self.scale];
        chain(rules, previous_steps)
    }

    fn name(&self) -> &'static str {
        "RMSProp"
    }
}
