//! AdaDelta step rule (Zeiler, 2012)

use super::step_rule::{algorithm_buffer, BufferArena, StepRule};
use crate::error::{Error, Result};
use crate::graph::{Expr, SharedVariable, Updates};

struct AdaDeltaState {
    mean_square_gradient: SharedVariable,
    mean_square_delta: SharedVariable,
}

/// Adapts the step size per element from running averages of squared
/// gradients and squared past steps
///
/// ```text
/// E[g²]  ← ρ·E[g²] + (1 − ρ)·g²
/// Δx     = g · sqrt(E[Δx²] + ε) / sqrt(E[g²] + ε)
/// E[Δx²] ← ρ·E[Δx²] + (1 − ρ)·Δx²
/// ```
pub struct AdaDelta {
    decay_rate: f32,
    epsilon: f32,
    state: BufferArena<AdaDeltaState>,
}

impl AdaDelta {
    /// `decay_rate` must lie in `[0, 1]`, `epsilon` must be non-negative
    pub fn new(decay_rate: f32, epsilon: f32) -> Result<Self> {
        if !(0.0..=1.0).contains(&decay_rate) {
            return Err(Error::InvalidParameter(format!(
                "decay rate must be in [0, 1], got {}",
                decay_rate
            )));
        }
        if epsilon.is_nan() || epsilon < 0.0 {
            return Err(Error::InvalidParameter(format!(
                "epsilon must be non-negative, got {}",
                epsilon
            )));
        }
        Ok(Self {
            decay_rate,
            epsilon,
            state: BufferArena::new(),
        })
    }

    /// AdaDelta with `decay_rate = 0.95`, `epsilon = 1e-6`
    pub fn default_params() -> Self {
        Self {
            decay_rate: 0.95,
            epsilon: 1e-6,
            state: BufferArena::new(),
        }
    }

    pub fn decay_rate(&self) -> f32 {
        self.decay_rate
    }

    pub fn epsilon(&self) -> f32 {
        self.epsilon
    }
}

impl StepRule for AdaDelta {
    fn compute_step(
        &mut self,
        parameter: &SharedVariable,
        previous_step: &Expr,
    ) -> Result<(Expr, Updates)> {
        let (decay, epsilon) = (self.decay_rate, self.epsilon);
        let state = self.state.get_or_allocate(parameter, |p| AdaDeltaState {
            mean_square_gradient: algorithm_buffer(p, "mean_square_gradient"),
            mean_square_delta: algorithm_buffer(p, "mean_square_delta_x"),
        });

        let mean_square_gradient =
            decay * state.mean_square_gradient.expr() + (1.0 - decay) * previous_step.square();
        let rms_delta = (state.mean_square_delta.expr() + epsilon).sqrt();
        let rms_gradient = (&mean_square_gradient + epsilon).sqrt();
        let delta = previous_step * rms_delta / rms_gradient;
        let mean_square_delta =
            decay * state.mean_square_delta.expr() + (1.0 - decay) * delta.square();

        let updates = vec![
            (state.mean_square_gradient.clone(), mean_square_gradient),
            (state.mean_square_delta.clone(), mean_square_delta),
        ];
        Ok((delta, updates))
    }

    fn name(&self) -> &'static str {
        "AdaDelta"
    }
}
