//! Adam step rule (Kingma & Ba, 2014)

use super::step_rule::{algorithm_buffer, scalar_buffer, scalar_value, BufferArena, StepRule};
use crate::error::{Error, Result};
use crate::graph::{Expr, SharedVariable, Updates};

struct AdamState {
    mean: SharedVariable,
    variance: SharedVariable,
    time: SharedVariable,
}

/// Adam with bias correction and a decaying first-moment coefficient
///
/// `beta1` and `beta2` are the weights given to the *new* gradient in the
/// first and second moment estimates (so `beta1 = 0.1` corresponds to the
/// usual `β₁ = 0.9`). With `t` the number of previous calls:
///
/// ```text
/// t₁   = t + 1
/// lr_t = lr · sqrt(1 − (1 − β₂)^t₁) / (1 − (1 − β₁)^t₁)
/// β₁,t = 1 − (1 − β₁) · (1 − λ)^(t₁ − 1)
/// m    ← β₁,t · g + (1 − β₁,t) · m
/// v    ← β₂ · g² + (1 − β₂) · v
/// step = lr_t · m / (sqrt(v) + ε)
/// ```
///
/// A `decay_factor` λ close to 1 makes the first moment follow the latest
/// gradient after the first call; a small λ keeps β₁ fixed.
pub struct Adam {
    learning_rate: f32,
    beta1: f32,
    beta2: f32,
    epsilon: f32,
    decay_factor: f32,
    state: BufferArena<AdamState>,
}

impl Adam {
    pub fn new(
        learning_rate: f32,
        beta1: f32,
        beta2: f32,
        epsilon: f32,
        decay_factor: f32,
    ) -> Result<Self> {
        for (name, value) in [
            ("beta1", beta1),
            ("beta2", beta2),
            ("decay_factor", decay_factor),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(Error::InvalidParameter(format!(
                    "{} must be in (0, 1], got {}",
                    name, value
                )));
            }
        }
        if epsilon.is_nan() || epsilon < 0.0 {
            return Err(Error::InvalidParameter(format!(
                "epsilon must be non-negative, got {}",
                epsilon
            )));
        }
        Ok(Self {
            learning_rate,
            beta1,
            beta2,
            epsilon,
            decay_factor,
            state: BufferArena::new(),
        })
    }

    /// Adam with the given learning rate and default moment parameters
    pub fn default_params(learning_rate: f32) -> Self {
        Self {
            learning_rate,
            beta1: 0.1,
            beta2: 0.001,
            epsilon: 1e-8,
            decay_factor: 1.0 - 1e-8,
            state: BufferArena::new(),
        }
    }

    pub fn lr(&self) -> f32 {
        self.learning_rate
    }

    pub fn beta1(&self) -> f32 {
        self.beta1
    }

    pub fn beta2(&self) -> f32 {
        self.beta2
    }

    /// Number of updates committed so far for `parameter`
    pub fn time(&self, parameter: &SharedVariable) -> Option<f32> {
        self.state
            .get(parameter)
            .map(|state| scalar_value(&state.time))
    }
}

impl Default for Adam {
    fn default() -> Self {
        Self::default_params(0.002)
    }
}

impl StepRule for Adam {
    fn compute_step(
        &mut self,
        parameter: &SharedVariable,
        previous_step: &Expr,
    ) -> Result<(Expr, Updates)> {
        let (lr, beta1, beta2) = (self.learning_rate, self.beta1, self.beta2);
        let (epsilon, decay_factor) = (self.epsilon, self.decay_factor);
        let state = self.state.get_or_allocate(parameter, |p| AdamState {
            mean: algorithm_buffer(p, "mean"),
            variance: algorithm_buffer(p, "variance"),
            time: scalar_buffer(p, "time", 0.0),
        });

        let t1 = state.time.expr() + 1.0;
        let learning_rate = lr * (1.0 - Expr::scalar(1.0 - beta2).pow(&t1)).sqrt()
            / (1.0 - Expr::scalar(1.0 - beta1).pow(&t1));
        let beta_1t = 1.0 - (1.0 - beta1) * Expr::scalar(1.0 - decay_factor).pow(&(&t1 - 1.0));
        let mean_t = &beta_1t * previous_step + (1.0 - &beta_1t) * state.mean.expr();
        let variance_t =
            beta2 * previous_step.square() + (1.0 - beta2) * state.variance.expr();
        let step = learning_rate * &mean_t / (variance_t.sqrt() + epsilon);

        let updates = vec![
            (state.mean.clone(), mean_t),
            (state.variance.clone(), variance_t),
            (state.time.clone(), t1),
        ];
        Ok((step, updates))
    }

    fn name(&self) -> &'static str {
        "Adam"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::testing::{compile, quadratic, run};
    use approx::assert_relative_eq;

    #[test]
    fn test_adam() {
        let (a, gradients) = quadratic(&[3.0, 4.0]);
        let (steps, updates) = Adam::default().compute_steps(&gradients).unwrap();
        let f = compile(&steps, updates, &a);

        for expected in [0.002, 0.010_526_21, 0.007_380_05] {
            let step = run(&f);
            assert_relative_eq!(step[0], expected, max_relative = 1e-4);
            assert_relative_eq!(step[1], expected, max_relative = 1e-4);
        }
    }

    #[test]
    fn test_adam_changing_gradient() {
        let (a, gradients) = quadratic(&[3.0]);
        let mut rule = Adam::default();
        let (steps, updates) = rule.compute_steps(&gradients).unwrap();
        let f = compile(&steps, updates, &a);

        assert_relative_eq!(run(&f)[0], 0.002, max_relative = 1e-4);
        a.set_value(ndarray::arr1(&[2.0]).into_dyn());
        assert_relative_eq!(run(&f)[0], 0.008_258_32, max_relative = 1e-4);
        a.set_value(ndarray::arr1(&[1.0]).into_dyn());
        assert_relative_eq!(run(&f)[0], 0.003_417_29, max_relative = 1e-4);

        assert_eq!(rule.time(&a), Some(3.0));
    }

    #[test]
    fn test_adam_small_decay_factor_keeps_beta1() {
        // With λ → 0 the rule is plain Adam, whose steps stay at lr for a
        // constant gradient.
        let (a, gradients) = quadratic(&[3.0]);
        let mut rule = Adam::new(0.002, 0.1, 0.001, 1e-8, 1e-8).unwrap();
        let (steps, updates) = rule.compute_steps(&gradients).unwrap();
        let f = compile(&steps, updates, &a);

        for _ in 0..3 {
            assert_relative_eq!(run(&f)[0], 0.002, max_relative = 1e-4);
        }
    }

    #[test]
    fn test_adam_time_is_tracked_per_parameter() {
        let (a, gradients_a) = quadratic(&[1.0]);
        let (b, gradients_b) = quadratic(&[1.0]);
        let mut rule = Adam::default();

        let (steps_a, updates_a) = rule.compute_steps(&gradients_a).unwrap();
        let (_, _) = rule.compute_steps(&gradients_b).unwrap();
        let f = compile(&steps_a, updates_a, &a);
        run(&f);
        run(&f);

        assert_eq!(rule.time(&a), Some(2.0));
        assert_eq!(rule.time(&b), Some(0.0));
    }

    #[test]
    fn test_adam_sanity_check() {
        assert!(Adam::new(0.002, 0.0, 0.001, 1e-8, 1.0).is_err());
        assert!(Adam::new(0.002, 0.1, 1.5, 1e-8, 1.0).is_err());
        assert!(Adam::new(0.002, 0.1, 0.001, -1.0, 1.0).is_err());
        assert!(Adam::new(0.002, 0.1, 0.001, 1e-8, 0.0).is_err());
        assert!(Adam::new(0.002, 0.1, 0.001, 1e-8, 1.0 - 1e-8).is_ok());
    }
}
