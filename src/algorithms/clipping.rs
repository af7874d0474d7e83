//! Global-norm step clipping

use super::step_rule::{hyperparameter, StepMap, StepRule};
use crate::error::{Error, Result};
use crate::graph::{l2_norm, Expr, SharedVariable, Updates};

/// Rescales steps so their joint Euclidean norm does not exceed a threshold
///
/// The norm is taken over every element of every parameter's step, so all
/// steps are scaled by the same factor and keep their relative direction.
/// With no threshold the rule passes steps through unchanged.
pub struct StepClipping {
    threshold: Option<SharedVariable>,
}

impl StepClipping {
    pub fn new(threshold: Option<f32>) -> Result<Self> {
        let threshold = match threshold {
            Some(value) if value.is_nan() || value <= 0.0 => {
                return Err(Error::InvalidParameter(format!(
                    "clipping threshold must be positive, got {}",
                    value
                )))
            }
            Some(value) => Some(hyperparameter(value, "threshold")),
            None => None,
        };
        Ok(Self { threshold })
    }

    /// No clipping
    pub fn disabled() -> Self {
        Self { threshold: None }
    }

    pub fn threshold(&self) -> Option<&SharedVariable> {
        self.threshold.as_ref()
    }
}

impl StepRule for StepClipping {
    fn compute_steps(&mut self, previous_steps: &StepMap) -> Result<(StepMap, Updates)> {
        let Some(threshold) = &self.threshold else {
            return Ok((previous_steps.clone(), Updates::new()));
        };

        let norm = l2_norm(previous_steps.values());
        let threshold = threshold.expr();
        let multiplier = Expr::switch(
            &norm.less(&threshold),
            &Expr::scalar(1.0),
            &(&threshold / &norm),
        );

        let steps: StepMap = previous_steps
            .iter()
            .map(|(parameter, step)| (parameter.clone(), step * &multiplier))
            .collect();
        Ok((steps, Updates::new()))
    }

    fn name(&self) -> &'static str {
        "StepClipping"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::testing::{scalars, value, values};
    use crate::graph::SharedVariable;
    use approx::assert_relative_eq;

    #[test]
    fn test_clips_when_norm_exceeds_threshold() {
        let (params, gradients) = scalars(&[3.0, 4.0]);
        let (clipped, updates) = StepClipping::new(Some(4.0))
            .unwrap()
            .compute_steps(&gradients)
            .unwrap();

        assert!(updates.is_empty());
        assert_relative_eq!(value(&clipped[&params[0]]), 12.0 / 5.0, max_relative = 1e-6);
        assert_relative_eq!(value(&clipped[&params[1]]), 16.0 / 5.0, max_relative = 1e-6);
    }

    #[test]
    fn test_passes_through_below_threshold() {
        let (params, gradients) = scalars(&[3.0, 4.0]);
        let (clipped, _) = StepClipping::new(Some(5.0))
            .unwrap()
            .compute_steps(&gradients)
            .unwrap();

        assert_relative_eq!(value(&clipped[&params[0]]), 3.0);
        assert_relative_eq!(value(&clipped[&params[1]]), 4.0);
    }

    #[test]
    fn test_norm_spans_all_elements() {
        let w = SharedVariable::from_vec(vec![1.0, 2.0, 2.0], "w");
        let b = SharedVariable::from_vec(vec![4.0], "b");
        let gradients: StepMap = [(w.clone(), w.expr()), (b.clone(), b.expr())]
            .into_iter()
            .collect();

        // |[1, 2, 2, 4]| = 5
        let (clipped, _) = StepClipping::new(Some(2.5))
            .unwrap()
            .compute_steps(&gradients)
            .unwrap();
        let w_step = values(&clipped[&w]);
        assert_relative_eq!(w_step[1], 1.0, max_relative = 1e-6);
        assert_relative_eq!(values(&clipped[&b])[0], 2.0, max_relative = 1e-6);
    }

    #[test]
    fn test_disabled_is_identity() {
        let (params, gradients) = scalars(&[300.0]);
        let (clipped, _) = StepClipping::disabled().compute_steps(&gradients).unwrap();
        assert_relative_eq!(value(&clipped[&params[0]]), 300.0);
    }

    #[test]
    fn test_threshold_is_adjustable() {
        let (params, gradients) = scalars(&[3.0, 4.0]);
        let mut rule = StepClipping::new(Some(10.0)).unwrap();
        let (clipped, _) = rule.compute_steps(&gradients).unwrap();
        assert_relative_eq!(value(&clipped[&params[0]]), 3.0);

        if let Some(threshold) = rule.threshold() {
            threshold.set_value(ndarray::arr0(1.0).into_dyn());
        }
        assert_relative_eq!(value(&clipped[&params[0]]), 0.6, max_relative = 1e-6);
    }

    #[test]
    fn test_rejects_non_positive_threshold() {
        assert!(StepClipping::new(Some(0.0)).is_err());
        assert!(StepClipping::new(Some(-1.0)).is_err());
        assert!(StepClipping::new(Some(f32::NAN)).is_err());
        assert!(StepClipping::new(None).is_ok());
    }
}
