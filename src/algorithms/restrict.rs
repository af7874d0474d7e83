//! Restricting a step rule to a subset of parameters

use super::step_rule::{assert_same_keys, StepMap, StepRule};
use crate::error::Result;
use crate::graph::{SharedVariable, Updates};
use std::collections::HashSet;
use tracing::warn;

/// Applies a rule only to selected parameters
///
/// Steps of parameters outside the selection pass through unchanged. The
/// wrapped rule's updates are returned as they are.
pub struct Restrict {
    rule: Box<dyn StepRule>,
    parameters: HashSet<SharedVariable>,
}

impl Restrict {
    pub fn new(
        rule: impl StepRule + 'static,
        parameters: impl IntoIterator<Item = SharedVariable>,
    ) -> Self {
        Self::boxed(Box::new(rule), parameters)
    }

    pub fn boxed(
        rule: Box<dyn StepRule>,
        parameters: impl IntoIterator<Item = SharedVariable>,
    ) -> Self {
        Self {
            rule,
            parameters: parameters.into_iter().collect(),
        }
    }

    pub fn contains(&self, parameter: &SharedVariable) -> bool {
        self.parameters.contains(parameter)
    }

    pub fn rule(&self) -> &dyn StepRule {
        self.rule.as_ref()
    }
}

impl StepRule for Restrict {
    fn compute_steps(&mut self, previous_steps: &StepMap) -> Result<(StepMap, Updates)> {
        let selected: StepMap = previous_steps
            .iter()
            .filter(|(parameter, _)| self.parameters.contains(*parameter))
            .map(|(parameter, step)| (parameter.clone(), step.clone()))
            .collect();

        if selected.len() < self.parameters.len() {
            warn!(
                requested = self.parameters.len(),
                present = selected.len(),
                "restricted step rule names parameters without steps"
            );
        }

        let (transformed, updates) = self.rule.compute_steps(&selected)?;
        assert_same_keys(self.rule.name(), &selected, &transformed);

        let steps: StepMap = previous_steps
            .iter()
            .map(|(parameter, step)| {
                let step = transformed.get(parameter).unwrap_or(step);
                (parameter.clone(), step.clone())
            })
            .collect();
        Ok((steps, updates))
    }

    fn name(&self) -> &'static str {
        "Restrict"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::testing::value;
    use crate::algorithms::Scale;
    use crate::graph::Expr;
    use approx::assert_relative_eq;

    /// Adds 2 to each step and records one update per parameter
    struct DummyUpdates;

    impl StepRule for DummyUpdates {
        fn compute_step(
            &mut self,
            parameter: &SharedVariable,
            previous_step: &Expr,
        ) -> Result<(Expr, Updates)> {
            Ok((
                previous_step + 2.0,
                vec![(parameter.clone(), parameter.expr() * 100.0)],
            ))
        }
    }

    fn squares() -> (Vec<SharedVariable>, StepMap) {
        let params: Vec<_> = (0..6)
            .map(|i| SharedVariable::scalar((i * i) as f32, format!("p{}", i)))
            .collect();
        let steps = params.iter().map(|p| (p.clone(), p.expr())).collect();
        (params, steps)
    }

    #[test]
    fn test_restrict_scale() {
        let (params, gradients) = squares();
        let mut rule = Restrict::new(Scale::new(0.1), [params[1].clone(), params[4].clone()]);

        let (steps, updates) = rule.compute_steps(&gradients).unwrap();
        assert!(updates.is_empty());

        let expected = [0.0, 0.1, 4.0, 9.0, 1.6, 25.0];
        for (param, expected) in params.iter().zip(expected) {
            assert_relative_eq!(value(&steps[param]), expected, max_relative = 1e-6);
        }
    }

    #[test]
    fn test_restrict_passes_wrapped_updates_through() {
        let (params, gradients) = squares();
        let mut rule = Restrict::new(DummyUpdates, [params[1].clone(), params[4].clone()]);

        let (steps, updates) = rule.compute_steps(&gradients).unwrap();

        let expected = [0.0, 3.0, 4.0, 9.0, 18.0, 25.0];
        for (param, expected) in params.iter().zip(expected) {
            assert_relative_eq!(value(&steps[param]), expected);
        }

        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0].0, params[1]);
        assert_eq!(updates[1].0, params[4]);
        assert_relative_eq!(value(&updates[0].1), 100.0);
        assert_relative_eq!(value(&updates[1].1), 1600.0);
    }

    #[test]
    fn test_restrict_preserves_key_order() {
        let (params, gradients) = squares();
        let mut rule = Restrict::new(Scale::new(2.0), [params[5].clone()]);

        let (steps, _) = rule.compute_steps(&gradients).unwrap();
        let keys: Vec<_> = steps.keys().cloned().collect();
        assert_eq!(keys, params);
    }

    #[test]
    fn test_restrict_to_absent_parameters_is_identity() {
        let (params, gradients) = squares();
        let outsider = SharedVariable::scalar(1.0, "outsider");
        let mut rule = Restrict::new(Scale::new(0.5), [outsider.clone()]);

        assert!(rule.contains(&outsider));
        let (steps, _) = rule.compute_steps(&gradients).unwrap();
        assert_relative_eq!(value(&steps[&params[3]]), 9.0);
    }
}
