//! Sequential composition of step rules

use super::step_rule::{assert_same_keys, StepMap, StepRule};
use crate::error::Result;
use crate::graph::Updates;

/// Chains rules: each rule receives the previous rule's steps
///
/// The update lists of all rules are concatenated in rule order. An empty
/// chain is the identity with no updates.
///
/// # Example
///
/// ```
/// use pasos::algorithms::{CompositeRule, Scale, StepClipping};
///
/// let rule = CompositeRule::new(vec![
///     Box::new(StepClipping::new(Some(4.0))?),
///     Box::new(Scale::new(0.1)),
/// ]);
/// assert_eq!(rule.len(), 2);
/// # Ok::<(), pasos::Error>(())
/// ```
#[derive(Default)]
pub struct CompositeRule {
    rules: Vec<Box<dyn StepRule>>,
}

impl CompositeRule {
    pub fn new(rules: Vec<Box<dyn StepRule>>) -> Self {
        Self { rules }
    }

    /// Append a rule at the end of the chain
    pub fn push(&mut self, rule: impl StepRule + 'static) {
        self.rules.push(Box::new(rule));
    }

    /// Builder-style [`push`](CompositeRule::push)
    pub fn with(mut self, rule: impl StepRule + 'static) -> Self {
        self.push(rule);
        self
    }

    pub fn rules(&self) -> &[Box<dyn StepRule>] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl StepRule for CompositeRule {
    fn compute_steps(&mut self, previous_steps: &StepMap) -> Result<(StepMap, Updates)> {
        chain(
            self.rules.iter_mut().map(|rule| &mut **rule),
            previous_steps,
        )
    }

    fn name(&self) -> &'static str {
        "CompositeRule"
    }
}

/// Thread `previous_steps` through `rules` in order, collecting updates
pub(crate) fn chain<'a>(
    rules: impl IntoIterator<Item = &'a mut (dyn StepRule + 'static)>,
    previous_steps: &StepMap,
) -> Result<(StepMap, Updates)> {
    let mut steps = previous_steps.clone();
    let mut updates = Updates::new();
    for rule in rules {
        let (next, rule_updates) = rule.compute_steps(&steps)?;
        assert_same_keys(rule.name(), &steps, &next);
        steps = next;
        updates.extend(rule_updates);
    }
    Ok((steps, updates))
}
