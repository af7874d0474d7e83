//! Step rule trait and the step mapping it operates on

use crate::error::{Error, Result};
use crate::graph::{Expr, SharedVariable, Updates, Value};
use crate::roles::{add_role, ALGORITHM_BUFFER, ALGORITHM_HYPERPARAMETER};
use std::collections::HashMap;
use std::ops::Index;
use tracing::debug;

/// Ordered mapping from parameter to an expression (gradient or step)
///
/// Keys are unique; inserting an existing key replaces its value in place,
/// so iteration order is always first-insertion order.
#[derive(Clone, Debug, Default)]
pub struct StepMap {
    entries: Vec<(SharedVariable, Expr)>,
    index: HashMap<usize, usize>,
}

impl StepMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            index: HashMap::with_capacity(capacity),
        }
    }

    /// Insert or replace; returns the previous expression for the key
    pub fn insert(&mut self, parameter: SharedVariable, expr: Expr) -> Option<Expr> {
        match self.index.get(&parameter.id()) {
            Some(&position) => Some(std::mem::replace(&mut self.entries[position].1, expr)),
            None => {
                self.index.insert(parameter.id(), self.entries.len());
                self.entries.push((parameter, expr));
                None
            }
        }
    }

    pub fn get(&self, parameter: &SharedVariable) -> Option<&Expr> {
        self.index
            .get(&parameter.id())
            .map(|&position| &self.entries[position].1)
    }

    pub fn contains(&self, parameter: &SharedVariable) -> bool {
        self.index.contains_key(&parameter.id())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SharedVariable, &Expr)> {
        self.entries.iter().map(|(parameter, expr)| (parameter, expr))
    }

    pub fn keys(&self) -> impl Iterator<Item = &SharedVariable> {
        self.entries.iter().map(|(parameter, _)| parameter)
    }

    pub fn values(&self) -> impl Iterator<Item = &Expr> {
        self.entries.iter().map(|(_, expr)| expr)
    }

    /// True if both maps have exactly the same parameters, in any order
    pub fn same_keys(&self, other: &StepMap) -> bool {
        self.len() == other.len() && self.keys().all(|parameter| other.contains(parameter))
    }
}

impl Index<&SharedVariable> for StepMap {
    type Output = Expr;

    fn index(&self, parameter: &SharedVariable) -> &Expr {
        self.get(parameter)
            .unwrap_or_else(|| panic!("no step for parameter {}", parameter.name()))
    }
}

impl FromIterator<(SharedVariable, Expr)> for StepMap {
    fn from_iter<I: IntoIterator<Item = (SharedVariable, Expr)>>(iter: I) -> Self {
        let mut map = StepMap::new();
        for (parameter, expr) in iter {
            map.insert(parameter, expr);
        }
        map
    }
}

impl IntoIterator for StepMap {
    type Item = (SharedVariable, Expr);
    type IntoIter = std::vec::IntoIter<(SharedVariable, Expr)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a StepMap {
    type Item = (&'a SharedVariable, &'a Expr);
    type IntoIter = std::iter::Map<
        std::slice::Iter<'a, (SharedVariable, Expr)>,
        fn(&'a (SharedVariable, Expr)) -> (&'a SharedVariable, &'a Expr),
    >;

    fn into_iter(self) -> Self::IntoIter {
        fn split(entry: &(SharedVariable, Expr)) -> (&SharedVariable, &Expr) {
            (&entry.0, &entry.1)
        }
        self.entries
            .iter()
            .map(split as fn(&'a (SharedVariable, Expr)) -> (&'a SharedVariable, &'a Expr))
    }
}

/// Rule turning gradients (or the previous rule's steps) into steps
///
/// Implementors provide either [`compute_step`](StepRule::compute_step),
/// applied to each parameter independently by the default
/// [`compute_steps`](StepRule::compute_steps), or override `compute_steps`
/// when the steps depend on several parameters at once. The returned map
/// must hold exactly the keys of the input.
pub trait StepRule {
    /// Step and state updates for a single parameter
    fn compute_step(
        &mut self,
        parameter: &SharedVariable,
        previous_step: &Expr,
    ) -> Result<(Expr, Updates)> {
        let _ = (parameter, previous_step);
        Err(Error::Unsupported(format!(
            "{} does not compute steps parameter by parameter",
            self.name()
        )))
    }

    /// Steps and state updates for every parameter of `previous_steps`
    fn compute_steps(&mut self, previous_steps: &StepMap) -> Result<(StepMap, Updates)> {
        let mut steps = StepMap::with_capacity(previous_steps.len());
        let mut updates = Updates::new();
        for (parameter, previous_step) in previous_steps {
            let (step, parameter_updates) = self.compute_step(parameter, previous_step)?;
            steps.insert(parameter.clone(), step);
            updates.extend(parameter_updates);
        }
        Ok((steps, updates))
    }

    /// Name used in diagnostics
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

impl<R: StepRule + ?Sized> StepRule for Box<R> {
    fn compute_step(
        &mut self,
        parameter: &SharedVariable,
        previous_step: &Expr,
    ) -> Result<(Expr, Updates)> {
        (**self).compute_step(parameter, previous_step)
    }

    fn compute_steps(&mut self, previous_steps: &StepMap) -> Result<(StepMap, Updates)> {
        (**self).compute_steps(previous_steps)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

/// Panics if a rule dropped or invented parameters
pub(crate) fn assert_same_keys(rule: &str, input: &StepMap, output: &StepMap) {
    assert!(
        input.same_keys(output),
        "step rule {} returned {} steps for {} parameters",
        rule,
        output.len(),
        input.len()
    );
}

/// Per-parameter state owned by one rule, allocated on first use
#[derive(Debug)]
pub(crate) struct BufferArena<T> {
    buffers: HashMap<usize, T>,
}

impl<T> BufferArena<T> {
    pub(crate) fn new() -> Self {
        Self {
            buffers: HashMap::new(),
        }
    }

    pub(crate) fn get_or_allocate(
        &mut self,
        parameter: &SharedVariable,
        allocate: impl FnOnce(&SharedVariable) -> T,
    ) -> &T {
        self.buffers
            .entry(parameter.id())
            .or_insert_with(|| allocate(parameter))
    }

    pub(crate) fn get(&self, parameter: &SharedVariable) -> Option<&T> {
        self.buffers.get(&parameter.id())
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.buffers.len()
    }
}

/// Zero-filled state cell shaped like `parameter`, tagged as an algorithm buffer
pub(crate) fn algorithm_buffer(parameter: &SharedVariable, suffix: &str) -> SharedVariable {
    let buffer = parameter.zeros_like(format!("{}_{}", parameter.name(), suffix));
    add_role(&buffer, ALGORITHM_BUFFER);
    debug!(parameter = parameter.name(), buffer = buffer.name(), "allocated state");
    buffer
}

/// Scalar state cell, e.g. a time counter
pub(crate) fn scalar_buffer(
    parameter: &SharedVariable,
    suffix: &str,
    value: f32,
) -> SharedVariable {
    let buffer = SharedVariable::scalar(value, format!("{}_{}", parameter.name(), suffix));
    add_role(&buffer, ALGORITHM_BUFFER);
    debug!(parameter = parameter.name(), buffer = buffer.name(), "allocated state");
    buffer
}

/// Scalar cell for a rule constant that may be changed after compilation
pub(crate) fn hyperparameter(value: f32, name: &str) -> SharedVariable {
    let cell = SharedVariable::scalar(value, name);
    add_role(&cell, ALGORITHM_HYPERPARAMETER);
    cell
}

/// Read a 0-d cell
pub(crate) fn scalar_value(cell: &SharedVariable) -> f32 {
    let value: Value = cell.get_value();
    value.iter().next().copied().unwrap_or(f32::NAN)
}
