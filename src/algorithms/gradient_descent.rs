//! Gradient descent driver

use super::step_rule::{assert_same_keys, StepMap, StepRule};
use super::Scale;
use crate::error::{Error, Result};
use crate::graph::{grad, l2_norm, Batch, Expr, Function, SharedVariable, Updates};
use crate::roles::{has_roles, PARAMETER};
use tracing::info;

/// Training algorithm driven one batch at a time
pub trait TrainingAlgorithm {
    /// Build whatever the algorithm needs before the first batch
    fn initialize(&mut self) -> Result<()>;

    /// Perform one training step on a batch
    fn process_batch(&mut self, batch: &Batch) -> Result<()>;
}

/// Gradient descent with a pluggable step rule
///
/// Each processed batch assigns `p ← p − step` to every parameter and
/// commits the step rule's state updates in the same atomic call.
///
/// # Example
///
/// ```
/// use pasos::algorithms::{GradientDescent, TrainingAlgorithm};
/// use pasos::graph::{Batch, SharedVariable};
///
/// let w = SharedVariable::from_vec(vec![1.0, 2.0], "W");
/// let cost = w.expr().square().sum();
///
/// let mut algorithm = GradientDescent::builder()
///     .cost(cost)
///     .parameters([w.clone()])
///     .build()?;
/// algorithm.step_rule().set_lr(0.25);
/// algorithm.initialize()?;
/// algorithm.process_batch(&Batch::new())?;
///
/// assert_eq!(w.get_value().as_slice(), Some(&[0.5, 1.0][..]));
/// # Ok::<(), pasos::Error>(())
/// ```
pub struct GradientDescent<R: StepRule = Scale> {
    cost: Option<Expr>,
    parameters: Vec<SharedVariable>,
    gradients: StepMap,
    step_rule: R,
    extra_updates: Updates,
    steps: Option<StepMap>,
    function: Option<Function>,
}

/// Builder for [`GradientDescent`]
pub struct GradientDescentBuilder<R: StepRule = Scale> {
    cost: Option<Expr>,
    gradients: Option<StepMap>,
    parameters: Option<Vec<SharedVariable>>,
    step_rule: R,
}

impl GradientDescent<Scale> {
    /// Start building; the step rule defaults to `Scale::new(1.0)`
    pub fn builder() -> GradientDescentBuilder<Scale> {
        GradientDescentBuilder {
            cost: None,
            gradients: None,
            parameters: None,
            step_rule: Scale::default(),
        }
    }
}

impl<R: StepRule> GradientDescentBuilder<R> {
    /// Cost to minimize; gradients are derived symbolically
    pub fn cost(mut self, cost: Expr) -> Self {
        self.cost = Some(cost);
        self
    }

    /// Precomputed gradients, used instead of a cost
    pub fn gradients(mut self, gradients: StepMap) -> Self {
        self.gradients = Some(gradients);
        self
    }

    /// Parameters to train
    ///
    /// Without this, the keys of the gradients are used, or every shared
    /// variable of the cost graph that carries the `PARAMETER` role.
    pub fn parameters(mut self, parameters: impl IntoIterator<Item = SharedVariable>) -> Self {
        self.parameters = Some(parameters.into_iter().collect());
        self
    }

    pub fn step_rule<S: StepRule>(self, step_rule: S) -> GradientDescentBuilder<S> {
        GradientDescentBuilder {
            cost: self.cost,
            gradients: self.gradients,
            parameters: self.parameters,
            step_rule,
        }
    }

    pub fn build(self) -> Result<GradientDescent<R>> {
        let (cost, parameters, gradients) = match (self.cost, self.gradients) {
            (Some(_), Some(_)) => {
                return Err(Error::InvalidParameter(
                    "give either a cost or gradients, not both".to_string(),
                ))
            }
            (None, None) => {
                return Err(Error::InvalidParameter("a cost or gradients must be given".to_string()))
            }
            (Some(cost), None) => {
                let parameters = match self.parameters {
                    Some(parameters) => parameters,
                    None => cost
                        .shared_variables()
                        .into_iter()
                        .filter(|variable| has_roles(variable, &[PARAMETER], false))
                        .collect(),
                };
                let gradients = grad(&cost, &parameters)?
                    .into_iter()
                    .zip(parameters.iter().cloned())
                    .map(|(gradient, parameter)| (parameter, gradient))
                    .collect();
                (Some(cost), parameters, gradients)
            }
            (None, Some(gradients)) => {
                let parameters = match self.parameters {
                    Some(parameters) => parameters,
                    None => gradients.keys().cloned().collect(),
                };
                (None, parameters, gradients)
            }
        };

        if parameters.is_empty() {
            return Err(Error::InvalidParameter("no parameters to train".to_string()));
        }
        let by_parameter: StepMap = parameters
            .iter()
            .map(|parameter| (parameter.clone(), parameter.expr()))
            .collect();
        if by_parameter.len() != parameters.len() {
            return Err(Error::InvalidParameter("parameters must be distinct".to_string()));
        }
        if !by_parameter.same_keys(&gradients) {
            return Err(Error::InvalidParameter(
                "gradients must be given for exactly the trained parameters".to_string(),
            ));
        }

        Ok(GradientDescent {
            cost,
            parameters,
            gradients,
            step_rule: self.step_rule,
            extra_updates: Updates::new(),
            steps: None,
            function: None,
        })
    }
}

impl<R: StepRule> GradientDescent<R> {
    pub fn cost(&self) -> Option<&Expr> {
        self.cost.as_ref()
    }

    pub fn parameters(&self) -> &[SharedVariable] {
        &self.parameters
    }

    pub fn gradients(&self) -> &StepMap {
        &self.gradients
    }

    pub fn step_rule(&self) -> &R {
        &self.step_rule
    }

    /// Mutable access to the rule; changes to its structure only take
    /// effect if made before [`initialize`](TrainingAlgorithm::initialize)
    pub fn step_rule_mut(&mut self) -> &mut R {
        &mut self.step_rule
    }

    /// Steps built by the step rule, available after initialization
    pub fn steps(&self) -> Option<&StepMap> {
        self.steps.as_ref()
    }

    /// Euclidean norm of all gradients together
    pub fn total_gradient_norm(&self) -> Expr {
        l2_norm(self.gradients.values())
    }

    /// Euclidean norm of all steps together
    pub fn total_step_norm(&self) -> Result<Expr> {
        self.steps
            .as_ref()
            .map(|steps| l2_norm(steps.values()))
            .ok_or(Error::NotInitialized)
    }

    /// Extra assignments committed together with every step
    pub fn add_updates(&mut self, updates: Updates) -> Result<()> {
        if self.function.is_some() {
            return Err(Error::AlreadyInitialized);
        }
        self.extra_updates.extend(updates);
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.function.is_some()
    }
}

impl<R: StepRule> TrainingAlgorithm for GradientDescent<R> {
    fn initialize(&mut self) -> Result<()> {
        if self.function.is_some() {
            return Err(Error::AlreadyInitialized);
        }

        let (steps, rule_updates) = self.step_rule.compute_steps(&self.gradients)?;
        assert_same_keys(self.step_rule.name(), &self.gradients, &steps);

        let mut updates: Updates = self
            .parameters
            .iter()
            .map(|parameter| (parameter.clone(), parameter.expr() - &steps[parameter]))
            .collect();
        let auxiliary = rule_updates.len() + self.extra_updates.len();
        updates.extend(rule_updates);
        updates.extend(self.extra_updates.iter().cloned());

        self.function = Some(Function::compile(Vec::new(), updates)?);
        self.steps = Some(steps);

        info!(
            rule = self.step_rule.name(),
            parameters = self.parameters.len(),
            auxiliary_updates = auxiliary,
            "initialized gradient descent"
        );
        Ok(())
    }

    fn process_batch(&mut self, batch: &Batch) -> Result<()> {
        let function = self.function.as_ref().ok_or(Error::NotInitialized)?;
        function.call(batch)?;
        Ok(())
    }
}
