//! Momentum step rules

use super::composite::chain;
use super::step_rule::{
    algorithm_buffer, hyperparameter, scalar_value, BufferArena, StepMap, StepRule,
};
use super::Scale;
use crate::error::{Error, Result};
use crate::graph::{Expr, SharedVariable, Updates};

/// Accumulates steps into a velocity: `v ← momentum·v + step`
///
/// The returned step is the new velocity. Each parameter gets its own
/// velocity buffer, allocated (as zeros) the first time the parameter is
/// seen and reused afterwards.
pub struct BasicMomentum {
    momentum: SharedVariable,
    velocities: BufferArena<SharedVariable>,
}

impl BasicMomentum {
    /// `momentum` must lie in `[0, 1)`
    pub fn new(momentum: f32) -> Result<Self> {
        if !(0.0..1.0).contains(&momentum) {
            return Err(Error::InvalidParameter(format!(
                "momentum must be in [0, 1), got {}",
                momentum
            )));
        }
        Ok(Self {
            momentum: hyperparameter(momentum, "momentum"),
            velocities: BufferArena::new(),
        })
    }

    /// Shared cell holding the momentum coefficient
    pub fn momentum(&self) -> &SharedVariable {
        &self.momentum
    }

    pub fn momentum_value(&self) -> f32 {
        scalar_value(&self.momentum)
    }

    /// Velocity buffer of a parameter, if one was allocated
    pub fn velocity(&self, parameter: &SharedVariable) -> Option<&SharedVariable> {
        self.velocities.get(parameter)
    }
}

impl StepRule for BasicMomentum {
    fn compute_step(
        &mut self,
        parameter: &SharedVariable,
        previous_step: &Expr,
    ) -> Result<(Expr, Updates)> {
        let velocity = self
            .velocities
            .get_or_allocate(parameter, |p| algorithm_buffer(p, "velocity"));
        let step = self.momentum.expr() * velocity.expr() + previous_step;
        Ok((step.clone(), vec![(velocity.clone(), step)]))
    }

    fn name(&self) -> &'static str {
        "BasicMomentum"
    }
}

/// Classical momentum: scale by the learning rate, then accumulate
///
/// Equivalent to chaining [`Scale`] and [`BasicMomentum`]; the velocity
/// accumulates `momentum·v + learning_rate·gradient`.
pub struct Momentum {
    scale: Scale,
    basic: BasicMomentum,
}

impl Momentum {
    pub fn new(learning_rate: f32, momentum: f32) -> Result<Self> {
        Ok(Self {
            scale: Scale::new(learning_rate),
            basic: BasicMomentum::new(momentum)?,
        })
    }

    pub fn learning_rate(&self) -> &SharedVariable {
        self.scale.learning_rate()
    }

    pub fn momentum(&self) -> &SharedVariable {
        self.basic.momentum()
    }
}

impl StepRule for Momentum {
    fn compute_steps(&mut self, previous_steps: &StepMap) -> Result<(StepMap, Updates)> {
        let rules: [&mut (dyn StepRule + 'static); 2] = [&mut self.scale, &mut self.basic];
        chain(rules, previous_steps)
    }

    fn name(&self) -> &'static str {
        "Momentum"
    }
}
