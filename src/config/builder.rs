//! Build step rules from descriptions

use super::schema::StepRuleSpec;
use super::validate::validate_spec;
use crate::algorithms::{
    AdaDelta, Adam, BasicMomentum, BasicRMSProp, CompositeRule, Momentum, RMSProp,
    RemoveNotFinite, Restrict, Scale, StepClipping, StepRule,
};
use crate::error::{Error, Result};
use crate::graph::SharedVariable;

/// Build a step rule from its description
///
/// `parameters` resolves the names listed by `restrict` entries; other
/// rules ignore it. The description is validated first, so no rule
/// state is created for an invalid one.
pub fn build_step_rule(
    spec: &StepRuleSpec,
    parameters: &[SharedVariable],
) -> Result<Box<dyn StepRule>> {
    validate_spec(spec).map_err(|e| Error::ConfigError(format!("Invalid step rule: {}", e)))?;
    build(spec, parameters)
}

fn build(spec: &StepRuleSpec, parameters: &[SharedVariable]) -> Result<Box<dyn StepRule>> {
    let rule: Box<dyn StepRule> = match spec {
        StepRuleSpec::Scale { learning_rate } => Box::new(Scale::new(*learning_rate)),
        StepRuleSpec::StepClipping { threshold } => Box::new(StepClipping::new(*threshold)?),
        StepRuleSpec::BasicMomentum { momentum } => Box::new(BasicMomentum::new(*momentum)?),
        StepRuleSpec::Momentum {
            learning_rate,
            momentum,
        } => Box::new(Momentum::new(*learning_rate, *momentum)?),
        StepRuleSpec::AdaDelta {
            decay_rate,
            epsilon,
        } => Box::new(AdaDelta::new(*decay_rate, *epsilon)?),
        StepRuleSpec::BasicRmsProp {
            decay_rate,
            max_scaling,
        } => Box::new(BasicRMSProp::new(*decay_rate, *max_scaling)?),
        StepRuleSpec::RmsProp {
            learning_rate,
            decay_rate,
            max_scaling,
        } => Box::new(RMSProp::new(*learning_rate, *decay_rate, *max_scaling)?),
        StepRuleSpec::Adam {
            learning_rate,
            beta1,
            beta2,
            epsilon,
            decay_factor,
        } => Box::new(Adam::new(
            *learning_rate,
            *beta1,
            *beta2,
            *epsilon,
            *decay_factor,
        )?),
        StepRuleSpec::RemoveNotFinite { scaler } => Box::new(RemoveNotFinite::new(*scaler)),
        StepRuleSpec::Composite { rules } => Box::new(CompositeRule::new(
            rules
                .iter()
                .map(|rule| build(rule, parameters))
                .collect::<Result<Vec<_>>>()?,
        )),
        StepRuleSpec::Restrict {
            rule,
            parameters: names,
        } => {
            let selected = names
                .iter()
                .map(|name| find_parameter(name, parameters))
                .collect::<Result<Vec<_>>>()?;
            Box::new(Restrict::boxed(build(rule, parameters)?, selected))
        }
    };
    Ok(rule)
}

fn find_parameter(name: &str, parameters: &[SharedVariable]) -> Result<SharedVariable> {
    parameters
        .iter()
        .find(|parameter| parameter.name() == name)
        .cloned()
        .ok_or_else(|| Error::ConfigError(format!("Unknown parameter: {}", name)))
}
