//! Step rule description validation

use super::schema::StepRuleSpec;

/// Validation error type
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ValidationError {
    #[error("Invalid learning rate: {0} (must be finite and > 0.0)")]
    InvalidLearningRate(f32),

    #[error("Invalid clipping threshold: {0} (must be > 0.0)")]
    InvalidThreshold(f32),

    #[error("Invalid momentum: {0} (must be in [0, 1))")]
    InvalidMomentum(f32),

    #[error("Invalid decay rate: {0} (must be in [0, 1])")]
    InvalidDecayRate(f32),

    #[error("Invalid epsilon: {0} (must be >= 0.0)")]
    InvalidEpsilon(f32),

    #[error("Invalid max scaling: {0} (must be > 0.0)")]
    InvalidMaxScaling(f32),

    #[error("Invalid {name}: {value} (must be in (0, 1])")]
    InvalidUnitInterval { name: &'static str, value: f32 },

    #[error("Invalid scaler: {0} (must be finite)")]
    InvalidScaler(f32),

    #[error("Restricted rule names no parameters")]
    EmptyRestriction,
}

/// Validate a step rule description, including nested rules
///
/// Checks the same ranges the rule constructors enforce, plus:
/// - Learning rates are finite and positive
/// - Restrictions name at least one parameter
pub fn validate_spec(spec: &StepRuleSpec) -> Result<(), ValidationError> {
    match spec {
        StepRuleSpec::Scale { learning_rate } => validate_learning_rate(*learning_rate),
        StepRuleSpec::StepClipping { threshold } => match threshold {
            Some(value) if value.is_nan() || *value <= 0.0 => {
                Err(ValidationError::InvalidThreshold(*value))
            }
            _ => Ok(()),
        },
        StepRuleSpec::BasicMomentum { momentum } => validate_momentum(*momentum),
        StepRuleSpec::Momentum {
            learning_rate,
            momentum,
        } => {
            validate_learning_rate(*learning_rate)?;
            validate_momentum(*momentum)
        }
        StepRuleSpec::AdaDelta {
            decay_rate,
            epsilon,
        } => {
            validate_decay_rate(*decay_rate)?;
            validate_epsilon(*epsilon)
        }
        StepRuleSpec::BasicRmsProp {
            decay_rate,
            max_scaling,
        } => {
            validate_decay_rate(*decay_rate)?;
            validate_max_scaling(*max_scaling)
        }
        StepRuleSpec::RmsProp {
            learning_rate,
            decay_rate,
            max_scaling,
        } => {
            validate_learning_rate(*learning_rate)?;
            validate_decay_rate(*decay_rate)?;
            validate_max_scaling(*max_scaling)
        }
        StepRuleSpec::Adam {
            learning_rate,
            beta1,
            beta2,
            epsilon,
            decay_factor,
        } => {
            validate_learning_rate(*learning_rate)?;
            validate_unit_interval("beta1", *beta1)?;
            validate_unit_interval("beta2", *beta2)?;
            validate_unit_interval("decay_factor", *decay_factor)?;
            validate_epsilon(*epsilon)
        }
        StepRuleSpec::RemoveNotFinite { scaler } => {
            if scaler.is_finite() {
                Ok(())
            } else {
                Err(ValidationError::InvalidScaler(*scaler))
            }
        }
        StepRuleSpec::Composite { rules } => rules.iter().try_for_each(validate_spec),
        StepRuleSpec::Restrict { rule, parameters } => {
            if parameters.is_empty() {
                return Err(ValidationError::EmptyRestriction);
            }
            validate_spec(rule)
        }
    }
}

fn validate_learning_rate(value: f32) -> Result<(), ValidationError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ValidationError::InvalidLearningRate(value))
    }
}

fn validate_momentum(value: f32) -> Result<(), ValidationError> {
    if (0.0..1.0).contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::InvalidMomentum(value))
    }
}

fn validate_decay_rate(value: f32) -> Result<(), ValidationError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::InvalidDecayRate(value))
    }
}

fn validate_epsilon(value: f32) -> Result<(), ValidationError> {
    if value >= 0.0 {
        Ok(())
    } else {
        Err(ValidationError::InvalidEpsilon(value))
    }
}

fn validate_max_scaling(value: f32) -> Result<(), ValidationError> {
    if value > 0.0 {
        Ok(())
    } else {
        Err(ValidationError::InvalidMaxScaling(value))
    }
}

fn validate_unit_interval(name: &'static str, value: f32) -> Result<(), ValidationError> {
    if value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(ValidationError::InvalidUnitInterval { name, value })
    }
}
