//! YAML schema for declarative step rules

use serde::{Deserialize, Serialize};

/// Declarative description of a step rule
///
/// The variant is selected by the `name` key. Omitted hyperparameters take
/// the same defaults as the rule constructors.
///
/// ```yaml
/// name: composite
/// rules:
///   - name: step_clipping
///     threshold: 1.0
///   - name: momentum
///     learning_rate: 0.01
///     momentum: 0.9
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum StepRuleSpec {
    Scale {
        #[serde(default = "default_unit_rate")]
        learning_rate: f32,
    },

    StepClipping {
        /// No threshold disables clipping
        #[serde(default, skip_serializing_if = "Option::is_none")]
        threshold: Option<f32>,
    },

    BasicMomentum {
        #[serde(default)]
        momentum: f32,
    },

    Momentum {
        #[serde(default = "default_unit_rate")]
        learning_rate: f32,
        #[serde(default)]
        momentum: f32,
    },

    AdaDelta {
        #[serde(default = "default_adadelta_decay")]
        decay_rate: f32,
        #[serde(default = "default_adadelta_epsilon")]
        epsilon: f32,
    },

    #[serde(rename = "basic_rms_prop")]
    BasicRmsProp {
        #[serde(default = "default_rmsprop_decay")]
        decay_rate: f32,
        #[serde(default = "default_max_scaling")]
        max_scaling: f32,
    },

    #[serde(rename = "rms_prop")]
    RmsProp {
        #[serde(default = "default_unit_rate")]
        learning_rate: f32,
        #[serde(default = "default_rmsprop_decay")]
        decay_rate: f32,
        #[serde(default = "default_max_scaling")]
        max_scaling: f32,
    },

    Adam {
        #[serde(default = "default_adam_rate")]
        learning_rate: f32,
        #[serde(default = "default_beta1")]
        beta1: f32,
        #[serde(default = "default_beta2")]
        beta2: f32,
        #[serde(default = "default_adam_epsilon")]
        epsilon: f32,
        #[serde(default = "default_decay_factor")]
        decay_factor: f32,
    },

    RemoveNotFinite {
        #[serde(default = "default_scaler")]
        scaler: f32,
    },

    /// Rules applied in order, each to the previous one's steps
    Composite { rules: Vec<StepRuleSpec> },

    /// A rule applied only to the named parameters
    Restrict {
        rule: Box<StepRuleSpec>,
        parameters: Vec<String>,
    },
}

impl StepRuleSpec {
    /// Value of the `name` tag
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Scale { .. } => "scale",
            Self::StepClipping { .. } => "step_clipping",
            Self::BasicMomentum { .. } => "basic_momentum",
            Self::Momentum { .. } => "momentum",
            Self::AdaDelta { .. } => "ada_delta",
            Self::BasicRmsProp { .. } => "basic_rms_prop",
            Self::RmsProp { .. } => "rms_prop",
            Self::Adam { .. } => "adam",
            Self::RemoveNotFinite { .. } => "remove_not_finite",
            Self::Composite { .. } => "composite",
            Self::Restrict { .. } => "restrict",
        }
    }
}

fn default_unit_rate() -> f32 {
    1.0
}

fn default_adadelta_decay() -> f32 {
    0.95
}

fn default_adadelta_epsilon() -> f32 {
    1e-6
}

fn default_rmsprop_decay() -> f32 {
    0.9
}

fn default_max_scaling() -> f32 {
    1e5
}

fn default_adam_rate() -> f32 {
    0.002
}

fn default_beta1() -> f32 {
    0.1
}

fn default_beta2() -> f32 {
    0.001
}

fn default_adam_epsilon() -> f32 {
    1e-8
}

fn default_decay_factor() -> f32 {
    1.0 - 1e-8
}

fn default_scaler() -> f32 {
    0.1
}
