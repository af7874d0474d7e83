//! Step rules and the gradient descent driver

mod adadelta;
mod adam;
mod clipping;
mod composite;
mod gradient_descent;
mod momentum;
mod not_finite;
mod restrict;
mod rmsprop;
mod scale;
mod step_rule;

pub use adadelta::AdaDelta;
pub use adam::Adam;
pub use clipping::StepClipping;
pub use composite::CompositeRule;
pub use gradient_descent::{GradientDescent, GradientDescentBuilder, TrainingAlgorithm};
pub use momentum::{BasicMomentum, Momentum};
pub use not_finite::RemoveNotFinite;
pub use restrict::Restrict;
pub use rmsprop::{BasicRMSProp, RMSProp};
pub use scale::Scale;
pub use step_rule::{StepMap, StepRule};
