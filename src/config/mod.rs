//! Declarative step rule configuration
//!
//! Step rules can be described in YAML (or JSON) and built against a list
//! of parameters.
//!
//! # Example
//!
//! ```yaml
//! name: composite
//! rules:
//!   - name: remove_not_finite
//!   - name: step_clipping
//!     threshold: 5.0
//!   - name: restrict
//!     parameters: [W]
//!     rule:
//!       name: rms_prop
//!       learning_rate: 0.001
//! ```

mod builder;
mod load;
mod schema;
mod validate;



pub use builder::build_step_rule;
pub use load::{load_step_rule, parse_step_rule};
pub use schema::StepRuleSpec;
pub use validate::{validate_spec, ValidationError};
