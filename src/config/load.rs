//! Loading step rule descriptions from files

use super::schema::StepRuleSpec;
use super::validate::validate_spec;
use crate::error::{Error, Result};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Parse and validate a YAML step rule description
///
/// JSON input is accepted as well, being a subset of YAML.
pub fn parse_step_rule(yaml: &str) -> Result<StepRuleSpec> {
    let spec: StepRuleSpec = serde_yaml::from_str(yaml)
        .map_err(|e| Error::ConfigError(format!("Failed to parse step rule: {}", e)))?;
    validate_spec(&spec).map_err(|e| Error::ConfigError(format!("Invalid step rule: {}", e)))?;
    Ok(spec)
}

/// Load a step rule description from a file
///
/// Files ending in `.json` are read with the JSON parser; anything else
/// is read as YAML.
///
/// # Example
///
/// ```no_run
/// use pasos::config::{build_step_rule, load_step_rule};
///
/// let spec = load_step_rule("step_rule.yaml")?;
/// let rule = build_step_rule(&spec, &[])?;
/// # Ok::<(), pasos::Error>(())
/// ```
pub fn load_step_rule<P: AsRef<Path>>(path: P) -> Result<StepRuleSpec> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;

    let is_json = path
        .extension()
        .map(|extension| extension.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let spec = if is_json {
        let spec: StepRuleSpec = serde_json::from_str(&content).map_err(|e| {
            Error::ConfigError(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        validate_spec(&spec)
            .map_err(|e| Error::ConfigError(format!("Invalid step rule: {}", e)))?;
        spec
    } else {
        parse_step_rule(&content)?
    };

    debug!(path = %path.display(), rule = spec.kind(), "loaded step rule");
    Ok(spec)
}
