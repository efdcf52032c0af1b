//! Agent configuration merging.
//!
//! Applies command-line overrides to the loaded `fixer.toml`.

use anyhow::Result;
use fixer::io::config::FixerConfig;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    pub max_steps: Option<u32>,
    pub no_evaluate: bool,
}

pub fn apply_overrides(mut base: FixerConfig, overrides: &Overrides) -> Result<FixerConfig> {
    if let Some(max_steps) = overrides.max_steps {
        base.max_steps = max_steps;
    }
    if overrides.no_evaluate {
        base.evaluate_actions = false;
    }
    base.validate()?;
    Ok(base)
}
