//! Per-trial tolerance overrides loaded from JSON.
//!
//! ```json
//! {
//!   "default": { "atol": 1e-5 },
//!   "rules": [
//!     { "dtype": "half", "rtol": 2e-3 },
//!     { "trial": "resize_pad/*_large", "atol": 1e-4 }
//!   ]
//! }
//! ```
//!
//! Resolution starts from [`Tolerance::for_dtype`], applies `default`, then the last
//! matching dtype-only rule, then the last trial-only rule, then the last rule matching both.
//!
//! [`ToleranceConfig::from_env`] reads the file named by `CONVFUSE_TOLERANCE_CONFIG`, else
//! the workspace's `configs/tolerance.json` when present.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::compare::Tolerance;
use crate::config::TrialConfig;
use crate::env;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToleranceConfig {
    #[serde(default)]
    default: Option<ToleranceOverride>,
    #[serde(default)]
    rules: Vec<ToleranceRule>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ToleranceRule {
    /// Glob over the trial name; `*` matches any run of characters.
    #[serde(default)]
    trial: Option<String>,
    #[serde(default)]
    dtype: Option<String>,
    #[serde(default)]
    atol: Option<f64>,
    #[serde(default)]
    rtol: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
struct ToleranceOverride {
    #[serde(default)]
    atol: Option<f64>,
    #[serde(default)]
    rtol: Option<f64>,
}

impl ToleranceConfig {
    pub fn from_json_str(contents: &str) -> Result<Self> {
        serde_json::from_str(contents).context("failed to parse tolerance config")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read tolerance config {}", path.display()))?;
        Self::from_json_str(&contents)
            .with_context(|| format!("invalid tolerance config {}", path.display()))
    }

    /// `configs/tolerance.json` at the workspace root.
    pub fn workspace_path() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("../../configs/tolerance.json")
    }

    /// Loads the file named by `CONVFUSE_TOLERANCE_CONFIG`, falling back to
    /// [`Self::workspace_path`] and then to the built-in defaults.
    ///
    /// An explicitly configured file must exist.
    pub fn from_env() -> Result<Self> {
        let path = match env::tolerance_config_path() {
            Some(path) => path,
            None => {
                let path = Self::workspace_path();
                if !path.exists() {
                    return Ok(Self::default());
                }
                path
            }
        };
        tracing::info!(path = %path.display(), "loading tolerance config");
        Self::load(&path)
    }

    pub fn resolve(&self, config: &TrialConfig) -> Tolerance {
        let mut resolved = Tolerance::for_dtype(config.dtype);
        if let Some(defaults) = self.default {
            apply_override(&mut resolved, &defaults);
        }

        let mut dtype_rule = None;
        let mut trial_rule = None;
        let mut both_rule = None;
        for rule in &self.rules {
            let dtype_match = rule
                .dtype
                .as_deref()
                .map(|dtype| dtype_matches(config, dtype))
                .unwrap_or(false);
            let trial_match = rule
                .trial
                .as_deref()
                .map(|pattern| matches_pattern(&config.name, pattern))
                .unwrap_or(false);
            let value = ToleranceOverride {
                atol: rule.atol,
                rtol: rule.rtol,
            };
            match (dtype_match, trial_match) {
                (true, true) => both_rule = Some(value),
                (false, true) if rule.dtype.is_none() => trial_rule = Some(value),
                (true, false) if rule.trial.is_none() => dtype_rule = Some(value),
                _ => {}
            }
        }

        for rule in [dtype_rule, trial_rule, both_rule].into_iter().flatten() {
            apply_override(&mut resolved, &rule);
        }
        resolved
    }
}

fn dtype_matches(config: &TrialConfig, dtype: &str) -> bool {
    dtype
        .parse::<convfuse::DType>()
        .map(|parsed| parsed == config.dtype)
        .unwrap_or(false)
}

fn apply_override(target: &mut Tolerance, value: &ToleranceOverride) {
    if let Some(atol) = value.atol {
        target.atol = atol;
    }
    if let Some(rtol) = value.rtol {
        target.rtol = rtol;
    }
}

/// `*` matches any run of characters, including none.
fn matches_pattern(value: &str, pattern: &str) -> bool {
    let Some((literal, rest)) = pattern.split_once('*') else {
        return value == pattern;
    };
    let Some(tail) = value.strip_prefix(literal) else {
        return false;
    };
    if rest.is_empty() {
        return true;
    }
    tail.char_indices()
        .map(|(idx, _)| idx)
        .chain(std::iter::once(tail.len()))
        .any(|idx| matches_pattern(&tail[idx..], rest))
}
