//! Pipeline configuration.
//!
//! A [`PipelineConfig`] describes everything needed to turn a directory of
//! scans into a shape model, and can be stored as TOML or JSON:
//!
//! ```toml
//! [corpus]
//! extension = ".stl"
//! unify = true
//! slice_height = 150.0
//!
//! [registration]
//! steps = 10
//! fix_brim = true
//! failure_policy = "skip"
//!
//! [registrar]
//! smoothing = 0.5
//! tolerance = 1.0
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ShapeModelError, ShapeModelResult};
use crate::registration::RegistrationOptions;

/// What to do when a single shape fails to register.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Drop the shape, record the failure and carry on.
    #[default]
    Skip,
    /// Abort the whole batch on the first failure (in corpus order).
    Strict,
}

/// Corpus import settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorpusConfig {
    /// File name suffix a corpus file must end with.
    pub extension: String,
    /// Merge coincident vertices when loading.
    pub unify: bool,
    /// Trim every corpus shape above this height before registration.
    pub slice_height: Option<f64>,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            extension: ".stl".to_string(),
            unify: true,
            slice_height: None,
        }
    }
}

/// Registration batch settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrationConfig {
    /// Iteration count handed to the registrar.
    pub steps: u32,
    /// Keep the registered brim on the baseline's brim height.
    pub fix_brim: bool,
    /// Per-shape failure handling.
    pub failure_policy: FailurePolicy,
    /// Register shapes concurrently.
    pub parallel: bool,
    /// Worker cap for parallel registration; 0 uses every available core.
    pub max_threads: usize,
    /// Wall-clock budget per shape, in milliseconds.
    pub budget_ms: Option<u64>,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            steps: 10,
            fix_brim: true,
            failure_policy: FailurePolicy::Skip,
            parallel: true,
            max_threads: 0,
            budget_ms: None,
        }
    }
}

impl RegistrationConfig {
    /// Per-call options passed to the registrar.
    pub fn options(&self) -> RegistrationOptions {
        RegistrationOptions {
            fix_brim: self.fix_brim,
            steps: self.steps,
            budget: self.budget_ms.map(Duration::from_millis),
        }
    }
}

/// Settings for the default closest-point registrar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrarConfig {
    /// Weight of the neighbour average when smoothing displacements (0..=1).
    pub smoothing: f64,
    /// Largest acceptable RMS distance to the target after the final step.
    pub tolerance: f64,
}

impl Default for RegistrarConfig {
    fn default() -> Self {
        Self {
            smoothing: 0.5,
            tolerance: 1.0,
        }
    }
}

/// Full configuration of a model build.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Optional human-readable name.
    pub name: Option<String>,
    pub corpus: CorpusConfig,
    pub registration: RegistrationConfig,
    pub registrar: RegistrarConfig,
}

impl PipelineConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml(text: &str) -> ShapeModelResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| ShapeModelError::Config {
            details: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML configuration file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> ShapeModelResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ShapeModelError::Config {
            details: format!("cannot read {}: {}", path.display(), e),
        })?;
        Self::from_toml(&text)
    }

    /// Parse a configuration from JSON text.
    pub fn from_json(text: &str) -> ShapeModelResult<Self> {
        let config: Self = serde_json::from_str(text).map_err(|e| ShapeModelError::Config {
            details: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to TOML.
    pub fn to_toml(&self) -> ShapeModelResult<String> {
        toml::to_string_pretty(self).map_err(|e| ShapeModelError::Config {
            details: e.to_string(),
        })
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json(&self) -> ShapeModelResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| ShapeModelError::Config {
            details: e.to_string(),
        })
    }

    /// Check value ranges.
    pub fn validate(&self) -> ShapeModelResult<()> {
        let invalid = |details: String| Err(ShapeModelError::Config { details });

        if self.corpus.extension.is_empty() {
            return invalid("corpus.extension must not be empty".to_string());
        }
        if let Some(h) = self.corpus.slice_height {
            if !h.is_finite() {
                return invalid(format!("corpus.slice_height must be finite, got {}", h));
            }
        }
        if self.registration.steps == 0 {
            return invalid("registration.steps must be at least 1".to_string());
        }
        if !(0.0..=1.0).contains(&self.registrar.smoothing) {
            return invalid(format!(
                "registrar.smoothing must be in [0, 1], got {}",
                self.registrar.smoothing
            ));
        }
        if !(self.registrar.tolerance > 0.0) {
            return invalid(format!(
                "registrar.tolerance must be positive, got {}",
                self.registrar.tolerance
            ));
        }
        Ok(())
    }
}
