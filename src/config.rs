//! Fixture generation configuration
//!
//! Every field has a default matching the plain `lenet`/`conv2d`/`mlp` runs,
//! so a config file is optional. A YAML file may
//! override any subset of fields:
//!
//! ```yaml
//! seed: 42
//! pretty_json: false
//! synth_distribution:
//!   kind: uniform
//!   low: -1.0
//!   high: 1.0
//! validation:
//!   atol: 1.0e-5
//!   rtol: 1.0e-4
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::inference::ValidationConfig;
use crate::synth::InputDistribution;

/// Top-level configuration shared by all subcommands
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FixtureConfig {
    /// Seed for input synthesis and weight initialization (entropy when unset)
    pub seed: Option<u64>,
    /// Write fixtures with two-space indentation instead of compact JSON
    pub pretty_json: bool,
    /// Distribution used when synthesizing inputs for an existing model
    pub synth_distribution: InputDistribution,
    /// Distribution used for the example input of exported networks
    pub export_distribution: InputDistribution,
    /// Tolerances for `validate`
    pub validation: ValidationConfig,
}

impl Default for FixtureConfig {
    fn default() -> Self {
        Self {
            seed: None,
            pretty_json: false,
            synth_distribution: InputDistribution::Uniform {
                low: -1.0,
                high: 1.0,
            },
            export_distribution: InputDistribution::StandardNormal,
            validation: ValidationConfig::default(),
        }
    }
}

impl FixtureConfig {
    /// Load configuration from a YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: FixtureConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;
        config.synth_distribution.validate()?;
        config.export_distribution.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = FixtureConfig::default();
        assert_eq!(config.seed, None);
        assert!(!config.pretty_json);
        assert_eq!(
            config.synth_distribution,
            InputDistribution::Uniform {
                low: -1.0,
                high: 1.0
            }
        );
        assert_eq!(config.export_distribution, InputDistribution::StandardNormal);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
seed: 7
synth_distribution:
    kind: normal
    mean: 0.5
    std: 2.0
"#;
        let config: FixtureConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.seed, Some(7));
        assert_eq!(
            config.synth_distribution,
            InputDistribution::Normal {
                mean: 0.5,
                std: 2.0
            }
        );
        assert_eq!(config.export_distribution, InputDistribution::StandardNormal);
        assert_eq!(config.validation, ValidationConfig::default());
    }

    #[test]
    fn test_load_rejects_bad_distribution() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(
            &path,
            "synth_distribution:\n  kind: uniform\n  low: 1.0\n  high: -1.0\n",
        )
        .unwrap();
        assert!(FixtureConfig::load(&path).is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let err = FixtureConfig::load("does/not/exist.yaml").unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
