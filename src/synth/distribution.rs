//! Input value distributions

use rand::distributions::Uniform;
use rand::Rng;
use rand_distr::{Normal, StandardNormal};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::FixtureError;

/// Distribution every synthesized value is drawn from independently
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InputDistribution {
    /// Uniform over `[low, high)`
    Uniform { low: f32, high: f32 },
    /// Mean 0, standard deviation 1
    StandardNormal,
    /// Normal with the given mean and standard deviation
    Normal { mean: f32, std: f32 },
}

impl InputDistribution {
    /// Check the parameters describe a usable distribution
    pub fn validate(&self) -> Result<(), FixtureError> {
        match *self {
            InputDistribution::Uniform { low, high } => {
                if !low.is_finite() || !high.is_finite() || low >= high {
                    return Err(FixtureError::InvalidDistribution(format!(
                        "uniform range [{}, {}) is empty or not finite",
                        low, high
                    )));
                }
            }
            InputDistribution::Normal { mean, std } => {
                if !mean.is_finite() || !std.is_finite() || std <= 0.0 {
                    return Err(FixtureError::InvalidDistribution(format!(
                        "normal(mean={}, std={}) needs a finite mean and positive std",
                        mean, std
                    )));
                }
            }
            InputDistribution::StandardNormal => {}
        }
        Ok(())
    }

    pub(crate) fn sampler(&self) -> Result<Sampler, FixtureError> {
        self.validate()?;
        Ok(match *self {
            InputDistribution::Uniform { low, high } => Sampler::Uniform(Uniform::new(low, high)),
            InputDistribution::StandardNormal => Sampler::StandardNormal,
            InputDistribution::Normal { mean, std } => Sampler::Normal(
                Normal::new(mean, std)
                    .map_err(|e| FixtureError::InvalidDistribution(e.to_string()))?,
            ),
        })
    }
}

impl fmt::Display for InputDistribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputDistribution::Uniform { low, high } => write!(f, "uniform[{}, {})", low, high),
            InputDistribution::StandardNormal => write!(f, "standard normal"),
            InputDistribution::Normal { mean, std } => write!(f, "normal(mean={}, std={})", mean, std),
        }
    }
}

/// Prepared distribution
pub(crate) enum Sampler {
    Uniform(Uniform<f32>),
    StandardNormal,
    Normal(Normal<f32>),
}

impl Sampler {
    pub(crate) fn sample<R: Rng>(&self, rng: &mut R) -> f32 {
        match self {
            Sampler::Uniform(d) => rng.sample(d),
            Sampler::StandardNormal => rng.sample(StandardNormal),
            Sampler::Normal(d) => rng.sample(d),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate() {
        assert!(InputDistribution::StandardNormal.validate().is_ok());
        assert!(InputDistribution::Uniform { low: -1.0, high: 1.0 }.validate().is_ok());
        assert!(InputDistribution::Uniform { low: 1.0, high: 1.0 }.validate().is_err());
        assert!(InputDistribution::Uniform { low: f32::NAN, high: 1.0 }.validate().is_err());
        assert!(InputDistribution::Normal { mean: 0.0, std: 0.0 }.validate().is_err());
        assert!(InputDistribution::Normal { mean: 0.0, std: 0.5 }.validate().is_ok());
    }

    #[test]
    fn test_serde_tagging() {
        let yaml = "kind: uniform\nlow: -2.0\nhigh: 2.0\n";
        let d: InputDistribution = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(d, InputDistribution::Uniform { low: -2.0, high: 2.0 });

        let d: InputDistribution = serde_yaml::from_str("kind: standard_normal\n").unwrap();
        assert_eq!(d, InputDistribution::StandardNormal);
    }

    #[test]
    fn test_display() {
        assert_eq!(
            InputDistribution::Uniform { low: -1.0, high: 1.0 }.to_string(),
            "uniform[-1, 1)"
        );
        assert_eq!(InputDistribution::StandardNormal.to_string(), "standard normal");
    }
}
