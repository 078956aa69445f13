//! Output fixture validation
//!
//! Compares a stored output fixture against a freshly captured one with
//! configurable tolerances.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::fixture::TensorFixture;

/// Validation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Absolute tolerance for float comparisons
    pub atol: f32,
    /// Relative tolerance for float comparisons
    pub rtol: f32,
    /// Whether to log individual differences
    pub verbose: bool,
    /// Maximum number of differences to log
    pub max_diffs: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            atol: 1e-5,
            rtol: 1e-4,
            verbose: false,
            max_diffs: 10,
        }
    }
}

/// Result of validation
#[derive(Debug, Clone)]
pub struct ValidationResult {
    /// Name of the validated fixture
    pub name: String,
    /// Whether validation passed
    pub passed: bool,
    /// Sample layout matches
    pub shape_match: bool,
    /// Expected sample lengths
    pub expected_shape: Vec<usize>,
    /// Actual sample lengths
    pub actual_shape: Vec<usize>,
    /// Maximum absolute difference
    pub max_abs_diff: f32,
    /// Mean absolute difference
    pub mean_abs_diff: f32,
    /// Number of elements that differ beyond tolerance
    pub num_diffs: usize,
    /// Total number of elements
    pub total_elements: usize,
}

impl ValidationResult {
    /// Summary string
    pub fn summary(&self) -> String {
        if self.passed {
            format!(
                "[PASS] {} - samples {:?}, max_diff={:.2e}, mean_diff={:.2e}",
                self.name, self.actual_shape, self.max_abs_diff, self.mean_abs_diff
            )
        } else if !self.shape_match {
            format!(
                "[FAIL] {} - sample mismatch: expected {:?}, got {:?}",
                self.name, self.expected_shape, self.actual_shape
            )
        } else {
            format!(
                "[FAIL] {} - {} diffs of {} elements, max_diff={:.2e}",
                self.name, self.num_diffs, self.total_elements, self.max_abs_diff
            )
        }
    }
}

fn sample_lengths(fixture: &TensorFixture) -> Vec<usize> {
    fixture.samples().iter().map(Vec::len).collect()
}

/// Compares expected and actual fixtures
pub struct Validator {
    config: ValidationConfig,
    results: Vec<ValidationResult>,
}

impl Validator {
    /// Create a new validator
    pub fn new(config: ValidationConfig) -> Self {
        Self {
            config,
            results: Vec::new(),
        }
    }

    /// Compare two fixtures value by value
    pub fn validate_fixture(
        &mut self,
        name: &str,
        expected: &TensorFixture,
        actual: &TensorFixture,
    ) -> ValidationResult {
        let expected_shape = sample_lengths(expected);
        let actual_shape = sample_lengths(actual);

        if expected_shape != actual_shape {
            let result = ValidationResult {
                name: name.to_string(),
                passed: false,
                shape_match: false,
                expected_shape,
                actual_shape,
                max_abs_diff: 0.0,
                mean_abs_diff: 0.0,
                num_diffs: 0,
                total_elements: expected.element_count(),
            };
            self.results.push(result.clone());
            return result;
        }

        let expected_values = expected.values();
        let (max_abs_diff, mean_abs_diff, diffs) =
            self.compare_values(&expected_values, &actual.values());

        if self.config.verbose && !diffs.is_empty() {
            warn!("Differences in {}:", name);
            for (i, (idx, e, a, diff)) in diffs.iter().enumerate() {
                if i >= self.config.max_diffs {
                    warn!("  ... and {} more", diffs.len() - i);
                    break;
                }
                warn!("  [{}] expected={:.6}, actual={:.6}, diff={:.2e}", idx, e, a, diff);
            }
        }

        let result = ValidationResult {
            name: name.to_string(),
            passed: diffs.is_empty(),
            shape_match: true,
            expected_shape,
            actual_shape,
            max_abs_diff,
            mean_abs_diff,
            num_diffs: diffs.len(),
            total_elements: expected_values.len(),
        };
        self.results.push(result.clone());
        result
    }

    /// Compare float values with tolerance
    fn compare_values(
        &self,
        expected: &[f32],
        actual: &[f32],
    ) -> (f32, f32, Vec<(usize, f32, f32, f32)>) {
        let mut max_diff = 0.0f32;
        let mut sum_diff = 0.0f32;
        let mut diffs = Vec::new();

        for (i, (&e, &a)) in expected.iter().zip(actual.iter()).enumerate() {
            let diff = (e - a).abs();
            max_diff = max_diff.max(diff);
            sum_diff += diff;

            let tol = self.config.atol + self.config.rtol * e.abs();
            if diff.is_nan() || diff > tol {
                diffs.push((i, e, a, diff));
            }
        }

        let mean_diff = sum_diff / expected.len().max(1) as f32;
        (max_diff, mean_diff, diffs)
    }

    /// All validation results
    pub fn results(&self) -> &[ValidationResult] {
        &self.results
    }

    /// Check if all validations passed
    pub fn all_passed(&self) -> bool {
        self.results.iter().all(|r| r.passed)
    }

    /// Log a summary of every result
    pub fn log_summary(&self) {
        let passed = self.results.iter().filter(|r| r.passed).count();
        info!("=== Validation Summary ===");
        for result in &self.results {
            info!("{}", result.summary());
        }
        info!("Total: {}/{} passed", passed, self.results.len());
    }

    /// Clear results
    pub fn clear(&mut self) {
        self.results.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::FixtureKind;

    fn output(values: Vec<f32>) -> TensorFixture {
        TensorFixture::new(FixtureKind::Output, vec![values])
    }

    #[test]
    fn test_validation_config_default() {
        let config = ValidationConfig::default();
        assert_eq!(config.atol, 1e-5);
        assert_eq!(config.rtol, 1e-4);
        assert_eq!(config.max_diffs, 10);
    }

    #[test]
    fn test_identical_fixtures_pass() {
        let mut validator = Validator::new(ValidationConfig::default());
        let a = output(vec![1.0, 2.0, 3.0]);
        let result = validator.validate_fixture("output", &a, &a.clone());
        assert!(result.passed);
        assert_eq!(result.max_abs_diff, 0.0);
        assert!(result.summary().starts_with("[PASS] output"));
        assert!(validator.all_passed());
    }

    #[test]
    fn test_compare_values_tolerance() {
        let validator = Validator::new(ValidationConfig {
            atol: 1e-4,
            rtol: 1e-3,
            verbose: false,
            max_diffs: 10,
        });

        let expected = vec![1.0, 2.0, 3.0];
        let (_, _, diffs) = validator.compare_values(&expected, &[1.0001, 2.0001, 3.0001]);
        assert!(diffs.is_empty());

        let (_, _, diffs) = validator.compare_values(&expected, &[1.1, 2.1, 3.1]);
        assert_eq!(diffs.len(), 3);

        let (_, _, diffs) = validator.compare_values(&expected, &[1.0, f32::NAN, 3.0]);
        assert_eq!(diffs.len(), 1);
    }

    #[test]
    fn test_sample_mismatch_fails() {
        let mut validator = Validator::new(ValidationConfig::default());
        let result = validator.validate_fixture("output", &output(vec![1.0, 2.0]), &output(vec![1.0]));
        assert!(!result.passed);
        assert!(!result.shape_match);
        assert!(result.summary().contains("sample mismatch"));
        assert!(!validator.all_passed());

        validator.clear();
        assert!(validator.results().is_empty());
    }

    #[test]
    fn test_value_mismatch_summary() {
        let mut validator = Validator::new(ValidationConfig {
            verbose: true,
            ..Default::default()
        });
        let result = validator.validate_fixture("output", &output(vec![1.0, 2.0]), &output(vec![1.0, 2.5]));
        assert!(!result.passed);
        assert_eq!(result.num_diffs, 1);
        assert!(result.summary().contains("1 diffs of 2 elements"));
    }
}
