//! Fixture generation pipeline
//!
//! Orchestrates the steps behind each subcommand:
//! 1. Build or load the model artifact
//! 2. Synthesize an input tensor matching its declared input
//! 3. Optionally run one forward pass to capture the expected output
//! 4. Write the artifact and fixtures, only once everything has succeeded

use anyhow::Result;
use candle_core::Tensor;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

use super::capture::InferenceSession;
use super::validator::{ValidationResult, Validator};
use crate::config::FixtureConfig;
use crate::fixture::{fixture_digest, FixtureKind, TensorFixture};
use crate::models::{NetworkKind, NetworkSummary, WeightInit};
use crate::onnx::{export, ExportableNetwork, OnnxModel, TensorSpec};
use crate::synth::InputSynthesizer;
use crate::utils::shape_utils::format_shape;
use crate::utils::size_utils::hex;

/// Outcome of generating input and output fixtures for an existing model
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureReport {
    /// Shape the input was synthesized with
    pub input_shape: Vec<usize>,
    /// Shape of the first declared output
    pub output_shape: Vec<usize>,
}

/// Outcome of exporting a fixture network
#[derive(Debug, Clone, PartialEq)]
pub struct ExportReport {
    /// Size figures logged before export
    pub summary: NetworkSummary,
    /// Operator nodes left after folding
    pub operators: usize,
    /// Shape of the captured output, when one was requested
    pub output_shape: Option<Vec<usize>>,
}

/// Static description of a model and its fixtures
#[derive(Debug, Clone)]
pub struct ModelDescription {
    /// IR version the file declares
    pub ir_version: i64,
    /// Default-domain opset
    pub opset_version: Option<i64>,
    /// Producer name
    pub producer: String,
    /// Declared runtime inputs
    pub inputs: Vec<TensorSpec>,
    /// Declared outputs
    pub outputs: Vec<TensorSpec>,
    /// Node count per operator type
    pub operators: BTreeMap<String, usize>,
    /// Scalars stored as initializers
    pub parameters: usize,
    /// `(path, hex digest)` of each readable fixture
    pub fixture_digests: Vec<(PathBuf, String)>,
}

impl ModelDescription {
    /// Report lines
    pub fn lines(&self) -> Vec<String> {
        let mut lines = vec![
            format!(
                "IR version {}, opset {}, producer `{}`",
                self.ir_version,
                self.opset_version
                    .map_or_else(|| "?".to_string(), |v| v.to_string()),
                self.producer
            ),
            format!("Parameters: {}", self.parameters),
        ];
        lines.extend(self.inputs.iter().map(|i| format!("Input:  {}", i)));
        lines.extend(self.outputs.iter().map(|o| format!("Output: {}", o)));
        lines.push(format!(
            "Operators: {} total",
            self.operators.values().sum::<usize>()
        ));
        lines.extend(
            self.operators
                .iter()
                .map(|(op, count)| format!("  {:<12} {}", op, count)),
        );
        lines.extend(
            self.fixture_digests
                .iter()
                .map(|(path, digest)| format!("Digest {:?}: {}", path, digest)),
        );
        lines
    }
}

/// Fixture generator
pub struct FixturePipeline {
    config: FixtureConfig,
}

impl FixturePipeline {
    /// Create a pipeline
    pub fn new(config: FixtureConfig) -> Self {
        Self { config }
    }

    /// Active configuration
    pub fn config(&self) -> &FixtureConfig {
        &self.config
    }

    /// Generate `input_path` for the model at `model_path`
    ///
    /// # Returns
    /// * The shape the input was generated with
    pub fn generate_input<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        model_path: P,
        input_path: Q,
    ) -> Result<Vec<usize>> {
        let model = OnnxModel::load(model_path)?;
        let (shape, tensor) = self.synthesize_for(&model)?;

        let fixture = TensorFixture::from_tensor(FixtureKind::Input, &tensor)?;
        fixture.write(input_path.as_ref(), self.config.pretty_json)?;

        info!("Generated input data with shape: {}", format_shape(&shape));
        info!("Saved to {:?}", input_path.as_ref());
        Ok(shape)
    }

    /// Run the model on `input_path` and write the first output to `output_path`
    pub fn capture_output<P: AsRef<Path>, Q: AsRef<Path>, R: AsRef<Path>>(
        &self,
        model_path: P,
        input_path: Q,
        output_path: R,
    ) -> Result<Tensor> {
        let session = InferenceSession::load(model_path)?;
        let input = TensorFixture::read(FixtureKind::Input, input_path)?;
        let output = session.run_fixture(&input)?;

        let fixture = TensorFixture::from_batch(FixtureKind::Output, &output, input.samples().len())?;
        fixture.write(output_path.as_ref(), self.config.pretty_json)?;

        info!("Generated output data with shape: {}", format_shape(output.dims()));
        info!("Saved to {:?}", output_path.as_ref());
        Ok(output)
    }

    /// Synthesize an input for the model, run it, and write both fixtures
    ///
    /// Neither file is written unless inference succeeded.
    pub fn lenet<P: AsRef<Path>, Q: AsRef<Path>, R: AsRef<Path>>(
        &self,
        model_path: P,
        input_path: Q,
        output_path: R,
    ) -> Result<CaptureReport> {
        let session = InferenceSession::load(model_path)?;
        let (input_shape, tensor) = self.synthesize_for(session.model())?;
        let input = TensorFixture::from_tensor(FixtureKind::Input, &tensor)?;

        let output = session.run(tensor)?;
        let output_shape = output.dims().to_vec();
        let output = TensorFixture::from_tensor(FixtureKind::Output, &output)?;

        input.write(input_path.as_ref(), self.config.pretty_json)?;
        info!("Generated input data with shape: {}", format_shape(&input_shape));
        info!("Saved to {:?}", input_path.as_ref());
        output.write(output_path.as_ref(), self.config.pretty_json)?;
        info!("Generated output data with shape: {}", format_shape(&output_shape));
        info!("Saved to {:?}", output_path.as_ref());

        Ok(CaptureReport {
            input_shape,
            output_shape,
        })
    }

    /// Build, export and write a fixture network with its example input
    ///
    /// With `output_path` the expected output is captured from the exported
    /// model as well. Nothing is written until the export (and capture)
    /// succeeded.
    pub fn export_network<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        kind: NetworkKind,
        model_path: P,
        input_path: Q,
        output_path: Option<&Path>,
    ) -> Result<ExportReport> {
        let mut init = WeightInit::new(self.config.seed);
        let network = kind.build(&mut init)?;

        let summary = NetworkSummary::of(&network);
        for line in summary.lines() {
            info!("{}", line);
        }

        // Separate stream from the weights so both stay reproducible
        let input_seed = self.config.seed.map(|s| s.wrapping_add(1));
        let mut synth = InputSynthesizer::new(self.config.export_distribution, input_seed)?;
        let example = synth.synthesize(&network.input_shape())?;

        let model = export(&network, &example, &kind.export_options())?;
        let input = TensorFixture::from_tensor(FixtureKind::Input, &example)?;
        let output = match output_path {
            Some(_) => Some(InferenceSession::new(model.clone())?.run(example)?),
            None => None,
        };

        model.save(model_path.as_ref())?;
        info!("Saved model to {:?}", model_path.as_ref());
        input.write(input_path.as_ref(), self.config.pretty_json)?;
        info!("Saved input to {:?}", input_path.as_ref());

        if let (Some(path), Some(output)) = (output_path, output.as_ref()) {
            TensorFixture::from_tensor(FixtureKind::Output, output)?
                .write(path, self.config.pretty_json)?;
            info!("Saved output to {:?}", path);
        }

        Ok(ExportReport {
            summary,
            operators: model.num_operators(),
            output_shape: output.map(|o| o.dims().to_vec()),
        })
    }

    /// Re-run inference and compare with the stored output fixture
    pub fn validate<P: AsRef<Path>, Q: AsRef<Path>, R: AsRef<Path>>(
        &self,
        model_path: P,
        input_path: Q,
        output_path: R,
    ) -> Result<ValidationResult> {
        let session = InferenceSession::load(model_path)?;
        let input = TensorFixture::read(FixtureKind::Input, input_path)?;
        let expected = TensorFixture::read(FixtureKind::Output, output_path.as_ref())?;

        let output = session.run_fixture(&input)?;
        let actual = TensorFixture::from_batch(FixtureKind::Output, &output, input.samples().len())?;

        let mut validator = Validator::new(self.config.validation.clone());
        let name = output_path.as_ref().display().to_string();
        let result = validator.validate_fixture(&name, &expected, &actual);
        validator.log_summary();
        Ok(result)
    }

    fn synthesize_for(&self, model: &OnnxModel) -> Result<(Vec<usize>, Tensor)> {
        let mut synth = InputSynthesizer::new(self.config.synth_distribution, self.config.seed)?;
        synth.for_model(model)
    }

    /// Describe a model and digest whichever fixtures exist
    pub fn describe<P: AsRef<Path>>(
        &self,
        model_path: P,
        fixtures: &[(FixtureKind, PathBuf)],
    ) -> Result<ModelDescription> {
        let model = OnnxModel::load(model_path)?;

        let mut fixture_digests = Vec::new();
        for (kind, path) in fixtures {
            if path.exists() {
                let fixture = TensorFixture::read(*kind, path)?;
                fixture_digests.push((path.clone(), hex(&fixture_digest(&fixture))));
            }
        }

        Ok(ModelDescription {
            ir_version: model.ir_version(),
            opset_version: model.opset_version(),
            producer: model.proto().producer_name.clone(),
            inputs: model.inputs(),
            outputs: model.outputs(),
            operators: model.operator_histogram(),
            parameters: model.parameter_count(),
            fixture_digests,
        })
    }
}
