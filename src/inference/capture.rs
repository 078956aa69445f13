//! Inference capture
//!
//! Binds a fixture to a model's declared input, runs one forward pass and
//! hands back the first declared output.

use anyhow::Result;
use candle_core::{Device, Tensor};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

use crate::error::FixtureError;
use crate::fixture::TensorFixture;
use crate::onnx::{OnnxModel, TensorSpec};
use crate::utils::shape_utils::format_shape;

/// A model ready to evaluate
pub struct InferenceSession {
    model: OnnxModel,
    input: TensorSpec,
    output_name: String,
    device: Device,
}

impl InferenceSession {
    /// Prepare a session for an in-memory model
    pub fn new(model: OnnxModel) -> Result<Self> {
        model.graph()?;
        let input = model.primary_input()?;
        let output_name = model
            .output_names()
            .into_iter()
            .next()
            .ok_or(FixtureError::NoDeclaredOutputs)?;

        Ok(Self {
            model,
            input,
            output_name,
            device: Device::Cpu,
        })
    }

    /// Load a model from disk
    ///
    /// A missing file is reported as [`FixtureError::ModelNotFound`].
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::new(OnnxModel::load(path)?)
    }

    /// Loaded model
    pub fn model(&self) -> &OnnxModel {
        &self.model
    }

    /// Name the input tensor is bound to
    pub fn input_name(&self) -> &str {
        &self.input.name
    }

    /// Declared metadata of the bound input
    pub fn input_spec(&self) -> &TensorSpec {
        &self.input
    }

    /// Name of the output that is captured
    pub fn output_name(&self) -> &str {
        &self.output_name
    }

    /// Run one forward pass on `input`
    pub fn run(&self, input: Tensor) -> Result<Tensor> {
        debug!(
            "Running `{}` on input shape {}",
            self.input.name,
            format_shape(input.dims())
        );
        let mut inputs = HashMap::new();
        inputs.insert(self.input.name.clone(), input);

        let mut outputs = candle_onnx::simple_eval(self.model.proto(), inputs)?;
        let output = outputs
            .remove(&self.output_name)
            .ok_or_else(|| FixtureError::MissingOutput(self.output_name.clone()))?;
        Ok(output)
    }

    /// Rebuild the input tensor from a fixture and run it
    ///
    /// The flattened fixture values are reshaped to the declared input
    /// shape; a dynamic leading axis takes up the number of samples.
    pub fn run_fixture(&self, fixture: &TensorFixture) -> Result<Tensor> {
        let shape = self.input.shape_for_elements(fixture.element_count())?;
        let input = fixture.to_tensor(&shape, &self.device)?;
        self.run(input)
    }
}
