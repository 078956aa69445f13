//! JSON tensor fixtures
//!
//! A fixture is a JSON object with a single key mapping to a list of
//! samples, each sample being a flat list of numbers:
//!
//! ```json
//! {"input_data": [[0.12, -0.5, 0.98]]}
//! ```

use anyhow::{Context, Result};
use candle_core::Tensor;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::error::FixtureError;

/// Flattened samples
pub type Data = Vec<Vec<f32>>;

/// Which side of a test case a fixture holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixtureKind {
    /// `input_data`
    Input,
    /// `output_data`
    Output,
}

impl FixtureKind {
    /// Top-level JSON key
    pub fn key(self) -> &'static str {
        match self {
            FixtureKind::Input => "input_data",
            FixtureKind::Output => "output_data",
        }
    }
}

impl fmt::Display for FixtureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Serialize, Deserialize, Default)]
struct FixtureFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    input_data: Option<Data>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    output_data: Option<Data>,
}

/// Sample tensor data for one side of a test case
#[derive(Debug, Clone, PartialEq)]
pub struct TensorFixture {
    kind: FixtureKind,
    samples: Data,
}

impl TensorFixture {
    /// Build a fixture from raw samples
    pub fn new(kind: FixtureKind, samples: Data) -> Self {
        Self { kind, samples }
    }

    /// Single-sample fixture holding the whole tensor, flattened
    pub fn from_tensor(kind: FixtureKind, tensor: &Tensor) -> Result<Self> {
        let values: Vec<f32> = tensor
            .flatten_all()?
            .to_dtype(candle_core::DType::F32)?
            .to_vec1()?;
        Ok(Self::new(kind, vec![values]))
    }

    /// One sample per entry of the leading axis
    ///
    /// Used for outputs of a batch of `samples` inputs. With a single
    /// sample, or when the leading axis does not match the batch, the
    /// tensor is kept whole as in [`TensorFixture::from_tensor`].
    pub fn from_batch(kind: FixtureKind, tensor: &Tensor, samples: usize) -> Result<Self> {
        if samples <= 1 || tensor.rank() == 0 || tensor.dim(0)? != samples {
            return Self::from_tensor(kind, tensor);
        }
        let rows: Data = tensor
            .to_dtype(candle_core::DType::F32)?
            .reshape((samples, tensor.elem_count() / samples))?
            .to_vec2()?;
        Ok(Self::new(kind, rows))
    }

    /// Which side of the test case this fixture holds
    pub fn kind(&self) -> FixtureKind {
        self.kind
    }

    /// Samples in file order
    pub fn samples(&self) -> &Data {
        &self.samples
    }

    /// Total number of values across all samples
    pub fn element_count(&self) -> usize {
        self.samples.iter().map(Vec::len).sum()
    }

    /// All values, samples concatenated
    pub fn values(&self) -> Vec<f32> {
        self.samples.iter().flatten().copied().collect()
    }

    /// Serialize to JSON, compact or with two-space indentation
    pub fn to_json(&self, pretty: bool) -> Result<String> {
        let mut file = FixtureFile::default();
        match self.kind {
            FixtureKind::Input => file.input_data = Some(self.samples.clone()),
            FixtureKind::Output => file.output_data = Some(self.samples.clone()),
        }
        let json = if pretty {
            serde_json::to_string_pretty(&file)?
        } else {
            serde_json::to_string(&file)?
        };
        Ok(json)
    }

    /// Parse the `kind` entry out of a fixture document
    pub fn from_json(kind: FixtureKind, json: &str) -> Result<Self> {
        let file: FixtureFile = serde_json::from_str(json)?;
        let samples = match kind {
            FixtureKind::Input => file.input_data,
            FixtureKind::Output => file.output_data,
        }
        .ok_or(FixtureError::MissingFixtureKey(kind.key()))?;
        Ok(Self::new(kind, samples))
    }

    /// Read a fixture file
    pub fn read<P: AsRef<Path>>(kind: FixtureKind, path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read fixture: {:?}", path))?;
        Self::from_json(kind, &json).with_context(|| format!("Invalid fixture: {:?}", path))
    }

    /// Write the fixture
    ///
    /// The document is fully serialized before the file is created.
    pub fn write<P: AsRef<Path>>(&self, path: P, pretty: bool) -> Result<()> {
        let path = path.as_ref();
        let json = self.to_json(pretty)?;
        std::fs::write(path, json).with_context(|| format!("Failed to write fixture: {:?}", path))
    }

    /// Rebuild a tensor of `shape` from the fixture values
    pub fn to_tensor(&self, shape: &[usize], device: &candle_core::Device) -> Result<Tensor> {
        Ok(Tensor::from_vec(self.values(), shape, device)?)
    }
}
