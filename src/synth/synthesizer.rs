//! Random input tensors
//!
//! Reads the first declared input of a model, resolves its shape and fills
//! a tensor of exactly that shape with independent random values.

use anyhow::Result;
use candle_core::{Device, Tensor};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info};

use super::distribution::{InputDistribution, Sampler};
use crate::onnx::OnnxModel;
use crate::utils::shape_utils::{element_count, format_shape};

/// Random tensor generator
pub struct InputSynthesizer {
    distribution: InputDistribution,
    sampler: Sampler,
    rng: StdRng,
    device: Device,
}

impl InputSynthesizer {
    /// Create a synthesizer; a seed makes the output reproducible
    pub fn new(distribution: InputDistribution, seed: Option<u64>) -> Result<Self> {
        let sampler = distribution.sampler()?;
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            distribution,
            sampler,
            rng,
            device: Device::Cpu,
        })
    }

    /// Distribution values are drawn from
    pub fn distribution(&self) -> InputDistribution {
        self.distribution
    }

    /// Draw `count` independent values
    pub fn sample_values(&mut self, count: usize) -> Vec<f32> {
        (0..count)
            .map(|_| self.sampler.sample(&mut self.rng))
            .collect()
    }

    /// Tensor of exactly `shape`
    pub fn synthesize(&mut self, shape: &[usize]) -> Result<Tensor> {
        let values = self.sample_values(element_count(shape));
        debug!(
            "Synthesized {} values from {} for shape {}",
            values.len(),
            self.distribution,
            format_shape(shape)
        );
        Ok(Tensor::from_vec(values, shape, &self.device)?)
    }

    /// Tensor matching the model's first declared input
    ///
    /// Fails with `MissingInputShape` when the model declares no input or
    /// an input without dimensions.
    pub fn for_model(&mut self, model: &OnnxModel) -> Result<(Vec<usize>, Tensor)> {
        let input = model.primary_input()?;
        let shape = input.resolve_shape()?;
        info!("Input `{}` resolved to shape {}", input.name, format_shape(&shape));
        let tensor = self.synthesize(&shape)?;
        Ok((shape, tensor))
    }
}
