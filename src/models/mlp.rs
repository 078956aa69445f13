//! Fully-connected fixture network
//!
//! A flattened 28x28 image through one hidden layer of 20 units to 10
//! classes.

use anyhow::Result;

use super::{Layer, SequentialNet, WeightInit};
use crate::onnx::ExportOptions;

/// 28 * 28 pixels
pub const INPUT_SIZE: usize = 784;
/// Hidden units
pub const HIDDEN_SIZE: usize = 20;
/// Classifier outputs
pub const NUM_CLASSES: usize = 10;

/// Build the network with freshly initialized weights
pub fn build(init: &mut WeightInit) -> Result<SequentialNet> {
    Ok(SequentialNet::new("mlp", vec![1, INPUT_SIZE])
        .push("fc1", Layer::Linear(init.linear(INPUT_SIZE, HIDDEN_SIZE)?))
        .push("relu", Layer::Relu)
        .push("fc2", Layer::Linear(init.linear(HIDDEN_SIZE, NUM_CLASSES)?)))
}

/// Opset 14 with a fixed `[1, 784]` input
pub fn export_options() -> ExportOptions {
    ExportOptions {
        opset_version: 14,
        dynamic_batch: false,
        ..Default::default()
    }
}
