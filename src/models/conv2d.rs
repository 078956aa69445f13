//! Convolutional fixture network
//!
//! Five conv blocks (two 3x3 convolutions with ReLU, then 2x2 max-pool)
//! shrink a 32x32 RGB image to a 32-channel 1x1 map, followed by three
//! fully-connected layers down to 10 classes.

use anyhow::Result;
use candle_nn::Conv2dConfig;

use super::{Layer, SequentialNet, WeightInit};
use crate::onnx::ExportOptions;

/// RGB
pub const INPUT_CHANNELS: usize = 3;
/// Image height in pixels
pub const INPUT_HEIGHT: usize = 32;
/// Image width in pixels
pub const INPUT_WIDTH: usize = 32;
/// Classifier outputs
pub const NUM_CLASSES: usize = 10;

/// `(in, mid, out)` channels of each block
const BLOCKS: [(usize, usize, usize); 5] = [
    (3, 8, 8),
    (8, 16, 16),
    (16, 24, 32),
    (32, 32, 32),
    (32, 32, 32),
];

/// Build the network with freshly initialized weights
pub fn build(init: &mut WeightInit) -> Result<SequentialNet> {
    let conv_config = Conv2dConfig {
        padding: 1,
        ..Default::default()
    };

    let mut layers = Vec::new();
    for (in_c, mid_c, out_c) in BLOCKS {
        layers.push(Layer::Conv2d(init.conv2d(in_c, mid_c, 3, conv_config)?));
        layers.push(Layer::Relu);
        layers.push(Layer::Conv2d(init.conv2d(mid_c, out_c, 3, conv_config)?));
        layers.push(Layer::Relu);
        layers.push(Layer::MaxPool2d { kernel: 2, stride: 2 });
    }

    layers.push(Layer::Flatten);
    layers.push(Layer::Linear(init.linear(32, 64)?));
    layers.push(Layer::Relu);
    layers.push(Layer::Linear(init.linear(64, NUM_CLASSES)?));
    layers.push(Layer::Relu);
    layers.push(Layer::Linear(init.linear(NUM_CLASSES, NUM_CLASSES)?));

    Ok(SequentialNet::indexed(
        "conv2d",
        vec![1, INPUT_CHANNELS, INPUT_HEIGHT, INPUT_WIDTH],
        layers,
    ))
}

/// Opset 10 with a dynamic batch axis
pub fn export_options() -> ExportOptions {
    ExportOptions {
        opset_version: 10,
        dynamic_batch: true,
        ..Default::default()
    }
}
