//! Fixture networks
//!
//! Small fixed architectures exported as model artifacts:
//! - `conv2d`: five convolutional blocks and a classifier head
//! - `mlp`: one hidden fully-connected layer

pub mod conv2d;
pub mod mlp;
mod sequential;

pub use sequential::{Layer, SequentialNet, WeightInit};

use anyhow::Result;
use std::fmt;

use crate::onnx::{ExportOptions, ExportableNetwork};
use crate::utils::shape_utils::{element_count, format_shape};
use crate::utils::size_utils::{params_size_mb, with_thousands};

/// Which fixture network to build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkKind {
    /// Five conv blocks and a classifier head
    Conv2d,
    /// 784-20-10 perceptron
    Mlp,
}

impl NetworkKind {
    /// Build the network with freshly initialized weights
    pub fn build(self, init: &mut WeightInit) -> Result<SequentialNet> {
        match self {
            NetworkKind::Conv2d => conv2d::build(init),
            NetworkKind::Mlp => mlp::build(init),
        }
    }

    /// Export settings the network is written with
    pub fn export_options(self) -> ExportOptions {
        match self {
            NetworkKind::Conv2d => conv2d::export_options(),
            NetworkKind::Mlp => mlp::export_options(),
        }
    }
}

impl fmt::Display for NetworkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkKind::Conv2d => write!(f, "conv2d"),
            NetworkKind::Mlp => write!(f, "mlp"),
        }
    }
}

/// Size figures printed before export
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkSummary {
    /// Example input shape
    pub input_shape: Vec<usize>,
    /// Scalar parameter count
    pub parameters: usize,
    /// Parameter size as f32, in MB
    pub size_mb: f64,
    /// Values in one example input
    pub input_elements: usize,
}

impl NetworkSummary {
    /// Figures for `network`
    pub fn of(network: &dyn ExportableNetwork) -> Self {
        let input_shape = network.input_shape();
        let parameters = network.parameter_count();
        Self {
            input_elements: element_count(&input_shape),
            size_mb: params_size_mb(parameters),
            parameters,
            input_shape,
        }
    }

    /// Summary lines, one per figure
    pub fn lines(&self) -> Vec<String> {
        vec![
            format!("Input shape: {}", format_shape(&self.input_shape)),
            format!("Model parameters: {}", with_thousands(self.parameters)),
            format!("Model size: {:.2} MB", self.size_mb),
            format!("Input data size: {} elements", with_thousands(self.input_elements)),
        ]
    }
}
