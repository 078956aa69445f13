//! Sequential networks built from `candle_nn` layers
//!
//! The fixture networks are plain layer stacks. Each layer carries the
//! scope name it is exported under, so parameter names match what the
//! equivalent PyTorch module would produce (`0.weight`, `fc1.bias`, ...).

use anyhow::Result;
use candle_core::{Device, Tensor};
use candle_nn::{Conv2d, Conv2dConfig, Linear, Module};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::onnx::{ExportableNetwork, GraphBuilder};

/// One layer of a [`SequentialNet`]
pub enum Layer {
    /// 2-D convolution
    Conv2d(Conv2d),
    /// Rectified linear unit
    Relu,
    /// Square max pooling
    MaxPool2d { kernel: usize, stride: usize },
    /// Collapse everything after the batch axis
    Flatten,
    /// Fully-connected layer
    Linear(Linear),
}

impl Layer {
    fn parameter_count(&self) -> usize {
        match self {
            Layer::Conv2d(conv) => {
                conv.weight().elem_count() + conv.bias().map_or(0, |b| b.elem_count())
            }
            Layer::Linear(linear) => {
                linear.weight().elem_count() + linear.bias().map_or(0, |b| b.elem_count())
            }
            _ => 0,
        }
    }
}

impl Module for Layer {
    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        match self {
            Layer::Conv2d(conv) => conv.forward(xs),
            Layer::Relu => xs.relu(),
            Layer::MaxPool2d { kernel, stride } => xs.max_pool2d_with_stride(*kernel, *stride),
            Layer::Flatten => xs.flatten_from(1),
            Layer::Linear(linear) => linear.forward(xs),
        }
    }
}

/// A stack of named layers applied in order
pub struct SequentialNet {
    name: String,
    input_shape: Vec<usize>,
    layers: Vec<(String, Layer)>,
}

impl SequentialNet {
    /// Empty network taking inputs of `input_shape`
    pub fn new(name: &str, input_shape: Vec<usize>) -> Self {
        Self {
            name: name.to_string(),
            input_shape,
            layers: Vec::new(),
        }
    }

    /// Network whose layers are scoped by position (`0`, `1`, ...)
    pub fn indexed(name: &str, input_shape: Vec<usize>, layers: Vec<Layer>) -> Self {
        layers
            .into_iter()
            .enumerate()
            .fold(Self::new(name, input_shape), |net, (i, layer)| {
                net.push(&i.to_string(), layer)
            })
    }

    /// Append a layer under `scope`
    pub fn push(mut self, scope: &str, layer: Layer) -> Self {
        self.layers.push((scope.to_string(), layer));
        self
    }

    /// Layers with their scope names
    pub fn layers(&self) -> &[(String, Layer)] {
        &self.layers
    }
}

impl Module for SequentialNet {
    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        let mut x = xs.clone();
        for (_, layer) in &self.layers {
            x = layer.forward(&x)?;
        }
        Ok(x)
    }
}

impl ExportableNetwork for SequentialNet {
    fn name(&self) -> &str {
        &self.name
    }

    fn input_shape(&self) -> Vec<usize> {
        self.input_shape.clone()
    }

    fn parameter_count(&self) -> usize {
        self.layers.iter().map(|(_, l)| l.parameter_count()).sum()
    }

    fn trace(&self, builder: &mut GraphBuilder) -> Result<()> {
        for (scope, layer) in &self.layers {
            match layer {
                Layer::Conv2d(conv) => builder.conv2d(scope, conv)?,
                Layer::Relu => builder.relu(scope),
                Layer::MaxPool2d { kernel, stride } => builder.max_pool2d(scope, *kernel, *stride),
                Layer::Flatten => builder.flatten(scope, 1),
                Layer::Linear(linear) => builder.linear(scope, linear)?,
            }
        }
        Ok(())
    }
}

/// Parameter initializer
///
/// Weights and biases are uniform in `±1/sqrt(fan_in)`, PyTorch's default
/// for `Linear` and `Conv2d`.
pub struct WeightInit {
    rng: StdRng,
    device: Device,
}

impl WeightInit {
    /// Seeded initializer, or entropy-seeded when `seed` is `None`
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rng,
            device: Device::Cpu,
        }
    }

    fn uniform(&mut self, shape: &[usize], bound: f32) -> Result<Tensor> {
        let n: usize = shape.iter().product();
        let values: Vec<f32> = (0..n).map(|_| self.rng.gen_range(-bound..bound)).collect();
        Ok(Tensor::from_vec(values, shape, &self.device)?)
    }

    /// Square-kernel convolution with bias
    pub fn conv2d(
        &mut self,
        in_channels: usize,
        out_channels: usize,
        kernel: usize,
        config: Conv2dConfig,
    ) -> Result<Conv2d> {
        let fan_in = in_channels / config.groups.max(1) * kernel * kernel;
        let bound = 1.0 / (fan_in as f32).sqrt();
        let weight = self.uniform(
            &[out_channels, in_channels / config.groups.max(1), kernel, kernel],
            bound,
        )?;
        let bias = self.uniform(&[out_channels], bound)?;
        Ok(Conv2d::new(weight, Some(bias), config))
    }

    /// Fully-connected layer with bias
    pub fn linear(&mut self, in_dim: usize, out_dim: usize) -> Result<Linear> {
        let bound = 1.0 / (in_dim as f32).sqrt();
        let weight = self.uniform(&[out_dim, in_dim], bound)?;
        let bias = self.uniform(&[out_dim], bound)?;
        Ok(Linear::new(weight, Some(bias)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weight_init_bounds() {
        let mut init = WeightInit::new(Some(3));
        let linear = init.linear(16, 4).unwrap();
        assert_eq!(linear.weight().dims(), &[4, 16]);

        let values: Vec<f32> = linear.weight().flatten_all().unwrap().to_vec1().unwrap();
        assert!(values.iter().all(|v| v.abs() <= 0.25));
    }

    #[test]
    fn test_weight_init_seeded() {
        let a = WeightInit::new(Some(9)).linear(4, 2).unwrap();
        let b = WeightInit::new(Some(9)).linear(4, 2).unwrap();
        let av: Vec<f32> = a.weight().flatten_all().unwrap().to_vec1().unwrap();
        let bv: Vec<f32> = b.weight().flatten_all().unwrap().to_vec1().unwrap();
        assert_eq!(av, bv);
    }

    #[test]
    fn test_indexed_scopes_and_forward() {
        let mut init = WeightInit::new(Some(0));
        let net = SequentialNet::indexed(
            "tiny",
            vec![1, 1, 4, 4],
            vec![
                Layer::Conv2d(
                    init.conv2d(
                        1,
                        2,
                        3,
                        Conv2dConfig {
                            padding: 1,
                            ..Default::default()
                        },
                    )
                    .unwrap(),
                ),
                Layer::Relu,
                Layer::MaxPool2d { kernel: 2, stride: 2 },
                Layer::Flatten,
                Layer::Linear(init.linear(8, 3).unwrap()),
            ],
        );

        let scopes: Vec<&str> = net.layers().iter().map(|(s, _)| s.as_str()).collect();
        assert_eq!(scopes, vec!["0", "1", "2", "3", "4"]);
        assert_eq!(net.parameter_count(), (2 * 9 + 2) + (8 * 3 + 3));

        let x = Tensor::ones((1, 1, 4, 4), candle_core::DType::F32, &Device::Cpu).unwrap();
        let y = net.forward(&x).unwrap();
        assert_eq!(y.dims(), &[1, 3]);

        let mut builder = GraphBuilder::new("input");
        net.trace(&mut builder).unwrap();
        let ops: Vec<&str> = builder.nodes().iter().map(|n| n.op_type.as_str()).collect();
        assert_eq!(ops, vec!["Conv", "Relu", "MaxPool", "Flatten", "Gemm"]);
    }
}
