//! Export of `candle_nn` networks to ONNX graphs
//!
//! A network describes itself to a [`GraphBuilder`] layer by layer; the
//! builder records the matching ONNX operators and parameter tensors with
//! the same naming a PyTorch export uses (`0.weight`, `/0/Conv`, ...).

use anyhow::{bail, Result};
use candle_core::{DType, Tensor};
use candle_nn::{Conv2d, Linear, Module};
use candle_onnx::onnx::{self, attribute_proto::AttributeType, tensor_proto::DataType};
use tracing::{debug, info};

use super::fold::fold_constants;
use super::shape::{Dim, TensorSpec, BATCH_AXIS_NAME};
use super::OnnxModel;

/// Options controlling how a network is written out
#[derive(Debug, Clone, PartialEq)]
pub struct ExportOptions {
    /// Default-domain operator set version
    pub opset_version: i64,
    /// Embed parameters as initializers; otherwise they become graph inputs
    pub export_params: bool,
    /// Pre-compute nodes whose inputs are all constants
    pub do_constant_folding: bool,
    /// Declare axis 0 of the input and output as a symbolic batch axis
    pub dynamic_batch: bool,
    /// Name of the graph input
    pub input_name: String,
    /// Name of the graph output
    pub output_name: String,
    /// Recorded as the model's producer
    pub producer_name: String,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            opset_version: 14,
            export_params: true,
            do_constant_folding: true,
            dynamic_batch: false,
            input_name: "input".to_string(),
            output_name: "output".to_string(),
            producer_name: "onnx-fixtures".to_string(),
        }
    }
}

impl ExportOptions {
    /// IR version matching the operator set
    pub fn ir_version(&self) -> i64 {
        match self.opset_version {
            ..=8 => 3,
            9 => 4,
            10 => 5,
            11 => 6,
            12..=14 => 7,
            15..=18 => 8,
            _ => 9,
        }
    }

    fn dims(&self, shape: &[usize]) -> Vec<Dim> {
        shape
            .iter()
            .enumerate()
            .map(|(axis, &d)| {
                if axis == 0 && self.dynamic_batch {
                    Dim::Symbolic(BATCH_AXIS_NAME.to_string())
                } else {
                    Dim::Fixed(d)
                }
            })
            .collect()
    }
}

/// A network that can describe its layers as ONNX operators
pub trait ExportableNetwork: Module {
    /// Short name used in logs and the graph name
    fn name(&self) -> &str;

    /// Shape of the example input the network is exported with
    fn input_shape(&self) -> Vec<usize>;

    /// Number of scalar parameters
    fn parameter_count(&self) -> usize;

    /// Record every layer, in forward order
    fn trace(&self, builder: &mut GraphBuilder) -> Result<()>;
}

fn int_attr(name: &str, value: i64) -> onnx::AttributeProto {
    onnx::AttributeProto {
        name: name.to_string(),
        r#type: AttributeType::Int as i32,
        i: value,
        ..Default::default()
    }
}

fn ints_attr(name: &str, values: Vec<i64>) -> onnx::AttributeProto {
    onnx::AttributeProto {
        name: name.to_string(),
        r#type: AttributeType::Ints as i32,
        ints: values,
        ..Default::default()
    }
}

fn float_attr(name: &str, value: f32) -> onnx::AttributeProto {
    onnx::AttributeProto {
        name: name.to_string(),
        r#type: AttributeType::Float as i32,
        f: value,
        ..Default::default()
    }
}

/// Convert a tensor to an initializer with raw little-endian data
///
/// Only `f32` and `i64` tensors are supported.
pub fn tensor_to_proto(name: &str, tensor: &Tensor) -> Result<onnx::TensorProto> {
    let (data_type, raw_data) = match tensor.dtype() {
        DType::F32 => {
            let values: Vec<f32> = tensor.flatten_all()?.to_vec1()?;
            (
                DataType::Float,
                values.iter().flat_map(|v| v.to_le_bytes()).collect(),
            )
        }
        DType::I64 => {
            let values: Vec<i64> = tensor.flatten_all()?.to_vec1()?;
            (
                DataType::Int64,
                values.iter().flat_map(|v| v.to_le_bytes()).collect(),
            )
        }
        other => bail!("Cannot store {:?} tensor `{}` as an initializer", other, name),
    };

    Ok(onnx::TensorProto {
        name: name.to_string(),
        dims: tensor.dims().iter().map(|&d| d as i64).collect(),
        data_type: data_type as i32,
        raw_data,
        ..Default::default()
    })
}

/// Records operators and parameters while a network is traced
pub struct GraphBuilder {
    nodes: Vec<onnx::NodeProto>,
    params: Vec<onnx::TensorProto>,
    current: String,
}

impl GraphBuilder {
    /// Start a graph whose first operator reads `input_name`
    pub fn new(input_name: &str) -> Self {
        Self {
            nodes: Vec::new(),
            params: Vec::new(),
            current: input_name.to_string(),
        }
    }

    /// Name of the value produced by the last recorded operator
    pub fn current_output(&self) -> &str {
        &self.current
    }

    /// Recorded operators
    pub fn nodes(&self) -> &[onnx::NodeProto] {
        &self.nodes
    }

    /// Recorded parameter tensors
    pub fn params(&self) -> &[onnx::TensorProto] {
        &self.params
    }

    /// Store a parameter tensor, returning its graph name
    pub fn add_parameter(&mut self, name: String, tensor: &Tensor) -> Result<String> {
        let proto = tensor_to_proto(&name, &tensor.to_dtype(DType::F32)?)?;
        self.params.push(proto);
        Ok(name)
    }

    fn push_node(
        &mut self,
        scope: &str,
        op_type: &str,
        extra_inputs: Vec<String>,
        attribute: Vec<onnx::AttributeProto>,
    ) {
        let output = format!("/{}/{}_output_0", scope, op_type);
        let mut input = vec![std::mem::replace(&mut self.current, output.clone())];
        input.extend(extra_inputs);

        self.nodes.push(onnx::NodeProto {
            name: format!("/{}/{}", scope, op_type),
            op_type: op_type.to_string(),
            input,
            output: vec![output],
            attribute,
            ..Default::default()
        });
    }

    /// 2-D convolution with optional bias
    pub fn conv2d(&mut self, scope: &str, conv: &Conv2d) -> Result<()> {
        let (_out, _in, kh, kw) = conv.weight().dims4()?;
        let config = conv.config();

        let mut inputs = vec![self.add_parameter(format!("{}.weight", scope), conv.weight())?];
        if let Some(bias) = conv.bias() {
            inputs.push(self.add_parameter(format!("{}.bias", scope), bias)?);
        }

        let dilation = config.dilation as i64;
        let padding = config.padding as i64;
        let stride = config.stride as i64;
        self.push_node(
            scope,
            "Conv",
            inputs,
            vec![
                ints_attr("dilations", vec![dilation, dilation]),
                int_attr("group", config.groups as i64),
                ints_attr("kernel_shape", vec![kh as i64, kw as i64]),
                ints_attr("pads", vec![padding; 4]),
                ints_attr("strides", vec![stride, stride]),
            ],
        );
        Ok(())
    }

    /// Fully-connected layer
    ///
    /// With a bias this is a `Gemm` with `transB = 1`; without one the
    /// weight is stored pre-transposed for a `MatMul`.
    pub fn linear(&mut self, scope: &str, linear: &Linear) -> Result<()> {
        match linear.bias() {
            Some(bias) => {
                let weight = self.add_parameter(format!("{}.weight", scope), linear.weight())?;
                let bias = self.add_parameter(format!("{}.bias", scope), bias)?;
                self.push_node(
                    scope,
                    "Gemm",
                    vec![weight, bias],
                    vec![
                        float_attr("alpha", 1.0),
                        float_attr("beta", 1.0),
                        int_attr("transB", 1),
                    ],
                );
            }
            None => {
                let weight_t = linear.weight().t()?.contiguous()?;
                let weight = self.add_parameter(format!("{}.weight", scope), &weight_t)?;
                self.push_node(scope, "MatMul", vec![weight], Vec::new());
            }
        }
        Ok(())
    }

    /// Rectified linear unit
    pub fn relu(&mut self, scope: &str) {
        self.push_node(scope, "Relu", Vec::new(), Vec::new());
    }

    /// 2-D max pooling with a square window
    pub fn max_pool2d(&mut self, scope: &str, kernel: usize, stride: usize) {
        let kernel = kernel as i64;
        let stride = stride as i64;
        self.push_node(
            scope,
            "MaxPool",
            Vec::new(),
            vec![
                ints_attr("kernel_shape", vec![kernel, kernel]),
                ints_attr("pads", vec![0; 4]),
                ints_attr("strides", vec![stride, stride]),
            ],
        );
    }

    /// Collapse all axes from `axis` on
    pub fn flatten(&mut self, scope: &str, axis: i64) {
        self.push_node(scope, "Flatten", Vec::new(), vec![int_attr("axis", axis)]);
    }

    /// Assemble the model proto
    pub fn finish(
        mut self,
        graph_name: &str,
        options: &ExportOptions,
        input_shape: &[usize],
        output_shape: &[usize],
    ) -> Result<onnx::ModelProto> {
        let Some(last) = self.nodes.last_mut() else {
            bail!("Network `{}` recorded no operators", graph_name);
        };
        last.output = vec![options.output_name.clone()];

        let mut input =
            vec![TensorSpec::float(&options.input_name, options.dims(input_shape)).to_value_info()];
        let output =
            vec![TensorSpec::float(&options.output_name, options.dims(output_shape)).to_value_info()];

        let initializer = if options.export_params {
            self.params
        } else {
            input.extend(self.params.iter().map(|p| {
                let dims = p.dims.iter().map(|&d| Dim::Fixed(d as usize)).collect();
                TensorSpec::float(&p.name, dims).to_value_info()
            }));
            Vec::new()
        };

        let graph = onnx::GraphProto {
            name: graph_name.to_string(),
            node: self.nodes,
            initializer,
            input,
            output,
            ..Default::default()
        };

        Ok(onnx::ModelProto {
            ir_version: options.ir_version(),
            opset_import: vec![onnx::OperatorSetIdProto {
                domain: String::new(),
                version: options.opset_version,
            }],
            producer_name: options.producer_name.clone(),
            producer_version: crate::VERSION.to_string(),
            graph: Some(graph),
            ..Default::default()
        })
    }
}

/// Export a network, tracing it on `example_input`
///
/// The forward pass on the example input fixes the declared output shape.
pub fn export(
    network: &dyn ExportableNetwork,
    example_input: &Tensor,
    options: &ExportOptions,
) -> Result<OnnxModel> {
    let output = network.forward(example_input)?;

    let mut builder = GraphBuilder::new(&options.input_name);
    network.trace(&mut builder)?;
    debug!(
        "Traced {} operators, {} parameter tensors",
        builder.nodes().len(),
        builder.params().len()
    );

    let mut proto = builder.finish(network.name(), options, example_input.dims(), output.dims())?;
    if options.do_constant_folding {
        let folded = fold_constants(&mut proto)?;
        debug!("Constant folding removed {} nodes", folded);
    }

    let model = OnnxModel::from_proto(proto);
    info!(
        "Exported `{}`: {} operators, opset {}",
        network.name(),
        model.num_operators(),
        options.opset_version
    );
    Ok(model)
}
