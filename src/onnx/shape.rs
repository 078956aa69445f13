//! Declared tensor shapes
//!
//! Reads the tensor metadata an ONNX graph declares for its inputs and
//! outputs, and turns it into concrete shapes for data generation.

use candle_onnx::onnx::{self, tensor_proto::DataType, tensor_shape_proto::dimension, type_proto};
use std::fmt;
use tracing::warn;

use crate::error::FixtureError;

/// Name used for the dynamic batch axis in exported models
pub const BATCH_AXIS_NAME: &str = "batch_size";

/// A single declared dimension
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dim {
    /// Concrete positive size
    Fixed(usize),
    /// Named dynamic axis (e.g. `batch_size`)
    Symbolic(String),
    /// No size information at all
    Unknown,
}

impl Dim {
    fn from_proto(dim: &onnx::tensor_shape_proto::Dimension) -> Self {
        match &dim.value {
            Some(dimension::Value::DimValue(v)) if *v > 0 => Dim::Fixed(*v as usize),
            Some(dimension::Value::DimParam(p)) if !p.is_empty() => Dim::Symbolic(p.clone()),
            _ => Dim::Unknown,
        }
    }

    fn to_proto(&self) -> onnx::tensor_shape_proto::Dimension {
        let value = match self {
            Dim::Fixed(v) => Some(dimension::Value::DimValue(*v as i64)),
            Dim::Symbolic(name) => Some(dimension::Value::DimParam(name.clone())),
            Dim::Unknown => None,
        };
        onnx::tensor_shape_proto::Dimension {
            value,
            ..Default::default()
        }
    }

    /// Concrete size, if declared
    pub fn fixed(&self) -> Option<usize> {
        match self {
            Dim::Fixed(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for Dim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dim::Fixed(v) => write!(f, "{}", v),
            Dim::Symbolic(name) => write!(f, "{}", name),
            Dim::Unknown => write!(f, "?"),
        }
    }
}

/// Name, element type and dimensions of a declared graph tensor
#[derive(Debug, Clone, PartialEq)]
pub struct TensorSpec {
    /// Value name in the graph
    pub name: String,
    /// ONNX `TensorProto.DataType` code
    pub elem_type: i32,
    /// Declared dimensions, outermost first
    pub dims: Vec<Dim>,
}

impl TensorSpec {
    /// A float32 tensor spec
    pub fn float(name: &str, dims: Vec<Dim>) -> Self {
        Self {
            name: name.to_string(),
            elem_type: DataType::Float as i32,
            dims,
        }
    }

    /// Read a spec from graph metadata
    ///
    /// Non-tensor types yield a spec with no dimensions.
    pub fn from_value_info(info: &onnx::ValueInfoProto) -> Self {
        let tensor = info.r#type.as_ref().and_then(|t| match &t.value {
            Some(type_proto::Value::TensorType(tensor)) => Some(tensor),
            _ => None,
        });

        let (elem_type, dims) = match tensor {
            Some(tensor) => {
                let dims = tensor
                    .shape
                    .as_ref()
                    .map(|shape| shape.dim.iter().map(Dim::from_proto).collect())
                    .unwrap_or_default();
                (tensor.elem_type, dims)
            }
            None => (DataType::Undefined as i32, Vec::new()),
        };

        Self {
            name: info.name.clone(),
            elem_type,
            dims,
        }
    }

    /// Graph metadata for this spec
    pub fn to_value_info(&self) -> onnx::ValueInfoProto {
        let tensor = type_proto::Tensor {
            elem_type: self.elem_type,
            shape: Some(onnx::TensorShapeProto {
                dim: self.dims.iter().map(Dim::to_proto).collect(),
            }),
        };
        onnx::ValueInfoProto {
            name: self.name.clone(),
            r#type: Some(onnx::TypeProto {
                value: Some(type_proto::Value::TensorType(tensor)),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    /// Whether any dimension lacks a concrete size
    pub fn is_dynamic(&self) -> bool {
        self.dims.iter().any(|d| d.fixed().is_none())
    }

    /// Shape with every unspecified dimension set to 1, without logging
    pub fn resolved_dims(&self) -> Result<Vec<usize>, FixtureError> {
        if self.dims.is_empty() {
            return Err(FixtureError::MissingInputShape);
        }
        Ok(self.dims.iter().map(|d| d.fixed().unwrap_or(1)).collect())
    }

    /// Concrete shape for data generation
    ///
    /// Unspecified dimensions default to 1. Each defaulted dimension is
    /// reported, since the resulting shape may not be representative for
    /// models with dynamic axes.
    pub fn resolve_shape(&self) -> Result<Vec<usize>, FixtureError> {
        let shape = self.resolved_dims()?;
        for (axis, dim) in self.dims.iter().enumerate() {
            if dim.fixed().is_none() {
                warn!(
                    "Input `{}` axis {} is unspecified ({}); defaulting to 1",
                    self.name, axis, dim
                );
            }
        }
        Ok(shape)
    }

    /// Concrete shape able to hold exactly `total` values
    ///
    /// A non-fixed leading axis absorbs the batch: `total` must then be a
    /// multiple of the remaining dimensions.
    pub fn shape_for_elements(&self, total: usize) -> Result<Vec<usize>, FixtureError> {
        let mut shape = self.resolved_dims()?;
        if shape.iter().product::<usize>() == total {
            return Ok(shape);
        }

        let mismatch = || FixtureError::ShapeMismatch {
            name: self.name.clone(),
            shape: shape.clone(),
            actual: total,
        };

        if self.dims[0].fixed().is_some() {
            return Err(mismatch());
        }
        let rest: usize = shape[1..].iter().product();
        if rest == 0 || total == 0 || total % rest != 0 {
            return Err(mismatch());
        }
        shape[0] = total / rest;
        Ok(shape)
    }
}

impl fmt::Display for TensorSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dims: Vec<String> = self.dims.iter().map(|d| d.to_string()).collect();
        write!(f, "{} [{}]", self.name, dims.join(", "))
    }
}
