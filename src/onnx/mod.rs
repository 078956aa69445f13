//! ONNX model artifacts
//!
//! - Loading and saving `ModelProto` files
//! - Declared input/output tensor metadata
//! - Exporting `candle_nn` networks to ONNX graphs
//! - Constant folding of exported graphs

mod export;
mod fold;
mod shape;

pub use export::{export, tensor_to_proto, ExportOptions, ExportableNetwork, GraphBuilder};
pub use fold::fold_constants;
pub use shape::{Dim, TensorSpec, BATCH_AXIS_NAME};

use anyhow::{Context, Result};
use candle_onnx::onnx::{GraphProto, ModelProto, NodeProto};
use prost::Message;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use tracing::debug;

use crate::error::FixtureError;

/// A loaded (or freshly exported) ONNX model
#[derive(Debug, Clone)]
pub struct OnnxModel {
    inner: ModelProto,
}

impl OnnxModel {
    /// Load a model from disk
    ///
    /// A missing file is reported as [`FixtureError::ModelNotFound`].
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(FixtureError::ModelNotFound(path.to_path_buf()).into());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read model file: {:?}", path))
            }
        };

        let inner = ModelProto::decode(bytes.as_slice())
            .with_context(|| format!("Failed to decode ONNX model: {:?}", path))?;
        debug!("Loaded {:?} ({} bytes)", path, bytes.len());

        Ok(Self { inner })
    }

    /// Wrap an in-memory proto
    pub fn from_proto(inner: ModelProto) -> Self {
        Self { inner }
    }

    /// Underlying proto
    pub fn proto(&self) -> &ModelProto {
        &self.inner
    }

    /// Serialize the model to disk
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.inner.encode_to_vec())
            .with_context(|| format!("Failed to write model file: {:?}", path))
    }

    /// Model graph
    pub fn graph(&self) -> Result<&GraphProto> {
        Ok(self.inner.graph.as_ref().ok_or(FixtureError::MissingGraph)?)
    }

    /// Declared runtime inputs, excluding entries that are initializers
    pub fn inputs(&self) -> Vec<TensorSpec> {
        let Some(graph) = self.inner.graph.as_ref() else {
            return Vec::new();
        };
        let initializers: HashSet<&str> =
            graph.initializer.iter().map(|t| t.name.as_str()).collect();

        graph
            .input
            .iter()
            .filter(|info| !initializers.contains(info.name.as_str()))
            .map(TensorSpec::from_value_info)
            .collect()
    }

    /// Declared graph outputs
    pub fn outputs(&self) -> Vec<TensorSpec> {
        self.inner
            .graph
            .as_ref()
            .map(|g| g.output.iter().map(TensorSpec::from_value_info).collect())
            .unwrap_or_default()
    }

    /// First declared runtime input
    pub fn primary_input(&self) -> Result<TensorSpec, FixtureError> {
        self.inputs()
            .into_iter()
            .next()
            .ok_or(FixtureError::MissingInputShape)
    }

    /// Names of the declared outputs, in order
    pub fn output_names(&self) -> Vec<String> {
        self.outputs().into_iter().map(|o| o.name).collect()
    }

    /// Number of operator nodes in the graph
    pub fn num_operators(&self) -> usize {
        self.inner.graph.as_ref().map_or(0, |g| g.node.len())
    }

    /// Operator node at `index`
    pub fn get_node(&self, index: usize) -> Option<&NodeProto> {
        self.inner.graph.as_ref()?.node.get(index)
    }

    /// Count of nodes per operator type
    pub fn operator_histogram(&self) -> BTreeMap<String, usize> {
        let mut histogram = BTreeMap::new();
        if let Some(graph) = self.inner.graph.as_ref() {
            for node in &graph.node {
                *histogram.entry(node.op_type.clone()).or_insert(0) += 1;
            }
        }
        histogram
    }

    /// Number of scalar parameters stored as initializers
    pub fn parameter_count(&self) -> usize {
        self.inner.graph.as_ref().map_or(0, |g| {
            g.initializer
                .iter()
                .map(|t| t.dims.iter().map(|&d| d.max(0) as usize).product::<usize>())
                .sum()
        })
    }

    /// Default-domain operator set version
    pub fn opset_version(&self) -> Option<i64> {
        self.inner
            .opset_import
            .iter()
            .find(|o| o.domain.is_empty() || o.domain == "ai.onnx")
            .map(|o| o.version)
    }

    /// IR version the file declares
    pub fn ir_version(&self) -> i64 {
        self.inner.ir_version
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_onnx::onnx::{OperatorSetIdProto, TensorProto};

    fn sample_model() -> OnnxModel {
        let weight = TensorProto {
            name: "w".to_string(),
            dims: vec![2, 3],
            ..Default::default()
        };
        let graph = GraphProto {
            node: vec![
                NodeProto {
                    op_type: "MatMul".to_string(),
                    input: vec!["x".to_string(), "w".to_string()],
                    output: vec!["h".to_string()],
                    ..Default::default()
                },
                NodeProto {
                    op_type: "Relu".to_string(),
                    input: vec!["h".to_string()],
                    output: vec!["y".to_string()],
                    ..Default::default()
                },
            ],
            initializer: vec![weight],
            input: vec![
                TensorSpec::float("w", vec![Dim::Fixed(2), Dim::Fixed(3)]).to_value_info(),
                TensorSpec::float("x", vec![Dim::Fixed(1), Dim::Fixed(2)]).to_value_info(),
            ],
            output: vec![TensorSpec::float("y", vec![Dim::Fixed(1), Dim::Fixed(3)]).to_value_info()],
            ..Default::default()
        };
        OnnxModel::from_proto(ModelProto {
            ir_version: 7,
            opset_import: vec![OperatorSetIdProto {
                domain: String::new(),
                version: 14,
            }],
            graph: Some(graph),
            ..Default::default()
        })
    }

    #[test]
    fn test_inputs_skip_initializers() {
        let model = sample_model();
        let inputs = model.inputs();
        assert_eq!(inputs.len(), 1);
        assert_eq!(inputs[0].name, "x");
        assert_eq!(model.primary_input().unwrap().name, "x");
    }

    #[test]
    fn test_model_summary_accessors() {
        let model = sample_model();
        assert_eq!(model.num_operators(), 2);
        assert_eq!(model.get_node(1).unwrap().op_type, "Relu");
        assert!(model.get_node(2).is_none());
        assert_eq!(model.parameter_count(), 6);
        assert_eq!(model.opset_version(), Some(14));
        assert_eq!(model.output_names(), vec!["y".to_string()]);

        let histogram = model.operator_histogram();
        assert_eq!(histogram.get("MatMul"), Some(&1));
        assert_eq!(histogram.get("Relu"), Some(&1));
    }

    #[test]
    fn test_empty_model() {
        let model = OnnxModel::from_proto(ModelProto::default());
        assert!(model.graph().is_err());
        assert!(model.inputs().is_empty());
        assert!(matches!(
            model.primary_input(),
            Err(FixtureError::MissingInputShape)
        ));
        assert_eq!(model.num_operators(), 0);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.onnx");
        let model = sample_model();
        model.save(&path).unwrap();

        let loaded = OnnxModel::load(&path).unwrap();
        assert_eq!(loaded.proto(), model.proto());
    }

    #[test]
    fn test_load_missing_file() {
        let err = OnnxModel::load("no/such/model.onnx").unwrap_err();
        let fixture_err = err.downcast_ref::<FixtureError>().unwrap();
        assert!(fixture_err.is_model_not_found());
    }

    #[test]
    fn test_load_garbage_is_not_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.onnx");
        std::fs::write(&path, b"\xff\xff\xff not a protobuf").unwrap();
        let err = OnnxModel::load(&path).unwrap_err();
        assert!(err.downcast_ref::<FixtureError>().is_none());
        assert!(err.to_string().contains("Failed to decode"));
    }
}
