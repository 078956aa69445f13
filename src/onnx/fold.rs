//! Constant folding
//!
//! Nodes whose inputs are all initializers are evaluated once and
//! replaced by initializers holding their results.

use anyhow::{anyhow, Result};
use candle_onnx::onnx;
use std::collections::{HashMap, HashSet};
use tracing::debug;

use super::export::tensor_to_proto;
use crate::error::FixtureError;

/// Fold constant subgraphs in place, returning the number of removed nodes
///
/// Initializers no longer referenced by any node or graph output are
/// dropped afterwards. Nodes that produce a graph output are left alone.
pub fn fold_constants(model: &mut onnx::ModelProto) -> Result<usize> {
    let opset_import = model.opset_import.clone();
    let ir_version = model.ir_version;
    let graph = model.graph.as_mut().ok_or(FixtureError::MissingGraph)?;

    let graph_outputs: HashSet<String> = graph.output.iter().map(|o| o.name.clone()).collect();
    let runtime_inputs: HashSet<String> = graph.input.iter().map(|i| i.name.clone()).collect();

    // Insertion-ordered so the folded file is stable across runs
    let mut constants: Vec<onnx::TensorProto> = std::mem::take(&mut graph.initializer);
    let mut index: HashMap<String, usize> = constants
        .iter()
        .enumerate()
        .filter(|(_, t)| !runtime_inputs.contains(&t.name))
        .map(|(i, t)| (t.name.clone(), i))
        .collect();

    let mut kept = Vec::with_capacity(graph.node.len());
    let mut folded = 0;

    for node in std::mem::take(&mut graph.node) {
        let foldable = !node.output.is_empty()
            && node.output.iter().all(|o| !graph_outputs.contains(o))
            && node
                .input
                .iter()
                .all(|i| i.is_empty() || index.contains_key(i));
        if !foldable {
            kept.push(node);
            continue;
        }

        let inputs: Vec<onnx::TensorProto> = node
            .input
            .iter()
            .filter_map(|i| index.get(i).map(|&idx| constants[idx].clone()))
            .collect();

        match evaluate_node(&node, inputs, &opset_import, ir_version) {
            Ok(results) => {
                debug!("Folded {} ({})", node.name, node.op_type);
                for proto in results {
                    index.insert(proto.name.clone(), constants.len());
                    constants.push(proto);
                }
                folded += 1;
            }
            Err(err) => {
                debug!("Left {} unfolded: {}", node.name, err);
                kept.push(node);
            }
        }
    }

    let referenced: HashSet<&str> = kept
        .iter()
        .flat_map(|n| n.input.iter().map(String::as_str))
        .chain(graph_outputs.iter().map(String::as_str))
        .collect();
    graph.initializer = constants
        .into_iter()
        .filter(|t| referenced.contains(t.name.as_str()))
        .collect();
    graph.node = kept;

    Ok(folded)
}

/// Evaluate a single node over constant inputs
fn evaluate_node(
    node: &onnx::NodeProto,
    inputs: Vec<onnx::TensorProto>,
    opset_import: &[onnx::OperatorSetIdProto],
    ir_version: i64,
) -> Result<Vec<onnx::TensorProto>> {
    let outputs: Vec<String> = node.output.iter().filter(|o| !o.is_empty()).cloned().collect();
    let model = onnx::ModelProto {
        ir_version,
        opset_import: opset_import.to_vec(),
        graph: Some(onnx::GraphProto {
            node: vec![node.clone()],
            initializer: inputs,
            output: outputs
                .iter()
                .map(|name| onnx::ValueInfoProto {
                    name: name.clone(),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }),
        ..Default::default()
    };

    let mut values = candle_onnx::simple_eval(&model, HashMap::new())?;
    outputs
        .iter()
        .map(|name| {
            let tensor = values
                .remove(name)
                .ok_or_else(|| anyhow!("no value for {}", name))?;
            tensor_to_proto(name, &tensor)
        })
        .collect()
}
