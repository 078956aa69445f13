//! Integration tests for onnx-fixtures
//!
//! Tests the full pipeline from network export to captured output fixtures.

use anyhow::Result;
use candle_nn::Module;
use std::fs;
use std::path::Path;

// Import the library
use onnx_fixtures::config::FixtureConfig;
use onnx_fixtures::fixture::{fixture_digest, FixtureKind, TensorFixture};
use onnx_fixtures::inference::{FixturePipeline, InferenceSession};
use onnx_fixtures::models::{NetworkKind, WeightInit};
use onnx_fixtures::onnx::{Dim, OnnxModel};
use onnx_fixtures::synth::{InputDistribution, InputSynthesizer};
use onnx_fixtures::FixtureError;

fn pipeline(seed: u64) -> FixturePipeline {
    FixturePipeline::new(FixtureConfig {
        seed: Some(seed),
        ..Default::default()
    })
}

fn export_to(dir: &Path, kind: NetworkKind, seed: u64) -> Result<()> {
    pipeline(seed).export_network(
        kind,
        dir.join("network.onnx"),
        dir.join("export_input.json"),
        None,
    )?;
    Ok(())
}

/// Test that the mlp export matches a direct forward pass of the same network
#[test]
fn test_mlp_export_matches_forward() {
    let dir = tempfile::tempdir().unwrap();
    let model_path = dir.path().join("network.onnx");
    let input_path = dir.path().join("input.json");
    let output_path = dir.path().join("output.json");

    let report = pipeline(5)
        .export_network(NetworkKind::Mlp, &model_path, &input_path, Some(&output_path))
        .unwrap();
    assert_eq!(report.output_shape, Some(vec![1, 10]));

    // Same weights and example input as the pipeline draws
    let net = NetworkKind::Mlp.build(&mut WeightInit::new(Some(5))).unwrap();
    let x = InputSynthesizer::new(InputDistribution::StandardNormal, Some(6))
        .unwrap()
        .synthesize(&[1, 784])
        .unwrap();
    let expected: Vec<f32> = net.forward(&x).unwrap().flatten_all().unwrap().to_vec1().unwrap();

    let input = TensorFixture::read(FixtureKind::Input, &input_path).unwrap();
    let x_values: Vec<f32> = x.flatten_all().unwrap().to_vec1().unwrap();
    assert_eq!(input.values(), x_values);

    let output = TensorFixture::read(FixtureKind::Output, &output_path).unwrap();
    assert_eq!(output.samples().len(), 1);
    for (e, a) in expected.iter().zip(output.values()) {
        assert!((e - a).abs() < 1e-4, "expected {}, got {}", e, a);
    }
}

/// Test the exported mlp declares a fixed (1, 784) input
#[test]
fn test_mlp_declared_shapes() {
    let dir = tempfile::tempdir().unwrap();
    export_to(dir.path(), NetworkKind::Mlp, 1).unwrap();

    let model = OnnxModel::load(dir.path().join("network.onnx")).unwrap();
    let input = model.primary_input().unwrap();
    assert_eq!(input.name, "input");
    assert_eq!(input.dims, vec![Dim::Fixed(1), Dim::Fixed(784)]);
    assert_eq!(model.output_names(), vec!["output".to_string()]);
    assert_eq!(model.opset_version(), Some(14));
}

/// Test the (1, 784) export input is one sample of standard normal values
#[test]
fn test_mlp_input_standard_normal() {
    let dir = tempfile::tempdir().unwrap();
    export_to(dir.path(), NetworkKind::Mlp, 3).unwrap();

    let input = TensorFixture::read(FixtureKind::Input, dir.path().join("export_input.json")).unwrap();
    assert_eq!(input.samples().len(), 1);
    assert_eq!(input.samples()[0].len(), 784);

    let values = input.values();
    let n = values.len() as f32;
    let mean = values.iter().sum::<f32>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / n;
    assert!(mean.abs() < 0.2, "mean {}", mean);
    assert!((var - 1.0).abs() < 0.25, "variance {}", var);
    // Not confined to the uniform range
    assert!(values.iter().any(|v| v.abs() > 1.0));
}

/// Test the lenet flow on the exported conv network: 3072 values in [-1, 1]
#[test]
fn test_conv2d_lenet_flow() {
    let dir = tempfile::tempdir().unwrap();
    export_to(dir.path(), NetworkKind::Conv2d, 7).unwrap();

    let model = OnnxModel::load(dir.path().join("network.onnx")).unwrap();
    let declared = model.primary_input().unwrap();
    assert!(declared.is_dynamic());
    assert_eq!(model.opset_version(), Some(10));

    let input_path = dir.path().join("input.json");
    let output_path = dir.path().join("output.json");
    let report = pipeline(7)
        .lenet(dir.path().join("network.onnx"), &input_path, &output_path)
        .unwrap();
    assert_eq!(report.input_shape, vec![1, 3, 32, 32]);
    assert_eq!(report.output_shape, vec![1, 10]);

    let input = TensorFixture::read(FixtureKind::Input, &input_path).unwrap();
    assert_eq!(input.samples().len(), 1);
    assert_eq!(input.samples()[0].len(), 3072);
    assert!(input.values().iter().all(|v| (-1.0..=1.0).contains(v)));
}

/// Test repeated inference gives byte-identical output fixtures
#[test]
fn test_capture_is_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    export_to(dir.path(), NetworkKind::Mlp, 9).unwrap();

    let model_path = dir.path().join("network.onnx");
    let input_path = dir.path().join("export_input.json");
    let first = dir.path().join("first.json");
    let second = dir.path().join("second.json");

    let pipeline = pipeline(9);
    pipeline.capture_output(&model_path, &input_path, &first).unwrap();
    pipeline.capture_output(&model_path, &input_path, &second).unwrap();

    assert_eq!(fs::read(&first).unwrap(), fs::read(&second).unwrap());
}

/// Test seeded generation is reproducible end to end
#[test]
fn test_seeded_export_is_reproducible() {
    let a = tempfile::tempdir().unwrap();
    let b = tempfile::tempdir().unwrap();
    export_to(a.path(), NetworkKind::Mlp, 42).unwrap();
    export_to(b.path(), NetworkKind::Mlp, 42).unwrap();

    for name in ["network.onnx", "export_input.json"] {
        assert_eq!(
            fs::read(a.path().join(name)).unwrap(),
            fs::read(b.path().join(name)).unwrap(),
            "{} differs",
            name
        );
    }
}

/// Test a missing model reports not-found and leaves no output behind
#[test]
fn test_missing_model() {
    let dir = tempfile::tempdir().unwrap();
    let model_path = dir.path().join("model.onnx");
    let input_path = dir.path().join("input.json");
    let output_path = dir.path().join("output.json");
    fs::write(&input_path, r#"{"input_data":[[0.5,0.25]]}"#).unwrap();

    let err = pipeline(0)
        .capture_output(&model_path, &input_path, &output_path)
        .unwrap_err();
    let fixture_err = err.downcast_ref::<FixtureError>().unwrap();
    assert!(fixture_err.is_model_not_found());
    assert_eq!(
        err.to_string(),
        format!("{} not found. Please download the model first.", model_path.display())
    );
    assert!(!output_path.exists());
}

/// Test input fixtures round-trip byte-identically
#[test]
fn test_fixture_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    export_to(dir.path(), NetworkKind::Mlp, 13).unwrap();

    let path = dir.path().join("export_input.json");
    let written = fs::read_to_string(&path).unwrap();
    let fixture = TensorFixture::from_json(FixtureKind::Input, &written).unwrap();
    assert_eq!(fixture.to_json(false).unwrap(), written);

    let copy = dir.path().join("copy.json");
    fixture.write(&copy, false).unwrap();
    assert_eq!(fs::read_to_string(&copy).unwrap(), written);
    assert_eq!(fixture_digest(&fixture), fixture_digest(&TensorFixture::read(FixtureKind::Input, &copy).unwrap()));
}

/// Test validate passes on a fresh capture and fails on a tampered one
#[test]
fn test_validate() {
    let dir = tempfile::tempdir().unwrap();
    let model_path = dir.path().join("network.onnx");
    let input_path = dir.path().join("input.json");
    let output_path = dir.path().join("output.json");

    let pipeline = pipeline(21);
    pipeline
        .export_network(NetworkKind::Mlp, &model_path, &input_path, Some(&output_path))
        .unwrap();
    assert!(pipeline.validate(&model_path, &input_path, &output_path).unwrap().passed);

    let mut samples = TensorFixture::read(FixtureKind::Output, &output_path)
        .unwrap()
        .samples()
        .clone();
    samples[0][0] += 1.0;
    TensorFixture::new(FixtureKind::Output, samples)
        .write(&output_path, false)
        .unwrap();

    let result = pipeline.validate(&model_path, &input_path, &output_path).unwrap();
    assert!(!result.passed);
    assert_eq!(result.num_diffs, 1);
}

/// Test a session runs an exported model directly
#[test]
fn test_session_on_exported_model() {
    let dir = tempfile::tempdir().unwrap();
    export_to(dir.path(), NetworkKind::Mlp, 2).unwrap();

    let session = InferenceSession::load(dir.path().join("network.onnx")).unwrap();
    assert_eq!(session.input_name(), "input");
    assert_eq!(session.output_name(), "output");

    let input = TensorFixture::read(FixtureKind::Input, dir.path().join("export_input.json")).unwrap();
    let output = session.run_fixture(&input).unwrap();
    assert_eq!(output.dims(), &[1, 10]);
}

/// Test loading a YAML config
#[test]
fn test_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fixtures.yaml");
    fs::write(
        &path,
        "seed: 42\npretty_json: true\nsynth_distribution:\n  kind: normal\n  mean: 0.0\n  std: 0.5\nvalidation:\n  atol: 1.0e-3\n",
    )
    .unwrap();

    let config = FixtureConfig::load(&path).unwrap();
    assert_eq!(config.seed, Some(42));
    assert!(config.pretty_json);
    assert_eq!(
        config.synth_distribution,
        InputDistribution::Normal { mean: 0.0, std: 0.5 }
    );
    assert_eq!(config.export_distribution, InputDistribution::StandardNormal);
    assert_eq!(config.validation.atol, 1e-3);
    assert_eq!(config.validation.rtol, 1e-4);
}
