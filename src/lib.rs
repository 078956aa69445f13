//! # onnx-fixtures
//!
//! Generates test fixtures for an external ONNX test harness: a serialized
//! model plus matching `input.json` / `output.json` tensor fixtures.
//!
//! ## Features
//!
//! - Shape-driven input synthesis from a model's declared input
//! - Single-pass inference capture via Candle's ONNX evaluator
//! - Export of small fixed networks (`conv2d`, `mlp`) built with `candle_nn`
//! - Reproducibility checks and fixture digests
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use onnx_fixtures::{FixtureConfig, FixturePipeline};
//!
//! let pipeline = FixturePipeline::new(FixtureConfig::default());
//! let report = pipeline.lenet("model.onnx", "input.json", "output.json")?;
//! println!("{:?} -> {:?}", report.input_shape, report.output_shape);
//! ```

// Require docs for public items, but not struct fields (too verbose)
#![warn(missing_docs)]
#![allow(rustdoc::missing_crate_level_docs)]

pub mod config;
pub mod error;
pub mod fixture;
pub mod inference;
pub mod models;
pub mod onnx;
pub mod synth;
pub mod utils;

// Re-exports for convenience
pub use config::FixtureConfig;
pub use error::FixtureError;
pub use fixture::{FixtureKind, TensorFixture};
pub use inference::{FixturePipeline, InferenceSession, ValidationResult};
pub use models::NetworkKind;
pub use onnx::OnnxModel;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Model read by `lenet`
pub const DEFAULT_LENET_MODEL: &str = "model.onnx";

/// Model written by the network builders
pub const DEFAULT_NETWORK_MODEL: &str = "network.onnx";

/// Input fixture path
pub const DEFAULT_INPUT_JSON: &str = "input.json";

/// Output fixture path
pub const DEFAULT_OUTPUT_JSON: &str = "output.json";
