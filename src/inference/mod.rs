//! Inference and fixture orchestration
//!
//! - InferenceSession: one forward pass over a fixture
//! - Validator: compare a stored output fixture with a fresh capture
//! - FixturePipeline: the steps behind each CLI subcommand

mod capture;
mod pipeline;
mod validator;

pub use capture::InferenceSession;
pub use pipeline::{CaptureReport, ExportReport, FixturePipeline, ModelDescription};
pub use validator::{ValidationConfig, ValidationResult, Validator};
