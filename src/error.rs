//! Typed failure conditions
//!
//! Most functions return `anyhow::Result`; the variants below are the
//! conditions callers need to tell apart (the binary reports a missing
//! model differently from every other failure).

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while building, reading or running fixtures
#[derive(Debug, Error)]
pub enum FixtureError {
    /// The model artifact does not exist on disk
    #[error("{} not found. Please download the model first.", .0.display())]
    ModelNotFound(PathBuf),

    /// The model declares no usable input shape
    #[error("Could not determine input shape from model")]
    MissingInputShape,

    /// The model proto carries no graph
    #[error("Model has no graph")]
    MissingGraph,

    /// The graph declares no outputs
    #[error("Model declares no outputs")]
    NoDeclaredOutputs,

    /// Evaluation did not produce the declared output
    #[error("Model produced no output named `{0}`")]
    MissingOutput(String),

    /// The fixture file lacks the expected top-level key
    #[error("Fixture has no `{0}` entry")]
    MissingFixtureKey(&'static str),

    /// Fixture values do not fit the declared tensor shape
    #[error("Fixture holds {actual} values but input `{name}` expects shape {shape:?}")]
    ShapeMismatch {
        /// Name of the bound graph input
        name: String,
        /// Declared (resolved) shape
        shape: Vec<usize>,
        /// Number of values found in the fixture
        actual: usize,
    },

    /// Distribution parameters are unusable
    #[error("Invalid input distribution: {0}")]
    InvalidDistribution(String),
}

impl FixtureError {
    /// Whether this is the missing-model condition
    pub fn is_model_not_found(&self) -> bool {
        matches!(self, FixtureError::ModelNotFound(_))
    }
}

/// Line printed when a command fails
///
/// A missing model is reported with its own message only; everything else
/// carries the full context chain.
pub fn failure_message(err: &anyhow::Error) -> String {
    match err.downcast_ref::<FixtureError>() {
        Some(not_found) if not_found.is_model_not_found() => format!("Error: {}", not_found),
        _ => format!("Error: {:#}", err),
    }
}
