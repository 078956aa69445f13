//! Shape-driven input synthesis
//!
//! - Input value distributions (uniform, normal)
//! - Random tensors matching a model's declared input shape

mod distribution;
mod synthesizer;

pub use distribution::InputDistribution;
pub use synthesizer::InputSynthesizer;
