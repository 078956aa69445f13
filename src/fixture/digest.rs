//! Fixture digests
//!
//! A SHA-256 over the fixture values rounded to a fixed number of decimals,
//! so outputs that differ only by float noise hash the same.

use sha2::{Digest, Sha256};

use super::TensorFixture;

/// Decimal places kept before hashing
pub const DIGEST_DECIMALS: i32 = 4;

fn round_to(value: f32, decimals: i32) -> f32 {
    let scale = 10f64.powi(decimals);
    ((value as f64 * scale).round() / scale) as f32
}

/// Digest of the fixture's samples
pub fn fixture_digest(fixture: &TensorFixture) -> [u8; 32] {
    let rounded: Vec<Vec<f32>> = fixture
        .samples()
        .iter()
        .map(|s| s.iter().map(|&v| round_to(v, DIGEST_DECIMALS)).collect())
        .collect();

    let mut hasher = Sha256::new();
    hasher.update(fixture.kind().key().as_bytes());
    for sample in &rounded {
        hasher.update((sample.len() as u64).to_le_bytes());
        for v in sample {
            // -0.0 and 0.0 round to the same bucket
            let v = if *v == 0.0 { 0.0f32 } else { *v };
            hasher.update(v.to_le_bytes());
        }
    }
    hasher.finalize().into()
}
