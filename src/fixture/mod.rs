//! Tensor fixtures
//!
//! - JSON input/output fixtures (`input_data` / `output_data`)
//! - Content digests for comparing fixtures across runs

mod digest;
mod tensor_fixture;

pub use digest::{fixture_digest, DIGEST_DECIMALS};
pub use tensor_fixture::{Data, FixtureKind, TensorFixture};
