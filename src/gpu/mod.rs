pub mod record;
pub mod parser;
pub mod encoder;
pub mod sampler;

pub use record::*;
pub use sampler::{SampleError, Sampler};
