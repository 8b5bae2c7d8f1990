pub mod batching;
pub mod classification;
pub mod codec;
pub mod config;
pub mod error;
pub mod observability;
pub mod pipeline;
pub mod preprocessing;
pub mod request;
pub mod response;
pub mod tensor;
pub mod transport;

#[cfg(test)]
mod observability_tests;

// Re-export common types
pub use error::ClassifyError;
pub use pipeline::{Decision, Pipeline};
