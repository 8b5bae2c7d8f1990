//! The network side of an inference call.
//!
//! The decision core only sees [`Transport`]; connection handling, TLS and
//! retries belong to the implementation.

pub mod http;
pub mod types;

use async_trait::async_trait;

use crate::error::ClassifyError;
use crate::request::InferenceRequest;
use crate::response::InferenceResponse;

pub use http::HttpTransport;

#[async_trait]
pub trait Transport: Send + Sync {
    /// Performs one inference call. Any failure that is not a payload
    /// problem is reported as [`ClassifyError::TransportFailure`].
    async fn infer(&self, request: InferenceRequest) -> Result<InferenceResponse, ClassifyError>;
}
