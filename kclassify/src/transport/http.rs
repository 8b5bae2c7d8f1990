use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Url;
use tracing::debug;

use crate::error::ClassifyError;
use crate::request::InferenceRequest;
use crate::response::InferenceResponse;
use crate::transport::types::{self, ErrorBody, INFERENCE_HEADER_CONTENT_LENGTH};
use crate::transport::Transport;

/// KServe v2 REST client sharing one connection pool across calls.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    base_url: String,
    base: Url,
    client: reqwest::Client,
}

impl HttpTransport {
    /// `timeout` bounds every single request made through this transport.
    pub fn new(address: &str, timeout: Duration) -> Result<Self, ClassifyError> {
        let base = Url::parse(address).map_err(|e| {
            ClassifyError::Config(format!("invalid service address '{address}': {e}"))
        })?;
        if base.cannot_be_a_base() {
            return Err(ClassifyError::Config(format!(
                "service address '{address}' cannot carry a path"
            )));
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClassifyError::Config(format!("cannot create HTTP client: {e}")))?;

        Ok(Self {
            base_url: address.trim_end_matches('/').to_string(),
            base,
            client,
        })
    }

    pub fn url(&self) -> &str {
        &self.base_url
    }

    /// Appends path segments to the base address, escaping each one.
    fn endpoint<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    pub fn infer_url(&self, request: &InferenceRequest) -> Url {
        let name = request.model_name();
        match request.model_version() {
            Some(version) => {
                let version = version.to_string();
                self.endpoint(["v2", "models", name, "versions", version.as_str(), "infer"])
            }
            None => self.endpoint(["v2", "models", name, "infer"]),
        }
    }

    /// Server liveness check.
    pub async fn is_live(&self) -> bool {
        let url = self.endpoint(["v2", "health", "live"]);
        match self.client.get(url.clone()).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!("Liveness check to {} failed: {}", url, e);
                false
            }
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn infer(&self, request: InferenceRequest) -> Result<InferenceResponse, ClassifyError> {
        let url = self.infer_url(&request);
        let (body, header_len) = types::encode_request(&request)?;
        debug!(
            "POST {} ({} bytes, header {} bytes)",
            url,
            body.len(),
            header_len
        );

        let response = self
            .client
            .post(url.clone())
            .header(CONTENT_TYPE, "application/octet-stream")
            .header(INFERENCE_HEADER_CONTENT_LENGTH, header_len)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let header_len = response
            .headers()
            .get(INFERENCE_HEADER_CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<usize>().ok());
        let bytes = response.bytes().await?;

        if !status.is_success() {
            let message = serde_json::from_slice::<ErrorBody>(&bytes)
                .map(|b| b.error)
                .unwrap_or_else(|_| String::from_utf8_lossy(&bytes).into_owned());
            return Err(ClassifyError::TransportFailure(format!(
                "HTTP {status}: {message}"
            )));
        }

        types::decode_response(&bytes, header_len)
    }
}
