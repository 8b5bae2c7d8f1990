//! One image in, one classification decision out.
//!
//! Preprocessing, request construction, the transport call and the decision
//! are stateless per call; the only shared state is the read-only label table
//! inside the classifier and the transport's connection pool.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::debug;

use crate::classification::{ClassificationResult, Classifier, LabelTable};
use crate::config::{AppConfig, ModelConfig};
use crate::error::ClassifyError;
use crate::observability;
use crate::preprocessing::ImagePreprocessor;
use crate::request::{InferenceRequest, RequestBuilder};
use crate::response::{self, InferenceResponse};
use crate::transport::Transport;

/// Outcome of classifying one input.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decision {
    /// Best first; holds at least one entry
    pub ranked: Vec<ClassificationResult>,
    /// Set when an expected label index was supplied
    pub matched: Option<bool>,
}

impl Decision {
    pub fn best(&self) -> &ClassificationResult {
        &self.ranked[0]
    }
}

pub struct Pipeline {
    model: ModelConfig,
    preprocessor: ImagePreprocessor,
    classifier: Classifier,
    transport: Arc<dyn Transport>,
    timeout: Duration,
}

impl Pipeline {
    pub fn new(
        config: &AppConfig,
        labels: Arc<LabelTable>,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, ClassifyError> {
        Ok(Self {
            model: config.model.clone(),
            preprocessor: ImagePreprocessor::new(&config.preprocessing)?,
            classifier: Classifier::new(labels).with_top_k(config.model.top_k),
            transport,
            timeout: config.request_timeout(),
        })
    }

    pub fn labels(&self) -> &LabelTable {
        self.classifier.labels()
    }

    /// Builds the request for an encoded image according to the input mode.
    pub fn build_request(&self, file_bytes: Vec<u8>) -> Result<InferenceRequest, ClassifyError> {
        let payload = self
            .model
            .input_mode
            .payload(file_bytes, &self.preprocessor)?;

        RequestBuilder::new(&self.model.name)
            .version(self.model.version)
            .input(&self.model.input_name, payload)
            .output(&self.model.output_name)
            .build()
    }

    /// Sends one request with its own deadline. Expiry cancels only this call.
    pub async fn invoke(
        &self,
        request: InferenceRequest,
    ) -> Result<InferenceResponse, ClassifyError> {
        let start = Instant::now();
        let result = match tokio::time::timeout(self.timeout, self.transport.infer(request)).await
        {
            Ok(result) => result,
            Err(_) => Err(ClassifyError::TransportFailure(format!(
                "request timed out after {} ms",
                self.timeout.as_millis()
            ))),
        };
        let elapsed = start.elapsed();
        observability::record_request(&self.model.name, elapsed, result.is_ok());
        debug!(
            "Inference call to {} took {:.2} ms",
            self.model.name,
            elapsed.as_secs_f64() * 1000.0
        );
        result
    }

    /// Interprets a response as a classification.
    pub fn decide(
        &self,
        response: &InferenceResponse,
        expected: Option<usize>,
    ) -> Result<Decision, ClassifyError> {
        let output = response::extract_output(response, &self.model.output_name)?;
        let scores = response::class_scores(output)?;

        let ranked = self.classifier.rank(&scores)?;
        let matched = expected.map(|e| ranked[0].matches(e));
        Ok(Decision { ranked, matched })
    }

    pub async fn classify_bytes(
        &self,
        file_bytes: Vec<u8>,
        expected: Option<usize>,
    ) -> Result<Decision, ClassifyError> {
        let request = self.build_request(file_bytes)?;
        let response = self.invoke(request).await?;
        self.decide(&response, expected)
    }

    pub async fn classify_file(
        &self,
        path: &Path,
        expected: Option<usize>,
    ) -> Result<Decision, ClassifyError> {
        let bytes = tokio::fs::read(path).await?;
        self.classify_bytes(bytes, expected).await
    }
}
