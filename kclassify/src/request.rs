//! Outbound inference requests.

use clap::ValueEnum;
use ndarray::Array4;
use serde::{Deserialize, Serialize};

use crate::codec::F32_WIDTH;
use crate::error::ClassifyError;
use crate::preprocessing::ImagePreprocessor;
use crate::tensor::{element_count, DataType, Tensor, TensorContent};

/// Content of one named input before it becomes a [`Tensor`].
#[derive(Debug, Clone, PartialEq)]
pub enum TensorPayload {
    /// Opaque blobs, one per batch element, sent as a BYTES input
    Raw(Vec<Vec<u8>>),
    /// Row-major float32 values with their declared shape, sent as FP32
    Numeric { shape: Vec<usize>, data: Vec<f32> },
    /// Float32 values already packed little-endian in the order of `shape`
    Packed { shape: Vec<usize>, bytes: Vec<u8> },
}

impl TensorPayload {
    /// A single encoded file passed through untouched.
    pub fn raw(blob: Vec<u8>) -> Self {
        TensorPayload::Raw(vec![blob])
    }

    pub fn from_array(array: Array4<f32>) -> Self {
        let shape = array.shape().to_vec();
        let data = array.as_standard_layout().iter().copied().collect();
        TensorPayload::Numeric { shape, data }
    }

    fn into_tensor(self, name: String) -> Result<Tensor, ClassifyError> {
        match self {
            TensorPayload::Raw(blobs) => Ok(Tensor::bytes(name, blobs)),
            TensorPayload::Numeric { shape, data } => Tensor::fp32(name, shape, &data),
            TensorPayload::Packed { shape, bytes } => {
                let expected = element_count(&shape);
                let actual = bytes.len() / F32_WIDTH;
                if expected != Some(actual) || bytes.len() % F32_WIDTH != 0 {
                    return Err(ClassifyError::InvalidShape {
                        name,
                        shape,
                        expected: expected.unwrap_or(usize::MAX),
                        actual,
                    });
                }
                Tensor::from_parts(name, DataType::Fp32, shape, TensorContent::Numeric(bytes))
            }
        }
    }
}

/// How an image file is turned into a request input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum InputMode {
    /// Send the encoded file bytes; the service decodes and resizes
    Binary,
    /// Decode, resize and normalize locally; send an FP32 tensor
    Preprocessed,
}

impl InputMode {
    pub fn payload(
        self,
        file_bytes: Vec<u8>,
        preprocessor: &ImagePreprocessor,
    ) -> Result<TensorPayload, ClassifyError> {
        match self {
            InputMode::Binary => Ok(TensorPayload::raw(file_bytes)),
            InputMode::Preprocessed => Ok(TensorPayload::Packed {
                shape: preprocessor.input_shape().to_vec(),
                bytes: preprocessor.encode(&file_bytes)?,
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InferenceRequest {
    model_name: String,
    model_version: Option<u64>,
    inputs: Vec<Tensor>,
    outputs: Vec<String>,
}

impl InferenceRequest {
    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// `None` targets the latest version.
    pub fn model_version(&self) -> Option<u64> {
        self.model_version
    }

    pub fn inputs(&self) -> &[Tensor] {
        &self.inputs
    }

    /// Outputs explicitly requested; empty means all.
    pub fn outputs(&self) -> &[String] {
        &self.outputs
    }
}

/// Assembles an [`InferenceRequest`] without touching the network.
#[derive(Debug, Clone, Default)]
pub struct RequestBuilder {
    model_name: String,
    model_version: Option<u64>,
    inputs: Vec<(String, TensorPayload)>,
    outputs: Vec<String>,
}

impl RequestBuilder {
    pub fn new(model_name: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            ..Self::default()
        }
    }

    pub fn version(mut self, version: Option<u64>) -> Self {
        self.model_version = version;
        self
    }

    pub fn input(mut self, name: impl Into<String>, payload: TensorPayload) -> Self {
        self.inputs.push((name.into(), payload));
        self
    }

    pub fn output(mut self, name: impl Into<String>) -> Self {
        self.outputs.push(name.into());
        self
    }

    pub fn build(self) -> Result<InferenceRequest, ClassifyError> {
        if self.model_name.is_empty() {
            return Err(ClassifyError::Config("model name must not be empty".to_string()));
        }

        let inputs = self
            .inputs
            .into_iter()
            .map(|(name, payload)| payload.into_tensor(name))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(InferenceRequest {
            model_name: self.model_name,
            // version 0 is the wire convention for "latest"
            model_version: self.model_version.filter(|&v| v != 0),
            inputs,
            outputs: self.outputs,
        })
    }
}

/// Builds a request for `model_name` from named payloads.
pub fn build(
    model_name: &str,
    model_version: Option<u64>,
    inputs: impl IntoIterator<Item = (String, TensorPayload)>,
) -> Result<InferenceRequest, ClassifyError> {
    inputs
        .into_iter()
        .fold(
            RequestBuilder::new(model_name).version(model_version),
            |builder, (name, payload)| builder.input(name, payload),
        )
        .build()
}
