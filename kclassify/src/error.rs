use ndarray::ShapeError;
use thiserror::Error;

use crate::tensor::DataType;

#[derive(Error, Debug)]
pub enum ClassifyError {
    #[error("Malformed payload for tensor '{name}': {reason}")]
    MalformedPayload { name: String, reason: String },

    #[error(
        "Invalid shape for input '{name}': shape {shape:?} holds {expected} elements, payload has {actual}"
    )]
    InvalidShape {
        name: String,
        shape: Vec<usize>,
        expected: usize,
        actual: usize,
    },

    #[error("Output '{name}' not found in response (available: {available:?})")]
    OutputNotFound { name: String, available: Vec<String> },

    #[error("Type mismatch for tensor '{name}': expected {expected}, got {actual}")]
    TypeMismatch {
        name: String,
        expected: DataType,
        actual: DataType,
    },

    #[error(
        "Unsupported class count: model reports {classes} classes but the label table has {labels} entries"
    )]
    UnsupportedClassCount { classes: usize, labels: usize },

    #[error("Unsupported image format: {0}")]
    UnsupportedImageFormat(#[from] image::ImageError),

    #[error("Transport failure: {0}")]
    TransportFailure(String),

    #[error("Task failed: {0}")]
    TaskFailed(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Shape error: {0}")]
    Shape(#[from] ShapeError),
}

impl ClassifyError {
    pub(crate) fn malformed(name: impl Into<String>, reason: impl Into<String>) -> Self {
        ClassifyError::MalformedPayload {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Attributes a payload error raised by the codec to a named tensor.
    pub(crate) fn for_tensor(self, tensor: &str) -> Self {
        match self {
            ClassifyError::MalformedPayload { reason, .. } => ClassifyError::MalformedPayload {
                name: tensor.to_string(),
                reason,
            },
            other => other,
        }
    }

    /// Configuration-level failures abort the whole run; everything else is
    /// attributed to a single input.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ClassifyError::Config(_))
    }
}

impl From<reqwest::Error> for ClassifyError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ClassifyError::TransportFailure(format!("request timed out: {err}"))
        } else {
            ClassifyError::TransportFailure(err.to_string())
        }
    }
}
