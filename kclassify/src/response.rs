//! Inference responses and output decoding.

use crate::codec;
use crate::error::ClassifyError;
use crate::tensor::{DataType, Tensor, TensorContent};

/// Outputs returned by the service, keyed by name. Read-only once received.
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceResponse {
    model_name: String,
    model_version: Option<String>,
    outputs: Vec<Tensor>,
}

impl InferenceResponse {
    pub fn new(
        model_name: impl Into<String>,
        model_version: Option<String>,
        outputs: Vec<Tensor>,
    ) -> Self {
        Self {
            model_name: model_name.into(),
            model_version,
            outputs,
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn model_version(&self) -> Option<&str> {
        self.model_version.as_deref()
    }

    pub fn output_names(&self) -> Vec<String> {
        self.outputs.iter().map(|t| t.name().to_string()).collect()
    }

    pub fn outputs(&self) -> &[Tensor] {
        &self.outputs
    }
}

/// Looks up `output_name` in the response.
pub fn extract_output<'a>(
    response: &'a InferenceResponse,
    output_name: &str,
) -> Result<&'a Tensor, ClassifyError> {
    response
        .outputs
        .iter()
        .find(|t| t.name() == output_name)
        .ok_or_else(|| ClassifyError::OutputNotFound {
            name: output_name.to_string(),
            available: response.output_names(),
        })
}

/// Decodes every element of an FP32 tensor.
pub fn decode_as_f32(tensor: &Tensor) -> Result<Vec<f32>, ClassifyError> {
    decode_elements(tensor, tensor.element_count())
}

/// Decodes a single-batch class vector: shape `[C]` or `[1, .., 1, C]`.
pub fn class_scores(tensor: &Tensor) -> Result<Vec<f32>, ClassifyError> {
    let shape = tensor.shape();
    let Some((&classes, leading)) = shape.split_last() else {
        return Err(ClassifyError::malformed(
            tensor.name(),
            "scalar output cannot hold class scores",
        ));
    };
    if leading.iter().any(|&d| d != 1) {
        return Err(ClassifyError::malformed(
            tensor.name(),
            format!("expected a single-batch class vector, got shape {shape:?}"),
        ));
    }
    decode_elements(tensor, classes)
}

fn decode_elements(tensor: &Tensor, count: usize) -> Result<Vec<f32>, ClassifyError> {
    match (tensor.datatype(), tensor.content()) {
        (DataType::Fp32, TensorContent::Numeric(bytes)) => {
            codec::decode_f32_le(bytes, count).map_err(|e| e.for_tensor(tensor.name()))
        }
        (DataType::Fp32, TensorContent::Blobs(_)) => Err(ClassifyError::malformed(
            tensor.name(),
            "FP32 tensor carries byte-string content",
        )),
        (actual, _) => Err(ClassifyError::TypeMismatch {
            name: tensor.name().to_string(),
            expected: DataType::Fp32,
            actual: actual.clone(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response_with(outputs: Vec<Tensor>) -> InferenceResponse {
        InferenceResponse::new("resnet", Some("1".to_string()), outputs)
    }

    #[test]
    fn test_extract_output_by_name() {
        let prob = Tensor::fp32("prob", vec![1, 3], &[0.1, 0.2, 0.7]).unwrap();
        let response = response_with(vec![prob.clone()]);
        assert_eq!(extract_output(&response, "prob").unwrap(), &prob);
        assert_eq!(response.model_version(), Some("1"));
    }

    #[test]
    fn test_missing_output_is_output_not_found() {
        let prob = Tensor::fp32("prob", vec![1, 3], &[0.1, 0.2, 0.7]).unwrap();
        let response = response_with(vec![prob]);
        match extract_output(&response, "1463") {
            Err(ClassifyError::OutputNotFound { name, available }) => {
                assert_eq!(name, "1463");
                assert_eq!(available, vec!["prob".to_string()]);
            }
            other => panic!("Expected OutputNotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_as_f32() {
        let tensor = Tensor::fp32("prob", vec![2, 2], &[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(decode_as_f32(&tensor).unwrap(), vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_decode_bytes_tensor_is_type_mismatch() {
        let tensor = Tensor::bytes("label", vec![b"cat".to_vec()]);
        match decode_as_f32(&tensor) {
            Err(ClassifyError::TypeMismatch {
                name,
                expected,
                actual,
            }) => {
                assert_eq!(name, "label");
                assert_eq!(expected, DataType::Fp32);
                assert_eq!(actual, DataType::Bytes);
            }
            other => panic!("Expected TypeMismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_class_scores_accepts_batch_of_one() {
        let tensor = Tensor::fp32("prob", vec![1, 4], &[0.0, 1.0, 2.0, 3.0]).unwrap();
        assert_eq!(class_scores(&tensor).unwrap().len(), 4);

        let flat = Tensor::fp32("prob", vec![4], &[0.0, 1.0, 2.0, 3.0]).unwrap();
        assert_eq!(class_scores(&flat).unwrap().len(), 4);
    }

    #[test]
    fn test_class_scores_rejects_larger_batch() {
        let tensor = Tensor::fp32("prob", vec![2, 2], &[0.0; 4]).unwrap();
        assert!(matches!(
            class_scores(&tensor),
            Err(ClassifyError::MalformedPayload { .. })
        ));
    }
}
