//! KServe v2 REST wire format with the binary data extension.
//!
//! A request body is a JSON header immediately followed by the binary
//! section; the header length travels in `Inference-Header-Content-Length`.
//! BYTES elements in the binary section are prefixed with their length as a
//! 4-byte little-endian integer.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::codec;
use crate::error::ClassifyError;
use crate::request::InferenceRequest;
use crate::response::InferenceResponse;
use crate::tensor::{DataType, Tensor, TensorContent};

pub const INFERENCE_HEADER_CONTENT_LENGTH: &str = "Inference-Header-Content-Length";

const BYTES_LENGTH_PREFIX: usize = 4;

#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
pub struct TensorParameters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binary_data_size: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binary_data: Option<bool>,
}

// --- Request ---

#[derive(Serialize, Debug)]
pub struct InferRequestBody<'a> {
    pub inputs: Vec<InferInputTensor<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<RequestedOutput<'a>>,
}

#[derive(Serialize, Debug)]
pub struct InferInputTensor<'a> {
    pub name: &'a str,
    pub shape: &'a [usize],
    pub datatype: &'a str,
    pub parameters: TensorParameters,
}

#[derive(Serialize, Debug)]
pub struct RequestedOutput<'a> {
    pub name: &'a str,
    pub parameters: TensorParameters,
}

// --- Response ---

#[derive(Deserialize, Debug)]
pub struct InferResponseBody {
    pub model_name: String,
    #[serde(default)]
    pub model_version: Option<String>,
    pub outputs: Vec<InferOutputTensor>,
}

#[derive(Deserialize, Debug)]
pub struct InferOutputTensor {
    pub name: String,
    pub shape: Vec<i64>,
    pub datatype: String,
    #[serde(default)]
    pub parameters: Option<TensorParameters>,
    #[serde(default)]
    pub data: Option<Value>,
}

#[derive(Deserialize, Debug)]
pub struct ErrorBody {
    pub error: String,
}

/// Serializes a request into `(body, json_header_length)`. Every input goes
/// into the binary section; every requested output asks for binary data.
pub fn encode_request(request: &InferenceRequest) -> Result<(Vec<u8>, usize), ClassifyError> {
    let mut binary = Vec::new();
    let mut inputs = Vec::with_capacity(request.inputs().len());

    for tensor in request.inputs() {
        let start = binary.len();
        match tensor.content() {
            TensorContent::Numeric(bytes) => binary.extend_from_slice(bytes),
            TensorContent::Blobs(blobs) => {
                for blob in blobs {
                    let len = u32::try_from(blob.len()).map_err(|_| {
                        ClassifyError::malformed(tensor.name(), "blob exceeds 4 GiB")
                    })?;
                    binary.extend_from_slice(&len.to_le_bytes());
                    binary.extend_from_slice(blob);
                }
            }
        }
        inputs.push(InferInputTensor {
            name: tensor.name(),
            shape: tensor.shape(),
            datatype: tensor.datatype().as_wire(),
            parameters: TensorParameters {
                binary_data_size: Some(binary.len() - start),
                binary_data: None,
            },
        });
    }

    let outputs = request
        .outputs()
        .iter()
        .map(|name| RequestedOutput {
            name,
            parameters: TensorParameters {
                binary_data_size: None,
                binary_data: Some(true),
            },
        })
        .collect();

    let header = serde_json::to_vec(&InferRequestBody { inputs, outputs })
        .map_err(|e| ClassifyError::malformed("request", e.to_string()))?;
    let header_len = header.len();

    let mut body = header;
    body.extend_from_slice(&binary);
    Ok((body, header_len))
}

/// Parses a response body. Without `header_len` the whole body is JSON.
pub fn decode_response(
    body: &[u8],
    header_len: Option<usize>,
) -> Result<InferenceResponse, ClassifyError> {
    let header_len = header_len.unwrap_or(body.len());
    if header_len > body.len() {
        return Err(ClassifyError::malformed(
            "response",
            format!(
                "header length {header_len} exceeds body length {}",
                body.len()
            ),
        ));
    }
    let (header, mut binary) = body.split_at(header_len);

    let parsed: InferResponseBody = serde_json::from_slice(header)
        .map_err(|e| ClassifyError::malformed("response", format!("invalid JSON header: {e}")))?;

    let mut outputs = Vec::with_capacity(parsed.outputs.len());
    for output in parsed.outputs {
        let shape = output
            .shape
            .iter()
            .map(|&d| usize::try_from(d))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| {
                ClassifyError::malformed(
                    &output.name,
                    format!("negative dimension in shape {:?}", output.shape),
                )
            })?;
        let datatype = DataType::from_wire(&output.datatype);

        let binary_size = output.parameters.as_ref().and_then(|p| p.binary_data_size);
        let content = match binary_size {
            Some(size) => {
                if size > binary.len() {
                    return Err(ClassifyError::malformed(
                        &output.name,
                        format!(
                            "declares {size} binary bytes, only {} remain",
                            binary.len()
                        ),
                    ));
                }
                let (chunk, rest) = binary.split_at(size);
                binary = rest;
                binary_content(&output.name, &datatype, chunk)?
            }
            None => json_content(&output.name, &datatype, output.data.as_ref())?,
        };

        outputs.push(Tensor::from_parts(output.name, datatype, shape, content)?);
    }

    Ok(InferenceResponse::new(
        parsed.model_name,
        parsed.model_version,
        outputs,
    ))
}

fn binary_content(
    name: &str,
    datatype: &DataType,
    chunk: &[u8],
) -> Result<TensorContent, ClassifyError> {
    if *datatype != DataType::Bytes {
        return Ok(TensorContent::Numeric(chunk.to_vec()));
    }

    let mut blobs = Vec::new();
    let mut rest = chunk;
    while !rest.is_empty() {
        if rest.len() < BYTES_LENGTH_PREFIX {
            return Err(ClassifyError::malformed(name, "truncated BYTES length prefix"));
        }
        let (prefix, tail) = rest.split_at(BYTES_LENGTH_PREFIX);
        let len = u32::from_le_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]) as usize;
        if len > tail.len() {
            return Err(ClassifyError::malformed(
                name,
                format!("BYTES element of {len} bytes, only {} remain", tail.len()),
            ));
        }
        let (blob, tail) = tail.split_at(len);
        blobs.push(blob.to_vec());
        rest = tail;
    }
    Ok(TensorContent::Blobs(blobs))
}

fn json_content(
    name: &str,
    datatype: &DataType,
    data: Option<&Value>,
) -> Result<TensorContent, ClassifyError> {
    let mut flat = Vec::new();
    if let Some(data) = data {
        flatten(data, &mut flat);
    }

    match datatype {
        DataType::Fp32 => {
            let values = flat
                .iter()
                .map(|v| {
                    v.as_f64().map(|f| f as f32).ok_or_else(|| {
                        ClassifyError::malformed(name, format!("non-numeric FP32 element {v}"))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(TensorContent::Numeric(codec::encode_f32_le(&values)))
        }
        DataType::Bytes => {
            let blobs = flat
                .iter()
                .map(|v| {
                    v.as_str().map(|s| s.as_bytes().to_vec()).ok_or_else(|| {
                        ClassifyError::malformed(name, format!("non-string BYTES element {v}"))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(TensorContent::Blobs(blobs))
        }
        // Element width unknown; the tensor can be looked up but not decoded
        DataType::Other(_) => Ok(TensorContent::Numeric(Vec::new())),
    }
}

/// Row-major flattening of possibly nested JSON arrays.
fn flatten<'a>(value: &'a Value, out: &mut Vec<&'a Value>) {
    match value {
        Value::Array(items) => items.iter().for_each(|item| flatten(item, out)),
        other => out.push(other),
    }
}
