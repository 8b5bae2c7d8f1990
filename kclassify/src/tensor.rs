//! Named, typed, shaped tensors as exchanged with the inference service.

use std::fmt;

use crate::codec::{self, F32_WIDTH};
use crate::error::ClassifyError;

/// Wire-level tensor element type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DataType {
    /// 32-bit IEEE-754 float, little-endian
    Fp32,
    /// Opaque variable-length byte strings, one per batch element
    Bytes,
    /// Any other datatype reported by the service; carried through untouched
    Other(String),
}

impl DataType {
    pub fn from_wire(name: &str) -> Self {
        match name {
            "FP32" => DataType::Fp32,
            "BYTES" => DataType::Bytes,
            other => DataType::Other(other.to_string()),
        }
    }

    pub fn as_wire(&self) -> &str {
        match self {
            DataType::Fp32 => "FP32",
            DataType::Bytes => "BYTES",
            DataType::Other(name) => name,
        }
    }

    /// Fixed element width in bytes, if the type has one we know.
    pub fn byte_width(&self) -> Option<usize> {
        match self {
            DataType::Fp32 => Some(F32_WIDTH),
            DataType::Bytes | DataType::Other(_) => None,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

/// Content buffer of a tensor.
#[derive(Debug, Clone, PartialEq)]
pub enum TensorContent {
    /// Flat row-major element bytes
    Numeric(Vec<u8>),
    /// One blob per batch element
    Blobs(Vec<Vec<u8>>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    name: String,
    datatype: DataType,
    shape: Vec<usize>,
    content: TensorContent,
}

impl Tensor {
    /// Builds an FP32 tensor, checking the element count against the shape.
    pub fn fp32(
        name: impl Into<String>,
        shape: Vec<usize>,
        values: &[f32],
    ) -> Result<Self, ClassifyError> {
        let name = name.into();
        let Some(expected) = element_count(&shape) else {
            return Err(overflowing_shape(name, &shape));
        };
        if expected != values.len() {
            return Err(ClassifyError::InvalidShape {
                name,
                shape,
                expected,
                actual: values.len(),
            });
        }

        Ok(Self {
            name,
            datatype: DataType::Fp32,
            shape,
            content: TensorContent::Numeric(codec::encode_f32_le(values)),
        })
    }

    /// Builds a BYTES tensor whose shape is the batch count.
    pub fn bytes(name: impl Into<String>, blobs: Vec<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            datatype: DataType::Bytes,
            shape: vec![blobs.len()],
            content: TensorContent::Blobs(blobs),
        }
    }

    /// Assembles a tensor received from the wire and validates the content
    /// length against the declared shape.
    pub fn from_parts(
        name: impl Into<String>,
        datatype: DataType,
        shape: Vec<usize>,
        content: TensorContent,
    ) -> Result<Self, ClassifyError> {
        let name = name.into();
        let Some(count) = element_count(&shape) else {
            return Err(overflowing_shape(name, &shape));
        };
        match (&datatype, &content) {
            (DataType::Bytes, TensorContent::Blobs(blobs)) => {
                let batch = shape.first().copied().unwrap_or(0);
                if blobs.len() != batch {
                    return Err(ClassifyError::malformed(
                        name,
                        format!(
                            "shape {shape:?} declares {batch} elements, got {} blobs",
                            blobs.len()
                        ),
                    ));
                }
            }
            (DataType::Bytes, TensorContent::Numeric(_)) => {
                return Err(ClassifyError::malformed(
                    name,
                    "BYTES tensor must carry one blob per batch element",
                ));
            }
            (_, TensorContent::Blobs(_)) => {
                return Err(ClassifyError::malformed(
                    name,
                    format!("{datatype} tensor cannot carry byte-string content"),
                ));
            }
            (_, TensorContent::Numeric(bytes)) => {
                if let Some(width) = datatype.byte_width() {
                    let Some(expected) = count.checked_mul(width) else {
                        return Err(overflowing_shape(name, &shape));
                    };
                    if bytes.len() != expected {
                        return Err(ClassifyError::malformed(
                            name,
                            format!(
                                "shape {shape:?} of {datatype} requires {expected} bytes, got {}",
                                bytes.len()
                            ),
                        ));
                    }
                }
            }
        }

        Ok(Self {
            name,
            datatype,
            shape,
            content,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn datatype(&self) -> &DataType {
        &self.datatype
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn content(&self) -> &TensorContent {
        &self.content
    }

    pub fn element_count(&self) -> usize {
        // Constructors reject shapes whose product overflows
        element_count(&self.shape).unwrap_or(0)
    }
}

/// Product of the dimensions, `None` on overflow. The empty shape is a
/// scalar.
pub fn element_count(shape: &[usize]) -> Option<usize> {
    shape.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d))
}

fn overflowing_shape(name: String, shape: &[usize]) -> ClassifyError {
    ClassifyError::malformed(name, format!("shape {shape:?} overflows the element count"))
}
