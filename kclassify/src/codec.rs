//! Conversions between raw byte buffers and typed numeric sequences.
//!
//! All numeric payloads exchanged with the inference service are float32
//! little-endian, row-major.

use clap::ValueEnum;
use ndarray::{ArrayBase, ArrayView3, Ix3, RawData};
use serde::{Deserialize, Serialize};

use crate::error::ClassifyError;

/// Byte width of a single float32 element.
pub const F32_WIDTH: usize = std::mem::size_of::<f32>();

/// Memory layout of an image tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TensorLayout {
    /// Batch, Channel, Height, Width (channel-first)
    Nchw,
    /// Batch, Height, Width, Channel (channel-last)
    Nhwc,
}

/// Interprets `bytes` as `count` consecutive little-endian float32 values.
///
/// Trailing bytes beyond `count * 4` are ignored.
pub fn decode_f32_le(bytes: &[u8], count: usize) -> Result<Vec<f32>, ClassifyError> {
    let needed = count
        .checked_mul(F32_WIDTH)
        .ok_or_else(|| {
            ClassifyError::malformed("payload", format!("element count {count} overflows"))
        })?;
    if bytes.len() < needed {
        return Err(ClassifyError::malformed(
            "payload",
            format!(
                "expected {needed} bytes for {count} float32 values, got {}",
                bytes.len()
            ),
        ));
    }

    Ok(bytes[..needed]
        .chunks_exact(F32_WIDTH)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

/// Inverse of [`decode_f32_le`].
pub fn encode_f32_le(values: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len() * F32_WIDTH);
    for value in values {
        out.extend_from_slice(&value.to_le_bytes());
    }
    out
}

/// Reorders the axes of a (Height, Width, Channel) buffer for `layout`:
/// (C, H, W) for channel-first, unchanged for channel-last. Only strides
/// change; no data is moved.
pub fn order_axes<S: RawData>(
    pixels: ArrayBase<S, Ix3>,
    layout: TensorLayout,
) -> ArrayBase<S, Ix3> {
    match layout {
        TensorLayout::Nhwc => pixels,
        TensorLayout::Nchw => pixels.permuted_axes([2, 0, 1]),
    }
}

/// Serializes a (Height, Width, Channel) pixel buffer into a contiguous
/// float32 payload ordered according to `layout`.
pub fn pack_pixel_buffer(pixels: ArrayView3<'_, f32>, layout: TensorLayout) -> Vec<u8> {
    let ordered = order_axes(pixels, layout);

    let mut out = Vec::with_capacity(ordered.len() * F32_WIDTH);
    // Logical iteration order is row-major regardless of the view's strides.
    for value in ordered.iter() {
        out.extend_from_slice(&value.to_le_bytes());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    #[test]
    fn test_round_trip_is_bit_exact() {
        let values = vec![
            0.0,
            -0.0,
            1.5,
            -3.25,
            f32::MIN_POSITIVE,
            f32::MAX,
            f32::MIN,
            1.0e-45,
            std::f32::consts::PI,
        ];
        let bytes = encode_f32_le(&values);
        assert_eq!(bytes.len(), values.len() * 4);

        let decoded = decode_f32_le(&bytes, values.len()).unwrap();
        for (a, b) in values.iter().zip(decoded.iter()) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }

    #[test]
    fn test_decode_is_little_endian() {
        // 1.0f32 == 0x3F800000
        let bytes = [0x00, 0x00, 0x80, 0x3F];
        assert_eq!(decode_f32_le(&bytes, 1).unwrap(), vec![1.0]);
    }

    #[test]
    fn test_decode_short_buffer_fails() {
        let bytes = encode_f32_le(&[1.0, 2.0]);
        let result = decode_f32_le(&bytes[..7], 2);
        match result {
            Err(ClassifyError::MalformedPayload { reason, .. }) => {
                assert!(reason.contains("expected 8 bytes"));
            }
            other => panic!("Expected MalformedPayload, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_ignores_trailing_bytes() {
        let mut bytes = encode_f32_le(&[4.0]);
        bytes.extend_from_slice(&[0xFF, 0xFF]);
        assert_eq!(decode_f32_le(&bytes, 1).unwrap(), vec![4.0]);
    }

    #[test]
    fn test_pack_pixel_buffer_layouts() {
        // 1x2 image, 3 channels: pixel0 = (1,2,3), pixel1 = (4,5,6)
        let hwc = Array3::from_shape_vec((1, 2, 3), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();

        let nhwc = decode_f32_le(&pack_pixel_buffer(hwc.view(), TensorLayout::Nhwc), 6).unwrap();
        assert_eq!(nhwc, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);

        let nchw = decode_f32_le(&pack_pixel_buffer(hwc.view(), TensorLayout::Nchw), 6).unwrap();
        assert_eq!(nchw, vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
    }
}
