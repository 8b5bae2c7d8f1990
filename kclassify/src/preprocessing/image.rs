use clap::ValueEnum;
use image::imageops::FilterType;
use image::{DynamicImage, RgbImage};
use ndarray::{Array3, Array4, Axis};
use serde::{Deserialize, Serialize};

use crate::codec::{self, TensorLayout};
use crate::config::PreprocessConfig;
use crate::error::ClassifyError;

/// Channel order a model was trained with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ChannelOrder {
    Rgb,
    Bgr,
}

impl ChannelOrder {
    /// Source RGB channel feeding each output channel.
    fn source_channels(self) -> [usize; 3] {
        match self {
            ChannelOrder::Rgb => [0, 1, 2],
            ChannelOrder::Bgr => [2, 1, 0],
        }
    }
}

/// Resampling filter used when resizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ResizeFilter {
    Nearest,
    Triangle,
    CatmullRom,
    Gaussian,
    Lanczos3,
}

impl From<ResizeFilter> for FilterType {
    fn from(filter: ResizeFilter) -> Self {
        match filter {
            ResizeFilter::Nearest => FilterType::Nearest,
            ResizeFilter::Triangle => FilterType::Triangle,
            ResizeFilter::CatmullRom => FilterType::CatmullRom,
            ResizeFilter::Gaussian => FilterType::Gaussian,
            ResizeFilter::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

/// Turns encoded images into the float tensor a model expects.
#[derive(Debug, Clone)]
pub struct ImagePreprocessor {
    size: u32,
    filter: ResizeFilter,
    means: [f32; 3],
    scales: [f32; 3],
    channel_order: ChannelOrder,
    layout: TensorLayout,
}

impl ImagePreprocessor {
    pub fn new(config: &PreprocessConfig) -> Result<Self, ClassifyError> {
        config.validate()?;
        Ok(Self {
            size: config.size,
            filter: config.filter,
            means: config.means,
            scales: config.scales,
            channel_order: config.channel_order,
            layout: config.layout,
        })
    }

    pub fn layout(&self) -> TensorLayout {
        self.layout
    }

    /// Shape of the tensor produced by [`process_bytes`](Self::process_bytes).
    pub fn input_shape(&self) -> [usize; 4] {
        let s = self.size as usize;
        match self.layout {
            TensorLayout::Nchw => [1, 3, s, s],
            TensorLayout::Nhwc => [1, s, s, 3],
        }
    }

    /// Decodes a standard raster format (guessing it from the content).
    pub fn decode(bytes: &[u8]) -> Result<DynamicImage, ClassifyError> {
        Ok(image::load_from_memory(bytes)?)
    }

    /// Resamples to `size x size`, dropping any alpha channel.
    pub fn resize(&self, image: &DynamicImage) -> RgbImage {
        image
            .resize_exact(self.size, self.size, self.filter.into())
            .to_rgb8()
    }

    /// Applies `(sample - mean[c]) / scale[c]` per channel and returns a
    /// (Height, Width, Channel) buffer in the configured channel order.
    ///
    /// Means and scales are given in RGB order; they are reordered together
    /// with the pixel channels so every channel keeps its own statistics.
    pub fn normalize(&self, pixels: &RgbImage) -> Result<Array3<f32>, ClassifyError> {
        let (width, height) = pixels.dimensions();
        let order = self.channel_order.source_channels();
        let means = order.map(|c| self.means[c]);
        let scales = order.map(|c| self.scales[c]);

        let mut data = Vec::with_capacity(3 * width as usize * height as usize);
        for pixel in pixels.pixels() {
            for (c, &src) in order.iter().enumerate() {
                data.push((pixel[src] as f32 - means[c]) / scales[c]);
            }
        }

        Ok(Array3::from_shape_vec(
            (height as usize, width as usize, 3),
            data,
        )?)
    }

    /// Reorders an (H, W, C) buffer into the requested layout and adds the
    /// batch dimension.
    pub fn to_layout(pixels: Array3<f32>, layout: TensorLayout) -> Array4<f32> {
        // Standard layout so the raw buffer is row-major
        codec::order_axes(pixels, layout)
            .insert_axis(Axis(0))
            .as_standard_layout()
            .to_owned()
    }

    /// Decode, resize and normalize; the result is still (H, W, C).
    pub fn pixels(&self, bytes: &[u8]) -> Result<Array3<f32>, ClassifyError> {
        let image = Self::decode(bytes)?;
        let resized = self.resize(&image);
        self.normalize(&resized)
    }

    /// Full client-side pipeline: decode, resize, normalize, lay out.
    pub fn process_bytes(&self, bytes: &[u8]) -> Result<Array4<f32>, ClassifyError> {
        Ok(Self::to_layout(self.pixels(bytes)?, self.layout))
    }

    /// Full client-side pipeline ending in the float32 wire payload.
    pub fn encode(&self, bytes: &[u8]) -> Result<Vec<u8>, ClassifyError> {
        let pixels = self.pixels(bytes)?;
        Ok(codec::pack_pixel_buffer(pixels.view(), self.layout))
    }
}
