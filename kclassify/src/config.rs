use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::codec::TensorLayout;
use crate::error::ClassifyError;
use crate::preprocessing::image::{ChannelOrder, ResizeFilter};
use crate::request::InputMode;

// ImageNet statistics on the 0..255 sample range, RGB order
pub const IMAGENET_MEANS: [f32; 3] = [123.675, 116.28, 103.53];
pub const IMAGENET_SCALES: [f32; 3] = [58.395, 57.12, 57.375];

#[derive(Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceConfig,
    pub model: ModelConfig,
    pub preprocessing: PreprocessConfig,
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct ServiceConfig {
    /// Base URL of the inference service, e.g. `http://localhost:8000`
    pub address: String,
    /// Deadline applied to every single inference call
    pub timeout_ms: u64,
    /// Maximum number of calls in flight during a batch run
    pub concurrency: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            address: "http://localhost:8000".to_string(),
            timeout_ms: 10_000,
            concurrency: 4,
        }
    }
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct ModelConfig {
    pub name: String,
    /// Absent or zero selects the latest version
    pub version: Option<u64>,
    pub input_name: String,
    pub output_name: String,
    pub input_mode: InputMode,
    pub top_k: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: "resnet".to_string(),
            version: None,
            input_name: "0".to_string(),
            output_name: "1463".to_string(),
            input_mode: InputMode::Binary,
            top_k: 1,
        }
    }
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Square edge length the image is resized to
    pub size: u32,
    pub filter: ResizeFilter,
    /// Per-channel means, always listed in RGB order
    pub means: [f32; 3],
    /// Per-channel scales, always listed in RGB order
    pub scales: [f32; 3],
    /// Channel order the model was trained with
    pub channel_order: ChannelOrder,
    pub layout: TensorLayout,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            size: 224,
            filter: ResizeFilter::Triangle,
            means: IMAGENET_MEANS,
            scales: IMAGENET_SCALES,
            channel_order: ChannelOrder::Rgb,
            layout: TensorLayout::Nchw,
        }
    }
}

impl AppConfig {
    /// Reads a YAML configuration file. Missing sections and fields fall back
    /// to their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ClassifyError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ClassifyError::Config(format!("cannot read config {}: {e}", path.display()))
        })?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, ClassifyError> {
        serde_yaml::from_str(content)
            .map_err(|e| ClassifyError::Config(format!("invalid config: {e}")))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.service.timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ClassifyError> {
        let address = reqwest::Url::parse(&self.service.address).map_err(|e| {
            ClassifyError::Config(format!(
                "malformed service address '{}': {e}",
                self.service.address
            ))
        })?;
        if !matches!(address.scheme(), "http" | "https") || address.host_str().is_none() {
            return Err(ClassifyError::Config(format!(
                "service address '{}' must be an http(s) URL with a host",
                self.service.address
            )));
        }
        if self.service.timeout_ms == 0 {
            return Err(ClassifyError::Config(
                "timeout_ms must be greater than 0".to_string(),
            ));
        }
        if self.service.concurrency == 0 {
            return Err(ClassifyError::Config(
                "concurrency must be greater than 0".to_string(),
            ));
        }
        if self.model.name.is_empty() {
            return Err(ClassifyError::Config("model name must not be empty".to_string()));
        }
        if self.model.input_name.is_empty() || self.model.output_name.is_empty() {
            return Err(ClassifyError::Config(
                "input and output names must not be empty".to_string(),
            ));
        }
        if self.model.top_k == 0 {
            return Err(ClassifyError::Config("top_k must be at least 1".to_string()));
        }
        self.preprocessing.validate()
    }
}

impl PreprocessConfig {
    pub fn validate(&self) -> Result<(), ClassifyError> {
        if self.size == 0 {
            return Err(ClassifyError::Config(
                "preprocessing size must be greater than 0".to_string(),
            ));
        }
        for (i, &s) in self.scales.iter().enumerate() {
            if !s.is_finite() || s <= 0.0 {
                return Err(ClassifyError::Config(format!(
                    "scale at index {i} must be a positive finite number, got {s}"
                )));
            }
        }
        for (i, &m) in self.means.iter().enumerate() {
            if !m.is_finite() {
                return Err(ClassifyError::Config(format!(
                    "mean at index {i} is not finite: {m}"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.preprocessing.means, IMAGENET_MEANS);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = r#"
model:
  name: googlenet
  version: 2
  input_mode: preprocessed
preprocessing:
  channel_order: bgr
  layout: nhwc
"#;
        let config = AppConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.model.name, "googlenet");
        assert_eq!(config.model.version, Some(2));
        assert_eq!(config.model.input_mode, InputMode::Preprocessed);
        assert_eq!(config.model.output_name, "1463");
        assert_eq!(config.preprocessing.channel_order, ChannelOrder::Bgr);
        assert_eq!(config.preprocessing.layout, TensorLayout::Nhwc);
        assert_eq!(config.preprocessing.size, 224);
        assert_eq!(config.service, ServiceConfig::default());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "service:\n  address: http://10.0.0.5:9001\n  concurrency: 8").unwrap();

        let config = AppConfig::load(file.path()).unwrap();
        assert_eq!(config.service.address, "http://10.0.0.5:9001");
        assert_eq!(config.service.concurrency, 8);
        assert_eq!(config.service.timeout_ms, 10_000);
    }

    #[test]
    fn test_load_missing_file_is_config_error() {
        let result = AppConfig::load("does/not/exist.yaml");
        assert!(matches!(result, Err(ClassifyError::Config(_))));
    }

    #[test]
    fn test_malformed_address_is_rejected() {
        let mut config = AppConfig::default();
        config.service.address = "localhost:9000".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.is_fatal());

        config.service.address = "ftp://localhost:9000".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_non_positive_scale_is_rejected() {
        let mut config = AppConfig::default();
        config.preprocessing.scales = [58.0, 0.0, 57.0];
        assert!(matches!(config.validate(), Err(ClassifyError::Config(_))));
    }

    #[test]
    fn test_zero_concurrency_is_rejected() {
        let mut config = AppConfig::default();
        config.service.concurrency = 0;
        assert!(config.validate().is_err());
    }
}
