use crate::error::{Result, SearchError};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Number of coarse candidates re-ranked by appearance.
pub const DEFAULT_RERANK_TOP_K: usize = 50;

/// Top-level settings, read from `search_config.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    /// Root of the `<video>/<frame>` keyframe tree.
    pub image_dir: PathBuf,
    /// Safetensors file holding the pre-computed CLIP image embeddings.
    pub features_path: PathBuf,
    /// Tensor name inside `features_path`. Empty picks the only tensor.
    #[serde(default)]
    pub features_tensor: String,
    /// Directory with `text.onnx`, `tokenizer.json` and the exported configs.
    pub clip_model_dir: PathBuf,
    /// ResNet-50 feature extractor exported to ONNX.
    pub rerank_model_path: PathBuf,
    #[serde(default = "default_top_k")]
    pub rerank_top_k: usize,
    /// Cut queries that exceed the text context instead of failing.
    #[serde(default)]
    pub truncate_queries: bool,
    #[serde(default)]
    pub preprocess: PreprocessConfig,
}

const fn default_top_k() -> usize {
    DEFAULT_RERANK_TOP_K
}

impl SearchConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.preprocess.validate()?;
        Ok(config)
    }
}

/// Image preprocessing for the re-rank feature extractor. Defaults are the
/// torchvision ImageNet transform: resize 256, center crop 224, ImageNet
/// mean/std.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct PreprocessConfig {
    pub resize: u32,
    pub crop: u32,
    pub mean: [f32; 3],
    pub std: [f32; 3],
    pub interpolation: String,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            resize: 256,
            crop: 224,
            mean: [0.485, 0.456, 0.406],
            std: [0.229, 0.224, 0.225],
            interpolation: "bilinear".to_string(),
        }
    }
}

impl PreprocessConfig {
    pub fn validate(&self) -> Result<()> {
        if self.crop == 0 || self.resize < self.crop {
            return Err(SearchError::Config(format!(
                "resize ({}) must be at least crop ({}) and crop must be positive",
                self.resize, self.crop
            )));
        }
        if self.std.iter().any(|&s| s <= 0.0) {
            return Err(SearchError::Config("std values must be positive".into()));
        }
        Ok(())
    }
}

/// Subset of `open_clip_config.json` needed to run the text tower.
#[derive(Debug, Clone, Deserialize)]
pub struct OpenClipConfig {
    pub model_cfg: OpenClipModelCfg,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpenClipModelCfg {
    pub embed_dim: usize,
    pub text_cfg: TextCfg,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TextCfg {
    #[serde(default = "default_context_length")]
    pub context_length: usize,
}

const fn default_context_length() -> usize {
    77
}

impl OpenClipConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// `model_config.json` written by the ONNX export script.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OnnxModelConfig {
    #[serde(default)]
    pub pad_id: Option<u32>,
    #[serde(default)]
    pub tokenizer_needs_lowercase: bool,
}

impl OnnxModelConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_config_fills_defaults() {
        let config: SearchConfig = serde_json::from_str(
            r#"{
                "image_dir": "frames",
                "features_path": "features/clip_features.safetensors",
                "clip_model_dir": "models/clip",
                "rerank_model_path": "models/resnet50.onnx"
            }"#,
        )
        .unwrap();

        assert_eq!(config.rerank_top_k, DEFAULT_RERANK_TOP_K);
        assert!(!config.truncate_queries);
        assert!(config.features_tensor.is_empty());
        assert_eq!(config.preprocess, PreprocessConfig::default());
    }

    #[test]
    fn preprocess_rejects_crop_larger_than_resize() {
        let cfg = PreprocessConfig {
            resize: 200,
            crop: 224,
            ..PreprocessConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(SearchError::Config(_))));
    }

    #[test]
    fn open_clip_config_reads_context_length() {
        let cfg: OpenClipConfig = serde_json::from_str(
            r#"{"model_cfg": {"embed_dim": 512, "text_cfg": {"context_length": 64}}}"#,
        )
        .unwrap();
        assert_eq!(cfg.model_cfg.text_cfg.context_length, 64);
        assert_eq!(cfg.model_cfg.embed_dim, 512);
    }
}
