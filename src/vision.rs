use crate::config::PreprocessConfig;
use crate::encoder::FeatureEncoder;
use crate::error::{Result, SearchError};
use crate::onnx::OnnxSession;
use crate::utils::normalize_rows;
use image::{imageops::FilterType, DynamicImage, GenericImageView};
use ndarray::{Array1, Array2};
use ort::value::Tensor;
use rayon::prelude::*;
use std::path::Path;

/// Decode, resize, center-crop and normalize images into CHW `f32` planes.
#[derive(Debug, Clone)]
pub struct ImagePreprocessor {
    config: PreprocessConfig,
    filter: FilterType,
}

impl ImagePreprocessor {
    pub fn new(config: PreprocessConfig) -> Result<Self> {
        config.validate()?;
        let filter = match config.interpolation.as_str() {
            "bicubic" => FilterType::CatmullRom,
            "bilinear" => FilterType::Triangle,
            "nearest" => FilterType::Nearest,
            other => {
                return Err(SearchError::Config(format!(
                    "unknown interpolation '{other}'"
                )))
            }
        };
        Ok(Self { config, filter })
    }

    /// Side length of the square output.
    #[must_use]
    pub const fn size(&self) -> u32 {
        self.config.crop
    }

    /// Values per preprocessed image (`3 * size * size`).
    #[must_use]
    pub const fn tensor_len(&self) -> usize {
        3 * (self.config.crop as usize) * (self.config.crop as usize)
    }

    pub fn preprocess_bytes(&self, bytes: &[u8]) -> Result<Vec<f32>> {
        let image = image::load_from_memory(bytes)?;
        self.preprocess(&image)
    }

    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn preprocess(&self, image: &DynamicImage) -> Result<Vec<f32>> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(SearchError::Decode("image has no pixels".into()));
        }

        // shorter side to `resize`, then a centered `crop` square
        let size = self.config.crop;
        let scale = self.config.resize as f32 / width.min(height) as f32;
        let scaled_width = ((width as f32 * scale).round() as u32).max(size);
        let scaled_height = ((height as f32 * scale).round() as u32).max(size);
        let resized = image.resize_exact(scaled_width, scaled_height, self.filter);
        let x = center_offset(scaled_width, size);
        let y = center_offset(scaled_height, size);
        let rgb = resized.crop_imm(x, y, size, size).to_rgb8();

        let (mean, std) = (self.config.mean, self.config.std);
        let pixels = rgb.as_raw();
        let channel_len = (size as usize).pow(2);
        let mut out = vec![0.0f32; 3 * channel_len];
        for (c, plane) in out.chunks_exact_mut(channel_len).enumerate() {
            for (i, value) in plane.iter_mut().enumerate() {
                let v = f32::from(pixels[i * 3 + c]) / 255.0;
                *value = (v - mean[c]) / std[c];
            }
        }
        Ok(out)
    }
}

/// Start of a centered `size` window in `extent` pixels, rounded half to even
/// like torchvision's `CenterCrop`.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn center_offset(extent: u32, size: u32) -> u32 {
    (extent.saturating_sub(size) as f32 / 2.0).round_ties_even() as u32
}

/// ImageNet CNN (ResNet-50 by default) exported to ONNX, used as the
/// appearance feature extractor for re-ranking.
pub struct ResnetFeatureEncoder {
    session: OnnxSession,
    preprocessor: ImagePreprocessor,
    input_name: String,
}

impl ResnetFeatureEncoder {
    pub fn new(model_path: impl AsRef<Path>, preprocess: PreprocessConfig) -> Result<Self> {
        let session = OnnxSession::new(model_path)?;
        let preprocessor = ImagePreprocessor::new(preprocess)?;
        let input_name = session
            .find_input(&["input", "pixel_values", "x"])
            .ok_or_else(|| SearchError::Config("Could not find vision input node".to_string()))?;

        Ok(Self {
            session,
            preprocessor,
            input_name,
        })
    }

    fn embed(&self, images: &[&[u8]]) -> Result<Array2<f32>> {
        if images.is_empty() {
            return Err(SearchError::Inference("Empty batch".to_string()));
        }

        let planes = images
            .par_iter()
            .map(|bytes| self.preprocessor.preprocess_bytes(bytes))
            .collect::<Result<Vec<_>>>()?;
        let mut batch = Vec::with_capacity(images.len() * self.preprocessor.tensor_len());
        for plane in planes {
            batch.extend_from_slice(&plane);
        }

        let size = self.preprocessor.size() as usize;
        let input = Tensor::from_array(([images.len(), 3, size, size], batch))?;
        let features = self
            .session
            .run_embeddings(ort::inputs![&self.input_name => input])?;
        if features.nrows() != images.len() {
            return Err(SearchError::Inference(format!(
                "feature model returned {} rows for {} images",
                features.nrows(),
                images.len()
            )));
        }
        Ok(normalize_rows(features))
    }
}

impl FeatureEncoder for ResnetFeatureEncoder {
    fn encode(&self, image: &[u8]) -> Result<Array1<f32>> {
        let features = self.embed(&[image])?;
        Ok(features.row(0).to_owned())
    }

    fn encode_batch(&self, images: &[Vec<u8>]) -> Result<Array2<f32>> {
        let refs: Vec<&[u8]> = images.iter().map(Vec::as_slice).collect();
        self.embed(&refs)
    }
}
