#![allow(dead_code)]
//! In-memory stand-ins for the ONNX encoders and the keyframe directory.

use clip_frame_search::utils::normalize;
use clip_frame_search::{CollectionIndex, FeatureEncoder, Result, SearchError, TextEncoder};
use ndarray::{Array1, Array2};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Looks queries up in a fixed table; unknown queries fail to encode.
pub struct FixedTextEncoder {
    vectors: HashMap<String, Vec<f32>>,
}

impl FixedTextEncoder {
    pub fn new(entries: &[(&str, &[f32])]) -> Self {
        Self {
            vectors: entries
                .iter()
                .map(|(q, v)| ((*q).to_string(), v.to_vec()))
                .collect(),
        }
    }
}

impl TextEncoder for FixedTextEncoder {
    fn encode(&self, text: &str) -> Result<Array1<f32>> {
        self.vectors
            .get(text)
            .map(|v| normalize(Array1::from(v.clone())))
            .ok_or_else(|| SearchError::Encoding(format!("no vector for '{text}'")))
    }
}

/// Treats image bytes as comma-separated floats, e.g. `b"0.6,0.8"`, and counts
/// how many images it was asked to encode.
#[derive(Default, Clone)]
pub struct CsvFeatureEncoder {
    pub encoded: Arc<AtomicUsize>,
}

impl CsvFeatureEncoder {
    pub fn encoded(&self) -> usize {
        self.encoded.load(Ordering::SeqCst)
    }
}

impl FeatureEncoder for CsvFeatureEncoder {
    fn encode(&self, image: &[u8]) -> Result<Array1<f32>> {
        self.encoded.fetch_add(1, Ordering::SeqCst);
        let text = std::str::from_utf8(image).map_err(|e| SearchError::Decode(e.to_string()))?;
        let values = text
            .split(',')
            .map(|v| v.trim().parse::<f32>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| SearchError::Decode(e.to_string()))?;
        Ok(normalize(Array1::from(values)))
    }
}

/// Items held in memory: encoded image bytes plus a group key each.
pub struct MemoryCollection {
    items: Vec<(Vec<u8>, String)>,
}

impl MemoryCollection {
    pub fn new(items: Vec<(String, String)>) -> Self {
        Self {
            items: items
                .into_iter()
                .map(|(bytes, group)| (bytes.into_bytes(), group))
                .collect(),
        }
    }

    /// `n` items in group `g`, all with the same appearance.
    pub fn uniform(n: usize, group: &str) -> Self {
        Self::new((0..n).map(|_| ("1,0".to_string(), group.to_string())).collect())
    }

    fn item(&self, id: usize) -> Result<&(Vec<u8>, String)> {
        self.items.get(id).ok_or(SearchError::IndexOutOfRange {
            id,
            count: self.items.len(),
        })
    }
}

impl CollectionIndex for MemoryCollection {
    fn resolve(&self, id: usize) -> Result<Vec<u8>> {
        Ok(self.item(id)?.0.clone())
    }

    fn group_of(&self, id: usize) -> Result<String> {
        Ok(self.item(id)?.1.clone())
    }

    fn count(&self) -> usize {
        self.items.len()
    }
}

/// Unit vector at `angle` radians, as CSV image bytes.
pub fn angle_csv(angle: f32) -> String {
    format!("{},{}", angle.cos(), angle.sin())
}

/// `n` unit rows fanning out from `[1, 0]`, so a `[1, 0]` query ranks them
/// in id order.
pub fn fan_table(n: usize) -> Array2<f32> {
    Array2::from_shape_fn((n, 2), |(i, j)| {
        #[allow(clippy::cast_precision_loss)]
        let angle = i as f32 * 0.02;
        if j == 0 {
            angle.cos()
        } else {
            angle.sin()
        }
    })
}
