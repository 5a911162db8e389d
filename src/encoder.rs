use crate::error::Result;
use ndarray::{Array1, Array2, Axis};

/// Maps a query string into the primary embedding space.
pub trait TextEncoder: Send + Sync {
    /// Unit-length embedding of `text`. Empty text is valid input.
    fn encode(&self, text: &str) -> Result<Array1<f32>>;
}

/// Maps raw image bytes into the secondary (re-rank) feature space.
pub trait FeatureEncoder: Send + Sync {
    /// Unit-length feature vector of one encoded image.
    fn encode(&self, image: &[u8]) -> Result<Array1<f32>>;

    /// One row per image, in input order.
    fn encode_batch(&self, images: &[Vec<u8>]) -> Result<Array2<f32>> {
        let rows = images
            .iter()
            .map(|bytes| self.encode(bytes))
            .collect::<Result<Vec<_>>>()?;
        let views: Vec<_> = rows.iter().map(|r| r.view().insert_axis(Axis(0))).collect();
        ndarray::concatenate(Axis(0), &views)
            .map_err(|e| crate::error::SearchError::Inference(e.to_string()))
    }
}
