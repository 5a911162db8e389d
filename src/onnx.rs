use crate::error::{Result, SearchError};
use ndarray::{Array2, ArrayView, Ix2, IxDyn};
use ort::session::{builder::GraphOptimizationLevel, Session, SessionInputValue};
use parking_lot::Mutex;
use std::borrow::Cow;
use std::path::Path;

/// An ONNX Runtime session shared between callers. Inference needs exclusive
/// access, so runs are serialized through a mutex.
pub struct OnnxSession {
    session: Mutex<Session>,
}

impl OnnxSession {
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(SearchError::Config(format!(
                "model file {} not found",
                path.display()
            )));
        }
        let threads = num_cpus::get();
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(threads)?
            .commit_from_file(path)?;
        tracing::info!(model = %path.display(), threads, "loaded onnx session");

        Ok(Self {
            session: Mutex::new(session),
        })
    }

    /// Helper to check if the model expects a specific input name
    #[must_use]
    pub fn has_input(&self, name: &str) -> bool {
        self.session.lock().inputs().iter().any(|i| i.name() == name)
    }

    /// First of `possibilities` the model takes as an input.
    #[must_use]
    pub fn find_input(&self, possibilities: &[&str]) -> Option<String> {
        possibilities
            .iter()
            .find(|p| self.has_input(p))
            .map(|p| (*p).to_string())
    }

    /// Run the model and return its first output as a `[batch, dim]` matrix.
    /// Trailing singleton axes (e.g. the `1x1` of a pooled CNN) are dropped.
    pub fn run_embeddings(
        &self,
        inputs: Vec<(Cow<'_, str>, SessionInputValue<'_>)>,
    ) -> Result<Array2<f32>> {
        let mut session = self.session.lock();
        let outputs = session.run(inputs)?;

        let (shape, data) = outputs[0].try_extract_tensor::<f32>()?;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let mut dims: Vec<usize> = shape.iter().map(|&x| x as usize).collect();
        while dims.len() > 2 && dims.last() == Some(&1) {
            dims.pop();
        }
        let view = ArrayView::from_shape(IxDyn(&dims), data)
            .map_err(|e| SearchError::Inference(e.to_string()))?;
        Ok(view
            .into_dimensionality::<Ix2>()
            .map_err(|e| SearchError::Inference(format!("unexpected output shape {dims:?}: {e}")))?
            .to_owned())
    }
}
