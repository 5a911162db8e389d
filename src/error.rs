use thiserror::Error;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Query vector has {actual} dimensions, embedding table has {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("Item id {id} is out of range for a collection of {count} items")]
    IndexOutOfRange { id: usize, count: usize },
    #[error("Text encoding error: {0}")]
    Encoding(String),
    #[error("Image decode error: {0}")]
    Decode(String),
    #[error("Embedding table has {rows} rows but the collection holds {count} items")]
    InconsistentIndex { rows: usize, count: usize },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("ONNX error: {0}")]
    Onnx(#[from] ort::Error),
    #[error("Embedding table error: {0}")]
    Table(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Inference error: {0}")]
    Inference(String),
}

impl From<image::ImageError> for SearchError {
    fn from(err: image::ImageError) -> Self {
        Self::Decode(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SearchError>;
