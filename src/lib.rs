#![allow(clippy::missing_errors_doc)]
pub mod collection;
pub mod config;
pub mod encoder;
pub mod engine;
pub mod error;
pub mod filter;
pub mod onnx;
pub mod store;
pub mod text;
pub mod utils;
pub mod vision;

pub use collection::{frame_info, CollectionIndex, FrameDirectory};
pub use config::SearchConfig;
pub use encoder::{FeatureEncoder, TextEncoder};
pub use engine::{EngineConfig, RankingEngine};
pub use error::{Result, SearchError};
pub use store::EmbeddingStore;
pub use text::ClipTextEncoder;
pub use vision::{ImagePreprocessor, ResnetFeatureEncoder};
