//! Two-stage retrieval: CLIP similarity over the whole collection, then an
//! appearance re-rank of the top candidates.
//!
//! The re-rank anchors on the coarse top-1 and pulls visually similar
//! candidates towards it. It is a heuristic that helps when many frames score
//! close together on the text embedding, not a learned re-ranker.

use crate::collection::CollectionIndex;
use crate::config::{SearchConfig, DEFAULT_RERANK_TOP_K};
use crate::encoder::{FeatureEncoder, TextEncoder};
use crate::error::{Result, SearchError};
use crate::filter::filter_by_group;
use crate::store::EmbeddingStore;
use crate::text::ClipTextEncoder;
use crate::utils::rank_descending;
use crate::vision::ResnetFeatureEncoder;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Coarse candidates re-ranked by appearance. `0` turns the re-rank off.
    pub rerank_top_k: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rerank_top_k: DEFAULT_RERANK_TOP_K,
        }
    }
}

pub struct RankingEngine {
    store: EmbeddingStore,
    text: Box<dyn TextEncoder>,
    features: Box<dyn FeatureEncoder>,
    collection: Box<dyn CollectionIndex>,
    config: EngineConfig,
}

impl RankingEngine {
    /// Fails with [`SearchError::InconsistentIndex`] when the table and the
    /// collection disagree on the number of items.
    pub fn new(
        store: EmbeddingStore,
        text: Box<dyn TextEncoder>,
        features: Box<dyn FeatureEncoder>,
        collection: Box<dyn CollectionIndex>,
        config: EngineConfig,
    ) -> Result<Self> {
        if store.len() != collection.count() {
            return Err(SearchError::InconsistentIndex {
                rows: store.len(),
                count: collection.count(),
            });
        }
        Ok(Self {
            store,
            text,
            features,
            collection,
            config,
        })
    }

    /// Load the embedding table and both ONNX encoders named in `config` and
    /// bind them to `collection`.
    pub fn from_config(
        config: &SearchConfig,
        collection: Box<dyn CollectionIndex>,
    ) -> Result<Self> {
        let store =
            EmbeddingStore::from_safetensors(&config.features_path, &config.features_tensor)?;
        let text = ClipTextEncoder::new(&config.clip_model_dir, config.truncate_queries)?;
        store.check_dim(text.embed_dim())?;
        let features =
            ResnetFeatureEncoder::new(&config.rerank_model_path, config.preprocess.clone())?;

        Self::new(
            store,
            Box::new(text),
            Box::new(features),
            collection,
            EngineConfig {
                rerank_top_k: config.rerank_top_k,
            },
        )
    }

    #[must_use]
    pub fn store(&self) -> &EmbeddingStore {
        &self.store
    }

    #[must_use]
    pub fn collection(&self) -> &dyn CollectionIndex {
        self.collection.as_ref()
    }

    #[must_use]
    pub const fn config(&self) -> EngineConfig {
        self.config
    }

    /// Rank the collection against a text query, optionally restricted to one
    /// group, with the top candidates re-ranked by appearance.
    pub fn search(&self, query: &str, group: Option<&str>) -> Result<Vec<usize>> {
        let _span = tracing::debug_span!("search", query, group).entered();

        let query_vector = self.text.encode(query)?;
        let mut ranked = self.store.similarity_to_query(query_vector.view())?;
        if let Some(group) = group {
            ranked = filter_by_group(ranked, group, self.collection.as_ref())?;
        }

        let k = self.config.rerank_top_k.min(ranked.len());
        if k == 0 {
            return Ok(ranked);
        }
        let tail = ranked.split_off(k);
        let mut head = rerank_by_anchor(
            &ranked,
            self.features.as_ref(),
            self.collection.as_ref(),
        )?;
        head.extend(tail);
        Ok(head)
    }

    /// Every other item ranked by embedding similarity to item `id`.
    pub fn similar(&self, id: usize) -> Result<Vec<usize>> {
        let _span = tracing::debug_span!("similar", id).entered();
        self.store.similarity_to_item(id)
    }
}

/// Re-order `head` by feature similarity to its first element. The anchor
/// stays in front; among equal scores the incoming order is kept.
pub fn rerank_by_anchor(
    head: &[usize],
    features: &dyn FeatureEncoder,
    collection: &dyn CollectionIndex,
) -> Result<Vec<usize>> {
    let _span = tracing::debug_span!("rerank", candidates = head.len()).entered();
    let Some((&anchor, rest)) = head.split_first() else {
        return Ok(Vec::new());
    };

    let images = head
        .iter()
        .map(|&id| collection.resolve(id))
        .collect::<Result<Vec<_>>>()?;
    let vectors = features.encode_batch(&images)?;
    if vectors.nrows() != head.len() {
        return Err(SearchError::Inference(format!(
            "feature encoder returned {} vectors for {} candidates",
            vectors.nrows(),
            head.len()
        )));
    }

    let scores = vectors.dot(&vectors.row(0));
    let order = rank_descending(scores.slice(ndarray::s![1..]));

    let mut reranked = Vec::with_capacity(head.len());
    reranked.push(anchor);
    reranked.extend(order.into_iter().map(|i| rest[i]));
    let moved = reranked.as_slice() != head;
    tracing::debug!(anchor, moved, "re-ranked candidates");
    Ok(reranked)
}
