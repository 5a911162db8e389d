//! Immutable table of primary (CLIP) embeddings, one row per collection item.

use crate::error::{Result, SearchError};
use crate::utils::rank_descending;
use ndarray::{Array1, Array2, ArrayView1};
use safetensors::{Dtype, SafeTensors};
use std::path::Path;

pub struct EmbeddingStore {
    table: Array2<f32>,
}

impl EmbeddingStore {
    /// Wrap an in-memory `[items, dim]` table. Rows are expected to be unit
    /// length already.
    pub fn from_array(table: Array2<f32>) -> Result<Self> {
        if table.ncols() == 0 {
            return Err(SearchError::Table("embedding dimension is zero".into()));
        }
        Ok(Self { table })
    }

    /// Load the table from a safetensors file holding one rank-2 `F32` tensor.
    /// An empty `tensor_name` selects the file's only tensor.
    pub fn from_safetensors(path: impl AsRef<Path>, tensor_name: &str) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)?;
        let tensors = SafeTensors::deserialize(&data)
            .map_err(|e| SearchError::Table(format!("{}: {e}", path.display())))?;

        let name = if tensor_name.is_empty() {
            let names = tensors.names();
            match names.as_slice() {
                [only] => (*only).clone(),
                _ => {
                    return Err(SearchError::Table(format!(
                        "{} holds {} tensors, name the one to use",
                        path.display(),
                        names.len()
                    )))
                }
            }
        } else {
            tensor_name.to_string()
        };

        let view = tensors
            .tensor(&name)
            .map_err(|e| SearchError::Table(format!("tensor '{name}': {e}")))?;
        if view.dtype() != Dtype::F32 {
            return Err(SearchError::Table(format!(
                "tensor '{name}' is {:?}, expected F32",
                view.dtype()
            )));
        }
        let &[rows, dim] = view.shape() else {
            return Err(SearchError::Table(format!(
                "tensor '{name}' has shape {:?}, expected [items, dim]",
                view.shape()
            )));
        };

        let values: Vec<f32> = view
            .data()
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        let table = Array2::from_shape_vec((rows, dim), values)
            .map_err(|e| SearchError::Table(e.to_string()))?;

        tracing::info!(
            path = %path.display(),
            tensor = %name,
            rows,
            dim,
            "loaded embedding table"
        );
        Self::from_array(table)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.table.nrows()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.nrows() == 0
    }

    #[must_use]
    pub fn dim(&self) -> usize {
        self.table.ncols()
    }

    pub fn row(&self, id: usize) -> Result<ArrayView1<'_, f32>> {
        if id >= self.len() {
            return Err(SearchError::IndexOutOfRange {
                id,
                count: self.len(),
            });
        }
        Ok(self.table.row(id))
    }

    /// Fails with [`SearchError::DimensionMismatch`] unless vectors of
    /// `width` can be compared against the table.
    pub fn check_dim(&self, width: usize) -> Result<()> {
        if width != self.dim() {
            return Err(SearchError::DimensionMismatch {
                expected: self.dim(),
                actual: width,
            });
        }
        Ok(())
    }

    /// Dot product of `query` with every stored row.
    pub fn scores(&self, query: ArrayView1<f32>) -> Result<Array1<f32>> {
        self.check_dim(query.len())?;
        Ok(self.table.dot(&query))
    }

    /// All ids by descending similarity to `query`, ties by ascending id.
    pub fn similarity_to_query(&self, query: ArrayView1<f32>) -> Result<Vec<usize>> {
        let scores = self.scores(query)?;
        Ok(rank_descending(scores.view()))
    }

    /// All other ids by descending similarity to item `id`. The seed is
    /// dropped even when a duplicate row ties with it.
    pub fn similarity_to_item(&self, id: usize) -> Result<Vec<usize>> {
        let seed = self.row(id)?;
        let mut ranked = self.similarity_to_query(seed)?;
        ranked.retain(|&other| other != id);
        Ok(ranked)
    }
}
