//! Exact nearest-neighbor search over the vector store.
//!
//! The index is a brute-force scan: every query computes the inner
//! product against every stored vector. With unit-length vectors that
//! inner product is the cosine similarity, so no approximation or
//! auxiliary structure is involved and results are exact. At catalog
//! scale (tens of thousands of vectors) a full scan stays well under
//! interactive latency.
//!
//! The index derives everything from the store it wraps; rebuilding it
//! from the same store always yields the same results.

use std::sync::Arc;

use crate::vector::store::VectorStore;
use crate::vector::types::{Score, VectorDimension, VectorError};

/// A single search result: which vector matched and how well.
///
/// The ordinal is the row position in the vector store, which by
/// construction is also the position in the record catalog.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchHit {
    pub ordinal: usize,
    pub score: Score,
}

/// Exact top-k similarity index over a [`VectorStore`].
#[derive(Debug, Clone)]
pub struct FlatIndex {
    store: Arc<VectorStore>,
}

impl FlatIndex {
    /// Builds an index over the given store.
    ///
    /// The store is shared, not copied; the index holds no state of
    /// its own beyond the reference.
    #[must_use]
    pub fn build(store: Arc<VectorStore>) -> Self {
        Self { store }
    }

    /// Returns the `top_k` most similar vectors to the query.
    ///
    /// Results are ordered by descending score; equal scores tie-break
    /// by ascending ordinal so rankings are stable across runs.
    ///
    /// # Errors
    /// - `InvalidTopK` if `top_k` is zero
    /// - `DimensionMismatch` if the query length differs from the store
    ///   dimension
    ///
    /// Searching an empty index returns an empty result, not an error.
    pub fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<SearchHit>, VectorError> {
        if top_k == 0 {
            return Err(VectorError::InvalidTopK(top_k));
        }
        self.store.dimension().validate_vector(query)?;

        if self.store.is_empty() {
            return Ok(Vec::new());
        }

        let mut hits = Vec::with_capacity(self.store.len());
        for (ordinal, vector) in self.store.iter().enumerate() {
            let score = Score::from_inner_product(dot(query, vector))?;
            hits.push(SearchHit { ordinal, score });
        }

        hits.sort_unstable_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then_with(|| a.ordinal.cmp(&b.ordinal))
        });
        hits.truncate(top_k);
        Ok(hits)
    }

    /// Returns the number of indexed vectors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Returns true if no vectors are indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Returns the dimension queries must have.
    #[must_use]
    pub fn dimension(&self) -> VectorDimension {
        self.store.dimension()
    }

    /// Returns the store this index scans.
    #[must_use]
    pub fn store(&self) -> &Arc<VectorStore> {
        &self.store
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}
