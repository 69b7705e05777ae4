//! Vector storage and exact similarity search.
//!
//! This module provides the embedding-side half of the recommendation
//! engine: a flat store of unit-length vectors aligned with the record
//! catalog by ordinal, and a brute-force index that scans it for exact
//! top-k cosine similarity.
//!
//! # Guarantees
//! - Vector `i` always corresponds to catalog record `i`
//! - Stored vectors are unit length, so inner product equals cosine
//! - Search results are exact and deterministic, with ties broken by
//!   ascending ordinal
//! - Persisted files are checksummed and rejected wholesale when corrupt

mod index;
mod store;
mod types;

// Re-export core types for public API
pub use index::{FlatIndex, SearchHit};
pub use store::{NORM_EPSILON, VectorStore, VectorStoreError, l2_norm, l2_normalize};
pub use types::{Score, VECTOR_DIMENSION_384, VectorDimension, VectorError};
