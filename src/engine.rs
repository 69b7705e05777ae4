//! Query engine: a loaded artifact set plus an encoder, serving
//! ranked recommendations.
//!
//! The engine owns one [`ArtifactSet`] behind a read-write lock of an
//! `Arc`. Queries clone the `Arc` and work on that snapshot, so a
//! concurrent reload never mixes old records with new vectors: every
//! query sees exactly one complete set, before or after the swap.
//!
//! Query text goes through the same normalizer the artifacts were
//! built with (the policy travels in the metadata), then through the
//! encoder, then through the exact index. An empty query is a valid
//! "nothing to match" request and returns no results instead of an
//! error.

use parking_lot::RwLock;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::artifact::ArtifactSet;
use crate::embedding::TextEncoder;
use crate::error::{EngineError, EngineResult};
use crate::vector::{Score, l2_normalize};

/// One ranked recommendation returned to callers.
#[derive(Debug, Clone, Serialize)]
pub struct Recommendation {
    pub title: String,
    pub storyline: String,
    pub score: Score,
}

impl std::fmt::Display for Recommendation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({:.1}% match)", self.title, self.score.get() * 100.0)?;
        if !self.storyline.is_empty() {
            write!(f, "\n    {}", self.storyline)?;
        }
        Ok(())
    }
}

/// Serving-side recommendation engine.
///
/// Thread-safe: `recommend` takes `&self` and may run concurrently
/// with `reload` from another thread.
pub struct Recommender {
    current: RwLock<Arc<ArtifactSet>>,
    encoder: Arc<dyn TextEncoder>,
}

impl std::fmt::Debug for Recommender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recommender")
            .field("encoder", &self.encoder.model_id())
            .finish_non_exhaustive()
    }
}

impl Recommender {
    /// Creates an engine over an already-assembled artifact set.
    ///
    /// Fails if the encoder does not match the set: its model must be
    /// the one recorded at build time and its dimension must equal the
    /// store's.
    pub fn new(artifacts: ArtifactSet, encoder: Arc<dyn TextEncoder>) -> EngineResult<Self> {
        Self::validate_encoder(&artifacts, encoder.as_ref())?;
        Ok(Self {
            current: RwLock::new(Arc::new(artifacts)),
            encoder,
        })
    }

    /// Loads an artifact set from a directory and wires it to the encoder.
    pub fn load(dir: &Path, encoder: Arc<dyn TextEncoder>) -> EngineResult<Self> {
        let artifacts = ArtifactSet::load(dir)?;
        info!(
            records = artifacts.len(),
            dimension = artifacts.store.dimension().get(),
            "Loaded artifact set"
        );
        Self::new(artifacts, encoder)
    }

    fn validate_encoder(artifacts: &ArtifactSet, encoder: &dyn TextEncoder) -> EngineResult<()> {
        if encoder.model_id() != artifacts.metadata.model_name {
            return Err(EngineError::ConfigError {
                reason: format!(
                    "Artifacts were built with model '{}' but the engine is configured with '{}'",
                    artifacts.metadata.model_name,
                    encoder.model_id()
                ),
            });
        }

        let expected = artifacts.store.dimension().get();
        let actual = encoder.dimension().get();
        if expected != actual {
            return Err(EngineError::DimensionMismatch { expected, actual });
        }
        Ok(())
    }

    /// Returns up to `top_n` recommendations for a free-text query.
    ///
    /// `top_n` is clamped to `[1, record_count]`; asking for more
    /// results than records yields every record, ranked. An empty or
    /// whitespace-only query returns an empty list. Results are ordered
    /// by descending score with ties broken by catalog order.
    pub fn recommend(&self, query_text: &str, top_n: usize) -> EngineResult<Vec<Recommendation>> {
        if query_text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let artifacts = self.snapshot();
        if artifacts.is_empty() {
            return Ok(Vec::new());
        }

        let cleaned = artifacts.normalizer.normalize(query_text);
        let mut query_vector = self.encoder.encode(&cleaned)?;
        // The store is normalized at build time; normalizing the query
        // here keeps inner products equal to cosine similarity even if
        // the encoder's output is not exactly unit length.
        l2_normalize(&mut query_vector);

        let top_k = top_n.clamp(1, artifacts.len());
        debug!(top_k, candidates = artifacts.len(), "Scoring query against index");
        let hits = artifacts.index.search(&query_vector, top_k)?;

        let mut recommendations = Vec::with_capacity(hits.len());
        for hit in hits {
            let record = artifacts.catalog.get(hit.ordinal).ok_or_else(|| {
                EngineError::General(format!(
                    "Search returned ordinal {} outside catalog of {} records",
                    hit.ordinal,
                    artifacts.len()
                ))
            })?;
            recommendations.push(Recommendation {
                title: record.title.clone(),
                storyline: record.storyline.clone(),
                score: hit.score,
            });
        }
        Ok(recommendations)
    }

    /// Replaces the served artifact set with one loaded from `dir`.
    ///
    /// In-flight queries keep the snapshot they started with; queries
    /// issued after this returns see the new set. A failed load leaves
    /// the current set serving untouched.
    pub fn reload(&self, dir: &Path) -> EngineResult<()> {
        let artifacts = ArtifactSet::load(dir)?;
        Self::validate_encoder(&artifacts, self.encoder.as_ref())?;

        let records = artifacts.len();
        *self.current.write() = Arc::new(artifacts);
        info!(records, "Swapped in new artifact set");
        Ok(())
    }

    /// Returns the artifact set queries are currently served from.
    #[must_use]
    pub fn snapshot(&self) -> Arc<ArtifactSet> {
        Arc::clone(&self.current.read())
    }

    /// Number of records in the current artifact set.
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.current.read().len()
    }
}
