//! Text embedding generation for storylines and queries.
//!
//! This module provides the trait and implementations for turning
//! normalized text into fixed-dimension vectors. The production
//! implementation wraps fastembed with the AllMiniLML6V2 model by
//! default; tests substitute a deterministic encoder so nothing
//! downloads model weights.
//!
//! The encoder is the only nondeterministic-adjacent component in the
//! build: a given model version encodes the same text to the same
//! vector, but different model versions do not. The model identifier is
//! therefore recorded in the artifact metadata and checked when an
//! engine loads artifacts.

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::path::Path;
use std::sync::Mutex;
use thiserror::Error;

use crate::vector::VectorDimension;

/// Default embedding model used when the configuration names none.
pub const DEFAULT_MODEL: &str = "all-MiniLM-L6-v2";

/// Errors from encoder initialization and embedding generation.
#[derive(Error, Debug)]
pub enum EncodeError {
    #[error(
        "Failed to initialize embedding model: {0}\nSuggestion: Ensure you have an internet connection for first-time model download"
    )]
    ModelInit(String),

    #[error("Failed to generate embeddings: {0}")]
    EncodeFailed(String),

    #[error(
        "Unknown embedding model: {0}\nSuggestion: Supported models are all-MiniLM-L6-v2, bge-small-en-v1.5, bge-base-en-v1.5, bge-large-en-v1.5 (add -q for quantized)"
    )]
    UnknownModel(String),
}

/// Trait for generating embeddings from text.
///
/// Implementations must be thread-safe and deterministic for a fixed
/// model: encoding the same text twice yields the same vector. Output
/// vectors are not required to be unit length; the vector store
/// normalizes on insert and the query engine normalizes query vectors.
pub trait TextEncoder: Send + Sync {
    /// Generates embeddings for multiple texts, one vector per input,
    /// in input order.
    fn encode_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EncodeError>;

    /// Dimension of the vectors this encoder produces.
    #[must_use]
    fn dimension(&self) -> VectorDimension;

    /// Identifier of the underlying model, recorded in artifact metadata.
    #[must_use]
    fn model_id(&self) -> &str;

    /// Generates an embedding for a single text.
    fn encode(&self, text: &str) -> Result<Vec<f32>, EncodeError> {
        let texts = [text.to_string()];
        let mut vectors = self.encode_batch(&texts)?;
        vectors
            .pop()
            .ok_or_else(|| EncodeError::EncodeFailed("No embedding returned".to_string()))
    }
}

/// Parses a model name string to the fastembed model enum.
///
/// Accepts the canonical hyphenated names case-insensitively, plus the
/// squashed forms without separators.
pub fn parse_model_name(name: &str) -> Result<EmbeddingModel, EncodeError> {
    match name.to_lowercase().as_str() {
        "all-minilm-l6-v2" | "allminiml6v2" => Ok(EmbeddingModel::AllMiniLML6V2),
        "all-minilm-l6-v2-q" | "allminiml6v2q" => Ok(EmbeddingModel::AllMiniLML6V2Q),
        "bge-small-en-v1.5" | "bgesmallenv15" => Ok(EmbeddingModel::BGESmallENV15),
        "bge-small-en-v1.5-q" | "bgesmallenv15q" => Ok(EmbeddingModel::BGESmallENV15Q),
        "bge-base-en-v1.5" | "bgebaseenv15" => Ok(EmbeddingModel::BGEBaseENV15),
        "bge-base-en-v1.5-q" | "bgebaseenv15q" => Ok(EmbeddingModel::BGEBaseENV15Q),
        "bge-large-en-v1.5" | "bgelargeenv15" => Ok(EmbeddingModel::BGELargeENV15),
        "bge-large-en-v1.5-q" | "bgelargeenv15q" => Ok(EmbeddingModel::BGELargeENV15Q),
        _ => Err(EncodeError::UnknownModel(name.to_string())),
    }
}

/// FastEmbed-backed encoder.
///
/// Uses a `Mutex` because fastembed's `embed()` takes `&mut self`; the
/// engine serializes encode calls through it. Model weights download to
/// the cache directory on first use and load from there afterwards.
pub struct FastEmbedEncoder {
    model: Mutex<TextEmbedding>,
    model_name: String,
    dimension: VectorDimension,
}

impl FastEmbedEncoder {
    /// Creates an encoder for the named model, without download progress.
    ///
    /// # Errors
    /// Returns an error if the model name is unknown or the model fails
    /// to initialize or download.
    pub fn new(model_name: &str, cache_dir: &Path) -> Result<Self, EncodeError> {
        Self::with_progress(model_name, cache_dir, false)
    }

    /// Creates an encoder, optionally showing download progress.
    ///
    /// The CLI enables progress for interactive builds; library callers
    /// typically do not.
    pub fn with_progress(
        model_name: &str,
        cache_dir: &Path,
        show_download_progress: bool,
    ) -> Result<Self, EncodeError> {
        let model_enum = parse_model_name(model_name)?;

        std::fs::create_dir_all(cache_dir).map_err(|e| {
            EncodeError::ModelInit(format!("Failed to create model cache directory: {e}"))
        })?;

        let mut model = TextEmbedding::try_new(
            InitOptions::new(model_enum)
                .with_cache_dir(cache_dir.to_path_buf())
                .with_show_download_progress(show_download_progress),
        )
        .map_err(|e| EncodeError::ModelInit(e.to_string()))?;

        // The fastembed API does not expose the output width, so probe
        // it with a throwaway embedding.
        let dimension = probe_dimension(&mut model)?;

        Ok(Self {
            model: Mutex::new(model),
            model_name: model_name.to_string(),
            dimension,
        })
    }
}

impl TextEncoder for FastEmbedEncoder {
    fn encode_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EncodeError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let embeddings = self
            .model
            .lock()
            .map_err(|_| {
                EncodeError::EncodeFailed(
                    "Failed to acquire embedding model lock - model may be poisoned".to_string(),
                )
            })?
            .embed(texts.to_vec(), None)
            .map_err(|e| EncodeError::EncodeFailed(e.to_string()))?;

        for embedding in &embeddings {
            if embedding.len() != self.dimension.get() {
                return Err(EncodeError::EncodeFailed(format!(
                    "Model returned {} dimensions, expected {}",
                    embedding.len(),
                    self.dimension.get()
                )));
            }
        }

        Ok(embeddings)
    }

    fn dimension(&self) -> VectorDimension {
        self.dimension
    }

    fn model_id(&self) -> &str {
        &self.model_name
    }
}

fn probe_dimension(model: &mut TextEmbedding) -> Result<VectorDimension, EncodeError> {
    let probe = model
        .embed(vec!["dimension probe"], None)
        .map_err(|e| EncodeError::ModelInit(format!("Failed to probe model dimension: {e}")))?;

    let width = probe
        .first()
        .map(Vec::len)
        .ok_or_else(|| EncodeError::ModelInit("Model returned no probe embedding".to_string()))?;

    VectorDimension::new(width).map_err(|e| EncodeError::ModelInit(e.to_string()))
}

/// Mock encoder for testing.
///
/// Hashes each whitespace token into a bucket of a small vector and
/// normalizes the result, giving deterministic embeddings where shared
/// vocabulary produces positive similarity and identical texts produce
/// identical vectors. No model download, no I/O.
#[cfg(test)]
pub struct MockTextEncoder {
    dimension: VectorDimension,
}

#[cfg(test)]
impl MockTextEncoder {
    #[must_use]
    pub fn new(dimension: VectorDimension) -> Self {
        Self { dimension }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        use sha2::{Digest, Sha256};

        let dim = self.dimension.get();
        let mut vector = vec![0.0_f32; dim];

        for token in text.split_whitespace() {
            let digest = Sha256::digest(token.as_bytes());
            let hash = u64::from_le_bytes([
                digest[0], digest[1], digest[2], digest[3], digest[4], digest[5], digest[6],
                digest[7],
            ]);
            let bucket = (hash % dim as u64) as usize;
            let sign = if hash & (1 << 63) == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        crate::vector::l2_normalize(&mut vector);
        vector
    }
}

#[cfg(test)]
impl TextEncoder for MockTextEncoder {
    fn encode_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EncodeError> {
        Ok(texts.iter().map(|text| self.embed_one(text)).collect())
    }

    fn dimension(&self) -> VectorDimension {
        self.dimension
    }

    fn model_id(&self) -> &str {
        "mock-hashing-encoder"
    }
}
