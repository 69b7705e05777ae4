//! Shared helpers for integration tests.

use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use storymatch::embedding::{EncodeError, TextEncoder};
use storymatch::normalize::Normalizer;
use storymatch::pipeline::{BuildOptions, BuildPipeline};
use storymatch::vector::{VectorDimension, l2_normalize};

/// Deterministic encoder for tests: hashes each whitespace token into a
/// bucket and normalizes the result. Shared vocabulary produces positive
/// similarity, identical texts produce identical vectors, and nothing is
/// downloaded.
pub struct StubEncoder {
    dimension: VectorDimension,
}

impl StubEncoder {
    pub fn new(dim: usize) -> Self {
        Self {
            dimension: VectorDimension::new(dim).expect("test dimension"),
        }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
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

        l2_normalize(&mut vector);
        vector
    }
}

impl TextEncoder for StubEncoder {
    fn encode_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EncodeError> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }

    fn dimension(&self) -> VectorDimension {
        self.dimension
    }

    fn model_id(&self) -> &str {
        "stub-hashing-encoder"
    }
}

/// Write a catalog CSV with canonical headers into `dir`.
pub fn write_catalog(dir: &Path, rows: &[(&str, &str)]) -> PathBuf {
    let path = dir.join("movies.csv");
    let mut contents = String::from("title,storyline\n");
    for (title, storyline) in rows {
        contents.push_str(&format!("{title},{storyline}\n"));
    }
    fs::write(&path, contents).expect("Failed to write catalog CSV");
    path
}

/// Build and publish an artifact set from `rows` into `out_dir`,
/// returning the encoder it was built with.
pub fn build_artifacts(
    dir: &Path,
    rows: &[(&str, &str)],
    out_dir: &Path,
    dim: usize,
) -> Arc<StubEncoder> {
    let encoder = Arc::new(StubEncoder::new(dim));
    let input = write_catalog(dir, rows);
    let pipeline = BuildPipeline::new(
        encoder.clone(),
        Normalizer::default(),
        BuildOptions::default(),
    )
    .expect("Failed to create pipeline");
    pipeline.run(&input, out_dir).expect("Build failed");
    encoder
}
