//! Flat vector storage with checksummed on-disk persistence.
//!
//! This module holds the embedding matrix behind the recommendation
//! engine: one unit-length row per catalog record, in record order.
//! Row order is the only link between a vector and its record, so the
//! store never reorders or drops rows.
//!
//! # Storage Format
//!
//! The on-disk format is a simple binary layout optimized for a single
//! sequential read at startup:
//! - Header (24 bytes): magic, version, dimension, vector count, CRC32
//! - Vectors: Contiguous f32 arrays in little-endian format
//!
//! The CRC32 covers the header fields; the trailing data is validated
//! by its exact expected length. A file that fails any of these checks
//! is rejected instead of being partially loaded.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use memmap2::MmapOptions;
use thiserror::Error;

use crate::vector::types::{VectorDimension, VectorError};

/// Current storage format version.
const STORAGE_VERSION: u32 = 1;

/// Size of the storage header in bytes.
const HEADER_SIZE: usize = 24;

/// Magic bytes identifying vector storage files.
const MAGIC_BYTES: &[u8; 4] = b"SMV1";

/// Number of header bytes covered by the checksum (everything before it).
const CHECKSUM_RANGE: usize = 20;

/// Number of bytes per f32 value.
const BYTES_PER_F32: usize = 4;

/// Norms below this threshold are treated as zero during normalization.
pub const NORM_EPSILON: f32 = 1e-12;

/// Errors specific to vector storage operations.
#[derive(Error, Debug)]
pub enum VectorStoreError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid storage format: {0}")]
    InvalidFormat(String),

    #[error("Storage checksum mismatch: stored {stored:#010x}, computed {computed:#010x}")]
    ChecksumMismatch { stored: u32, computed: u32 },

    #[error("Invalid storage version: expected {expected}, got {actual}")]
    VersionMismatch { expected: u32, actual: u32 },

    #[error("Vector error: {0}")]
    Vector(#[from] VectorError),
}

/// Returns the L2 norm of a vector.
#[must_use]
pub fn l2_norm(vector: &[f32]) -> f32 {
    vector.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Scales a vector to unit L2 norm in place.
///
/// Vectors with norm below [`NORM_EPSILON`] are left unchanged so a
/// degenerate embedding keeps its row instead of turning into NaN.
pub fn l2_normalize(vector: &mut [f32]) {
    let norm = l2_norm(vector);
    if norm > NORM_EPSILON {
        for value in vector.iter_mut() {
            *value /= norm;
        }
    }
}

/// In-memory store of unit-length embedding vectors, aligned by ordinal.
///
/// Vector `i` belongs to catalog record `i`. All vectors share one
/// dimension, fixed at construction. Inserted vectors are normalized to
/// unit length, which makes inner product equal to cosine similarity.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorStore {
    dimension: VectorDimension,
    data: Vec<f32>,
}

impl VectorStore {
    /// Creates an empty store for vectors of the given dimension.
    #[must_use]
    pub fn new(dimension: VectorDimension) -> Self {
        Self {
            dimension,
            data: Vec::new(),
        }
    }

    /// Builds a store from a batch of embeddings.
    ///
    /// The dimension is taken from the first embedding; every later one
    /// must match it. Fails on an empty batch since no dimension can be
    /// inferred.
    pub fn from_embeddings(embeddings: &[Vec<f32>]) -> Result<Self, VectorError> {
        let first = embeddings.first().ok_or(VectorError::InvalidDimension {
            dimension: 0,
            reason: "Cannot infer dimension from an empty embedding batch",
        })?;
        let dimension = VectorDimension::new(first.len())?;

        let mut store = Self::new(dimension);
        for embedding in embeddings {
            store.push(embedding)?;
        }
        Ok(store)
    }

    /// Appends a vector, normalizing it to unit length.
    ///
    /// Returns `DimensionMismatch` if the vector's length differs from
    /// the store dimension.
    pub fn push(&mut self, vector: &[f32]) -> Result<(), VectorError> {
        self.dimension.validate_vector(vector)?;
        let start = self.data.len();
        self.data.extend_from_slice(vector);
        l2_normalize(&mut self.data[start..]);
        Ok(())
    }

    /// Returns the vector stored at the given ordinal.
    pub fn get(&self, ordinal: usize) -> Result<&[f32], VectorError> {
        let len = self.len();
        if ordinal >= len {
            return Err(VectorError::OrdinalOutOfRange { ordinal, len });
        }
        let dim = self.dimension.get();
        let start = ordinal * dim;
        Ok(&self.data[start..start + dim])
    }

    /// Returns the number of vectors stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len() / self.dimension.get()
    }

    /// Returns true if the store holds no vectors.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the vector dimension.
    #[must_use]
    pub fn dimension(&self) -> VectorDimension {
        self.dimension
    }

    /// Iterates over the stored vectors in ordinal order.
    pub fn iter(&self) -> std::slice::ChunksExact<'_, f32> {
        self.data.chunks_exact(self.dimension.get())
    }

    /// Writes the store to disk in the binary storage format.
    ///
    /// The write is flushed and synced before returning; callers that
    /// need crash-safe publication should write to a scratch location
    /// and rename into place.
    pub fn save(&self, path: &Path) -> Result<(), VectorStoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        writer.write_all(&self.header_bytes())?;
        for value in &self.data {
            writer.write_all(&value.to_le_bytes())?;
        }

        let file = writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
        Ok(())
    }

    /// Loads a store from disk, validating the full format.
    ///
    /// Rejects files with bad magic bytes, an unexpected version, a
    /// header checksum mismatch, or a byte length that disagrees with
    /// the declared vector count.
    pub fn load(path: &Path) -> Result<Self, VectorStoreError> {
        let file = File::open(path)?;

        // A zero-length file cannot be mapped on all platforms; check
        // the size up front so the error stays a format error.
        let file_len = file.metadata()?.len();
        if file_len < HEADER_SIZE as u64 {
            return Err(VectorStoreError::InvalidFormat(
                "File too small to contain header".to_string(),
            ));
        }

        let mmap = unsafe { MmapOptions::new().map(&file)? };
        let (dimension, vector_count) = Self::read_header(&mmap)?;

        let expected_len = vector_count
            .checked_mul(dimension.get())
            .and_then(|n| n.checked_mul(BYTES_PER_F32))
            .and_then(|n| n.checked_add(HEADER_SIZE))
            .ok_or_else(|| {
                VectorStoreError::InvalidFormat(
                    "Declared vector count overflows file size".to_string(),
                )
            })?;
        if mmap.len() != expected_len {
            return Err(VectorStoreError::InvalidFormat(format!(
                "Expected {expected_len} bytes for {vector_count} vectors, found {}",
                mmap.len()
            )));
        }

        let mut data = Vec::with_capacity(vector_count * dimension.get());
        for chunk in mmap[HEADER_SIZE..].chunks_exact(BYTES_PER_F32) {
            data.push(f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
        }

        Ok(Self { dimension, data })
    }

    fn header_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut header = [0u8; HEADER_SIZE];
        header[0..4].copy_from_slice(MAGIC_BYTES);
        header[4..8].copy_from_slice(&STORAGE_VERSION.to_le_bytes());
        header[8..12].copy_from_slice(&(self.dimension.get() as u32).to_le_bytes());
        header[12..20].copy_from_slice(&(self.len() as u64).to_le_bytes());

        let checksum = crc32fast::hash(&header[0..CHECKSUM_RANGE]);
        header[20..24].copy_from_slice(&checksum.to_le_bytes());
        header
    }

    fn read_header(bytes: &[u8]) -> Result<(VectorDimension, usize), VectorStoreError> {
        if bytes.len() < HEADER_SIZE {
            return Err(VectorStoreError::InvalidFormat(
                "File too small to contain header".to_string(),
            ));
        }

        if &bytes[0..4] != MAGIC_BYTES {
            return Err(VectorStoreError::InvalidFormat(
                "Invalid magic bytes".to_string(),
            ));
        }

        let version = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        if version != STORAGE_VERSION {
            return Err(VectorStoreError::VersionMismatch {
                expected: STORAGE_VERSION,
                actual: version,
            });
        }

        let stored = u32::from_le_bytes([bytes[20], bytes[21], bytes[22], bytes[23]]);
        let computed = crc32fast::hash(&bytes[0..CHECKSUM_RANGE]);
        if stored != computed {
            return Err(VectorStoreError::ChecksumMismatch { stored, computed });
        }

        let dim_value = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
        let dimension = VectorDimension::new(dim_value as usize)?;

        let raw_count = u64::from_le_bytes([
            bytes[12], bytes[13], bytes[14], bytes[15], bytes[16], bytes[17], bytes[18], bytes[19],
        ]);
        let vector_count = usize::try_from(raw_count).map_err(|_| {
            VectorStoreError::InvalidFormat("Vector count exceeds addressable memory".to_string())
        })?;

        Ok((dimension, vector_count))
    }
}
