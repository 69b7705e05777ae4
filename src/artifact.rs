//! Artifact set persistence: the files a build publishes and a server loads.
//!
//! A build produces exactly three co-located files in an artifact
//! directory:
//! - `vectors.bin` - the unit-length embedding matrix, in record order
//! - `records.csv` - the record catalog, one row per vector
//! - `meta.json` - build provenance: model, dimension, normalizer policy
//!
//! The three files are only meaningful together. Loading validates
//! their mutual consistency (counts, dimensions, format versions) and
//! rejects the whole set on any disagreement, so a serving process can
//! never observe a half-valid mix.
//!
//! The similarity index is not persisted; it is derived from the vector
//! file at load time, which keeps the on-disk contract small and makes
//! a stale-index state impossible.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

use crate::catalog::{Catalog, CatalogError};
use crate::error::{EngineError, EngineResult};
use crate::normalize::{Normalizer, NormalizerPolicy};
use crate::vector::{FlatIndex, VectorStore, VectorStoreError};

/// File name of the vector artifact inside an artifact directory.
pub const VECTORS_FILE: &str = "vectors.bin";

/// File name of the record catalog artifact.
pub const RECORDS_FILE: &str = "records.csv";

/// File name of the metadata artifact.
pub const META_FILE: &str = "meta.json";

/// Metadata describing how an artifact set was built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    /// Name of the embedding model used
    pub model_name: String,

    /// Dimension of embeddings
    pub dimension: usize,

    /// Number of records (and vectors) stored
    pub record_count: usize,

    /// Normalization policy applied to storylines before embedding
    pub normalizer: NormalizerPolicy,

    /// Fingerprint of the normalizer policy and stopword list
    pub normalizer_fingerprint: String,

    /// Unix timestamp when the build ran
    pub created_at: u64,

    /// Version of the metadata format
    pub version: u32,
}

impl ArtifactMetadata {
    /// Current metadata format version
    pub const CURRENT_VERSION: u32 = 1;

    /// Create new metadata with the current timestamp
    pub fn new(
        model_name: String,
        dimension: usize,
        record_count: usize,
        normalizer: NormalizerPolicy,
    ) -> Self {
        Self {
            model_name,
            dimension,
            record_count,
            normalizer_fingerprint: normalizer.fingerprint(),
            normalizer,
            created_at: Utc::now().timestamp() as u64,
            version: Self::CURRENT_VERSION,
        }
    }

    /// Save metadata as JSON inside an artifact directory
    pub fn save(&self, dir: &Path) -> EngineResult<()> {
        let path = dir.join(META_FILE);

        let json = serde_json::to_string_pretty(self)
            .map_err(|e| EngineError::General(format!("Failed to serialize metadata: {e}")))?;

        std::fs::write(&path, json).map_err(|source| EngineError::FileWrite { path, source })?;
        Ok(())
    }

    /// Load metadata from an artifact directory
    pub fn load(dir: &Path) -> EngineResult<Self> {
        let path = dir.join(META_FILE);

        let json = std::fs::read_to_string(&path).map_err(|source| EngineError::FileRead {
            path: path.clone(),
            source,
        })?;

        let metadata: Self = serde_json::from_str(&json).map_err(|e| {
            EngineError::CorruptArtifact {
                reason: format!("Failed to parse metadata: {e}"),
            }
        })?;

        // Check version compatibility
        if metadata.version > Self::CURRENT_VERSION {
            return Err(EngineError::CorruptArtifact {
                reason: format!(
                    "Metadata version {} is newer than supported version {}",
                    metadata.version,
                    Self::CURRENT_VERSION
                ),
            });
        }

        Ok(metadata)
    }

    /// Check if a metadata file exists in the directory
    pub fn exists(dir: &Path) -> bool {
        dir.join(META_FILE).exists()
    }
}

/// A loaded, validated artifact set ready to serve queries.
///
/// Queries always see one `ArtifactSet` wholesale; reloading swaps in
/// a complete new set, never a partial mix of files from two builds.
#[derive(Debug)]
pub struct ArtifactSet {
    pub metadata: ArtifactMetadata,
    pub catalog: Catalog,
    pub store: Arc<VectorStore>,
    pub index: FlatIndex,
    /// Normalizer reconstructed from the recorded policy, so queries
    /// against this set are cleaned exactly like its storylines were.
    pub normalizer: Normalizer,
}

impl ArtifactSet {
    /// Assembles a set from freshly built parts, without touching disk.
    ///
    /// Runs the same consistency checks as [`ArtifactSet::load`] so an
    /// in-process build cannot produce a set a later load would reject.
    pub fn from_parts(
        metadata: ArtifactMetadata,
        catalog: Catalog,
        store: VectorStore,
    ) -> EngineResult<Self> {
        if store.len() != catalog.len() {
            return Err(EngineError::CorruptArtifact {
                reason: format!(
                    "Vector store holds {} vectors but catalog holds {} records",
                    store.len(),
                    catalog.len()
                ),
            });
        }
        if metadata.record_count != catalog.len() {
            return Err(EngineError::CorruptArtifact {
                reason: format!(
                    "Metadata declares {} records but catalog holds {}",
                    metadata.record_count,
                    catalog.len()
                ),
            });
        }
        if metadata.dimension != store.dimension().get() {
            return Err(EngineError::CorruptArtifact {
                reason: format!(
                    "Metadata declares dimension {} but vector store has {}",
                    metadata.dimension,
                    store.dimension().get()
                ),
            });
        }

        let store = Arc::new(store);
        let index = FlatIndex::build(Arc::clone(&store));
        let normalizer = Normalizer::new(metadata.normalizer.clone());
        Ok(Self {
            metadata,
            catalog,
            store,
            index,
            normalizer,
        })
    }

    /// Loads and validates the three artifacts from a directory.
    ///
    /// Fails with `MissingArtifact` if any file is absent and
    /// `CorruptArtifact` if any file fails its format checks or the
    /// files disagree with each other.
    pub fn load(dir: &Path) -> EngineResult<Self> {
        for name in [VECTORS_FILE, RECORDS_FILE, META_FILE] {
            let path = dir.join(name);
            if !path.exists() {
                return Err(EngineError::MissingArtifact { path });
            }
        }

        let metadata = ArtifactMetadata::load(dir)?;

        let vectors_path = dir.join(VECTORS_FILE);
        let store = VectorStore::load(&vectors_path).map_err(|e| match e {
            VectorStoreError::Io(source) => EngineError::FileRead {
                path: vectors_path.clone(),
                source,
            },
            other => EngineError::CorruptArtifact {
                reason: other.to_string(),
            },
        })?;

        let records_path = dir.join(RECORDS_FILE);
        let catalog = Catalog::load(&records_path).map_err(|e| match e {
            CatalogError::Io(source) => EngineError::FileRead {
                path: records_path.clone(),
                source,
            },
            CatalogError::Csv(e) => EngineError::CorruptArtifact {
                reason: format!("Failed to parse record catalog: {e}"),
            },
        })?;

        Self::from_parts(metadata, catalog, store)
    }

    /// Writes all three artifact files into a directory.
    ///
    /// Writes in place; the build pipeline stages into a scratch
    /// directory and renames it for atomic publication.
    pub fn save(&self, dir: &Path) -> EngineResult<()> {
        std::fs::create_dir_all(dir).map_err(|source| EngineError::FileWrite {
            path: dir.to_path_buf(),
            source,
        })?;

        let vectors_path = dir.join(VECTORS_FILE);
        self.store.save(&vectors_path).map_err(|e| match e {
            VectorStoreError::Io(source) => EngineError::FileWrite {
                path: vectors_path.clone(),
                source,
            },
            other => EngineError::General(other.to_string()),
        })?;

        let records_path = dir.join(RECORDS_FILE);
        self.catalog.save(&records_path).map_err(|e| match e {
            CatalogError::Io(source) => EngineError::FileWrite {
                path: records_path.clone(),
                source,
            },
            CatalogError::Csv(e) => {
                EngineError::General(format!("Failed to write record catalog: {e}"))
            }
        })?;

        self.metadata.save(dir)?;
        Ok(())
    }

    /// Returns the number of records (and vectors) in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.catalog.len()
    }

    /// Returns true if the set holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.catalog.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::MovieRecord;
    use crate::vector::VectorDimension;
    use tempfile::TempDir;

    fn sample_set(record_count: usize, dim: usize) -> ArtifactSet {
        let mut store = VectorStore::new(VectorDimension::new(dim).unwrap());
        let mut records = Vec::new();
        for i in 0..record_count {
            let mut v = vec![0.0; dim];
            v[i % dim] = 1.0;
            store.push(&v).unwrap();
            records.push(MovieRecord {
                title: format!("Movie {i}"),
                storyline: format!("Storyline number {i}."),
                cleaned_storyline: format!("storyline number {i}"),
            });
        }

        let metadata = ArtifactMetadata::new(
            "mock-model".to_string(),
            dim,
            record_count,
            NormalizerPolicy::default(),
        );
        ArtifactSet::from_parts(metadata, Catalog::new(records), store).unwrap()
    }

    #[test]
    fn test_metadata_save_and_load() {
        let temp_dir = TempDir::new().unwrap();

        let metadata = ArtifactMetadata::new(
            "all-MiniLM-L6-v2".to_string(),
            384,
            1000,
            NormalizerPolicy::default(),
        );
        metadata.save(temp_dir.path()).unwrap();

        let loaded = ArtifactMetadata::load(temp_dir.path()).unwrap();
        assert_eq!(loaded.model_name, metadata.model_name);
        assert_eq!(loaded.dimension, metadata.dimension);
        assert_eq!(loaded.record_count, metadata.record_count);
        assert_eq!(loaded.normalizer, metadata.normalizer);
        assert_eq!(loaded.normalizer_fingerprint, metadata.normalizer_fingerprint);
        assert_eq!(loaded.version, ArtifactMetadata::CURRENT_VERSION);
    }

    #[test]
    fn test_metadata_exists() {
        let temp_dir = TempDir::new().unwrap();
        assert!(!ArtifactMetadata::exists(temp_dir.path()));

        let metadata =
            ArtifactMetadata::new("m".to_string(), 8, 0, NormalizerPolicy::default());
        metadata.save(temp_dir.path()).unwrap();
        assert!(ArtifactMetadata::exists(temp_dir.path()));
    }

    #[test]
    fn test_metadata_future_version_rejected() {
        let temp_dir = TempDir::new().unwrap();

        let future_metadata = r#"{
            "model_name": "future-model",
            "dimension": 512,
            "record_count": 0,
            "normalizer": {
                "lowercase": true,
                "strip_digits": true,
                "strip_punctuation": true,
                "remove_stopwords": true
            },
            "normalizer_fingerprint": "abc",
            "created_at": 1735689600,
            "version": 999
        }"#;
        std::fs::write(temp_dir.path().join(META_FILE), future_metadata).unwrap();

        let err = ArtifactMetadata::load(temp_dir.path()).unwrap_err();
        assert!(matches!(err, EngineError::CorruptArtifact { .. }));
        assert!(err.to_string().contains("version"));
    }

    #[test]
    fn test_artifact_set_round_trip() {
        let temp_dir = TempDir::new().unwrap();

        let set = sample_set(5, 4);
        set.save(temp_dir.path()).unwrap();

        let loaded = ArtifactSet::load(temp_dir.path()).unwrap();
        assert_eq!(loaded.len(), 5);
        assert_eq!(loaded.catalog, set.catalog);
        assert_eq!(*loaded.store, *set.store);
        assert_eq!(loaded.metadata.dimension, 4);
        assert_eq!(loaded.index.len(), 5);
    }

    #[test]
    fn test_load_missing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let err = ArtifactSet::load(&temp_dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, EngineError::MissingArtifact { .. }));
    }

    #[test]
    fn test_load_names_the_missing_file() {
        let temp_dir = TempDir::new().unwrap();

        let set = sample_set(2, 4);
        set.save(temp_dir.path()).unwrap();
        std::fs::remove_file(temp_dir.path().join(RECORDS_FILE)).unwrap();

        let err = ArtifactSet::load(temp_dir.path()).unwrap_err();
        match err {
            EngineError::MissingArtifact { path } => {
                assert!(path.ends_with(RECORDS_FILE));
            }
            other => panic!("Expected MissingArtifact, got {other:?}"),
        }
    }

    #[test]
    fn test_load_rejects_count_mismatch() {
        let temp_dir = TempDir::new().unwrap();

        let set = sample_set(2, 4);
        set.save(temp_dir.path()).unwrap();

        // Append a record the vector file knows nothing about.
        let records_path = temp_dir.path().join(RECORDS_FILE);
        let mut csv = std::fs::read_to_string(&records_path).unwrap();
        csv.push_str("Phantom Row,An extra record.,extra record\n");
        std::fs::write(&records_path, csv).unwrap();

        let err = ArtifactSet::load(temp_dir.path()).unwrap_err();
        assert!(matches!(err, EngineError::CorruptArtifact { .. }));
    }

    #[test]
    fn test_load_rejects_metadata_dimension_mismatch() {
        let temp_dir = TempDir::new().unwrap();

        let set = sample_set(2, 4);
        set.save(temp_dir.path()).unwrap();

        let meta_path = temp_dir.path().join(META_FILE);
        let json = std::fs::read_to_string(&meta_path).unwrap();
        std::fs::write(&meta_path, json.replace("\"dimension\": 4", "\"dimension\": 8")).unwrap();

        let err = ArtifactSet::load(temp_dir.path()).unwrap_err();
        assert!(matches!(err, EngineError::CorruptArtifact { .. }));
    }

    #[test]
    fn test_from_parts_rejects_misaligned_lengths() {
        let mut store = VectorStore::new(VectorDimension::new(4).unwrap());
        store.push(&[1.0, 0.0, 0.0, 0.0]).unwrap();

        let metadata =
            ArtifactMetadata::new("m".to_string(), 4, 0, NormalizerPolicy::default());
        let err = ArtifactSet::from_parts(metadata, Catalog::default(), store).unwrap_err();
        assert!(matches!(err, EngineError::CorruptArtifact { .. }));
    }

    #[test]
    fn test_empty_set_round_trip() {
        let temp_dir = TempDir::new().unwrap();

        let set = sample_set(0, 4);
        set.save(temp_dir.path()).unwrap();

        let loaded = ArtifactSet::load(temp_dir.path()).unwrap();
        assert!(loaded.is_empty());
        assert_eq!(loaded.index.len(), 0);
    }
}
