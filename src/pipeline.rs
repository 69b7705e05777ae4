//! Offline build pipeline: raw catalog CSV in, artifact set out.
//!
//! Stages run strictly in order: ingest, normalize, encode, assemble,
//! publish. The publish step is atomic at the directory level — the
//! whole set is written into a staging directory next to the target
//! and swapped in with renames, so a reader never observes vectors
//! from one build next to records from another. A build that fails in
//! any earlier stage leaves the previously published set untouched.
//!
//! Ordinal alignment is preserved end to end: record `i` of the input
//! CSV becomes row `i` of the catalog and vector `i` of the store.

use indicatif::ProgressBar;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::artifact::{ArtifactMetadata, ArtifactSet};
use crate::catalog::{Catalog, CatalogError, MovieRecord, read_raw_records};
use crate::display::create_progress_bar;
use crate::embedding::TextEncoder;
use crate::error::{EngineError, EngineResult};
use crate::normalize::Normalizer;
use crate::vector::VectorStore;

/// Storylines per embedding call. Larger batches amortize model
/// overhead; this matches the window the backend tokenizes comfortably.
pub const DEFAULT_BATCH_SIZE: usize = 64;

/// Knobs for a single build run.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Storylines encoded per backend call.
    pub batch_size: usize,
    /// Render a progress bar while encoding.
    pub show_progress: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            show_progress: false,
        }
    }
}

/// Summary of a completed build.
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    pub record_count: usize,
    pub dimension: usize,
    pub model_name: String,
    pub output_dir: PathBuf,
    pub elapsed: Duration,
}

/// Builds a publishable artifact set from a raw catalog.
pub struct BuildPipeline {
    encoder: Arc<dyn TextEncoder>,
    normalizer: Normalizer,
    options: BuildOptions,
}

impl std::fmt::Debug for BuildPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildPipeline")
            .field("encoder", &self.encoder.model_id())
            .field("normalizer", &self.normalizer)
            .field("options", &self.options)
            .finish()
    }
}

impl BuildPipeline {
    pub fn new(
        encoder: Arc<dyn TextEncoder>,
        normalizer: Normalizer,
        options: BuildOptions,
    ) -> EngineResult<Self> {
        if options.batch_size == 0 {
            return Err(EngineError::InvalidArgument {
                reason: "Batch size must be at least 1".to_string(),
            });
        }
        Ok(Self {
            encoder,
            normalizer,
            options,
        })
    }

    /// Runs every stage and publishes the result into `output_dir`.
    pub fn run(&self, input_csv: &Path, output_dir: &Path) -> EngineResult<BuildOutcome> {
        let started = Instant::now();

        let raw = read_raw_records(input_csv).map_err(|e| match e {
            CatalogError::Io(source) => EngineError::FileRead {
                path: input_csv.to_path_buf(),
                source,
            },
            CatalogError::Csv(e) => EngineError::BuildFailed {
                stage: "ingest".to_string(),
                cause: e.to_string(),
            },
        })?;
        info!(records = raw.len(), input = %input_csv.display(), "Ingested raw catalog");

        // Normalization is pure per record, so fan it out. Collecting an
        // indexed parallel iterator keeps input order, which is what ties
        // catalog rows to vector ordinals.
        let records: Vec<MovieRecord> = raw
            .into_par_iter()
            .map(|r| {
                let cleaned = self.normalizer.normalize(&r.storyline);
                MovieRecord {
                    title: r.title,
                    storyline: r.storyline,
                    cleaned_storyline: cleaned,
                }
            })
            .collect();
        let emptied = records
            .iter()
            .filter(|r| r.cleaned_storyline.is_empty())
            .count();
        if emptied > 0 {
            warn!(
                records = emptied,
                "Storylines normalized to empty text; their vectors will be zero"
            );
        }

        let store = self.encode_all(&records)?;
        info!(
            vectors = store.len(),
            dimension = store.dimension().get(),
            "Encoded storylines"
        );

        let metadata = ArtifactMetadata::new(
            self.encoder.model_id().to_string(),
            self.encoder.dimension().get(),
            records.len(),
            self.normalizer.policy().clone(),
        );
        let artifacts = ArtifactSet::from_parts(metadata, Catalog::new(records), store)?;

        self.publish(&artifacts, output_dir)?;
        info!(output = %output_dir.display(), "Published artifact set");

        Ok(BuildOutcome {
            record_count: artifacts.len(),
            dimension: artifacts.store.dimension().get(),
            model_name: artifacts.metadata.model_name.clone(),
            output_dir: output_dir.to_path_buf(),
            elapsed: started.elapsed(),
        })
    }

    /// Encodes every cleaned storyline, in catalog order, batch by batch.
    fn encode_all(&self, records: &[MovieRecord]) -> EngineResult<VectorStore> {
        let texts: Vec<String> = records
            .iter()
            .map(|r| r.cleaned_storyline.clone())
            .collect();

        let mut store = VectorStore::new(self.encoder.dimension());
        let progress = if self.options.show_progress && !texts.is_empty() {
            create_progress_bar(texts.len() as u64, "Embedding storylines")
        } else {
            ProgressBar::hidden()
        };

        for chunk in texts.chunks(self.options.batch_size) {
            let embeddings =
                self.encoder
                    .encode_batch(chunk)
                    .map_err(|e| EngineError::BuildFailed {
                        stage: "encode".to_string(),
                        cause: e.to_string(),
                    })?;
            for embedding in &embeddings {
                store.push(embedding)?;
            }
            progress.inc(chunk.len() as u64);
        }
        progress.finish_and_clear();

        Ok(store)
    }

    /// Writes the set into a staging directory beside `output_dir`, then
    /// swaps it into place with renames.
    fn publish(&self, artifacts: &ArtifactSet, output_dir: &Path) -> EngineResult<()> {
        let Some(dir_name) = output_dir.file_name() else {
            return Err(EngineError::InvalidArgument {
                reason: format!(
                    "Output path '{}' must name a directory",
                    output_dir.display()
                ),
            });
        };
        let parent = match output_dir.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent).map_err(|e| EngineError::FileWrite {
            path: parent.clone(),
            source: e,
        })?;

        let staging = tempfile::Builder::new()
            .prefix(".storymatch-build-")
            .tempdir_in(&parent)
            .map_err(|e| EngineError::FileWrite {
                path: parent.clone(),
                source: e,
            })?;
        // Any error up to here drops `staging` and removes the partial
        // output with it.
        artifacts.save(staging.path())?;

        let mut stale_name = dir_name.to_os_string();
        stale_name.push(".stale");
        let stale = output_dir.with_file_name(stale_name);

        let staged = staging.keep();
        if let Err(e) = swap_into_place(&staged, output_dir, &stale) {
            let _ = fs::remove_dir_all(&staged);
            return Err(e);
        }
        Ok(())
    }
}

/// Moves `staged` to `output_dir`, parking any existing set at `stale`
/// first. Rolls the old set back if the final rename fails.
fn swap_into_place(staged: &Path, output_dir: &Path, stale: &Path) -> EngineResult<()> {
    if stale.exists() {
        // Leftover from an interrupted publish.
        fs::remove_dir_all(stale).map_err(|e| EngineError::FileWrite {
            path: stale.to_path_buf(),
            source: e,
        })?;
    }

    let had_previous = output_dir.exists();
    if had_previous {
        fs::rename(output_dir, stale).map_err(|e| EngineError::FileWrite {
            path: output_dir.to_path_buf(),
            source: e,
        })?;
    }

    if let Err(e) = fs::rename(staged, output_dir) {
        if had_previous {
            let _ = fs::rename(stale, output_dir);
        }
        return Err(EngineError::FileWrite {
            path: output_dir.to_path_buf(),
            source: e,
        });
    }

    if had_previous {
        let _ = fs::remove_dir_all(stale);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::MockTextEncoder;
    use crate::vector::VectorDimension;
    use tempfile::TempDir;

    fn mock_pipeline(options: BuildOptions) -> BuildPipeline {
        let encoder = Arc::new(MockTextEncoder::new(VectorDimension::new(32).unwrap()));
        BuildPipeline::new(encoder, Normalizer::default(), options).unwrap()
    }

    fn write_catalog(dir: &Path, rows: &[(&str, &str)]) -> PathBuf {
        let path = dir.join("movies.csv");
        let mut contents = String::from("title,storyline\n");
        for (title, storyline) in rows {
            contents.push_str(&format!("{title},{storyline}\n"));
        }
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_build_produces_loadable_artifacts() {
        let temp_dir = TempDir::new().unwrap();
        let input = write_catalog(
            temp_dir.path(),
            &[
                ("Ghost Harbor", "A lighthouse keeper hears the voices of the drowned"),
                ("Iron Orchard", "Two rival farmers fight over a fallen meteorite"),
            ],
        );
        let out = temp_dir.path().join("artifacts");

        let pipeline = mock_pipeline(BuildOptions::default());
        let outcome = pipeline.run(&input, &out).unwrap();

        assert_eq!(outcome.record_count, 2);
        assert_eq!(outcome.dimension, 32);
        assert_eq!(outcome.model_name, "mock-hashing-encoder");
        assert_eq!(outcome.output_dir, out);

        let set = ArtifactSet::load(&out).unwrap();
        assert_eq!(set.len(), 2);
        let record = set.catalog.get(0).unwrap();
        assert_eq!(record.title, "Ghost Harbor");
        // Normalized text: lowercased, stopwords gone.
        assert_eq!(
            record.cleaned_storyline,
            "lighthouse keeper hears voices drowned"
        );
    }

    #[test]
    fn test_rebuild_replaces_existing_set_atomically() {
        let temp_dir = TempDir::new().unwrap();
        let out = temp_dir.path().join("artifacts");
        let pipeline = mock_pipeline(BuildOptions::default());

        let first = write_catalog(temp_dir.path(), &[("Solo", "one lonely story")]);
        pipeline.run(&first, &out).unwrap();
        assert_eq!(ArtifactSet::load(&out).unwrap().len(), 1);

        let second = write_catalog(
            temp_dir.path(),
            &[
                ("A", "space pirates steal a moon"),
                ("B", "a detective loses his memory"),
                ("C", "a chef opens a haunted restaurant"),
            ],
        );
        pipeline.run(&second, &out).unwrap();
        assert_eq!(ArtifactSet::load(&out).unwrap().len(), 3);

        // No staging or parked directories left behind.
        let leftovers: Vec<String> = fs::read_dir(temp_dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| name != "artifacts" && name != "movies.csv")
            .collect();
        assert!(leftovers.is_empty(), "unexpected leftovers: {leftovers:?}");
    }

    #[test]
    fn test_rebuild_from_same_input_is_byte_identical() {
        let temp_dir = TempDir::new().unwrap();
        let input = write_catalog(
            temp_dir.path(),
            &[
                ("A", "a knight guards a sleeping dragon"),
                ("B", "an accountant audits a castle"),
            ],
        );
        let out_a = temp_dir.path().join("first");
        let out_b = temp_dir.path().join("second");

        let pipeline = mock_pipeline(BuildOptions::default());
        pipeline.run(&input, &out_a).unwrap();
        pipeline.run(&input, &out_b).unwrap();

        let vectors_a = fs::read(out_a.join("vectors.bin")).unwrap();
        let vectors_b = fs::read(out_b.join("vectors.bin")).unwrap();
        assert_eq!(vectors_a, vectors_b);

        let records_a = fs::read(out_a.join("records.csv")).unwrap();
        let records_b = fs::read(out_b.join("records.csv")).unwrap();
        assert_eq!(records_a, records_b);
    }

    #[test]
    fn test_empty_catalog_builds_empty_set() {
        let temp_dir = TempDir::new().unwrap();
        let input = write_catalog(temp_dir.path(), &[]);
        let out = temp_dir.path().join("artifacts");

        let outcome = mock_pipeline(BuildOptions::default())
            .run(&input, &out)
            .unwrap();
        assert_eq!(outcome.record_count, 0);

        let set = ArtifactSet::load(&out).unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn test_missing_input_fails_and_leaves_no_output() {
        let temp_dir = TempDir::new().unwrap();
        let out = temp_dir.path().join("artifacts");

        let err = mock_pipeline(BuildOptions::default())
            .run(&temp_dir.path().join("nope.csv"), &out)
            .unwrap_err();
        assert!(matches!(err, EngineError::FileRead { .. }));
        assert!(!out.exists());
    }

    #[test]
    fn test_noise_only_storyline_keeps_its_ordinal() {
        let temp_dir = TempDir::new().unwrap();
        let input = write_catalog(
            temp_dir.path(),
            &[
                ("Numbers", "12345 67890 !!!"),
                ("Words", "a real storyline about sailors"),
            ],
        );
        let out = temp_dir.path().join("artifacts");

        mock_pipeline(BuildOptions::default()).run(&input, &out).unwrap();
        let set = ArtifactSet::load(&out).unwrap();

        // Cleans to nothing, embeds to the zero vector, stays in place.
        assert_eq!(set.catalog.get(0).unwrap().cleaned_storyline, "");
        let vector = set.store.get(0).unwrap();
        assert!(vector.iter().all(|v| *v == 0.0));
        assert_eq!(set.catalog.get(1).unwrap().title, "Words");
    }

    #[test]
    fn test_small_batches_match_one_big_batch() {
        let temp_dir = TempDir::new().unwrap();
        let rows: Vec<(String, String)> = (0..7)
            .map(|i| (format!("Movie {i}"), format!("storyline number {i} about ships")))
            .collect();
        let borrowed: Vec<(&str, &str)> = rows
            .iter()
            .map(|(t, s)| (t.as_str(), s.as_str()))
            .collect();
        let input = write_catalog(temp_dir.path(), &borrowed);

        let out_small = temp_dir.path().join("small");
        let out_big = temp_dir.path().join("big");
        mock_pipeline(BuildOptions {
            batch_size: 2,
            show_progress: false,
        })
        .run(&input, &out_small)
        .unwrap();
        mock_pipeline(BuildOptions::default())
            .run(&input, &out_big)
            .unwrap();

        assert_eq!(
            fs::read(out_small.join("vectors.bin")).unwrap(),
            fs::read(out_big.join("vectors.bin")).unwrap()
        );
    }

    #[test]
    fn test_zero_batch_size_is_rejected() {
        let encoder = Arc::new(MockTextEncoder::new(VectorDimension::new(32).unwrap()));
        let err = BuildPipeline::new(
            encoder,
            Normalizer::default(),
            BuildOptions {
                batch_size: 0,
                show_progress: false,
            },
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::InvalidArgument { .. }));
    }
}
