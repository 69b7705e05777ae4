//! Record catalog: movie titles and storylines aligned with the vector store.
//!
//! The catalog is position-addressed. Record `i` pairs with vector `i`
//! in the store, and that pairing is the only join between the two, so
//! the catalog preserves input order exactly and never drops or
//! reorders rows.
//!
//! Two CSV schemas pass through here: the raw scraper output consumed
//! by the build pipeline (flexible headers, possibly missing fields)
//! and the canonical `records.csv` artifact written next to the vector
//! file (fixed headers, one row per vector).

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Canonical artifact headers, in column order.
const CSV_HEADERS: [&str; 3] = ["title", "storyline", "cleaned_storyline"];

/// Placeholder the scraper writes when no storyline was found.
const PLACEHOLDER_STORYLINE: &str = "N/A";

/// Errors from catalog reading and writing.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// One input row from the scraped dataset, after placeholder cleanup.
///
/// A missing or "N/A" storyline becomes an empty string; the row is
/// kept so ordinals still cover the whole input.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub title: String,
    pub storyline: String,
}

/// Deserialization shape for raw input rows.
///
/// Scraper versions disagree on header spelling, so the common
/// variants are accepted as aliases.
#[derive(Debug, Deserialize)]
struct RawRow {
    #[serde(alias = "Title", alias = "Movie Name", alias = "movie_name")]
    title: String,
    #[serde(default, alias = "Storyline", alias = "Description")]
    storyline: Option<String>,
}

/// Reads raw scraper output for the build pipeline.
///
/// Every input row yields a record, in file order. Titles and
/// storylines are trimmed; storylines that are missing, empty, or the
/// "N/A" placeholder come back as empty strings.
pub fn read_raw_records(path: &Path) -> Result<Vec<RawRecord>, CatalogError> {
    let mut reader = csv::Reader::from_path(path)?;

    let mut records = Vec::new();
    for row in reader.deserialize::<RawRow>() {
        let row = row?;
        let storyline = row
            .storyline
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty() && s != PLACEHOLDER_STORYLINE)
            .unwrap_or_default();

        records.push(RawRecord {
            title: row.title.trim().to_string(),
            storyline,
        });
    }
    Ok(records)
}

/// One fully-prepared record in the catalog artifact.
///
/// `cleaned_storyline` is the normalized text that was actually
/// embedded. It is persisted alongside the raw storyline so a serving
/// process can show what a vector represents without re-running the
/// normalizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovieRecord {
    pub title: String,
    pub storyline: String,
    pub cleaned_storyline: String,
}

/// Ordered collection of movie records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    records: Vec<MovieRecord>,
}

impl Catalog {
    /// Creates a catalog from prepared records, preserving their order.
    #[must_use]
    pub fn new(records: Vec<MovieRecord>) -> Self {
        Self { records }
    }

    /// Returns the record at the given ordinal, if any.
    #[must_use]
    pub fn get(&self, ordinal: usize) -> Option<&MovieRecord> {
        self.records.get(ordinal)
    }

    /// Returns the number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if the catalog holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterates over records in ordinal order.
    pub fn iter(&self) -> std::slice::Iter<'_, MovieRecord> {
        self.records.iter()
    }

    /// Writes the catalog as the canonical `records.csv` artifact.
    ///
    /// Headers are written explicitly so an empty catalog still
    /// produces a well-formed file.
    pub fn save(&self, path: &Path) -> Result<(), CatalogError> {
        let mut writer = csv::WriterBuilder::new().has_headers(false).from_path(path)?;
        writer.write_record(CSV_HEADERS)?;
        for record in &self.records {
            writer.serialize(record)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Loads a catalog written by [`Catalog::save`].
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let mut reader = csv::Reader::from_path(path)?;

        let mut records = Vec::new();
        for row in reader.deserialize::<MovieRecord>() {
            records.push(row?);
        }
        Ok(Self { records })
    }
}

impl From<Vec<MovieRecord>> for Catalog {
    fn from(records: Vec<MovieRecord>) -> Self {
        Self::new(records)
    }
}
