/// The main library module for storymatch
pub mod artifact;
pub mod catalog;
pub mod config;
pub mod display;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod io;
pub mod normalize;
pub mod pipeline;
pub mod vector;

// Explicit exports for better API clarity
pub use artifact::{ArtifactMetadata, ArtifactSet};
pub use catalog::{Catalog, MovieRecord, RawRecord};
pub use config::Settings;
pub use embedding::{DEFAULT_MODEL, EncodeError, FastEmbedEncoder, TextEncoder};
pub use engine::{Recommendation, Recommender};
pub use error::{EngineError, EngineResult};
pub use normalize::{Normalizer, NormalizerPolicy};
pub use pipeline::{BuildOptions, BuildOutcome, BuildPipeline};
pub use vector::{FlatIndex, Score, SearchHit, VectorDimension, VectorStore};
