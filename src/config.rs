//! Configuration module for the recommendation engine.
//!
//! This module provides a layered configuration system that supports:
//! - Default values
//! - TOML configuration file
//! - Environment variable overrides
//! - CLI argument overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `SM_` and use double underscores
//! to separate nested levels:
//! - `SM_EMBEDDING__MODEL=all-MiniLM-L6-v2` sets `embedding.model`
//! - `SM_EMBEDDING__BATCH_SIZE=128` sets `embedding.batch_size`
//! - `SM_SEARCH__DEFAULT_TOP_N=10` sets `search.default_top_n`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::embedding::DEFAULT_MODEL;
use crate::normalize::NormalizerPolicy;
use crate::pipeline::DEFAULT_BATCH_SIZE;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Directory the published artifact set lives in
    #[serde(default = "default_artifacts_dir")]
    pub artifacts_dir: PathBuf,

    /// Workspace root directory (where .storymatch is located)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_root: Option<PathBuf>,

    /// Global debug mode
    #[serde(default = "default_false")]
    pub debug: bool,

    /// Embedding backend settings
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Storyline normalization policy, recorded into built artifacts
    #[serde(default)]
    pub normalizer: NormalizerPolicy,

    /// Query-time search settings
    #[serde(default)]
    pub search: SearchConfig,

    /// Build pipeline settings
    #[serde(default)]
    pub build: BuildConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EmbeddingConfig {
    /// Model to use for embeddings
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Storylines encoded per backend call
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Directory model files are downloaded into
    #[serde(default = "default_model_cache_dir")]
    pub cache_dir: PathBuf,

    /// Show a progress bar while the model downloads
    #[serde(default = "default_true")]
    pub show_download_progress: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SearchConfig {
    /// Results returned when the caller does not ask for a count
    #[serde(default = "default_top_n")]
    pub default_top_n: usize,

    /// Upper bound on results a single query may request
    #[serde(default = "default_max_top_n")]
    pub max_top_n: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BuildConfig {
    /// Number of parallel threads for normalization
    #[serde(default = "default_parallel_threads")]
    pub parallel_threads: usize,
}

// Default value functions
fn default_version() -> u32 {
    1
}
fn default_artifacts_dir() -> PathBuf {
    PathBuf::from(".storymatch/artifacts")
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_embedding_model() -> String {
    DEFAULT_MODEL.to_string()
}
fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}
fn default_model_cache_dir() -> PathBuf {
    PathBuf::from(".storymatch/models")
}
fn default_top_n() -> usize {
    5
}
fn default_max_top_n() -> usize {
    20
}
fn default_parallel_threads() -> usize {
    num_cpus::get()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            artifacts_dir: default_artifacts_dir(),
            workspace_root: None,
            debug: false,
            embedding: EmbeddingConfig::default(),
            normalizer: NormalizerPolicy::default(),
            search: SearchConfig::default(),
            build: BuildConfig::default(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            batch_size: default_batch_size(),
            cache_dir: default_model_cache_dir(),
            show_download_progress: true,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_top_n: default_top_n(),
            max_top_n: default_max_top_n(),
        }
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            parallel_threads: default_parallel_threads(),
        }
    }
}

impl Settings {
    /// Load configuration from all sources
    pub fn load() -> Result<Self, Box<figment::Error>> {
        // Try to find the workspace root by looking for .storymatch directory
        let config_path = Self::find_workspace_config()
            .unwrap_or_else(|| PathBuf::from(".storymatch/settings.toml"));

        Figment::new()
            // Start with defaults
            .merge(Serialized::defaults(Settings::default()))
            // Layer in config file if it exists
            .merge(Toml::file(config_path))
            // Layer in environment variables with SM_ prefix
            // Use double underscore (__) to separate nested levels
            // Single underscore (_) remains as is within field names
            .merge(Env::prefixed("SM_").map(|key| {
                key.as_str()
                    .to_lowercase()
                    .replace("__", ".") // Double underscore becomes dot
                    .into()
            }))
            // Extract into Settings struct
            .extract()
            .map_err(Box::new)
            .map(|mut settings: Settings| {
                // If workspace_root is not set in config, detect it
                if settings.workspace_root.is_none() {
                    settings.workspace_root = Self::workspace_root();
                }
                settings
            })
    }

    /// Find the workspace root by looking for .storymatch directory
    /// Searches from current directory up to root
    fn find_workspace_config() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;

        for ancestor in current.ancestors() {
            let config_dir = ancestor.join(".storymatch");
            if config_dir.exists() && config_dir.is_dir() {
                return Some(config_dir.join("settings.toml"));
            }
        }

        None
    }

    /// Check if configuration is properly initialized
    pub fn check_init() -> Result<(), String> {
        // Try to find workspace config
        let config_path = if let Some(path) = Self::find_workspace_config() {
            path
        } else {
            // No workspace found, check current directory
            PathBuf::from(".storymatch/settings.toml")
        };

        // Check if settings.toml exists
        if !config_path.exists() {
            return Err("No configuration file found".to_string());
        }

        // Try to parse the config file to check if it's valid
        match std::fs::read_to_string(&config_path) {
            Ok(content) => {
                if let Err(e) = toml::from_str::<Settings>(&content) {
                    return Err(format!(
                        "Configuration file is corrupted: {e}\nRun 'storymatch init --force' to regenerate."
                    ));
                }
            }
            Err(e) => {
                return Err(format!("Cannot read configuration file: {e}"));
            }
        }

        Ok(())
    }

    /// Get the workspace root directory (where .storymatch is located)
    pub fn workspace_root() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;

        for ancestor in current.ancestors() {
            let config_dir = ancestor.join(".storymatch");
            if config_dir.exists() && config_dir.is_dir() {
                return Some(ancestor.to_path_buf());
            }
        }

        None
    }

    /// Resolve a possibly-relative configured path against the workspace root.
    pub fn resolve_path(&self, path: &std::path::Path) -> PathBuf {
        if path.is_absolute() {
            return path.to_path_buf();
        }
        match &self.workspace_root {
            Some(root) => root.join(path),
            None => path.to_path_buf(),
        }
    }

    /// Artifact directory with the workspace root applied.
    pub fn resolved_artifacts_dir(&self) -> PathBuf {
        self.resolve_path(&self.artifacts_dir)
    }

    /// Model cache directory with the workspace root applied.
    pub fn resolved_model_cache_dir(&self) -> PathBuf {
        self.resolve_path(&self.embedding.cache_dir)
    }

    /// Load configuration from a specific file
    pub fn load_from(path: impl AsRef<std::path::Path>) -> Result<Self, Box<figment::Error>> {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("SM_").split("_"))
            .extract()
            .map_err(Box::new)
    }

    /// Save current configuration to file
    pub fn save(
        &self,
        path: impl AsRef<std::path::Path>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let parent = path.as_ref().parent().ok_or("Invalid path")?;
        std::fs::create_dir_all(parent)?;

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;

        Ok(())
    }

    /// Create a default settings file with helpful comments
    pub fn init_config_file(force: bool) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let config_path = PathBuf::from(".storymatch/settings.toml");

        if !force && config_path.exists() {
            return Err("Configuration file already exists. Use --force to overwrite".into());
        }

        // Create parent directory if needed
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // Create a well-documented settings.toml template
        let current_dir = std::env::current_dir().unwrap_or_default();
        let template = format!(
            r#"# Storymatch Configuration File

# Version of the configuration schema
version = 1

# Directory the published artifact set lives in (relative to workspace root)
artifacts_dir = ".storymatch/artifacts"

# Workspace root directory (automatically detected)
workspace_root = "{}"

# Global debug mode
debug = false

[embedding]
# Model to use for embeddings
model = "{}"

# Storylines encoded per backend call
batch_size = {}

# Directory model files are downloaded into
cache_dir = ".storymatch/models"

# Show a progress bar while the model downloads
show_download_progress = true

[normalizer]
# Storyline cleaning steps, applied in this order.
# Changing any of these requires a rebuild: query text is cleaned with
# the policy recorded in the artifacts, not this file.
lowercase = true
strip_digits = true
strip_punctuation = true
remove_stopwords = true

[search]
# Results returned when no count is requested
default_top_n = 5

# Upper bound on results a single query may request
max_top_n = 20

[build]
# Number of parallel threads for normalization (defaults to CPU count)
# parallel_threads = {}
"#,
            current_dir.display(),
            DEFAULT_MODEL,
            DEFAULT_BATCH_SIZE,
            num_cpus::get()
        );

        std::fs::write(&config_path, template)?;

        if force {
            println!("Overwrote configuration at: {}", config_path.display());
        } else {
            println!(
                "Created default configuration at: {}",
                config_path.display()
            );
        }

        Ok(config_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.version, 1);
        assert_eq!(settings.artifacts_dir, PathBuf::from(".storymatch/artifacts"));
        assert_eq!(settings.embedding.model, "all-MiniLM-L6-v2");
        assert_eq!(settings.embedding.batch_size, 64);
        assert_eq!(settings.search.default_top_n, 5);
        assert!(settings.build.parallel_threads > 0);
        assert!(settings.normalizer.remove_stopwords);
    }

    #[test]
    fn test_load_from_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("settings.toml");

        let toml_content = r#"
version = 2
artifacts_dir = "data/artifacts"

[embedding]
model = "bge-small-en-v1.5"
batch_size = 128

[search]
default_top_n = 10
"#;

        fs::write(&config_path, toml_content).unwrap();

        let settings = Settings::load_from(&config_path).unwrap();
        assert_eq!(settings.version, 2);
        assert_eq!(settings.artifacts_dir, PathBuf::from("data/artifacts"));
        assert_eq!(settings.embedding.model, "bge-small-en-v1.5");
        assert_eq!(settings.embedding.batch_size, 128);
        assert_eq!(settings.search.default_top_n, 10);
        // Untouched sections keep their defaults
        assert_eq!(settings.search.max_top_n, 20);
    }

    #[test]
    fn test_save_settings() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("settings.toml");

        let mut settings = Settings::default();
        settings.embedding.batch_size = 32;
        settings.debug = true;

        settings.save(&config_path).unwrap();

        let loaded = Settings::load_from(&config_path).unwrap();
        assert_eq!(loaded.embedding.batch_size, 32);
        assert!(loaded.debug);
    }

    #[test]
    fn test_partial_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("settings.toml");

        // Only specify a few settings
        let toml_content = r#"
[normalizer]
strip_digits = false

[build]
parallel_threads = 16
"#;

        fs::write(&config_path, toml_content).unwrap();

        let settings = Settings::load_from(&config_path).unwrap();

        // Modified values
        assert!(!settings.normalizer.strip_digits);
        assert_eq!(settings.build.parallel_threads, 16);

        // Default values should still be present
        assert_eq!(settings.version, 1);
        assert!(settings.normalizer.lowercase);
        assert_eq!(settings.embedding.model, "all-MiniLM-L6-v2");
    }

    #[test]
    fn test_layered_config() {
        let temp_dir = TempDir::new().unwrap();
        let original_dir = std::env::current_dir().unwrap();
        std::env::set_current_dir(&temp_dir).unwrap();

        // Create config directory
        let config_dir = temp_dir.path().join(".storymatch");
        fs::create_dir_all(&config_dir).unwrap();

        // Create a config file
        let toml_content = r#"
[embedding]
batch_size = 16

[search]
max_top_n = 50
"#;
        fs::write(config_dir.join("settings.toml"), toml_content).unwrap();

        // Set environment variables that should override config file
        unsafe {
            std::env::set_var("SM_EMBEDDING__BATCH_SIZE", "256");
            std::env::set_var("SM_DEBUG", "true");
        }

        let settings = Settings::load().unwrap();

        // Environment variable should override config file
        assert_eq!(settings.embedding.batch_size, 256);
        // Config file value should be used when no env var
        assert_eq!(settings.search.max_top_n, 50);
        // Env var adds new value not in config
        assert!(settings.debug);

        // Clean up
        unsafe {
            std::env::remove_var("SM_EMBEDDING__BATCH_SIZE");
            std::env::remove_var("SM_DEBUG");
        }
        std::env::set_current_dir(original_dir).unwrap();
    }

    #[test]
    fn test_resolve_paths_against_workspace_root() {
        let mut settings = Settings::default();
        settings.workspace_root = Some(PathBuf::from("/work/movies"));

        assert_eq!(
            settings.resolved_artifacts_dir(),
            PathBuf::from("/work/movies/.storymatch/artifacts")
        );
        assert_eq!(
            settings.resolved_model_cache_dir(),
            PathBuf::from("/work/movies/.storymatch/models")
        );

        // Absolute paths pass through untouched.
        settings.artifacts_dir = PathBuf::from("/var/lib/storymatch");
        assert_eq!(
            settings.resolved_artifacts_dir(),
            PathBuf::from("/var/lib/storymatch")
        );
    }
}
