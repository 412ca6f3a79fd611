//! Service configuration.
//!
//! Settings resolve in three layers: built-in defaults, an optional JSON
//! overlay file, then `RAGLOOM_*` environment variables. A `.env` file is
//! honored before the environment is read.

use std::path::{Path, PathBuf};

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config file {path}")]
    #[diagnostic(
        code(ragloom::config::read),
        help("Check that the file exists and is readable.")
    )]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}")]
    #[diagnostic(code(ragloom::config::parse))]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("environment variable {key} has invalid value '{value}'")]
    #[diagnostic(
        code(ragloom::config::env),
        help("Unset the variable or give it a value of the expected type.")
    )]
    Env { key: &'static str, value: String },

    #[error("invalid configuration: {reason}")]
    #[diagnostic(code(ragloom::config::invalid))]
    Invalid { reason: String },
}

/// Runtime settings for every ragloom service component.
///
/// ```
/// use ragloom::config::ServiceConfig;
///
/// let config = ServiceConfig::default();
/// assert_eq!(config.default_top_k, 5);
/// assert_eq!(config.chunk_size, 1000);
/// config.validate().unwrap();
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Completion model name passed to the LLM backend.
    pub completion_model: String,
    /// Embedding model name passed to the embedding backend.
    pub embedding_model: String,
    /// Vector width produced by the embedding model.
    pub embedding_dimensions: usize,
    /// SQLite database holding chunks and their vectors.
    pub index_db_path: PathBuf,
    /// SQLite database holding chat sessions and turns.
    pub history_db_path: PathBuf,
    /// Reserved index namespace for semantic conversation memory.
    pub memory_namespace: String,
    /// Default chunk count per retrieval query.
    pub default_top_k: usize,
    /// Session groups fetched per history lookup.
    pub history_window: usize,
    /// Most recent session groups kept when formatting a transcript.
    pub history_format_cap: usize,
    /// Memory entries recalled per question.
    pub memory_recall_k: usize,
    /// Chunk window size in characters.
    pub chunk_size: usize,
    /// Overlap between consecutive chunks in characters.
    pub chunk_overlap: usize,
    /// Leading chunks sampled per namespace for summaries.
    pub summary_sample_size: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            completion_model: "gemma3:270m".to_string(),
            embedding_model: "all-minilm".to_string(),
            embedding_dimensions: 384,
            index_db_path: PathBuf::from("ragloom_index.sqlite"),
            history_db_path: PathBuf::from("ragloom_history.sqlite"),
            memory_namespace: "conversation-memory".to_string(),
            default_top_k: 5,
            history_window: 3,
            history_format_cap: 5,
            memory_recall_k: 3,
            chunk_size: 1000,
            chunk_overlap: 200,
            summary_sample_size: 10,
        }
    }
}

impl ServiceConfig {
    /// Load configuration from defaults plus the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let mut config = Self::default();
        config.apply_env_pairs(std::env::vars())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON overlay file, then the environment.
    ///
    /// Fields absent from the file keep their defaults; environment
    /// variables win over both.
    pub fn load_with_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: Self =
            serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.apply_env_pairs(std::env::vars())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `RAGLOOM_*` overrides from an arbitrary variable source.
    ///
    /// Split out from [`load`](Self::load) so tests can feed variables
    /// without mutating the process environment.
    pub fn apply_env_pairs(
        &mut self,
        vars: impl IntoIterator<Item = (String, String)>,
    ) -> Result<(), ConfigError> {
        for (key, value) in vars {
            match key.as_str() {
                "RAGLOOM_COMPLETION_MODEL" => self.completion_model = value,
                "RAGLOOM_EMBEDDING_MODEL" => self.embedding_model = value,
                "RAGLOOM_EMBEDDING_DIMENSIONS" => {
                    self.embedding_dimensions =
                        parse_env("RAGLOOM_EMBEDDING_DIMENSIONS", &value)?;
                }
                "RAGLOOM_INDEX_DB" => self.index_db_path = PathBuf::from(value),
                "RAGLOOM_HISTORY_DB" => self.history_db_path = PathBuf::from(value),
                "RAGLOOM_MEMORY_NAMESPACE" => self.memory_namespace = value,
                "RAGLOOM_TOP_K" => {
                    self.default_top_k = parse_env("RAGLOOM_TOP_K", &value)?;
                }
                "RAGLOOM_HISTORY_WINDOW" => {
                    self.history_window = parse_env("RAGLOOM_HISTORY_WINDOW", &value)?;
                }
                "RAGLOOM_MEMORY_RECALL_K" => {
                    self.memory_recall_k = parse_env("RAGLOOM_MEMORY_RECALL_K", &value)?;
                }
                "RAGLOOM_CHUNK_SIZE" => {
                    self.chunk_size = parse_env("RAGLOOM_CHUNK_SIZE", &value)?;
                }
                "RAGLOOM_CHUNK_OVERLAP" => {
                    self.chunk_overlap = parse_env("RAGLOOM_CHUNK_OVERLAP", &value)?;
                }
                "RAGLOOM_SUMMARY_SAMPLE" => {
                    self.summary_sample_size = parse_env("RAGLOOM_SUMMARY_SAMPLE", &value)?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Reject settings that would misbehave at runtime.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.embedding_dimensions == 0 {
            return Err(ConfigError::Invalid {
                reason: "embedding_dimensions must be nonzero".to_string(),
            });
        }
        if self.default_top_k == 0 {
            return Err(ConfigError::Invalid {
                reason: "default_top_k must be nonzero".to_string(),
            });
        }
        if self.chunk_size == 0 {
            return Err(ConfigError::Invalid {
                reason: "chunk_size must be nonzero".to_string(),
            });
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(ConfigError::Invalid {
                reason: format!(
                    "chunk_overlap ({}) must be smaller than chunk_size ({})",
                    self.chunk_overlap, self.chunk_size
                ),
            });
        }
        if self.memory_namespace.is_empty() {
            return Err(ConfigError::Invalid {
                reason: "memory_namespace must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

fn parse_env(key: &'static str, value: &str) -> Result<usize, ConfigError> {
    value.parse().map_err(|_| ConfigError::Env {
        key,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        ServiceConfig::default().validate().unwrap();
    }

    #[test]
    fn env_pairs_override_defaults() {
        let mut config = ServiceConfig::default();
        config
            .apply_env_pairs(vec![
                ("RAGLOOM_TOP_K".to_string(), "8".to_string()),
                ("RAGLOOM_COMPLETION_MODEL".to_string(), "gemma3".to_string()),
                ("UNRELATED".to_string(), "ignored".to_string()),
            ])
            .unwrap();
        assert_eq!(config.default_top_k, 8);
        assert_eq!(config.completion_model, "gemma3");
        assert_eq!(config.chunk_size, 1000, "untouched fields keep defaults");
    }

    #[test]
    fn invalid_env_value_is_rejected() {
        let mut config = ServiceConfig::default();
        let err = config
            .apply_env_pairs(vec![(
                "RAGLOOM_CHUNK_SIZE".to_string(),
                "not-a-number".to_string(),
            )])
            .unwrap_err();
        assert!(matches!(err, ConfigError::Env { key, .. } if key == "RAGLOOM_CHUNK_SIZE"));
    }

    #[test]
    fn overlap_must_stay_below_chunk_size() {
        let config = ServiceConfig {
            chunk_size: 100,
            chunk_overlap: 100,
            ..ServiceConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn json_overlay_round_trips() {
        let overlay = r#"{"default_top_k": 7, "embedding_dimensions": 768}"#;
        let config: ServiceConfig = serde_json::from_str(overlay).unwrap();
        assert_eq!(config.default_top_k, 7);
        assert_eq!(config.embedding_dimensions, 768);
        assert_eq!(config.chunk_overlap, 200, "unset fields fall back to defaults");
    }
}
