//! Store configuration (`gitdoc.toml`).
//!
//! Missing file → all defaults. Unknown keys are rejected so typos surface
//! instead of silently falling back to a default.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::engine::DEFAULT_MAX_REF_RETRIES;
use crate::identity::DEFAULT_SHORT_ID_LEN;

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "gitdoc.toml";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GitdocConfig {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub commit: CommitConfig,

    #[serde(default)]
    pub engine: EngineConfig,
}

/// Where documents are written.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// Path of the git repository (default: `"."`).
    #[serde(default = "default_repo")]
    pub repo: PathBuf,

    /// Branch writes are proposed against (default: `"main"`).
    #[serde(default = "default_branch")]
    pub branch: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            repo: default_repo(),
            branch: default_branch(),
        }
    }
}

fn default_repo() -> PathBuf {
    PathBuf::from(".")
}

fn default_branch() -> String {
    "main".to_owned()
}

/// Commit message settings.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommitConfig {
    /// Trailing id characters shown in commit messages.
    #[serde(default = "default_short_id_len")]
    pub short_id_len: usize,
}

impl Default for CommitConfig {
    fn default() -> Self {
        Self {
            short_id_len: default_short_id_len(),
        }
    }
}

const fn default_short_id_len() -> usize {
    DEFAULT_SHORT_ID_LEN
}

/// Git merge engine settings.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// How often a proposal is replayed after the branch moved under it.
    #[serde(default = "default_max_ref_retries")]
    pub max_ref_retries: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_ref_retries: default_max_ref_retries(),
        }
    }
}

const fn default_max_ref_retries() -> u32 {
    DEFAULT_MAX_REF_RETRIES
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Error loading a configuration file.
#[derive(Debug)]
pub struct ConfigError {
    /// The path that was being loaded (if available).
    pub path: Option<PathBuf>,
    /// Human-readable message with line-level detail when possible.
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(p) = &self.path {
            write!(f, "{}: {}", p.display(), self.message)
        } else {
            write!(f, "config error: {}", self.message)
        }
    }
}

impl std::error::Error for ConfigError {}

impl GitdocConfig {
    /// Load configuration from a TOML file; a missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(ConfigError {
                    path: Some(path.to_owned()),
                    message: format!("could not read file: {e}"),
                });
            }
        };
        Self::parse(&contents).map_err(|mut e| {
            e.path = Some(path.to_owned());
            e
        })
    }

    /// Parse configuration from a TOML string.
    pub fn parse(toml_str: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml_str).map_err(|e| {
            let mut message = e.message().to_owned();
            if let Some(span) = e.span() {
                let line = toml_str[..span.start]
                    .chars()
                    .filter(|&c| c == '\n')
                    .count()
                    + 1;
                message = format!("line {line}: {message}");
            }
            ConfigError {
                path: None,
                message,
            }
        })
    }
}
