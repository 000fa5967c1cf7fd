//! Tool configuration for the `argspec` binary.
//!
//! Loaded from a YAML file, `.argspec.yml` in the working directory by
//! default. Command-line flags override every value here.
//!
//! # Example YAML
//!
//! ```yaml
//! version: "1.0"
//! schemas:
//!   - schemas/
//!   - extra/dl_manager.yaml
//! output: json
//! batch:
//!   jobs: 8
//! ```

use std::fmt;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::source::SchemaSources;

/// Default config file names, tried in order by [`ToolConfig::discover`].
pub const CONFIG_FILE_NAMES: [&str; 2] = [".argspec.yml", ".argspec.yaml"];

/// Serialization format for machine-readable output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Json,
    Yaml,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json => f.write_str("json"),
            Self::Yaml => f.write_str("yaml"),
        }
    }
}

/// Settings for `parse-batch`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Number of worker threads.
    pub jobs: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self { jobs: 4 }
    }
}

/// Top-level tool configuration.
///
/// # Examples
///
/// ```
/// use argspec_db::{OutputFormat, ToolConfig};
///
/// let config: ToolConfig = serde_yaml::from_str("schemas: [schemas/]\noutput: yaml\n").unwrap();
/// assert_eq!(config.output, OutputFormat::Yaml);
/// assert_eq!(config.batch.jobs, 4);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolConfig {
    /// Configuration format version (e.g., `"1.0"`).
    #[serde(default = "default_version")]
    pub version: String,
    /// Schema files and directories, relative to the config file.
    #[serde(default)]
    pub schemas: Vec<PathBuf>,
    #[serde(default)]
    pub output: OutputFormat,
    #[serde(default)]
    pub batch: BatchConfig,
}

fn default_version() -> String {
    "1.0".to_string()
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            schemas: Vec::new(),
            output: OutputFormat::default(),
            batch: BatchConfig::default(),
        }
    }
}

impl ToolConfig {
    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`Io`](crate::StoreError::Io) if the file cannot be read, or
    /// [`Yaml`](crate::StoreError::Yaml) if parsing fails.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);
        let config = serde_yaml::from_reader(reader)?;
        Ok(config)
    }

    /// Saves the configuration as YAML.
    ///
    /// # Errors
    ///
    /// Returns [`Io`](crate::StoreError::Io) if the file cannot be written,
    /// or [`Yaml`](crate::StoreError::Yaml) if serialization fails.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = BufWriter::new(file);
        serde_yaml::to_writer(writer, self)?;
        Ok(())
    }

    /// Loads the first default config file found in `dir`.
    ///
    /// Returns the config and its path, or `None` when no file exists.
    pub fn discover(dir: impl AsRef<Path>) -> Result<Option<(Self, PathBuf)>> {
        for name in CONFIG_FILE_NAMES {
            let path = dir.as_ref().join(name);
            if path.is_file() {
                let config = Self::load(&path)?;
                return Ok(Some((config, path)));
            }
        }
        Ok(None)
    }

    /// Schema sources with relative paths resolved against `base`.
    pub fn schema_sources(&self, base: &Path) -> SchemaSources {
        SchemaSources::from_paths(self.schemas.iter().map(|path| {
            if path.is_absolute() {
                path.clone()
            } else {
                base.join(path)
            }
        }))
    }
}
