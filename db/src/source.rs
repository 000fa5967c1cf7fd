//! Schema sources: JSON/YAML files and directories of schema fragments.
//!
//! Sources are read in the order they were added. A directory contributes
//! every `.json`, `.yaml` and `.yml` file directly inside it, in file-name
//! order. All decoded documents are merged into one description before
//! validation, so top-level command names must be unique across sources.
//!
//! # Example
//!
//! ```no_run
//! use argspec_db::SchemaSources;
//!
//! let loaded = SchemaSources::new()
//!     .with_dir("schemas/")
//!     .with_file("extra.yaml")
//!     .load()
//!     .unwrap();
//! println!("{} commands, fingerprint {}", loaded.model.command_count(), loaded.fingerprint);
//! ```

use std::path::{Path, PathBuf};

use argspec_core::{SchemaDescription, SchemaModel};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::error::{Result, StoreError};

const EXTENSIONS: [&str; 3] = ["json", "yaml", "yml"];

/// One configured schema location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaSource {
    /// A single schema document.
    File(PathBuf),
    /// A directory of schema documents.
    Directory(PathBuf),
}

impl SchemaSource {
    /// Classifies `path` by what currently exists on disk.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        if path.is_dir() {
            Self::Directory(path)
        } else {
            Self::File(path)
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            Self::File(path) | Self::Directory(path) => path,
        }
    }
}

/// Raw bytes of one schema document.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    pub bytes: Vec<u8>,
}

/// A validated model together with the fingerprint of the bytes it came
/// from.
#[derive(Debug, Clone)]
pub struct LoadedSchema {
    pub model: SchemaModel,
    pub fingerprint: String,
    pub files: Vec<PathBuf>,
}

/// Ordered list of schema sources.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaSources {
    sources: Vec<SchemaSource>,
}

impl SchemaSources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds sources from paths, classifying each as a file or directory.
    pub fn from_paths<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            sources: paths.into_iter().map(SchemaSource::from_path).collect(),
        }
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.sources.push(SchemaSource::File(path.into()));
        self
    }

    pub fn with_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.sources.push(SchemaSource::Directory(path.into()));
        self
    }

    pub fn sources(&self) -> &[SchemaSource] {
        &self.sources
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Reads every schema document, expanding directories.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NoSources`] if no document is found,
    /// [`StoreError::UnsupportedFormat`] for an explicitly listed file with
    /// an unknown extension, or [`StoreError::Io`] if reading fails.
    pub fn read(&self) -> Result<Vec<SourceFile>> {
        let mut paths = Vec::new();
        for source in &self.sources {
            match source {
                SchemaSource::File(path) => {
                    if !is_supported(path) {
                        return Err(StoreError::UnsupportedFormat(path.clone()));
                    }
                    paths.push(path.clone());
                }
                SchemaSource::Directory(path) => paths.extend(collect_schema_paths(path)?),
            }
        }
        if paths.is_empty() {
            return Err(StoreError::NoSources);
        }

        paths
            .into_iter()
            .map(|path| {
                let bytes = std::fs::read(&path)?;
                debug!(path = %path.display(), bytes = bytes.len(), "read schema source");
                Ok::<_, StoreError>(SourceFile { path, bytes })
            })
            .collect()
    }

    /// Reads, merges and validates every source.
    ///
    /// # Errors
    ///
    /// Any error of [`read`](Self::read) or [`build_model`].
    pub fn load(&self) -> Result<LoadedSchema> {
        let files = self.read()?;
        let fingerprint = fingerprint(&files);
        let model = build_model(&files)?;
        info!(
            files = files.len(),
            commands = model.command_count(),
            fingerprint = %fingerprint,
            "loaded schema"
        );
        Ok(LoadedSchema {
            model,
            fingerprint,
            files: files.into_iter().map(|file| file.path).collect(),
        })
    }
}

/// SHA-256 over each document's path and bytes, in source order.
///
/// The path is part of the digest because an unnamed schema takes its name
/// from the first file's stem.
///
/// # Examples
///
/// ```
/// use argspec_db::{SourceFile, fingerprint};
///
/// let a = SourceFile { path: "a.json".into(), bytes: b"{}".to_vec() };
/// let b = SourceFile { path: "b.json".into(), bytes: b"{}".to_vec() };
/// assert_ne!(fingerprint(&[a.clone()]), fingerprint(&[b]));
/// assert_ne!(fingerprint(&[a.clone()]), fingerprint(&[a.clone(), a.clone()]));
/// assert_eq!(fingerprint(&[a.clone()]), fingerprint(&[a]));
/// ```
pub fn fingerprint(files: &[SourceFile]) -> String {
    let mut hasher = Sha256::new();
    for file in files {
        let path = file.path.to_string_lossy();
        hasher.update((path.len() as u64).to_le_bytes());
        hasher.update(path.as_bytes());
        hasher.update((file.bytes.len() as u64).to_le_bytes());
        hasher.update(&file.bytes);
    }
    format!("{:x}", hasher.finalize())
}

/// Decodes and merges documents into one validated model.
///
/// The first non-empty `name` wins; when every document omits it, the
/// first file's stem is used.
///
/// # Errors
///
/// Returns [`StoreError::Json`] or [`StoreError::Yaml`] for undecodable
/// documents and [`StoreError::Schema`] for validation failures.
pub fn build_model(files: &[SourceFile]) -> Result<SchemaModel> {
    let mut merged = SchemaDescription::default();
    for file in files {
        merged.merge(decode(file)?);
    }
    if merged.name.is_empty() {
        if let Some(stem) = files
            .first()
            .and_then(|file| file.path.file_stem())
            .and_then(|stem| stem.to_str())
        {
            merged.name = stem.to_string();
        }
    }
    Ok(SchemaModel::load(merged)?)
}

/// Decodes one document according to its extension.
pub fn decode(file: &SourceFile) -> Result<SchemaDescription> {
    match extension(&file.path) {
        Some("json") => Ok(serde_json::from_slice(&file.bytes)?),
        Some("yaml" | "yml") => Ok(serde_yaml::from_slice(&file.bytes)?),
        _ => Err(StoreError::UnsupportedFormat(file.path.clone())),
    }
}

/// Reads and decodes a single schema document.
///
/// # Errors
///
/// Returns [`StoreError::Io`] if the file cannot be read, otherwise any
/// error of [`decode`].
pub fn load_description(path: impl AsRef<Path>) -> Result<SchemaDescription> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;
    decode(&SourceFile {
        path: path.to_path_buf(),
        bytes,
    })
}

/// Lists schema documents directly inside `dir`, sorted by file name.
///
/// Hidden files such as `.argspec.yml` are skipped.
pub fn collect_schema_paths(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        let path = entry.path();
        if path.is_file() && is_supported(&path) {
            paths.push(path);
        }
    }
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(paths)
}

fn extension(path: &Path) -> Option<&str> {
    path.extension().and_then(|ext| ext.to_str())
}

fn is_supported(path: &Path) -> bool {
    extension(path).is_some_and(|ext| EXTENSIONS.contains(&ext))
}
