//! Reloadable resolved-schema snapshots.
//!
//! A [`SchemaStore`] resolves its sources once and hands out the current
//! [`Snapshot`] as an `Arc`. Invocations parse against whichever snapshot
//! they obtained; [`SchemaStore::reload`] builds a replacement off to the
//! side and swaps it in only when it resolved successfully.

use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};

use argspec_core::{ResolvedSchema, resolve};
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::source::{SchemaSources, build_model, fingerprint};

/// One immutable resolved schema and where it came from.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub schema: Arc<ResolvedSchema>,
    /// SHA-256 of the source bytes.
    pub fingerprint: String,
    pub loaded_at: DateTime<Utc>,
    pub files: Vec<PathBuf>,
}

impl Snapshot {
    /// Loads and resolves `sources` into a new snapshot.
    pub fn load(sources: &SchemaSources) -> Result<Self> {
        let loaded = sources.load()?;
        let schema = resolve(&loaded.model)?;
        Ok(Self {
            schema: Arc::new(schema),
            fingerprint: loaded.fingerprint,
            loaded_at: Utc::now(),
            files: loaded.files,
        })
    }
}

/// Result of [`SchemaStore::reload`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadOutcome {
    /// The sources are byte-identical to the current snapshot's.
    Unchanged,
    /// A new snapshot replaced the previous one.
    Swapped { fingerprint: String },
}

/// Shared holder of the current snapshot.
///
/// # Examples
///
/// ```no_run
/// use argspec_db::{ReloadOutcome, SchemaSources, SchemaStore};
///
/// let store = SchemaStore::open(SchemaSources::new().with_dir("schemas/")).unwrap();
/// let snapshot = store.current();
/// println!("{} commands", snapshot.schema.len());
///
/// // Later, after the files changed on disk
/// match store.reload() {
///     Ok(ReloadOutcome::Swapped { fingerprint }) => println!("now at {fingerprint}"),
///     Ok(ReloadOutcome::Unchanged) => {}
///     Err(err) => eprintln!("kept previous schema: {err}"),
/// }
/// ```
#[derive(Debug)]
pub struct SchemaStore {
    sources: SchemaSources,
    current: RwLock<Arc<Snapshot>>,
}

impl SchemaStore {
    /// Loads the initial snapshot.
    ///
    /// # Errors
    ///
    /// Any error of loading or resolving the sources.
    pub fn open(sources: SchemaSources) -> Result<Self> {
        let snapshot = Snapshot::load(&sources)?;
        info!(
            fingerprint = %snapshot.fingerprint,
            commands = snapshot.schema.len(),
            "schema snapshot loaded"
        );
        Ok(Self {
            sources,
            current: RwLock::new(Arc::new(snapshot)),
        })
    }

    pub fn sources(&self) -> &SchemaSources {
        &self.sources
    }

    /// The snapshot new invocations should use.
    pub fn current(&self) -> Arc<Snapshot> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Re-reads the sources and swaps in a new snapshot if they changed.
    ///
    /// # Errors
    ///
    /// Returns the load or resolution error; the current snapshot stays in
    /// place.
    pub fn reload(&self) -> Result<ReloadOutcome> {
        let files = self.sources.read()?;
        let next_fingerprint = fingerprint(&files);
        if next_fingerprint == self.current().fingerprint {
            debug!(fingerprint = %next_fingerprint, "schema sources unchanged");
            return Ok(ReloadOutcome::Unchanged);
        }

        let snapshot = build_model(&files)
            .and_then(|model| Ok(resolve(&model)?))
            .map(|schema| Snapshot {
                schema: Arc::new(schema),
                fingerprint: next_fingerprint.clone(),
                loaded_at: Utc::now(),
                files: files.into_iter().map(|file| file.path).collect(),
            })
            .inspect_err(|err| warn!(error = %err, "schema reload failed, keeping current snapshot"))?;

        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::new(snapshot);
        info!(fingerprint = %next_fingerprint, "schema snapshot swapped");
        Ok(ReloadOutcome::Swapped {
            fingerprint: next_fingerprint,
        })
    }
}
