//! Schema sources, tool configuration, and reloadable snapshots.
//!
//! This crate loads declarative CLI schemas from JSON or YAML documents,
//! merges them into one validated [`SchemaModel`](argspec_core::SchemaModel),
//! and keeps the resolved result in a [`SchemaStore`] that can be reloaded
//! while invocations are in flight.
//!
//! # Quick start
//!
//! ```no_run
//! use argspec_core::{TypeCoercer, parse, select_command};
//! use argspec_db::{SchemaSources, SchemaStore, ToolConfig};
//!
//! // Load the tool config, then its schemas
//! let config = ToolConfig::load(".argspec.yml").unwrap();
//! let store = SchemaStore::open(config.schema_sources(".".as_ref())).unwrap();
//!
//! let snapshot = store.current();
//! let argv = ["run", "cnn", "--k-cross", "5"];
//! let (command, rest) = select_command(&snapshot.schema, &argv).unwrap();
//! let result = parse(command, rest, &TypeCoercer::new()).unwrap();
//! println!("{}", serde_json::to_string(&result).unwrap());
//!
//! // Pick up edits to the schema files
//! store.reload().unwrap();
//! ```

mod config;
mod error;
mod snapshot;
mod source;

pub use config::{BatchConfig, CONFIG_FILE_NAMES, OutputFormat, ToolConfig};
pub use error::{Result, StoreError};
pub use snapshot::{ReloadOutcome, SchemaStore, Snapshot};
pub use source::{
    LoadedSchema, SchemaSource, SchemaSources, SourceFile, build_model, collect_schema_paths,
    decode, fingerprint, load_description,
};
