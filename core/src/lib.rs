//! Declarative CLI schemas with argument imports and typed invocation
//! parsing.
//!
//! This crate turns a declarative command tree into parsed, typed
//! invocations:
//!
//! - [`SchemaModel`] is the loaded tree of [`Command`]s. Each command declares
//!   [`Argument`]s and [`ImportRef`] directives (`train/*`, `train/epochs`)
//!   that reuse arguments declared on other commands.
//! - [`resolve`] expands every import once into a [`ResolvedSchema`]. Local
//!   declarations override imports, duplicates are dropped, cycles are
//!   rejected, and declaration order is kept.
//! - [`TypeCoercer`] turns raw tokens into [`TypedValue`]s, including
//!   enumerated choices, `key=value` dictionaries and class-constrained
//!   values built by named constructors.
//! - [`parse`] and [`parse_object`] turn argv tokens or a JSON object into a
//!   [`ParsedResult`].
//! - [`App`] adds cross-argument constraints and handler dispatch on top.
//!
//! Load-time validation ([`validate_model`]) catches malformed commands,
//! arguments and import directives before anything is resolved.
//!
//! # Example
//!
//! ```
//! use argspec_core::*;
//!
//! // A fictional deep-learning CLI: `run` reuses every `train` argument
//! let model = SchemaModel::from_commands("dl", vec![
//!     Command::new("train")
//!         .with_arg(Argument::named("epochs", ArgType::Int).with_alias("e").with_default("10"))
//!         .with_arg(Argument::flag("cache-features")),
//!     Command::new("run")
//!         .with_arg(Argument::positional("classifier", ArgType::String).one_or_more())
//!         .with_import(ImportRef::all("train")),
//! ]).unwrap();
//!
//! let schema = resolve(&model).unwrap();
//! let run = schema.get("run").unwrap();
//! assert_eq!(run.argument_names(), vec!["classifier", "epochs", "cache-features"]);
//!
//! let result = parse(run, &["cnn", "-e", "3"], &TypeCoercer::new()).unwrap();
//! assert_eq!(result.get("epochs"), Some(&TypedValue::Int(3)));
//! assert!(!result.flag("cache-features"));
//! ```

mod app;
mod coerce;
mod constraint;
mod description;
mod error;
mod help;
mod parse;
mod resolve;
mod types;
mod validate;
mod value;

pub use app::{App, DispatchError, HandlerError};
pub use coerce::{Constructor, TypeCoercer};
pub use constraint::{Constraint, ConstraintSet, Predicate};
pub use description::{
    ArgumentDescription, CommandDescription, DefaultDescription, EntryDescription, Literal,
    SchemaDescription,
};
pub use error::*;
pub use help::{ArgumentHelp, CommandHelp, describe, render_help};
pub use parse::{ParsedResult, parse, parse_object, select_command};
pub use resolve::{ResolvedCommand, ResolvedSchema, resolve};
pub use types::*;
pub use validate::validate_model;
pub use value::TypedValue;
