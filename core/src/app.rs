//! Thin dispatcher from command paths to application handlers.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::coerce::TypeCoercer;
use crate::constraint::ConstraintSet;
use crate::error::{Error, ParseError, SchemaError};
use crate::help::render_help;
use crate::parse::{self, ParsedResult};
use crate::resolve::{ResolvedCommand, ResolvedSchema, resolve};
use crate::types::SchemaModel;
use crate::value::TypedValue;

/// Error returned by handlers and setup hooks.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

type Handler = Arc<dyn Fn(&ParsedResult) -> Result<(), HandlerError> + Send + Sync>;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Invocation(#[from] Error),
    #[error("no handler registered for command `{path}`")]
    NoHandler { path: String },
    #[error("cannot register a handler for unknown command `{path}`")]
    UnknownHandlerTarget { path: String },
    #[error("setup failed: {source}")]
    Setup { source: HandlerError },
    #[error("command `{path}` failed: {source}")]
    Handler { path: String, source: HandlerError },
}

impl DispatchError {
    /// Invocation errors keep their own status; registry problems map to 3
    /// and handler failures to 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Invocation(err) => err.exit_code(),
            Self::NoHandler { .. } | Self::UnknownHandlerTarget { .. } => 3,
            Self::Setup { .. } | Self::Handler { .. } => 1,
        }
    }
}

impl From<ParseError> for DispatchError {
    fn from(err: ParseError) -> Self {
        Self::Invocation(err.into())
    }
}

/// Resolved schema plus the application's coercer, constraints, and
/// handlers.
///
/// # Examples
///
/// ```
/// use std::sync::{Arc, Mutex};
/// use argspec_core::*;
///
/// let model = SchemaModel::from_commands("dl", vec![
///     Command::new("train").with_arg(Argument::named("epochs", ArgType::Int).with_default("10")),
/// ]).unwrap();
///
/// let seen = Arc::new(Mutex::new(None));
/// let sink = Arc::clone(&seen);
/// let mut app = App::new(&model, TypeCoercer::new()).unwrap();
/// app.register_handler("train", move |result| {
///     *sink.lock().unwrap() = result.get("epochs").and_then(TypedValue::as_int);
///     Ok(())
/// })
/// .unwrap();
///
/// app.run(&["train", "--epochs", "3"]).unwrap();
/// assert_eq!(*seen.lock().unwrap(), Some(3));
/// ```
#[derive(Clone)]
pub struct App {
    schema: Arc<ResolvedSchema>,
    coercer: TypeCoercer,
    constraints: ConstraintSet,
    handlers: HashMap<String, Handler>,
    setup: Vec<Handler>,
}

impl App {
    /// Resolves `model` and checks that every class argument's constructor
    /// is registered on `coercer`.
    pub fn new(model: &SchemaModel, coercer: TypeCoercer) -> Result<Self, Error> {
        let schema = resolve(model)?;
        Ok(Self::from_resolved(Arc::new(schema), coercer)?)
    }

    pub fn from_resolved(schema: Arc<ResolvedSchema>, coercer: TypeCoercer) -> Result<Self, SchemaError> {
        coercer.check(&schema)?;
        Ok(Self {
            schema,
            coercer,
            constraints: ConstraintSet::new(),
            handlers: HashMap::new(),
            setup: Vec::new(),
        })
    }

    pub fn schema(&self) -> &Arc<ResolvedSchema> {
        &self.schema
    }

    pub fn coercer(&self) -> &TypeCoercer {
        &self.coercer
    }

    pub fn constraints(&self) -> &ConstraintSet {
        &self.constraints
    }

    /// See [`ConstraintSet::add`].
    pub fn add_constraint<F>(&mut self, message: &str, targets: &[&str], predicate: F) -> Result<(), SchemaError>
    where
        F: Fn(&[&TypedValue]) -> bool + Send + Sync + 'static,
    {
        self.constraints.add(&self.schema, message, targets, predicate)
    }

    /// Registers the handler for a dotted command path, replacing any
    /// previous one.
    pub fn register_handler<F>(&mut self, path: &str, handler: F) -> Result<(), DispatchError>
    where
        F: Fn(&ParsedResult) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        if self.schema.get(path).is_none() {
            return Err(DispatchError::UnknownHandlerTarget {
                path: path.to_string(),
            });
        }
        self.handlers.insert(path.to_string(), Arc::new(handler));
        Ok(())
    }

    /// Registers a hook that runs before every handler, in registration
    /// order.
    pub fn register_setup<F>(&mut self, hook: F)
    where
        F: Fn(&ParsedResult) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.setup.push(Arc::new(hook));
    }

    /// Rendered help for the command at `path`.
    pub fn help(&self, path: &str) -> Option<String> {
        self.schema
            .get(path)
            .map(|command| render_help(command, &self.schema.name))
    }

    /// Rendered help when `err` is a [`ParseError::HelpRequested`].
    pub fn help_for(&self, err: &Error) -> Option<String> {
        err.help_request().and_then(|path| self.help(path))
    }

    /// Selects the command named by the leading tokens and parses the rest.
    ///
    /// `--help` and `-h` return [`ParseError::HelpRequested`] for the
    /// selected command; see [`help_for`](Self::help_for).
    pub fn parse<S: AsRef<str>>(&self, argv: &[S]) -> Result<ParsedResult, Error> {
        let (command, rest) = parse::select_command(&self.schema, argv)?;
        let result = parse::parse(command, rest, &self.coercer)?;
        self.constraints.check(&result)?;
        Ok(result)
    }

    /// Parses a JSON object for the command at `path`.
    pub fn parse_object(
        &self,
        path: &str,
        object: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<ParsedResult, Error> {
        let command = self.command(path)?;
        let result = parse::parse_object(command, object, &self.coercer)?;
        self.constraints.check(&result)?;
        Ok(result)
    }

    /// Parses `argv` and dispatches it to the selected command's handler.
    pub fn run<S: AsRef<str>>(&self, argv: &[S]) -> Result<ParsedResult, DispatchError> {
        let result = self.parse(argv)?;
        self.dispatch(&result)?;
        Ok(result)
    }

    pub fn run_object(
        &self,
        path: &str,
        object: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<ParsedResult, DispatchError> {
        let result = self.parse_object(path, object)?;
        self.dispatch(&result)?;
        Ok(result)
    }

    fn command(&self, path: &str) -> Result<&ResolvedCommand, ParseError> {
        let command = self.schema.get(path).ok_or_else(|| ParseError::UnknownCommand {
            path: path.to_string(),
        })?;
        if command.requires_subcommand() {
            return Err(ParseError::MissingSubcommand {
                command: command.path.clone(),
            });
        }
        Ok(command)
    }

    fn dispatch(&self, result: &ParsedResult) -> Result<(), DispatchError> {
        let path = result.command();
        let handler = self.handlers.get(path).ok_or_else(|| DispatchError::NoHandler {
            path: path.to_string(),
        })?;
        for hook in &self.setup {
            hook(result).map_err(|source| DispatchError::Setup { source })?;
        }
        debug!(command = path, "dispatching");
        handler(result).map_err(|source| DispatchError::Handler {
            path: path.to_string(),
            source,
        })
    }
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut handlers: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        handlers.sort_unstable();
        f.debug_struct("App")
            .field("schema", &self.schema.name)
            .field("constraints", &self.constraints.len())
            .field("handlers", &handlers)
            .field("setup", &self.setup.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::error::ImportError;
    use crate::types::{ArgType, Argument, Command, ImportRef};

    fn model() -> SchemaModel {
        SchemaModel::from_commands(
            "dl",
            vec![
                Command::new("train")
                    .with_arg(Argument::named("epochs", ArgType::Int).with_default("10"))
                    .with_arg(Argument::flag("quick")),
                Command::new("run_analysis").with_subcommand(
                    Command::new("summarize").with_import(ImportRef::all("train")),
                ),
            ],
        )
        .unwrap()
    }

    fn recording_app(log: &Arc<Mutex<Vec<String>>>) -> App {
        let mut app = App::new(&model(), TypeCoercer::new()).unwrap();
        for path in ["train", "run_analysis.summarize"] {
            let log = Arc::clone(log);
            app.register_handler(path, move |result| {
                log.lock().unwrap().push(format!("handler:{}", result.command()));
                Ok(())
            })
            .unwrap();
        }
        let setup_log = Arc::clone(log);
        app.register_setup(move |_| {
            setup_log.lock().unwrap().push("setup".to_string());
            Ok(())
        });
        app
    }

    #[test]
    fn test_run_invokes_setup_then_handler() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let app = recording_app(&log);

        let result = app.run(&["run_analysis", "summarize", "--epochs", "2"]).unwrap();
        assert_eq!(result.get("epochs"), Some(&TypedValue::Int(2)));
        assert_eq!(
            *log.lock().unwrap(),
            vec!["setup".to_string(), "handler:run_analysis.summarize".to_string()]
        );
    }

    #[test]
    fn test_nothing_runs_when_parsing_fails() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let app = recording_app(&log);

        let err = app.run(&["train", "--epochs", "many"]).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        let err = app.run(&["run_analysis"]).unwrap_err();
        assert!(matches!(
            err,
            DispatchError::Invocation(Error::Parse(ParseError::MissingSubcommand { .. }))
        ));
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_help_request_renders_help_without_dispatch() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let app = recording_app(&log);

        let err = app.run(&["train", "--epochs", "3", "--help"]).unwrap_err();
        assert_eq!(err.exit_code(), 0);
        let DispatchError::Invocation(err) = err else {
            panic!("expected an invocation error");
        };
        let help = app.help_for(&err).unwrap();
        assert!(help.starts_with("usage: dl train"), "{help}");
        assert!(help.contains("--epochs"), "{help}");

        let err = app.parse(&["run_analysis", "-h"]).unwrap_err();
        assert!(app.help_for(&err).unwrap().contains("summarize"));
        assert!(log.lock().unwrap().is_empty());

        let err = app.parse(&["train", "--epochs", "x"]).unwrap_err();
        assert_eq!(app.help_for(&err), None);
    }

    #[test]
    fn test_missing_handler_skips_setup() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut app = App::new(&model(), TypeCoercer::new()).unwrap();
        let setup_log = Arc::clone(&log);
        app.register_setup(move |_| {
            setup_log.lock().unwrap().push("setup".to_string());
            Ok(())
        });

        let err = app.run(&["train"]).unwrap_err();
        assert!(matches!(err, DispatchError::NoHandler { ref path } if path == "train"));
        assert_eq!(err.exit_code(), 3);
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_constraint_failure_prevents_dispatch() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut app = recording_app(&log);
        app.add_constraint("quick training needs few epochs", &["train.epochs", "train.quick"], |values| {
            !(values[1].as_bool() == Some(true) && values[0].as_int().unwrap_or(0) > 5)
        })
        .unwrap();

        let err = app.run(&["train", "--quick"]).unwrap_err();
        assert!(matches!(
            err,
            DispatchError::Invocation(Error::Parse(ParseError::ConstraintViolated { .. }))
        ));
        assert!(log.lock().unwrap().is_empty());

        app.run(&["train", "--quick", "--epochs", "3"]).unwrap();
        assert_eq!(log.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_handler_error_is_reported() {
        let mut app = App::new(&model(), TypeCoercer::new()).unwrap();
        app.register_handler("train", |_| Err("disk full".into())).unwrap();
        let err = app.run(&["train"]).unwrap_err();
        assert_eq!(err.to_string(), "command `train` failed: disk full");
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_register_handler_for_unknown_path_fails() {
        let mut app = App::new(&model(), TypeCoercer::new()).unwrap();
        assert!(matches!(
            app.register_handler("summarize", |_| Ok(())),
            Err(DispatchError::UnknownHandlerTarget { .. })
        ));
    }

    #[test]
    fn test_run_object_uses_dotted_path() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let app = recording_app(&log);
        let object = serde_json::json!({"epochs": 7, "quick": false});
        let result = app
            .run_object("run_analysis.summarize", object.as_object().unwrap())
            .unwrap();
        assert_eq!(result.get("epochs"), Some(&TypedValue::Int(7)));
        assert!(matches!(
            app.parse_object("run_analysis", object.as_object().unwrap()),
            Err(Error::Parse(ParseError::MissingSubcommand { .. }))
        ));
    }

    #[test]
    fn test_new_reports_import_errors() {
        let model = SchemaModel::from_commands(
            "dl",
            vec![Command::new("a").with_import(ImportRef::all("missing"))],
        )
        .unwrap();
        assert!(matches!(
            App::new(&model, TypeCoercer::new()),
            Err(Error::Import(ImportError::UnknownSourceCommand { .. }))
        ));
    }

    #[test]
    fn test_new_rejects_unknown_constructor() {
        let model = SchemaModel::from_commands(
            "dl",
            vec![Command::new("a").with_arg(Argument::named("model", ArgType::Class).with_constructor("checkpoint"))],
        )
        .unwrap();
        assert!(matches!(
            App::new(&model, TypeCoercer::new()),
            Err(Error::Schema(SchemaError::MalformedArgument { .. }))
        ));
        let coercer = TypeCoercer::new().with_constructor("checkpoint", |token| Ok(TypedValue::Str(token.to_string())));
        assert!(App::new(&model, coercer).is_ok());
    }
}
