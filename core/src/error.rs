//! Error kinds for each phase: load, resolution, coercion, invocation.
//!
//! Every variant carries the offending command/argument/token so a caller
//! can render a precise diagnostic. [`Error::exit_code`] maps each phase to a
//! non-zero process status.

use thiserror::Error;

use crate::types::Arity;

/// Load-time structural problems in a schema description.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// A command name is empty or contains a path/import separator.
    #[error("malformed command `{command}`: {reason}")]
    MalformedCommand { command: String, reason: String },
    /// An argument declaration is not a valid style/type combination.
    #[error("malformed argument `{argument}` in command `{command}`: {reason}")]
    MalformedArgument {
        command: String,
        argument: String,
        reason: String,
    },
    /// Two siblings share a name, or two declared arguments share a name or alias.
    #[error("duplicate {kind} `{name}` in `{scope}`")]
    DuplicateName {
        scope: String,
        name: String,
        kind: NameKind,
    },
    /// An import directive is not of the form `source/selector`.
    #[error("malformed import directive `{directive}`")]
    MalformedImport { directive: String },
    /// A cross-argument constraint names a target that cannot be used.
    #[error("invalid constraint target `{target}`: {reason}")]
    UnknownConstraintTarget { target: String, reason: String },
}

/// What kind of name collided in a [`SchemaError::DuplicateName`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameKind {
    Command,
    Argument,
    Alias,
}

impl std::fmt::Display for NameKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Command => "command",
            Self::Argument => "argument",
            Self::Alias => "alias",
        };
        f.write_str(label)
    }
}

/// Resolution-time problems while expanding import directives.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImportError {
    /// Commands import from each other in a loop; `path` starts and ends at
    /// the same command.
    #[error("cyclic import: {}", .path.join(" -> "))]
    CyclicImport { path: Vec<String> },
    /// The source command exists but has no argument with that name.
    #[error("command `{command}` imports unknown argument `{argument}` from `{source_command}`")]
    UnknownImportTarget {
        command: String,
        source_command: String,
        argument: String,
    },
    /// No command with that path or name exists anywhere in the tree.
    #[error("command `{command}` imports from unknown command `{source_command}`")]
    UnknownSourceCommand {
        command: String,
        source_command: String,
    },
    /// A bare source name matches commands in several scopes.
    #[error(
        "command `{command}` imports from ambiguous command `{source_command}` (candidates: {})",
        .candidates.join(", ")
    )]
    AmbiguousSourceCommand {
        command: String,
        source_command: String,
        candidates: Vec<String>,
    },
}

/// Coercion-time problems for the tokens of one argument.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    #[error("argument `{argument}`: `{token}` is not a number")]
    NotANumber { argument: String, token: String },
    #[error("argument `{argument}`: `{token}` is not one of {}", .choices.join(", "))]
    NotAChoice {
        argument: String,
        token: String,
        choices: Vec<String>,
    },
    #[error("argument `{argument}`: `{token}` is not of the form key=value")]
    MalformedKeyValue { argument: String, token: String },
    #[error("argument `{argument}`: constructor `{constructor}` rejected `{token}`: {reason}")]
    ConstructionFailed {
        argument: String,
        token: String,
        constructor: String,
        reason: String,
    },
    #[error("argument `{argument}` expects {expected}, got {found} token(s)")]
    ArityMismatch {
        argument: String,
        expected: Arity,
        found: usize,
    },
}

impl ValueError {
    /// Name of the argument the error is attributed to.
    pub fn argument(&self) -> &str {
        match self {
            Self::NotANumber { argument, .. }
            | Self::NotAChoice { argument, .. }
            | Self::MalformedKeyValue { argument, .. }
            | Self::ConstructionFailed { argument, .. }
            | Self::ArityMismatch { argument, .. } => argument,
        }
    }
}

/// Invocation-time structural problems. Always fatal to the invocation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unknown command `{path}`")]
    UnknownCommand { path: String },
    #[error("`{command}` requires a subcommand")]
    MissingSubcommand { command: String },
    #[error(
        "command `{command}` has ambiguous positional arguments: {}",
        .arguments.join(", ")
    )]
    AmbiguousPositionals {
        command: String,
        arguments: Vec<String>,
    },
    #[error("option `{argument}` takes multiple values and may only be given once")]
    RepeatedMultiValueOption { argument: String },
    #[error("command `{command}` requires argument `{argument}`")]
    MissingRequiredArgument { command: String, argument: String },
    #[error("unrecognized option `{token}` for command `{command}`")]
    UnrecognizedOption { command: String, token: String },
    #[error("unexpected positional argument `{token}` for command `{command}`")]
    UnexpectedPositional { command: String, token: String },
    #[error("command `{command}`: {message}")]
    ConstraintViolated { command: String, message: String },
    /// `--help` or `-h` was given and no argument of the command claims it.
    #[error("help requested for `{command}`")]
    HelpRequested { command: String },
    #[error(transparent)]
    Value(#[from] ValueError),
}

/// Any error produced by this crate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Import(#[from] ImportError),
    #[error(transparent)]
    Value(#[from] ValueError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl Error {
    /// Process exit status for this error: 2 for usage errors, 3 for schema
    /// errors, 4 for import errors. A help request exits with 0.
    ///
    /// # Examples
    ///
    /// ```
    /// use argspec_core::{Error, ImportError, ParseError};
    ///
    /// let usage = Error::from(ParseError::UnknownCommand { path: "x".into() });
    /// assert_eq!(usage.exit_code(), 2);
    ///
    /// let cycle = Error::from(ImportError::CyclicImport { path: vec!["a".into(), "a".into()] });
    /// assert_eq!(cycle.exit_code(), 4);
    ///
    /// let help = Error::from(ParseError::HelpRequested { command: "train".into() });
    /// assert_eq!(help.exit_code(), 0);
    /// ```
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Parse(ParseError::HelpRequested { .. }) => 0,
            Self::Value(_) | Self::Parse(_) => 2,
            Self::Schema(_) => 3,
            Self::Import(_) => 4,
        }
    }
}

impl Error {
    /// Command path of a help request, if this is one.
    pub fn help_request(&self) -> Option<&str> {
        match self {
            Self::Parse(ParseError::HelpRequested { command }) => Some(command),
            _ => None,
        }
    }
}

/// Convenience alias for results with [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
