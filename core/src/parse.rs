//! Invocation parsing against resolved commands.
//!
//! [`parse`] makes a single pass over argv-style tokens. Each token is
//! classified as an option (`--name`, `--name=value`, `-alias`), a value
//! for the option currently collecting tokens, or a value for the next
//! unfilled positional slot. Positionals fill in declaration order; a
//! one-or-more positional keeps every remaining positional token. `--` ends
//! option processing. `--help` and `-h` yield [`ParseError::HelpRequested`]
//! unless an argument of the command is named or aliased that way.
//!
//! Once the tokens are consumed, every resolved argument is given a value:
//! its coerced tokens, its coerced default, `false` for absent flags, or
//! [`TypedValue::Absent`] for optional arguments without a default.
//! Coercion fails fast on the first offending argument, in declaration
//! order.
//!
//! [`parse_object`] accepts the same invocation as a JSON object keyed by
//! argument name.
//!
//! # Example
//!
//! ```
//! use argspec_core::*;
//!
//! let model = SchemaModel::from_commands("dl", vec![
//!     Command::new("run")
//!         .with_arg(Argument::positional("classifier", ArgType::String).one_or_more())
//!         .with_arg(Argument::named("k-cross", ArgType::Int).with_alias("k").with_default("0"))
//!         .with_arg(Argument::flag("quick-cross")),
//! ]).unwrap();
//! let schema = resolve(&model).unwrap();
//! let run = schema.get("run").unwrap();
//!
//! let result = parse(run, &["cnn", "rnn", "-k", "5"], &TypeCoercer::new()).unwrap();
//! assert_eq!(result.get("k-cross"), Some(&TypedValue::Int(5)));
//! assert_eq!(result.get("classifier").unwrap().len(), 2);
//! assert!(!result.flag("quick-cross"));
//! ```

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::Serialize;

use crate::coerce::TypeCoercer;
use crate::error::{ParseError, ValueError};
use crate::resolve::{ResolvedCommand, ResolvedSchema};
use crate::types::{Argument, Arity};
use crate::value::TypedValue;

/// Typed values of one invocation, keyed by argument name in resolved
/// declaration order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedResult {
    command: String,
    values: IndexMap<String, TypedValue>,
}

impl ParsedResult {
    /// Dotted path of the parsed command.
    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn get(&self, name: &str) -> Option<&TypedValue> {
        self.values.get(name)
    }

    /// `true` if the named flag was given.
    pub fn flag(&self, name: &str) -> bool {
        self.get(name)
            .and_then(TypedValue::as_bool)
            .unwrap_or(false)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TypedValue)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn into_values(self) -> IndexMap<String, TypedValue> {
        self.values
    }
}

const HELP_LONG: &str = "help";
const HELP_SHORT: &str = "h";

fn is_help(token: &str) -> bool {
    token == "--help" || token == "-h"
}

/// Tokens supplied per argument name.
type Supplied = HashMap<String, Vec<String>>;

/// Parses `argv` (without the command path) against `command`.
///
/// # Errors
///
/// Returns a [`ParseError`] for structural problems, or
/// [`ParseError::Value`] wrapping the first coercion failure.
pub fn parse<S: AsRef<str>>(
    command: &ResolvedCommand,
    argv: &[S],
    coercer: &TypeCoercer,
) -> Result<ParsedResult, ParseError> {
    if let Some(arguments) = command.positional_hazard() {
        return Err(ParseError::AmbiguousPositionals {
            command: command.path.clone(),
            arguments,
        });
    }
    let supplied = Scanner::new(command).scan(argv)?;
    finish(command, supplied, coercer)
}

/// Parses a JSON object mapping argument names to values.
///
/// Strings and numbers become one token, arrays one token per element, and
/// objects `key=value` tokens. Flags take booleans; `null` counts as not
/// supplied.
///
/// # Examples
///
/// ```
/// use argspec_core::*;
///
/// let model = SchemaModel::from_commands("dl", vec![
///     Command::new("train")
///         .with_arg(Argument::named("epochs", ArgType::Int))
///         .with_arg(Argument::named("hyper-params", ArgType::Dict).one_or_more().with_default_list(Vec::<String>::new()))
///         .with_arg(Argument::flag("cache-features")),
/// ]).unwrap();
/// let schema = resolve(&model).unwrap();
///
/// let object = serde_json::json!({"epochs": 20, "hyper-params": {"lr": "0.01"}, "cache-features": true});
/// let result = parse_object(schema.get("train").unwrap(), object.as_object().unwrap(), &TypeCoercer::new()).unwrap();
/// assert_eq!(result.get("epochs"), Some(&TypedValue::Int(20)));
/// assert!(result.flag("cache-features"));
/// ```
pub fn parse_object(
    command: &ResolvedCommand,
    object: &serde_json::Map<String, serde_json::Value>,
    coercer: &TypeCoercer,
) -> Result<ParsedResult, ParseError> {
    let mut supplied = Supplied::new();
    for (key, value) in object {
        let argument = command
            .find_argument(key)
            .ok_or_else(|| ParseError::UnrecognizedOption {
                command: command.path.clone(),
                token: key.clone(),
            })?;

        if argument.is_flag() {
            match value {
                serde_json::Value::Bool(true) => {
                    supplied.insert(argument.name.clone(), Vec::new());
                }
                serde_json::Value::Bool(false) | serde_json::Value::Null => {}
                _ => {
                    return Err(ValueError::ArityMismatch {
                        argument: argument.name.clone(),
                        expected: Arity::Zero,
                        found: 1,
                    }
                    .into());
                }
            }
            continue;
        }

        let tokens = match value {
            serde_json::Value::Null => continue,
            serde_json::Value::Array(items) => items.iter().map(json_token).collect(),
            serde_json::Value::Object(map) => map
                .iter()
                .map(|(k, v)| format!("{k}={}", json_token(v)))
                .collect(),
            scalar => vec![json_token(scalar)],
        };
        supplied.insert(argument.name.clone(), tokens);
    }
    finish(command, supplied, coercer)
}

fn json_token(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Walks the leading tokens of `argv` down the command tree.
///
/// Returns the selected command and the remaining tokens.
///
/// # Errors
///
/// - [`ParseError::MissingSubcommand`] when `argv` is empty, or stops at a
///   group that has no arguments of its own.
/// - [`ParseError::UnknownCommand`] when the first token (or the token after
///   such a group) names no command.
/// - [`ParseError::HelpRequested`] when `--help` or `-h` follows such a group.
pub fn select_command<'a, 's, S: AsRef<str>>(
    schema: &'a ResolvedSchema,
    argv: &'s [S],
) -> Result<(&'a ResolvedCommand, &'s [S]), ParseError> {
    let Some(first) = argv.first() else {
        return Err(ParseError::MissingSubcommand {
            command: schema.name.clone(),
        });
    };
    let first = first.as_ref();
    let mut current = schema
        .top_level()
        .find(|command| command.name == first)
        .ok_or_else(|| ParseError::UnknownCommand {
            path: first.to_string(),
        })?;

    let mut consumed = 1;
    while let Some(token) = argv.get(consumed) {
        match schema.child(current, token.as_ref()) {
            Some(child) => {
                current = child;
                consumed += 1;
            }
            None => break,
        }
    }

    if current.requires_subcommand() {
        return Err(match argv.get(consumed) {
            Some(token) if is_help(token.as_ref()) => ParseError::HelpRequested {
                command: current.path.clone(),
            },
            Some(token) => ParseError::UnknownCommand {
                path: format!("{}.{}", current.path, token.as_ref()),
            },
            None => ParseError::MissingSubcommand {
                command: current.path.clone(),
            },
        });
    }

    Ok((current, &argv[consumed..]))
}

struct Scanner<'c> {
    command: &'c ResolvedCommand,
    positionals: Vec<&'c Argument>,
    slot: usize,
    supplied: Supplied,
    /// Option currently collecting value tokens.
    pending: Option<(&'c Argument, Vec<String>)>,
}

impl<'c> Scanner<'c> {
    fn new(command: &'c ResolvedCommand) -> Self {
        Self {
            command,
            positionals: command.positionals().collect(),
            slot: 0,
            supplied: Supplied::new(),
            pending: None,
        }
    }

    fn scan<S: AsRef<str>>(mut self, argv: &[S]) -> Result<Supplied, ParseError> {
        let mut options_ended = false;
        for token in argv {
            let token = token.as_ref();
            if !options_ended {
                if token == "--" {
                    self.flush()?;
                    options_ended = true;
                    continue;
                }
                if let Some((argument, inline)) = self.classify(token)? {
                    self.flush()?;
                    self.open(argument, inline)?;
                    continue;
                }
            }
            if !options_ended {
                if let Some((_, values)) = self.pending.as_mut() {
                    values.push(token.to_string());
                    continue;
                }
            }
            self.push_positional(token)?;
        }
        self.flush()?;
        Ok(self.supplied)
    }

    /// Recognizes option tokens. Dash-prefixed tokens that match no option
    /// but parse as numbers are values.
    fn classify(&self, token: &str) -> Result<Option<(&'c Argument, Option<String>)>, ParseError> {
        if let Some(rest) = token.strip_prefix("--") {
            let (name, inline) = match rest.split_once('=') {
                Some((name, value)) => (name, Some(value.to_string())),
                None => (rest, None),
            };
            return match self.command.find_long(name) {
                Some(argument) => Ok(Some((argument, inline))),
                None if name == HELP_LONG && inline.is_none() => Err(self.help_requested()),
                None if token.parse::<f64>().is_ok() => Ok(None),
                None => Err(self.unrecognized(token)),
            };
        }
        if let Some(rest) = token.strip_prefix('-') {
            if rest.is_empty() {
                return Ok(None);
            }
            return match self.command.find_short(rest) {
                Some(argument) => Ok(Some((argument, None))),
                None if rest == HELP_SHORT => Err(self.help_requested()),
                None if token.parse::<f64>().is_ok() => Ok(None),
                None => Err(self.unrecognized(token)),
            };
        }
        Ok(None)
    }

    fn help_requested(&self) -> ParseError {
        ParseError::HelpRequested {
            command: self.command.path.clone(),
        }
    }

    fn unrecognized(&self, token: &str) -> ParseError {
        ParseError::UnrecognizedOption {
            command: self.command.path.clone(),
            token: token.to_string(),
        }
    }

    fn open(&mut self, argument: &'c Argument, inline: Option<String>) -> Result<(), ParseError> {
        if argument.is_flag() {
            if inline.is_some() {
                return Err(ValueError::ArityMismatch {
                    argument: argument.name.clone(),
                    expected: Arity::Zero,
                    found: 1,
                }
                .into());
            }
            self.supplied.insert(argument.name.clone(), Vec::new());
            return Ok(());
        }
        if argument.arity() == Arity::OneOrMore && self.supplied.contains_key(&argument.name) {
            return Err(ParseError::RepeatedMultiValueOption {
                argument: argument.name.clone(),
            });
        }
        self.pending = Some((argument, inline.into_iter().collect()));
        Ok(())
    }

    /// Closes the pending option. Exactly-one options overwrite earlier
    /// occurrences.
    fn flush(&mut self) -> Result<(), ParseError> {
        let Some((argument, values)) = self.pending.take() else {
            return Ok(());
        };
        let arity = argument.arity();
        let arity_ok = match arity {
            Arity::One => values.len() == 1,
            Arity::OneOrMore => !values.is_empty(),
            Arity::Zero => values.is_empty(),
        };
        if !arity_ok {
            return Err(ValueError::ArityMismatch {
                argument: argument.name.clone(),
                expected: arity,
                found: values.len(),
            }
            .into());
        }
        self.supplied.insert(argument.name.clone(), values);
        Ok(())
    }

    fn push_positional(&mut self, token: &str) -> Result<(), ParseError> {
        let Some(argument) = self.positionals.get(self.slot).copied() else {
            return Err(ParseError::UnexpectedPositional {
                command: self.command.path.clone(),
                token: token.to_string(),
            });
        };
        self.supplied
            .entry(argument.name.clone())
            .or_default()
            .push(token.to_string());
        if argument.arity() != Arity::OneOrMore {
            self.slot += 1;
        }
        Ok(())
    }
}

fn finish(
    command: &ResolvedCommand,
    supplied: Supplied,
    coercer: &TypeCoercer,
) -> Result<ParsedResult, ParseError> {
    let mut values = IndexMap::with_capacity(command.arguments.len());
    for argument in &command.arguments {
        let value = match supplied.get(&argument.name) {
            Some(tokens) => {
                let tokens: Vec<&str> = tokens.iter().map(String::as_str).collect();
                coercer.coerce(argument, &tokens)?
            }
            None => match coercer.default_value(argument)? {
                Some(value) => value,
                None if argument.is_required() => {
                    return Err(ParseError::MissingRequiredArgument {
                        command: command.path.clone(),
                        argument: argument.name.clone(),
                    });
                }
                None => TypedValue::Absent,
            },
        };
        values.insert(argument.name.clone(), value);
    }
    Ok(ParsedResult {
        command: command.path.clone(),
        values,
    })
}
