//! Token coercion into [`TypedValue`]s.
//!
//! [`TypeCoercer`] converts the raw tokens supplied for one argument (or its
//! textual default) according to the argument's type and arity. Class
//! arguments are handed to a named value constructor from the coercer's
//! registry; `path`, `file` and `directory` are built in.
//!
//! # Examples
//!
//! ```
//! use argspec_core::*;
//!
//! let coercer = TypeCoercer::new();
//! let params = Argument::named("hyper-params", ArgType::Dict).one_or_more();
//!
//! let value = coercer.coerce(&params, &["a=1", "b=2", "a=3"]).unwrap();
//! assert_eq!(value.as_dict().unwrap()["a"], "3");
//!
//! let err = coercer.coerce(&params, &["x"]).unwrap_err();
//! assert!(matches!(err, ValueError::MalformedKeyValue { .. }));
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{SchemaError, ValueError};
use crate::resolve::ResolvedSchema;
use crate::types::{ArgType, Argument, Arity, DefaultValue};
use crate::value::TypedValue;

/// A named external value constructor for class arguments.
///
/// Returns the constructed value or a human-readable rejection reason.
pub type Constructor = Arc<dyn Fn(&str) -> Result<TypedValue, String> + Send + Sync>;

/// Converts raw tokens into typed values.
///
/// Cloning is cheap; constructors are shared.
#[derive(Clone)]
pub struct TypeCoercer {
    constructors: BTreeMap<String, Constructor>,
}

impl Default for TypeCoercer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TypeCoercer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeCoercer")
            .field("constructors", &self.constructors.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl TypeCoercer {
    /// Creates a coercer with the built-in `path`, `file` and `directory`
    /// constructors.
    pub fn new() -> Self {
        Self::empty()
            .with_constructor("path", construct_path)
            .with_constructor("file", construct_file)
            .with_constructor("directory", construct_directory)
    }

    /// Creates a coercer with no constructors registered.
    pub fn empty() -> Self {
        Self {
            constructors: BTreeMap::new(),
        }
    }

    /// Registers (or replaces) a value constructor.
    ///
    /// # Examples
    ///
    /// ```
    /// use argspec_core::*;
    ///
    /// let coercer = TypeCoercer::new().with_constructor("port", |token| {
    ///     token
    ///         .parse::<u16>()
    ///         .map(|port| TypedValue::Int(port.into()))
    ///         .map_err(|err| err.to_string())
    /// });
    /// let port = Argument::named("port", ArgType::Class).with_constructor("port");
    ///
    /// assert_eq!(coercer.coerce(&port, &["8080"]).unwrap(), TypedValue::Int(8080));
    /// assert!(matches!(
    ///     coercer.coerce(&port, &["99999"]),
    ///     Err(ValueError::ConstructionFailed { .. })
    /// ));
    /// ```
    pub fn with_constructor<F>(mut self, name: &str, constructor: F) -> Self
    where
        F: Fn(&str) -> Result<TypedValue, String> + Send + Sync + 'static,
    {
        self.constructors
            .insert(name.to_string(), Arc::new(constructor));
        self
    }

    pub fn has_constructor(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Names of the registered constructors, sorted.
    pub fn constructor_names(&self) -> impl Iterator<Item = &str> {
        self.constructors.keys().map(String::as_str)
    }

    /// Verifies that every class argument in `schema` names a registered
    /// constructor.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::MalformedArgument`] for the first argument
    /// whose constructor is unknown.
    pub fn check(&self, schema: &ResolvedSchema) -> Result<(), SchemaError> {
        for command in schema.commands() {
            for argument in &command.arguments {
                if let Some(name) = argument.constructor() {
                    if !self.has_constructor(name) {
                        return Err(SchemaError::MalformedArgument {
                            command: command.path.clone(),
                            argument: argument.name.clone(),
                            reason: format!(
                                "unknown value constructor `{name}` (registered: {})",
                                self.constructor_names().collect::<Vec<_>>().join(", ")
                            ),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Coerces the tokens supplied for `argument`.
    ///
    /// For flags, calling this means the flag was present: zero tokens yield
    /// `true`. Exactly-one arguments need one token; one-or-more arguments
    /// need at least one and yield a [`TypedValue::List`]. Dict arguments
    /// always yield a single merged [`TypedValue::Dict`].
    ///
    /// # Errors
    ///
    /// Returns the [`ValueError`] kind matching the first offending token.
    pub fn coerce(&self, argument: &Argument, tokens: &[&str]) -> Result<TypedValue, ValueError> {
        let arity = argument.arity();
        let arity_ok = match arity {
            Arity::Zero => tokens.is_empty(),
            Arity::One => tokens.len() == 1,
            Arity::OneOrMore => !tokens.is_empty(),
        };
        if !arity_ok {
            return Err(ValueError::ArityMismatch {
                argument: argument.name.clone(),
                expected: arity,
                found: tokens.len(),
            });
        }

        match argument.value_kind() {
            ArgType::Bool => Ok(TypedValue::Bool(true)),
            ArgType::Dict => coerce_dict(argument, tokens),
            _ if arity == Arity::OneOrMore => tokens
                .iter()
                .map(|token| self.coerce_scalar(argument, token))
                .collect::<Result<Vec<_>, _>>()
                .map(TypedValue::List),
            _ => self.coerce_scalar(argument, tokens[0]),
        }
    }

    /// Value used when `argument` is absent from an invocation.
    ///
    /// Flags default to `false`. A textual default is coerced as if it had
    /// been supplied; an empty list default yields an empty value. Returns
    /// `None` when the argument has no default.
    ///
    /// # Errors
    ///
    /// Returns a [`ValueError`] when the default itself does not coerce.
    pub fn default_value(&self, argument: &Argument) -> Result<Option<TypedValue>, ValueError> {
        if argument.is_flag() {
            return Ok(Some(TypedValue::Bool(false)));
        }
        let Some(default) = &argument.default else {
            return Ok(None);
        };
        if let DefaultValue::List(tokens) = default {
            if tokens.is_empty() {
                return Ok(Some(match argument.value_kind() {
                    ArgType::Dict => TypedValue::Dict(BTreeMap::new()),
                    _ => TypedValue::List(Vec::new()),
                }));
            }
        }
        self.coerce(argument, &default.tokens()).map(Some)
    }

    fn coerce_scalar(&self, argument: &Argument, token: &str) -> Result<TypedValue, ValueError> {
        match argument.value_kind() {
            ArgType::String => Ok(TypedValue::Str(token.to_string())),
            ArgType::Int => token
                .parse::<i64>()
                .map(TypedValue::Int)
                .map_err(|_| not_a_number(argument, token)),
            ArgType::Float => token
                .parse::<f64>()
                .map(TypedValue::Float)
                .map_err(|_| not_a_number(argument, token)),
            ArgType::Enum => {
                if argument.choices.iter().any(|choice| choice == token) {
                    Ok(TypedValue::Str(token.to_string()))
                } else {
                    Err(ValueError::NotAChoice {
                        argument: argument.name.clone(),
                        token: token.to_string(),
                        choices: argument.choices.clone(),
                    })
                }
            }
            ArgType::Class => self.construct(argument, token),
            ArgType::Dict => coerce_dict(argument, &[token]),
            ArgType::Bool => Err(ValueError::ArityMismatch {
                argument: argument.name.clone(),
                expected: Arity::Zero,
                found: 1,
            }),
        }
    }

    fn construct(&self, argument: &Argument, token: &str) -> Result<TypedValue, ValueError> {
        let name = argument.constructor().unwrap_or_default();
        let failed = |reason: String| ValueError::ConstructionFailed {
            argument: argument.name.clone(),
            token: token.to_string(),
            constructor: name.to_string(),
            reason,
        };
        let constructor = self
            .constructors
            .get(name)
            .ok_or_else(|| failed(format!("no constructor named `{name}` is registered")))?;
        constructor(token).map_err(failed)
    }
}

fn not_a_number(argument: &Argument, token: &str) -> ValueError {
    ValueError::NotANumber {
        argument: argument.name.clone(),
        token: token.to_string(),
    }
}

fn coerce_dict(argument: &Argument, tokens: &[&str]) -> Result<TypedValue, ValueError> {
    let mut map = BTreeMap::new();
    for token in tokens {
        match token.split_once('=') {
            Some((key, value)) if !key.is_empty() => {
                map.insert(key.to_string(), value.to_string());
            }
            _ => {
                return Err(ValueError::MalformedKeyValue {
                    argument: argument.name.clone(),
                    token: token.to_string(),
                });
            }
        }
    }
    Ok(TypedValue::Dict(map))
}

fn construct_path(token: &str) -> Result<TypedValue, String> {
    if token.is_empty() || token.contains('\0') {
        return Err("not a valid path".to_string());
    }
    Ok(TypedValue::Path(PathBuf::from(token)))
}

fn construct_file(token: &str) -> Result<TypedValue, String> {
    let path = Path::new(token);
    if path.is_file() {
        Ok(TypedValue::Path(path.to_path_buf()))
    } else {
        Err("no such file".to_string())
    }
}

fn construct_directory(token: &str) -> Result<TypedValue, String> {
    let path = Path::new(token);
    if path.is_dir() {
        Ok(TypedValue::Path(path.to_path_buf()))
    } else {
        Err("no such directory".to_string())
    }
}
