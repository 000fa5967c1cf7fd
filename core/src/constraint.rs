//! Cross-argument constraints checked after parsing.
//!
//! A constraint names one or more arguments of a single command by dotted
//! path (`run.k-cross`) and supplies a predicate over their parsed values.
//! Constraints for other commands are ignored when checking a result.

use std::fmt;
use std::sync::Arc;

use crate::error::{ParseError, SchemaError};
use crate::parse::ParsedResult;
use crate::resolve::ResolvedSchema;
use crate::types::PATH_SEPARATOR;
use crate::value::TypedValue;

/// Predicate over the target values, in target order.
pub type Predicate = Arc<dyn Fn(&[&TypedValue]) -> bool + Send + Sync>;

#[derive(Clone)]
pub struct Constraint {
    pub command: String,
    pub arguments: Vec<String>,
    pub message: String,
    predicate: Predicate,
}

impl Constraint {
    /// Evaluates the predicate. Targets missing from `result` fail the check.
    pub fn holds(&self, result: &ParsedResult) -> bool {
        let values: Option<Vec<&TypedValue>> =
            self.arguments.iter().map(|name| result.get(name)).collect();
        values.is_some_and(|values| (self.predicate)(&values))
    }
}

impl fmt::Debug for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Constraint")
            .field("command", &self.command)
            .field("arguments", &self.arguments)
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}

/// Ordered collection of constraints.
///
/// # Examples
///
/// ```
/// use argspec_core::*;
///
/// let model = SchemaModel::from_commands("dl", vec![
///     Command::new("run").with_arg(Argument::named("k-cross", ArgType::Int).with_default("0")),
/// ]).unwrap();
/// let schema = resolve(&model).unwrap();
///
/// let mut constraints = ConstraintSet::new();
/// constraints
///     .add(&schema, "k-cross must not be negative", &["run.k-cross"], |values| {
///         values[0].as_int().is_some_and(|k| k >= 0)
///     })
///     .unwrap();
///
/// let run = schema.get("run").unwrap();
/// let result = parse(run, &["--k-cross", "-1"], &TypeCoercer::new()).unwrap();
/// assert!(constraints.check(&result).is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct ConstraintSet {
    constraints: Vec<Constraint>,
}

impl ConstraintSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a constraint over `targets`.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::UnknownConstraintTarget`] when a target names no
    /// resolved argument, or when the targets span more than one command.
    pub fn add<F>(
        &mut self,
        schema: &ResolvedSchema,
        message: &str,
        targets: &[&str],
        predicate: F,
    ) -> Result<(), SchemaError>
    where
        F: Fn(&[&TypedValue]) -> bool + Send + Sync + 'static,
    {
        let Some(first) = targets.first() else {
            return Err(SchemaError::UnknownConstraintTarget {
                target: String::new(),
                reason: "a constraint needs at least one target".to_string(),
            });
        };

        let mut command_path: Option<&str> = None;
        let mut arguments = Vec::with_capacity(targets.len());
        for target in targets {
            let (path, argument) = target.rsplit_once(PATH_SEPARATOR).ok_or_else(|| {
                SchemaError::UnknownConstraintTarget {
                    target: target.to_string(),
                    reason: "expected `command.argument`".to_string(),
                }
            })?;
            let command = schema
                .get(path)
                .ok_or_else(|| SchemaError::UnknownConstraintTarget {
                    target: target.to_string(),
                    reason: format!("no command `{path}`"),
                })?;
            if command.find_argument(argument).is_none() {
                return Err(SchemaError::UnknownConstraintTarget {
                    target: target.to_string(),
                    reason: format!("command `{path}` has no argument `{argument}`"),
                });
            }
            match command_path {
                Some(existing) if existing != path => {
                    return Err(SchemaError::UnknownConstraintTarget {
                        target: target.to_string(),
                        reason: format!("targets must share a command, `{first}` is on `{existing}`"),
                    });
                }
                _ => command_path = Some(path),
            }
            arguments.push(argument.to_string());
        }

        self.constraints.push(Constraint {
            command: command_path.unwrap_or_default().to_string(),
            arguments,
            message: message.to_string(),
            predicate: Arc::new(predicate),
        });
        Ok(())
    }

    /// Checks every constraint registered for the result's command, in
    /// registration order.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::ConstraintViolated`] for the first failing
    /// constraint.
    pub fn check(&self, result: &ParsedResult) -> Result<(), ParseError> {
        for constraint in self.for_command(result.command()) {
            if !constraint.holds(result) {
                return Err(ParseError::ConstraintViolated {
                    command: constraint.command.clone(),
                    message: constraint.message.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn for_command<'a>(&'a self, command: &'a str) -> impl Iterator<Item = &'a Constraint> {
        self.constraints
            .iter()
            .filter(move |constraint| constraint.command == command)
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }
}
