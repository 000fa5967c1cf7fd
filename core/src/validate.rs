//! Load-time schema validation.
//!
//! Checks the structural invariants of a [`SchemaModel`] before any import
//! is expanded: unique sibling command names, well-formed argument
//! declarations, and unique argument names/aliases within each command's
//! declared list. Collisions introduced by imports are the resolver's
//! concern, not this module's.
//!
//! # Examples
//!
//! ```
//! use argspec_core::*;
//!
//! let model = SchemaModel {
//!     name: "dl".into(),
//!     help: None,
//!     commands: vec![Command::new("run").with_arg(Argument::flag("quick-cross"))],
//! };
//! assert!(validate_model(&model).is_empty());
//!
//! // Invalid: an enum without choices
//! let bad = SchemaModel {
//!     name: "dl".into(),
//!     help: None,
//!     commands: vec![Command::new("run").with_arg(Argument::named("mode", ArgType::Enum))],
//! };
//! assert!(!validate_model(&bad).is_empty());
//! ```

use std::collections::HashSet;

use crate::coerce::TypeCoercer;
use crate::error::{NameKind, SchemaError};
use crate::types::{
    ArgStyle, ArgType, Argument, Arity, Command, DefaultValue, IMPORT_SEPARATOR, PATH_SEPARATOR,
    SchemaModel,
};

/// Validates a schema model, returning every structural error found.
///
/// An empty list means the model is valid.
pub fn validate_model(model: &SchemaModel) -> Vec<SchemaError> {
    let mut errors = Vec::new();
    let mut path = Vec::new();
    validate_commands(&model.commands, &mut path, &mut errors);
    errors
}

fn validate_commands(commands: &[Command], path: &mut Vec<String>, errors: &mut Vec<SchemaError>) {
    let scope = if path.is_empty() {
        "<root>".to_string()
    } else {
        path.join(&PATH_SEPARATOR.to_string())
    };
    let mut seen: HashSet<&str> = HashSet::new();

    for command in commands {
        let name = command.name.trim();
        if name.is_empty() {
            errors.push(SchemaError::MalformedCommand {
                command: format!("{scope}{PATH_SEPARATOR}<empty>"),
                reason: "command name cannot be empty".to_string(),
            });
            continue;
        }
        if name.contains(PATH_SEPARATOR)
            || name.contains(IMPORT_SEPARATOR)
            || name.contains(char::is_whitespace)
        {
            errors.push(SchemaError::MalformedCommand {
                command: name.to_string(),
                reason: format!(
                    "command names cannot contain whitespace, `{PATH_SEPARATOR}` or `{IMPORT_SEPARATOR}`"
                ),
            });
            continue;
        }
        if !seen.insert(name) {
            errors.push(SchemaError::DuplicateName {
                scope: scope.clone(),
                name: name.to_string(),
                kind: NameKind::Command,
            });
            continue;
        }

        path.push(name.to_string());
        let command_path = path.join(&PATH_SEPARATOR.to_string());
        validate_arguments(&command_path, command, errors);
        validate_commands(&command.subcommands, path, errors);
        path.pop();
    }
}

fn validate_arguments(command_path: &str, command: &Command, errors: &mut Vec<SchemaError>) {
    let mut names: HashSet<&str> = HashSet::new();
    let mut aliases: HashSet<&str> = HashSet::new();

    for argument in command.arguments() {
        if let Err(reason) = check_argument(argument) {
            errors.push(SchemaError::MalformedArgument {
                command: command_path.to_string(),
                argument: argument.name.clone(),
                reason,
            });
        }
        if !names.insert(argument.name.as_str()) {
            errors.push(SchemaError::DuplicateName {
                scope: command_path.to_string(),
                name: argument.name.clone(),
                kind: NameKind::Argument,
            });
        }
        if let Some(alias) = argument.alias_key() {
            if !aliases.insert(alias) {
                errors.push(SchemaError::DuplicateName {
                    scope: command_path.to_string(),
                    name: alias.to_string(),
                    kind: NameKind::Alias,
                });
            }
        }
    }
}

fn check_argument(argument: &Argument) -> Result<(), String> {
    let name = argument.name.as_str();
    if name.trim().is_empty() {
        return Err("argument name cannot be empty".to_string());
    }
    if name.starts_with('-')
        || name.contains(char::is_whitespace)
        || name.contains('=')
        || name.contains(IMPORT_SEPARATOR)
    {
        return Err(format!(
            "argument names cannot start with `-` or contain whitespace, `=` or `{IMPORT_SEPARATOR}`"
        ));
    }
    if argument.alias.is_some() && argument.alias_key().is_none() {
        return Err("alias cannot be empty".to_string());
    }

    match argument.style {
        ArgStyle::Flag => return check_flag(argument),
        ArgStyle::Positional if argument.alias.is_some() => {
            return Err("positional arguments cannot have an alias".to_string());
        }
        ArgStyle::Positional | ArgStyle::Named => {}
    }

    let kind = argument.value_kind();
    match kind {
        ArgType::Bool => return Err("type `bool` is reserved for flags".to_string()),
        ArgType::Enum if argument.choices.is_empty() => {
            return Err("enum arguments require a non-empty `choices` list".to_string());
        }
        ArgType::Class if argument.choices.len() != 1 => {
            return Err(
                "class arguments must name exactly one value constructor in `choices`".to_string(),
            );
        }
        ArgType::String | ArgType::Int | ArgType::Float | ArgType::Dict
            if !argument.choices.is_empty() =>
        {
            return Err(format!("`choices` is not allowed for type `{kind}`"));
        }
        _ => {}
    }

    if let Some(default) = &argument.default {
        if let (DefaultValue::List(tokens), Arity::One) = (default, argument.arity()) {
            if tokens.len() != 1 {
                return Err("a list default requires multiplicity `one_or_more`".to_string());
            }
        }
        // Class defaults depend on runtime constructors and are checked on use.
        if kind != ArgType::Class {
            TypeCoercer::empty()
                .default_value(argument)
                .map_err(|err| format!("invalid default: {err}"))?;
        }
    }

    Ok(())
}

fn check_flag(argument: &Argument) -> Result<(), String> {
    if let Some(value_type) = argument.value_type {
        if value_type != ArgType::Bool {
            return Err(format!("flags cannot have type `{value_type}`"));
        }
    }
    if argument.multiplicity.is_some() {
        return Err("flags cannot declare a multiplicity".to_string());
    }
    if !argument.choices.is_empty() {
        return Err("flags cannot declare choices".to_string());
    }
    if argument.default.is_some() {
        return Err("flags cannot declare a default".to_string());
    }
    if argument.required == Some(true) {
        return Err("flags cannot be required".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ImportRef;

    fn model(commands: Vec<Command>) -> SchemaModel {
        SchemaModel {
            name: "dl".into(),
            help: None,
            commands,
        }
    }

    fn single_error(commands: Vec<Command>) -> SchemaError {
        let errors = validate_model(&model(commands));
        assert_eq!(errors.len(), 1, "expected one error, got {errors:?}");
        errors.into_iter().next().unwrap()
    }

    #[test]
    fn test_validate_model_accepts_valid_model() {
        let commands = vec![
            Command::new("train")
                .with_arg(Argument::named("epochs", ArgType::Int).with_default("10"))
                .with_arg(Argument::named("hyper-params", ArgType::Dict).one_or_more().with_default_list(Vec::<String>::new())),
            Command::new("run")
                .with_arg(Argument::positional("classifier", ArgType::String).one_or_more())
                .with_import(ImportRef::all("train")),
        ];
        assert!(validate_model(&model(commands)).is_empty());
    }

    #[test]
    fn test_validate_model_rejects_duplicate_sibling_commands() {
        let err = single_error(vec![Command::new("run"), Command::new("run")]);
        assert_eq!(
            err,
            SchemaError::DuplicateName {
                scope: "<root>".into(),
                name: "run".into(),
                kind: NameKind::Command,
            }
        );
    }

    #[test]
    fn test_same_name_in_different_scopes_is_allowed() {
        let commands = vec![
            Command::new("plot"),
            Command::new("run_analysis").with_subcommand(Command::new("plot")),
        ];
        assert!(validate_model(&model(commands)).is_empty());
    }

    #[test]
    fn test_validate_model_rejects_duplicate_argument_and_alias() {
        let err = single_error(vec![
            Command::new("run")
                .with_arg(Argument::flag("quick"))
                .with_arg(Argument::flag("quick")),
        ]);
        assert!(matches!(err, SchemaError::DuplicateName { kind: NameKind::Argument, .. }));

        let err = single_error(vec![
            Command::new("run")
                .with_arg(Argument::flag("quick").with_alias("q"))
                .with_arg(Argument::flag("quiet").with_alias("-q")),
        ]);
        assert!(matches!(err, SchemaError::DuplicateName { kind: NameKind::Alias, .. }));
    }

    #[test]
    fn test_flag_with_type_is_malformed() {
        let mut flag = Argument::flag("verbose");
        flag.value_type = Some(ArgType::Int);
        let err = single_error(vec![Command::new("run").with_arg(flag)]);
        assert!(matches!(err, SchemaError::MalformedArgument { .. }));
    }

    #[test]
    fn test_enum_default_must_be_a_choice() {
        let arg = Argument::named("plot-type", ArgType::Enum)
            .with_choices(["line", "bar"])
            .with_default("pie");
        let err = single_error(vec![Command::new("plot").with_arg(arg)]);
        match err {
            SchemaError::MalformedArgument { command, argument, reason } => {
                assert_eq!(command, "plot");
                assert_eq!(argument, "plot-type");
                assert!(reason.contains("pie"), "{reason}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_class_requires_single_constructor() {
        let arg = Argument::named("file", ArgType::Class);
        let err = single_error(vec![Command::new("predict").with_arg(arg)]);
        assert!(matches!(err, SchemaError::MalformedArgument { .. }));
    }

    #[test]
    fn test_positional_alias_is_malformed() {
        let arg = Argument::positional("classifier", ArgType::String).with_alias("c");
        let err = single_error(vec![Command::new("run").with_arg(arg)]);
        assert!(matches!(err, SchemaError::MalformedArgument { .. }));
    }

    #[test]
    fn test_nested_errors_report_full_path() {
        let err = single_error(vec![Command::new("run_analysis").with_subcommand(
            Command::new("summarize").with_arg(Argument::named("bad", ArgType::Bool)),
        )]);
        assert!(
            matches!(err, SchemaError::MalformedArgument { ref command, .. } if command == "run_analysis.summarize")
        );
    }

    #[test]
    fn test_command_name_with_separator_is_malformed() {
        let err = single_error(vec![Command::new("run.fast")]);
        assert!(matches!(err, SchemaError::MalformedCommand { .. }));
    }

    #[test]
    fn test_all_errors_are_collected() {
        let errors = validate_model(&model(vec![
            Command::new("a").with_arg(Argument::named("x", ArgType::Enum)),
            Command::new("b").with_arg(Argument::named("y", ArgType::Int).with_default("ten")),
        ]));
        assert_eq!(errors.len(), 2);
    }
}
