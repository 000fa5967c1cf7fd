//! Help text for resolved commands.

use std::fmt::Write as _;

use serde::Serialize;

use crate::resolve::ResolvedCommand;
use crate::types::{ArgStyle, ArgType, Argument, Arity, DefaultValue, PATH_SEPARATOR};

/// Serializable description of one resolved argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArgumentHelp {
    pub name: String,
    /// Invocation form: `<name>`, `--name`, or `--name/-alias`.
    pub usage: String,
    pub style: ArgStyle,
    #[serde(rename = "type")]
    pub value_type: ArgType,
    pub arity: Arity,
    pub required: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandHelp {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
    pub arguments: Vec<ArgumentHelp>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub subcommands: Vec<String>,
}

pub fn describe(command: &ResolvedCommand) -> CommandHelp {
    CommandHelp {
        path: command.path.clone(),
        help: command.help.clone(),
        arguments: command.arguments.iter().map(describe_argument).collect(),
        subcommands: command.subcommands.clone(),
    }
}

fn describe_argument(argument: &Argument) -> ArgumentHelp {
    let usage = match (argument.style, argument.short_form()) {
        (ArgStyle::Positional, _) => format!("<{}>", argument.name),
        (_, Some(short)) => format!("{}/{short}", argument.long_form()),
        (_, None) => argument.long_form(),
    };
    ArgumentHelp {
        name: argument.name.clone(),
        usage,
        style: argument.style,
        value_type: argument.value_kind(),
        arity: argument.arity(),
        required: argument.is_required(),
        choices: argument.choices.clone(),
        default: argument.default.as_ref().map(DefaultValue::to_string),
        help: argument.help.clone(),
    }
}

/// Renders a usage line followed by an argument table.
///
/// # Examples
///
/// ```
/// use argspec_core::*;
///
/// let model = SchemaModel::from_commands("dl", vec![
///     Command::new("run")
///         .with_arg(Argument::positional("classifier", ArgType::String).one_or_more())
///         .with_arg(Argument::flag("quick-cross").with_alias("q").with_help("use 3-fold cross validation")),
/// ]).unwrap();
/// let schema = resolve(&model).unwrap();
///
/// let text = render_help(schema.get("run").unwrap(), "dl");
/// assert!(text.starts_with("usage: dl run [options] <classifier>..."));
/// assert!(text.contains("--quick-cross/-q"));
/// ```
pub fn render_help(command: &ResolvedCommand, program: &str) -> String {
    let mut out = String::new();
    let path = command.path.replace(PATH_SEPARATOR, " ");
    let _ = write!(out, "usage: {program} {path}");
    if !command.subcommands.is_empty() {
        out.push_str(" <command>");
    }
    if command.options().next().is_some() {
        out.push_str(" [options]");
    }
    for positional in command.positionals() {
        let mut slot = format!("<{}>", positional.name);
        if positional.arity() == Arity::OneOrMore {
            slot.push_str("...");
        }
        if !positional.is_required() {
            slot = format!("[{slot}]");
        }
        let _ = write!(out, " {slot}");
    }
    out.push('\n');

    if let Some(help) = &command.help {
        let _ = write!(out, "\n{help}\n");
    }

    let rows: Vec<(String, String)> = command
        .arguments
        .iter()
        .map(describe_argument)
        .map(|argument| (argument.usage.clone(), argument_detail(&argument)))
        .collect();
    if !rows.is_empty() {
        let width = rows.iter().map(|(usage, _)| usage.len()).max().unwrap_or(0);
        out.push_str("\narguments:\n");
        for (usage, detail) in rows {
            let _ = writeln!(out, "  {usage:<width$}  {detail}");
        }
    }

    if !command.subcommands.is_empty() {
        out.push_str("\ncommands:\n");
        for name in &command.subcommands {
            let _ = writeln!(out, "  {name}");
        }
    }
    out
}

fn argument_detail(argument: &ArgumentHelp) -> String {
    let mut parts = Vec::new();
    if let Some(help) = &argument.help {
        parts.push(help.clone());
    }
    if argument.style != ArgStyle::Flag {
        let mut kind = argument.value_type.to_string();
        if argument.arity == Arity::OneOrMore {
            kind.push('+');
        }
        parts.push(format!("[{kind}]"));
    }
    if !argument.choices.is_empty() && argument.value_type == ArgType::Enum {
        parts.push(format!("one of: {}", argument.choices.join(", ")));
    }
    if let Some(default) = &argument.default {
        parts.push(format!("(default: {default})"));
    } else if argument.required {
        parts.push("(required)".to_string());
    }
    parts.join(" ")
}
