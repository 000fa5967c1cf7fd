//! Serializable schema description and its conversion into a [`SchemaModel`].
//!
//! The description is the on-disk encoding (JSON or YAML). Argument lists
//! may interleave argument objects with `{"import": "source/selector"}`
//! entries; the legacy `import_args` list is treated as declared after all
//! `args` entries. Argument `style`, `type` and `nargs` are kept as text
//! until conversion, so an unknown value is reported as a
//! [`SchemaError::MalformedArgument`] naming the command and argument.
//!
//! # Example
//!
//! ```
//! use argspec_core::*;
//!
//! let description: SchemaDescription = serde_json::from_str(r#"{
//!     "name": "dl_manager",
//!     "commands": [
//!         {"name": "train", "args": [
//!             {"name": "epochs", "style": "named", "type": "int", "default": "10"}
//!         ]},
//!         {"name": "run", "args": [
//!             {"name": "store-model", "style": "flag"},
//!             {"import": "train/*"}
//!         ]}
//!     ]
//! }"#).unwrap();
//!
//! let model = SchemaModel::load(description).unwrap();
//! assert_eq!(model.commands[1].imports().count(), 1);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::SchemaError;
use crate::types::{
    ArgStyle, ArgType, Argument, Command, Declaration, DefaultValue, ImportRef, Multiplicity,
    PATH_SEPARATOR, SchemaModel,
};

/// Top-level schema document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDescription {
    /// Program name.
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
    #[serde(default)]
    pub commands: Vec<CommandDescription>,
}

/// One command in a schema document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandDescription {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<EntryDescription>,
    /// Import directives declared after every entry of `args`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub import_args: Vec<String>,
    #[serde(default, alias = "subparsers", skip_serializing_if = "Vec::is_empty")]
    pub subcommands: Vec<CommandDescription>,
}

/// An `args` entry: an inline import directive or an argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntryDescription {
    Import { import: String },
    Argument(ArgumentDescription),
}

/// An argument object as written in a schema document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgumentDescription {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<String>,
    #[serde(default, alias = "nargs", skip_serializing_if = "Option::is_none")]
    pub multiplicity: Option<Literal>,
    #[serde(default, alias = "options", skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<Literal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<DefaultDescription>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
}

/// A scalar that schema authors may write unquoted (`nargs: 1`, `default: 10`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    Text(String),
    Number(serde_json::Number),
    Bool(bool),
}

impl Literal {
    fn into_text(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Number(number) => number.to_string(),
            Self::Bool(value) => value.to_string(),
        }
    }
}

/// A default as written: one literal or a list of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DefaultDescription {
    Single(Literal),
    List(Vec<Literal>),
}

impl From<DefaultDescription> for DefaultValue {
    fn from(default: DefaultDescription) -> Self {
        match default {
            DefaultDescription::Single(literal) => Self::Single(literal.into_text()),
            DefaultDescription::List(literals) => {
                Self::List(literals.into_iter().map(Literal::into_text).collect())
            }
        }
    }
}

impl ArgumentDescription {
    /// Converts into an [`Argument`] of the command at `command_path`.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::MalformedArgument`] when `style` is missing or
    /// `style`, `type` or `nargs` is not a recognized value.
    pub fn into_argument(self, command_path: &str) -> Result<Argument, SchemaError> {
        let reject = |reason: String| SchemaError::MalformedArgument {
            command: command_path.to_string(),
            argument: self.name.clone(),
            reason,
        };

        let style = match self.style.as_deref() {
            Some(style) => style.parse::<ArgStyle>().map_err(reject)?,
            None => return Err(reject("missing `style`".to_string())),
        };
        let value_type = self
            .value_type
            .as_deref()
            .map(str::parse::<ArgType>)
            .transpose()
            .map_err(reject)?;
        let multiplicity = self
            .multiplicity
            .map(|literal| literal.into_text().parse::<Multiplicity>())
            .transpose()
            .map_err(reject)?;

        Ok(Argument {
            name: self.name,
            alias: self.alias,
            help: self.help,
            style,
            value_type,
            multiplicity,
            choices: self.choices.into_iter().map(Literal::into_text).collect(),
            default: self.default.map(DefaultValue::from),
            required: self.required,
        })
    }
}

impl SchemaDescription {
    /// Appends the commands of `other`, keeping this description's name and
    /// help unless they are empty.
    pub fn merge(&mut self, other: SchemaDescription) {
        if self.name.is_empty() {
            self.name = other.name;
        }
        if self.help.is_none() {
            self.help = other.help;
        }
        self.commands.extend(other.commands);
    }
}

impl SchemaModel {
    /// Converts and validates a schema description.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::MalformedImport`] for directives that are not
    /// `source/selector`, [`SchemaError::MalformedArgument`] for arguments
    /// with an unknown style, type or multiplicity, otherwise the first
    /// error reported by [`validate_model`](crate::validate_model).
    pub fn load(description: SchemaDescription) -> Result<Self, SchemaError> {
        let commands = description
            .commands
            .into_iter()
            .map(|command| convert_command(command, None))
            .collect::<Result<Vec<_>, _>>()?;
        let model = Self {
            name: description.name,
            help: description.help,
            commands,
        };
        model.validated()
    }
}

fn convert_command(
    description: CommandDescription,
    parent: Option<&str>,
) -> Result<Command, SchemaError> {
    let path = match parent {
        Some(parent) => format!("{parent}{PATH_SEPARATOR}{}", description.name),
        None => description.name.clone(),
    };

    let mut declarations = Vec::with_capacity(description.args.len() + description.import_args.len());
    for entry in description.args {
        declarations.push(match entry {
            EntryDescription::Import { import } => Declaration::Import(import.parse::<ImportRef>()?),
            EntryDescription::Argument(argument) => {
                Declaration::Argument(argument.into_argument(&path)?)
            }
        });
    }
    for directive in &description.import_args {
        declarations.push(Declaration::Import(directive.parse::<ImportRef>()?));
    }

    let subcommands = description
        .subcommands
        .into_iter()
        .map(|command| convert_command(command, Some(&path)))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Command {
        name: description.name,
        help: description.help,
        declarations,
        subcommands,
    })
}
