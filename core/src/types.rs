//! Schema model type definitions.
//!
//! A [`SchemaModel`] is a tree of [`Command`]s. Each command owns an ordered
//! list of [`Declaration`]s: local [`Argument`]s interleaved with
//! [`ImportRef`] directives that pull arguments from other commands. The
//! model is immutable once loaded; import expansion produces a separate
//! [`ResolvedSchema`](crate::ResolvedSchema).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SchemaError;

/// Separator between segments of a command path (`run_analysis.summarize`).
pub const PATH_SEPARATOR: char = '.';

/// Separator between source command and selector in an import directive.
pub const IMPORT_SEPARATOR: char = '/';

/// Selector marker that imports every argument of the source command.
pub const WILDCARD: &str = "*";

/// How an argument appears on the command line.
///
/// # Examples
///
/// ```
/// use argspec_core::ArgStyle;
///
/// let style: ArgStyle = serde_json::from_str("\"flag\"").unwrap();
/// assert_eq!(style, ArgStyle::Flag);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgStyle {
    /// Filled by position, in declaration order.
    Positional,
    /// `--name value` / `-alias value`.
    Named,
    /// `--name`, presence only.
    Flag,
}

impl fmt::Display for ArgStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Positional => "positional",
            Self::Named => "named",
            Self::Flag => "flag",
        };
        f.write_str(label)
    }
}

impl FromStr for ArgStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "positional" => Ok(Self::Positional),
            "named" => Ok(Self::Named),
            "flag" => Ok(Self::Flag),
            other => Err(format!(
                "unknown style `{other}`, expected `positional`, `named` or `flag`"
            )),
        }
    }
}

/// Declared value type of an argument.
///
/// Non-flag arguments default to [`ArgType::String`]. [`ArgType::Bool`] is
/// reserved for flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgType {
    /// Raw string.
    #[default]
    #[serde(rename = "str", alias = "string")]
    String,
    /// Signed 64-bit integer.
    Int,
    /// 64-bit float.
    Float,
    /// Presence flag.
    #[serde(alias = "bool-flag")]
    Bool,
    /// One of `choices`.
    Enum,
    /// `key=value` tokens merged into a mapping.
    Dict,
    /// Token handed to the named value constructor in `choices`.
    #[serde(alias = "class-constrained")]
    Class,
}

impl fmt::Display for ArgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::String => "str",
            Self::Int => "int",
            Self::Float => "float",
            Self::Bool => "bool",
            Self::Enum => "enum",
            Self::Dict => "dict",
            Self::Class => "class",
        };
        f.write_str(label)
    }
}

impl FromStr for ArgType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "str" | "string" => Ok(Self::String),
            "int" => Ok(Self::Int),
            "float" => Ok(Self::Float),
            "bool" | "bool-flag" => Ok(Self::Bool),
            "enum" => Ok(Self::Enum),
            "dict" => Ok(Self::Dict),
            "class" | "class-constrained" => Ok(Self::Class),
            other => Err(format!("unknown type `{other}`")),
        }
    }
}

/// Declared token multiplicity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Multiplicity {
    #[default]
    #[serde(rename = "one", alias = "1")]
    One,
    #[serde(rename = "one_or_more", alias = "+")]
    OneOrMore,
}

impl FromStr for Multiplicity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "one" | "1" => Ok(Self::One),
            "one_or_more" | "+" => Ok(Self::OneOrMore),
            other => Err(format!("unknown multiplicity `{other}`, expected `1` or `+`")),
        }
    }
}

/// Effective number of tokens an argument consumes.
///
/// Flags have arity zero regardless of their declared multiplicity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Arity {
    Zero,
    One,
    OneOrMore,
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Zero => "no value",
            Self::One => "exactly one value",
            Self::OneOrMore => "one or more values",
        };
        f.write_str(label)
    }
}

/// Textual default of an argument.
///
/// A list default is only meaningful for one-or-more arguments; an empty
/// list yields an empty value rather than an arity error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DefaultValue {
    Single(String),
    List(Vec<String>),
}

impl DefaultValue {
    /// Returns the default as a token list.
    pub fn tokens(&self) -> Vec<&str> {
        match self {
            Self::Single(token) => vec![token.as_str()],
            Self::List(tokens) => tokens.iter().map(String::as_str).collect(),
        }
    }
}

impl fmt::Display for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(token) => f.write_str(token),
            Self::List(tokens) => write!(f, "[{}]", tokens.join(", ")),
        }
    }
}

/// A single argument declaration.
///
/// Build arguments with [`positional`](Argument::positional),
/// [`named`](Argument::named) or [`flag`](Argument::flag) and chain the
/// builder methods.
///
/// # Examples
///
/// ```
/// use argspec_core::{Argument, ArgType, Arity};
///
/// let mode = Argument::named("output-mode", ArgType::Enum)
///     .with_alias("o")
///     .with_choices(["detection", "classification"])
///     .with_default("detection");
/// assert!(!mode.is_required());
/// assert_eq!(mode.short_form().as_deref(), Some("-o"));
///
/// let classifiers = Argument::positional("classifier", ArgType::String).one_or_more();
/// assert_eq!(classifiers.arity(), Arity::OneOrMore);
/// assert!(classifiers.is_required());
///
/// let quick = Argument::flag("quick-cross");
/// assert_eq!(quick.arity(), Arity::Zero);
/// assert!(!quick.is_required());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Argument {
    /// Name, matched as `--name` for options.
    pub name: String,
    /// Short form, matched as `-alias`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    /// Description for help output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
    pub style: ArgStyle,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<ArgType>,
    #[serde(default, alias = "nargs", skip_serializing_if = "Option::is_none")]
    pub multiplicity: Option<Multiplicity>,
    /// Allowed literals for enums; the constructor name for class arguments.
    #[serde(default, alias = "options", skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<DefaultValue>,
    /// Explicit requiredness; when unset an argument is required iff it has
    /// no default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
}

impl Argument {
    fn new(name: &str, style: ArgStyle, value_type: Option<ArgType>) -> Self {
        Self {
            name: name.to_string(),
            alias: None,
            help: None,
            style,
            value_type,
            multiplicity: None,
            choices: Vec::new(),
            default: None,
            required: None,
        }
    }

    /// Creates a positional argument.
    pub fn positional(name: &str, value_type: ArgType) -> Self {
        Self::new(name, ArgStyle::Positional, Some(value_type))
    }

    /// Creates a named option that takes a value.
    pub fn named(name: &str, value_type: ArgType) -> Self {
        Self::new(name, ArgStyle::Named, Some(value_type))
    }

    /// Creates a presence-only flag.
    pub fn flag(name: &str) -> Self {
        Self::new(name, ArgStyle::Flag, None)
    }

    pub fn with_alias(mut self, alias: &str) -> Self {
        self.alias = Some(alias.to_string());
        self
    }

    pub fn with_help(mut self, help: &str) -> Self {
        self.help = Some(help.to_string());
        self
    }

    /// Marks the argument as consuming one or more tokens.
    pub fn one_or_more(mut self) -> Self {
        self.multiplicity = Some(Multiplicity::OneOrMore);
        self
    }

    pub fn with_choices<I, S>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.choices = choices.into_iter().map(Into::into).collect();
        self
    }

    /// Sets a class argument's value constructor (e.g. `"path"`).
    pub fn with_constructor(mut self, constructor: &str) -> Self {
        self.choices = vec![constructor.to_string()];
        self
    }

    pub fn with_default(mut self, default: &str) -> Self {
        self.default = Some(DefaultValue::Single(default.to_string()));
        self
    }

    pub fn with_default_list<I, S>(mut self, defaults: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.default = Some(DefaultValue::List(
            defaults.into_iter().map(Into::into).collect(),
        ));
        self
    }

    /// Makes the argument optional even without a default.
    pub fn optional(mut self) -> Self {
        self.required = Some(false);
        self
    }

    pub fn required(mut self) -> Self {
        self.required = Some(true);
        self
    }

    pub fn is_flag(&self) -> bool {
        self.style == ArgStyle::Flag
    }

    pub fn is_positional(&self) -> bool {
        self.style == ArgStyle::Positional
    }

    /// Effective value type: flags are always [`ArgType::Bool`].
    pub fn value_kind(&self) -> ArgType {
        if self.is_flag() {
            ArgType::Bool
        } else {
            self.value_type.unwrap_or_default()
        }
    }

    pub fn arity(&self) -> Arity {
        if self.is_flag() {
            return Arity::Zero;
        }
        match self.multiplicity.unwrap_or_default() {
            Multiplicity::One => Arity::One,
            Multiplicity::OneOrMore => Arity::OneOrMore,
        }
    }

    /// Flags are never required; other styles are required when marked so
    /// or when they carry no default.
    pub fn is_required(&self) -> bool {
        if self.is_flag() {
            return false;
        }
        self.required.unwrap_or(self.default.is_none())
    }

    /// Constructor name of a class argument.
    pub fn constructor(&self) -> Option<&str> {
        match self.value_kind() {
            ArgType::Class => self.choices.first().map(String::as_str),
            _ => None,
        }
    }

    /// Alias with any leading dashes removed.
    pub fn alias_key(&self) -> Option<&str> {
        self.alias
            .as_deref()
            .map(|alias| alias.trim_start_matches('-'))
            .filter(|alias| !alias.is_empty())
    }

    pub fn long_form(&self) -> String {
        format!("--{}", self.name)
    }

    pub fn short_form(&self) -> Option<String> {
        self.alias_key().map(|alias| format!("-{alias}"))
    }
}

/// What an import directive selects from its source command.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Selector {
    /// `source/*`
    All,
    /// `source/name`
    Argument(String),
}

/// An `import_args` directive: `source/arg` or `source/*`.
///
/// # Examples
///
/// ```
/// use argspec_core::{ImportRef, Selector};
///
/// let all: ImportRef = "train/*".parse().unwrap();
/// assert_eq!(all.source, "train");
/// assert_eq!(all.selector, Selector::All);
///
/// let one: ImportRef = "run_analysis.plot/min-delta".parse().unwrap();
/// assert_eq!(one.source, "run_analysis.plot");
/// assert_eq!(one.selector, Selector::Argument("min-delta".into()));
///
/// assert!("no-selector".parse::<ImportRef>().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImportRef {
    /// Full dotted path or bare name of the source command.
    pub source: String,
    pub selector: Selector,
}

impl ImportRef {
    /// Imports every argument of `source`.
    pub fn all(source: &str) -> Self {
        Self {
            source: source.to_string(),
            selector: Selector::All,
        }
    }

    /// Imports the single argument `name` of `source`.
    pub fn argument(source: &str, name: &str) -> Self {
        Self {
            source: source.to_string(),
            selector: Selector::Argument(name.to_string()),
        }
    }
}

impl FromStr for ImportRef {
    type Err = SchemaError;

    fn from_str(directive: &str) -> Result<Self, Self::Err> {
        let malformed = || SchemaError::MalformedImport {
            directive: directive.to_string(),
        };
        let (source, selector) = directive.split_once(IMPORT_SEPARATOR).ok_or_else(malformed)?;
        let (source, selector) = (source.trim(), selector.trim());
        if source.is_empty() || selector.is_empty() || selector.contains(IMPORT_SEPARATOR) {
            return Err(malformed());
        }
        let selector = if selector == WILDCARD {
            Selector::All
        } else {
            Selector::Argument(selector.to_string())
        };
        Ok(Self {
            source: source.to_string(),
            selector,
        })
    }
}

impl fmt::Display for ImportRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.selector {
            Selector::All => write!(f, "{}{IMPORT_SEPARATOR}{WILDCARD}", self.source),
            Selector::Argument(name) => write!(f, "{}{IMPORT_SEPARATOR}{name}", self.source),
        }
    }
}

/// One entry of a command's declared argument list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Declaration {
    Argument(Argument),
    Import(ImportRef),
}

/// A command and its nested sub-commands.
///
/// # Examples
///
/// ```
/// use argspec_core::{Argument, ArgType, Command, ImportRef};
///
/// let run = Command::new("run")
///     .with_arg(Argument::flag("store-model"))
///     .with_import(ImportRef::all("train"));
/// assert_eq!(run.arguments().count(), 1);
/// assert_eq!(run.imports().count(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub name: String,
    pub help: Option<String>,
    /// Arguments and import directives in declaration order.
    pub declarations: Vec<Declaration>,
    /// Nested sub-parser group.
    pub subcommands: Vec<Command>,
}

impl Command {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            help: None,
            declarations: Vec::new(),
            subcommands: Vec::new(),
        }
    }

    pub fn with_help(mut self, help: &str) -> Self {
        self.help = Some(help.to_string());
        self
    }

    /// Appends a local argument declaration.
    pub fn with_arg(mut self, argument: Argument) -> Self {
        self.declarations.push(Declaration::Argument(argument));
        self
    }

    /// Appends an import directive.
    pub fn with_import(mut self, import: ImportRef) -> Self {
        self.declarations.push(Declaration::Import(import));
        self
    }

    pub fn with_subcommand(mut self, command: Command) -> Self {
        self.subcommands.push(command);
        self
    }

    /// Local (declared) arguments in order.
    pub fn arguments(&self) -> impl Iterator<Item = &Argument> {
        self.declarations.iter().filter_map(|decl| match decl {
            Declaration::Argument(argument) => Some(argument),
            Declaration::Import(_) => None,
        })
    }

    /// Import directives in order.
    pub fn imports(&self) -> impl Iterator<Item = &ImportRef> {
        self.declarations.iter().filter_map(|decl| match decl {
            Declaration::Import(import) => Some(import),
            Declaration::Argument(_) => None,
        })
    }
}

/// The loaded, validated schema: a named tree of commands.
///
/// Construct with [`SchemaModel::load`] from a
/// [`SchemaDescription`](crate::SchemaDescription) or
/// [`SchemaModel::from_commands`] in code. Both run the load-time checks of
/// [`validate_model`](crate::validate_model).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaModel {
    /// Program name.
    pub name: String,
    pub help: Option<String>,
    pub commands: Vec<Command>,
}

impl SchemaModel {
    /// Builds and validates a model from commands constructed in code.
    ///
    /// # Errors
    ///
    /// Returns the first [`SchemaError`] reported by
    /// [`validate_model`](crate::validate_model).
    ///
    /// # Examples
    ///
    /// ```
    /// use argspec_core::*;
    ///
    /// let model = SchemaModel::from_commands("dl", vec![
    ///     Command::new("train").with_arg(Argument::named("epochs", ArgType::Int).with_default("10")),
    /// ]).unwrap();
    /// assert_eq!(model.commands.len(), 1);
    ///
    /// let dup = SchemaModel::from_commands("dl", vec![Command::new("a"), Command::new("a")]);
    /// assert!(matches!(dup, Err(SchemaError::DuplicateName { .. })));
    /// ```
    pub fn from_commands(name: &str, commands: Vec<Command>) -> Result<Self, SchemaError> {
        let model = Self {
            name: name.to_string(),
            help: None,
            commands,
        };
        model.validated()
    }

    pub(crate) fn validated(self) -> Result<Self, SchemaError> {
        match crate::validate_model(&self).into_iter().next() {
            Some(err) => Err(err),
            None => Ok(self),
        }
    }

    /// Total number of commands in the tree.
    pub fn command_count(&self) -> usize {
        fn count(commands: &[Command]) -> usize {
            commands
                .iter()
                .map(|command| 1 + count(&command.subcommands))
                .sum()
        }
        count(&self.commands)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argument_deserializes_legacy_fields() {
        let arg: Argument = serde_json::from_str(
            r#"{"name": "classifier", "style": "positional", "nargs": "+", "type": "enum", "options": ["FullyConnectedModel", "LinearConv1Model"]}"#,
        )
        .unwrap();

        assert_eq!(arg.arity(), Arity::OneOrMore);
        assert_eq!(arg.value_kind(), ArgType::Enum);
        assert_eq!(arg.choices.len(), 2);
        assert!(arg.is_required());
    }

    #[test]
    fn test_default_value_accepts_string_or_list() {
        let single: DefaultValue = serde_json::from_str("\"0\"").unwrap();
        let list: DefaultValue = serde_json::from_str("[\"a=1\", \"b=2\"]").unwrap();

        assert_eq!(single.tokens(), vec!["0"]);
        assert_eq!(list.tokens(), vec!["a=1", "b=2"]);
    }

    #[test]
    fn test_flag_has_zero_arity_and_bool_kind() {
        let flag = Argument::flag("test-separately");
        assert_eq!(flag.arity(), Arity::Zero);
        assert_eq!(flag.value_kind(), ArgType::Bool);
        assert!(!flag.is_required());
    }

    #[test]
    fn test_alias_dashes_are_normalized() {
        let arg = Argument::named("k-cross", ArgType::Int).with_alias("-k");
        assert_eq!(arg.alias_key(), Some("k"));
        assert_eq!(arg.short_form().as_deref(), Some("-k"));
        assert_eq!(arg.long_form(), "--k-cross");
    }

    #[test]
    fn test_import_ref_display_round_trips() {
        for directive in ["train/*", "run/k-cross"] {
            let parsed: ImportRef = directive.parse().unwrap();
            assert_eq!(parsed.to_string(), directive);
        }
    }

    #[test]
    fn test_import_ref_rejects_empty_parts() {
        for directive in ["/x", "train/", "train", "a/b/c"] {
            assert!(
                matches!(
                    directive.parse::<ImportRef>(),
                    Err(SchemaError::MalformedImport { .. })
                ),
                "{directive} should be rejected"
            );
        }
    }

    #[test]
    fn test_command_count_includes_nested() {
        let model = SchemaModel {
            name: "dl".into(),
            help: None,
            commands: vec![
                Command::new("run"),
                Command::new("run_analysis")
                    .with_subcommand(Command::new("summarize"))
                    .with_subcommand(Command::new("plot")),
            ],
        };
        assert_eq!(model.command_count(), 4);
    }
}
