//! Import resolution.
//!
//! [`resolve`] expands every `import_args` directive into concrete argument
//! copies and produces a [`ResolvedSchema`]: one flat, self-contained
//! argument list per command.
//!
//! Commands form a dependency graph (an edge `A -> B` means "A imports from
//! B"). The graph is walked depth-first in declaration order to obtain a
//! topological order, failing with [`ImportError::CyclicImport`] on any back
//! edge, so a source is always fully resolved before anything imports from
//! it.
//!
//! Within a command, local arguments and directive expansions are
//! concatenated in declaration order. When an argument's name or alias is
//! already present, the earlier entry wins and the later one is dropped.
//!
//! # Example
//!
//! ```
//! use argspec_core::*;
//!
//! let model = SchemaModel::from_commands("dl", vec![
//!     Command::new("train")
//!         .with_arg(Argument::named("epochs", ArgType::Int).with_default("10"))
//!         .with_arg(Argument::named("batch-size", ArgType::Int).with_default("32")),
//!     Command::new("run")
//!         .with_arg(Argument::named("epochs", ArgType::Int).with_default("1"))
//!         .with_import(ImportRef::all("train")),
//! ]).unwrap();
//!
//! let resolved = resolve(&model).unwrap();
//! let run = resolved.get("run").unwrap();
//! assert_eq!(run.argument_names(), vec!["epochs", "batch-size"]);
//! assert_eq!(run.arguments[0].default, Some(DefaultValue::Single("1".into())));
//! ```

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::debug;

use crate::error::ImportError;
use crate::types::{
    Argument, Arity, Command, Declaration, PATH_SEPARATOR, SchemaModel, Selector,
};

/// A command after import expansion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedCommand {
    /// Dotted path from the top level (`run_analysis.summarize`).
    pub path: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
    /// Fully expanded, de-duplicated arguments in declaration order.
    pub arguments: Vec<Argument>,
    /// Names of direct sub-commands, in declaration order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub subcommands: Vec<String>,
}

impl ResolvedCommand {
    pub fn find_argument(&self, name: &str) -> Option<&Argument> {
        self.arguments.iter().find(|arg| arg.name == name)
    }

    /// Finds a named/flag argument by its long name (without `--`).
    pub fn find_long(&self, name: &str) -> Option<&Argument> {
        self.options().find(|arg| arg.name == name)
    }

    /// Finds a named/flag argument by its alias (without `-`).
    pub fn find_short(&self, alias: &str) -> Option<&Argument> {
        self.options().find(|arg| arg.alias_key() == Some(alias))
    }

    pub fn positionals(&self) -> impl Iterator<Item = &Argument> {
        self.arguments.iter().filter(|arg| arg.is_positional())
    }

    /// Named and flag arguments.
    pub fn options(&self) -> impl Iterator<Item = &Argument> {
        self.arguments.iter().filter(|arg| !arg.is_positional())
    }

    pub fn argument_names(&self) -> Vec<&str> {
        self.arguments.iter().map(|arg| arg.name.as_str()).collect()
    }

    /// Positionals that make slot filling ambiguous.
    ///
    /// A one-or-more positional consumes every remaining positional token, so
    /// any later positional that is required or itself one-or-more can never
    /// be filled. Returns the greedy slot followed by the conflicting ones.
    pub fn positional_hazard(&self) -> Option<Vec<String>> {
        let positionals: Vec<&Argument> = self.positionals().collect();
        let greedy = positionals
            .iter()
            .position(|arg| arg.arity() == Arity::OneOrMore)?;
        let conflicting: Vec<String> = positionals[greedy + 1..]
            .iter()
            .filter(|arg| arg.is_required() || arg.arity() == Arity::OneOrMore)
            .map(|arg| arg.name.clone())
            .collect();
        if conflicting.is_empty() {
            return None;
        }
        let mut names = vec![positionals[greedy].name.clone()];
        names.extend(conflicting);
        Some(names)
    }

    /// Groups without arguments of their own can only be invoked through a
    /// sub-command.
    pub fn requires_subcommand(&self) -> bool {
        !self.subcommands.is_empty() && self.arguments.is_empty()
    }
}

/// Resolved commands for a whole schema.
///
/// Commands are stored in pre-order (parents before children, siblings in
/// declaration order) and indexed by dotted path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedSchema {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
    commands: Vec<ResolvedCommand>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl ResolvedSchema {
    /// Looks up a command by dotted path.
    pub fn get(&self, path: &str) -> Option<&ResolvedCommand> {
        self.index.get(path).map(|&idx| &self.commands[idx])
    }

    /// Looks up a command by path segments.
    pub fn get_path<S: AsRef<str>>(&self, segments: &[S]) -> Option<&ResolvedCommand> {
        let path = segments
            .iter()
            .map(AsRef::as_ref)
            .collect::<Vec<_>>()
            .join(&PATH_SEPARATOR.to_string());
        self.get(&path)
    }

    /// Looks up a direct sub-command of `parent`.
    pub fn child(&self, parent: &ResolvedCommand, name: &str) -> Option<&ResolvedCommand> {
        if !parent.subcommands.iter().any(|sub| sub == name) {
            return None;
        }
        self.get(&format!("{}{PATH_SEPARATOR}{name}", parent.path))
    }

    /// All commands in pre-order.
    pub fn commands(&self) -> &[ResolvedCommand] {
        &self.commands
    }

    /// Top-level commands in declaration order.
    pub fn top_level(&self) -> impl Iterator<Item = &ResolvedCommand> {
        self.commands
            .iter()
            .filter(|command| !command.path.contains(PATH_SEPARATOR))
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

struct Node<'a> {
    path: String,
    command: &'a Command,
}

fn flatten<'a>(commands: &'a [Command], prefix: Option<&str>, nodes: &mut Vec<Node<'a>>) {
    for command in commands {
        let path = match prefix {
            Some(prefix) => format!("{prefix}{PATH_SEPARATOR}{}", command.name),
            None => command.name.clone(),
        };
        nodes.push(Node {
            path: path.clone(),
            command,
        });
        flatten(&command.subcommands, Some(&path), nodes);
    }
}

/// Maps source references to node indices: full paths first, then bare
/// names that are unique across the tree.
struct SourceIndex<'a> {
    by_path: HashMap<&'a str, usize>,
    by_name: HashMap<&'a str, Vec<usize>>,
}

impl<'a> SourceIndex<'a> {
    fn new(nodes: &'a [Node<'a>]) -> Self {
        let mut by_path = HashMap::new();
        let mut by_name: HashMap<&str, Vec<usize>> = HashMap::new();
        for (idx, node) in nodes.iter().enumerate() {
            by_path.insert(node.path.as_str(), idx);
            by_name
                .entry(node.command.name.as_str())
                .or_default()
                .push(idx);
        }
        Self { by_path, by_name }
    }

    fn find(&self, nodes: &[Node<'_>], importer: &str, source: &str) -> Result<usize, ImportError> {
        if let Some(&idx) = self.by_path.get(source) {
            return Ok(idx);
        }
        match self.by_name.get(source).map(Vec::as_slice) {
            Some([only]) => Ok(*only),
            Some(candidates) if !candidates.is_empty() => Err(ImportError::AmbiguousSourceCommand {
                command: importer.to_string(),
                source_command: source.to_string(),
                candidates: candidates.iter().map(|&idx| nodes[idx].path.clone()).collect(),
            }),
            _ => Err(ImportError::UnknownSourceCommand {
                command: importer.to_string(),
                source_command: source.to_string(),
            }),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

fn topological_order(nodes: &[Node<'_>], deps: &[Vec<usize>]) -> Result<Vec<usize>, ImportError> {
    let mut marks = vec![Mark::Unvisited; nodes.len()];
    let mut stack = Vec::new();
    let mut order = Vec::with_capacity(nodes.len());
    for start in 0..nodes.len() {
        visit(start, nodes, deps, &mut marks, &mut stack, &mut order)?;
    }
    Ok(order)
}

fn visit(
    idx: usize,
    nodes: &[Node<'_>],
    deps: &[Vec<usize>],
    marks: &mut [Mark],
    stack: &mut Vec<usize>,
    order: &mut Vec<usize>,
) -> Result<(), ImportError> {
    match marks[idx] {
        Mark::Done => return Ok(()),
        Mark::InProgress => {
            let start = stack.iter().position(|&i| i == idx).unwrap_or(0);
            let mut path: Vec<String> = stack[start..]
                .iter()
                .map(|&i| nodes[i].path.clone())
                .collect();
            path.push(nodes[idx].path.clone());
            return Err(ImportError::CyclicImport { path });
        }
        Mark::Unvisited => {}
    }

    marks[idx] = Mark::InProgress;
    stack.push(idx);
    for &dep in &deps[idx] {
        visit(dep, nodes, deps, marks, stack, order)?;
    }
    stack.pop();
    marks[idx] = Mark::Done;
    order.push(idx);
    Ok(())
}

/// Accumulates a command's resolved arguments under the first-wins policy.
struct ArgumentList<'p> {
    command: &'p str,
    arguments: Vec<Argument>,
    names: HashSet<String>,
    aliases: HashSet<String>,
}

impl<'p> ArgumentList<'p> {
    fn new(command: &'p str) -> Self {
        Self {
            command,
            arguments: Vec::new(),
            names: HashSet::new(),
            aliases: HashSet::new(),
        }
    }

    fn push(&mut self, argument: &Argument, origin: Option<&str>) {
        let alias = argument.alias_key();
        let name_taken = self.names.contains(&argument.name);
        let alias_taken = alias.is_some_and(|alias| self.aliases.contains(alias));
        if name_taken || alias_taken {
            debug!(
                command = self.command,
                argument = %argument.name,
                origin = origin.unwrap_or("<local>"),
                "dropping duplicate argument; earlier declaration wins"
            );
            return;
        }
        self.names.insert(argument.name.clone());
        if let Some(alias) = alias {
            self.aliases.insert(alias.to_string());
        }
        self.arguments.push(argument.clone());
    }
}

/// Expands all import directives of `model`.
///
/// Resolution is deterministic: resolving the same model twice yields equal
/// results.
///
/// # Errors
///
/// - [`ImportError::UnknownSourceCommand`] / [`ImportError::AmbiguousSourceCommand`]
///   when a directive's source cannot be identified.
/// - [`ImportError::CyclicImport`] when commands (transitively) import from
///   themselves.
/// - [`ImportError::UnknownImportTarget`] when `source/arg` names an
///   argument absent from the source's resolved list.
///
/// # Examples
///
/// ```
/// use argspec_core::*;
///
/// let model = SchemaModel::from_commands("dl", vec![
///     Command::new("a").with_import(ImportRef::all("b")),
///     Command::new("b").with_import(ImportRef::all("a")),
/// ]).unwrap();
///
/// let err = resolve(&model).unwrap_err();
/// assert!(matches!(err, ImportError::CyclicImport { .. }));
/// ```
pub fn resolve(model: &SchemaModel) -> Result<ResolvedSchema, ImportError> {
    let mut nodes = Vec::new();
    flatten(&model.commands, None, &mut nodes);
    let sources = SourceIndex::new(&nodes);

    let mut deps: Vec<Vec<usize>> = Vec::with_capacity(nodes.len());
    for node in &nodes {
        let node_deps = node
            .command
            .imports()
            .map(|import| sources.find(&nodes, &node.path, &import.source))
            .collect::<Result<Vec<_>, _>>()?;
        deps.push(node_deps);
    }

    let order = topological_order(&nodes, &deps)?;
    debug!(
        order = ?order.iter().map(|&idx| nodes[idx].path.as_str()).collect::<Vec<_>>(),
        "import resolution order"
    );

    let mut resolved: Vec<Option<Vec<Argument>>> = vec![None; nodes.len()];
    for idx in order {
        let arguments = expand(idx, &nodes, &deps[idx], &resolved)?;
        resolved[idx] = Some(arguments);
    }

    let mut commands = Vec::with_capacity(nodes.len());
    let mut index = HashMap::with_capacity(nodes.len());
    for (idx, (node, arguments)) in nodes.iter().zip(resolved).enumerate() {
        index.insert(node.path.clone(), idx);
        commands.push(ResolvedCommand {
            path: node.path.clone(),
            name: node.command.name.clone(),
            help: node.command.help.clone(),
            arguments: arguments.unwrap_or_default(),
            subcommands: node
                .command
                .subcommands
                .iter()
                .map(|sub| sub.name.clone())
                .collect(),
        });
    }

    Ok(ResolvedSchema {
        name: model.name.clone(),
        help: model.help.clone(),
        commands,
        index,
    })
}

fn expand(
    idx: usize,
    nodes: &[Node<'_>],
    deps: &[usize],
    resolved: &[Option<Vec<Argument>>],
) -> Result<Vec<Argument>, ImportError> {
    let node = &nodes[idx];
    let mut list = ArgumentList::new(&node.path);
    let mut sources = deps.iter();

    for declaration in &node.command.declarations {
        let import = match declaration {
            Declaration::Argument(argument) => {
                list.push(argument, None);
                continue;
            }
            Declaration::Import(import) => import,
        };
        // deps were built from the same import sequence.
        let Some(&source) = sources.next() else {
            break;
        };
        let source_path = nodes[source].path.as_str();
        let source_args = resolved[source].as_deref().unwrap_or_default();

        match &import.selector {
            Selector::All => {
                for argument in source_args {
                    list.push(argument, Some(source_path));
                }
            }
            Selector::Argument(name) => {
                let argument = source_args
                    .iter()
                    .find(|arg| arg.name == *name)
                    .ok_or_else(|| ImportError::UnknownImportTarget {
                        command: node.path.clone(),
                        source_command: source_path.to_string(),
                        argument: name.clone(),
                    })?;
                list.push(argument, Some(source_path));
            }
        }
    }

    Ok(list.arguments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ArgType, ImportRef};

    fn named(name: &str) -> Argument {
        Argument::named(name, ArgType::String).with_default("x")
    }

    fn model(commands: Vec<Command>) -> SchemaModel {
        SchemaModel::from_commands("dl", commands).unwrap()
    }

    #[test]
    fn test_commands_without_imports_keep_declared_order() {
        let model = model(vec![Command::new("train")
            .with_arg(named("c"))
            .with_arg(named("a"))
            .with_arg(named("b"))]);
        let resolved = resolve(&model).unwrap();
        assert_eq!(resolved.get("train").unwrap().argument_names(), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_wildcard_copies_source_in_order() {
        let model = model(vec![
            Command::new("src")
                .with_arg(named("a"))
                .with_arg(named("b"))
                .with_arg(named("c")),
            Command::new("dst").with_import(ImportRef::all("src")),
        ]);
        let resolved = resolve(&model).unwrap();
        assert_eq!(resolved.get("dst").unwrap().argument_names(), vec!["a", "b", "c"]);
        assert_eq!(
            resolved.get("dst").unwrap().arguments,
            resolved.get("src").unwrap().arguments
        );
    }

    #[test]
    fn test_local_before_import_overrides() {
        let model = model(vec![
            Command::new("dst")
                .with_arg(Argument::named("x", ArgType::Int).with_default("1"))
                .with_import(ImportRef::all("src")),
            Command::new("src")
                .with_arg(named("w"))
                .with_arg(named("x"))
                .with_arg(named("y")),
        ]);
        let resolved = resolve(&model).unwrap();
        let dst = resolved.get("dst").unwrap();
        assert_eq!(dst.argument_names(), vec!["x", "w", "y"]);
        assert_eq!(dst.arguments[0].value_type, Some(ArgType::Int));
    }

    #[test]
    fn test_local_after_import_is_dropped() {
        let model = model(vec![
            Command::new("src").with_arg(named("x")),
            Command::new("dst")
                .with_import(ImportRef::all("src"))
                .with_arg(Argument::named("x", ArgType::Int).with_default("1")),
        ]);
        let resolved = resolve(&model).unwrap();
        let dst = resolved.get("dst").unwrap();
        assert_eq!(dst.argument_names(), vec!["x"]);
        assert_eq!(dst.arguments[0].value_type, Some(ArgType::String));
    }

    #[test]
    fn test_directives_interleave_with_local_arguments() {
        let model = model(vec![
            Command::new("a").with_arg(named("a1")).with_arg(named("a2")),
            Command::new("b").with_arg(named("b1")),
            Command::new("dst")
                .with_arg(named("first"))
                .with_import(ImportRef::all("a"))
                .with_arg(named("middle"))
                .with_import(ImportRef::argument("b", "b1"))
                .with_arg(named("last")),
        ]);
        let resolved = resolve(&model).unwrap();
        assert_eq!(
            resolved.get("dst").unwrap().argument_names(),
            vec!["first", "a1", "a2", "middle", "b1", "last"]
        );
    }

    #[test]
    fn test_same_wildcard_from_two_sources_is_deduplicated() {
        let model = model(vec![
            Command::new("base").with_arg(named("db")).with_arg(named("threads")),
            Command::new("train").with_import(ImportRef::all("base")),
            Command::new("run")
                .with_import(ImportRef::all("base"))
                .with_import(ImportRef::all("train")),
        ]);
        let resolved = resolve(&model).unwrap();
        assert_eq!(resolved.get("run").unwrap().argument_names(), vec!["db", "threads"]);
    }

    #[test]
    fn test_alias_collision_drops_later_argument() {
        let model = model(vec![
            Command::new("src").with_arg(named("quick").with_alias("q")),
            Command::new("dst")
                .with_arg(named("quiet").with_alias("q"))
                .with_import(ImportRef::all("src")),
        ]);
        let resolved = resolve(&model).unwrap();
        assert_eq!(resolved.get("dst").unwrap().argument_names(), vec!["quiet"]);
    }

    #[test]
    fn test_transitive_imports_resolve_in_dependency_order() {
        // Declared before its sources; the topological walk must still see
        // fully resolved sources.
        let model = model(vec![
            Command::new("c").with_import(ImportRef::all("b")),
            Command::new("b")
                .with_arg(named("b1"))
                .with_import(ImportRef::all("a")),
            Command::new("a").with_arg(named("a1")),
        ]);
        let resolved = resolve(&model).unwrap();
        assert_eq!(resolved.get("c").unwrap().argument_names(), vec!["b1", "a1"]);
    }

    #[test]
    fn test_two_command_cycle_fails() {
        let model = model(vec![
            Command::new("a").with_arg(named("x")).with_import(ImportRef::all("b")),
            Command::new("b").with_import(ImportRef::all("a")),
        ]);
        assert_eq!(
            resolve(&model),
            Err(ImportError::CyclicImport {
                path: vec!["a".into(), "b".into(), "a".into()]
            })
        );
    }

    #[test]
    fn test_self_import_is_a_cycle() {
        let model = model(vec![Command::new("a")
            .with_arg(named("x"))
            .with_import(ImportRef::argument("a", "x"))]);
        assert_eq!(
            resolve(&model),
            Err(ImportError::CyclicImport {
                path: vec!["a".into(), "a".into()]
            })
        );
    }

    #[test]
    fn test_unknown_target_and_source() {
        let model_unknown_arg = model(vec![
            Command::new("src").with_arg(named("x")),
            Command::new("dst").with_import(ImportRef::argument("src", "y")),
        ]);
        assert_eq!(
            resolve(&model_unknown_arg),
            Err(ImportError::UnknownImportTarget {
                command: "dst".into(),
                source_command: "src".into(),
                argument: "y".into(),
            })
        );

        let model_unknown_source = model(vec![
            Command::new("dst").with_import(ImportRef::all("nowhere")),
        ]);
        assert_eq!(
            resolve(&model_unknown_source),
            Err(ImportError::UnknownSourceCommand {
                command: "dst".into(),
                source_command: "nowhere".into(),
            })
        );
    }

    #[test]
    fn test_nested_sources_by_path_or_unique_name() {
        let model = model(vec![
            Command::new("run_analysis")
                .with_subcommand(Command::new("summarize").with_arg(named("min-delta")))
                .with_subcommand(
                    Command::new("plot").with_import(ImportRef::argument("summarize", "min-delta")),
                ),
            Command::new("compare").with_import(ImportRef::all("run_analysis.plot")),
        ]);
        let resolved = resolve(&model).unwrap();
        assert_eq!(
            resolved.get("run_analysis.plot").unwrap().argument_names(),
            vec!["min-delta"]
        );
        assert_eq!(resolved.get("compare").unwrap().argument_names(), vec!["min-delta"]);
    }

    #[test]
    fn test_ambiguous_bare_name_fails() {
        let model = model(vec![
            Command::new("a").with_subcommand(Command::new("plot")),
            Command::new("b").with_subcommand(Command::new("plot")),
            Command::new("c").with_import(ImportRef::all("plot")),
        ]);
        assert!(matches!(
            resolve(&model),
            Err(ImportError::AmbiguousSourceCommand { ref candidates, .. })
                if candidates == &vec!["a.plot".to_string(), "b.plot".to_string()]
        ));
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let model = model(vec![
            Command::new("base").with_arg(named("db")),
            Command::new("train")
                .with_arg(named("epochs"))
                .with_import(ImportRef::all("base")),
            Command::new("run_analysis").with_subcommand(
                Command::new("summarize").with_import(ImportRef::all("train")),
            ),
        ]);
        assert_eq!(resolve(&model).unwrap(), resolve(&model).unwrap());
    }

    #[test]
    fn test_child_lookup_and_top_level() {
        let model = model(vec![
            Command::new("run_analysis").with_subcommand(Command::new("summarize")),
            Command::new("train"),
        ]);
        let resolved = resolve(&model).unwrap();
        let group = resolved.get("run_analysis").unwrap();
        assert!(group.requires_subcommand());
        assert_eq!(
            resolved.child(group, "summarize").unwrap().path,
            "run_analysis.summarize"
        );
        assert!(resolved.child(group, "train").is_none());
        assert_eq!(
            resolved.top_level().map(|c| c.name.as_str()).collect::<Vec<_>>(),
            vec!["run_analysis", "train"]
        );
        assert_eq!(resolved.get_path(&["run_analysis", "summarize"]).unwrap().name, "summarize");
    }

    #[test]
    fn test_positional_hazard_detection() {
        let model = model(vec![
            Command::new("ok")
                .with_arg(Argument::positional("first", ArgType::String))
                .with_arg(Argument::positional("rest", ArgType::String).one_or_more()),
            Command::new("bad")
                .with_arg(Argument::positional("files", ArgType::String).one_or_more())
                .with_arg(Argument::positional("dest", ArgType::String)),
        ]);
        let resolved = resolve(&model).unwrap();
        assert_eq!(resolved.get("ok").unwrap().positional_hazard(), None);
        assert_eq!(
            resolved.get("bad").unwrap().positional_hazard(),
            Some(vec!["files".to_string(), "dest".to_string()])
        );
    }
}
