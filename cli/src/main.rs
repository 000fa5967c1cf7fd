use std::fmt;
use std::fs;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use argspec_core::{
    App, Error as CoreError, ParseError, ParsedResult, TypeCoercer, describe, render_help,
};
use argspec_db::{OutputFormat, SchemaSources, SchemaStore, Snapshot, StoreError, ToolConfig};
use clap::{Args, Parser, Subcommand};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

/// CLI-specific output format enum with clap argument parsing support.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliOutputFormat {
    Json,
    Yaml,
}

impl From<CliOutputFormat> for OutputFormat {
    fn from(fmt: CliOutputFormat) -> Self {
        match fmt {
            CliOutputFormat::Json => Self::Json,
            CliOutputFormat::Yaml => Self::Yaml,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
enum HelpFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "argspec")]
#[command(about = "Check declarative CLI schemas and parse invocations against them")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct GlobalArgs {
    /// Schema file or directory; repeatable, replaces the config's list.
    #[arg(long = "schema", global = true)]
    schemas: Vec<PathBuf>,
    /// Tool config file (default: .argspec.yml in the current directory).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Increase log verbosity (-v info, -vv debug).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Load, validate, and resolve the schema.
    Check,
    /// Show help for a command path (e.g. `run_analysis summarize`).
    Show(ShowArgs),
    /// Parse one invocation and print its typed values.
    Parse(ParseArgs),
    /// Parse a JSONL file of invocations in parallel.
    ParseBatch(ParseBatchArgs),
    /// Print the resolved schema.
    Dump(DumpArgs),
}

#[derive(Debug, Args)]
struct ShowArgs {
    /// Command path segments.
    #[arg(required = true)]
    path: Vec<String>,
    #[arg(long, default_value = "text")]
    format: HelpFormat,
}

#[derive(Debug, Args)]
struct ParseArgs {
    /// JSON object of argument values; TOKENS is then only the command path.
    #[arg(long)]
    object: Option<String>,
    /// Output format (default: from config, else json).
    #[arg(long)]
    format: Option<CliOutputFormat>,
    /// Command path followed by its argument tokens; put them after `--`.
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    tokens: Vec<String>,
}

#[derive(Debug, Args)]
struct ParseBatchArgs {
    /// JSONL file, one invocation per line (`-` for stdin).
    #[arg(long)]
    input: PathBuf,
    /// Number of worker threads (default: from config).
    #[arg(long)]
    jobs: Option<usize>,
}

#[derive(Debug, Args)]
struct DumpArgs {
    /// Output format (default: from config, else json).
    #[arg(long)]
    format: Option<CliOutputFormat>,
}

/// Error message plus the process exit status it maps to.
#[derive(Debug)]
struct Failure {
    code: i32,
    message: String,
}

impl Failure {
    fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl From<StoreError> for Failure {
    fn from(err: StoreError) -> Self {
        Self::new(err.exit_code(), err.to_string())
    }
}

impl From<CoreError> for Failure {
    fn from(err: CoreError) -> Self {
        Self::new(err.exit_code(), err.to_string())
    }
}

impl From<ParseError> for Failure {
    fn from(err: ParseError) -> Self {
        CoreError::from(err).into()
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.global.verbose);

    let result = match cli.command {
        Command::Check => run_check(&cli.global),
        Command::Show(args) => run_show(&cli.global, args),
        Command::Parse(args) => run_parse(&cli.global, args),
        Command::ParseBatch(args) => run_parse_batch(&cli.global, args),
        Command::Dump(args) => run_dump(&cli.global, args),
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(err.code);
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

/// Tool config plus the directory its relative paths resolve against.
fn load_config(global: &GlobalArgs) -> Result<(ToolConfig, PathBuf), Failure> {
    if let Some(path) = &global.config {
        let config = ToolConfig::load(path).map_err(|err| {
            Failure::new(1, format!("Failed to load config '{}': {err}", path.display()))
        })?;
        let base = path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or(Path::new("."))
            .to_path_buf();
        return Ok((config, base));
    }
    match ToolConfig::discover(".")? {
        Some((config, path)) => {
            debug!(path = %path.display(), "using discovered config");
            Ok((config, PathBuf::from(".")))
        }
        None => Ok((ToolConfig::default(), PathBuf::from("."))),
    }
}

fn open_store(global: &GlobalArgs, config: &ToolConfig, base: &Path) -> Result<SchemaStore, Failure> {
    let sources = if global.schemas.is_empty() {
        config.schema_sources(base)
    } else {
        SchemaSources::from_paths(global.schemas.iter().cloned())
    };
    if sources.is_empty() {
        return Err(Failure::new(
            1,
            "no schema sources: pass --schema or list `schemas` in .argspec.yml",
        ));
    }
    Ok(SchemaStore::open(sources)?)
}

fn load_snapshot(global: &GlobalArgs) -> Result<(std::sync::Arc<Snapshot>, ToolConfig), Failure> {
    let (config, base) = load_config(global)?;
    let store = open_store(global, &config, &base)?;
    Ok((store.current(), config))
}

fn build_app(snapshot: &Snapshot) -> Result<App, Failure> {
    App::from_resolved(snapshot.schema.clone(), TypeCoercer::new())
        .map_err(|err| CoreError::from(err).into())
}

fn emit<T: Serialize>(value: &T, format: OutputFormat) -> Result<(), Failure> {
    let rendered = match format {
        OutputFormat::Json => serde_json::to_string_pretty(value)
            .map(|json| json + "\n")
            .map_err(|err| err.to_string()),
        OutputFormat::Yaml => serde_yaml::to_string(value).map_err(|err| err.to_string()),
    }
    .map_err(|err| Failure::new(1, format!("Failed to serialize output: {err}")))?;
    print!("{rendered}");
    Ok(())
}

fn run_check(global: &GlobalArgs) -> Result<(), Failure> {
    let (snapshot, _) = load_snapshot(global)?;
    build_app(&snapshot)?;

    let mut hazards = 0;
    for command in snapshot.schema.commands() {
        if let Some(arguments) = command.positional_hazard() {
            hazards += 1;
            warn!(
                command = %command.path,
                arguments = ?arguments,
                "ambiguous positionals, every invocation of this command will fail"
            );
        }
    }

    println!(
        "Checked {} command(s) from {} file(s), fingerprint {}.",
        snapshot.schema.len(),
        snapshot.files.len(),
        snapshot.fingerprint
    );
    if hazards > 0 {
        println!("{hazards} command(s) have ambiguous positional arguments.");
    }
    Ok(())
}

fn run_show(global: &GlobalArgs, args: ShowArgs) -> Result<(), Failure> {
    let (snapshot, _) = load_snapshot(global)?;
    let command = snapshot
        .schema
        .get_path(&args.path)
        .ok_or_else(|| ParseError::UnknownCommand {
            path: args.path.join("."),
        })?;

    match args.format {
        HelpFormat::Text => print!("{}", render_help(command, &snapshot.schema.name)),
        HelpFormat::Json => emit(&describe(command), OutputFormat::Json)?,
    }
    Ok(())
}

fn run_parse(global: &GlobalArgs, args: ParseArgs) -> Result<(), Failure> {
    let (snapshot, config) = load_snapshot(global)?;
    let app = build_app(&snapshot)?;

    let result = match &args.object {
        Some(raw) => {
            let value: serde_json::Value = serde_json::from_str(raw)
                .map_err(|err| Failure::new(2, format!("--object is not valid JSON: {err}")))?;
            let object = value
                .as_object()
                .ok_or_else(|| Failure::new(2, "--object must be a JSON object"))?;
            app.parse_object(&args.tokens.join("."), object)?
        }
        None => match app.parse(&args.tokens) {
            Ok(result) => result,
            Err(err) => {
                if let Some(help) = app.help_for(&err) {
                    print!("{help}");
                    return Ok(());
                }
                return Err(err.into());
            }
        },
    };

    let format = args.format.map(OutputFormat::from).unwrap_or(config.output);
    emit(&result, format)
}

/// One line of `parse-batch` input.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum BatchInput {
    /// Full argv: command path followed by argument tokens.
    Argv(Vec<String>),
    /// Dotted command path plus a JSON object of values.
    Object {
        command: String,
        values: serde_json::Map<String, serde_json::Value>,
    },
}

#[derive(Debug, Serialize)]
struct BatchOutcome {
    line: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<ParsedResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<BatchFailure>,
}

#[derive(Debug, Serialize)]
struct BatchFailure {
    code: i32,
    message: String,
}

fn parse_batch_line(app: &App, line: usize, raw: &str) -> BatchOutcome {
    let parsed = serde_json::from_str::<BatchInput>(raw)
        .map_err(|err| Failure::new(2, format!("invalid batch input: {err}")))
        .and_then(|input| {
            let result = match input {
                BatchInput::Argv(argv) => app.parse(&argv),
                BatchInput::Object { command, values } => app.parse_object(&command, &values),
            };
            result.map_err(Failure::from)
        });

    match parsed {
        Ok(result) => BatchOutcome {
            line,
            result: Some(result),
            error: None,
        },
        Err(failure) => BatchOutcome {
            line,
            result: None,
            error: Some(BatchFailure {
                code: failure.code,
                message: failure.message,
            }),
        },
    }
}

fn read_batch_lines(input: &Path) -> Result<Vec<(usize, String)>, Failure> {
    let reader: Box<dyn BufRead> = if input == Path::new("-") {
        Box::new(BufReader::new(io::stdin()))
    } else {
        let file = fs::File::open(input).map_err(|err| {
            Failure::new(1, format!("Failed to open '{}': {err}", input.display()))
        })?;
        Box::new(BufReader::new(file))
    };

    let mut lines = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line.map_err(|err| Failure::new(1, format!("Failed to read input: {err}")))?;
        if !line.trim().is_empty() {
            lines.push((idx + 1, line));
        }
    }
    Ok(lines)
}

fn run_parse_batch(global: &GlobalArgs, args: ParseBatchArgs) -> Result<(), Failure> {
    let (snapshot, config) = load_snapshot(global)?;
    let app = build_app(&snapshot)?;
    let lines = read_batch_lines(&args.input)?;

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(args.jobs.unwrap_or(config.batch.jobs))
        .build()
        .map_err(|e| Failure::new(1, format!("Failed to create thread pool: {e}")))?;

    let outcomes: Vec<BatchOutcome> = pool.install(|| {
        lines
            .par_iter()
            .map(|(line, raw)| parse_batch_line(&app, *line, raw))
            .collect()
    });

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for outcome in &outcomes {
        let json = serde_json::to_string(outcome)
            .map_err(|err| Failure::new(1, format!("Failed to serialize output: {err}")))?;
        writeln!(out, "{json}").map_err(|err| Failure::new(1, format!("Failed to write output: {err}")))?;
    }

    // Help requests report code 0 and do not fail the batch.
    let failures: Vec<&BatchFailure> = outcomes
        .iter()
        .filter_map(|outcome| outcome.error.as_ref())
        .filter(|failure| failure.code != 0)
        .collect();
    let failed = failures.len();
    debug!(total = outcomes.len(), failed, "batch parsed");
    match failures.first() {
        Some(first) => Err(Failure::new(
            first.code,
            format!("{failed} of {} invocation(s) failed", outcomes.len()),
        )),
        None => Ok(()),
    }
}

fn run_dump(global: &GlobalArgs, args: DumpArgs) -> Result<(), Failure> {
    let (snapshot, config) = load_snapshot(global)?;
    let format = args.format.map(OutputFormat::from).unwrap_or(config.output);
    emit(snapshot.schema.as_ref(), format)
}
