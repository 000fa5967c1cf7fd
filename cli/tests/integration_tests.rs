use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};

/// Helper to create a temp directory that is cleaned up on drop.
struct TempDir {
    path: PathBuf,
}

impl TempDir {
    fn new(name: &str) -> Self {
        let path = std::env::temp_dir().join(format!("argspec_cli_test_{name}_{}", std::process::id()));
        let _ = fs::remove_dir_all(&path);
        fs::create_dir_all(&path).expect("failed to create temp dir");
        Self { path }
    }

    fn path(&self) -> &PathBuf {
        &self.path
    }

    fn join(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.path);
    }
}

/// Schema modeled on a small deep-learning manager CLI.
fn write_schema(dir: &TempDir) -> PathBuf {
    let json = serde_json::json!({
        "name": "dl_manager",
        "commands": [
            {"name": "train", "help": "Train a model", "args": [
                {"name": "epochs", "alias": "e", "style": "named", "type": "int", "default": "10"},
                {"name": "hyper-params", "style": "named", "type": "dict", "nargs": "+", "default": []},
                {"name": "cache-features", "style": "flag"}
            ]},
            {"name": "run", "args": [
                {"name": "classifier", "style": "positional", "nargs": "+"},
                {"import": "train/*"},
                {"name": "k-cross", "alias": "k", "style": "named", "type": "int", "default": "0"},
                {"name": "input-mode", "style": "named", "type": "enum",
                 "choices": ["Word2Vec", "Bert"], "default": "Word2Vec"}
            ]},
            {"name": "run_analysis", "subparsers": [
                {"name": "summarize", "import_args": ["run/k-cross"]}
            ]}
        ]
    });
    let path = dir.join("dl_manager.json");
    fs::write(&path, serde_json::to_string_pretty(&json).unwrap()).expect("failed to write schema");
    path
}

fn argspec(schema: &PathBuf, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_argspec"))
        .arg("--schema")
        .arg(schema)
        .args(args)
        .output()
        .expect("failed to run argspec")
}

fn stdout_json(output: &Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).expect("stdout should be JSON")
}

// ---------------------------------------------------------------------------
// check
// ---------------------------------------------------------------------------

#[test]
fn check_reports_command_count() {
    let dir = TempDir::new("check_ok");
    let schema = write_schema(&dir);

    let output = argspec(&schema, &["check"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Checked 4 command(s) from 1 file(s)"), "{stdout}");
}

#[test]
fn check_fails_on_cyclic_imports_with_import_code() {
    let dir = TempDir::new("check_cycle");
    let path = dir.join("cycle.yaml");
    fs::write(
        &path,
        "commands:\n  - name: a\n    import_args: [b/*]\n  - name: b\n    import_args: [a/*]\n",
    )
    .unwrap();

    let output = argspec(&path, &["check"]);
    assert_eq!(output.status.code(), Some(4));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("cyclic import: a -> b -> a"), "{stderr}");
}

#[test]
fn check_fails_on_malformed_argument_with_schema_code() {
    let dir = TempDir::new("check_malformed");
    let path = dir.join("bad.json");
    fs::write(
        &path,
        r#"{"commands": [{"name": "plot", "args": [{"name": "kind", "style": "named", "type": "enum"}]}]}"#,
    )
    .unwrap();

    let output = argspec(&path, &["check"]);
    assert_eq!(output.status.code(), Some(3));
}

#[test]
fn check_fails_on_unknown_style_or_type_with_schema_code() {
    let dir = TempDir::new("check_unknown_kind");
    for (file, entry) in [
        ("style.json", r#"{"name": "k-cross", "style": "option", "type": "int"}"#),
        ("type.yaml", r#"{"name": "metrics", "style": "named", "type": "list"}"#),
    ] {
        let path = dir.join(file);
        fs::write(&path, format!(r#"{{"commands": [{{"name": "run", "args": [{entry}]}}]}}"#)).unwrap();

        let output = argspec(&path, &["check"]);
        assert_eq!(output.status.code(), Some(3), "{file}");
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains("malformed argument"), "{stderr}");
        assert!(stderr.contains("in command `run`"), "{stderr}");
    }
}

#[test]
fn check_warns_about_ambiguous_positionals() {
    let dir = TempDir::new("check_hazard");
    let path = dir.join("hazard.json");
    fs::write(
        &path,
        r#"{"commands": [{"name": "cp", "args": [
            {"name": "files", "style": "positional", "nargs": "+"},
            {"name": "dest", "style": "positional"}
        ]}]}"#,
    )
    .unwrap();

    let output = argspec(&path, &["check"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("1 command(s) have ambiguous"));
    assert!(String::from_utf8_lossy(&output.stderr).contains("ambiguous positionals"));
}

#[test]
fn missing_schema_sources_fail() {
    let dir = TempDir::new("no_sources");
    let output = Command::new(env!("CARGO_BIN_EXE_argspec"))
        .current_dir(dir.path())
        .arg("check")
        .output()
        .expect("failed to run argspec");
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("no schema sources"));
}

// ---------------------------------------------------------------------------
// show
// ---------------------------------------------------------------------------

#[test]
fn show_renders_text_help() {
    let dir = TempDir::new("show_text");
    let schema = write_schema(&dir);

    let output = argspec(&schema, &["show", "run"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("usage: dl_manager run [options] <classifier>..."), "{stdout}");
    assert!(stdout.contains("--epochs/-e"));
}

#[test]
fn show_emits_json_for_nested_path() {
    let dir = TempDir::new("show_json");
    let schema = write_schema(&dir);

    let output = argspec(&schema, &["show", "run_analysis", "summarize", "--format", "json"]);
    assert!(output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["path"], "run_analysis.summarize");
    assert_eq!(json["arguments"][0]["name"], "k-cross");
}

#[test]
fn show_unknown_command_is_usage_error() {
    let dir = TempDir::new("show_unknown");
    let schema = write_schema(&dir);

    let output = argspec(&schema, &["show", "predict"]);
    assert_eq!(output.status.code(), Some(2));
}

// ---------------------------------------------------------------------------
// parse
// ---------------------------------------------------------------------------

#[test]
fn parse_argv_prints_typed_values() {
    let dir = TempDir::new("parse_argv");
    let schema = write_schema(&dir);

    let output = argspec(
        &schema,
        &["parse", "--", "run", "cnn", "rnn", "-k", "5", "--hyper-params", "lr=0.1", "--cache-features"],
    );
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let json = stdout_json(&output);
    assert_eq!(json["command"], "run");
    assert_eq!(json["values"]["classifier"], serde_json::json!(["cnn", "rnn"]));
    assert_eq!(json["values"]["k-cross"], 5);
    assert_eq!(json["values"]["epochs"], 10);
    assert_eq!(json["values"]["hyper-params"], serde_json::json!({"lr": "0.1"}));
    assert_eq!(json["values"]["cache-features"], true);
    assert_eq!(json["values"]["input-mode"], "Word2Vec");
}

#[test]
fn parse_object_invocation() {
    let dir = TempDir::new("parse_object");
    let schema = write_schema(&dir);

    let output = argspec(
        &schema,
        &["parse", "--object", r#"{"epochs": 3, "cache-features": true}"#, "--", "train"],
    );
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let json = stdout_json(&output);
    assert_eq!(json["values"]["epochs"], 3);
    assert_eq!(json["values"]["hyper-params"], serde_json::json!({}));
}

#[test]
fn parse_failures_use_usage_code() {
    let dir = TempDir::new("parse_fail");
    let schema = write_schema(&dir);

    for args in [
        &["parse", "--", "run", "cnn", "--input-mode", "Glove"][..],
        &["parse", "--", "run"][..],
        &["parse", "--", "run_analysis"][..],
        &["parse", "--", "train", "--nope"][..],
    ] {
        let output = argspec(&schema, args);
        assert_eq!(output.status.code(), Some(2), "{args:?}");
        assert!(output.stdout.is_empty());
    }
}

#[test]
fn parse_help_prints_usage_and_exits_zero() {
    let dir = TempDir::new("parse_help");
    let schema = write_schema(&dir);

    let output = argspec(&schema, &["parse", "--", "train", "--epochs", "3", "--help"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("usage: dl_manager train [options]"), "{stdout}");
    assert!(stdout.contains("--epochs/-e"), "{stdout}");

    let output = argspec(&schema, &["parse", "--", "run_analysis", "-h"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("summarize"));
}

#[test]
fn parse_yaml_output_from_config() {
    let dir = TempDir::new("parse_yaml");
    write_schema(&dir);
    fs::write(dir.join(".argspec.yml"), "schemas: [dl_manager.json]\noutput: yaml\n").unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_argspec"))
        .current_dir(dir.path())
        .args(["parse", "--", "train", "-e", "2"])
        .output()
        .expect("failed to run argspec");
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let yaml: serde_yaml::Value = serde_yaml::from_slice(&output.stdout).unwrap();
    assert_eq!(yaml["values"]["epochs"].as_i64(), Some(2));
}

// ---------------------------------------------------------------------------
// parse-batch
// ---------------------------------------------------------------------------

#[test]
fn parse_batch_keeps_input_order() {
    let dir = TempDir::new("batch_order");
    let schema = write_schema(&dir);
    let input = dir.join("calls.jsonl");
    let mut lines = String::new();
    for epochs in 1..=20 {
        lines.push_str(&format!("[\"train\", \"--epochs\", \"{epochs}\"]\n"));
    }
    lines.push_str("{\"command\": \"run_analysis.summarize\", \"values\": {\"k-cross\": 7}}\n");
    lines.push_str("[\"train\", \"--help\"]\n");
    fs::write(&input, lines).unwrap();

    let output = argspec(
        &schema,
        &["parse-batch", "--input", input.to_str().unwrap(), "--jobs", "4"],
    );
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let outcomes: Vec<serde_json::Value> = String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(outcomes.len(), 22);
    for (idx, outcome) in outcomes.iter().take(20).enumerate() {
        assert_eq!(outcome["line"], idx + 1);
        assert_eq!(outcome["result"]["values"]["epochs"], idx + 1);
    }
    assert_eq!(outcomes[20]["result"]["values"]["k-cross"], 7);
    assert_eq!(outcomes[21]["error"]["code"], 0);
}

#[test]
fn parse_batch_reports_failures_and_exits_non_zero() {
    let dir = TempDir::new("batch_fail");
    let schema = write_schema(&dir);

    let mut child = Command::new(env!("CARGO_BIN_EXE_argspec"))
        .arg("--schema")
        .arg(&schema)
        .args(["parse-batch", "--input", "-"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to run argspec");
    child
        .stdin
        .take()
        .unwrap()
        .write_all(b"[\"train\"]\n\n[\"train\", \"--epochs\", \"x\"]\nnot json\n")
        .unwrap();
    let output = child.wait_with_output().unwrap();

    assert_eq!(output.status.code(), Some(2));
    let outcomes: Vec<serde_json::Value> = String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(outcomes.len(), 3);
    assert!(outcomes[0]["error"].is_null());
    assert_eq!(outcomes[1]["line"], 3);
    assert_eq!(outcomes[1]["error"]["code"], 2);
    assert_eq!(outcomes[2]["line"], 4);
    assert!(String::from_utf8_lossy(&output.stderr).contains("2 of 3 invocation(s) failed"));
}

// ---------------------------------------------------------------------------
// dump
// ---------------------------------------------------------------------------

#[test]
fn dump_prints_resolved_schema() {
    let dir = TempDir::new("dump_json");
    let schema = write_schema(&dir);

    let output = argspec(&schema, &["dump"]);
    assert!(output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["name"], "dl_manager");
    let run = json["commands"]
        .as_array()
        .unwrap()
        .iter()
        .find(|command| command["path"] == "run")
        .unwrap();
    let names: Vec<_> = run["arguments"]
        .as_array()
        .unwrap()
        .iter()
        .map(|argument| argument["name"].as_str().unwrap())
        .collect();
    assert_eq!(
        names,
        vec!["classifier", "epochs", "hyper-params", "cache-features", "k-cross", "input-mode"]
    );
}

#[test]
fn dump_yaml_format() {
    let dir = TempDir::new("dump_yaml");
    let schema = write_schema(&dir);

    let output = argspec(&schema, &["dump", "--format", "yaml"]);
    assert!(output.status.success());
    let yaml: serde_yaml::Value = serde_yaml::from_slice(&output.stdout).unwrap();
    assert_eq!(yaml["name"].as_str(), Some("dl_manager"));
}
