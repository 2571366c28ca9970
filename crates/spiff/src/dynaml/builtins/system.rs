//! builtins with side effects outside of the document
//!
//! Results of `read` and `exec` are cached in the [RunContext](crate::binding::RunContext)
//! so that repeated evaluation on later passes never touches the file system or
//! spawns a process twice.
use super::{arity, flatten, string_argument};
use crate::binding::Binding;
use crate::dynaml::{to_text, EvaluationInfo, Outcome};
use crate::node::{Map, Node, Value};
use crate::util::embedded_dynaml;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::rc::Rc;

/// `env(name)` yields the value, `env(names...)` a map of the variables that are set
pub(super) fn env(arguments: &[Node], binding: &Binding<'_>) -> Outcome {
    attempt!(arity("env", arguments, 1, usize::MAX));
    let environ = binding.context().environ();

    if let [single] = arguments {
        if let Value::String(name) = single.value() {
            return match environ.get(name) {
                Some(value) => Outcome::value(value.as_str(), binding),
                None => Outcome::failed(format!("env: variable '{name}' not set")),
            };
        }
    }

    let mut variables = Map::new();
    for (position, entry) in flatten(arguments).into_iter().enumerate() {
        let name = attempt!(string_argument("env", position, entry));
        if let Some(value) = environ.get(name) {
            variables.insert(
                name.to_string(),
                Node::new(value.as_str(), binding.source_name().cloned()),
            );
        }
    }
    Outcome::value(variables, binding)
}

/// `read(path[, "yaml"|"text"])`
pub(super) fn read(arguments: &[Node], binding: &Binding<'_>) -> Outcome {
    attempt!(arity("read", arguments, 1, 2));
    let path = attempt!(string_argument("read", 0, &arguments[0]));
    let kind = match arguments.get(1) {
        Some(kind) => attempt!(string_argument("read", 1, kind)),
        None if is_yaml_file(Path::new(path)) => "yaml",
        None => "text",
    };

    let content = binding
        .context()
        .read_file(PathBuf::from(path), |path| {
            tracing::debug!(path = %path.display(), "reading file");
            std::fs::read_to_string(path).map_err(|err| format!("read: {}: {err}", path.display()))
        });
    let content = match content {
        Ok(content) => content,
        Err(issue) => return Outcome::failed(issue),
    };

    match kind {
        "yaml" => match serde_yaml::from_str(&content) {
            Ok(document) => Outcome::Value(
                Node::from_yaml(document, Some(Rc::from(path))),
                EvaluationInfo::default(),
            ),
            Err(err) => Outcome::failed(format!("read: {path}: {err}")),
        },
        "text" => Outcome::value(content, binding),
        other => Outcome::failed(format!(
            "read: unknown file type '{other}', expected yaml or text"
        )),
    }
}

fn is_yaml_file(path: &Path) -> bool {
    path.extension()
        .is_some_and(|extension| extension == "yml" || extension == "yaml")
}

/// `exec(command, args...)`, list arguments are expanded
pub(super) fn exec(arguments: &[Node], binding: &Binding<'_>) -> Outcome {
    attempt!(arity("exec", arguments, 1, usize::MAX));

    let mut command = vec![];
    for entry in flatten(arguments) {
        match to_text(entry.value()) {
            Some(argument) => command.push(argument),
            None => {
                return Outcome::failed(format!(
                    "exec: arguments must be scalars, got {}",
                    entry.value().type_name()
                ))
            }
        }
    }

    let output = binding
        .context()
        .run_command(command_key(&command), || run(&command));
    match output {
        Ok(stdout) => Outcome::Value(
            output_node(&stdout, binding.source_name().cloned()),
            EvaluationInfo::default(),
        ),
        Err(issue) => Outcome::failed(issue),
    }
}

fn command_key(command: &[String]) -> String {
    let mut hasher = Sha256::new();
    for argument in command {
        hasher.update(argument.as_bytes());
        hasher.update([0]);
    }
    hasher
        .finalize()
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect()
}

fn run(command: &[String]) -> Result<String, String> {
    let Some((program, args)) = command.split_first() else {
        return Err("exec: no command given".to_string());
    };
    tracing::debug!(?command, "executing command");

    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|err| format!("exec: {program}: {err}"))?;
    if !output.status.success() {
        return Err(format!(
            "exec: {program} failed ({}): {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }
    String::from_utf8(output.stdout).map_err(|_| format!("exec: {program}: output is no utf-8"))
}

/// Structured YAML output becomes a tree, anything else trimmed text
fn output_node(stdout: &str, source_name: Option<Rc<str>>) -> Node {
    use serde_yaml::Value as Yaml;
    match serde_yaml::from_str::<Yaml>(stdout) {
        Ok(value @ (Yaml::Mapping(_) | Yaml::Sequence(_) | Yaml::Number(_) | Yaml::Bool(_))) => {
            Node::from_yaml(value, source_name)
        }
        _ => Node::new(stdout.trim(), source_name),
    }
}

/// `eval(source)` parses and evaluates dynaml text at the current position
pub(super) fn eval(arguments: &[Node], binding: &Binding<'_>) -> Outcome {
    attempt!(arity("eval", arguments, 1, 1));
    let source = attempt!(string_argument("eval", 0, &arguments[0]));
    let source = embedded_dynaml(source).unwrap_or(source);

    match binding.context().parse(source, binding.path()) {
        Ok(expression) => expression.evaluate(binding),
        Err(err) => Outcome::failed(format!("eval: {err}")),
    }
}
