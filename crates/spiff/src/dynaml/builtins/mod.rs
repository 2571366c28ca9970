//! built-in functions
//!
//! Every builtin receives its fully evaluated arguments and validates count and
//! types itself. List arguments are flattened where a function accepts a variable
//! number of values (`join`, `static_ips`, `exec`, `env`).

/// Unwrap an argument check or return its failure
macro_rules! attempt {
    ($e:expr) => {
        match $e {
            Ok(value) => value,
            Err(outcome) => return outcome,
        }
    };
}

pub(crate) mod ip;
mod strings;
mod system;

use super::Outcome;
use crate::binding::Binding;
use crate::node::{Node, Value};

pub(super) type Builtin = fn(&[Node], &Binding<'_>) -> Outcome;

const BUILTINS: &[(&str, Builtin)] = &[
    ("static_ips", ip::static_ips),
    ("min_ip", ip::min_ip),
    ("max_ip", ip::max_ip),
    ("num_ip", ip::num_ip),
    ("env", system::env),
    ("read", system::read),
    ("exec", system::exec),
    ("eval", system::eval),
    ("split", strings::split),
    ("join", strings::join),
    ("trim", strings::trim),
    ("format", strings::format),
    ("error", strings::error),
    ("length", strings::length),
];

pub(super) fn lookup(name: &str) -> Option<Builtin> {
    BUILTINS
        .iter()
        .find(|(builtin, _)| *builtin == name)
        .map(|(_, function)| *function)
}

/// Fail unless `min..=max` arguments were passed
fn arity(name: &str, arguments: &[Node], min: usize, max: usize) -> Result<(), Outcome> {
    let count = arguments.len();
    if (min..=max).contains(&count) {
        return Ok(());
    }
    let expected = match (min, max) {
        (min, max) if min == max => format!("{min}"),
        (min, usize::MAX) => format!("at least {min}"),
        (min, max) => format!("{min} to {max}"),
    };
    Err(Outcome::failed(format!(
        "{name}: expected {expected} arguments, got {count}"
    )))
}

fn string_argument<'n>(name: &str, position: usize, node: &'n Node) -> Result<&'n str, Outcome> {
    match node.value() {
        Value::String(s) => Ok(s),
        other => Err(Outcome::failed(format!(
            "{name}: argument {} must be a string, got {}",
            position + 1,
            other.type_name()
        ))),
    }
}

/// Expand list arguments one level
fn flatten(arguments: &[Node]) -> Vec<&Node> {
    arguments
        .iter()
        .flat_map(|argument| match argument.value() {
            Value::List(entries) => entries.iter().collect(),
            _ => vec![argument],
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::super::test::{eval, issue_of};
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn unknown_names_are_no_builtins() {
        assert!(lookup("join").is_some());
        assert!(lookup("joins").is_none());
    }

    #[test]
    fn arity_is_checked() {
        assert_eq!(issue_of(eval("length()")), "length: expected 1 arguments, got 0");
        assert_eq!(
            issue_of(eval("join()")),
            "join: expected at least 1 arguments, got 0"
        );
        assert_eq!(
            issue_of(eval("trim(\"a\", \"b\", \"c\")")),
            "trim: expected 1 to 2 arguments, got 3"
        );
    }
}
