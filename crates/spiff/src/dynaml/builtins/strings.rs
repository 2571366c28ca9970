use super::{arity, flatten, string_argument};
use crate::binding::Binding;
use crate::dynaml::{to_text, Outcome};
use crate::node::{Node, Value};

/// `split(separator, string)`
pub(super) fn split(arguments: &[Node], binding: &Binding<'_>) -> Outcome {
    attempt!(arity("split", arguments, 2, 2));
    let separator = attempt!(string_argument("split", 0, &arguments[0]));
    let text = attempt!(string_argument("split", 1, &arguments[1]));

    let source_name = binding.source_name().cloned();
    let parts: Vec<Node> = text
        .split(separator)
        .map(|part| Node::new(part, source_name.clone()))
        .collect();
    Outcome::value(parts, binding)
}

/// `join(separator, values...)`, list arguments contribute their entries
pub(super) fn join(arguments: &[Node], binding: &Binding<'_>) -> Outcome {
    attempt!(arity("join", arguments, 1, usize::MAX));
    let separator = attempt!(string_argument("join", 0, &arguments[0]));

    let mut parts = vec![];
    for entry in flatten(&arguments[1..]) {
        match to_text(entry.value()) {
            Some(text) => parts.push(text),
            None => {
                return Outcome::failed(format!(
                    "join: elements must be scalars, got {}",
                    entry.value().type_name()
                ))
            }
        }
    }
    Outcome::value(parts.join(separator), binding)
}

/// `trim(value[, cutset])` on a string or every string of a list
pub(super) fn trim(arguments: &[Node], binding: &Binding<'_>) -> Outcome {
    attempt!(arity("trim", arguments, 1, 2));
    let cutset = match arguments.get(1) {
        Some(node) => Some(attempt!(string_argument("trim", 1, node))),
        None => None,
    };
    let trim_one = |s: &str| match cutset {
        Some(cutset) => s.trim_matches(|c| cutset.contains(c)).to_string(),
        None => s.trim().to_string(),
    };

    match arguments[0].value() {
        Value::String(s) => Outcome::value(trim_one(s), binding),
        Value::List(entries) => {
            let mut trimmed = Vec::with_capacity(entries.len());
            for entry in entries {
                let Value::String(s) = entry.value() else {
                    return Outcome::failed(format!(
                        "trim: list entries must be strings, got {}",
                        entry.value().type_name()
                    ));
                };
                trimmed.push(entry.with_value(trim_one(s)));
            }
            Outcome::value(trimmed, binding)
        }
        other => Outcome::failed(format!(
            "trim: argument 1 must be a string or list, got {}",
            other.type_name()
        )),
    }
}

pub(super) fn length(arguments: &[Node], binding: &Binding<'_>) -> Outcome {
    attempt!(arity("length", arguments, 1, 1));
    let length = match arguments[0].value() {
        Value::List(list) => list.len(),
        Value::Map(map) => map.len(),
        Value::String(s) => s.chars().count(),
        other => {
            return Outcome::failed(format!(
                "length: argument 1 must be a list, map or string, got {}",
                other.type_name()
            ))
        }
    };
    match i64::try_from(length) {
        Ok(length) => Outcome::value(length, binding),
        Err(_) => Outcome::failed("integer overflow"),
    }
}

/// `format(template, values...)` with printf style directives
pub(super) fn format(arguments: &[Node], binding: &Binding<'_>) -> Outcome {
    attempt!(arity("format", arguments, 1, usize::MAX));
    let template = attempt!(string_argument("format", 0, &arguments[0]));
    match render(template, &arguments[1..]) {
        Ok(text) => Outcome::value(text, binding),
        Err(issue) => Outcome::failed(format!("format: {issue}")),
    }
}

/// `error(template, values...)` always fails, with the formatted message as issue
pub(super) fn error(arguments: &[Node], _binding: &Binding<'_>) -> Outcome {
    if arguments.is_empty() {
        return Outcome::failed("error");
    }
    let template = attempt!(string_argument("error", 0, &arguments[0]));
    match render(template, &arguments[1..]) {
        Ok(text) => Outcome::failed(text),
        Err(issue) => Outcome::failed(format!("error: {issue}")),
    }
}

fn render(template: &str, arguments: &[Node]) -> Result<String, String> {
    let mut output = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    let mut remaining = arguments.iter();

    while let Some(c) = chars.next() {
        if c != '%' {
            output.push(c);
            continue;
        }

        let mut left = false;
        let mut zero = false;
        while let Some(&flag) = chars.peek() {
            match flag {
                '-' => left = true,
                '0' => zero = true,
                _ => break,
            }
            chars.next();
        }
        let mut width = 0;
        while let Some(digit) = chars.peek().and_then(|c| c.to_digit(10)) {
            width = width * 10 + digit as usize;
            chars.next();
        }

        let verb = chars.next().ok_or("incomplete directive at end of template")?;
        if verb == '%' {
            output.push('%');
            continue;
        }
        let argument = remaining
            .next()
            .ok_or_else(|| format!("missing argument for %{verb}"))?;
        let text = directive(verb, argument)?;
        let numeric = matches!(verb, 'd' | 'x' | 'X' | 'o' | 'b');
        pad(&mut output, &text, width, left, zero && numeric);
    }

    match remaining.count() {
        0 => Ok(output),
        extra => Err(format!("{extra} arguments left unused")),
    }
}

fn directive(verb: char, argument: &Node) -> Result<String, String> {
    let value = argument.value();
    let text = match (verb, value) {
        ('s' | 'v', Value::List(_) | Value::Map(_)) => {
            serde_json::to_string(argument).map_err(|err| err.to_string())?
        }
        ('s' | 'v', value) => to_text(value).unwrap_or_default(),
        ('q', value) => format!("{:?}", to_text(value).unwrap_or_default()),
        ('t', Value::Boolean(b)) => b.to_string(),
        ('d', Value::Integer(i)) => i.to_string(),
        ('x', Value::Integer(i)) => signed(*i, |u| format!("{u:x}")),
        ('X', Value::Integer(i)) => signed(*i, |u| format!("{u:X}")),
        ('o', Value::Integer(i)) => signed(*i, |u| format!("{u:o}")),
        ('b', Value::Integer(i)) => signed(*i, |u| format!("{u:b}")),
        ('x', Value::String(s)) => s.bytes().map(|b| format!("{b:02x}")).collect(),
        ('X', Value::String(s)) => s.bytes().map(|b| format!("{b:02X}")).collect(),
        ('s' | 'v' | 'q' | 't' | 'd' | 'x' | 'X' | 'o' | 'b', value) => {
            return Err(format!("%{verb} can not format {}", value.type_name()))
        }
        (verb, _) => return Err(format!("unknown directive %{verb}")),
    };
    Ok(text)
}

fn signed(value: i64, digits: impl Fn(u64) -> String) -> String {
    let magnitude = digits(value.unsigned_abs());
    if value < 0 {
        format!("-{magnitude}")
    } else {
        magnitude
    }
}

fn pad(output: &mut String, text: &str, width: usize, left: bool, zero: bool) {
    let fill = width.saturating_sub(text.chars().count());
    if left {
        output.push_str(text);
        output.extend(std::iter::repeat(' ').take(fill));
    } else if zero {
        let (sign, digits) = match text.strip_prefix('-') {
            Some(digits) => ("-", digits),
            None => ("", text),
        };
        output.push_str(sign);
        output.extend(std::iter::repeat('0').take(fill));
        output.push_str(digits);
    } else {
        output.extend(std::iter::repeat(' ').take(fill));
        output.push_str(text);
    }
}

#[cfg(test)]
mod test {
    use super::super::super::test::{eval, eval_in, issue_of, value_of};
    use super::*;
    use crate::yaml;
    use pretty_assertions::assert_eq;

    fn strings(values: &[&str]) -> Value {
        Value::List(values.iter().map(|v| Node::new(*v, None)).collect())
    }

    #[test]
    fn split_and_join() {
        assert_eq!(value_of(eval("split(\",\", \"a,b,,c\")")), strings(&["a", "b", "", "c"]));
        assert_eq!(
            value_of(eval("join(\", \", \"a\", [1, true], \"b\")")),
            Value::from("a, 1, true, b")
        );
        assert!(issue_of(eval("join(\",\", [[1]])")).contains("must be scalars"));
        assert_eq!(
            issue_of(eval("split(1, \"a\")")),
            "split: argument 1 must be a string, got int"
        );
    }

    #[test]
    fn trim_strings_and_lists() {
        assert_eq!(value_of(eval("trim(\"  x \")")), Value::from("x"));
        assert_eq!(value_of(eval("trim(\"--x-\", \"-\")")), Value::from("x"));
        assert_eq!(value_of(eval("trim([\" a\", \"b \"])")), strings(&["a", "b"]));
    }

    #[test]
    fn length_of_collections() {
        let document = yaml!("{list: [1, 2, 3], map: {a: 1}}");
        assert_eq!(value_of(eval_in(&document, &[], "length(list)")), Value::Integer(3));
        assert_eq!(value_of(eval_in(&document, &[], "length(map)")), Value::Integer(1));
        assert_eq!(value_of(eval("length(\"äbc\")")), Value::Integer(3));
        assert!(issue_of(eval("length(1)")).contains("list, map or string"));
    }

    #[test]
    fn format_directives() {
        assert_eq!(
            value_of(eval("format(\"%s-%d|%5d|%-4s|%03d%%\", \"web\", 1, 42, \"ab\", 7)")),
            Value::from("web-1|   42|ab  |007%")
        );
        assert_eq!(
            value_of(eval("format(\"%x %X %o %b %t\", 255, 255, 8, 5, true)")),
            Value::from("ff FF 10 101 true")
        );
        assert_eq!(value_of(eval("format(\"%q\", \"a\")")), Value::from("\"a\""));
        assert_eq!(value_of(eval("format(\"%v\", [1, \"a\"])")), Value::from("[1,\"a\"]"));
        assert_eq!(value_of(eval("format(\"%04d\", -7)")), Value::from("-007"));
    }

    #[test]
    fn format_validates_arguments() {
        assert_eq!(issue_of(eval("format(\"%d\")")), "format: missing argument for %d");
        assert_eq!(
            issue_of(eval("format(\"%d\", \"x\")")),
            "format: %d can not format string"
        );
        assert_eq!(
            issue_of(eval("format(\"x\", 1)")),
            "format: 1 arguments left unused"
        );
        assert_eq!(issue_of(eval("format(\"%y\", 1)")), "format: unknown directive %y");
    }

    #[test]
    fn error_always_fails() {
        assert_eq!(issue_of(eval("error(\"bad %s\", \"input\")")), "bad input");
        assert_eq!(issue_of(eval("error()")), "error");
    }
}
