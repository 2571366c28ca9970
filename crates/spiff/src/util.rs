use crate::node::Node;
use regex::Regex;
use std::sync::OnceLock;

/// Extract the dynaml source from a `(( ... ))` string
pub fn embedded_dynaml(value: &str) -> Option<&str> {
    static EMBEDDED: OnceLock<Regex> = OnceLock::new();
    let embedded = EMBEDDED.get_or_init(|| {
        Regex::new(r"(?s)^\(\(\s*(.*?)\s*\)\)$").expect("embedded dynaml pattern is valid")
    });

    embedded
        .captures(value)
        .and_then(|captures| captures.get(1))
        .map(|source| source.as_str())
}

/// Parse a `[N]` path step
pub fn parse_index(step: &str) -> Option<usize> {
    step.strip_prefix('[')?.strip_suffix(']')?.parse().ok()
}

/// Path step of a list entry: its `name` field or its index
pub fn step_name(index: usize, entry: &Node) -> String {
    match entry.name() {
        Some(name) => name.to_string(),
        None => format!("[{index}]"),
    }
}

pub fn join_path<S: AsRef<str>>(path: &[S]) -> String {
    path.iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(".")
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn embedded() {
        assert_eq!(embedded_dynaml("(( foo.bar ))"), Some("foo.bar"));
        assert_eq!(embedded_dynaml("((foo))"), Some("foo"));
        assert_eq!(embedded_dynaml("((  \"a\" b  ))"), Some("\"a\" b"));
        assert_eq!(embedded_dynaml("foo (( bar ))"), None);
        assert_eq!(embedded_dynaml("(( bar )) foo"), None);
    }

    #[test]
    fn index() {
        assert_eq!(parse_index("[3]"), Some(3));
        assert_eq!(parse_index("3"), None);
        assert_eq!(parse_index("[x]"), None);
    }
}
