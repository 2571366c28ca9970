//! `<<` merge markers in maps and lists
use crate::binding::Binding;
use crate::dynaml::{Expression, Outcome};
use crate::node::{Node, Value};
use crate::util::embedded_dynaml;

pub(super) const MARKER: &str = "<<";

/// Dynaml at a node: an already parsed expression or an embedded `(( ... ))` string
///
/// `None` for plain values, `Some(Err(issue))` for embedded strings that do not parse.
pub(super) fn expression_of(
    node: &Node,
    binding: &Binding<'_>,
) -> Option<Result<Expression, String>> {
    match node.value() {
        Value::Expression(expression) => Some(Ok(expression.clone())),
        Value::String(s) => embedded_dynaml(s).map(|source| {
            binding
                .context()
                .parse(source, binding.path())
                .map_err(|err| format!("unparseable expression: {err}"))
        }),
        _ => None,
    }
}

#[derive(Debug)]
pub(super) enum Marker {
    /// merge the entries of `base` into the surrounding collection
    Merge {
        base: Node,
        redirect_path: Option<Vec<String>>,
        replace: bool,
    },
    /// there is nothing to merge, the marker disappears
    Drop,
    /// the marker can not be evaluated (yet)
    Keep(Node),
    /// the marker holds no dynaml, `<<` is an ordinary key
    Literal,
}

pub(super) fn evaluate_marker(marker: &Node, binding: &Binding<'_>) -> Marker {
    let expression = match expression_of(marker, binding) {
        None => return Marker::Literal,
        Some(Err(issue)) => return Marker::Keep(marker.clone().with_issue(Some(issue))),
        Some(Ok(expression)) => expression,
    };

    match expression.evaluate(binding) {
        Outcome::Value(base, info) => Marker::Merge {
            base,
            redirect_path: info.redirect_path,
            replace: info.replace,
        },
        // a plain `merge` without any stub value merges nothing
        Outcome::Failed(_) if matches!(&expression, Expression::Merge(merge) if !merge.redirect) => {
            tracing::trace!("no stub value for merge marker");
            Marker::Drop
        }
        Outcome::Failed(info) | Outcome::Deferred(info) => {
            Marker::Keep(marker.with_value(expression).with_issue(info.issue))
        }
    }
}

/// `- <<: (( merge ))`: a list entry that is a map with the marker as its only key
pub(super) fn list_marker(entry: &Node) -> Option<&Node> {
    match entry.value() {
        Value::Map(map) if map.len() == 1 => map.get(MARKER),
        _ => None,
    }
}

/// Stub entries whose name does not occur in the template list; unnamed entries always qualify
pub(super) fn new_entries<'n>(stub_entries: &'n [Node], template_names: &[&str]) -> Vec<&'n Node> {
    stub_entries
        .iter()
        .filter(|entry| match entry.name() {
            Some(name) => !template_names.contains(&name),
            None => true,
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::binding::RunContext;
    use crate::yaml;
    use pretty_assertions::assert_eq;

    #[test]
    fn only_unmatched_names_are_new() {
        let stub = yaml!("[{name: a}, {name: c}, anonymous]");
        let Value::List(entries) = stub.value() else {
            unreachable!()
        };
        let added: Vec<String> = new_entries(entries, &["a", "b"])
            .into_iter()
            .map(|entry| crate::util::step_name(0, entry))
            .collect();
        assert_eq!(added, ["c", "[0]"]);
    }

    #[test]
    fn list_markers() {
        assert!(list_marker(&yaml!("{<<: (( merge ))}")).is_some());
        assert!(list_marker(&yaml!("{<<: (( merge )), name: x}")).is_none());
        assert!(list_marker(&yaml!("[<<]")).is_none());
    }

    #[test]
    fn missing_stub_drops_plain_merge_marker() {
        let context = RunContext::default();
        let binding = Binding::new(&[], &context).with_path("foo");

        let marker = Node::new("(( merge ))", None);
        assert!(matches!(evaluate_marker(&marker, &binding), Marker::Drop));

        let redirected = Node::new("(( merge other ))", None);
        let Marker::Keep(kept) = evaluate_marker(&redirected, &binding) else {
            panic!("redirected merge must be kept");
        };
        assert_eq!(kept.issue(), Some("'other' not found in any stub"));
        assert!(kept.is_expression());

        assert!(matches!(
            evaluate_marker(&Node::new("text", None), &binding),
            Marker::Literal
        ));
    }

    #[test]
    fn merge_marker_reports_stub_entries() {
        let stubs = [yaml!("{foo: {a: 1}}")];
        let context = RunContext::default();
        let binding = Binding::new(&stubs, &context).with_path("foo");

        let Marker::Merge { base, replace, .. } =
            evaluate_marker(&Node::new("(( merge replace ))", None), &binding)
        else {
            panic!("must merge");
        };
        assert!(replace);
        assert_eq!(base, yaml!("{a: 1}"));
    }
}
