//! flow - resolving a template against stubs
//!
//! A flow applies [passes](pass) to the template until a pass returns a tree equal
//! to its input. Nodes that are still expressions at that point are reported as
//! [UnresolvedNodes].
//!
//! Stubs are consulted in order, the first stub that has a value at a path wins.
//! [cascade] first flows every stub against the stubs after it, so values of later
//! stubs end up in the earlier ones.
mod merge;
mod pass;
mod unresolved;

pub use unresolved::{collect_unresolved, UnresolvedNode, UnresolvedNodes};

use crate::binding::{Binding, RunContext};
use crate::node::Node;

#[derive(Debug, Clone)]
pub struct FlowOptions {
    /// upper bound for passes before a flow is considered runaway
    pub max_passes: usize,
}

impl Default for FlowOptions {
    fn default() -> Self {
        Self { max_passes: 1024 }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum FlowError {
    #[error(transparent)]
    Unresolved(#[from] UnresolvedNodes),
    #[error("document did not settle within {0} passes")]
    PassLimitExceeded(usize),
}

/// Result of a flow that tolerates unresolved nodes
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub document: Node,
    pub unresolved: Vec<UnresolvedNode>,
    pub passes: usize,
}

impl Resolution {
    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty()
    }

    /// The document, or every unresolved node as error
    pub fn into_result(self) -> Result<Node, FlowError> {
        if self.unresolved.is_empty() {
            Ok(self.document)
        } else {
            Err(UnresolvedNodes::new(self.unresolved).into())
        }
    }
}

/// Resolve `template` completely
pub fn flow(template: &Node, stubs: &[Node]) -> Result<Node, FlowError> {
    flow_partial(template, stubs, &FlowOptions::default())?.into_result()
}

/// Resolve `template` as far as possible
pub fn flow_partial(
    template: &Node,
    stubs: &[Node],
    options: &FlowOptions,
) -> Result<Resolution, FlowError> {
    let context = RunContext::default();
    flow_in_context(template, stubs, options, &context)
}

#[tracing::instrument(level = "debug", skip_all, fields(stubs = stubs.len()))]
fn flow_in_context(
    template: &Node,
    stubs: &[Node],
    options: &FlowOptions,
    context: &RunContext,
) -> Result<Resolution, FlowError> {
    let mut current = template.clone();

    for passes in 1..=options.max_passes {
        let binding = Binding::new(stubs, context);
        let next = pass::flow_node(&current, &binding, pass::Override::Expressions);
        if next == current {
            let unresolved = collect_unresolved(&next);
            tracing::info!(passes, unresolved = unresolved.len(), "flow settled");
            return Ok(Resolution {
                document: next,
                unresolved,
                passes,
            });
        }
        tracing::debug!(pass = passes, "document changed");
        current = next;
    }

    Err(FlowError::PassLimitExceeded(options.max_passes))
}

/// Flow every stub against the stubs after it, then the template against all of them
///
/// Stubs are always flowed partially, they may refer to values only the template
/// provides. With `partial` the template may stay unresolved as well.
pub fn cascade(
    template: &Node,
    stubs: &[Node],
    partial: bool,
    options: &FlowOptions,
) -> Result<Resolution, FlowError> {
    let context = RunContext::default();

    let mut flowed: Vec<Node> = stubs.to_vec();
    for index in (0..flowed.len()).rev() {
        let (stub, later) = flowed[index..].split_at_mut(1);
        let resolution = flow_in_context(&stub[0], later, options, &context)?;
        tracing::debug!(stub = index, unresolved = resolution.unresolved.len(), "stub flowed");
        stub[0] = resolution.document;
    }

    let resolution = flow_in_context(template, &flowed, options, &context)?;
    if partial || resolution.is_complete() {
        Ok(resolution)
    } else {
        Err(UnresolvedNodes::new(resolution.unresolved).into())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::node::Value;
    use crate::yaml;
    use pretty_assertions::assert_eq;

    fn resolve(template: &str, stubs: &[&str]) -> Node {
        let stubs: Vec<Node> = stubs.iter().map(|stub| yaml!(stub)).collect();
        flow(&yaml!(template), &stubs).expect("must resolve")
    }

    fn unresolved(template: &str) -> Vec<UnresolvedNode> {
        let Err(FlowError::Unresolved(nodes)) = flow(&yaml!(template), &[]) else {
            panic!("must stay unresolved");
        };
        nodes.nodes
    }

    #[test]
    fn lexical_shadowing() {
        assert_eq!(
            resolve(
                "{foo: {bar: {baz: (( buzz.fizz )), buzz: {fizz: right}}}, buzz: {fizz: wrong}}",
                &[]
            ),
            yaml!("{foo: {bar: {baz: right, buzz: {fizz: right}}}, buzz: {fizz: wrong}}")
        );
    }

    #[test]
    fn stub_values_replace_expressions() {
        assert_eq!(
            resolve("{foo: (( merge )), bar: 1, baz: (( 1 + 1 ))}", &["{foo: merged!, bar: 2, baz: 3}"]),
            yaml!("{foo: merged!, bar: 1, baz: 3}")
        );
    }

    #[test]
    fn preferred_values_beat_stubs() {
        assert_eq!(
            resolve("{a: (( prefer 1 )), b: (( prefer merge || 5 ))}", &["{a: 2}"]),
            yaml!("{a: 1, b: 5}")
        );
    }

    #[test]
    fn list_merge_by_name() {
        assert_eq!(
            resolve(
                r#"
                list:
                  - {name: a, value: 1}
                  - <<: (( merge ))
                  - {name: b, value: 2}
                "#,
                &["{list: [{name: a, value: 10}, {name: c, value: 30}]}"]
            ),
            yaml!("{list: [{name: a, value: 10}, {name: c, value: 30}, {name: b, value: 2}]}")
        );
    }

    #[test]
    fn anonymous_list_merge_splices_once() {
        let resolved = resolve("{list: [x, {<<: (( merge ))}]}", &["{list: [p, q]}"]);
        assert_eq!(resolved, yaml!("{list: [x, p, q]}"));
        assert_eq!(flow(&resolved, &[yaml!("{list: [p, q]}")]).unwrap(), resolved);
    }

    #[test]
    fn map_merge_marker() {
        let resolved = resolve(
            "{foo: {<<: (( merge )), b: 2, c: 3}}",
            &["{foo: {a: 1, b: 20}}"],
        );
        assert_eq!(resolved, yaml!("{foo: {a: 1, b: 20, c: 3}}"));

        // no stub: the marker merges nothing
        assert_eq!(resolve("{foo: {<<: (( merge )), b: 2}}", &[]), yaml!("{foo: {b: 2}}"));
    }

    #[test]
    fn merge_replace() {
        assert_eq!(
            resolve(
                "{foo: {<<: (( merge replace )), b: 2}, list: [{<<: (( merge replace ))}, 1]}",
                &["{foo: {a: 1}, list: [x]}"]
            ),
            yaml!("{foo: {a: 1}, list: [x]}")
        );
    }

    #[test]
    fn redirected_merge() {
        assert_eq!(
            resolve(
                "{foo: {<<: (( merge other )), b: 2, c: 3}}",
                &["{other: {a: 1, b: 20}, foo: {c: 30}}"]
            ),
            yaml!("{foo: {a: 1, b: 20, c: 3}}")
        );
    }

    #[test]
    fn auto_sizes_resource_pools() {
        let resolved = resolve(
            r#"
            resource_pools:
              - {name: p, size: (( auto ))}
              - {name: q, size: (( auto ))}
            jobs:
              - {name: a, resource_pool: p, instances: 2}
              - {name: b, resource_pool: p, instances: (( 1 + 2 ))}
              - {name: c, resource_pool: q, instances: 5}
            "#,
            &[],
        );
        assert_eq!(
            resolved.find(&["resource_pools", "p", "size"]),
            crate::node::Lookup::Found(&Node::new(5_i64, None))
        );
        assert_eq!(
            resolved.find(&["resource_pools", "q", "size"]),
            crate::node::Lookup::Found(&Node::new(5_i64, None))
        );
    }

    #[test]
    fn dependency_chains_resolve_incrementally() {
        let resolution = flow_partial(
            &yaml!("{a: (( b )), b: (( c )), c: (( d )), d: 1}"),
            &[],
            &FlowOptions::default(),
        )
        .unwrap();
        assert!(resolution.is_complete());
        assert_eq!(resolution.document, yaml!("{a: 1, b: 1, c: 1, d: 1}"));
        assert!(resolution.passes <= 4, "{} passes", resolution.passes);
    }

    #[test]
    fn circular_references_stay_unresolved() {
        let nodes = unresolved("{a: (( b )), b: (( a ))}");
        let paths: Vec<_> = nodes.iter().map(|node| node.path.join(".")).collect();
        assert_eq!(paths, ["a", "b"]);
    }

    #[test]
    fn failures_are_reported_with_issue() {
        let nodes = unresolved("{a: (( 1 / 0 )), b: (( ref )), c: true, d: (( c + 1 ))}");
        let issues: Vec<_> = nodes.iter().map(|node| node.issue.clone().unwrap_or_default()).collect();
        assert_eq!(issues[0], "division by zero");
        assert_eq!(issues[1], "'ref' not found");
        assert!(issues[2].contains("type mismatch"), "{}", issues[2]);
    }

    #[test]
    fn unparseable_expressions_are_reported() {
        let nodes = unresolved("{a: (( 1 + ))}");
        assert_eq!(nodes[0].expression, "(( 1 + ))");
        assert!(nodes[0]
            .issue
            .as_deref()
            .is_some_and(|issue| issue.starts_with("unparseable expression")));
    }

    #[test]
    fn documents_without_expressions_round_trip() {
        let document = "{a: [1, {name: x, v: 2.5}], b: {c: null, d: text}}";
        assert_eq!(resolve(document, &["{e: 1}"]), yaml!(document));
        assert_eq!(resolve(document, &[]), yaml!(document));
        assert_eq!(
            resolve(document, &["{a: [2, {name: x, v: 1}], b: {c: 1, d: other}}"]),
            yaml!(document)
        );
        assert_eq!(resolve("{a: 1, b: {c: text}}", &["{a: 2, b: {c: other}}"]), yaml!("{a: 1, b: {c: text}}"));
    }

    #[test]
    fn resolved_documents_are_fixed_points() {
        let first = resolve("{a: (( b + 1 )), b: 2, c: (( \"x\" d )), d: y}", &[]);
        assert_eq!(first, yaml!("{a: 3, b: 2, c: xy, d: y}"));
        assert_eq!(flow(&first, &[]).unwrap(), first);
    }

    #[test]
    fn pass_limit() {
        let options = FlowOptions { max_passes: 1 };
        let result = flow_partial(&yaml!("{a: (( b )), b: 1}"), &[], &options);
        assert!(matches!(result, Err(FlowError::PassLimitExceeded(1))));
    }

    #[test]
    fn cascade_flows_stubs_against_later_stubs() {
        let template = yaml!("{a: (( merge )), b: (( merge )), c: template}");
        let stubs = [
            yaml!("{a: (( merge )), b: (( \"from-\" c ))}"),
            yaml!("{a: second}"),
        ];
        let resolution = cascade(&template, &stubs, false, &FlowOptions::default()).unwrap();
        assert_eq!(
            resolution.document,
            yaml!("{a: second, b: from-template, c: template}")
        );

        // without `c` in the template only a partial cascade succeeds
        let template = yaml!("{a: (( merge )), b: (( merge ))}");
        let options = FlowOptions::default();
        assert!(matches!(
            cascade(&template, &stubs, false, &options),
            Err(FlowError::Unresolved(_))
        ));
        let resolution = cascade(&template, &stubs, true, &options).expect("partial cascade");
        assert_eq!(resolution.unresolved.len(), 1);
        assert_eq!(resolution.document.get("a").map(Node::value), Some(&Value::from("second")));
    }
}
