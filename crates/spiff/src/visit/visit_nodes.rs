use super::Visit;
use crate::node::{Node, Value};
use crate::util::{join_path, step_name};
use std::fmt::{self, Display, Formatter};

/// Position of a node in two notations
///
/// The context path follows the actual tree shape (`[N]` for every list entry),
/// the logical path addresses named list entries by their name, the way
/// references and `merge` address them.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct NodePath {
    context: Vec<String>,
    logical: Vec<String>,
}

impl NodePath {
    pub fn context(&self) -> &[String] {
        &self.context
    }

    pub fn logical(&self) -> &[String] {
        &self.logical
    }

    fn push(&mut self, context: String, logical: String) {
        self.context.push(context);
        self.logical.push(logical);
    }

    fn pop(&mut self) {
        self.context.pop();
        self.logical.pop();
    }
}

impl Display for NodePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t({})", join_path(&self.context), join_path(&self.logical))
    }
}

/// Recursively visit all [Node]s depth first, parents before children
pub trait VisitNodes {
    fn visit_nodes(&self, visitor: &mut dyn Visit<Node>);
}

impl VisitNodes for Node {
    fn visit_nodes(&self, visitor: &mut dyn Visit<Node>) {
        walk(self, &mut NodePath::default(), visitor);
    }
}

fn walk(node: &Node, path: &mut NodePath, visitor: &mut dyn Visit<Node>) {
    visitor.visit(path, node);
    match node.value() {
        Value::Map(map) => {
            for (key, child) in map {
                path.push(key.clone(), key.clone());
                walk(child, path, visitor);
                path.pop();
            }
        }
        Value::List(list) => {
            for (index, child) in list.iter().enumerate() {
                path.push(format!("[{index}]"), step_name(index, child));
                walk(child, path, visitor);
                path.pop();
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::yaml;
    use pretty_assertions::assert_eq;

    #[test]
    fn paths_of_named_entries() {
        let document = yaml!("{jobs: [{name: web, port: 80}, [x]]}");
        let mut seen = vec![];
        document.visit_nodes(&mut |path: &NodePath, node: &Node| {
            if !matches!(node.value(), Value::Map(_) | Value::List(_)) {
                seen.push((join_path(path.context()), join_path(path.logical())));
            }
        });

        let expected = [
            ("jobs.[0].name", "jobs.web.name"),
            ("jobs.[0].port", "jobs.web.port"),
            ("jobs.[1].[0]", "jobs.[1].[0]"),
        ]
        .map(|(context, logical)| (context.to_string(), logical.to_string()));
        assert_eq!(seen, expected);
    }

    #[test]
    fn root_is_visited_first() {
        let document = yaml!("{a: 1}");
        let mut depths = vec![];
        document.visit_nodes(&mut |path: &NodePath, _: &Node| depths.push(path.context().len()));
        assert_eq!(depths, [0, 1]);
    }
}
