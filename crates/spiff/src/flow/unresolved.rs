//! terminal unresolved nodes
use crate::node::{Node, Value};
use crate::util::join_path;
use crate::visit::{NodePath, VisitNodes};
use std::fmt::{self, Display, Formatter};

/// A node that was still an expression when the document stopped changing
#[derive(Debug, Clone, PartialEq, derive_new::new)]
pub struct UnresolvedNode {
    /// `(( expr ))` or the unparseable source string
    pub expression: String,
    pub source_name: Option<String>,
    pub context: Vec<String>,
    pub path: Vec<String>,
    pub issue: Option<String>,
}

impl Display for UnresolvedNode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\tin {}\t{}\t({})",
            self.expression,
            self.source_name.as_deref().unwrap_or("-"),
            join_path(&self.context),
            join_path(&self.path),
        )?;
        if let Some(issue) = &self.issue {
            write!(f, "\t{issue}")?;
        }
        Ok(())
    }
}

/// Aggregate of every node a flow could not resolve
#[derive(Debug, Clone, PartialEq, derive_new::new)]
pub struct UnresolvedNodes {
    pub nodes: Vec<UnresolvedNode>,
}

impl std::error::Error for UnresolvedNodes {}

impl Display for UnresolvedNodes {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("unresolved nodes:")?;
        for node in &self.nodes {
            write!(f, "\n\t{node}")?;
        }
        Ok(())
    }
}

/// Depth first collection of all nodes that are not resolved locally
pub fn collect_unresolved(document: &Node) -> Vec<UnresolvedNode> {
    let mut unresolved = vec![];
    document.visit_nodes(&mut |path: &NodePath, node: &Node| {
        if node.is_locally_resolved() {
            return;
        }
        let expression = match node.value() {
            Value::Expression(expression) => format!("(( {expression} ))"),
            Value::String(source) => source.clone(),
            other => other.type_name().to_string(),
        };
        tracing::trace!(%expression, %path, "unresolved");
        unresolved.push(UnresolvedNode::new(
            expression,
            node.source_name().map(ToString::to_string),
            path.context().to_vec(),
            path.logical().to_vec(),
            node.issue().map(ToString::to_string),
        ));
    });
    unresolved
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::dynaml::parse;
    use crate::node::Map;
    use pretty_assertions::assert_eq;
    use std::rc::Rc;

    #[test]
    fn collects_expressions_and_unparseable_strings() {
        let source: Option<Rc<str>> = Some("template.yml".into());
        let expression = Node::new(parse("ref", &[]).unwrap(), source.clone())
            .with_issue(Some("'ref' not found".into()));
        let job = Node::new(
            Map::from([
                ("name".to_string(), Node::new("web", source.clone())),
                ("bad".to_string(), Node::new("(( 1 + ))", source.clone())),
            ]),
            source.clone(),
        );
        let document = Node::new(
            Map::from([
                ("a".to_string(), expression),
                ("jobs".to_string(), Node::new(vec![job], source.clone())),
            ]),
            source,
        );

        let unresolved = collect_unresolved(&document);
        assert_eq!(
            unresolved,
            vec![
                UnresolvedNode::new(
                    "(( ref ))".into(),
                    Some("template.yml".into()),
                    vec!["a".into()],
                    vec!["a".into()],
                    Some("'ref' not found".into()),
                ),
                UnresolvedNode::new(
                    "(( 1 + ))".into(),
                    Some("template.yml".into()),
                    vec!["jobs".into(), "[0]".into(), "bad".into()],
                    vec!["jobs".into(), "web".into(), "bad".into()],
                    None,
                ),
            ]
        );
    }

    #[test]
    fn rendering() {
        let nodes = UnresolvedNodes::new(vec![UnresolvedNode::new(
            "(( ref ))".into(),
            Some("template.yml".into()),
            vec!["jobs".into(), "[0]".into(), "x".into()],
            vec!["jobs".into(), "web".into(), "x".into()],
            Some("'ref' not found".into()),
        )]);
        assert_eq!(
            nodes.to_string(),
            "unresolved nodes:\n\t(( ref ))\tin template.yml\tjobs.[0].x\t(jobs.web.x)\t'ref' not found"
        );
    }
}
