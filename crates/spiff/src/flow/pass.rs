//! a single resolution pass over a document tree
//!
//! A pass never mutates its input; it builds the next version of the tree from
//! the current one. Every map pushes a [Scope] before its entries are visited.
use super::merge::{evaluate_marker, expression_of, list_marker, new_entries, Marker, MARKER};
use crate::binding::{Binding, Scope};
use crate::dynaml::Outcome;
use crate::node::{Map, Node, Value};
use crate::util::{join_path, step_name};

/// Which nodes a stub value may take the place of
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Override {
    /// below a node that was replaced by a stub
    Never,
    /// nodes that are still expressions
    Expressions,
    /// literals as well, below a `<<: (( merge ))` marker that merged in this pass
    All,
}

impl Override {
    /// Mode for the entries of a collection
    fn entries(self, replace: bool, merged: bool) -> Override {
        match self {
            _ if replace => Override::Never,
            Override::Never => Override::Never,
            _ if merged => Override::All,
            mode => mode,
        }
    }
}

pub(super) fn flow_node(node: &Node, binding: &Binding<'_>, mode: Override) -> Node {
    let binding = binding.with_source(node.source_name().cloned());
    match node.value() {
        Value::Map(_) => return flow_map(node, &binding, mode),
        Value::List(_) => return flow_list(node, &binding, mode),
        _ => {}
    }

    let mut expression = expression_of(node, &binding);
    let mut current = node.clone();

    let preferred = node.is_preferred()
        || matches!(&expression, Some(Ok(expression)) if expression.is_preferred());
    let overridable = match mode {
        Override::Never => false,
        Override::Expressions => expression.is_some(),
        Override::All => true,
    };
    if overridable && !preferred {
        let stub_path = node.redirect_path().unwrap_or(binding.stub_path());
        if let Some(found) = binding.find_in_stubs(stub_path) {
            tracing::trace!(path = %join_path(binding.path()), "overridden by stub");
            let found = found
                .clone()
                .with_redirect(node.redirect_path().map(<[String]>::to_vec));
            // a stub expression is evaluated here, at the position it overrides
            expression = expression_of(&found, &binding);
            if expression.is_none() {
                return found;
            }
            current = found;
        }
    }

    let expression = match expression {
        None => return current,
        Some(Ok(expression)) => expression,
        Some(Err(issue)) => return current.with_issue(Some(issue)),
    };

    match expression.evaluate(&binding) {
        Outcome::Value(result, info) => {
            tracing::trace!(path = %join_path(binding.path()), %expression, "resolved");
            result
                .with_source(info.source)
                .with_redirect(
                    info.redirect_path
                        .or_else(|| current.redirect_path().map(<[String]>::to_vec)),
                )
                .with_replace(info.replace)
                .with_preferred(info.preferred || expression.is_preferred())
                .with_issue(None)
        }
        Outcome::Deferred(info) | Outcome::Failed(info) => {
            current.with_value(expression).with_issue(info.issue)
        }
    }
}

fn flow_map(node: &Node, binding: &Binding<'_>, mode: Override) -> Node {
    let Value::Map(map) = node.value() else {
        return node.clone();
    };

    let binding = match node.redirect_path() {
        Some(redirect) => binding.redirect(redirect.to_vec()),
        None => binding.clone(),
    };
    let scope = Scope::new(map, binding.scope());
    let mut binding = binding.with_scope(&scope);

    let marker = match map.get(MARKER) {
        Some(marker) => evaluate_marker(marker, &binding),
        None => Marker::Literal,
    };
    let (marker, redirect, base) = match marker {
        Marker::Merge {
            base,
            redirect_path,
            replace,
        } => match base.into_value() {
            Value::Map(entries) if replace => {
                tracing::debug!(path = %join_path(binding.path()), "map replaced by stub");
                return node
                    .with_value(entries)
                    .with_redirect(redirect_path)
                    .with_replace(true);
            }
            Value::Map(entries) => (Marker::Drop, redirect_path, Some(entries)),
            other => {
                let issue = format!("merging into a map requires a map, got {}", other.type_name());
                let kept = map[MARKER].clone().with_issue(Some(issue));
                (Marker::Keep(kept), None, None)
            }
        },
        other => (other, None, None),
    };
    if let Some(redirect) = &redirect {
        binding = binding.redirect(redirect.clone());
    }
    let entry_mode = mode.entries(node.is_replace(), base.is_some());

    let mut entries = Map::with_capacity(map.len());
    for (key, child) in map {
        if key == MARKER {
            match &marker {
                Marker::Keep(kept) => {
                    entries.insert(key.clone(), kept.clone());
                    continue;
                }
                Marker::Drop => continue,
                Marker::Literal | Marker::Merge { .. } => {}
            }
        }
        let child_binding = binding.with_path(key.as_str());
        entries.insert(key.clone(), flow_node(child, &child_binding, entry_mode));
    }

    if let Some(base) = base {
        for (key, value) in base {
            if key != MARKER && !entries.contains_key(&key) {
                entries.insert(key, value);
            }
        }
    }

    node.with_value(entries).with_redirect(redirect)
}

fn flow_list(node: &Node, binding: &Binding<'_>, mode: Override) -> Node {
    let Value::List(list) = node.value() else {
        return node.clone();
    };

    let mut binding = match node.redirect_path() {
        Some(redirect) => binding.redirect(redirect.to_vec()),
        None => binding.clone(),
    };
    let names: Vec<&str> = list.iter().filter_map(Node::name).collect();
    let mut redirect = None;
    let mut merged = false;

    // (entry, flow it in this pass)
    let mut entries: Vec<(Node, bool)> = Vec::with_capacity(list.len());
    for entry in list {
        let Some(marker) = list_marker(entry) else {
            entries.push((entry.clone(), true));
            continue;
        };

        let issue = match evaluate_marker(marker, &binding) {
            Marker::Merge {
                base,
                redirect_path,
                replace,
            } => match base.value() {
                Value::List(stub_entries) if replace => {
                    tracing::debug!(path = %join_path(binding.path()), "list replaced by stub");
                    return node
                        .with_value(stub_entries.clone())
                        .with_redirect(redirect_path)
                        .with_replace(true);
                }
                Value::List(stub_entries) => {
                    if let Some(redirect_path) = &redirect_path {
                        binding = binding.redirect(redirect_path.clone());
                    }
                    redirect = redirect.or(redirect_path);
                    merged = true;
                    let added = new_entries(stub_entries, &names);
                    tracing::trace!(added = added.len(), "merged stub list entries");
                    entries.extend(added.into_iter().map(|entry| (entry.clone(), false)));
                    continue;
                }
                other => {
                    let issue = format!(
                        "merging into a list requires a list, got {}",
                        other.type_name()
                    );
                    marker.clone().with_issue(Some(issue))
                }
            },
            Marker::Drop => continue,
            Marker::Keep(kept) => kept,
            Marker::Literal => {
                entries.push((entry.clone(), true));
                continue;
            }
        };
        let kept = entry.with_value(Map::from([(MARKER.to_string(), issue)]));
        entries.push((kept, false));
    }

    let entry_mode = mode.entries(node.is_replace(), merged);
    let flowed: Vec<Node> = entries
        .into_iter()
        .enumerate()
        .map(|(index, (entry, flow))| {
            if !flow {
                return entry;
            }
            // after a merge, indices no longer line up with the stub list
            let entry_mode = match entry.name() {
                None if merged => Override::Never,
                _ => entry_mode,
            };
            let entry_binding = binding.with_path(step_name(index, &entry));
            flow_node(&entry, &entry_binding, entry_mode)
        })
        .collect();

    node.with_value(flowed).with_redirect(redirect)
}
