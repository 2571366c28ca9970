use super::{EvaluationInfo, MergeExpr, Outcome};
use crate::binding::Binding;
use crate::node::{Lookup, Node, Value};
use crate::util::join_path;

pub(super) fn evaluate_reference(path: &[String], binding: &Binding<'_>) -> Outcome {
    let lookup = match path.split_first() {
        Some((first, rest)) if first.is_empty() => binding.find_from_root(rest),
        _ => binding.find_reference(path),
    };

    match lookup {
        Lookup::Found(node) if node.is_resolved() => Outcome::Value(
            Node::new(node.value().clone(), node.source_name().cloned()),
            EvaluationInfo::default(),
        ),
        Lookup::Found(_) | Lookup::Unresolved => Outcome::deferred(),
        Lookup::NotFound => Outcome::failed(format!("'{}' not found", join_path(path))),
    }
}

pub(super) fn evaluate_merge(merge: &MergeExpr, binding: &Binding<'_>) -> Outcome {
    let path = if merge.redirect {
        merge.path.as_slice()
    } else {
        binding.stub_path()
    };

    let Some(found) = binding.find_in_stubs(path) else {
        return Outcome::failed(format!("'{}' not found in any stub", join_path(path)));
    };
    tracing::trace!(path = %join_path(path), "merged from stub");

    Outcome::Value(
        Node::new(found.value().clone(), found.source_name().cloned()),
        EvaluationInfo {
            merged: true,
            replace: merge.replace,
            redirect_path: merge.redirect.then(|| path.to_vec()),
            source: found.source_name().cloned(),
            ..Default::default()
        },
    )
}

/// `resource_pools.<pool>.size`: sum of `instances` of all jobs in that pool
pub(super) fn evaluate_auto(path: &[String], binding: &Binding<'_>) -> Outcome {
    let [pools, pool, size] = path else {
        return auto_unsupported();
    };
    if pools != "resource_pools" || size != "size" {
        return auto_unsupported();
    }

    let jobs = match binding.find_from_root(&["jobs"]) {
        Lookup::Found(jobs) => jobs,
        Lookup::Unresolved => return Outcome::deferred(),
        Lookup::NotFound => return Outcome::failed("no jobs found"),
    };
    let Value::List(jobs) = jobs.value() else {
        if !jobs.is_locally_resolved() {
            return Outcome::deferred();
        }
        return Outcome::failed("jobs must be a list");
    };

    let mut total: i64 = 0;
    for (index, job) in jobs.iter().enumerate() {
        if !job.is_locally_resolved() {
            return Outcome::deferred();
        }
        match job.get("resource_pool") {
            Some(node) if !node.is_locally_resolved() => return Outcome::deferred(),
            Some(node) if node.value() == &Value::String(pool.clone()) => {}
            _ => continue,
        }

        let job_name = crate::util::step_name(index, job);
        match job.get("instances") {
            Some(node) if !node.is_locally_resolved() => return Outcome::deferred(),
            Some(node) => match node.value() {
                Value::Integer(instances) => match total.checked_add(*instances) {
                    Some(sum) => total = sum,
                    None => return Outcome::failed("integer overflow"),
                },
                other => {
                    return Outcome::failed(format!(
                        "instances of job '{job_name}' must be an integer, got {}",
                        other.type_name()
                    ))
                }
            },
            None => {
                return Outcome::failed(format!("job '{job_name}' has no instances"));
            }
        }
    }

    Outcome::value(total, binding)
}

fn auto_unsupported() -> Outcome {
    Outcome::failed("auto only allowed for size entry in resource pools")
}
