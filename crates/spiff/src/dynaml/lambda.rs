use super::{builtins, parse, resolve_operands, Expression, LambdaExpr, Outcome};
use crate::binding::{Binding, Locals};
use crate::node::{Node, Value};
use std::fmt::{self, Display, Formatter};

/// A lambda expression closed over the local names visible where it was evaluated
#[derive(Debug, Clone, PartialEq)]
pub struct LambdaValue {
    pub params: Vec<String>,
    pub body: Expression,
    pub captured: Locals,
}

impl LambdaValue {
    /// Bind captured names and arguments on top of the caller's binding
    pub fn invoke(&self, arguments: Vec<Node>, binding: &Binding<'_>) -> Outcome {
        if arguments.len() != self.params.len() {
            return Outcome::failed(format!(
                "lambda expects {} arguments, got {}",
                self.params.len(),
                arguments.len()
            ));
        }

        let mut locals = self.captured.clone();
        locals.extend(self.params.iter().cloned().zip(arguments));
        self.body.evaluate(&binding.with_locals(locals))
    }
}

impl Display for LambdaValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "lambda |{}|->{}", self.params.join(","), self.body)
    }
}

pub(super) fn evaluate_lambda(lambda: &LambdaExpr, binding: &Binding<'_>) -> Outcome {
    let value = LambdaValue {
        params: lambda.params.clone(),
        body: (*lambda.body).clone(),
        captured: binding.locals().clone(),
    };
    Outcome::value(value, binding)
}

/// Lambda values, or strings of the form `|x,y|->body`
fn to_lambda(node: &Node, binding: &Binding<'_>) -> Result<LambdaValue, Outcome> {
    match node.value() {
        Value::Lambda(lambda) => Ok(lambda.clone()),
        Value::String(source) if source.trim_start().starts_with('|') => {
            match parse(&format!("lambda {source}"), binding.path()) {
                Ok(Expression::Lambda(lambda)) => Ok(LambdaValue {
                    params: lambda.params,
                    body: *lambda.body,
                    captured: Default::default(),
                }),
                Ok(_) => Err(Outcome::failed(format!("'{source}' is no lambda"))),
                Err(err) => Err(Outcome::failed(format!("invalid lambda '{source}': {err}"))),
            }
        }
        other => Err(Outcome::failed(format!(
            "function call requires a lambda, got {}",
            other.type_name()
        ))),
    }
}

pub(super) fn evaluate_call(
    function: &Expression,
    arguments: &[Expression],
    binding: &Binding<'_>,
) -> Outcome {
    let operands: Vec<&Expression> = arguments.iter().collect();

    if let Expression::Reference(path) = function {
        if let [name] = path.as_slice() {
            if let Some(builtin) = builtins::lookup(name) {
                return match resolve_operands(binding, &operands) {
                    Ok((values, info)) => builtin(&values, binding).after(info),
                    Err(outcome) => outcome,
                };
            }
        }
    }

    let (callee, info) = match function.evaluate(binding) {
        Outcome::Value(node, info) => (node, info),
        other => return other,
    };
    let lambda = match to_lambda(&callee, binding) {
        Ok(lambda) => lambda,
        Err(outcome) => return outcome.after(info),
    };

    match resolve_operands(binding, &operands) {
        Ok((values, arguments_info)) => lambda
            .invoke(values, binding)
            .after(info.join(arguments_info)),
        Err(outcome) => outcome.after(info),
    }
}

/// `map[collection|lambda]`: lists map per element, maps per key in key order
pub(super) fn evaluate_map(
    collection: &Expression,
    mapping: &Expression,
    binding: &Binding<'_>,
) -> Outcome {
    let (values, mut info) = match resolve_operands(binding, &[collection, mapping]) {
        Ok(resolved) => resolved,
        Err(outcome) => return outcome,
    };
    let lambda = match to_lambda(&values[1], binding) {
        Ok(lambda) => lambda,
        Err(outcome) => return outcome.after(info),
    };
    let with_key = match lambda.params.len() {
        1 => false,
        2 => true,
        n => {
            return Outcome::failed(format!("map expects a lambda with 1 or 2 parameters, got {n}"))
                .after(info)
        }
    };

    let source_name = binding.source_name().cloned();
    let calls: Vec<Vec<Node>> = match values[0].value() {
        Value::List(entries) => entries
            .iter()
            .enumerate()
            .map(|(index, entry)| {
                let index = Node::new(index as i64, source_name.clone());
                if with_key {
                    vec![index, entry.clone()]
                } else {
                    vec![entry.clone()]
                }
            })
            .collect(),
        Value::Map(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            keys.into_iter()
                .map(|key| {
                    let key_node = Node::new(key.as_str(), source_name.clone());
                    if with_key {
                        vec![key_node, map[key].clone()]
                    } else {
                        vec![map[key].clone()]
                    }
                })
                .collect()
        }
        Value::Null => vec![],
        other => {
            return Outcome::failed(format!(
                "map requires a list or map, got {}",
                other.type_name()
            ))
            .after(info)
        }
    };

    let mut results = Vec::with_capacity(calls.len());
    for arguments in calls {
        match lambda.invoke(arguments, binding) {
            Outcome::Value(node, next) => {
                info = info.join(next);
                results.push(node);
            }
            other => return other.after(info),
        }
    }

    Outcome::value(results, binding).after(info)
}
