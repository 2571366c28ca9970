use super::builtins::ip;
use super::{resolve_operands, to_bool, to_text, BinaryOp, EvaluationInfo, Expression, Outcome};
use crate::binding::Binding;
use crate::node::{Node, Value};

pub(super) fn evaluate_binary(
    op: BinaryOp,
    lhs: &Expression,
    rhs: &Expression,
    binding: &Binding<'_>,
) -> Outcome {
    match op {
        BinaryOp::Fallback => fallback(lhs, rhs, binding),
        BinaryOp::And | BinaryOp::Or => logical(op, lhs, rhs, binding),
        _ => {
            let (values, info) = match resolve_operands(binding, &[lhs, rhs]) {
                Ok(resolved) => resolved,
                Err(outcome) => return outcome,
            };
            let (a, b) = (&values[0], &values[1]);

            let result = match op {
                BinaryOp::Add
                | BinaryOp::Subtract
                | BinaryOp::Multiply
                | BinaryOp::Divide
                | BinaryOp::Modulo => arithmetic(op, a.value(), b.value()),
                BinaryOp::Concatenation => concatenate(a.value(), b.value()),
                _ => compare(op, a, b),
            };

            match result {
                Ok(value) => Outcome::value(value, binding).after(info),
                Err(issue) => Outcome::Failed(info.join(EvaluationInfo::issue(issue))),
            }
        }
    }
}

fn arithmetic(op: BinaryOp, a: &Value, b: &Value) -> Result<Value, String> {
    match (a, b) {
        (Value::Integer(x), Value::Integer(y)) => {
            let result = match op {
                BinaryOp::Add => x.checked_add(*y),
                BinaryOp::Subtract => x.checked_sub(*y),
                BinaryOp::Multiply => x.checked_mul(*y),
                BinaryOp::Divide | BinaryOp::Modulo if *y == 0 => {
                    return Err("division by zero".to_string())
                }
                BinaryOp::Divide => x.checked_div(*y),
                _ => x.checked_rem(*y),
            };
            result
                .map(Value::Integer)
                .ok_or_else(|| "integer overflow".to_string())
        }
        (Value::String(address), Value::Integer(offset))
            if matches!(op, BinaryOp::Add | BinaryOp::Subtract) && ip::is_address(address) =>
        {
            let offset = if op == BinaryOp::Add {
                Some(*offset as i128)
            } else {
                (*offset as i128).checked_neg()
            };
            offset
                .ok_or_else(|| "integer overflow".to_string())
                .and_then(|offset| ip::offset(address, offset))
                .map(Value::String)
        }
        (Value::String(x), Value::String(y)) if op == BinaryOp::Add => {
            Ok(Value::String(format!("{x}{y}")))
        }
        (Value::String(x), Value::String(y))
            if op == BinaryOp::Subtract && ip::is_address(x) && ip::is_address(y) =>
        {
            ip::distance(x, y).map(Value::Integer)
        }
        _ => Err(format!(
            "type mismatch: {} {} {}",
            a.type_name(),
            op.symbol(),
            b.type_name()
        )),
    }
}

fn concatenate(a: &Value, b: &Value) -> Result<Value, String> {
    match (a, b) {
        (Value::String(x), Value::String(y)) => Ok(Value::String(format!("{x}{y}"))),
        _ => Err(format!(
            "type mismatch in concatenation: {} and {}",
            a.type_name(),
            b.type_name()
        )),
    }
}

fn compare(op: BinaryOp, a: &Node, b: &Node) -> Result<Value, String> {
    match op {
        BinaryOp::Equal => Ok(Value::Boolean(equal(a, b))),
        BinaryOp::NotEqual => Ok(Value::Boolean(!equal(a, b))),
        _ => {
            let (Value::Integer(x), Value::Integer(y)) = (a.value(), b.value()) else {
                return Err("comparison only for integers".to_string());
            };
            Ok(Value::Boolean(match op {
                BinaryOp::Less => x < y,
                BinaryOp::LessOrEqual => x <= y,
                BinaryOp::Greater => x > y,
                _ => x >= y,
            }))
        }
    }
}

/// Same types compare structurally, different scalar types compare textually
fn equal(a: &Node, b: &Node) -> bool {
    match (a.value(), b.value()) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (x, y) if std::mem::discriminant(x) == std::mem::discriminant(y) => a.equivalent(b),
        (x, y) => match (to_text(x), to_text(y)) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        },
    }
}

/// `-and`/`-or`: bitwise for two integers, boolean otherwise
fn logical(op: BinaryOp, lhs: &Expression, rhs: &Expression, binding: &Binding<'_>) -> Outcome {
    let (a, info) = match lhs.evaluate(binding) {
        Outcome::Value(node, info) => (node, info),
        other => return other,
    };

    if !matches!(a.value(), Value::Integer(_)) {
        let truthy = to_bool(a.value());
        if op == BinaryOp::And && !truthy {
            return Outcome::value(false, binding).after(info);
        }
        if op == BinaryOp::Or && truthy {
            return Outcome::value(true, binding).after(info);
        }
    }

    let (b, info) = match rhs.evaluate(binding).after(info) {
        Outcome::Value(node, info) => (node, info),
        other => return other,
    };

    let value = match (a.value(), b.value()) {
        (Value::Integer(x), Value::Integer(y)) if op == BinaryOp::And => Value::Integer(x & y),
        (Value::Integer(x), Value::Integer(y)) => Value::Integer(x | y),
        (x, y) if op == BinaryOp::And => Value::Boolean(to_bool(x) && to_bool(y)),
        (x, y) => Value::Boolean(to_bool(x) || to_bool(y)),
    };
    Outcome::value(value, binding).after(info)
}

/// `a || b`: a failing `a` is replaced by `b`, an unresolved `a` waits
fn fallback(lhs: &Expression, rhs: &Expression, binding: &Binding<'_>) -> Outcome {
    match lhs.evaluate(binding) {
        Outcome::Failed(info) => {
            tracing::trace!(issue = ?info.issue, "falling back");
            rhs.evaluate(binding)
        }
        other => other,
    }
}

pub(super) fn evaluate_not(inner: &Expression, binding: &Binding<'_>) -> Outcome {
    match inner.evaluate(binding) {
        Outcome::Value(node, info) => Outcome::value(!to_bool(node.value()), binding).after(info),
        other => other,
    }
}

pub(super) fn evaluate_conditional(
    condition: &Expression,
    then: &Expression,
    otherwise: &Expression,
    binding: &Binding<'_>,
) -> Outcome {
    match condition.evaluate(binding) {
        Outcome::Value(node, info) => {
            let branch = if to_bool(node.value()) { then } else { otherwise };
            branch.evaluate(binding).after(info)
        }
        other => other,
    }
}
