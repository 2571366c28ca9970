//! dynaml - the embedded expression language
//!
//! Source text found between `((` and `))` is turned into an [Expression] by [parse].
//! Expressions are immutable; [Expression::evaluate] resolves them against a
//! [Binding] and reports one of three [Outcome]s:
//!
//! - [Outcome::Value]: the expression produced a node
//! - [Outcome::Deferred]: some operand is not resolved yet, try again on the next pass
//! - [Outcome::Failed]: the expression can not produce a value (issue attached)
//!
//! An expression with an unresolved operand never evaluates partially, the whole
//! expression stays as it is until all of its operands are known.
mod builtins;
mod lambda;
mod lexer;
mod operators;
mod parser;
mod reference;

pub use lambda::LambdaValue;
pub use parser::{parse, ParseError};

use crate::binding::Binding;
use crate::node::{Node, Value};
use std::fmt::{self, Display, Formatter};
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Nil,
    Boolean(bool),
    Integer(i64),
    String(String),
    List(Vec<Expression>),
    /// Dotted path; a leading empty step addresses the document root
    Reference(Vec<String>),
    Merge(MergeExpr),
    /// Path of the node the expression was found at
    Auto(Vec<String>),
    Grouped(Box<Expression>),
    Binary(BinaryOp, Box<Expression>, Box<Expression>),
    Not(Box<Expression>),
    Conditional(Box<Expression>, Box<Expression>, Box<Expression>),
    Call(Box<Expression>, Vec<Expression>),
    Lambda(LambdaExpr),
    /// `map[collection|...]`, the second operand evaluates to a lambda
    Map(Box<Expression>, Box<Expression>),
    Prefer(Box<Expression>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    And,
    Or,
    Concatenation,
    /// `a || b`: `b` when `a` fails
    Fallback,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MergeExpr {
    pub path: Vec<String>,
    pub redirect: bool,
    pub replace: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LambdaExpr {
    pub params: Vec<String>,
    pub body: Box<Expression>,
}

/// Side channel of a single evaluation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvaluationInfo {
    pub issue: Option<String>,
    /// the result must not be overridden by stubs
    pub preferred: bool,
    /// the result was taken from a stub
    pub merged: bool,
    pub replace: bool,
    pub redirect_path: Option<Vec<String>>,
    pub source: Option<Rc<str>>,
}

impl EvaluationInfo {
    pub fn issue(issue: impl Into<String>) -> Self {
        Self {
            issue: Some(issue.into()),
            ..Default::default()
        }
    }

    /// last issue wins, preferred is sticky
    pub fn join(self, other: EvaluationInfo) -> EvaluationInfo {
        EvaluationInfo {
            issue: other.issue.or(self.issue),
            preferred: self.preferred || other.preferred,
            merged: false,
            replace: false,
            redirect_path: None,
            source: other.source.or(self.source),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Value(Node, EvaluationInfo),
    Deferred(EvaluationInfo),
    Failed(EvaluationInfo),
}

impl Outcome {
    pub fn value(value: impl Into<Value>, binding: &Binding<'_>) -> Outcome {
        Outcome::Value(
            Node::new(value, binding.source_name().cloned()),
            EvaluationInfo::default(),
        )
    }

    pub fn failed(issue: impl Into<String>) -> Outcome {
        Outcome::Failed(EvaluationInfo::issue(issue))
    }

    pub fn deferred() -> Outcome {
        Outcome::Deferred(EvaluationInfo::default())
    }

    /// Prepend info gathered before this outcome was produced
    pub fn after(self, before: EvaluationInfo) -> Outcome {
        match self {
            Outcome::Value(node, info) => {
                let joined = EvaluationInfo {
                    merged: info.merged,
                    replace: info.replace,
                    redirect_path: info.redirect_path.clone(),
                    ..before.join(info)
                };
                Outcome::Value(node, joined)
            }
            Outcome::Deferred(info) => Outcome::Deferred(before.join(info)),
            Outcome::Failed(info) => Outcome::Failed(before.join(info)),
        }
    }

    pub fn is_value(&self) -> bool {
        matches!(self, Outcome::Value(..))
    }
}

/// Evaluate all operands, or bail out with the first deferral or failure
pub(crate) fn resolve_operands(
    binding: &Binding<'_>,
    operands: &[&Expression],
) -> Result<(Vec<Node>, EvaluationInfo), Outcome> {
    let mut info = EvaluationInfo::default();
    let mut values = Vec::with_capacity(operands.len());

    for operand in operands {
        match operand.evaluate(binding) {
            Outcome::Value(node, next) => {
                info = info.join(next);
                values.push(node);
            }
            Outcome::Deferred(next) => return Err(Outcome::Deferred(info.join(next))),
            Outcome::Failed(next) => return Err(Outcome::Failed(info.join(next))),
        }
    }

    Ok((values, info))
}

impl Expression {
    #[tracing::instrument(level = "trace", skip_all, fields(expression = %self))]
    pub fn evaluate(&self, binding: &Binding<'_>) -> Outcome {
        match self {
            Expression::Nil => Outcome::value(Value::Null, binding),
            Expression::Boolean(b) => Outcome::value(*b, binding),
            Expression::Integer(i) => Outcome::value(*i, binding),
            Expression::String(s) => Outcome::value(s.as_str(), binding),
            Expression::List(entries) => {
                let operands: Vec<_> = entries.iter().collect();
                match resolve_operands(binding, &operands) {
                    Ok((values, info)) => Outcome::value(values, binding).after(info),
                    Err(outcome) => outcome,
                }
            }
            Expression::Reference(path) => reference::evaluate_reference(path, binding),
            Expression::Merge(merge) => reference::evaluate_merge(merge, binding),
            Expression::Auto(path) => reference::evaluate_auto(path, binding),
            Expression::Grouped(inner) => inner.evaluate(binding),
            Expression::Binary(op, lhs, rhs) => operators::evaluate_binary(*op, lhs, rhs, binding),
            Expression::Not(inner) => operators::evaluate_not(inner, binding),
            Expression::Conditional(condition, then, otherwise) => {
                operators::evaluate_conditional(condition, then, otherwise, binding)
            }
            Expression::Call(function, arguments) => {
                lambda::evaluate_call(function, arguments, binding)
            }
            Expression::Lambda(lambda) => lambda::evaluate_lambda(lambda, binding),
            Expression::Map(collection, mapping) => {
                lambda::evaluate_map(collection, mapping, binding)
            }
            Expression::Prefer(inner) => match inner.evaluate(binding) {
                Outcome::Value(node, mut info) => {
                    info.preferred = true;
                    Outcome::Value(node, info)
                }
                other => other,
            },
        }
    }

    /// Wrapped in `prefer`, stub values never override it
    pub fn is_preferred(&self) -> bool {
        match self {
            Expression::Prefer(_) => true,
            Expression::Grouped(inner) => inner.is_preferred(),
            _ => false,
        }
    }
}

/// Truthiness of a resolved value
pub fn to_bool(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Boolean(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Integer(i) => *i != 0,
        Value::List(list) => !list.is_empty(),
        Value::Map(map) => !map.is_empty(),
        _ => true,
    }
}

/// Textual form of a scalar, as used by string conversions
pub(crate) fn to_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => Some(String::new()),
        Value::Boolean(b) => Some(b.to_string()),
        Value::Integer(i) => Some(i.to_string()),
        Value::Decimal(d) => Some(d.to_string()),
        Value::String(s) => Some(s.clone()),
        Value::Lambda(lambda) => Some(lambda.to_string()),
        Value::List(_) | Value::Map(_) | Value::Expression(_) => None,
    }
}

impl BinaryOp {
    fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Modulo => "%",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::Less => "<",
            BinaryOp::LessOrEqual => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterOrEqual => ">=",
            BinaryOp::And => "-and",
            BinaryOp::Or => "-or",
            BinaryOp::Concatenation => "",
            BinaryOp::Fallback => "||",
        }
    }
}

impl Display for Expression {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Nil => f.write_str("nil"),
            Expression::Boolean(b) => write!(f, "{b}"),
            Expression::Integer(i) => write!(f, "{i}"),
            Expression::String(s) => write!(f, "\"{}\"", escape(s)),
            Expression::List(entries) => {
                f.write_str("[")?;
                write_separated(f, entries)?;
                f.write_str("]")
            }
            Expression::Reference(path) => f.write_str(&path.join(".")),
            Expression::Merge(merge) => {
                f.write_str("merge")?;
                if merge.replace {
                    f.write_str(" replace")?;
                }
                if merge.redirect {
                    write!(f, " {}", merge.path.join("."))?;
                }
                Ok(())
            }
            Expression::Auto(_) => f.write_str("auto"),
            Expression::Grouped(inner) => write!(f, "({inner})"),
            Expression::Binary(BinaryOp::Concatenation, lhs, rhs) => write!(f, "{lhs} {rhs}"),
            Expression::Binary(op, lhs, rhs) => write!(f, "{lhs} {} {rhs}", op.symbol()),
            Expression::Not(inner) => write!(f, "!{inner}"),
            Expression::Conditional(condition, then, otherwise) => {
                write!(f, "{condition} ? {then} : {otherwise}")
            }
            Expression::Call(function, arguments) => {
                write!(f, "{function}(")?;
                write_separated(f, arguments)?;
                f.write_str(")")
            }
            Expression::Lambda(lambda) => write!(f, "{lambda}"),
            Expression::Map(collection, mapping) => match mapping.as_ref() {
                Expression::Lambda(lambda) => {
                    write!(f, "map[{collection}|{}|->{}]", lambda.params.join(","), lambda.body)
                }
                other => write!(f, "map[{collection}|{other}]"),
            },
            Expression::Prefer(inner) => write!(f, "prefer {inner}"),
        }
    }
}

impl Display for LambdaExpr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "lambda |{}|->{}", self.params.join(","), self.body)
    }
}

fn escape(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => escaped.push_str("\\\""),
            '\\' => escaped.push_str("\\\\"),
            '\n' => escaped.push_str("\\n"),
            '\t' => escaped.push_str("\\t"),
            '\r' => escaped.push_str("\\r"),
            c => escaped.push(c),
        }
    }
    escaped
}

fn write_separated(f: &mut Formatter<'_>, entries: &[Expression]) -> fmt::Result {
    for (index, entry) in entries.iter().enumerate() {
        if index > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{entry}")?;
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use crate::binding::{Binding, RunContext, Scope};
    use crate::node::Map;
    use pretty_assertions::assert_eq;

    /// Evaluate `source` with the root map of `document` as the only scope
    pub(crate) fn eval_in(document: &Node, stubs: &[Node], source: &str) -> Outcome {
        let context = RunContext::default();
        let Value::Map(map) = document.value() else {
            panic!("document must be a map");
        };
        let scope = Scope::new(map, None);
        let binding = Binding::new(stubs, &context).with_scope(&scope);
        let expression = parse(source, &[]).expect("expression must parse");
        expression.evaluate(&binding)
    }

    pub(crate) fn eval(source: &str) -> Outcome {
        eval_in(&Node::new(Map::new(), None), &[], source)
    }

    pub(crate) fn value_of(outcome: Outcome) -> Value {
        match outcome {
            Outcome::Value(node, _) => node.into_value(),
            other => panic!("expected a value, got {other:?}"),
        }
    }

    pub(crate) fn issue_of(outcome: Outcome) -> String {
        match outcome {
            Outcome::Failed(info) => info.issue.unwrap_or_default(),
            other => panic!("expected a failure, got {other:?}"),
        }
    }

    #[test]
    fn literals() {
        assert_eq!(value_of(eval("nil")), Value::Null);
        assert_eq!(value_of(eval("true")), Value::Boolean(true));
        assert_eq!(value_of(eval("-42")), Value::Integer(-42));
        assert_eq!(value_of(eval("\"a\\\"b\"")), Value::from("a\"b"));
    }

    #[test]
    fn to_bool_coercion() {
        assert!(!to_bool(&Value::Null));
        assert!(!to_bool(&Value::from("")));
        assert!(to_bool(&Value::from("x")));
        assert!(!to_bool(&Value::Integer(0)));
        assert!(to_bool(&Value::Integer(-1)));
        assert!(!to_bool(&Value::List(vec![])));
        assert!(to_bool(&Value::Decimal(0.0)));
    }

    #[test]
    fn info_join() {
        let a = EvaluationInfo {
            preferred: true,
            ..EvaluationInfo::issue("first")
        };
        let joined = a.join(EvaluationInfo::issue("second"));
        assert_eq!(joined.issue.as_deref(), Some("second"));
        assert!(joined.preferred);

        let kept = EvaluationInfo::issue("kept").join(EvaluationInfo::default());
        assert_eq!(kept.issue.as_deref(), Some("kept"));
    }

    #[test]
    fn display_round_trips_through_parser() {
        for source in [
            "a.b.[1]",
            ".root.ref",
            "1 + 2 * 3",
            "\"a\" b",
            "merge replace foo.bar",
            "a ? b : c",
            "join(\",\", [1, 2])",
            "lambda |x,y|->x + y",
            "map[list|x|->x * 2]",
            "prefer a || b",
            "!(a -and b)",
        ] {
            let parsed = parse(source, &[]).expect("must parse");
            let reparsed = parse(&parsed.to_string(), &[]).expect("display must parse");
            assert_eq!(parsed, reparsed, "{source}");
        }
    }
}
