//! node representation
//!
//! The spiff document model contains the following data types
//! - null
//! - boolean (true/false)
//! - integer (signed, i64)
//! - decimal (f64, passed through untouched; no arithmetic)
//! - string (utf-8)
//! - list (ordered sequence of nodes)
//! - map (string keys, insertion ordered for output, compared without regard to order)
//!
//! Additionally, while a document is being resolved, a node may hold
//! - an unevaluated dynaml [Expression]
//! - a [LambdaValue] (the result of evaluating a `lambda` expression)
//!
//! Every node carries its provenance (source name) and the merge annotations that
//! have to survive from one flow pass to the next (redirect path, replace flag,
//! preferred flag) plus the last evaluation issue, if any.
use crate::dynaml::{Expression, LambdaValue};
use serde::{
    ser::{SerializeMap, SerializeSeq},
    Serializer,
};
use std::rc::Rc;

pub type Map = indexmap::IndexMap<String, Node>;

/// All possible value types
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Decimal(f64),
    String(String),
    List(Vec<Node>),
    Map(Map),
    Expression(Expression),
    Lambda(LambdaValue),
}

impl Value {
    /// Human readable type name used in evaluation issues
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "nil",
            Value::Boolean(_) => "bool",
            Value::Integer(_) => "int",
            Value::Decimal(_) => "float",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Expression(_) => "expression",
            Value::Lambda(_) => "lambda",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    value: Value,
    source_name: Option<Rc<str>>,
    redirect_path: Option<Vec<String>>,
    replace: bool,
    preferred: bool,
    issue: Option<String>,
}

impl Node {
    pub fn new(value: impl Into<Value>, source_name: Option<Rc<str>>) -> Self {
        Self {
            value: value.into(),
            source_name,
            redirect_path: None,
            replace: false,
            preferred: false,
            issue: None,
        }
    }

    pub fn null() -> Self {
        Self::new(Value::Null, None)
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    pub fn source_name(&self) -> Option<&Rc<str>> {
        self.source_name.as_ref()
    }

    pub fn redirect_path(&self) -> Option<&[String]> {
        self.redirect_path.as_deref()
    }

    pub fn is_replace(&self) -> bool {
        self.replace
    }

    pub fn is_preferred(&self) -> bool {
        self.preferred
    }

    pub fn issue(&self) -> Option<&str> {
        self.issue.as_deref()
    }

    /// Same annotations, different value
    pub fn with_value(&self, value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            source_name: self.source_name.clone(),
            redirect_path: self.redirect_path.clone(),
            replace: self.replace,
            preferred: self.preferred,
            issue: self.issue.clone(),
        }
    }

    pub fn with_source(mut self, source_name: Option<Rc<str>>) -> Self {
        if source_name.is_some() {
            self.source_name = source_name;
        }
        self
    }

    pub fn with_redirect(mut self, redirect_path: Option<Vec<String>>) -> Self {
        if redirect_path.is_some() {
            self.redirect_path = redirect_path;
        }
        self
    }

    pub fn with_replace(mut self, replace: bool) -> Self {
        self.replace |= replace;
        self
    }

    pub fn with_preferred(mut self, preferred: bool) -> Self {
        self.preferred |= preferred;
        self
    }

    pub fn with_issue(mut self, issue: Option<String>) -> Self {
        self.issue = issue;
        self
    }

    pub fn is_expression(&self) -> bool {
        matches!(self.value, Value::Expression(_))
    }

    /// The node itself is not an expression (children may still be)
    pub fn is_locally_resolved(&self) -> bool {
        match &self.value {
            Value::Expression(_) => false,
            Value::String(s) => crate::util::embedded_dynaml(s).is_none(),
            _ => true,
        }
    }

    /// Neither the node nor anything below it is an expression
    pub fn is_resolved(&self) -> bool {
        match &self.value {
            Value::List(list) => list.iter().all(Node::is_resolved),
            Value::Map(map) => map.values().all(Node::is_resolved),
            _ => self.is_locally_resolved(),
        }
    }

    /// Value of the `name` field of a map node
    pub fn name(&self) -> Option<&str> {
        self.find_string("name")
    }

    pub fn find_string(&self, key: &str) -> Option<&str> {
        match &self.value {
            Value::Map(map) => match map.get(key).map(Node::value) {
                Some(Value::String(s)) => Some(s),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Node> {
        match &self.value {
            Value::Map(map) => map.get(key),
            _ => None,
        }
    }

    /// Navigate along a path of map keys, `[N]` list indices or list entry names
    pub fn find<S: AsRef<str>>(&self, path: &[S]) -> Lookup<'_> {
        let mut current = self;
        for step in path {
            let step = step.as_ref();
            if !current.is_locally_resolved() {
                return Lookup::Unresolved;
            }
            current = match &current.value {
                Value::Map(map) => match map.get(step) {
                    Some(next) => next,
                    // a pending `<<` merge may still add the key
                    None if map.get("<<").is_some_and(|m| !m.is_resolved()) => {
                        return Lookup::Unresolved
                    }
                    None => return Lookup::NotFound,
                },
                Value::List(list) => match list_step(list, step) {
                    Some(next) => next,
                    None => return Lookup::NotFound,
                },
                _ => return Lookup::NotFound,
            };
        }
        Lookup::Found(current)
    }

    /// Deep equality that treats lists of named maps as unordered
    pub fn equivalent(&self, other: &Node) -> bool {
        match (&self.value, &other.value) {
            (Value::List(a), Value::List(b)) => {
                if a.len() != b.len() {
                    return false;
                }
                let named = a.iter().chain(b.iter()).all(|n| n.name().is_some());
                if named {
                    a.iter().all(|entry| {
                        b.iter()
                            .find(|candidate| candidate.name() == entry.name())
                            .is_some_and(|candidate| entry.equivalent(candidate))
                    })
                } else {
                    a.iter().zip(b).all(|(x, y)| x.equivalent(y))
                }
            }
            (Value::Map(a), Value::Map(b)) => {
                a.len() == b.len()
                    && a
                        .iter()
                        .all(|(key, x)| b.get(key).is_some_and(|y| x.equivalent(y)))
            }
            (a, b) => a == b,
        }
    }

    /// Decode a generic yaml tree
    pub fn from_yaml(value: serde_yaml::Value, source_name: Option<Rc<str>>) -> Node {
        use serde_yaml::Value as Yaml;

        let value = match value {
            Yaml::Null => Value::Null,
            Yaml::Bool(b) => Value::Boolean(b),
            Yaml::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => Value::Decimal(n.as_f64().unwrap_or(f64::NAN)),
            },
            Yaml::String(s) => Value::String(s),
            Yaml::Sequence(seq) => Value::List(
                seq.into_iter()
                    .map(|v| Node::from_yaml(v, source_name.clone()))
                    .collect(),
            ),
            Yaml::Mapping(mapping) => Value::Map(
                mapping
                    .into_iter()
                    .map(|(k, v)| (yaml_key(k), Node::from_yaml(v, source_name.clone())))
                    .collect(),
            ),
            Yaml::Tagged(tagged) => return Node::from_yaml(tagged.value, source_name),
        };

        Node::new(value, source_name)
    }
}

fn yaml_key(key: serde_yaml::Value) -> String {
    use serde_yaml::Value as Yaml;
    match key {
        Yaml::String(s) => s,
        Yaml::Bool(b) => b.to_string(),
        Yaml::Number(n) => n.to_string(),
        Yaml::Null => "~".to_string(),
        other => serde_yaml::to_string(&other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

fn list_step<'n>(list: &'n [Node], step: &str) -> Option<&'n Node> {
    if let Some(index) = crate::util::parse_index(step) {
        return list.get(index);
    }
    list.iter().find(|entry| entry.name() == Some(step))
}

/// Only values are compared, provenance and annotations are ignored
impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

/// Result of navigating a node tree
#[derive(Debug, PartialEq)]
pub enum Lookup<'n> {
    Found(&'n Node),
    /// An expression was hit on the way, the path may exist later
    Unresolved,
    /// The path can not exist
    NotFound,
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<Vec<Node>> for Value {
    fn from(value: Vec<Node>) -> Self {
        Value::List(value)
    }
}

impl From<Map> for Value {
    fn from(value: Map) -> Self {
        Value::Map(value)
    }
}

impl From<Expression> for Value {
    fn from(value: Expression) -> Self {
        Value::Expression(value)
    }
}

impl From<LambdaValue> for Value {
    fn from(value: LambdaValue) -> Self {
        Value::Lambda(value)
    }
}

impl serde::ser::Serialize for Node {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match &self.value {
            Value::Null => serializer.serialize_unit(),
            Value::Boolean(value) => serializer.serialize_bool(*value),
            Value::Integer(value) => serializer.serialize_i64(*value),
            Value::Decimal(value) => serializer.serialize_f64(*value),
            Value::String(value) => serializer.serialize_str(value),
            Value::List(value) => {
                let mut ser = serializer.serialize_seq(Some(value.len()))?;
                for element in value {
                    ser.serialize_element(element)?;
                }
                ser.end()
            }
            Value::Map(value) => {
                let mut ser = serializer.serialize_map(Some(value.len()))?;
                for (element_key, element_value) in value {
                    ser.serialize_entry(element_key, element_value)?;
                }
                ser.end()
            }
            Value::Expression(expr) => serializer.serialize_str(&format!("(( {expr} ))")),
            Value::Lambda(lambda) => serializer.serialize_str(&format!("(( {lambda} ))")),
        }
    }
}
