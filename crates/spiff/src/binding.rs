//! Evaluation context of a single tree position
//!
//! A [Binding] combines
//! - the lexical scope chain: one [Scope] per map between the document root and the current node
//! - the local names bound by lambda invocations and `map[...]` iterations
//! - the stub documents consulted by `merge`
//! - the document path and the (possibly redirected) stub path of the current node
//! - the [RunContext] holding the caches of one resolution run
//!
//! Bindings are never mutated: every `with_*` method returns a new binding and the
//! scope chain borrows the maps of the tree that is currently being flowed, so
//! sibling branches can not observe each other's frames.
use crate::dynaml::{Expression, ParseError};
use crate::node::{Lookup, Map, Node};
use std::cell::{OnceCell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::rc::Rc;

pub type Locals = BTreeMap<String, Node>;

/// One frame of the lexical scope chain
#[derive(Debug, derive_new::new)]
pub struct Scope<'a> {
    local: &'a Map,
    next: Option<&'a Scope<'a>>,
}

#[derive(Debug, Clone)]
pub struct Binding<'a> {
    scope: Option<&'a Scope<'a>>,
    locals: Rc<Locals>,
    path: Vec<String>,
    stub_path: Vec<String>,
    stubs: &'a [Node],
    source_name: Option<Rc<str>>,
    context: &'a RunContext,
}

impl<'a> Binding<'a> {
    pub fn new(stubs: &'a [Node], context: &'a RunContext) -> Self {
        Self {
            scope: None,
            locals: Default::default(),
            path: vec![],
            stub_path: vec![],
            stubs,
            source_name: None,
            context,
        }
    }

    /// Enter a map
    pub fn with_scope<'b>(&self, scope: &'b Scope<'b>) -> Binding<'b>
    where
        'a: 'b,
    {
        Binding {
            scope: Some(scope),
            locals: self.locals.clone(),
            path: self.path.clone(),
            stub_path: self.stub_path.clone(),
            stubs: self.stubs,
            source_name: self.source_name.clone(),
            context: self.context,
        }
    }

    pub fn scope(&self) -> Option<&'a Scope<'a>> {
        self.scope
    }

    /// Descend one step; the stub path follows the document path
    pub fn with_path(&self, step: impl Into<String>) -> Self {
        let step = step.into();
        let mut next = self.clone();
        next.path.push(step.clone());
        next.stub_path.push(step);
        next
    }

    /// Look up stub values at `stub_path` instead of the document path
    pub fn redirect(&self, stub_path: Vec<String>) -> Self {
        Self {
            stub_path,
            ..self.clone()
        }
    }

    /// Layer additional local names on top of the existing ones
    pub fn with_locals(&self, locals: Locals) -> Self {
        let mut merged = (*self.locals).clone();
        merged.extend(locals);
        Self {
            locals: Rc::new(merged),
            ..self.clone()
        }
    }

    pub fn with_source(&self, source_name: Option<Rc<str>>) -> Self {
        Self {
            source_name,
            ..self.clone()
        }
    }

    pub fn locals(&self) -> &Locals {
        &self.locals
    }

    pub fn path(&self) -> &[String] {
        &self.path
    }

    pub fn stub_path(&self) -> &[String] {
        &self.stub_path
    }

    pub fn source_name(&self) -> Option<&Rc<str>> {
        self.source_name.as_ref()
    }

    pub fn context(&self) -> &'a RunContext {
        self.context
    }

    /// Resolve a path starting at the outermost map of the document
    pub fn find_from_root<S: AsRef<str>>(&self, path: &[S]) -> Lookup<'_> {
        let Some(mut root) = self.scope else {
            return Lookup::NotFound;
        };
        while let Some(next) = root.next {
            root = next;
        }

        let Some((first, rest)) = path.split_first() else {
            return Lookup::NotFound;
        };
        match root.local.get(first.as_ref()) {
            Some(node) => node.find(rest),
            None => Lookup::NotFound,
        }
    }

    /// Resolve a path whose first step is looked up lexically
    ///
    /// Locals win over map scopes, nearer maps win over farther ones. Only the first
    /// step is searched, the rest of the path is followed from that node.
    pub fn find_reference<S: AsRef<str>>(&self, path: &[S]) -> Lookup<'_> {
        let Some((first, rest)) = path.split_first() else {
            return Lookup::NotFound;
        };
        let first = first.as_ref();

        if let Some(local) = self.locals.get(first) {
            return local.find(rest);
        }

        let mut scope = self.scope;
        while let Some(current) = scope {
            if let Some(node) = current.local.get(first) {
                return node.find(rest);
            }
            scope = current.next;
        }

        Lookup::NotFound
    }

    /// First stub that has a resolved node at `path`
    pub fn find_in_stubs<S: AsRef<str>>(&self, path: &[S]) -> Option<&'a Node> {
        self.stubs.iter().find_map(|stub| match stub.find(path) {
            Lookup::Found(node) => Some(node),
            _ => None,
        })
    }
}

/// Caches scoped to one top-level resolution run
///
/// `exec` and `read` perform their side effect at most once per distinct
/// argument set, the environment is captured on first use.
#[derive(Debug, Default)]
pub struct RunContext {
    files: RefCell<HashMap<PathBuf, Result<String, String>>>,
    commands: RefCell<HashMap<String, Result<String, String>>>,
    environ: OnceCell<BTreeMap<String, String>>,
    expressions: RefCell<HashMap<(String, Vec<String>), Result<Expression, ParseError>>>,
}

impl RunContext {
    pub fn environ(&self) -> &BTreeMap<String, String> {
        self.environ.get_or_init(|| std::env::vars().collect())
    }

    pub fn read_file(
        &self,
        path: PathBuf,
        read: impl FnOnce(&PathBuf) -> Result<String, String>,
    ) -> Result<String, String> {
        self.files
            .borrow_mut()
            .entry(path)
            .or_insert_with_key(read)
            .clone()
    }

    pub fn run_command(
        &self,
        key: String,
        run: impl FnOnce() -> Result<String, String>,
    ) -> Result<String, String> {
        self.commands
            .borrow_mut()
            .entry(key)
            .or_insert_with(run)
            .clone()
    }

    /// Parse dynaml source found at `path`, once per run
    pub fn parse(&self, source: &str, path: &[String]) -> Result<Expression, ParseError> {
        self.expressions
            .borrow_mut()
            .entry((source.to_string(), path.to_vec()))
            .or_insert_with(|| crate::dynaml::parse(source, path))
            .clone()
    }
}
