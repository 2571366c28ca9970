//! # spiff - declarative yaml templating
//!
//! ## Introduction for developers
//!
//! Read this to understand how `spiff` works internally.
//!
//! ### Terms
//!
//! - a `template` is the document that gets resolved
//! - `stubs` are documents consulted by `merge`, the first stub that has a value wins
//! - `dynaml` is the expression language found in strings of the form `(( ... ))`
//!
//! This is a valid template:
//! ```yaml
//! meta:
//!   name: web
//!
//! jobs:
//! - name: (( meta.name "-z1" ))
//!   instances: (( merge || 1 ))
//!   networks:
//!   - name: default
//!     static_ips: (( static_ips(0, 1) ))
//! ```
//!
//! ### Loading files
//!
//! YAML text is decoded by `serde_yaml` and converted into a [node::Node] tree
//! ([documents::parse_yaml], [documents::load_file]). Every node remembers the file it
//! was loaded from so unresolved nodes can be reported with their origin.
//! At this point any YAML document is accepted, strings are not inspected yet.
//!
//! ### Parsing
//!
//! see [dynaml::parse]
//!
//! Strings matching `(( ... ))` are parsed into a [dynaml::Expression] the first time
//! a pass reaches them. A string that fails to parse stays a string and is reported as
//! unparseable at the end.
//!
//! ### Evaluation
//!
//! Expressions are evaluated against a [binding::Binding]: the chain of maps enclosing
//! the node (for lexical lookups), the path of the node (for `merge`) and the stubs.
//!
//! **Example**
//!
//! ```yaml
//! foo:
//!   bar:
//!     baz: (( buzz.fizz ))
//!     buzz:
//!       fizz: right
//! buzz:
//!   fizz: wrong
//! ```
//!
//! | **reference** | **searched in**                         | **result**                  |
//! |---------------|-----------------------------------------|-----------------------------|
//! | `buzz.fizz`   | `foo.bar`, then `foo`, then the root    | `right`                     |
//! | `.buzz.fizz`  | the root only                           | `wrong`                     |
//! | `merge`       | stubs at `foo.bar.baz`                  | not found, node unresolved  |
//!
//! Evaluation never partially succeeds. An expression whose operands are not resolved
//! yet reports [dynaml::Outcome::Deferred] and stays in the document unchanged.
//!
//! ### Flow
//!
//! see [flow::flow] and [flow::cascade]
//!
//! A pass walks the whole document and replaces every expression that evaluates to a
//! value. Passes are repeated until the document stops changing. Whatever is still an
//! expression at that point is collected as [flow::UnresolvedNodes].
//!
//! ### Output
//!
//! A resolved [node::Node] tree serializes via [serde] as plain data.
//!
pub mod binding;
pub mod documents;
pub mod dynaml;
pub mod flow;
pub mod node;
mod util;
pub mod visit;
