//! loading yaml documents as [Node] trees
//!
//! Every node of a loaded document carries the path of its file as source name,
//! so unresolved nodes can point back to where they were written.
use crate::node::Node;
use std::io::Read;
use std::path::Path;
use std::rc::Rc;

/// Source name of documents read from stdin
pub const STDIN: &str = "-";

pub fn parse_yaml(source: &str, source_name: Option<Rc<str>>) -> Result<Node, LoadError> {
    let value: serde_yaml::Value = serde_yaml::from_str(source)?;
    Ok(Node::from_yaml(value, source_name))
}

/// Load a file, `-` reads stdin
pub fn load_file(file_path: &Path) -> Result<Node, LoadError> {
    if file_path == Path::new(STDIN) {
        return load_stdin();
    }

    let file_path = file_path.canonicalize().map_err(|source| LoadError::Io {
        path: file_path.display().to_string(),
        source,
    })?;
    tracing::info!(path=%file_path.display(), "loading file");

    let file_contents = std::fs::read_to_string(&file_path).map_err(|source| LoadError::Io {
        path: file_path.display().to_string(),
        source,
    })?;
    parse_yaml(&file_contents, Some(file_path.display().to_string().into()))
}

pub fn load_stdin() -> Result<Node, LoadError> {
    tracing::info!("loading stdin");
    let mut contents = String::new();
    std::io::stdin()
        .read_to_string(&mut contents)
        .map_err(|source| LoadError::Io {
            path: STDIN.to_string(),
            source,
        })?;
    parse_yaml(&contents, Some(STDIN.into()))
}

#[derive(thiserror::Error, Debug)]
pub enum LoadError {
    #[error("Unable to read {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Unable to parse yaml")]
    YamlParseFailed(#[from] serde_yaml::Error),
}

/// Utility macro to create a [Node] tree from yaml text
///
/// ```
/// # use spiff::yaml;
/// let node = yaml!("{a: (( b )), b: 1}");
/// assert!(node.get("b").is_some());
/// ```
///
/// # Panic
/// Panics on invalid input
///
/// ```should_panic
/// # use spiff::yaml;
/// yaml!("a: [unclosed");
/// ```
#[macro_export]
macro_rules! yaml {
    { $source:expr } => {
        $crate::documents::parse_yaml($source, None).expect("yaml must parse")
    };
}
