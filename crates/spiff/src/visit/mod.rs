//! visitor pattern helpers
mod visit_nodes;
pub use visit_nodes::{NodePath, VisitNodes};

/// Visitor that is shown every subject together with its position
pub trait Visit<T> {
    fn visit(&mut self, path: &NodePath, value: &T);
}

// blanket impl for FnMut
impl<T, F> Visit<T> for F
where
    F: FnMut(&NodePath, &T),
{
    fn visit(&mut self, path: &NodePath, value: &T) {
        self(path, value)
    }
}
