//! Conversion of spread hierarchies into `termtree` trees for display.

use std::collections::HashMap;

use generational_arena::Index;
use termtree::Tree;
use tracing::instrument;

use crate::domain::HierarchyArena;

pub trait ToTermTree<R> {
    /// Build a display tree under a synthetic root labelled `title`.
    fn to_term_tree(&self, title: &str, label: &dyn Fn(&R) -> String) -> Tree<String>;
}

impl<R> ToTermTree<R> for HierarchyArena<'_, R> {
    #[instrument(level = "debug", skip(self, label))]
    fn to_term_tree(&self, title: &str, label: &dyn Fn(&R) -> String) -> Tree<String> {
        // Reverse pre-order visits every child before its parent
        let order: Vec<Index> = self.iter().map(|(idx, _)| idx).collect();
        let mut built: HashMap<Index, Tree<String>> = HashMap::with_capacity(order.len());

        for &idx in order.iter().rev() {
            let Some(node) = self.get_node(idx) else {
                continue;
            };
            let leaves: Vec<Tree<String>> = node
                .children
                .iter()
                .filter_map(|child| built.remove(child))
                .collect();
            built.insert(idx, Tree::new(label(node.record)).with_leaves(leaves));
        }

        let leaves: Vec<Tree<String>> = self
            .roots()
            .iter()
            .filter_map(|root| built.remove(root))
            .collect();
        Tree::new(title.to_string()).with_leaves(leaves)
    }
}
