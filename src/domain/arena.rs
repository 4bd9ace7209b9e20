use generational_arena::{Arena, Index};
use tracing::instrument;

/// Tree node in the spread hierarchy.
#[derive(Debug)]
pub struct HierarchyNode<'a, R> {
    /// Record emitted at this position
    pub record: &'a R,
    /// Position of the record in the input collection
    pub source_index: usize,
    /// Branch under which this record was emitted, None at top level
    pub parent: Option<Index>,
    /// Records emitted by expanding this branch
    pub children: Vec<Index>,
}

/// Arena-based forest holding the nested structure produced by spreading a
/// collection.
///
/// Every emission is a node: a branch reached both at top level and inside
/// its parent's expansion appears twice. Pre-order iteration yields exactly
/// the flattened output.
#[derive(Debug)]
pub struct HierarchyArena<'a, R> {
    arena: Arena<HierarchyNode<'a, R>>,
    roots: Vec<Index>,
}

impl<R> Default for HierarchyArena<'_, R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, R> HierarchyArena<'a, R> {
    pub fn new() -> Self {
        Self {
            arena: Arena::new(),
            roots: Vec::new(),
        }
    }

    #[instrument(level = "trace", skip(self, record))]
    pub fn insert_node(
        &mut self,
        record: &'a R,
        source_index: usize,
        parent: Option<Index>,
    ) -> Index {
        let node = HierarchyNode {
            record,
            source_index,
            parent,
            children: Vec::new(),
        };
        let node_idx = self.arena.insert(node);

        if let Some(parent_idx) = parent {
            if let Some(parent) = self.arena.get_mut(parent_idx) {
                parent.children.push(node_idx);
            }
        } else {
            self.roots.push(node_idx);
        }

        node_idx
    }

    pub fn get_node(&self, idx: Index) -> Option<&HierarchyNode<'a, R>> {
        self.arena.get(idx)
    }

    pub fn roots(&self) -> &[Index] {
        &self.roots
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    pub fn iter(&self) -> PreOrderIter<'_, 'a, R> {
        PreOrderIter::new(self)
    }

    /// Records in pre-order, the flattened form of the nested structure.
    pub fn flatten(&self) -> Vec<&'a R> {
        self.iter().map(|(_, node)| node.record).collect()
    }

    /// Maximum nesting depth; 0 for an empty forest.
    #[instrument(level = "debug", skip(self))]
    pub fn depth(&self) -> usize {
        let mut max_depth = 0;
        let mut stack: Vec<(Index, usize)> = self.roots.iter().map(|&r| (r, 1)).collect();

        while let Some((idx, depth)) = stack.pop() {
            max_depth = max_depth.max(depth);
            if let Some(node) = self.get_node(idx) {
                for &child in &node.children {
                    stack.push((child, depth + 1));
                }
            }
        }

        max_depth
    }
}

pub struct PreOrderIter<'t, 'a, R> {
    arena: &'t HierarchyArena<'a, R>,
    stack: Vec<Index>,
}

impl<'t, 'a, R> PreOrderIter<'t, 'a, R> {
    fn new(arena: &'t HierarchyArena<'a, R>) -> Self {
        // Reversed so the first root pops first
        let stack = arena.roots.iter().rev().copied().collect();
        Self { arena, stack }
    }
}

impl<'t, 'a, R> Iterator for PreOrderIter<'t, 'a, R> {
    type Item = (Index, &'t HierarchyNode<'a, R>);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(current_idx) = self.stack.pop() {
            if let Some(node) = self.arena.get_node(current_idx) {
                // Push children in reverse order for left-to-right traversal
                for &child in node.children.iter().rev() {
                    self.stack.push(child);
                }
                return Some((current_idx, node));
            }
        }
        None
    }
}
