//! Hierarchy flattening: child selection, spreading and pre-order collapse.
//!
//! The walk keeps an explicit stack of pending frames instead of recursing,
//! so hierarchy depth is bounded by heap, not by the native call stack.
//! Children are indexed by parent once per walk, keeping the walk linear in
//! the number of emitted records.
//! Branch records on the current descent path are tracked; meeting one again
//! means the parent references form a cycle and the walk fails fast.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument, trace};

use crate::domain::accessor::RecordAccessor;
use crate::domain::arena::HierarchyArena;
use crate::domain::error::{DomainError, DomainResult};
use crate::domain::json::JsonAccessor;
use crate::domain::settings::CollectionSettings;

/// When a branch record is emitted and expanded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BranchPolicy {
    /// Branches are emitted and expanded wherever they are met, even when
    /// their parent does not match the current root.
    #[default]
    Always,
    /// Branches are emitted and expanded only under their own parent.
    Matching,
}

impl fmt::Display for BranchPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BranchPolicy::Always => f.write_str("always"),
            BranchPolicy::Matching => f.write_str("matching"),
        }
    }
}

impl FromStr for BranchPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "always" => Ok(BranchPolicy::Always),
            "matching" => Ok(BranchPolicy::Matching),
            other => Err(format!(
                "unknown branch policy '{}' (expected 'always' or 'matching')",
                other
            )),
        }
    }
}

/// Pending work: a subset of the collection spread under `root`.
struct Frame<'s, K> {
    subset: &'s [usize],
    next: usize,
    root: K,
    /// Output position of the branch that opened this frame
    anchor: Option<usize>,
    /// Collection position of that branch
    branch: Option<usize>,
}

/// Flattens hierarchical collections through a `RecordAccessor`.
#[derive(Debug, Clone)]
pub struct HierarchyFlattener<A> {
    accessor: A,
    policy: BranchPolicy,
}

impl<A> HierarchyFlattener<A> {
    pub fn new(accessor: A) -> Self {
        Self {
            accessor,
            policy: BranchPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: BranchPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn accessor(&self) -> &A {
        &self.accessor
    }

    pub fn policy(&self) -> BranchPolicy {
        self.policy
    }

    /// Records of the full collection whose parent equals `parent`, in order.
    pub fn select_children<'a, R>(&self, items: &'a [R], parent: &A::Key) -> Vec<&'a R>
    where
        A: RecordAccessor<R>,
    {
        self.child_indices(items, parent)
            .into_iter()
            .map(|idx| &items[idx])
            .collect()
    }

    fn child_indices<R>(&self, items: &[R], parent: &A::Key) -> Vec<usize>
    where
        A: RecordAccessor<R>,
    {
        items
            .iter()
            .enumerate()
            .filter(|(_, record)| self.accessor.has_parent(record, parent))
            .map(|(idx, _)| idx)
            .collect()
    }

    /// Collection positions grouped by parent reference, each group in input order.
    fn index_children<R>(&self, items: &[R]) -> HashMap<A::Group, Vec<usize>>
    where
        A: RecordAccessor<R>,
    {
        let mut children: HashMap<A::Group, Vec<usize>> = HashMap::new();
        for (idx, record) in items.iter().enumerate() {
            if let Some(group) = self.accessor.parent_group(record) {
                children.entry(group).or_default().push(idx);
            }
        }
        children
    }

    /// Flatten `items` into pre-order, accumulating directly into the output.
    #[instrument(level = "debug", skip(self, items), fields(records = items.len(), policy = %self.policy))]
    pub fn flatten<'a, R>(&self, items: &'a [R]) -> DomainResult<Vec<&'a R>>
    where
        A: RecordAccessor<R>,
    {
        let mut output = Vec::with_capacity(items.len());
        self.walk(items, |idx, _| output.push(&items[idx]))?;
        debug!("flatten: emitted {} of {} records", output.len(), items.len());
        Ok(output)
    }

    /// Spread `items` into the nested structure: each expanded branch owns the
    /// records emitted by its expansion.
    #[instrument(level = "debug", skip(self, items), fields(records = items.len(), policy = %self.policy))]
    pub fn spread<'a, R>(&self, items: &'a [R]) -> DomainResult<HierarchyArena<'a, R>>
    where
        A: RecordAccessor<R>,
    {
        let mut arena = HierarchyArena::new();
        let mut placed = Vec::with_capacity(items.len());
        self.walk(items, |idx, anchor| {
            let parent = anchor.map(|pos| placed[pos]);
            placed.push(arena.insert_node(&items[idx], idx, parent));
        })?;
        debug!("spread: {} nodes, depth {}", arena.len(), arena.depth());
        Ok(arena)
    }

    /// Depth-first walk calling `emit(collection_index, anchor)` per emitted record,
    /// where `anchor` is the output position of the enclosing branch.
    fn walk<R>(&self, items: &[R], mut emit: impl FnMut(usize, Option<usize>)) -> DomainResult<()>
    where
        A: RecordAccessor<R>,
    {
        let mut emitted = 0usize;
        let mut on_path: HashSet<usize> = HashSet::new();
        let children = self.index_children(items);
        let all: Vec<usize> = (0..items.len()).collect();
        // The root frame iterates the whole, unfiltered collection
        let mut stack = vec![Frame {
            subset: all.as_slice(),
            next: 0,
            root: self.accessor.root_key(),
            anchor: None,
            branch: None,
        }];

        while let Some(frame) = stack.last_mut() {
            if frame.next >= frame.subset.len() {
                let finished = frame.branch;
                stack.pop();
                if let Some(branch) = finished {
                    on_path.remove(&branch);
                }
                continue;
            }

            let idx = frame.subset[frame.next];
            frame.next += 1;
            let record = &items[idx];
            let is_branch = self.accessor.is_branch(record);
            let matches_root = self.accessor.has_parent(record, &frame.root);
            let anchor = frame.anchor;

            let include = match self.policy {
                BranchPolicy::Always => is_branch || matches_root,
                BranchPolicy::Matching => matches_root,
            };
            if !include {
                continue;
            }

            let position = emitted;
            emit(idx, anchor);
            emitted += 1;

            if !is_branch {
                continue;
            }

            let key = self.accessor.identifier(record);
            if !on_path.insert(idx) {
                return Err(DomainError::CycleDetected {
                    identifier: self.accessor.describe(&key),
                    depth: stack.len(),
                });
            }
            let subset: &[usize] = self
                .accessor
                .group(&key)
                .and_then(|group| children.get(&group))
                .map(Vec::as_slice)
                .unwrap_or(&[]);
            trace!("expand {:?}: {} children", key, subset.len());
            stack.push(Frame {
                subset,
                next: 0,
                root: key,
                anchor: Some(position),
                branch: Some(idx),
            });
        }

        Ok(())
    }
}

/// Sort a JSON record collection into flat hierarchy order.
///
/// Uses the default `Always` branch policy.
pub fn sort_collection<'a>(
    items: &'a [Value],
    settings: &CollectionSettings,
) -> DomainResult<Vec<&'a Value>> {
    HierarchyFlattener::new(JsonAccessor::from(settings)).flatten(items)
}
