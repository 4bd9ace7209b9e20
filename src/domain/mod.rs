//! Domain layer: hierarchy records and the flattening algorithm
//!
//! This layer is independent of external concerns (no I/O, no CLI, no config loading).

pub mod accessor;
pub mod arena;
pub mod error;
pub mod flatten;
pub mod json;
pub mod settings;

pub use accessor::{HierarchyRecord, RecordAccessor, TypedAccessor};
pub use arena::{HierarchyArena, HierarchyNode};
pub use error::{DomainError, DomainResult};
pub use flatten::{sort_collection, BranchPolicy, HierarchyFlattener};
pub use json::{is_truthy, JsonAccessor, JsonKey, KeyGroup};
pub use settings::CollectionSettings;

/// Expand `~`, `$VAR` and `${VAR}` in a path-like string.
///
/// Uses shellexpand crate for robust expansion.
pub fn expand_env_vars(path: &str) -> String {
    shellexpand::full(path)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| path.to_string())
}
