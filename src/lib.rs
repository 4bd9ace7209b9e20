//! Flatten hierarchical record collections into pre-order.
//!
//! Records point at their parent by identifier and may be marked as branch
//! nodes. Sorting puts every branch before its descendants while keeping
//! siblings in their input order:
//!
//! ```
//! use hiersort::{sort_collection, CollectionSettings};
//! use serde_json::json;
//!
//! let items = vec![
//!     json!({"id": 2, "node": false, "parent": 1}),
//!     json!({"id": 1, "node": true, "parent": null}),
//! ];
//! let sorted = sort_collection(&items, &CollectionSettings::default()).unwrap();
//! assert_eq!(sorted[0]["id"], 1);
//! assert_eq!(sorted[1]["id"], 2);
//! ```

pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod exitcode;
pub mod infrastructure;
pub mod util;

pub use domain::{
    sort_collection, BranchPolicy, CollectionSettings, DomainError, HierarchyFlattener,
    HierarchyRecord, JsonAccessor, RecordAccessor, TypedAccessor,
};
