//! Domain-level errors (no external dependencies)

use thiserror::Error;

/// Domain errors represent violations detected while walking a hierarchy.
/// These are independent of infrastructure concerns.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("cycle detected in hierarchy at identifier {identifier} (depth {depth})")]
    CycleDetected { identifier: String, depth: usize },

    #[error("invalid collection settings: {0}")]
    InvalidSettings(String),
}

/// Result type for hierarchy operations.
pub type DomainResult<T> = Result<T, DomainError>;
