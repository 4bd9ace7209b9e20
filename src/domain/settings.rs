//! Collection settings: which record fields carry the hierarchy.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::error::{DomainError, DomainResult};

/// Names of the three record fields the flattener reads.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CollectionSettings {
    /// Field holding the record identifier
    pub id_property: String,
    /// Field marking a record as a branch (truthy) or leaf (falsy)
    pub node_property: String,
    /// Field referencing the parent identifier, `null` for top level
    pub parent_property: String,
}

impl Default for CollectionSettings {
    fn default() -> Self {
        Self {
            id_property: "id".into(),
            node_property: "node".into(),
            parent_property: "parent".into(),
        }
    }
}

impl CollectionSettings {
    pub fn new(
        id_property: impl Into<String>,
        node_property: impl Into<String>,
        parent_property: impl Into<String>,
    ) -> Self {
        Self {
            id_property: id_property.into(),
            node_property: node_property.into(),
            parent_property: parent_property.into(),
        }
    }

    /// Reject empty field names.
    ///
    /// The flattener itself never calls this: misnamed fields silently degrade
    /// to "no match". Configuration loading uses it to catch typos early.
    pub fn validate(&self) -> DomainResult<()> {
        for (label, value) in self.fields() {
            if value.trim().is_empty() {
                return Err(DomainError::InvalidSettings(format!(
                    "{} must not be empty",
                    label
                )));
            }
        }
        Ok(())
    }

    /// Field names paired with their setting label.
    pub fn fields(&self) -> [(&'static str, &str); 3] {
        [
            ("id_property", self.id_property.as_str()),
            ("node_property", self.node_property.as_str()),
            ("parent_property", self.parent_property.as_str()),
        ]
    }
}

impl fmt::Display for CollectionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "id={} node={} parent={}",
            self.id_property, self.node_property, self.parent_property
        )
    }
}
