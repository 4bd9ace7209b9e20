//! Hierarchy service
//!
//! Loads JSON record collections, flattens them into hierarchy order and
//! reports on their structure.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use itertools::Itertools;
use serde_json::Value;
use termtree::Tree;
use tracing::{debug, instrument, warn};

use crate::application::{ApplicationError, ApplicationResult, IoResultExt, ToTermTree};
use crate::config::{OutputFormat, Settings};
use crate::domain::{
    DomainError, HierarchyFlattener, JsonAccessor, JsonKey, KeyGroup, RecordAccessor,
};
use crate::infrastructure::traits::FileSystem;

/// Deepest hierarchy `tree` renders; indentation grows with depth, so
/// deeper input is rejected in favor of `sort`.
pub const TREE_DEPTH_LIMIT: usize = 1_000;

/// A parsed record collection and where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordSet {
    /// File path or `<stdin>`
    pub origin: String,
    pub records: Vec<Value>,
}

/// Structural diagnostics for a record collection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HierarchyReport {
    pub origin: String,
    /// Records in the input
    pub records: usize,
    /// Records marked as branches
    pub branches: usize,
    /// Records in the flattened output, None when a cycle stopped the walk
    pub emitted: Option<usize>,
    /// Nesting depth of the spread structure, None when a cycle stopped the walk
    pub depth: Option<usize>,
    /// Identifiers carried by more than one record
    pub duplicate_ids: Vec<String>,
    /// Identifiers of records whose parent is neither top level nor a known branch
    pub orphans: Vec<String>,
    /// Identifiers of records the walk never emits, None when a cycle stopped the walk
    pub unreached: Option<Vec<String>>,
    /// Configured field names present on no record
    pub missing_fields: Vec<String>,
    /// Cycle error message, if any
    pub cycle: Option<String>,
}

impl HierarchyReport {
    /// True when no structural issue was found.
    pub fn is_clean(&self) -> bool {
        self.duplicate_ids.is_empty()
            && self.orphans.is_empty()
            && self.missing_fields.is_empty()
            && self.unreached.as_ref().map_or(true, Vec::is_empty)
            && self.cycle.is_none()
    }
}

/// Service for flattening hierarchical record collections.
pub struct HierarchyService {
    fs: Arc<dyn FileSystem>,
    settings: Arc<Settings>,
}

impl HierarchyService {
    /// Create a new hierarchy service.
    pub fn new(fs: Arc<dyn FileSystem>, settings: Arc<Settings>) -> Self {
        Self { fs, settings }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    fn flattener(&self) -> HierarchyFlattener<JsonAccessor> {
        HierarchyFlattener::new(JsonAccessor::from(&self.settings.collection))
            .with_policy(self.settings.branch_policy)
    }

    /// Read and parse a record collection from a file.
    #[instrument(level = "debug", skip(self))]
    pub fn load(&self, path: &Path) -> ApplicationResult<RecordSet> {
        if !self.fs.is_file(path) {
            return Err(ApplicationError::OperationFailed {
                context: format!("file not found: {}", path.display()),
                source: Box::new(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "file does not exist",
                )),
            });
        }
        let content = self
            .fs
            .read_to_string(path)
            .with_path_context("read records", path)?;
        self.parse(&content, &path.display().to_string())
    }

    /// Parse a JSON document, select the record array and return it.
    #[instrument(level = "debug", skip(self, content))]
    pub fn parse(&self, content: &str, origin: &str) -> ApplicationResult<RecordSet> {
        let invalid = |message: String| ApplicationError::InvalidInput {
            origin: origin.to_string(),
            message,
        };

        let mut document: Value =
            serde_json::from_str(content).map_err(|e| invalid(e.to_string()))?;

        let selected = match self.settings.records_pointer.as_deref() {
            Some(pointer) => document
                .pointer_mut(pointer)
                .map(Value::take)
                .ok_or_else(|| invalid(format!("pointer {} does not resolve", pointer)))?,
            None => document,
        };

        match selected {
            Value::Array(records) => {
                debug!("parse: {} records from {}", records.len(), origin);
                Ok(RecordSet {
                    origin: origin.to_string(),
                    records,
                })
            }
            other => Err(invalid(format!(
                "expected an array of records, found {}",
                json_type_name(&other)
            ))),
        }
    }

    /// Flatten the collection into hierarchy order.
    #[instrument(level = "debug", skip(self, set), fields(origin = %set.origin))]
    pub fn sort<'a>(&self, set: &'a RecordSet) -> ApplicationResult<Vec<&'a Value>> {
        for field in self.missing_fields(&set.records) {
            warn!("no record in {} has field '{}'", set.origin, field);
        }
        Ok(self.flattener().flatten(&set.records)?)
    }

    /// Serialize flattened records in the configured output format.
    pub fn render(&self, sorted: &[&Value], format: OutputFormat) -> ApplicationResult<String> {
        let serialize_err = |e: serde_json::Error| ApplicationError::OperationFailed {
            context: "serialize output".to_string(),
            source: Box::new(e),
        };

        let mut text = match format {
            OutputFormat::Json => serde_json::to_string_pretty(sorted).map_err(serialize_err)?,
            OutputFormat::Compact => serde_json::to_string(sorted).map_err(serialize_err)?,
            OutputFormat::Ndjson => sorted
                .iter()
                .map(|record| serde_json::to_string(record))
                .collect::<Result<Vec<_>, _>>()
                .map_err(serialize_err)?
                .join("\n"),
            OutputFormat::Ids => {
                let id_property = &self.settings.collection.id_property;
                sorted
                    .iter()
                    .map(|record| match record.get(id_property) {
                        Some(Value::String(s)) => s.clone(),
                        Some(other) => other.to_string(),
                        None => "undefined".to_string(),
                    })
                    .join("\n")
            }
        };
        if !text.is_empty() {
            text.push('\n');
        }
        Ok(text)
    }

    /// Write rendered output to a file, creating parent directories.
    pub fn write_output(&self, path: &Path, content: &str) -> ApplicationResult<()> {
        self.fs
            .ensure_parent(path)
            .with_path_context("create output directory", path)?;
        self.fs
            .write(path, content)
            .with_path_context("write output", path)
    }

    /// Spread the collection and render it as a tree.
    #[instrument(level = "debug", skip(self, set), fields(origin = %set.origin))]
    pub fn tree(&self, set: &RecordSet) -> ApplicationResult<Tree<String>> {
        let flattener = self.flattener();
        let arena = flattener.spread(&set.records)?;
        let depth = arena.depth();
        if depth > TREE_DEPTH_LIMIT {
            return Err(ApplicationError::InvalidInput {
                origin: set.origin.clone(),
                message: format!(
                    "hierarchy depth {} exceeds the tree view limit of {}, use 'sort' instead",
                    depth, TREE_DEPTH_LIMIT
                ),
            });
        }
        let accessor = flattener.accessor();
        let label_property = self.settings.output.label_property.as_deref();

        let label = |record: &Value| {
            let id = accessor.identifier(record);
            let mark = if accessor.is_branch(record) { "/" } else { "" };
            match label_property.and_then(|p| record.get(p)) {
                Some(Value::String(s)) => format!("{}{} {}", id, mark, s),
                Some(other) => format!("{}{} {}", id, mark, other),
                None => format!("{}{}", id, mark),
            }
        };
        Ok(arena.to_term_tree(&set.origin, &label))
    }

    /// Inspect the collection for duplicates, orphans, missing fields and cycles.
    #[instrument(level = "debug", skip(self, set), fields(origin = %set.origin))]
    pub fn check(&self, set: &RecordSet) -> ApplicationResult<HierarchyReport> {
        let flattener = self.flattener();
        let accessor = flattener.accessor();
        let records = &set.records;

        let identifiers: Vec<JsonKey> = records.iter().map(|r| accessor.identifier(r)).collect();
        // Leaves are never expanded, so only branch identifiers resolve a parent
        let branch_ids: HashSet<KeyGroup> = records
            .iter()
            .zip(&identifiers)
            .filter(|(record, _)| accessor.is_branch(record))
            .filter_map(|(_, key)| key.group())
            .collect();

        let duplicate_ids: Vec<String> = identifiers
            .iter()
            .filter(|key| **key != JsonKey::Opaque)
            .map(|key| key.to_string())
            .duplicates()
            .collect();

        let orphans: Vec<String> = records
            .iter()
            .zip(&identifiers)
            .filter(|(record, _)| {
                let parent = JsonKey::from_field(accessor.parent_field(record));
                parent != JsonKey::Null
                    && !parent
                        .group()
                        .is_some_and(|group| branch_ids.contains(&group))
            })
            .map(|(_, id)| id.to_string())
            .collect();

        let missing_fields = self.missing_fields(records);
        for field in &missing_fields {
            warn!("no record in {} has field '{}'", set.origin, field);
        }

        let mut report = HierarchyReport {
            origin: set.origin.clone(),
            records: records.len(),
            branches: records.iter().filter(|r| accessor.is_branch(r)).count(),
            duplicate_ids,
            orphans,
            missing_fields,
            ..Default::default()
        };

        match flattener.spread(records) {
            Ok(arena) => {
                let mut reached = vec![false; records.len()];
                for (_, node) in arena.iter() {
                    reached[node.source_index] = true;
                }
                report.unreached = Some(
                    identifiers
                        .iter()
                        .zip(&reached)
                        .filter(|(_, reached)| !**reached)
                        .map(|(id, _)| id.to_string())
                        .collect(),
                );
                report.emitted = Some(arena.len());
                report.depth = Some(arena.depth());
            }
            Err(e @ DomainError::CycleDetected { .. }) => {
                report.cycle = Some(e.to_string());
            }
            Err(e) => return Err(e.into()),
        }

        debug!("check: {:?}", report);
        Ok(report)
    }

    /// Configured field names that no record carries.
    fn missing_fields(&self, records: &[Value]) -> Vec<String> {
        if records.is_empty() {
            return Vec::new();
        }
        self.settings
            .collection
            .fields()
            .iter()
            .filter(|(_, name)| !records.iter().any(|r| r.get(*name).is_some()))
            .map(|(_, name)| name.to_string())
            .collect()
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
