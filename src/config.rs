//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Global config: `$XDG_CONFIG_HOME/hiersort/hiersort.toml`
//! 3. Local config: `<project_dir>/.hiersort.toml`
//! 4. Environment variables: `HIERSORT_*` prefix, `__` between nested keys
//! 5. Command line flags (applied by the CLI layer)

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use config::{Config, ConfigError, Environment};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::application::ApplicationError;
use crate::domain::{expand_env_vars, BranchPolicy, CollectionSettings};

/// How flattened records are written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Pretty-printed JSON array
    #[default]
    Json,
    /// Single-line JSON array
    Compact,
    /// One JSON record per line
    Ndjson,
    /// One identifier per line
    Ids,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutputFormat::Json => "json",
            OutputFormat::Compact => "compact",
            OutputFormat::Ndjson => "ndjson",
            OutputFormat::Ids => "ids",
        };
        f.write_str(name)
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <Self as clap::ValueEnum>::from_str(s, true)
    }
}

/// Output settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OutputSettings {
    /// Output format for `sort`
    pub format: OutputFormat,
    /// Record field appended to identifiers in `tree` output
    pub label_property: Option<String>,
}

/// Raw collection settings for intermediate parsing (`None` = not specified).
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawCollectionSettings {
    pub id_property: Option<String>,
    pub node_property: Option<String>,
    pub parent_property: Option<String>,
}

/// Raw output settings for intermediate parsing.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawOutputSettings {
    pub format: Option<OutputFormat>,
    pub label_property: Option<String>,
}

/// Raw settings for intermediate parsing.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawSettings {
    pub collection: RawCollectionSettings,
    pub branch_policy: Option<BranchPolicy>,
    pub records_pointer: Option<String>,
    pub output: RawOutputSettings,
}

/// Unified configuration for hiersort.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Record field names carrying the hierarchy
    pub collection: CollectionSettings,
    /// When branch records are emitted and expanded
    pub branch_policy: BranchPolicy,
    /// JSON pointer to the record array inside the input document
    pub records_pointer: Option<String>,
    /// Output settings
    pub output: OutputSettings,
}

/// Get the XDG config directory for hiersort.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "hiersort").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("hiersort.toml"))
}

/// Get the path to the local config file in a project directory.
pub fn local_config_path(project_dir: &Path) -> PathBuf {
    project_dir.join(".hiersort.toml")
}

/// Load a TOML file into RawSettings for manual merging.
fn load_raw_settings(path: &Path) -> Result<RawSettings, ApplicationError> {
    let content = std::fs::read_to_string(path).map_err(|e| ApplicationError::Config {
        message: format!("read {}: {}", path.display(), e),
    })?;
    toml::from_str(&content).map_err(|e| ApplicationError::Config {
        message: format!("parse {}: {}", path.display(), e),
    })
}

impl Settings {
    /// Overlay config onto self: scalar options win if Some, otherwise keep base.
    pub fn merge_with(&self, overlay: &RawSettings) -> Self {
        let collection = &overlay.collection;
        Self {
            collection: CollectionSettings {
                id_property: collection
                    .id_property
                    .clone()
                    .unwrap_or_else(|| self.collection.id_property.clone()),
                node_property: collection
                    .node_property
                    .clone()
                    .unwrap_or_else(|| self.collection.node_property.clone()),
                parent_property: collection
                    .parent_property
                    .clone()
                    .unwrap_or_else(|| self.collection.parent_property.clone()),
            },
            branch_policy: overlay.branch_policy.unwrap_or(self.branch_policy),
            records_pointer: overlay
                .records_pointer
                .clone()
                .or_else(|| self.records_pointer.clone()),
            output: OutputSettings {
                format: overlay.output.format.unwrap_or(self.output.format),
                label_property: overlay
                    .output
                    .label_property
                    .clone()
                    .or_else(|| self.output.label_property.clone()),
            },
        }
    }

    /// Load settings with layered precedence.
    ///
    /// # Arguments
    /// * `project_dir` - Optional project directory holding `.hiersort.toml`
    pub fn load(project_dir: Option<&Path>) -> Result<Self, ApplicationError> {
        // 1. Start with defaults
        let mut current = Self::default();

        // 2. Global config
        if let Some(global_path) = global_config_path() {
            if global_path.exists() {
                let raw = load_raw_settings(&global_path)?;
                current = current.merge_with(&raw);
            }
        }

        // 3. Local project config
        if let Some(dir) = project_dir {
            let dir = PathBuf::from(expand_env_vars(&dir.to_string_lossy()));
            let local_path = local_config_path(&dir);
            if local_path.exists() {
                let raw = load_raw_settings(&local_path)?;
                current = current.merge_with(&raw);
            }
        }

        // 4. Environment variables
        current = current.apply_env_overrides(Self::environment())?;

        current.validate()?;
        Ok(current)
    }

    fn environment() -> Environment {
        Environment::with_prefix("HIERSORT")
            .prefix_separator("_")
            .separator("__")
    }

    /// Apply `HIERSORT_*` variables from `env` as explicit overrides.
    pub fn apply_env_overrides(mut self, env: Environment) -> Result<Self, ApplicationError> {
        let config = Config::builder()
            .add_source(env)
            .build()
            .map_err(config_err)?;

        if let Ok(val) = config.get_string("collection.id_property") {
            self.collection.id_property = val;
        }
        if let Ok(val) = config.get_string("collection.node_property") {
            self.collection.node_property = val;
        }
        if let Ok(val) = config.get_string("collection.parent_property") {
            self.collection.parent_property = val;
        }
        if let Ok(val) = config.get_string("branch_policy") {
            self.branch_policy = val
                .parse()
                .map_err(|message| ApplicationError::Config { message })?;
        }
        if let Ok(val) = config.get_string("records_pointer") {
            self.records_pointer = Some(val);
        }
        if let Ok(val) = config.get_string("output.format") {
            self.output.format = val
                .parse()
                .map_err(|message| ApplicationError::Config { message })?;
        }
        if let Ok(val) = config.get_string("output.label_property") {
            self.output.label_property = Some(val);
        }

        Ok(self)
    }

    /// Reject settings the flattener cannot use meaningfully.
    pub fn validate(&self) -> Result<(), ApplicationError> {
        self.collection
            .validate()
            .map_err(|e| ApplicationError::Config {
                message: e.to_string(),
            })?;
        if let Some(pointer) = &self.records_pointer {
            if !pointer.is_empty() && !pointer.starts_with('/') {
                return Err(ApplicationError::Config {
                    message: format!("records_pointer must start with '/': {}", pointer),
                });
            }
        }
        Ok(())
    }

    /// Show the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ApplicationError> {
        toml::to_string_pretty(self).map_err(|e| ApplicationError::Config {
            message: format!("serialize config: {e}"),
        })
    }

    /// Generate a template config file.
    pub fn template() -> String {
        r#"# hiersort configuration
#
# Locations (by precedence, lowest to highest):
#   Global: ~/.config/hiersort/hiersort.toml
#   Local:  <project_dir>/.hiersort.toml
#   Env:    HIERSORT_* environment variables, e.g. HIERSORT_COLLECTION__ID_PROPERTY
#   Flags:  --id, --node, --parent, --policy, --pointer, --format

# "always": branches are emitted and expanded wherever they appear
# "matching": branches only appear under their own parent
# branch_policy = "always"

# JSON pointer to the record array, e.g. "/data/items"
# records_pointer = "/items"

[collection]
# id_property = "id"
# node_property = "node"
# parent_property = "parent"

[output]
# format = "json"   # json | compact | ndjson | ids
# label_property = "name"
"#
        .to_string()
    }
}

fn config_err(e: ConfigError) -> ApplicationError {
    ApplicationError::Config {
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> Environment {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::environment().source(Some(map))
    }

    #[test]
    fn given_no_overrides_when_defaults_then_id_node_parent() {
        let settings = Settings::default();
        assert_eq!(settings.collection, CollectionSettings::new("id", "node", "parent"));
        assert_eq!(settings.branch_policy, BranchPolicy::Always);
        assert_eq!(settings.output.format, OutputFormat::Json);
        assert!(settings.records_pointer.is_none());
    }

    #[test]
    fn given_partial_overlay_when_merging_then_unspecified_fields_kept() {
        let overlay = RawSettings {
            collection: RawCollectionSettings {
                parent_property: Some("parentId".into()),
                ..Default::default()
            },
            branch_policy: Some(BranchPolicy::Matching),
            ..Default::default()
        };

        let result = Settings::default().merge_with(&overlay);

        assert_eq!(result.collection.id_property, "id");
        assert_eq!(result.collection.parent_property, "parentId");
        assert_eq!(result.branch_policy, BranchPolicy::Matching);
        assert_eq!(result.output.format, OutputFormat::Json);
    }

    #[test]
    fn given_env_overrides_when_applied_then_replace_values() {
        let env = env_of(&[
            ("HIERSORT_COLLECTION__ID_PROPERTY", "key"),
            ("HIERSORT_BRANCH_POLICY", "matching"),
            ("HIERSORT_OUTPUT__FORMAT", "ndjson"),
        ]);

        let settings = Settings::default().apply_env_overrides(env).unwrap();

        assert_eq!(settings.collection.id_property, "key");
        assert_eq!(settings.collection.node_property, "node");
        assert_eq!(settings.branch_policy, BranchPolicy::Matching);
        assert_eq!(settings.output.format, OutputFormat::Ndjson);
    }

    #[test]
    fn given_unknown_policy_in_env_when_applied_then_config_error() {
        let env = env_of(&[("HIERSORT_BRANCH_POLICY", "sometimes")]);

        let err = Settings::default().apply_env_overrides(env).unwrap_err();

        assert!(matches!(err, ApplicationError::Config { .. }));
    }

    #[test]
    fn given_relative_pointer_when_validating_then_rejected() {
        let settings = Settings {
            records_pointer: Some("items".into()),
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn given_settings_when_serialized_then_toml_round_trips_through_raw() {
        let settings = Settings {
            branch_policy: BranchPolicy::Matching,
            ..Default::default()
        };

        let text = settings.to_toml().unwrap();
        let raw: RawSettings = toml::from_str(&text).unwrap();

        assert_eq!(Settings::default().merge_with(&raw), settings);
    }

    #[test]
    fn given_template_when_parsed_then_valid_toml() {
        let raw: RawSettings = toml::from_str(&Settings::template()).unwrap();
        assert!(raw.branch_policy.is_none());
    }
}
