//! Engine Configuration
//!
//! Per-entity table configuration: prefix, key field, soft-delete predicate,
//! ordering and history mode. Loaded from JSON; every field has a default.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::compose::naming;

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config for {entity}: {reason}")]
    Invalid { entity: String, reason: String },
}

impl ConfigError {
    pub fn code(&self) -> &'static str {
        match self {
            ConfigError::Read { .. } => "ROWKEEPER_CONFIG_READ",
            ConfigError::Parse(_) => "ROWKEEPER_CONFIG_PARSE",
            ConfigError::Invalid { .. } => "ROWKEEPER_CONFIG_INVALID",
        }
    }
}

/// How keys are produced and whether mutations are mirrored to history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityMode {
    /// Caller supplies uuid keys; history rows get their own fresh uuid
    GuidKeyed,
    /// No history table
    #[default]
    NoHistory,
    /// Store-generated integer key; history rows reuse it
    IntegerIdentity,
}

impl IdentityMode {
    pub fn keeps_history(&self) -> bool {
        !matches!(self, IdentityMode::NoHistory)
    }
}

/// Table configuration for one entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableConfig {
    /// Schema prefix (default: "dbo.")
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Key field (default: "id")
    #[serde(default = "default_id_field")]
    pub id_field: String,

    /// Predicate selecting rows that are not soft-deleted (default: "active = 1")
    #[serde(default = "default_active_predicate")]
    pub active_predicate: String,

    /// Ordering clause for list reads (default: "date desc")
    #[serde(default = "default_order_by")]
    pub order_by: String,

    /// History table suffix (default: "Hist")
    #[serde(default = "default_history_suffix")]
    pub history_suffix: String,

    /// History row key column (default: "IdHist")
    #[serde(default = "default_history_id_field")]
    pub history_id_field: String,

    #[serde(default)]
    pub identity_mode: IdentityMode,

    /// Explicit table name; when absent the name is derived from the type name
    #[serde(default)]
    pub table_name: Option<String>,
}

fn default_prefix() -> String {
    "dbo.".to_string()
}

fn default_id_field() -> String {
    "id".to_string()
}

fn default_active_predicate() -> String {
    "active = 1".to_string()
}

fn default_order_by() -> String {
    "date desc".to_string()
}

fn default_history_suffix() -> String {
    "Hist".to_string()
}

fn default_history_id_field() -> String {
    "IdHist".to_string()
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            id_field: default_id_field(),
            active_predicate: default_active_predicate(),
            order_by: default_order_by(),
            history_suffix: default_history_suffix(),
            history_id_field: default_history_id_field(),
            identity_mode: IdentityMode::default(),
            table_name: None,
        }
    }
}

impl TableConfig {
    pub fn with_identity_mode(mode: IdentityMode) -> Self {
        Self {
            identity_mode: mode,
            ..Default::default()
        }
    }

    pub fn with_table_name(mut self, name: impl Into<String>) -> Self {
        self.table_name = Some(name.into());
        self
    }

    /// Check identifiers and predicate text
    pub fn validate(&self, entity: &str) -> ConfigResult<()> {
        let invalid = |reason: String| ConfigError::Invalid {
            entity: entity.to_string(),
            reason,
        };

        for (what, ident) in [
            ("id_field", self.id_field.as_str()),
            ("history_id_field", self.history_id_field.as_str()),
        ] {
            if !naming::is_identifier(ident) {
                return Err(invalid(format!("{} '{}' is not an identifier", what, ident)));
            }
        }

        if !self.history_suffix.is_empty() && !naming::is_identifier(&self.history_suffix) {
            return Err(invalid(format!(
                "history_suffix '{}' is not an identifier",
                self.history_suffix
            )));
        }

        if let Some(name) = &self.table_name {
            if !naming::is_identifier(name) {
                return Err(invalid(format!("table_name '{}' is not an identifier", name)));
            }
        }

        let prefix = self.prefix.trim_end_matches('.');
        if !prefix.is_empty()
            && (!self.prefix.ends_with('.') || !prefix.split('.').all(naming::is_identifier))
        {
            return Err(invalid(format!("prefix '{}' must be empty or end with '.'", self.prefix)));
        }

        if self.active_predicate.trim().is_empty() {
            return Err(invalid("active_predicate is empty".to_string()));
        }

        Ok(())
    }
}

/// Table configurations for a set of entities
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Applied to entities without their own entry
    #[serde(default)]
    pub default: TableConfig,

    #[serde(default)]
    pub entities: HashMap<String, TableConfig>,
}

impl EngineConfig {
    /// Load and validate a JSON configuration file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;

        let config: EngineConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        self.default.validate("default")?;

        let mut names: Vec<&String> = self.entities.keys().collect();
        names.sort();
        for name in names {
            self.entities[name].validate(name)?;
        }
        Ok(())
    }

    /// Configuration for an entity, falling back to the default entry
    pub fn table_for(&self, entity: &str) -> &TableConfig {
        self.entities.get(entity).unwrap_or(&self.default)
    }
}
