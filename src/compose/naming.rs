//! Identifier validation and table naming

use std::sync::OnceLock;

use regex::Regex;

use super::errors::{ComposeError, ComposeResult};
use crate::config::TableConfig;

static IDENTIFIER: OnceLock<Option<Regex>> = OnceLock::new();

/// True for plain SQL identifiers: a letter or underscore followed by
/// letters, digits or underscores
pub fn is_identifier(name: &str) -> bool {
    IDENTIFIER
        .get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").ok())
        .as_ref()
        .is_some_and(|pattern| pattern.is_match(name))
}

pub fn check_identifier(name: &str) -> ComposeResult<()> {
    if is_identifier(name) {
        Ok(())
    } else {
        Err(ComposeError::InvalidIdentifier(name.to_string()))
    }
}

/// Table name derived from a type name: everything before the first "DTO",
/// then everything before the first "Old", lowercased.
pub fn legacy_table_name(entity: &str) -> String {
    let name = match entity.find("DTO") {
        Some(at) => &entity[..at],
        None => entity,
    };

    match name.find("Old") {
        Some(at) => name[..at].to_lowercase(),
        None => name.to_string(),
    }
}

/// Fully qualified table reference, e.g. `dbo.[Person]` or `dbo.[PersonHist]`
pub fn table_reference(config: &TableConfig, entity: &str, history: bool) -> ComposeResult<String> {
    let name = match &config.table_name {
        Some(name) => name.clone(),
        None => legacy_table_name(entity),
    };
    check_identifier(&name)?;

    let suffix = if history { config.history_suffix.as_str() } else { "" };
    Ok(format!("{}[{}{}]", config.prefix, name, suffix))
}
