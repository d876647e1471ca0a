//! Field introspection over a record shape

use super::errors::{ComposeError, ComposeResult};
use crate::config::IdentityMode;
use crate::record::Record;

/// Entity name plus ordered field names
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordShape {
    pub entity: String,
    pub fields: Vec<String>,
}

impl RecordShape {
    pub fn new<S: Into<String>>(entity: impl Into<String>, fields: impl IntoIterator<Item = S>) -> Self {
        Self {
            entity: entity.into(),
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    pub fn of<R: Record>() -> Self {
        Self::new(R::entity_name(), R::field_names())
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f == field)
    }

    /// Fail unless every name is a field of this shape
    pub fn check_fields<S: AsRef<str>>(&self, names: &[S]) -> ComposeResult<()> {
        for name in names {
            if !self.contains(name.as_ref()) {
                return Err(ComposeError::UnknownField {
                    entity: self.entity.clone(),
                    field: name.as_ref().to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Field names of `shape` in declaration order, minus `excluded`
pub fn fields<S: AsRef<str>>(shape: &RecordShape, excluded: &[S]) -> Vec<String> {
    shape
        .fields
        .iter()
        .filter(|f| !excluded.iter().any(|e| e.as_ref() == f.as_str()))
        .cloned()
        .collect()
}

/// Resolve the key fields for a statement.
///
/// Explicit keys are de-duplicated in order. With none given, the configured
/// id field is used when the identity mode is integer-keyed or a key is
/// required; otherwise the result is empty.
pub fn key_fields<S: AsRef<str>>(
    explicit: &[S],
    id_field: &str,
    mode: IdentityMode,
    require: bool,
) -> Vec<String> {
    let mut keys: Vec<String> = Vec::with_capacity(explicit.len().max(1));
    for key in explicit {
        let key = key.as_ref();
        if !keys.iter().any(|k| k == key) {
            keys.push(key.to_string());
        }
    }

    if keys.is_empty() && (mode == IdentityMode::IntegerIdentity || require) {
        keys.push(id_field.to_string());
    }

    keys
}
