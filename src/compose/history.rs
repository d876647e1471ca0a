//! History mirroring
//!
//! With history enabled every insert, update and delete of a record is
//! followed by an insert of the record's full field set into the history
//! table. The history statement is composed up front from the record values
//! and never depends on the primary statement's result, except for the
//! store-generated identity on integer-keyed creates.

use uuid::Uuid;

use super::errors::ComposeResult;
use super::fields::RecordShape;
use super::predicate::BindStyle;
use super::statement::{bind_record, FieldValues, Statement, StatementKind, ValueSource};
use super::naming::{check_identifier, table_reference};
use crate::config::{IdentityMode, TableConfig};
use crate::value::SqlValue;

pub struct HistoryMirror<'a> {
    config: &'a TableConfig,
    shape: &'a RecordShape,
    style: BindStyle,
}

impl<'a> HistoryMirror<'a> {
    pub fn new(config: &'a TableConfig, shape: &'a RecordShape, style: BindStyle) -> Self {
        Self { config, shape, style }
    }

    /// History insert for a mutation of the record holding `values`, or
    /// `None` when the table keeps no history.
    ///
    /// Guid-keyed tables get a fresh uuid in the history id column. Integer
    /// identity tables reuse the record id, taken from the store-generated
    /// identity when `on_create` is set.
    pub fn mirror(&self, values: &FieldValues, on_create: bool) -> ComposeResult<Option<Statement>> {
        let mode = self.config.identity_mode;
        if !mode.keeps_history() {
            return Ok(None);
        }

        let mut statement = Statement::new(
            StatementKind::HistoryInsert,
            table_reference(self.config, &self.shape.entity, true)?,
        );
        statement.params = bind_record(values);

        if mode == IdentityMode::GuidKeyed {
            let history_id = &self.config.history_id_field;
            check_identifier(history_id)?;
            let key = SqlValue::Uuid(Uuid::new_v4());

            statement.columns.push(history_id.clone());
            statement.values.push(match self.style {
                BindStyle::Parameters => {
                    statement.params.bind(history_id.clone(), key);
                    ValueSource::Param(history_id.clone())
                }
                BindStyle::InlineLiterals => ValueSource::Literal(key),
            });
        }

        for field in &self.shape.fields {
            let source = if mode == IdentityMode::IntegerIdentity && on_create && *field == self.config.id_field {
                ValueSource::StoreIdentity
            } else {
                ValueSource::Param(field.clone())
            };
            statement.columns.push(field.clone());
            statement.values.push(source);
        }

        Ok(Some(statement))
    }
}
