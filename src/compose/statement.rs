//! Statement composition
//!
//! A `Statement` carries its structured form (kind, table, columns, value
//! sources, filter, ordering) alongside the bound parameters, so a store can
//! either send `sql()` over the wire or interpret the structure directly.

use std::fmt;

use serde::Serialize;

use super::errors::{ComposeError, ComposeResult};
use super::fields::{fields, key_fields, RecordShape};
use super::history::HistoryMirror;
use super::naming::{check_identifier, table_reference};
use super::params::Params;
use super::predicate::{id_comparer, in_list, BindStyle, Binder, Filter, Predicate};
use crate::config::{IdentityMode, TableConfig};
use crate::value::SqlValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementKind {
    Select,
    SelectTop1,
    Count,
    Insert,
    Update,
    Delete,
    HistoryInsert,
    CurrentIdentity,
}

impl StatementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatementKind::Select => "select",
            StatementKind::SelectTop1 => "select_top1",
            StatementKind::Count => "count",
            StatementKind::Insert => "insert",
            StatementKind::Update => "update",
            StatementKind::Delete => "delete",
            StatementKind::HistoryInsert => "history_insert",
            StatementKind::CurrentIdentity => "current_identity",
        }
    }
}

/// Where an inserted or updated column gets its value
#[derive(Debug, Clone, PartialEq)]
pub enum ValueSource {
    /// Named parameter, without the `@`
    Param(String),
    Literal(SqlValue),
    /// Identity generated by the last insert of this unit of work
    StoreIdentity,
}

impl ValueSource {
    fn render(&self) -> String {
        match self {
            ValueSource::Param(name) => format!("@{}", name),
            ValueSource::Literal(value) => value.to_inline_literal(),
            ValueSource::StoreIdentity => "@@IDENTITY".to_string(),
        }
    }
}

/// A composed statement
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub kind: StatementKind,
    /// Rendered table reference, e.g. `dbo.[Person]`
    pub table: String,
    /// Projection for reads, target columns for writes
    pub columns: Vec<String>,
    /// One source per column for inserts and updates
    pub values: Vec<ValueSource>,
    /// AND-joined filter terms
    pub filter: Vec<Predicate>,
    pub order_by: Option<String>,
    /// Column the store fills with a generated identity on insert
    pub identity_column: Option<String>,
    pub params: Params,
}

impl Statement {
    pub(crate) fn new(kind: StatementKind, table: String) -> Self {
        Self {
            kind,
            table,
            columns: Vec::new(),
            values: Vec::new(),
            filter: Vec::new(),
            order_by: None,
            identity_column: None,
            params: Params::new(),
        }
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    fn projection(&self) -> String {
        let columns: Vec<String> = self.columns.iter().map(|c| format!("[{}]", c)).collect();
        columns.join(",")
    }

    fn where_clause(&self) -> String {
        if self.filter.is_empty() {
            return String::new();
        }
        let terms: Vec<String> = self.filter.iter().map(Predicate::render).collect();
        format!(" where {}", terms.join(" and "))
    }

    fn order_clause(&self) -> String {
        match &self.order_by {
            Some(order) if !order.trim().is_empty() => format!(" order by {}", order),
            _ => String::new(),
        }
    }

    /// SQL text of the statement
    pub fn sql(&self) -> String {
        match self.kind {
            StatementKind::Select => format!(
                "select {} from {}{}{}",
                self.projection(),
                self.table,
                self.where_clause(),
                self.order_clause()
            ),
            StatementKind::SelectTop1 => format!(
                "select top 1 {} from {}{}{}",
                self.projection(),
                self.table,
                self.where_clause(),
                self.order_clause()
            ),
            StatementKind::Count => {
                format!("select count(1) from {}{}", self.table, self.where_clause())
            }
            StatementKind::Insert | StatementKind::HistoryInsert => {
                let values: Vec<String> = self.values.iter().map(ValueSource::render).collect();
                format!(
                    "insert into {} ({}) values ({})",
                    self.table,
                    self.projection(),
                    values.join(",")
                )
            }
            StatementKind::Update => {
                let assignments: Vec<String> = self
                    .columns
                    .iter()
                    .zip(&self.values)
                    .map(|(c, v)| format!("[{}] = {}", c, v.render()))
                    .collect();
                format!(
                    "update {} set {}{}",
                    self.table,
                    assignments.join(","),
                    self.where_clause()
                )
            }
            StatementKind::Delete => format!("delete {}{}", self.table, self.where_clause()),
            StatementKind::CurrentIdentity => format!("select IDENT_CURRENT('{}')", self.table),
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql())
    }
}

/// Record values keyed by field name
pub type FieldValues = [(String, SqlValue)];

pub(crate) fn bind_record(values: &FieldValues) -> Params {
    values.iter().map(|(n, v)| (n.clone(), v.clone())).collect()
}

/// Composes statements for one record shape under one table configuration
#[derive(Debug, Clone)]
pub struct StatementComposer<'a> {
    config: &'a TableConfig,
    shape: &'a RecordShape,
    style: BindStyle,
}

impl<'a> StatementComposer<'a> {
    pub fn new(config: &'a TableConfig, shape: &'a RecordShape, style: BindStyle) -> Self {
        Self { config, shape, style }
    }

    pub fn config(&self) -> &TableConfig {
        self.config
    }

    pub fn shape(&self) -> &RecordShape {
        self.shape
    }

    pub fn binder(&self) -> Binder {
        Binder::new(self.style)
    }

    pub fn table(&self, history: bool) -> ComposeResult<String> {
        table_reference(self.config, &self.shape.entity, history)
    }

    /// Keys for a statement; see `key_fields`
    pub fn keys<S: AsRef<str>>(&self, explicit: &[S], require: bool) -> Vec<String> {
        key_fields(explicit, &self.config.id_field, self.config.identity_mode, require)
    }

    fn read(
        &self,
        kind: StatementKind,
        history: bool,
        filter: Option<Filter>,
        all: bool,
    ) -> ComposeResult<Statement> {
        let mut statement = Statement::new(kind, self.table(history)?);
        if kind != StatementKind::Count {
            statement.columns = self.shape.fields.clone();
        }
        if !all {
            statement.filter.push(Predicate::Raw(self.config.active_predicate.clone()));
        }
        if let Some(filter) = filter {
            statement.filter.push(filter.predicate);
            statement.params = filter.params;
        }
        Ok(statement)
    }

    fn ordered(&self, mut statement: Statement) -> Statement {
        statement.order_by = Some(self.config.order_by.clone()).filter(|o| !o.trim().is_empty());
        statement
    }

    /// All fields, soft-delete filter unless `all`, configured ordering
    pub fn select(&self, filter: Option<Filter>, all: bool) -> ComposeResult<Statement> {
        Ok(self.ordered(self.read(StatementKind::Select, false, filter, all)?))
    }

    /// At most one row; ordered only when asked
    pub fn select_top1(&self, filter: Option<Filter>, all: bool, ordered: bool) -> ComposeResult<Statement> {
        let statement = self.read(StatementKind::SelectTop1, false, filter, all)?;
        Ok(if ordered { self.ordered(statement) } else { statement })
    }

    pub fn count(&self, filter: Option<Filter>, all: bool) -> ComposeResult<Statement> {
        self.read(StatementKind::Count, false, filter, all)
    }

    /// Reads against the history table
    pub fn select_history(&self, filter: Option<Filter>, all: bool, top1: bool) -> ComposeResult<Statement> {
        let kind = if top1 { StatementKind::SelectTop1 } else { StatementKind::Select };
        Ok(self.ordered(self.read(kind, true, filter, all)?))
    }

    /// Insert of every field except the key fields. Integer identity tables
    /// exclude the id and let the store generate it.
    pub fn insert<S: AsRef<str>>(&self, values: &FieldValues, explicit_keys: &[S]) -> ComposeResult<Statement> {
        let keys = self.keys(explicit_keys, false);
        let columns = fields(self.shape, &keys);
        if columns.is_empty() {
            return Err(ComposeError::NoFields);
        }

        let mut statement = Statement::new(StatementKind::Insert, self.table(false)?);
        statement.values = columns.iter().map(|c| ValueSource::Param(c.clone())).collect();
        statement.columns = columns;
        if self.config.identity_mode == IdentityMode::IntegerIdentity {
            statement.identity_column = Some(self.config.id_field.clone());
        }
        statement.params = bind_record(values);
        Ok(statement)
    }

    /// Update of every non-key field, matched by `id_comparer` over the keys
    pub fn update<S: AsRef<str>>(&self, values: &FieldValues, explicit_keys: &[S], combine: bool) -> ComposeResult<Statement> {
        let keys = self.keys(explicit_keys, true);
        self.shape.check_fields(&keys)?;
        let columns = fields(self.shape, &keys);
        if columns.is_empty() {
            return Err(ComposeError::NoFields);
        }

        let mut statement = Statement::new(StatementKind::Update, self.table(false)?);
        statement.values = columns.iter().map(|c| ValueSource::Param(c.clone())).collect();
        statement.columns = columns;
        statement.filter.push(id_comparer(&keys, combine)?);
        statement.params = bind_record(values);
        Ok(statement)
    }

    /// Hard delete matched by `id_comparer` over the keys
    pub fn delete<S: AsRef<str>>(&self, values: &FieldValues, explicit_keys: &[S], combine: bool) -> ComposeResult<Statement> {
        let keys = self.keys(explicit_keys, true);
        self.shape.check_fields(&keys)?;

        let mut statement = Statement::new(StatementKind::Delete, self.table(false)?);
        statement.filter.push(id_comparer(&keys, combine)?);
        statement.params = bind_record(values);
        Ok(statement)
    }

    /// Hard delete of every row whose id is in `ids`
    pub fn delete_in(&self, ids: &[SqlValue]) -> ComposeResult<Statement> {
        check_identifier(&self.config.id_field)?;
        let mut binder = self.binder();
        let predicate = in_list(&self.config.id_field, ids, false, &mut binder)?;

        let mut statement = Statement::new(StatementKind::Delete, self.table(false)?);
        statement.filter.push(predicate);
        statement.params = binder.into_params();
        Ok(statement)
    }

    pub fn current_identity(&self) -> ComposeResult<Statement> {
        Ok(Statement::new(StatementKind::CurrentIdentity, self.table(false)?))
    }

    pub fn history_mirror(&self) -> HistoryMirror<'a> {
        HistoryMirror::new(self.config, self.shape, self.style)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::predicate::{equals, query_parameters};

    fn shape() -> RecordShape {
        RecordShape::new("PersonDTO", ["id", "name", "active", "date"])
    }

    fn values() -> Vec<(String, SqlValue)> {
        vec![
            ("id".to_string(), SqlValue::Int(1)),
            ("name".to_string(), SqlValue::from("Ann")),
            ("active".to_string(), SqlValue::Int(1)),
            ("date".to_string(), SqlValue::Null),
        ]
    }

    #[test]
    fn test_select_with_soft_delete_filter() {
        let config = TableConfig::default();
        let shape = shape();
        let composer = StatementComposer::new(&config, &shape, BindStyle::Parameters);

        assert_eq!(
            composer.select(None, false).unwrap().sql(),
            "select [id],[name],[active],[date] from dbo.[Person] where active = 1 order by date desc"
        );
        assert_eq!(
            composer.select(None, true).unwrap().sql(),
            "select [id],[name],[active],[date] from dbo.[Person] order by date desc"
        );
    }

    #[test]
    fn test_select_by_values() {
        let config = TableConfig::default();
        let shape = shape();
        let composer = StatementComposer::new(&config, &shape, BindStyle::InlineLiterals);

        let mut binder = composer.binder();
        let predicate = query_parameters(
            &[SqlValue::from("a"), SqlValue::from("b")],
            &["name", "id"],
            false,
            &mut binder,
        )
        .unwrap();
        let statement = composer.select_top1(Some(binder.finish(predicate)), false, false).unwrap();
        assert_eq!(
            statement.sql(),
            "select top 1 [id],[name],[active],[date] from dbo.[Person] where active = 1 and (name = 'a' and id = 'b')"
        );
    }

    #[test]
    fn test_count() {
        let config = TableConfig::default();
        let shape = shape();
        let composer = StatementComposer::new(&config, &shape, BindStyle::Parameters);

        let mut binder = composer.binder();
        let predicate = equals("name", SqlValue::from("Ann"), false, &mut binder).unwrap();
        let statement = composer.count(Some(binder.finish(predicate)), true).unwrap();
        assert_eq!(statement.sql(), "select count(1) from dbo.[Person] where name = @__p0");
        assert_eq!(statement.params().get("__p0"), Some(&SqlValue::from("Ann")));
    }

    #[test]
    fn test_insert_guid_keyed_echoes_id() {
        let config = TableConfig::with_identity_mode(IdentityMode::GuidKeyed);
        let shape = shape();
        let composer = StatementComposer::new(&config, &shape, BindStyle::Parameters);

        let statement = composer.insert::<&str>(&values(), &[]).unwrap();
        assert_eq!(
            statement.sql(),
            "insert into dbo.[Person] ([id],[name],[active],[date]) values (@id,@name,@active,@date)"
        );
        assert!(statement.identity_column.is_none());
    }

    #[test]
    fn test_insert_integer_identity_excludes_id() {
        let config = TableConfig::with_identity_mode(IdentityMode::IntegerIdentity);
        let shape = shape();
        let composer = StatementComposer::new(&config, &shape, BindStyle::Parameters);

        let statement = composer.insert::<&str>(&values(), &[]).unwrap();
        assert_eq!(
            statement.sql(),
            "insert into dbo.[Person] ([name],[active],[date]) values (@name,@active,@date)"
        );
        assert_eq!(statement.identity_column.as_deref(), Some("id"));
    }

    #[test]
    fn test_update_and_delete() {
        let config = TableConfig::default();
        let shape = shape();
        let composer = StatementComposer::new(&config, &shape, BindStyle::Parameters);

        assert_eq!(
            composer.update::<&str>(&values(), &[], false).unwrap().sql(),
            "update dbo.[Person] set [name] = @name,[active] = @active,[date] = @date where (id = @id)"
        );
        assert_eq!(
            composer.update(&values(), &["id", "name"], true).unwrap().sql(),
            "update dbo.[Person] set [active] = @active,[date] = @date where ((id = @id and name = @name) or (id = @name and name = @id))"
        );
        assert_eq!(
            composer.delete::<&str>(&values(), &[], false).unwrap().sql(),
            "delete dbo.[Person] where (id = @id)"
        );
    }

    #[test]
    fn test_update_rejects_unknown_key() {
        let config = TableConfig::default();
        let shape = shape();
        let composer = StatementComposer::new(&config, &shape, BindStyle::Parameters);

        assert!(matches!(
            composer.update(&values(), &["missing"], false),
            Err(ComposeError::UnknownField { .. })
        ));
    }

    #[test]
    fn test_delete_in_and_identity() {
        let config = TableConfig::default();
        let shape = shape();
        let composer = StatementComposer::new(&config, &shape, BindStyle::Parameters);

        let statement = composer
            .delete_in(&[SqlValue::Int(1), SqlValue::Int(2), SqlValue::Int(1)])
            .unwrap();
        assert_eq!(statement.sql(), "delete dbo.[Person] where id in (@__p0,@__p1)");
        assert_eq!(
            composer.current_identity().unwrap().sql(),
            "select IDENT_CURRENT('dbo.[Person]')"
        );
    }
}
