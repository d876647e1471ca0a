//! Repository
//!
//! Typed reads and writes for one record type over one table. The
//! repository composes statements, runs them through the storage engine and
//! decodes rows back into records. It applies no lifecycle rules: absence is
//! reported as `None` or an empty list and writes return the affected count.
//! `EntityService` layers validation, checks and hooks on top.

use std::marker::PhantomData;

use crate::compose::predicate::{equals, in_list, is_null, like, not_equals, query_parameters};
use crate::compose::{
    BindStyle, Binder, ComposeResult, FieldValues, Filter, Predicate, RecordShape, Statement,
    StatementComposer,
};
use crate::config::TableConfig;
use crate::error::{EngineError, EngineResult};
use crate::record::Record;
use crate::storage::{CancelSignal, Row, StorageEngine, StoreError, WriteSet};
use crate::value::SqlValue;

/// Field values of a record, keyed by column name
pub fn field_values<R: Record>(record: &R) -> Vec<(String, SqlValue)> {
    record
        .values()
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
}

fn count_of(value: SqlValue) -> EngineResult<u64> {
    match value {
        SqlValue::Int(n) if n >= 0 => Ok(n as u64),
        SqlValue::Null => Ok(0),
        other => Err(EngineError::Store(StoreError::Rejected(format!(
            "count returned {}",
            other.type_name()
        )))),
    }
}

pub struct Repository<R: Record> {
    config: TableConfig,
    shape: RecordShape,
    engine: StorageEngine,
    style: BindStyle,
    signal: CancelSignal,
    _record: PhantomData<fn() -> R>,
}

impl<R: Record> Repository<R> {
    /// Repository over the table `config` describes for `R`
    pub fn new(engine: StorageEngine, config: TableConfig) -> EngineResult<Self> {
        config
            .validate(R::entity_name())
            .map_err(|e| EngineError::bad_parameter(e.to_string()))?;

        Ok(Self {
            config,
            shape: RecordShape::of::<R>(),
            engine,
            style: BindStyle::default(),
            signal: CancelSignal::new(),
            _record: PhantomData,
        })
    }

    pub fn with_bind_style(mut self, style: BindStyle) -> Self {
        self.style = style;
        self
    }

    /// Signal checked before every statement this repository runs
    pub fn with_signal(mut self, signal: CancelSignal) -> Self {
        self.signal = signal;
        self
    }

    pub fn config(&self) -> &TableConfig {
        &self.config
    }

    pub fn shape(&self) -> &RecordShape {
        &self.shape
    }

    pub fn signal(&self) -> &CancelSignal {
        &self.signal
    }

    pub fn engine(&self) -> &StorageEngine {
        &self.engine
    }

    pub fn composer(&self) -> StatementComposer<'_> {
        StatementComposer::new(&self.config, &self.shape, self.style)
    }

    fn check_field(&self, field: &str) -> EngineResult<()> {
        Ok(self.shape.check_fields(&[field])?)
    }

    fn filter(&self, build: impl FnOnce(&mut Binder) -> ComposeResult<Predicate>) -> EngineResult<Filter> {
        let mut binder = Binder::new(self.style);
        let predicate = build(&mut binder)?;
        Ok(binder.finish(predicate))
    }

    fn decode(row: &Row) -> EngineResult<R> {
        Ok(R::from_values(row.iter())?)
    }

    fn fetch(&self, statement: Statement) -> EngineResult<Vec<R>> {
        self.engine
            .rows(&statement, &self.signal)?
            .iter()
            .map(Self::decode)
            .collect()
    }

    fn fetch_one(&self, statement: Statement) -> EngineResult<Option<R>> {
        self.engine
            .single(&statement, &self.signal)?
            .as_ref()
            .map(Self::decode)
            .transpose()
    }

    fn count(&self, statement: Statement) -> EngineResult<u64> {
        count_of(self.engine.scalar(&statement, &self.signal)?)
    }

    // Reads

    /// Every row; soft-deleted ones only with `all`
    pub fn all(&self, all: bool) -> EngineResult<Vec<R>> {
        self.fetch(self.composer().select(None, all)?)
    }

    /// Rows matching value groups against `fields`; see `query_parameters`
    pub fn by_values<S: AsRef<str>>(
        &self,
        values: &[SqlValue],
        fields: &[S],
        combine: bool,
        all: bool,
    ) -> EngineResult<Vec<R>> {
        self.shape.check_fields(fields)?;
        let filter = self.filter(|b| query_parameters(values, fields, combine, b))?;
        self.fetch(self.composer().select(Some(filter), all)?)
    }

    /// First row, in configured order, matching value groups against `fields`
    pub fn first_by_values<S: AsRef<str>>(
        &self,
        values: &[SqlValue],
        fields: &[S],
        combine: bool,
        all: bool,
    ) -> EngineResult<Option<R>> {
        self.shape.check_fields(fields)?;
        let filter = self.filter(|b| query_parameters(values, fields, combine, b))?;
        self.fetch_one(self.composer().select_top1(Some(filter), all, true)?)
    }

    pub fn where_equals(&self, field: &str, value: SqlValue, case_insensitive: bool, all: bool) -> EngineResult<Vec<R>> {
        self.check_field(field)?;
        let filter = self.filter(|b| equals(field, value, case_insensitive, b))?;
        self.fetch(self.composer().select(Some(filter), all)?)
    }

    pub fn where_not(&self, field: &str, value: SqlValue, case_insensitive: bool, all: bool) -> EngineResult<Vec<R>> {
        self.check_field(field)?;
        let filter = self.filter(|b| not_equals(field, value, case_insensitive, b))?;
        self.fetch(self.composer().select(Some(filter), all)?)
    }

    /// Rows whose `field` contains `value`
    pub fn where_like(&self, field: &str, value: &str, case_insensitive: bool, all: bool) -> EngineResult<Vec<R>> {
        self.check_field(field)?;
        let filter = self.filter(|b| like(field, value, case_insensitive, b))?;
        self.fetch(self.composer().select(Some(filter), all)?)
    }

    pub fn where_null(&self, field: &str, all: bool) -> EngineResult<Vec<R>> {
        self.check_field(field)?;
        let filter = self.filter(|_| is_null(field))?;
        self.fetch(self.composer().select(Some(filter), all)?)
    }

    pub fn where_in(&self, field: &str, values: &[SqlValue], case_insensitive: bool, all: bool) -> EngineResult<Vec<R>> {
        self.check_field(field)?;
        let filter = self.filter(|b| in_list(field, values, case_insensitive, b))?;
        self.fetch(self.composer().select(Some(filter), all)?)
    }

    /// First row, in configured order, whose `field` equals `value`
    pub fn first_where(&self, field: &str, value: SqlValue, case_insensitive: bool, all: bool) -> EngineResult<Option<R>> {
        self.check_field(field)?;
        let filter = self.filter(|b| equals(field, value, case_insensitive, b))?;
        self.fetch_one(self.composer().select_top1(Some(filter), all, true)?)
    }

    /// Row by its id field
    pub fn find(&self, id: SqlValue, all: bool) -> EngineResult<Option<R>> {
        let id_field = self.config.id_field.clone();
        self.check_field(&id_field)?;
        let filter = self.filter(|b| equals(&id_field, id, false, b))?;
        self.fetch_one(self.composer().select_top1(Some(filter), all, false)?)
    }

    fn related_filter<S: AsRef<str>>(
        &self,
        id: SqlValue,
        values: &[SqlValue],
        fields: &[S],
        combine: bool,
        disjunction: bool,
    ) -> EngineResult<Filter> {
        self.shape.check_fields(fields)?;
        let id_field = self.config.id_field.clone();
        self.filter(|b| {
            let by_id = equals(&id_field, id, false, b)?;
            let by_values = query_parameters(values, fields, combine, b)?;
            Ok(if disjunction {
                Predicate::Or(vec![by_id, by_values])
            } else {
                Predicate::And(vec![by_id, by_values])
            })
        })
    }

    /// Rows with the given id that also match the value groups
    pub fn related<S: AsRef<str>>(
        &self,
        id: SqlValue,
        values: &[SqlValue],
        fields: &[S],
        combine: bool,
        all: bool,
    ) -> EngineResult<Vec<R>> {
        let filter = self.related_filter(id, values, fields, combine, false)?;
        self.fetch(self.composer().select(Some(filter), all)?)
    }

    pub fn count_values<S: AsRef<str>>(
        &self,
        values: &[SqlValue],
        fields: &[S],
        combine: bool,
        all: bool,
    ) -> EngineResult<u64> {
        self.shape.check_fields(fields)?;
        let filter = self.filter(|b| query_parameters(values, fields, combine, b))?;
        self.count(self.composer().count(Some(filter), all)?)
    }

    /// Whether exactly `amount` rows match the value groups
    pub fn exists_values<S: AsRef<str>>(
        &self,
        values: &[SqlValue],
        fields: &[S],
        amount: u64,
        combine: bool,
        all: bool,
    ) -> EngineResult<bool> {
        Ok(self.count_values(values, fields, combine, all)? == amount)
    }

    /// Whether exactly `amount` rows have `field` equal to `value`
    pub fn exists(&self, field: &str, value: SqlValue, amount: u64, all: bool) -> EngineResult<bool> {
        self.check_field(field)?;
        let filter = self.filter(|b| equals(field, value, false, b))?;
        Ok(self.count(self.composer().count(Some(filter), all)?)? == amount)
    }

    /// Whether exactly `amount` rows have the given id or match the value groups
    pub fn exists_related<S: AsRef<str>>(
        &self,
        id: SqlValue,
        values: &[SqlValue],
        fields: &[S],
        amount: u64,
        combine: bool,
        all: bool,
    ) -> EngineResult<bool> {
        let filter = self.related_filter(id, values, fields, combine, true)?;
        Ok(self.count(self.composer().count(Some(filter), all)?)? == amount)
    }

    /// Last identity the store generated for this table
    pub fn current_identity(&self) -> EngineResult<Option<i64>> {
        let value = self
            .engine
            .scalar(&self.composer().current_identity()?, &self.signal)?;
        match value {
            SqlValue::Null => Ok(None),
            SqlValue::Int(n) => Ok(Some(n)),
            SqlValue::Float(f) => Ok(Some(f as i64)),
            other => Err(EngineError::Store(StoreError::Rejected(format!(
                "identity returned {}",
                other.type_name()
            )))),
        }
    }

    // History

    /// One history row by its history id
    pub fn history_entry(&self, history_id: SqlValue, all: bool) -> EngineResult<Option<R>> {
        let history_field = self.config.history_id_field.clone();
        let filter = self.filter(|b| equals(&history_field, history_id, false, b))?;
        self.fetch_one(self.composer().select_history(Some(filter), all, true)?)
    }

    /// Every history row of one record, in configured order
    pub fn history_for(&self, id: SqlValue, all: bool) -> EngineResult<Vec<R>> {
        let id_field = self.config.id_field.clone();
        self.check_field(&id_field)?;
        let filter = self.filter(|b| equals(&id_field, id, false, b))?;
        self.fetch(self.composer().select_history(Some(filter), all, false)?)
    }

    /// History rows whose `field` equals `value`
    pub fn history_where(&self, field: &str, value: SqlValue, case_insensitive: bool) -> EngineResult<Vec<R>> {
        self.check_field(field)?;
        let filter = self.filter(|b| equals(field, value, case_insensitive, b))?;
        self.fetch(self.composer().select_history(Some(filter), true, false)?)
    }

    pub fn history_by_values<S: AsRef<str>>(&self, values: &[SqlValue], fields: &[S], combine: bool) -> EngineResult<Vec<R>> {
        self.shape.check_fields(fields)?;
        let filter = self.filter(|b| query_parameters(values, fields, combine, b))?;
        self.fetch(self.composer().select_history(Some(filter), true, false)?)
    }

    // Writes

    fn insert_set(&self, values: &FieldValues) -> EngineResult<WriteSet> {
        let composer = self.composer();
        Ok(WriteSet::new(
            composer.insert::<&str>(values, &[])?,
            composer.history_mirror().mirror(values, true)?,
        ))
    }

    fn update_set<S: AsRef<str>>(&self, values: &FieldValues, keys: &[S], combine: bool) -> EngineResult<WriteSet> {
        let composer = self.composer();
        Ok(WriteSet::new(
            composer.update(values, keys, combine)?,
            composer.history_mirror().mirror(values, false)?,
        ))
    }

    fn delete_set<S: AsRef<str>>(&self, values: &FieldValues, keys: &[S], combine: bool) -> EngineResult<WriteSet> {
        let composer = self.composer();
        Ok(WriteSet::new(
            composer.delete(values, keys, combine)?,
            composer.history_mirror().mirror(values, false)?,
        ))
    }

    fn write(&self, set: WriteSet) -> EngineResult<u64> {
        Ok(self.engine.write(&set, &self.signal)?)
    }

    fn write_many(&self, sets: Vec<WriteSet>) -> EngineResult<u64> {
        self.engine.write_many(&sets, &self.signal).map_err(|e| {
            if e.is_cancellation() {
                EngineError::Cancelled(e)
            } else {
                EngineError::batch_failed(e)
            }
        })
    }

    /// Insert a record and, with history enabled, its history row
    pub fn insert(&self, record: &R) -> EngineResult<u64> {
        self.write(self.insert_set(&field_values(record))?)
    }

    /// Insert every record in one transaction
    pub fn insert_many(&self, records: &[R]) -> EngineResult<u64> {
        let sets = records
            .iter()
            .map(|r| self.insert_set(&field_values(r)))
            .collect::<EngineResult<Vec<_>>>()?;
        self.write_many(sets)
    }

    /// Update the row matched by `keys` (the id field when empty)
    pub fn update<S: AsRef<str>>(&self, record: &R, keys: &[S], combine: bool) -> EngineResult<u64> {
        self.write(self.update_set(&field_values(record), keys, combine)?)
    }

    pub fn update_many<S: AsRef<str>>(&self, records: &[R], keys: &[S], combine: bool) -> EngineResult<u64> {
        let sets = records
            .iter()
            .map(|r| self.update_set(&field_values(r), keys, combine))
            .collect::<EngineResult<Vec<_>>>()?;
        self.write_many(sets)
    }

    /// Hard delete of the row matched by `keys` (the id field when empty)
    pub fn delete<S: AsRef<str>>(&self, record: &R, keys: &[S], combine: bool) -> EngineResult<u64> {
        self.write(self.delete_set(&field_values(record), keys, combine)?)
    }

    pub fn delete_many(&self, records: &[R]) -> EngineResult<u64> {
        let sets = records
            .iter()
            .map(|r| self.delete_set::<&str>(&field_values(r), &[], false))
            .collect::<EngineResult<Vec<_>>>()?;
        self.write_many(sets)
    }

    /// Hard delete by id list. Writes no history.
    pub fn delete_ids(&self, ids: &[SqlValue]) -> EngineResult<u64> {
        let statement = self.composer().delete_in(ids)?;
        Ok(self.engine.execute(&statement, &self.signal)?)
    }
}
