//! Entity service
//!
//! The lifecycle protocol for one record type. Every mutation validates its
//! arguments, checks existence and row versions against the stored rows,
//! runs the `before_*` hooks, writes through the repository and reports a
//! typed `Outcome`. Batch mutations run every check for every item before
//! the first write and then write all items in one transaction.
//!
//! Reads report absence through the error kinds: lists that come back empty
//! are `NoContent`, lookups by a key the caller expects to exist are
//! `NotFound`.

use chrono::{DateTime, Utc};

use super::hooks::{LifecycleHooks, NoopHooks};
use super::outcome::Outcome;
use crate::config::IdentityMode;
use crate::error::{EngineError, EngineResult, Presence};
use crate::observability::{log_event, Event};
use crate::record::{ActiveState, Record};
use crate::repository::Repository;
use crate::value::SqlValue;

fn check_value(value: &SqlValue, what: &str) -> EngineResult<()> {
    if value.is_blank() {
        return Err(EngineError::bad_parameter(format!("{} is null or blank", what)));
    }
    Ok(())
}

fn check_list<T>(items: &[T], what: &str) -> EngineResult<()> {
    if items.is_empty() {
        return Err(EngineError::bad_parameter(format!("{} is empty", what)));
    }
    Ok(())
}

/// `field=value` pairs naming a key, fields repeated for value groups
fn describe<S: AsRef<str>>(fields: &[S], values: &[SqlValue]) -> String {
    let pairs: Vec<String> = fields
        .iter()
        .cycle()
        .zip(values)
        .map(|(f, v)| format!("{}={}", f.as_ref(), v))
        .collect();
    pairs.join(",")
}

fn present<T>(items: Vec<T>, presence: Presence, key: impl FnOnce() -> String) -> EngineResult<Vec<T>> {
    if items.is_empty() {
        return Err(EngineError::absent(presence, key()));
    }
    Ok(items)
}

fn same_key(a: &[SqlValue], b: &[SqlValue]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.loosely_equals(y))
}

/// Lifecycle operations for one record type
pub struct EntityService<R: Record> {
    repository: Repository<R>,
    hooks: Box<dyn LifecycleHooks<R>>,
}

impl<R: Record> EntityService<R> {
    pub fn new(repository: Repository<R>) -> Self {
        Self {
            repository,
            hooks: Box::new(NoopHooks),
        }
    }

    pub fn with_hooks(mut self, hooks: impl LifecycleHooks<R> + 'static) -> Self {
        self.hooks = Box::new(hooks);
        self
    }

    pub fn repository(&self) -> &Repository<R> {
        &self.repository
    }

    fn id_field(&self) -> &str {
        &self.repository.config().id_field
    }

    fn keys<S: AsRef<str>>(&self, explicit: &[S]) -> Vec<String> {
        self.repository.composer().keys(explicit, true)
    }

    /// Key values of `record` and a label naming them
    fn key_of(record: &R, keys: &[String]) -> EngineResult<(Vec<SqlValue>, String)> {
        let values = keys
            .iter()
            .map(|k| record.get(k))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| EngineError::bad_parameter(e.to_string()))?;
        let label = describe(keys, &values);
        Ok((values, label))
    }

    fn id_label(&self, id: &SqlValue) -> String {
        format!("{}={}", self.id_field(), id)
    }

    fn check_version(current: &R, incoming: &R, key: &str) -> EngineResult<()> {
        if let (Some(stored), Some(given)) = (current.auditable(), incoming.auditable()) {
            if !stored.same_version(given) {
                return Err(EngineError::RowVersionConflict { key: key.to_string() });
            }
        }
        Ok(())
    }

    fn require_audit(record: &R) -> EngineResult<()> {
        if record.auditable().is_none() {
            return Err(EngineError::bad_parameter(format!(
                "{} has no audit metadata to soft-delete",
                R::entity_name()
            )));
        }
        Ok(())
    }

    fn set_state(record: &mut R, state: ActiveState) {
        if let Some(audit) = record.auditable_mut() {
            audit.set_active(state);
        }
    }

    fn affected(count: u64) -> EngineResult<()> {
        if count == 0 {
            return Err(EngineError::no_row_affected());
        }
        Ok(())
    }

    fn observe<T>(&self, operation: &str, run: impl FnOnce() -> EngineResult<Outcome<T>>) -> EngineResult<Outcome<T>> {
        let result = run();
        match &result {
            Ok(outcome) => log_event(
                Event::LifecycleCompleted,
                &[
                    ("entity", R::entity_name()),
                    ("operation", operation),
                    ("outcome", outcome.name()),
                ],
            ),
            Err(e) => log_event(
                Event::LifecycleRejected,
                &[
                    ("entity", R::entity_name()),
                    ("operation", operation),
                    ("code", e.code()),
                ],
            ),
        }
        result
    }

    /// Whether the key holds nothing to check: every value null, or an
    /// identity id the store has not assigned yet.
    fn unassigned(&self, keys: &[String], values: &[SqlValue]) -> bool {
        if values.iter().all(SqlValue::is_null) {
            return true;
        }
        let config = self.repository.config();
        config.identity_mode == IdentityMode::IntegerIdentity
            && keys.len() == 1
            && keys[0] == config.id_field
            && matches!(values[0], SqlValue::Int(0))
    }

    /// Conflict when a row already holds the record's key. Skipped for
    /// unassigned keys.
    fn check_no_conflict(&self, record: &R, keys: &[String], combine: bool) -> EngineResult<Vec<SqlValue>> {
        let (values, label) = Self::key_of(record, keys)?;
        if self.unassigned(keys, &values) {
            return Ok(values);
        }
        if self.repository.count_values(&values, keys, combine, true)? > 0 {
            return Err(EngineError::Conflict { key: label });
        }
        Ok(values)
    }

    // Create

    /// Insert a record whose id is not taken
    pub fn create(&self, record: R) -> EngineResult<Outcome<R>> {
        self.create_keyed::<&str>(record, &[], false)
    }

    /// Insert a record unless a row matches it on `keys`
    pub fn create_keyed<S: AsRef<str>>(&self, mut record: R, keys: &[S], combine: bool) -> EngineResult<Outcome<R>> {
        self.observe("create", || {
            let keys = self.keys(keys);
            self.check_no_conflict(&record, &keys, combine)?;

            Self::set_state(&mut record, ActiveState::Active);
            self.hooks.before_create(&mut record)?;
            Self::affected(self.repository.insert(&record)?)?;
            self.hooks.after_create(&record);
            Ok(Outcome::Created(record))
        })
    }

    /// Insert every record or none
    pub fn create_many(&self, mut records: Vec<R>) -> EngineResult<Outcome<Vec<R>>> {
        self.observe("create_many", || {
            check_list(&records, "records")?;
            let keys = self.keys::<&str>(&[]);

            let mut seen: Vec<Vec<SqlValue>> = Vec::with_capacity(records.len());
            for record in &records {
                let values = self.check_no_conflict(record, &keys, false)?;
                if self.unassigned(&keys, &values) {
                    continue;
                }
                if seen.iter().any(|s| same_key(s, &values)) {
                    return Err(EngineError::Conflict {
                        key: describe(&keys, &values),
                    });
                }
                seen.push(values);
            }

            for record in records.iter_mut() {
                Self::set_state(record, ActiveState::Active);
                self.hooks.before_create(record)?;
            }
            Self::affected(self.repository.insert_many(&records)?)?;
            records.iter().for_each(|r| self.hooks.after_create(r));
            Ok(Outcome::Created(records))
        })
    }

    // Update

    /// Update the stored row with the record's id
    pub fn update(&self, record: R) -> EngineResult<Outcome<R>> {
        self.update_keyed::<&str>(record, &[], false, false)
    }

    /// Update the stored row matching the record on `keys`.
    ///
    /// A missing row is a `Conflict`, an unchanged record is `NoContent`,
    /// and an audited record whose timestamp disagrees with the stored one
    /// is a `RowVersionConflict`.
    pub fn update_keyed<S: AsRef<str>>(
        &self,
        mut record: R,
        keys: &[S],
        combine: bool,
        all: bool,
    ) -> EngineResult<Outcome<R>> {
        self.observe("update", || {
            let keys = self.keys(keys);
            let (values, label) = Self::key_of(&record, &keys)?;
            let current = self
                .repository
                .first_by_values(&values, &keys, combine, all)?
                .ok_or_else(|| EngineError::Conflict { key: label.clone() })?;

            if current == record {
                return Ok(Outcome::NoContent);
            }
            Self::check_version(&current, &record, &label)?;

            self.hooks.before_update(&mut record)?;
            Self::affected(self.repository.update(&record, &keys, combine)?)?;
            self.hooks.after_update(&record);
            Ok(Outcome::Updated(record))
        })
    }

    /// Update every changed record or none. Unchanged records are skipped;
    /// when nothing changed the outcome is `NoContent`.
    pub fn update_many(&self, records: Vec<R>) -> EngineResult<Outcome<Vec<R>>> {
        self.observe("update_many", || {
            check_list(&records, "records")?;
            let keys = self.keys::<&str>(&[]);

            let mut changed = Vec::with_capacity(records.len());
            for record in records {
                let (values, label) = Self::key_of(&record, &keys)?;
                let current = self
                    .repository
                    .first_by_values(&values, &keys, false, false)?
                    .ok_or_else(|| EngineError::Conflict { key: label.clone() })?;
                if current == record {
                    continue;
                }
                Self::check_version(&current, &record, &label)?;
                changed.push(record);
            }

            if changed.is_empty() {
                return Ok(Outcome::NoContent);
            }
            for record in changed.iter_mut() {
                self.hooks.before_update(record)?;
            }
            Self::affected(self.repository.update_many(&changed, &keys, false)?)?;
            changed.iter().for_each(|r| self.hooks.after_update(r));
            Ok(Outcome::Updated(changed))
        })
    }

    // Soft delete

    fn finish_soft_delete<S: AsRef<str>>(&self, mut record: R, keys: &[S], combine: bool) -> EngineResult<Outcome<R>> {
        Self::set_state(&mut record, ActiveState::Inactive);
        self.hooks.before_delete(&mut record)?;
        Self::affected(self.repository.update(&record, keys, combine)?)?;
        self.hooks.after_delete(&record);
        Ok(Outcome::Deleted(record))
    }

    /// Mark an active record inactive, after checking its row version
    pub fn soft_delete(&self, record: R) -> EngineResult<Outcome<R>> {
        self.observe("soft_delete", || {
            Self::require_audit(&record)?;
            let keys = self.keys::<&str>(&[]);
            let (values, label) = Self::key_of(&record, &keys)?;
            let current = self
                .repository
                .first_by_values(&values, &keys, false, false)?
                .ok_or(EngineError::NotFound { key: label.clone() })?;
            Self::check_version(&current, &record, &label)?;
            self.finish_soft_delete(record, &keys, false)
        })
    }

    /// Mark the active stored row with this id inactive
    pub fn soft_delete_id(&self, id: SqlValue) -> EngineResult<Outcome<R>> {
        self.observe("soft_delete_id", || {
            check_value(&id, "id")?;
            let label = self.id_label(&id);
            let current = self
                .repository
                .find(id, false)?
                .ok_or(EngineError::NotFound { key: label })?;
            Self::require_audit(&current)?;
            self.finish_soft_delete::<&str>(current, &[], false)
        })
    }

    /// Mark the first stored row matching the value groups inactive
    pub fn soft_delete_by<S: AsRef<str>>(
        &self,
        values: &[SqlValue],
        fields: &[S],
        combine: bool,
        all: bool,
    ) -> EngineResult<Outcome<R>> {
        self.observe("soft_delete_by", || {
            check_list(values, "values")?;
            check_list(fields, "fields")?;
            let current = self
                .repository
                .first_by_values(values, fields, combine, all)?
                .ok_or_else(|| EngineError::NotFound {
                    key: describe(fields, values),
                })?;
            Self::require_audit(&current)?;
            self.finish_soft_delete(current, fields, combine)
        })
    }

    /// Soft-delete every record or none
    pub fn soft_delete_many(&self, mut records: Vec<R>) -> EngineResult<Outcome<Vec<R>>> {
        self.observe("soft_delete_many", || {
            check_list(&records, "records")?;
            let keys = self.keys::<&str>(&[]);

            for record in &records {
                Self::require_audit(record)?;
                let (values, label) = Self::key_of(record, &keys)?;
                let current = self
                    .repository
                    .first_by_values(&values, &keys, false, false)?
                    .ok_or(EngineError::NotFound { key: label.clone() })?;
                Self::check_version(&current, record, &label)?;
            }

            for record in records.iter_mut() {
                Self::set_state(record, ActiveState::Inactive);
                self.hooks.before_delete(record)?;
            }
            Self::affected(self.repository.update_many(&records, &keys, false)?)?;
            records.iter().for_each(|r| self.hooks.after_delete(r));
            Ok(Outcome::Deleted(records))
        })
    }

    // Hard delete

    fn finish_hard_delete<S: AsRef<str>>(&self, mut record: R, keys: &[S], combine: bool) -> EngineResult<Outcome<R>> {
        self.hooks.before_delete(&mut record)?;
        Self::affected(self.repository.delete(&record, keys, combine)?)?;
        self.hooks.after_delete(&record);
        Ok(Outcome::NoContent)
    }

    /// Remove the stored row. Audited records are version-checked against
    /// the stored row first, soft-deleted or not.
    pub fn hard_delete(&self, record: R) -> EngineResult<Outcome<R>> {
        self.observe("hard_delete", || {
            let keys = self.keys::<&str>(&[]);
            if record.auditable().is_some() {
                let (values, label) = Self::key_of(&record, &keys)?;
                let current = self
                    .repository
                    .first_by_values(&values, &keys, false, true)?
                    .ok_or(EngineError::NotFound { key: label.clone() })?;
                Self::check_version(&current, &record, &label)?;
            }
            self.finish_hard_delete(record, &keys, false)
        })
    }

    /// Remove the stored row with this id
    pub fn hard_delete_id(&self, id: SqlValue) -> EngineResult<Outcome<R>> {
        self.observe("hard_delete_id", || {
            check_value(&id, "id")?;
            let label = self.id_label(&id);
            let current = self
                .repository
                .find(id, true)?
                .ok_or(EngineError::NotFound { key: label })?;
            self.finish_hard_delete::<&str>(current, &[], false)
        })
    }

    /// Remove the first stored row matching the value groups
    pub fn hard_delete_by<S: AsRef<str>>(
        &self,
        values: &[SqlValue],
        fields: &[S],
        combine: bool,
        all: bool,
    ) -> EngineResult<Outcome<R>> {
        self.observe("hard_delete_by", || {
            check_list(values, "values")?;
            check_list(fields, "fields")?;
            let current = self
                .repository
                .first_by_values(values, fields, combine, all)?
                .ok_or_else(|| EngineError::NotFound {
                    key: describe(fields, values),
                })?;
            self.finish_hard_delete(current, fields, combine)
        })
    }

    /// Remove every row whose id is listed. Runs no hooks and writes no
    /// history.
    pub fn hard_delete_ids(&self, ids: &[SqlValue]) -> EngineResult<Outcome<R>> {
        self.observe("hard_delete_ids", || {
            check_list(ids, "ids")?;
            ids.iter().try_for_each(|id| check_value(id, "id"))?;
            Self::affected(self.repository.delete_ids(ids)?)?;
            Ok(Outcome::NoContent)
        })
    }

    /// Hard-delete every record or none
    pub fn hard_delete_many(&self, mut records: Vec<R>) -> EngineResult<Outcome<Vec<R>>> {
        self.observe("hard_delete_many", || {
            check_list(&records, "records")?;
            let keys = self.keys::<&str>(&[]);

            for record in records.iter().filter(|r| r.auditable().is_some()) {
                let (values, label) = Self::key_of(record, &keys)?;
                let current = self
                    .repository
                    .first_by_values(&values, &keys, false, true)?
                    .ok_or(EngineError::NotFound { key: label.clone() })?;
                Self::check_version(&current, record, &label)?;
            }

            for record in records.iter_mut() {
                self.hooks.before_delete(record)?;
            }
            Self::affected(self.repository.delete_many(&records)?)?;
            records.iter().for_each(|r| self.hooks.after_delete(r));
            Ok(Outcome::NoContent)
        })
    }

    // Reads

    pub fn get_all(&self, all: bool) -> EngineResult<Vec<R>> {
        present(self.repository.all(all)?, Presence::Optional, String::new)
    }

    /// The record with this id; `NotFound` when there is none
    pub fn get(&self, id: SqlValue, all: bool) -> EngineResult<R> {
        check_value(&id, "id")?;
        let label = self.id_label(&id);
        self.repository
            .find(id, all)?
            .ok_or(EngineError::NotFound { key: label })
    }

    pub fn get_many(&self, ids: &[SqlValue], all: bool) -> EngineResult<Vec<R>> {
        check_list(ids, "ids")?;
        let id_field = self.id_field().to_string();
        let found = self.repository.where_in(&id_field, ids, false, all)?;
        present(found, Presence::Optional, || describe(&[id_field.as_str()], ids))
    }

    pub fn get_where(&self, field: &str, value: SqlValue, case_insensitive: bool, all: bool) -> EngineResult<Vec<R>> {
        check_value(&value, field)?;
        let key = format!("{}={}", field, value);
        present(
            self.repository.where_equals(field, value, case_insensitive, all)?,
            Presence::Optional,
            || key,
        )
    }

    /// Records whose `field` holds exactly this instant
    pub fn get_at(&self, field: &str, timestamp: DateTime<Utc>, all: bool) -> EngineResult<Vec<R>> {
        self.get_where(field, SqlValue::Timestamp(timestamp), false, all)
    }

    pub fn get_in(&self, field: &str, values: &[SqlValue], case_insensitive: bool, all: bool) -> EngineResult<Vec<R>> {
        check_list(values, "values")?;
        present(
            self.repository.where_in(field, values, case_insensitive, all)?,
            Presence::Optional,
            || describe(&[field], values),
        )
    }

    pub fn get_not(&self, field: &str, value: SqlValue, case_insensitive: bool, all: bool) -> EngineResult<Vec<R>> {
        check_value(&value, field)?;
        present(
            self.repository.where_not(field, value, case_insensitive, all)?,
            Presence::Optional,
            String::new,
        )
    }

    pub fn get_like(&self, field: &str, value: &str, case_insensitive: bool, all: bool) -> EngineResult<Vec<R>> {
        check_value(&SqlValue::from(value), field)?;
        present(
            self.repository.where_like(field, value, case_insensitive, all)?,
            Presence::Optional,
            String::new,
        )
    }

    pub fn get_null(&self, field: &str, all: bool) -> EngineResult<Vec<R>> {
        present(self.repository.where_null(field, all)?, Presence::Optional, String::new)
    }

    /// First record, in configured order, whose `field` equals `value`
    pub fn get_first(&self, field: &str, value: SqlValue, case_insensitive: bool, all: bool) -> EngineResult<R> {
        check_value(&value, field)?;
        self.repository
            .first_where(field, value, case_insensitive, all)?
            .ok_or(EngineError::NoContent)
    }

    pub fn get_by_values<S: AsRef<str>>(
        &self,
        values: &[SqlValue],
        fields: &[S],
        combine: bool,
        all: bool,
    ) -> EngineResult<Vec<R>> {
        check_list(values, "values")?;
        check_list(fields, "fields")?;
        present(
            self.repository.by_values(values, fields, combine, all)?,
            Presence::Optional,
            || describe(fields, values),
        )
    }

    /// Records with this id that also match the value groups
    pub fn get_related<S: AsRef<str>>(
        &self,
        id: SqlValue,
        values: &[SqlValue],
        fields: &[S],
        combine: bool,
        all: bool,
    ) -> EngineResult<Vec<R>> {
        check_value(&id, "id")?;
        check_list(values, "values")?;
        check_list(fields, "fields")?;
        present(
            self.repository.related(id, values, fields, combine, all)?,
            Presence::Optional,
            String::new,
        )
    }

    /// Whether exactly `amount` rows match the value groups
    pub fn exists<S: AsRef<str>>(
        &self,
        values: &[SqlValue],
        fields: &[S],
        amount: u64,
        combine: bool,
        all: bool,
    ) -> EngineResult<bool> {
        check_list(values, "values")?;
        check_list(fields, "fields")?;
        self.repository.exists_values(values, fields, amount, combine, all)
    }

    /// Whether exactly `amount` rows have `field` equal to `value`
    pub fn exists_by(&self, field: &str, value: SqlValue, amount: u64, all: bool) -> EngineResult<bool> {
        check_value(&value, field)?;
        self.repository.exists(field, value, amount, all)
    }

    /// Whether exactly `amount` rows have the id or match the value groups
    pub fn exists_related<S: AsRef<str>>(
        &self,
        id: SqlValue,
        values: &[SqlValue],
        fields: &[S],
        amount: u64,
        combine: bool,
        all: bool,
    ) -> EngineResult<bool> {
        check_value(&id, "id")?;
        check_list(values, "values")?;
        check_list(fields, "fields")?;
        self.repository
            .exists_related(id, values, fields, amount, combine, all)
    }

    /// Last identity generated for the table; `NoContent` when none
    pub fn current_identity(&self) -> EngineResult<i64> {
        self.repository.current_identity()?.ok_or(EngineError::NoContent)
    }

    // History

    /// One history row by its history id; `NotFound` when there is none
    pub fn history_entry(&self, history_id: SqlValue, all: bool) -> EngineResult<R> {
        check_value(&history_id, "history id")?;
        let label = format!("{}={}", self.repository.config().history_id_field, history_id);
        self.repository
            .history_entry(history_id, all)?
            .ok_or(EngineError::NotFound { key: label })
    }

    /// History of one record, newest first under the default ordering.
    /// `NotFound` when the record has no history.
    pub fn history(&self, id: SqlValue, all: bool) -> EngineResult<Vec<R>> {
        check_value(&id, "id")?;
        let label = self.id_label(&id);
        present(self.repository.history_for(id, all)?, Presence::Required, || label)
    }

    pub fn history_where(&self, field: &str, value: SqlValue, case_insensitive: bool) -> EngineResult<Vec<R>> {
        check_value(&value, field)?;
        present(
            self.repository.history_where(field, value, case_insensitive)?,
            Presence::Optional,
            String::new,
        )
    }

    pub fn history_by_values<S: AsRef<str>>(&self, values: &[SqlValue], fields: &[S], combine: bool) -> EngineResult<Vec<R>> {
        check_list(values, "values")?;
        check_list(fields, "fields")?;
        present(
            self.repository.history_by_values(values, fields, combine)?,
            Presence::Optional,
            String::new,
        )
    }
}
