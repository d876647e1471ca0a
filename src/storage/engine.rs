//! Storage engine
//!
//! Runs composed statements against a `Store`. Reads return rows, a single
//! row or a scalar; writes return the affected count of the primary
//! statement. A write with a history statement runs both in one
//! transaction. A batch runs every write in one transaction and commits
//! only if each primary statement changed at least one row.

use std::sync::Arc;

use super::cancel::CancelSignal;
use super::errors::{StoreError, StoreResult};
use super::store::{Row, Store, StoreTransaction};
use crate::compose::Statement;
use crate::observability::{log_event, Event};
use crate::value::SqlValue;

/// A primary write and the history insert mirroring it
#[derive(Debug, Clone, PartialEq)]
pub struct WriteSet {
    pub primary: Statement,
    pub history: Option<Statement>,
}

impl WriteSet {
    pub fn new(primary: Statement, history: Option<Statement>) -> Self {
        Self { primary, history }
    }
}

fn trace(statement: &Statement, outcome: &str) {
    log_event(
        Event::StatementExecuted,
        &[
            ("kind", statement.kind.as_str()),
            ("table", &statement.table),
            ("params", &statement.params.len().to_string()),
            ("outcome", outcome),
        ],
    );
}

fn report_failure(statement: &Statement, err: &StoreError) {
    if err.is_cancellation() {
        trace(statement, "cancelled");
    } else {
        log_event(
            Event::StatementFailed,
            &[
                ("kind", statement.kind.as_str()),
                ("table", &statement.table),
                ("code", err.code()),
                ("error", &err.to_string()),
            ],
        );
    }
}

fn discard(tx: Box<dyn StoreTransaction + '_>) {
    if let Err(e) = tx.rollback() {
        log_event(Event::StatementFailed, &[("code", e.code()), ("error", &e.to_string())]);
    }
}

/// Executes statements against a shared store
#[derive(Clone)]
pub struct StorageEngine {
    store: Arc<dyn Store>,
}

impl StorageEngine {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    fn observe<T>(statement: &Statement, result: StoreResult<T>) -> StoreResult<T> {
        match &result {
            Ok(_) => trace(statement, "ok"),
            Err(e) => report_failure(statement, e),
        }
        result
    }

    pub fn rows(&self, statement: &Statement, signal: &CancelSignal) -> StoreResult<Vec<Row>> {
        signal.check()?;
        Self::observe(statement, self.store.query(statement, signal))
    }

    pub fn single(&self, statement: &Statement, signal: &CancelSignal) -> StoreResult<Option<Row>> {
        signal.check()?;
        Self::observe(statement, self.store.query_single(statement, signal))
    }

    pub fn scalar(&self, statement: &Statement, signal: &CancelSignal) -> StoreResult<SqlValue> {
        signal.check()?;
        Self::observe(statement, self.store.execute_scalar(statement, signal))
    }

    /// Affected count of a single statement, no transaction
    pub fn execute(&self, statement: &Statement, signal: &CancelSignal) -> StoreResult<u64> {
        signal.check()?;
        Self::observe(statement, self.store.execute(statement, signal))
    }

    fn execute_in(tx: &mut Box<dyn StoreTransaction + '_>, statement: &Statement, signal: &CancelSignal) -> StoreResult<u64> {
        signal.check()?;
        Self::observe(statement, tx.execute(statement, signal))
    }

    /// Run one write. With a history statement both run in one transaction;
    /// a primary that changes nothing rolls back and reports 0.
    pub fn write(&self, set: &WriteSet, signal: &CancelSignal) -> StoreResult<u64> {
        let Some(history) = &set.history else {
            return self.execute(&set.primary, signal);
        };

        signal.check()?;
        let mut tx = self.store.begin()?;

        let affected = match Self::execute_in(&mut tx, &set.primary, signal) {
            Ok(0) => {
                discard(tx);
                return Ok(0);
            }
            Ok(n) => n,
            Err(e) => {
                discard(tx);
                return Err(e);
            }
        };

        if let Err(e) = Self::execute_in(&mut tx, history, signal) {
            discard(tx);
            return Err(e);
        }

        tx.commit()?;
        log_event(Event::WriteCommitted, &[("table", &set.primary.table)]);
        Ok(affected)
    }

    /// Run every write in one transaction. Any failure, or a primary that
    /// changes nothing, rolls the whole batch back and names the item.
    pub fn write_many(&self, sets: &[WriteSet], signal: &CancelSignal) -> StoreResult<u64> {
        let Some(first) = sets.first() else {
            return Ok(0);
        };
        let table = first.primary.table.clone();

        signal.check()?;
        let mut tx = self.store.begin()?;
        let mut total = 0u64;

        for (index, set) in sets.iter().enumerate() {
            let outcome = Self::execute_in(&mut tx, &set.primary, signal).and_then(|affected| {
                if affected == 0 {
                    return Err(StoreError::ZeroAffected { index });
                }
                if let Some(history) = &set.history {
                    Self::execute_in(&mut tx, history, signal)?;
                }
                Ok(affected)
            });

            match outcome {
                Ok(affected) => total += affected,
                Err(e) => {
                    discard(tx);
                    let err = match e {
                        StoreError::ZeroAffected { .. } => e,
                        other => StoreError::BatchAborted {
                            index,
                            source: Box::new(other),
                        },
                    };
                    log_event(
                        Event::BatchRolledBack,
                        &[
                            ("table", &table),
                            ("index", &index.to_string()),
                            ("items", &sets.len().to_string()),
                            ("code", err.code()),
                        ],
                    );
                    return Err(err);
                }
            }
        }

        tx.commit()
            .map_err(|e| StoreError::Transaction(format!("commit failed: {}", e)))?;
        log_event(
            Event::BatchCommitted,
            &[("table", &table), ("items", &sets.len().to_string())],
        );
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::{BindStyle, RecordShape, StatementComposer};
    use crate::config::{IdentityMode, TableConfig};
    use crate::storage::memory::InMemoryStore;

    fn values(id: i64, name: &str) -> Vec<(String, SqlValue)> {
        vec![
            ("id".to_string(), SqlValue::Int(id)),
            ("name".to_string(), SqlValue::from(name)),
        ]
    }

    fn setup() -> (TableConfig, RecordShape, Arc<InMemoryStore>) {
        (
            TableConfig::with_identity_mode(IdentityMode::GuidKeyed),
            RecordShape::new("Person", ["id", "name"]),
            Arc::new(InMemoryStore::new().with_unique("dbo.[Person]", &["id"])),
        )
    }

    fn insert_set(composer: &StatementComposer<'_>, id: i64, name: &str) -> WriteSet {
        WriteSet::new(
            composer.insert::<&str>(&values(id, name), &[]).unwrap(),
            composer.history_mirror().mirror(&values(id, name), true).unwrap(),
        )
    }

    #[test]
    fn test_write_with_history_is_atomic() {
        let (config, shape, store) = setup();
        let composer = StatementComposer::new(&config, &shape, BindStyle::Parameters);
        let engine = StorageEngine::new(store.clone());
        let signal = CancelSignal::new();

        assert_eq!(engine.write(&insert_set(&composer, 1, "a"), &signal).unwrap(), 1);
        assert_eq!(store.row_count("dbo.[Person]").unwrap(), 1);
        assert_eq!(store.row_count("dbo.[PersonHist]").unwrap(), 1);

        // duplicate primary fails, history must not be written
        assert!(engine.write(&insert_set(&composer, 1, "b"), &signal).is_err());
        assert_eq!(store.row_count("dbo.[PersonHist]").unwrap(), 1);
    }

    #[test]
    fn test_zero_affected_update_writes_no_history() {
        let (config, shape, store) = setup();
        let composer = StatementComposer::new(&config, &shape, BindStyle::Parameters);
        let engine = StorageEngine::new(store.clone());
        let signal = CancelSignal::new();

        let update = WriteSet::new(
            composer.update::<&str>(&values(9, "x"), &[], false).unwrap(),
            composer.history_mirror().mirror(&values(9, "x"), false).unwrap(),
        );
        assert_eq!(engine.write(&update, &signal).unwrap(), 0);
        assert_eq!(store.row_count("dbo.[PersonHist]").unwrap(), 0);
    }

    #[test]
    fn test_batch_rolls_back_and_keeps_cause() {
        let (config, shape, store) = setup();
        let composer = StatementComposer::new(&config, &shape, BindStyle::Parameters);
        let engine = StorageEngine::new(store.clone());
        let signal = CancelSignal::new();

        let sets = vec![
            insert_set(&composer, 1, "a"),
            insert_set(&composer, 2, "b"),
            insert_set(&composer, 1, "dup"),
        ];
        let err = engine.write_many(&sets, &signal).unwrap_err();
        assert_eq!(err.batch_index(), Some(2));
        assert!(matches!(
            err,
            StoreError::BatchAborted { ref source, .. } if matches!(**source, StoreError::ConstraintViolation { .. })
        ));
        assert_eq!(store.row_count("dbo.[Person]").unwrap(), 0);
        assert_eq!(store.row_count("dbo.[PersonHist]").unwrap(), 0);

        assert_eq!(engine.write_many(&sets[..2], &signal).unwrap(), 2);
        assert_eq!(store.row_count("dbo.[PersonHist]").unwrap(), 2);
    }

    #[test]
    fn test_batch_zero_affected_item_rolls_back() {
        let (config, shape, store) = setup();
        let composer = StatementComposer::new(&config, &shape, BindStyle::Parameters);
        let engine = StorageEngine::new(store.clone());
        let signal = CancelSignal::new();

        let sets = vec![
            insert_set(&composer, 1, "a"),
            WriteSet::new(composer.delete::<&str>(&values(5, "none"), &[], false).unwrap(), None),
        ];
        assert_eq!(
            engine.write_many(&sets, &signal),
            Err(StoreError::ZeroAffected { index: 1 })
        );
        assert_eq!(store.row_count("dbo.[Person]").unwrap(), 0);
    }

    #[test]
    fn test_cancelled_before_any_statement() {
        let (config, shape, store) = setup();
        let composer = StatementComposer::new(&config, &shape, BindStyle::Parameters);
        let engine = StorageEngine::new(store.clone());
        let signal = CancelSignal::new();
        signal.cancel();

        let sets = vec![insert_set(&composer, 1, "a")];
        assert_eq!(engine.write_many(&sets, &signal), Err(StoreError::Cancelled));
        assert_eq!(store.row_count("dbo.[Person]").unwrap(), 0);
    }
}
