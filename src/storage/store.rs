//! Store boundary
//!
//! A `Store` executes composed statements. Implementations may send
//! `Statement::sql()` and its parameters over a wire protocol or interpret
//! the structured statement directly, as `InMemoryStore` does.

use super::cancel::CancelSignal;
use super::errors::StoreResult;
use crate::compose::Statement;
use crate::value::SqlValue;

/// One result row, columns in projection order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<(String, SqlValue)>,
}

impl Row {
    pub fn new(columns: Vec<(String, SqlValue)>) -> Self {
        Self { columns }
    }

    /// Column value by name; exact match first, then case-insensitive
    pub fn get(&self, name: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .or_else(|| self.columns.iter().find(|(n, _)| n.eq_ignore_ascii_case(name)))
            .map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.columns.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Capability to execute statements
pub trait Store: Send + Sync {
    /// Rows produced by a select
    fn query(&self, statement: &Statement, signal: &CancelSignal) -> StoreResult<Vec<Row>>;

    /// First row produced by a select, if any
    fn query_single(&self, statement: &Statement, signal: &CancelSignal) -> StoreResult<Option<Row>> {
        Ok(self.query(statement, signal)?.into_iter().next())
    }

    /// Single value produced by a count or identity lookup
    fn execute_scalar(&self, statement: &Statement, signal: &CancelSignal) -> StoreResult<SqlValue>;

    /// Affected row count of a write
    fn execute(&self, statement: &Statement, signal: &CancelSignal) -> StoreResult<u64>;

    /// Open a transaction. Dropping it without `commit` rolls it back.
    fn begin(&self) -> StoreResult<Box<dyn StoreTransaction + '_>>;
}

/// An open transaction
pub trait StoreTransaction {
    fn execute(&mut self, statement: &Statement, signal: &CancelSignal) -> StoreResult<u64>;

    fn commit(self: Box<Self>) -> StoreResult<()>;

    fn rollback(self: Box<Self>) -> StoreResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_lookup_falls_back_to_case_insensitive() {
        let row = Row::new(vec![
            ("Name".to_string(), SqlValue::from("exact")),
            ("id".to_string(), SqlValue::Int(1)),
        ]);
        assert_eq!(row.get("Name"), Some(&SqlValue::from("exact")));
        assert_eq!(row.get("ID"), Some(&SqlValue::Int(1)));
        assert_eq!(row.get("missing"), None);
        assert_eq!(row.len(), 2);
    }
}
