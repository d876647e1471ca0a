//! In-memory store
//!
//! Interprets composed statements against tables held in memory. Intended
//! for tests and embedding. Supports:
//! - structured filters, plus configured raw predicates of the form
//!   `col = literal [and col <> literal ...]`
//! - ordering clauses of the form `col [asc|desc], ...`
//! - generated identities per table and `@@IDENTITY` for the last one
//! - uniqueness constraints registered with `with_unique`
//!
//! A transaction holds the store lock and works on a staged copy of the
//! tables; commit swaps the copy in, drop discards it.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, OnceLock};

use regex::Regex;

use super::cancel::CancelSignal;
use super::errors::{StoreError, StoreResult};
use super::store::{Row, Store, StoreTransaction};
use crate::compose::{CompareOp, Operand, Params, Predicate, Statement, StatementKind, ValueSource};
use crate::value::SqlValue;

type StoredRow = Vec<(String, SqlValue)>;

fn column<'r>(row: &'r StoredRow, name: &str) -> &'r SqlValue {
    const NULL: &SqlValue = &SqlValue::Null;
    row.iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, v)| v)
        .unwrap_or(NULL)
}

fn set_column(row: &mut StoredRow, name: &str, value: SqlValue) {
    match row.iter_mut().find(|(n, _)| n.eq_ignore_ascii_case(name)) {
        Some(entry) => entry.1 = value,
        None => row.push((name.to_string(), value)),
    }
}

#[derive(Debug, Clone, Default)]
struct Table {
    rows: Vec<StoredRow>,
    /// Last generated identity, 0 when none was generated yet
    identity: i64,
}

#[derive(Debug, Clone, Default)]
struct Tables {
    tables: HashMap<String, Table>,
    unique: HashMap<String, Vec<Vec<String>>>,
    last_identity: Option<i64>,
}

/// Store keeping every table in memory
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject inserts and updates that would make two rows of `table` agree
    /// on every one of `columns`
    pub fn with_unique(self, table: &str, columns: &[&str]) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state
                .unique
                .entry(table.to_string())
                .or_default()
                .push(columns.iter().map(|c| c.to_string()).collect());
        }
        self
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Tables>> {
        self.state
            .lock()
            .map_err(|e| StoreError::Unavailable(format!("store lock poisoned: {}", e)))
    }

    /// Every stored row of a table, all columns
    pub fn rows(&self, table: &str) -> StoreResult<Vec<Row>> {
        let state = self.lock()?;
        Ok(state
            .tables
            .get(table)
            .map(|t| t.rows.iter().map(|r| Row::new(r.clone())).collect())
            .unwrap_or_default())
    }

    pub fn row_count(&self, table: &str) -> StoreResult<usize> {
        let state = self.lock()?;
        Ok(state.tables.get(table).map(|t| t.rows.len()).unwrap_or(0))
    }
}

impl Store for InMemoryStore {
    fn query(&self, statement: &Statement, signal: &CancelSignal) -> StoreResult<Vec<Row>> {
        signal.check()?;
        let state = self.lock()?;
        select(&state, statement)
    }

    fn execute_scalar(&self, statement: &Statement, signal: &CancelSignal) -> StoreResult<SqlValue> {
        signal.check()?;
        let state = self.lock()?;
        scalar(&state, statement)
    }

    fn execute(&self, statement: &Statement, signal: &CancelSignal) -> StoreResult<u64> {
        signal.check()?;
        let mut state = self.lock()?;
        apply(&mut state, statement)
    }

    fn begin(&self) -> StoreResult<Box<dyn StoreTransaction + '_>> {
        let guard = self.lock()?;
        let staged = guard.clone();
        Ok(Box::new(MemoryTransaction { guard, staged }))
    }
}

struct MemoryTransaction<'a> {
    guard: MutexGuard<'a, Tables>,
    staged: Tables,
}

impl StoreTransaction for MemoryTransaction<'_> {
    fn execute(&mut self, statement: &Statement, signal: &CancelSignal) -> StoreResult<u64> {
        signal.check()?;
        apply(&mut self.staged, statement)
    }

    fn commit(self: Box<Self>) -> StoreResult<()> {
        let MemoryTransaction { mut guard, staged } = *self;
        *guard = staged;
        Ok(())
    }

    fn rollback(self: Box<Self>) -> StoreResult<()> {
        Ok(())
    }
}

fn select(state: &Tables, statement: &Statement) -> StoreResult<Vec<Row>> {
    let limit = match statement.kind {
        StatementKind::Select => usize::MAX,
        StatementKind::SelectTop1 => 1,
        other => {
            return Err(StoreError::Unsupported(format!(
                "{} is not a row query",
                other.as_str()
            )))
        }
    };

    let mut matched = Vec::new();
    if let Some(table) = state.tables.get(&statement.table) {
        for row in &table.rows {
            if matches(row, &statement.filter, &statement.params)? {
                matched.push(row);
            }
        }
    }

    if let Some(order) = &statement.order_by {
        let keys = parse_order(order)?;
        matched.sort_by(|a, b| {
            for (col, descending) in &keys {
                let ordering = column(a, col).compare(column(b, col));
                let ordering = if *descending { ordering.reverse() } else { ordering };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });
    }

    Ok(matched
        .into_iter()
        .take(limit)
        .map(|row| {
            Row::new(
                statement
                    .columns
                    .iter()
                    .map(|c| (c.clone(), column(row, c).clone()))
                    .collect(),
            )
        })
        .collect())
}

fn scalar(state: &Tables, statement: &Statement) -> StoreResult<SqlValue> {
    match statement.kind {
        StatementKind::Count => {
            let mut count = 0i64;
            if let Some(table) = state.tables.get(&statement.table) {
                for row in &table.rows {
                    if matches(row, &statement.filter, &statement.params)? {
                        count += 1;
                    }
                }
            }
            Ok(SqlValue::Int(count))
        }
        StatementKind::CurrentIdentity => Ok(state
            .tables
            .get(&statement.table)
            .filter(|t| t.identity > 0)
            .map(|t| SqlValue::Int(t.identity))
            .unwrap_or(SqlValue::Null)),
        other => Err(StoreError::Unsupported(format!(
            "{} is not a scalar query",
            other.as_str()
        ))),
    }
}

fn apply(state: &mut Tables, statement: &Statement) -> StoreResult<u64> {
    match statement.kind {
        StatementKind::Insert | StatementKind::HistoryInsert => insert(state, statement),
        StatementKind::Update => update(state, statement),
        StatementKind::Delete => delete(state, statement),
        other => Err(StoreError::Unsupported(format!("{} is not a write", other.as_str()))),
    }
}

fn source_value(state: &Tables, source: &ValueSource, params: &Params) -> StoreResult<SqlValue> {
    match source {
        ValueSource::Param(name) => params
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::MissingParameter(name.clone())),
        ValueSource::Literal(value) => Ok(value.clone()),
        ValueSource::StoreIdentity => state
            .last_identity
            .map(SqlValue::Int)
            .ok_or_else(|| StoreError::Rejected("no identity generated yet".to_string())),
    }
}

fn check_unique(state: &Tables, table: &str, candidate: &StoredRow, skip: Option<usize>) -> StoreResult<()> {
    let Some(constraints) = state.unique.get(table) else {
        return Ok(());
    };
    let rows = state.tables.get(table).map(|t| t.rows.as_slice()).unwrap_or(&[]);

    for columns in constraints {
        let clash = rows.iter().enumerate().any(|(i, row)| {
            Some(i) != skip
                && columns
                    .iter()
                    .all(|c| column(row, c).loosely_equals(column(candidate, c)))
        });
        if clash {
            return Err(StoreError::ConstraintViolation {
                table: table.to_string(),
                detail: format!("duplicate value for ({})", columns.join(",")),
            });
        }
    }
    Ok(())
}

fn insert(state: &mut Tables, statement: &Statement) -> StoreResult<u64> {
    let mut row: StoredRow = Vec::with_capacity(statement.columns.len() + 1);
    for (col, source) in statement.columns.iter().zip(&statement.values) {
        row.push((col.clone(), source_value(state, source, &statement.params)?));
    }

    let mut generated = None;
    if let Some(identity_column) = &statement.identity_column {
        let next = state.tables.get(&statement.table).map(|t| t.identity).unwrap_or(0) + 1;
        set_column(&mut row, identity_column, SqlValue::Int(next));
        generated = Some(next);
    }

    check_unique(state, &statement.table, &row, None)?;

    let table = state.tables.entry(statement.table.clone()).or_default();
    if let Some(id) = generated {
        table.identity = id;
        state.last_identity = Some(id);
    }
    table.rows.push(row);
    Ok(1)
}

fn update(state: &mut Tables, statement: &Statement) -> StoreResult<u64> {
    let mut assignments = Vec::with_capacity(statement.columns.len());
    for (col, source) in statement.columns.iter().zip(&statement.values) {
        assignments.push((col.clone(), source_value(state, source, &statement.params)?));
    }

    let targets: Vec<usize> = match state.tables.get(&statement.table) {
        Some(table) => {
            let mut targets = Vec::new();
            for (i, row) in table.rows.iter().enumerate() {
                if matches(row, &statement.filter, &statement.params)? {
                    targets.push(i);
                }
            }
            targets
        }
        None => return Ok(0),
    };

    for &i in &targets {
        let mut updated = state.tables[&statement.table].rows[i].clone();
        for (col, value) in &assignments {
            set_column(&mut updated, col, value.clone());
        }
        check_unique(state, &statement.table, &updated, Some(i))?;
        if let Some(table) = state.tables.get_mut(&statement.table) {
            table.rows[i] = updated;
        }
    }
    Ok(targets.len() as u64)
}

fn delete(state: &mut Tables, statement: &Statement) -> StoreResult<u64> {
    let Some(table) = state.tables.get_mut(&statement.table) else {
        return Ok(0);
    };

    let mut kept = Vec::with_capacity(table.rows.len());
    let mut removed = 0u64;
    for row in table.rows.drain(..) {
        if matches(&row, &statement.filter, &statement.params)? {
            removed += 1;
        } else {
            kept.push(row);
        }
    }
    table.rows = kept;
    Ok(removed)
}

fn matches(row: &StoredRow, filter: &[Predicate], params: &Params) -> StoreResult<bool> {
    for predicate in filter {
        if !eval(row, predicate, params)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn operand_value(operand: &Operand, params: &Params) -> StoreResult<SqlValue> {
    match operand {
        Operand::Param(name) => params
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::MissingParameter(name.clone())),
        Operand::Literal(value) => Ok(value.clone()),
    }
}

fn fold(value: &SqlValue, case_insensitive: bool) -> SqlValue {
    if case_insensitive {
        value.to_lowercase()
    } else {
        value.clone()
    }
}

fn eval(row: &StoredRow, predicate: &Predicate, params: &Params) -> StoreResult<bool> {
    match predicate {
        Predicate::Raw(text) => {
            for (col, op, literal) in parse_raw(text)? {
                if !compare(column(row, &col), op, &literal) {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        Predicate::Compare {
            field,
            op,
            operand,
            case_insensitive,
        } => {
            let left = fold(column(row, field), *case_insensitive);
            let right = fold(&operand_value(operand, params)?, *case_insensitive);
            Ok(compare(&left, *op, &right))
        }
        Predicate::IsNull { field } => Ok(column(row, field).is_null()),
        Predicate::InList {
            field,
            operands,
            case_insensitive,
        } => {
            let left = fold(column(row, field), *case_insensitive);
            for operand in operands {
                let right = fold(&operand_value(operand, params)?, *case_insensitive);
                if left.loosely_equals(&right) {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Predicate::And(parts) => {
            for part in parts {
                if !eval(row, part, params)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        Predicate::Or(parts) => {
            for part in parts {
                if eval(row, part, params)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
    }
}

/// SQL comparison; anything compared with null is false
fn compare(left: &SqlValue, op: CompareOp, right: &SqlValue) -> bool {
    if left.is_null() || right.is_null() {
        return false;
    }
    match op {
        CompareOp::Eq => left.loosely_equals(right),
        CompareOp::NotEq => !left.loosely_equals(right),
        CompareOp::Like => like(&left.to_plain_string(), &right.to_plain_string()),
    }
}

/// `%` matches any run of characters; everything else is literal
fn like(text: &str, pattern: &str) -> bool {
    let parts: Vec<&str> = pattern.split('%').collect();
    if parts.len() == 1 {
        return text == pattern;
    }

    let (first, rest) = (parts[0], &parts[1..]);
    let Some(mut remaining) = text.strip_prefix(first) else {
        return false;
    };

    let (last, middle) = match rest.split_last() {
        Some(split) => split,
        None => return true,
    };
    for part in middle {
        match remaining.find(part) {
            Some(at) => remaining = &remaining[at + part.len()..],
            None => return false,
        }
    }
    remaining.ends_with(last)
}

static RAW_TERM: OnceLock<Option<Regex>> = OnceLock::new();
static RAW_AND: OnceLock<Option<Regex>> = OnceLock::new();

fn unsupported_raw(text: &str) -> StoreError {
    StoreError::Unsupported(format!("predicate '{}'", text))
}

/// Parse `col op literal [and ...]` with op one of `=`, `<>`, `!=`
fn parse_raw(text: &str) -> StoreResult<Vec<(String, CompareOp, SqlValue)>> {
    let term = RAW_TERM
        .get_or_init(|| Regex::new(r"^\s*([A-Za-z_][A-Za-z0-9_]*)\s*(=|<>|!=)\s*(.+?)\s*$").ok())
        .as_ref()
        .ok_or_else(|| unsupported_raw(text))?;
    let and = RAW_AND
        .get_or_init(|| Regex::new(r"(?i)\s+and\s+").ok())
        .as_ref()
        .ok_or_else(|| unsupported_raw(text))?;

    let mut terms = Vec::new();
    for part in and.split(text) {
        let captures = term.captures(part).ok_or_else(|| unsupported_raw(text))?;
        let op = match &captures[2] {
            "=" => CompareOp::Eq,
            _ => CompareOp::NotEq,
        };
        let literal = parse_literal(&captures[3]).ok_or_else(|| unsupported_raw(text))?;
        terms.push((captures[1].to_string(), op, literal));
    }
    Ok(terms)
}

fn parse_literal(text: &str) -> Option<SqlValue> {
    if text.eq_ignore_ascii_case("null") {
        return Some(SqlValue::Null);
    }
    if let Some(inner) = text.strip_prefix('\'').and_then(|t| t.strip_suffix('\'')) {
        return Some(SqlValue::Text(inner.to_string()));
    }
    if let Ok(i) = text.parse::<i64>() {
        return Some(SqlValue::Int(i));
    }
    text.parse::<f64>().ok().map(SqlValue::Float)
}

/// Parse `col [asc|desc], ...`
fn parse_order(order: &str) -> StoreResult<Vec<(String, bool)>> {
    let mut keys = Vec::new();
    for part in order.split(',') {
        let mut words = part.split_whitespace();
        let col = words
            .next()
            .ok_or_else(|| StoreError::Unsupported(format!("order by '{}'", order)))?;
        let descending = match words.next().map(|w| w.to_ascii_lowercase()) {
            None => false,
            Some(w) if w == "asc" => false,
            Some(w) if w == "desc" => true,
            Some(_) => return Err(StoreError::Unsupported(format!("order by '{}'", order))),
        };
        keys.push((col.trim_matches(|c| c == '[' || c == ']').to_string(), descending));
    }
    Ok(keys)
}
