//! Statement composition
//!
//! Turns a record shape and a table configuration into statements:
//!
//! - `fields`: ordered field names and key resolution
//! - `predicate`: WHERE fragments (key rotations, value groups, matchers)
//! - `statement`: select / top 1 / count / insert / update / delete
//! - `history`: the history insert accompanying each mutation
//!
//! Nothing here touches a store.

mod errors;
mod fields;
mod history;
pub mod naming;
mod params;
pub mod predicate;
mod statement;

pub use errors::{ComposeError, ComposeResult};
pub use fields::{fields, key_fields, RecordShape};
pub use history::HistoryMirror;
pub use params::Params;
pub use predicate::{BindStyle, Binder, CompareOp, Filter, Operand, Predicate};
pub use statement::{FieldValues, Statement, StatementComposer, StatementKind, ValueSource};
