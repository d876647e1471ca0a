//! WHERE clause composition
//!
//! Two shapes cover key matching:
//!
//! - `id_comparer` compares each key field with its own like-named
//!   parameter. In combine mode it emits every cyclic rotation of the
//!   field-to-parameter assignment, OR-joined, so a composite key matches in
//!   any rotated column order.
//! - `query_parameters` matches caller values against fields. Values are
//!   split into groups of `fields.len()`; each group is an AND conjunction
//!   (or the OR of its rotations in combine mode) and groups are OR-joined.
//!
//! Values are bound as generated parameters (`@__p0`, `@__p1`, ...) unless
//! the binder is in `InlineLiterals` style, which embeds quoted literals.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::errors::{ComposeError, ComposeResult};
use super::naming::check_identifier;
use super::params::Params;
use crate::value::SqlValue;

/// How caller values reach the statement text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindStyle {
    /// Values travel as bound parameters
    #[default]
    Parameters,
    /// Values are embedded as quoted literals with quote characters stripped
    InlineLiterals,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NotEq,
    Like,
}

impl CompareOp {
    pub fn as_sql(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::NotEq => "<>",
            CompareOp::Like => "like",
        }
    }
}

/// Right-hand side of a comparison
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Named parameter, without the `@`
    Param(String),
    Literal(SqlValue),
}

impl Operand {
    fn render(&self, case_insensitive: bool) -> String {
        match (self, case_insensitive) {
            (Operand::Param(name), false) => format!("@{}", name),
            (Operand::Param(name), true) => format!("lower(@{})", name),
            (Operand::Literal(value), false) => value.to_inline_literal(),
            (Operand::Literal(value), true) => value.to_lowercase().to_inline_literal(),
        }
    }
}

/// A composed WHERE fragment
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Configured predicate text, e.g. the soft-delete filter
    Raw(String),
    Compare {
        field: String,
        op: CompareOp,
        operand: Operand,
        case_insensitive: bool,
    },
    IsNull {
        field: String,
    },
    InList {
        field: String,
        operands: Vec<Operand>,
        case_insensitive: bool,
    },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
}

fn field_ref(field: &str, case_insensitive: bool) -> String {
    if case_insensitive {
        format!("lower({})", field)
    } else {
        field.to_string()
    }
}

impl Predicate {
    /// SQL text of this fragment. Conjunctions and disjunctions are always
    /// parenthesized; raw text only when it contains an `or`.
    pub fn render(&self) -> String {
        match self {
            Predicate::Raw(text) => {
                if text.to_lowercase().contains(" or ") {
                    format!("({})", text)
                } else {
                    text.clone()
                }
            }
            Predicate::Compare {
                field,
                op,
                operand,
                case_insensitive,
            } => format!(
                "{} {} {}",
                field_ref(field, *case_insensitive),
                op.as_sql(),
                operand.render(*case_insensitive)
            ),
            Predicate::IsNull { field } => format!("{} is null", field),
            Predicate::InList {
                field,
                operands,
                case_insensitive,
            } => {
                let items: Vec<String> = operands.iter().map(|o| o.render(*case_insensitive)).collect();
                format!("{} in ({})", field_ref(field, *case_insensitive), items.join(","))
            }
            Predicate::And(parts) => join(parts, " and "),
            Predicate::Or(parts) => join(parts, " or "),
        }
    }
}

fn join(parts: &[Predicate], separator: &str) -> String {
    let rendered: Vec<String> = parts.iter().map(Predicate::render).collect();
    format!("({})", rendered.join(separator))
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// A predicate together with the parameters it references
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub predicate: Predicate,
    pub params: Params,
}

/// Turns caller values into operands, collecting bound parameters
#[derive(Debug, Default)]
pub struct Binder {
    style: BindStyle,
    params: Params,
    next: usize,
}

impl Binder {
    pub fn new(style: BindStyle) -> Self {
        Self {
            style,
            params: Params::new(),
            next: 0,
        }
    }

    /// Operand for a caller value
    pub fn bind(&mut self, value: SqlValue) -> Operand {
        match self.style {
            BindStyle::Parameters => {
                let name = format!("__p{}", self.next);
                self.next += 1;
                self.params.bind(name.clone(), value);
                Operand::Param(name)
            }
            BindStyle::InlineLiterals => Operand::Literal(value),
        }
    }

    pub fn finish(self, predicate: Predicate) -> Filter {
        Filter {
            predicate,
            params: self.params,
        }
    }

    pub fn into_params(self) -> Params {
        self.params
    }
}

fn check_all<S: AsRef<str>>(fields: &[S]) -> ComposeResult<()> {
    if fields.is_empty() {
        return Err(ComposeError::NoFields);
    }
    for field in fields {
        check_identifier(field.as_ref())?;
    }
    Ok(())
}

fn compare(field: &str, operand: Operand) -> Predicate {
    Predicate::Compare {
        field: field.to_string(),
        op: CompareOp::Eq,
        operand,
        case_insensitive: false,
    }
}

/// Compare every field with its like-named parameter.
///
/// `combine = false` gives `(f0 = @f0 and f1 = @f1 ...)`. `combine = true`
/// gives the OR of N groups where group j compares `fields[i]` with
/// `@fields[(i + j) % N]`.
pub fn id_comparer<S: AsRef<str>>(fields: &[S], combine: bool) -> ComposeResult<Predicate> {
    check_all(fields)?;
    let n = fields.len();

    let rotation = |j: usize| {
        Predicate::And(
            (0..n)
                .map(|i| {
                    compare(
                        fields[i].as_ref(),
                        Operand::Param(fields[(i + j) % n].as_ref().to_string()),
                    )
                })
                .collect(),
        )
    };

    if combine {
        Ok(Predicate::Or((0..n).map(rotation).collect()))
    } else {
        Ok(rotation(0))
    }
}

/// Match value groups against fields.
///
/// `values.len()` must be a whole multiple `k` of `fields.len()`. Group g
/// pairs `fields[i]` with `values[g * N + i]`, or with every rotation of
/// that pairing in combine mode. With `k > 1` the groups are OR-joined.
pub fn query_parameters<S: AsRef<str>>(
    values: &[SqlValue],
    fields: &[S],
    combine: bool,
    binder: &mut Binder,
) -> ComposeResult<Predicate> {
    check_all(fields)?;
    if values.is_empty() {
        return Err(ComposeError::NoValues);
    }
    let n = fields.len();
    if values.len() % n != 0 {
        return Err(ComposeError::ArityMismatch {
            values: values.len(),
            fields: n,
        });
    }

    let mut groups = Vec::with_capacity(values.len() / n);
    for group in values.chunks(n) {
        let rotations = if combine { n } else { 1 };
        let mut alternatives = Vec::with_capacity(rotations);
        for j in 0..rotations {
            let conjunction = (0..n)
                .map(|i| compare(fields[i].as_ref(), binder.bind(group[(i + j) % n].clone())))
                .collect();
            alternatives.push(Predicate::And(conjunction));
        }

        groups.push(if combine {
            Predicate::Or(alternatives)
        } else {
            alternatives.remove(0)
        });
    }

    if groups.len() > 1 {
        Ok(Predicate::Or(groups))
    } else {
        Ok(groups.remove(0))
    }
}

fn matcher(
    field: &str,
    op: CompareOp,
    value: SqlValue,
    case_insensitive: bool,
    binder: &mut Binder,
) -> ComposeResult<Predicate> {
    check_identifier(field)?;
    Ok(Predicate::Compare {
        field: field.to_string(),
        op,
        operand: binder.bind(value),
        case_insensitive,
    })
}

/// `field = value`
pub fn equals(field: &str, value: SqlValue, case_insensitive: bool, binder: &mut Binder) -> ComposeResult<Predicate> {
    matcher(field, CompareOp::Eq, value, case_insensitive, binder)
}

/// `field <> value`
pub fn not_equals(field: &str, value: SqlValue, case_insensitive: bool, binder: &mut Binder) -> ComposeResult<Predicate> {
    matcher(field, CompareOp::NotEq, value, case_insensitive, binder)
}

/// `field like '%value%'`
pub fn like(field: &str, value: &str, case_insensitive: bool, binder: &mut Binder) -> ComposeResult<Predicate> {
    matcher(
        field,
        CompareOp::Like,
        SqlValue::Text(format!("%{}%", value)),
        case_insensitive,
        binder,
    )
}

/// `field is null`
pub fn is_null(field: &str) -> ComposeResult<Predicate> {
    check_identifier(field)?;
    Ok(Predicate::IsNull {
        field: field.to_string(),
    })
}

/// `field in (...)` over the distinct values, first occurrence kept
pub fn in_list(
    field: &str,
    values: &[SqlValue],
    case_insensitive: bool,
    binder: &mut Binder,
) -> ComposeResult<Predicate> {
    check_identifier(field)?;
    let mut distinct: Vec<&SqlValue> = Vec::with_capacity(values.len());
    for value in values {
        if !distinct.contains(&value) {
            distinct.push(value);
        }
    }
    if distinct.is_empty() {
        return Err(ComposeError::NoValues);
    }

    Ok(Predicate::InList {
        field: field.to_string(),
        operands: distinct.into_iter().map(|v| binder.bind(v.clone())).collect(),
        case_insensitive,
    })
}
