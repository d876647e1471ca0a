//! Typed results of lifecycle operations

use std::fmt;

/// What a successful mutation did
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    /// Inserted; carries the record as written
    Created(T),
    /// Updated; carries the record as written
    Updated(T),
    /// Soft-deleted; carries the record with active = 0
    Deleted(T),
    /// Nothing to report: hard delete done, or the update was a no-op
    NoContent,
}

impl<T> Outcome<T> {
    pub fn name(&self) -> &'static str {
        match self {
            Outcome::Created(_) => "created",
            Outcome::Updated(_) => "updated",
            Outcome::Deleted(_) => "deleted",
            Outcome::NoContent => "no_content",
        }
    }

    pub fn is_no_content(&self) -> bool {
        matches!(self, Outcome::NoContent)
    }

    /// The written record, if the outcome carries one
    pub fn into_inner(self) -> Option<T> {
        match self {
            Outcome::Created(t) | Outcome::Updated(t) | Outcome::Deleted(t) => Some(t),
            Outcome::NoContent => None,
        }
    }

    pub fn as_ref(&self) -> Outcome<&T> {
        match self {
            Outcome::Created(t) => Outcome::Created(t),
            Outcome::Updated(t) => Outcome::Updated(t),
            Outcome::Deleted(t) => Outcome::Deleted(t),
            Outcome::NoContent => Outcome::NoContent,
        }
    }
}

impl<T> fmt::Display for Outcome<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
