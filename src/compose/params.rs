//! Bound statement parameters

use serde::{Deserialize, Serialize};

use crate::value::SqlValue;

/// Named parameters in binding order. Names are stored without the `@`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Params {
    entries: Vec<(String, SqlValue)>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a value; rebinding a name replaces the previous value
    pub fn bind(&mut self, name: impl Into<String>, value: SqlValue) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&SqlValue> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }

    pub fn extend(&mut self, other: Params) {
        for (name, value) in other.entries {
            self.bind(name, value);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }
}

impl<N: Into<String>> FromIterator<(N, SqlValue)> for Params {
    fn from_iter<I: IntoIterator<Item = (N, SqlValue)>>(iter: I) -> Self {
        let mut params = Params::new();
        for (name, value) in iter {
            params.bind(name, value);
        }
        params
    }
}
