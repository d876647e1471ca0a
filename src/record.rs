//! Record descriptors and the audited-record capability
//!
//! A record type exposes an ordered, static table of fields, each with a
//! getter and a setter over `SqlValue`. The engine never looks at a record
//! through anything else, so any struct can be persisted once it provides
//! this table. `impl_record!` writes the table from a column list.
//!
//! Records that carry audit metadata (state, acting address, timestamp,
//! acting user) additionally hand out an `Auditable` view through
//! `Record::auditable` / `Record::auditable_mut`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::lifecycle::version;
use crate::value::{SqlValue, ValueError};

/// One entry of a record's field table
pub struct FieldDef<R> {
    /// Column name, also used as the bound parameter name
    pub name: &'static str,
    pub get: fn(&R) -> SqlValue,
    pub set: fn(&mut R, SqlValue) -> Result<(), ValueError>,
}

/// Record access errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecordError {
    #[error("{entity} has no field '{field}'")]
    UnknownField { entity: &'static str, field: String },

    #[error("cannot decode {entity}.{field}: {source}")]
    Decode {
        entity: &'static str,
        field: String,
        #[source]
        source: ValueError,
    },
}

/// A persistable record shape
pub trait Record: Default + Clone + PartialEq + Send + Sync + 'static {
    /// Type name the table name is derived from
    fn entity_name() -> &'static str;

    /// Fields in declaration order
    fn fields() -> &'static [FieldDef<Self>];

    fn auditable(&self) -> Option<&dyn Auditable> {
        None
    }

    fn auditable_mut(&mut self) -> Option<&mut dyn Auditable> {
        None
    }

    fn field_names() -> Vec<&'static str> {
        Self::fields().iter().map(|f| f.name).collect()
    }

    /// Read a field by name
    fn get(&self, name: &str) -> Result<SqlValue, RecordError> {
        Self::fields()
            .iter()
            .find(|f| f.name == name)
            .map(|f| (f.get)(self))
            .ok_or_else(|| RecordError::UnknownField {
                entity: Self::entity_name(),
                field: name.to_string(),
            })
    }

    /// Write a field by name
    fn set(&mut self, name: &str, value: SqlValue) -> Result<(), RecordError> {
        let field = Self::fields()
            .iter()
            .find(|f| f.name == name)
            .ok_or_else(|| RecordError::UnknownField {
                entity: Self::entity_name(),
                field: name.to_string(),
            })?;

        (field.set)(self, value).map_err(|source| RecordError::Decode {
            entity: Self::entity_name(),
            field: name.to_string(),
            source,
        })
    }

    /// All field values in declaration order
    fn values(&self) -> Vec<(&'static str, SqlValue)> {
        Self::fields().iter().map(|f| (f.name, (f.get)(self))).collect()
    }

    /// Build a record from named values. Names the record doesn't declare
    /// are ignored (history rows carry an extra key column).
    fn from_values<'a, I>(values: I) -> Result<Self, RecordError>
    where
        I: IntoIterator<Item = (&'a str, &'a SqlValue)>,
    {
        let mut record = Self::default();
        for (name, value) in values {
            if let Some(field) = Self::fields()
                .iter()
                .find(|f| f.name.eq_ignore_ascii_case(name))
            {
                (field.set)(&mut record, value.clone()).map_err(|source| {
                    RecordError::Decode {
                        entity: Self::entity_name(),
                        field: field.name.to_string(),
                        source,
                    }
                })?;
            }
        }
        Ok(record)
    }
}

/// Row state of an audited record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActiveState {
    /// Soft-deleted
    #[default]
    Inactive = 0,
    Active = 1,
    Pending = 2,
    Merged = 3,
}

impl ActiveState {
    pub fn code(&self) -> i64 {
        *self as i64
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(ActiveState::Inactive),
            1 => Some(ActiveState::Active),
            2 => Some(ActiveState::Pending),
            3 => Some(ActiveState::Merged),
            _ => None,
        }
    }
}

impl From<ActiveState> for SqlValue {
    fn from(v: ActiveState) -> Self {
        SqlValue::Int(v.code())
    }
}

impl TryFrom<SqlValue> for ActiveState {
    type Error = ValueError;

    fn try_from(v: SqlValue) -> Result<Self, Self::Error> {
        let code = i64::try_from(v)?;
        ActiveState::from_code(code)
            .ok_or_else(|| ValueError::OutOfRange(format!("active state {}", code)))
    }
}

/// The user and client a mutation is performed for
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: Uuid,
    pub host_address: String,
}

impl Actor {
    pub fn new(user_id: Uuid, host_address: impl Into<String>) -> Self {
        Self {
            user_id,
            host_address: host_address.into(),
        }
    }

    /// Actor used when no user is attached to the call
    pub fn system() -> Self {
        Self::new(Uuid::nil(), "system")
    }
}

/// Audit columns carried by an audited record
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AuditMetadata {
    pub active: ActiveState,
    /// Address of the acting client
    pub host_address: String,
    /// Last modification instant
    pub timestamp: DateTime<Utc>,
    /// User who performed the last mutation
    pub acting_user: Uuid,
}

impl AuditMetadata {
    fn stamp(&mut self, actor: &Actor) {
        self.host_address = actor.host_address.clone();
        self.timestamp = Utc::now();
        self.acting_user = actor.user_id;
    }
}

/// Capability implemented by records that carry audit metadata
pub trait Auditable {
    fn metadata(&self) -> &AuditMetadata;

    fn metadata_mut(&mut self) -> &mut AuditMetadata;

    fn active(&self) -> ActiveState {
        self.metadata().active
    }

    fn set_active(&mut self, state: ActiveState) {
        self.metadata_mut().active = state;
    }

    fn stamp_create(&mut self, actor: &Actor) {
        let meta = self.metadata_mut();
        meta.active = ActiveState::Active;
        meta.stamp(actor);
    }

    fn stamp_update(&mut self, actor: &Actor, state: ActiveState) {
        let meta = self.metadata_mut();
        meta.active = state;
        meta.stamp(actor);
    }

    fn stamp_delete(&mut self, actor: &Actor) {
        let meta = self.metadata_mut();
        meta.active = ActiveState::Inactive;
        meta.stamp(actor);
    }

    /// Whether `other` carries the same row version as this record
    fn same_version(&self, other: &dyn Auditable) -> bool {
        version::same_version(self.metadata().timestamp, other.metadata().timestamp)
    }
}

impl Auditable for AuditMetadata {
    fn metadata(&self) -> &AuditMetadata {
        self
    }

    fn metadata_mut(&mut self) -> &mut AuditMetadata {
        self
    }
}

/// Implement `Record` for a struct from its column list.
///
/// ```ignore
/// #[derive(Debug, Clone, Default, PartialEq)]
/// struct Person { id: Uuid, name: String, audit: AuditMetadata }
///
/// rowkeeper::impl_record!(Person, "Person", {
///     "id" => id,
///     "name" => name,
///     "active" => audit.active,
///     "hostAddress" => audit.host_address,
///     "date" => audit.timestamp,
///     "userHost" => audit.acting_user,
/// }, audit = audit);
/// ```
#[macro_export]
macro_rules! impl_record {
    (
        $ty:ty, $entity:literal,
        { $( $column:literal => $($path:ident).+ ),+ $(,)? }
        $(, audit = $($audit:ident).+ )?
        $(,)?
    ) => {
        impl $crate::record::Record for $ty {
            fn entity_name() -> &'static str {
                $entity
            }

            fn fields() -> &'static [$crate::record::FieldDef<Self>] {
                const FIELDS: &[$crate::record::FieldDef<$ty>] = &[
                    $(
                        $crate::record::FieldDef {
                            name: $column,
                            get: |r: &$ty| $crate::value::SqlValue::from(r.$($path).+.clone()),
                            set: |r: &mut $ty, v: $crate::value::SqlValue|
                                -> ::core::result::Result<(), $crate::value::ValueError> {
                                r.$($path).+ = ::core::convert::TryFrom::try_from(v)?;
                                Ok(())
                            },
                        },
                    )+
                ];
                FIELDS
            }

            $(
                fn auditable(&self) -> Option<&dyn $crate::record::Auditable> {
                    Some(&self.$($audit).+)
                }

                fn auditable_mut(&mut self) -> Option<&mut dyn $crate::record::Auditable> {
                    Some(&mut self.$($audit).+)
                }
            )?
        }
    };
}
