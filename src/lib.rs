//! rowkeeper - uniform CRUD over arbitrary table shapes
//!
//! A record type describes its fields once (`impl_record!`); from that and a
//! `TableConfig` the engine composes parameterized statements, mirrors every
//! mutation into a history table when configured, and runs the create /
//! update / soft-delete / hard-delete lifecycle with optimistic concurrency.
//!
//! Layers, leaf to root: `compose` (statements), `storage` (execution
//! against a `Store`), `repository` (typed reads and writes), `lifecycle`
//! (checks, hooks and outcomes).

pub mod cli;
pub mod compose;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod observability;
pub mod record;
pub mod repository;
pub mod storage;
pub mod value;

pub use config::{EngineConfig, IdentityMode, TableConfig};
pub use error::{EngineError, EngineResult, ErrorKind, Presence};
pub use lifecycle::{ActorStamp, EntityService, LifecycleHooks, Outcome};
pub use record::{ActiveState, Actor, AuditMetadata, Auditable, Record};
pub use repository::Repository;
pub use storage::{CancelSignal, InMemoryStore, StorageEngine, Store};
pub use value::SqlValue;
