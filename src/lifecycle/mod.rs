//! Record lifecycle
//!
//! `EntityService` runs the create / update / soft-delete / hard-delete
//! protocol for one record type on top of a `Repository`:
//!
//! - existence and conflict checks against stored rows
//! - optimistic concurrency through row versions (`version`)
//! - injected hooks around every mutation (`hooks`)
//! - typed outcomes (`Outcome`)

pub mod hooks;
mod outcome;
mod service;
pub mod version;

pub use hooks::{ActorStamp, LifecycleHooks, NoopHooks};
pub use outcome::Outcome;
pub use service::EntityService;
