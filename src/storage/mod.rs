//! Statement execution
//!
//! - `Store`: the capability a backend implements
//! - `StorageEngine`: runs statements, with transactions for history writes
//!   and all-or-nothing batches
//! - `InMemoryStore`: reference store interpreting statements in memory
//! - `CancelSignal`: cancellation flag and deadline checked before every
//!   statement

mod cancel;
mod engine;
mod errors;
mod memory;
mod store;

pub use cancel::CancelSignal;
pub use engine::{StorageEngine, WriteSet};
pub use errors::{StoreError, StoreResult};
pub use memory::InMemoryStore;
pub use store::{Row, Store, StoreTransaction};
