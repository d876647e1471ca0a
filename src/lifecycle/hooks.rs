//! Lifecycle hooks
//!
//! Hooks run around every mutation of an entity service. `before_*` hooks
//! may change the record about to be written or veto the write by returning
//! an error; `after_*` hooks observe the record as written. All hooks default
//! to no-ops.

use crate::error::EngineResult;
use crate::record::{ActiveState, Actor, Record};

pub trait LifecycleHooks<R>: Send + Sync {
    fn before_create(&self, _record: &mut R) -> EngineResult<()> {
        Ok(())
    }

    fn after_create(&self, _record: &R) {}

    fn before_update(&self, _record: &mut R) -> EngineResult<()> {
        Ok(())
    }

    fn after_update(&self, _record: &R) {}

    /// Runs before soft and hard deletes
    fn before_delete(&self, _record: &mut R) -> EngineResult<()> {
        Ok(())
    }

    fn after_delete(&self, _record: &R) {}
}

/// Hooks that do nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHooks;

impl<R> LifecycleHooks<R> for NoopHooks {}

/// Stamps the acting user, address and current time into audited records.
///
/// Creates are stamped active, updates with `update_state` (active unless
/// configured otherwise) and deletes inactive. Records without audit
/// metadata pass through untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct ActorStamp {
    pub actor: Actor,
    pub update_state: ActiveState,
}

impl ActorStamp {
    pub fn new(actor: Actor) -> Self {
        Self {
            actor,
            update_state: ActiveState::Active,
        }
    }

    pub fn with_update_state(mut self, state: ActiveState) -> Self {
        self.update_state = state;
        self
    }
}

impl<R: Record> LifecycleHooks<R> for ActorStamp {
    fn before_create(&self, record: &mut R) -> EngineResult<()> {
        if let Some(audit) = record.auditable_mut() {
            audit.stamp_create(&self.actor);
        }
        Ok(())
    }

    fn before_update(&self, record: &mut R) -> EngineResult<()> {
        if let Some(audit) = record.auditable_mut() {
            audit.stamp_update(&self.actor, self.update_state);
        }
        Ok(())
    }

    fn before_delete(&self, record: &mut R) -> EngineResult<()> {
        if let Some(audit) = record.auditable_mut() {
            audit.stamp_delete(&self.actor);
        }
        Ok(())
    }
}
