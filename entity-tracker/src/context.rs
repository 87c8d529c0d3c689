//! The capability surface required from the host persistence framework.

use std::rc::Rc;

use serde::Serialize;

use crate::{
    entity::{EntityRef, Record},
    errors::TrackerResult,
    events::EventManager,
    metadata::ClassMetadata,
    value::Value,
};

/// Lifecycle state of an entity within a unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityState {
    /// Never persisted and not scheduled.
    New,
    /// Tracked by the unit of work: in the identity map or scheduled for insertion.
    Managed,
    /// Scheduled for removal.
    Removed,
    /// Has an identity but is no longer tracked.
    Detached,
}

/// A persistence context as exposed by the host framework.
///
/// Every method only reads unit-of-work state; the tracker never mutates the
/// context through this trait.
pub trait PersistenceContext {
    /// Metadata of `class`. Unknown classes are an error.
    fn class_metadata(&self, class: &str) -> TrackerResult<Rc<ClassMetadata>>;

    /// Managed entities grouped by root class, in identity-map order.
    fn identity_map(&self) -> Vec<(String, Vec<EntityRef>)>;

    /// New entities scheduled for insertion, in scheduling order.
    fn scheduled_entity_insertions(&self) -> Vec<EntityRef>;

    /// Data recorded for `entity` when it was last loaded or flushed. Empty
    /// when nothing was recorded.
    fn original_entity_data(&self, entity: &EntityRef) -> Record;

    fn is_in_identity_map(&self, entity: &EntityRef) -> bool;

    /// Identifier recorded in the identity map, by field name.
    fn entity_identifier(&self, entity: &EntityRef) -> Vec<(String, Value)>;

    /// State of `entity`; `assume` is answered for entities the unit of work
    /// has never seen, when given.
    fn entity_state(&self, entity: &EntityRef, assume: Option<EntityState>) -> EntityState;

    /// Loads an uninitialized proxy in place.
    fn initialize(&self, entity: &EntityRef) -> TrackerResult<()>;

    fn event_manager(&self) -> &EventManager;
}
