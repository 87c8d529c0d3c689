//! Entity change tracking on top of an ORM unit of work.
//!
//! At the start of every flush the [`ChangeListener`] walks the unit of work of
//! the [`PersistenceContext`], picks the entities whose class is marked
//! [`TRACKED`], and dispatches one [`Events::ENTITY_CHANGED`] per new or
//! mutated entity, carrying a detached copy of its original state and the
//! names of the fields that changed.
//!
//! [`MemoryEntityManager`] is a complete in-memory host for tests and for the
//! `entity-tracker` command line tool.

pub mod config;
pub mod context;
pub mod entity;
pub mod errors;
pub mod events;
pub mod listener;
pub mod memory;
pub mod metadata;
pub mod provider;
pub mod registry;
pub mod value;

pub use config::{Eligibility, ProxyTraversal, TrackerConfig};
pub use context::{EntityState, PersistenceContext};
pub use entity::{Association, EntityRef, Record, Ref};
pub use errors::*;
pub use events::{EntityChangedEvent, EventArgs, EventListener, EventManager, Events, PreFlushEventArgs};
pub use listener::ChangeListener;
pub use memory::MemoryEntityManager;
pub use metadata::{AssociationKind, AssociationMapping, ClassMetadata, IdGenerator, MetadataFactory};
pub use provider::{AnnotationMetadataProvider, ChangeSet, MutationMetadataProvider};
pub use registry::{ClassMarker, MarkerKind, MarkerRegistry, TRACKED};
pub use value::{SharedObject, Value};

// Re-exported for the `tracked!` and `class_marker!` macros.
pub use inventory;
