//! In-memory persistence context.
//!
//! `MemoryEntityManager` implements the whole [`PersistenceContext`] surface
//! with the lifecycle rules of a classic unit-of-work ORM: `persist` schedules
//! insertions and cascades, `flush` inserts, removes and records the original
//! data of every managed entity. Rows live in a map; nothing touches disk.

mod unit_of_work;

use std::{
    cell::{Cell, RefCell},
    collections::{HashMap, HashSet},
    rc::Rc,
};

use log::debug;
use nanoid::nanoid;

use crate::{
    context::{EntityState, PersistenceContext},
    entity::{EntityRef, Record},
    errors::{TrackerError, TrackerResult},
    events::{EventArgs, EventListener, EventManager, Events, PreFlushEventArgs},
    metadata::{ClassMetadata, IdGenerator, MetadataFactory},
    value::Value,
};

use self::unit_of_work::{UnitOfWork, column_data, identity_key};

const TOKEN_ALPHABET: &[char] = &[
    '2', '3', '4', '5', '6', '7', '8', '9', 'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'J', 'K', 'L', 'M', 'N', 'P', 'Q',
    'R', 'S', 'T', 'U', 'V', 'W', 'X', 'Y', 'Z',
];
const TOKEN_LENGTH: usize = 16;

/// Identifier for classes using [`IdGenerator::Token`].
pub fn generate_token_id() -> String {
    nanoid!(TOKEN_LENGTH, TOKEN_ALPHABET)
}

#[derive(Default)]
pub struct MemoryEntityManager {
    metadata: MetadataFactory,
    events: EventManager,
    unit: RefCell<UnitOfWork>,
    rows: RefCell<HashMap<(String, String), Record>>,
    next_identity: Cell<i64>,
    flushes: Cell<usize>,
}

impl MemoryEntityManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, metadata: ClassMetadata) {
        self.metadata.register(metadata);
    }

    pub fn with_class(mut self, metadata: ClassMetadata) -> Self {
        self.register(metadata);
        self
    }

    /// Subscribes `listener` to the pre-flush event of this context.
    pub fn add_pre_flush_listener(&self, listener: Rc<dyn EventListener>) {
        self.events.add_event_listener(&[Events::PRE_FLUSH], listener);
    }

    /// Number of completed flushes.
    pub fn flush_count(&self) -> usize {
        self.flushes.get()
    }

    /// Makes a new entity managed and schedules it for insertion, cascading to
    /// new entities behind cascade-persist associations.
    pub fn persist(&self, entity: &EntityRef) -> TrackerResult<()> {
        let mut visited = HashSet::new();
        self.do_persist(entity, &mut visited)
    }

    fn do_persist(&self, entity: &EntityRef, visited: &mut HashSet<EntityRef>) -> TrackerResult<()> {
        if !visited.insert(entity.clone()) {
            return Ok(());
        }
        let metadata = self.metadata.get(&entity.class())?;

        match self.entity_state(entity, Some(EntityState::New)) {
            EntityState::New => self.schedule_insertion(&metadata, entity),
            EntityState::Managed => {}
            EntityState::Removed => {
                self.unit.borrow_mut().scheduled_removals.retain(|candidate| candidate != entity);
            }
            EntityState::Detached => {
                return Err(TrackerError::invalid_state(format!(
                    "detached {entity:?} passed to persist"
                )));
            }
        }

        self.cascade_persist(&metadata, entity, visited)
    }

    fn cascade_persist(
        &self,
        metadata: &ClassMetadata,
        entity: &EntityRef,
        visited: &mut HashSet<EntityRef>,
    ) -> TrackerResult<()> {
        if !entity.is_initialized() {
            return Ok(());
        }
        for mapping in metadata.associations.iter().filter(|mapping| mapping.cascade_persist) {
            let Some(value) = entity.association(&mapping.name) else {
                continue;
            };
            for target in value.entities() {
                self.do_persist(&target, visited)?;
            }
        }
        Ok(())
    }

    fn schedule_insertion(&self, metadata: &ClassMetadata, entity: &EntityRef) {
        if metadata.id_generator == IdGenerator::Token {
            for field in metadata.identifier() {
                if entity.field(field).is_null() {
                    entity.set_field(field, generate_token_id());
                }
            }
        }
        self.unit.borrow_mut().scheduled_insertions.push(entity.clone());
    }

    /// Stops tracking `entity`. Its changes are no longer flushed.
    pub fn detach(&self, entity: &EntityRef) {
        self.unit.borrow_mut().evict(entity);
    }

    /// Schedules a managed entity for removal. A scheduled insertion is simply
    /// cancelled.
    pub fn remove(&self, entity: &EntityRef) -> TrackerResult<()> {
        let mut unit = self.unit.borrow_mut();
        if unit.is_scheduled_for_insert(entity) {
            unit.scheduled_insertions.retain(|candidate| candidate != entity);
            return Ok(());
        }
        if unit.is_in_identity_map(entity) {
            if !unit.is_scheduled_for_removal(entity) {
                unit.scheduled_removals.push(entity.clone());
            }
            return Ok(());
        }
        Err(TrackerError::invalid_state(format!(
            "{entity:?} is not managed and cannot be removed"
        )))
    }

    /// Managed handle for the row `id` of `class`, without loading it. An
    /// entity already in the identity map is returned as is.
    pub fn get_reference(&self, class: &str, id: impl Into<Value>) -> TrackerResult<EntityRef> {
        let metadata = self.metadata.get(class)?;
        let identifier = self.single_identifier(&metadata, id.into())?;
        let key = identity_key(&identifier);

        if let Some(existing) = self.unit.borrow().try_get_by_id(&metadata.root_name, &key) {
            return Ok(existing);
        }

        let proxy = EntityRef::proxy(
            metadata.name.clone(),
            identifier.iter().map(|(_, value)| value.clone()).collect(),
        );
        self.unit
            .borrow_mut()
            .add_to_identity_map(&metadata.root_name, &proxy, identifier);
        Ok(proxy)
    }

    /// Loaded, managed entity for the row `id` of `class`, if the row exists.
    pub fn find(&self, class: &str, id: impl Into<Value>) -> TrackerResult<Option<EntityRef>> {
        let id = id.into();
        let metadata = self.metadata.get(class)?;
        let identifier = self.single_identifier(&metadata, id.clone())?;
        let row_key = (metadata.root_name.clone(), identity_key(&identifier));
        if !self.rows.borrow().contains_key(&row_key) {
            return Ok(None);
        }

        let entity = self.get_reference(class, id)?;
        self.initialize(&entity)?;
        Ok(Some(entity))
    }

    fn single_identifier(&self, metadata: &ClassMetadata, id: Value) -> TrackerResult<Vec<(String, Value)>> {
        match metadata.identifier().as_slice() {
            [field] => Ok(vec![(field.to_string(), id)]),
            _ => Err(TrackerError::invalid_state(format!(
                "{} does not have a single identifier field",
                metadata.name
            ))),
        }
    }

    /// Synchronizes the unit of work with the row store.
    ///
    /// Dispatches [`Events::PRE_FLUSH`] first, then persists new entities
    /// reachable through cascade-persist associations, deletes removed rows,
    /// inserts scheduled entities and records original data for everything
    /// still managed.
    pub fn flush(&self) -> TrackerResult<()> {
        let args = EventArgs::PreFlush(PreFlushEventArgs::new(self));
        self.events.dispatch_event(Events::PRE_FLUSH, &args)?;

        self.persist_reachable()?;
        self.execute_removals()?;
        self.execute_insertions()?;
        self.record_originals()?;

        self.flushes.set(self.flushes.get() + 1);
        Ok(())
    }

    fn persist_reachable(&self) -> TrackerResult<()> {
        let managed = self.unit.borrow().managed_entities();
        let mut visited = HashSet::new();
        for entity in managed {
            let metadata = self.metadata.get(&entity.class())?;
            self.cascade_persist(&metadata, &entity, &mut visited)?;
        }
        Ok(())
    }

    fn execute_removals(&self) -> TrackerResult<()> {
        let removals = std::mem::take(&mut self.unit.borrow_mut().scheduled_removals);
        for entity in removals {
            let metadata = self.metadata.get(&entity.class())?;
            let identifier = self.entity_identifier(&entity);
            self.rows
                .borrow_mut()
                .remove(&(metadata.root_name.clone(), identity_key(&identifier)));
            self.unit.borrow_mut().evict(&entity);
            debug!("removed {entity:?}");
        }
        Ok(())
    }

    fn execute_insertions(&self) -> TrackerResult<()> {
        let insertions = std::mem::take(&mut self.unit.borrow_mut().scheduled_insertions);
        for entity in insertions {
            let metadata = self.metadata.get(&entity.class())?;
            if metadata.is_id_generator_identity() {
                for field in metadata.identifier() {
                    if entity.field(field).is_null() {
                        let next = self.next_identity.get() + 1;
                        self.next_identity.set(next);
                        entity.set_field(field, next);
                    }
                }
            }

            let identifier: Vec<(String, Value)> = metadata
                .identifier()
                .into_iter()
                .map(|field| (field.to_string(), entity.field(field)))
                .collect();
            self.unit
                .borrow_mut()
                .add_to_identity_map(&metadata.root_name, &entity, identifier);
            debug!("inserted {entity:?}");
        }
        Ok(())
    }

    // Ids assigned by the store on insert never make it into the recorded
    // data; whatever was recorded before is carried over.
    fn record_originals(&self) -> TrackerResult<()> {
        let managed = self.unit.borrow().managed_entities();
        for entity in managed {
            let metadata = self.metadata.get(&entity.class())?;
            let mut data = column_data(&metadata, &entity);
            if metadata.is_id_generator_identity() {
                let previous = self.original_entity_data(&entity);
                for field in metadata.identifier() {
                    data.set_field(field, previous.field(field).cloned().unwrap_or_default());
                }
            }

            let identifier = self.entity_identifier(&entity);
            self.rows.borrow_mut().insert(
                (metadata.root_name.clone(), identity_key(&identifier)),
                column_data(&metadata, &entity),
            );
            self.unit.borrow_mut().originals.insert(entity, data);
        }
        Ok(())
    }
}

impl PersistenceContext for MemoryEntityManager {
    fn class_metadata(&self, class: &str) -> TrackerResult<Rc<ClassMetadata>> {
        self.metadata.get(class)
    }

    fn identity_map(&self) -> Vec<(String, Vec<EntityRef>)> {
        self.unit.borrow().identity_map.clone()
    }

    fn scheduled_entity_insertions(&self) -> Vec<EntityRef> {
        self.unit.borrow().scheduled_insertions.clone()
    }

    fn original_entity_data(&self, entity: &EntityRef) -> Record {
        self.unit.borrow().originals.get(entity).cloned().unwrap_or_default()
    }

    fn is_in_identity_map(&self, entity: &EntityRef) -> bool {
        self.unit.borrow().is_in_identity_map(entity)
    }

    fn entity_identifier(&self, entity: &EntityRef) -> Vec<(String, Value)> {
        self.unit.borrow().identifiers.get(entity).cloned().unwrap_or_default()
    }

    fn entity_state(&self, entity: &EntityRef, assume: Option<EntityState>) -> EntityState {
        {
            let unit = self.unit.borrow();
            if unit.is_scheduled_for_removal(entity) {
                return EntityState::Removed;
            }
            if unit.is_scheduled_for_insert(entity) || unit.is_in_identity_map(entity) {
                return EntityState::Managed;
            }
        }
        if let Some(assume) = assume {
            return assume;
        }
        match self.metadata.get(&entity.class()) {
            Ok(metadata) if !metadata.identifier_values(entity).is_empty() => EntityState::Detached,
            _ => EntityState::New,
        }
    }

    fn initialize(&self, entity: &EntityRef) -> TrackerResult<()> {
        if entity.is_initialized() {
            return Ok(());
        }
        let metadata = self.metadata.get(&entity.class())?;
        let identifier = self.entity_identifier(entity);
        let row = self
            .rows
            .borrow()
            .get(&(metadata.root_name.clone(), identity_key(&identifier)))
            .cloned()
            .ok_or_else(|| TrackerError::ProxyLoad {
                class: metadata.name.clone(),
                identifier: identifier.iter().map(|(_, value)| value.to_identifier_string()).collect(),
            })?;

        entity.load(row.clone());
        self.unit.borrow_mut().originals.insert(entity.clone(), row);
        debug!("loaded {entity:?}");
        Ok(())
    }

    fn event_manager(&self) -> &EventManager {
        &self.events
    }
}
