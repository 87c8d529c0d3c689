//! Named-event dispatch and the payloads exchanged with the host.

use std::{cell::RefCell, fmt, rc::Rc};

use crate::{context::PersistenceContext, entity::EntityRef, errors::TrackerResult};

/// Well-known event names.
pub struct Events;

impl Events {
    /// Fired by the host at the start of every flush.
    pub const PRE_FLUSH: &'static str = "preFlush";
    /// Fired once per changed entity of a tracked class.
    pub const ENTITY_CHANGED: &'static str = "entityChanged";
}

/// Payload of [`Events::PRE_FLUSH`].
pub struct PreFlushEventArgs<'a> {
    context: &'a dyn PersistenceContext,
}

impl<'a> PreFlushEventArgs<'a> {
    pub fn new(context: &'a dyn PersistenceContext) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &'a dyn PersistenceContext {
        self.context
    }
}

/// Payload of [`Events::ENTITY_CHANGED`].
pub struct EntityChangedEvent<'a> {
    context: &'a dyn PersistenceContext,
    current_entity: EntityRef,
    original_entity: Option<EntityRef>,
    mutated_fields: Vec<String>,
}

impl<'a> EntityChangedEvent<'a> {
    pub fn new(
        context: &'a dyn PersistenceContext,
        current_entity: EntityRef,
        original_entity: Option<EntityRef>,
        mutated_fields: Vec<String>,
    ) -> Self {
        Self {
            context,
            current_entity,
            original_entity,
            mutated_fields,
        }
    }

    pub fn context(&self) -> &'a dyn PersistenceContext {
        self.context
    }

    /// The managed entity about to be flushed. Subscribers may still modify it.
    pub fn current_entity(&self) -> &EntityRef {
        &self.current_entity
    }

    /// Detached copy holding the last persisted state; `None` for new entities.
    /// This instance is not managed.
    pub fn original_entity(&self) -> Option<&EntityRef> {
        self.original_entity.as_ref()
    }

    pub fn mutated_fields(&self) -> &[String] {
        &self.mutated_fields
    }
}

impl fmt::Debug for EntityChangedEvent<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityChangedEvent")
            .field("current_entity", &self.current_entity)
            .field("original_entity", &self.original_entity)
            .field("mutated_fields", &self.mutated_fields)
            .finish()
    }
}

pub enum EventArgs<'a> {
    PreFlush(PreFlushEventArgs<'a>),
    EntityChanged(EntityChangedEvent<'a>),
}

/// Subscriber invoked synchronously for the events it was registered under.
pub trait EventListener {
    fn on_event(&self, event: &str, args: &EventArgs<'_>) -> TrackerResult<()>;
}

struct FnListener<F>(F);

impl<F> EventListener for FnListener<F>
where
    F: Fn(&EventArgs<'_>) -> TrackerResult<()>,
{
    fn on_event(&self, _event: &str, args: &EventArgs<'_>) -> TrackerResult<()> {
        (self.0)(args)
    }
}

/// Synchronous event bus. Listeners run in registration order.
#[derive(Default)]
pub struct EventManager {
    listeners: RefCell<Vec<(String, Rc<dyn EventListener>)>>,
}

impl EventManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_event_listener(&self, events: &[&str], listener: Rc<dyn EventListener>) {
        let mut listeners = self.listeners.borrow_mut();
        for event in events {
            listeners.push((event.to_string(), Rc::clone(&listener)));
        }
    }

    /// Registers a closure for a single event.
    pub fn subscribe<F>(&self, event: &str, handler: F)
    where
        F: Fn(&EventArgs<'_>) -> TrackerResult<()> + 'static,
    {
        self.add_event_listener(&[event], Rc::new(FnListener(handler)));
    }

    /// Invokes every listener of `event` in order; the first failure stops
    /// dispatch and is returned. Listeners may register further listeners.
    pub fn dispatch_event(&self, event: &str, args: &EventArgs<'_>) -> TrackerResult<()> {
        let targets: Vec<Rc<dyn EventListener>> = self
            .listeners
            .borrow()
            .iter()
            .filter(|(name, _)| name == event)
            .map(|(_, listener)| Rc::clone(listener))
            .collect();

        for listener in targets {
            listener.on_event(event, args)?;
        }
        Ok(())
    }
}
