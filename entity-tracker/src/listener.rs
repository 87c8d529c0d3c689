use std::rc::Rc;

use log::{debug, trace};

use crate::{
    config::{Eligibility, TrackerConfig},
    context::PersistenceContext,
    entity::EntityRef,
    errors::TrackerResult,
    events::{EntityChangedEvent, EventArgs, EventListener, EventManager, Events},
    provider::{AnnotationMetadataProvider, MutationMetadataProvider},
    registry::MarkerRegistry,
};

/// Pre-flush listener for entities whose class is tracked.
///
/// Dispatches [`Events::ENTITY_CHANGED`] once per changed entity with its
/// current state, the detached original, and the mutated field names. The
/// original entity is never managed.
#[derive(Debug, Clone)]
pub struct ChangeListener {
    annotations: AnnotationMetadataProvider,
    mutations: MutationMetadataProvider,
    eligibility: Eligibility,
}

impl ChangeListener {
    pub fn new(annotations: AnnotationMetadataProvider, mutations: MutationMetadataProvider) -> Self {
        Self {
            annotations,
            mutations,
            eligibility: Eligibility::default(),
        }
    }

    pub fn from_config(registry: MarkerRegistry, config: &TrackerConfig) -> Self {
        Self::new(
            AnnotationMetadataProvider::new(registry),
            MutationMetadataProvider::new(config.proxy_traversal),
        )
        .with_eligibility(config.eligibility)
    }

    pub fn with_eligibility(mut self, eligibility: Eligibility) -> Self {
        self.eligibility = eligibility;
        self
    }

    /// Registers the listener for [`Events::PRE_FLUSH`].
    pub fn subscribe(self: Rc<Self>, events: &EventManager) {
        events.add_event_listener(&[Events::PRE_FLUSH], self);
    }

    pub fn pre_flush(&self, context: &dyn PersistenceContext) -> TrackerResult<()> {
        let changes = self.mutations.compute_full_change_set(context)?;

        for (class, updates) in changes.iter() {
            let Some(representative) = updates.first() else {
                continue;
            };

            if !self.annotations.is_tracked(context, representative)? {
                trace!("{class} is not tracked, skipping {} entities", updates.len());
                continue;
            }

            for entity in updates {
                if !self.is_eligible(context, entity)? {
                    continue;
                }

                let original = self.mutations.create_original_entity(context, entity)?;
                let mutated_fields = self.mutations.get_mutated_fields(context, entity, original.as_ref())?;

                if original.is_none() || !mutated_fields.is_empty() {
                    debug!(
                        "Going to notify a change (preFlush) to {}, which has {:?}",
                        entity.class(),
                        mutated_fields
                    );
                    let event = EntityChangedEvent::new(context, entity.clone(), original, mutated_fields);
                    context
                        .event_manager()
                        .dispatch_event(Events::ENTITY_CHANGED, &EventArgs::EntityChanged(event))?;
                }
            }
        }

        Ok(())
    }

    fn is_eligible(&self, context: &dyn PersistenceContext, entity: &EntityRef) -> TrackerResult<bool> {
        match self.eligibility {
            Eligibility::Initialized => Ok(entity.is_initialized()),
            Eligibility::Managed => {
                if !self.mutations.is_entity_managed(context, entity) {
                    return Ok(false);
                }
                // Managed proxies are diffed like any other entity and pay for the load.
                if !entity.is_initialized() {
                    context.initialize(entity)?;
                }
                Ok(true)
            }
        }
    }
}

impl EventListener for ChangeListener {
    fn on_event(&self, _event: &str, args: &EventArgs<'_>) -> TrackerResult<()> {
        match args {
            EventArgs::PreFlush(args) => self.pre_flush(args.context()),
            EventArgs::EntityChanged(_) => Ok(()),
        }
    }
}
