use std::{cell::RefCell, collections::HashMap, rc::Rc};

use anyhow::{Context, Result, anyhow, bail};
use colored::Colorize;
use comfy_table::{Cell, Table};
use entity_tracker::{
    ChangeListener, ClassMetadata, EntityChangedEvent, EntityRef, EventArgs, Events, MemoryEntityManager,
    PersistenceContext, TrackerConfig, TrackerResult, Value,
};
use log::debug;
use serde::Serialize;

use crate::{
    fixture::{Fixture, Step, to_value},
    output::{GlobalOptions, TableDisplay, set_table_header, themed_table},
    theme::{THEME, change_mark},
};

#[derive(Debug, Clone, Serialize)]
pub struct FieldChange {
    pub field: String,
    pub original: Option<String>,
    pub current: String,
}

/// One `entityChanged` notification as observed by the replay.
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub flush: usize,
    pub class: String,
    pub identifier: Option<String>,
    pub is_new: bool,
    pub mutated_fields: Vec<String>,
    pub changes: Vec<FieldChange>,
}

impl Notification {
    fn capture(event: &EntityChangedEvent<'_>) -> TrackerResult<Self> {
        let context = event.context();
        let current = event.current_entity();
        let metadata = context.class_metadata(&current.class())?;

        let mut changes = Vec::with_capacity(event.mutated_fields().len());
        for field in event.mutated_fields() {
            let original = match event.original_entity() {
                Some(original) => Some(render_field(context, &metadata, original, field)?),
                None => None,
            };
            changes.push(FieldChange {
                field: field.clone(),
                original,
                current: render_field(context, &metadata, current, field)?,
            });
        }

        Ok(Self {
            flush: 0,
            class: metadata.name.clone(),
            identifier: render_identifier(&metadata, current),
            is_new: event.original_entity().is_none(),
            mutated_fields: event.mutated_fields().to_vec(),
            changes,
        })
    }
}

fn render_identifier(metadata: &ClassMetadata, entity: &EntityRef) -> Option<String> {
    let values = metadata.identifier_values(entity);
    if values.is_empty() {
        return None;
    }
    Some(
        values
            .iter()
            .map(Value::to_identifier_string)
            .collect::<Vec<_>>()
            .join(","),
    )
}

fn render_field(
    context: &dyn PersistenceContext,
    metadata: &ClassMetadata,
    entity: &EntityRef,
    field: &str,
) -> TrackerResult<String> {
    if metadata.has_field(field) {
        return Ok(entity.field(field).to_string());
    }
    match entity.to_one(field) {
        Some(target) => {
            let target_metadata = context.class_metadata(&target.class())?;
            let identifier = render_identifier(&target_metadata, &target).unwrap_or_else(|| "new".to_string());
            Ok(format!("{}#{identifier}", target_metadata.name))
        }
        None => Ok("null".to_string()),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplayReport {
    pub fixture: String,
    pub flushes: usize,
    pub notifications: Vec<Notification>,
}

impl TableDisplay for ReplayReport {
    fn to_table(&self, options: &GlobalOptions) -> Table {
        let mut table = themed_table(options);
        set_table_header(&mut table, options, &["Flush", "Entity", "Field", "Original", "Current"]);

        for notification in &self.notifications {
            let icon = change_mark(notification.is_new);
            let entity = format!(
                "{icon} {}#{}",
                notification.class,
                notification.identifier.as_deref().unwrap_or("new")
            );
            if notification.changes.is_empty() {
                table.add_row(vec![
                    Cell::new(notification.flush),
                    Cell::new(&entity),
                    Cell::new(""),
                    Cell::new(""),
                    Cell::new(""),
                ]);
            }
            for change in &notification.changes {
                let original = change.original.as_deref().unwrap_or("-");
                let (original, current) = if options.no_color {
                    (original.to_string(), change.current.clone())
                } else {
                    (
                        original.color(THEME.original).to_string(),
                        change.current.color(THEME.current).to_string(),
                    )
                };
                table.add_row(vec![
                    Cell::new(notification.flush),
                    Cell::new(&entity),
                    Cell::new(&change.field),
                    Cell::new(original),
                    Cell::new(current),
                ]);
            }
        }
        table
    }

    fn to_compact(&self) -> String {
        self.notifications
            .iter()
            .map(|notification| {
                format!(
                    "{} {}#{} [{}]",
                    notification.flush,
                    notification.class,
                    notification.identifier.as_deref().unwrap_or("new"),
                    notification.mutated_fields.join(",")
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Plays the steps of a fixture against a fresh in-memory context with a
/// change listener attached, collecting every notification.
pub struct Replayer {
    em: MemoryEntityManager,
    aliases: HashMap<String, EntityRef>,
    notifications: Rc<RefCell<Vec<Notification>>>,
}

impl Replayer {
    pub fn new(fixture: &Fixture, config: &TrackerConfig) -> Result<Self> {
        let (em, registry) = fixture.build()?;

        let listener = Rc::new(ChangeListener::from_config(registry, config));
        listener.subscribe(em.event_manager());

        let notifications = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&notifications);
        em.event_manager().subscribe(Events::ENTITY_CHANGED, move |args| {
            if let EventArgs::EntityChanged(event) = args {
                sink.borrow_mut().push(Notification::capture(event)?);
            }
            Ok(())
        });

        Ok(Self {
            em,
            aliases: HashMap::new(),
            notifications,
        })
    }

    #[cfg(test)]
    pub fn context(&self) -> &MemoryEntityManager {
        &self.em
    }

    pub fn entity(&self, alias: &str) -> Result<&EntityRef> {
        self.aliases
            .get(alias)
            .ok_or_else(|| anyhow!("alias '{alias}' is used before it is created"))
    }

    pub fn apply(&mut self, step: &Step) -> Result<()> {
        debug!("replaying {}", step.describe());
        match step {
            Step::New { alias, class, values } => {
                let metadata = self.em.class_metadata(class)?;
                let entity = metadata.new_instance();
                for (field, value) in values {
                    metadata.ensure_declared(field)?;
                    entity.set_field(field, to_value(value)?);
                }
                if self.aliases.insert(alias.clone(), entity).is_some() {
                    bail!("alias '{alias}' is already bound");
                }
            }
            Step::Set { alias, field, value } => {
                let entity = self.entity(alias)?;
                self.em.class_metadata(&entity.class())?.ensure_declared(field)?;
                let value = value.as_ref().map(to_value).transpose()?.unwrap_or_default();
                entity.set_field(field, value);
            }
            Step::Link { alias, field, target } => {
                let (entity, target) = (self.entity(alias)?, self.entity(target)?);
                let metadata = self.em.class_metadata(&entity.class())?;
                let mapping = metadata
                    .association_mapping(field)
                    .ok_or_else(|| anyhow!("class '{}' has no association '{field}'", metadata.name))?;
                if mapping.kind.is_to_one() {
                    entity.set_to_one(field, Some(target));
                } else {
                    entity.add_to_many(field, target);
                }
            }
            Step::Unlink { alias, field, target } => {
                let entity = self.entity(alias)?;
                let metadata = self.em.class_metadata(&entity.class())?;
                let mapping = metadata
                    .association_mapping(field)
                    .ok_or_else(|| anyhow!("class '{}' has no association '{field}'", metadata.name))?;
                match target {
                    _ if mapping.kind.is_to_one() => entity.set_to_one(field, None),
                    Some(target) => entity.remove_from_many(field, self.entity(target)?),
                    None => bail!("to-many '{field}' needs a target to unlink"),
                }
            }
            Step::Persist { alias } => self.em.persist(self.entity(alias)?)?,
            Step::Detach { alias } => self.em.detach(self.entity(alias)?),
            Step::Remove { alias } => self.em.remove(self.entity(alias)?)?,
            Step::Flush => {
                let seen = self.notifications.borrow().len();
                self.em.flush()?;
                let flush = self.em.flush_count();
                for notification in self.notifications.borrow_mut().iter_mut().skip(seen) {
                    notification.flush = flush;
                }
            }
        }
        Ok(())
    }

    pub fn finish(self, fixture: impl Into<String>) -> ReplayReport {
        let notifications = self.notifications.borrow().clone();
        ReplayReport {
            fixture: fixture.into(),
            flushes: self.em.flush_count(),
            notifications,
        }
    }
}

/// Replays every step of `fixture` and reports the notifications.
pub fn replay(fixture: &Fixture, config: &TrackerConfig, name: &str) -> Result<ReplayReport> {
    let mut replayer = Replayer::new(fixture, config)?;
    for (index, step) in fixture.steps.iter().enumerate() {
        replayer
            .apply(step)
            .with_context(|| format!("step {} ({})", index + 1, step.describe()))?;
    }
    Ok(replayer.finish(name))
}
