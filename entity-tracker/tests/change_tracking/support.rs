#![allow(dead_code)]

pub(crate) use std::{cell::RefCell, rc::Rc};

pub(crate) use chrono::{TimeZone, Utc};
pub(crate) use entity_tracker::{
    AnnotationMetadataProvider, AssociationMapping, ChangeListener, ClassMetadata, Eligibility, EntityRef,
    EntityState, EventArgs, Events, MarkerRegistry, MemoryEntityManager, MutationMetadataProvider,
    PersistenceContext, ProxyTraversal, Record, SharedObject, TrackerConfig, TrackerError, Value,
};

/// Context with every fixture class registered.
pub(crate) fn entity_manager() -> MemoryEntityManager {
    MemoryEntityManager::new()
        .with_class(ClassMetadata::new("Painting").id("id").field("name"))
        .with_class(
            ClassMetadata::new("Gallery")
                .id("id")
                .field("address")
                .association(AssociationMapping::many_to_many("visitors", "Visitor").cascade_persist()),
        )
        .with_class(
            ClassMetadata::new("Visitor")
                .id("id")
                .field("name")
                .association(AssociationMapping::one_to_many("visits", "Visit", "visitor").cascade_persist()),
        )
        .with_class(
            ClassMetadata::new("Visit")
                .id("id")
                .field("date")
                .association(AssociationMapping::many_to_one("visitor", "Visitor").counterpart("visits")),
        )
        .with_class(
            ClassMetadata::new("Node")
                .id("id")
                .field("name")
                .association(AssociationMapping::many_to_one("parent", "Node").counterpart("children"))
                .association(AssociationMapping::one_to_many("children", "Node", "parent"))
                .association(AssociationMapping::one_to_one("mirror", "Node").counterpart("mirrored_by"))
                .association(AssociationMapping::one_to_one_inverse("mirrored_by", "Node", "mirror")),
        )
        .with_class(
            ClassMetadata::new("A")
                .id("id")
                .association(AssociationMapping::one_to_many("bees", "B", "a").cascade_persist()),
        )
        .with_class(
            ClassMetadata::new("B")
                .id("id")
                .association(AssociationMapping::many_to_one("a", "A").counterpart("bees"))
                .association(AssociationMapping::one_to_many("cees", "C", "b").cascade_persist()),
        )
        .with_class(
            ClassMetadata::new("C")
                .id("id")
                .association(AssociationMapping::many_to_one("b", "B").counterpart("cees")),
        )
        .with_class(
            ClassMetadata::new("Author")
                .id("id")
                .field("name")
                .association(AssociationMapping::many_to_many_inverse("books", "Book", "authors").cascade_persist()),
        )
        .with_class(
            ClassMetadata::new("Book")
                .id("id")
                .field("title")
                .association(AssociationMapping::many_to_many("authors", "Author").counterpart("books")),
        )
        .with_class(
            ClassMetadata::new("Toolbox")
                .id("id")
                .field("tag")
                .association(AssociationMapping::one_to_many("tools", "Tool", "toolbox").cascade_persist()),
        )
        .with_class(
            ClassMetadata::new("Tool")
                .id("id")
                .field("name")
                .association(AssociationMapping::many_to_one("toolbox", "Toolbox").counterpart("tools")),
        )
}

pub(crate) fn painting(name: &str) -> EntityRef {
    EntityRef::from_record("Painting", Record::new().with_field("name", name))
}

pub(crate) fn node(name: &str) -> EntityRef {
    EntityRef::from_record("Node", Record::new().with_field("name", name))
}

pub(crate) fn gallery(address: &str) -> EntityRef {
    EntityRef::from_record("Gallery", Record::new().with_field("address", address))
}

pub(crate) fn add_visitor(gallery: &EntityRef, name: &str) -> EntityRef {
    let visitor = EntityRef::from_record("Visitor", Record::new().with_field("name", name));
    gallery.add_to_many("visitors", &visitor);
    visitor
}

pub(crate) fn add_visit(visitor: &EntityRef, day: u32) -> EntityRef {
    let date = Utc.with_ymd_and_hms(2016, 10, day, 10, 10, 10).single().expect("valid date");
    let visit = EntityRef::from_record("Visit", Record::new().with_field("date", date));
    visit.set_to_one("visitor", Some(visitor));
    visitor.add_to_many("visits", &visit);
    visit
}

pub(crate) fn author(name: &str) -> EntityRef {
    EntityRef::from_record("Author", Record::new().with_field("name", name))
}

pub(crate) fn add_book(author: &EntityRef, title: &str) -> EntityRef {
    let book = EntityRef::from_record("Book", Record::new().with_field("title", title));
    author.add_to_many("books", &book);
    book.add_to_many("authors", author);
    book
}

pub(crate) fn toolbox(tools: &[&str]) -> EntityRef {
    let toolbox = EntityRef::new("Toolbox");
    for name in tools {
        add_tool(&toolbox, name);
    }
    toolbox
}

pub(crate) fn add_tool(toolbox: &EntityRef, name: &str) -> EntityRef {
    let tool = EntityRef::from_record("Tool", Record::new().with_field("name", name));
    tool.set_to_one("toolbox", Some(toolbox));
    toolbox.add_to_many("tools", &tool);
    tool
}

/// `entityChanged` payload copied out of the event.
#[derive(Debug, Clone)]
pub(crate) struct Notification {
    pub(crate) current: EntityRef,
    pub(crate) original: Option<EntityRef>,
    pub(crate) mutated_fields: Vec<String>,
    /// Field data of the current entity at notification time.
    pub(crate) current_data: Record,
}

/// Change listener tracking a fixed set of classes, plus a subscriber that
/// records every notification.
pub(crate) struct Recorder {
    events: Rc<RefCell<Vec<Notification>>>,
}

impl Recorder {
    pub(crate) fn attach(em: &MemoryEntityManager, tracked: &[&str]) -> Self {
        Self::attach_with(em, tracked, &TrackerConfig::default())
    }

    pub(crate) fn attach_with(em: &MemoryEntityManager, tracked: &[&str], config: &TrackerConfig) -> Self {
        let mut registry = MarkerRegistry::new();
        for class in tracked {
            registry.track(*class);
        }
        Rc::new(ChangeListener::from_config(registry, config)).subscribe(em.event_manager());

        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        em.event_manager().subscribe(Events::ENTITY_CHANGED, move |args| {
            if let EventArgs::EntityChanged(event) = args {
                sink.borrow_mut().push(Notification {
                    current: event.current_entity().clone(),
                    original: event.original_entity().cloned(),
                    mutated_fields: event.mutated_fields().to_vec(),
                    current_data: event.current_entity().snapshot().unwrap_or_default(),
                });
            }
            Ok(())
        });

        Self { events }
    }

    pub(crate) fn take(&self) -> Vec<Notification> {
        std::mem::take(&mut *self.events.borrow_mut())
    }

    pub(crate) fn len(&self) -> usize {
        self.events.borrow().len()
    }
}

pub(crate) fn fields(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| name.to_string()).collect()
}
