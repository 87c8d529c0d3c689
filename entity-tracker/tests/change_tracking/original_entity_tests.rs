use super::support::*;

#[test]
fn original_holds_the_flushed_state() {
    let em = entity_manager();
    let provider = MutationMetadataProvider::default();

    let tall_ship = painting("Tall Ship");
    assert!(provider.create_original_entity(&em, &tall_ship).expect("original").is_none());

    em.persist(&tall_ship).expect("persist");
    em.flush().expect("flush");
    tall_ship.set_field("name", "Seven Provinces");

    let original = provider
        .create_original_entity(&em, &tall_ship)
        .expect("original")
        .expect("flushed entity has an original");
    assert_eq!(original.field("name"), Value::from("Tall Ship"));
    assert_eq!(tall_ship.field("name"), Value::from("Seven Provinces"));
}

#[test]
fn original_is_a_detached_copy() {
    let em = entity_manager();
    let provider = MutationMetadataProvider::default();

    let irises = painting("Irises");
    em.persist(&irises).expect("persist");
    em.flush().expect("flush");

    let original = provider
        .create_original_entity(&em, &irises)
        .expect("original")
        .expect("flushed entity has an original");
    assert!(!original.ptr_eq(&irises));
    assert!(!em.is_in_identity_map(&original));
    assert!(!provider.is_entity_managed(&em, &original));

    original.set_field("name", "Not Irises");
    assert_eq!(irises.field("name"), Value::from("Irises"));
}

#[test]
fn identity_generated_id_comes_from_the_identity_map() {
    let em = entity_manager();
    let provider = MutationMetadataProvider::default();

    let gallery = gallery("Riverstreet 12");
    add_visitor(&gallery, "Foo de Bar");
    em.persist(&gallery).expect("persist");
    em.flush().expect("flush");

    add_visitor(&gallery, "Bar Baz");
    em.flush().expect("flush");

    assert!(em.original_entity_data(&gallery).field("id").is_some_and(Value::is_null));
    let original = provider
        .create_original_entity(&em, &gallery)
        .expect("original")
        .expect("flushed entity has an original");
    assert!(!gallery.field("id").is_null());
    assert_eq!(original.field("id"), gallery.field("id"));
}

#[test]
fn inverse_side_takes_the_current_value() {
    let em = entity_manager();
    let provider = MutationMetadataProvider::default();

    let visitor = EntityRef::from_record("Visitor", Record::new().with_field("name", "Henk de Vries"));
    add_visit(&visitor, 10);
    em.persist(&visitor).expect("persist");
    em.flush().expect("flush");

    visitor.set_field("name", "foobar");
    em.flush().expect("flush");

    let original = provider
        .create_original_entity(&em, &visitor)
        .expect("original")
        .expect("flushed entity has an original");
    assert_eq!(original.field("name"), visitor.field("name"));
    assert_eq!(original.to_many("visits"), visitor.to_many("visits"));
    assert_eq!(original.to_many("visits").len(), 1);
}

#[test]
fn owning_side_takes_the_recorded_target() {
    let em = entity_manager();
    let provider = MutationMetadataProvider::default();

    let start = node("start");
    let end = node("end");
    end.set_to_one("parent", Some(&start));
    em.persist(&start).expect("persist");
    em.persist(&end).expect("persist");
    em.flush().expect("flush");

    let middle = node("middle");
    end.set_to_one("parent", Some(&middle));

    let original = provider
        .create_original_entity(&em, &end)
        .expect("original")
        .expect("flushed entity has an original");
    assert_eq!(original.to_one("parent"), Some(start));
    assert_eq!(original.to_one("mirror"), None);
}

#[test]
fn owning_collection_takes_the_recorded_members() {
    let em = entity_manager();
    let provider = MutationMetadataProvider::default();

    let tolkien = author("J.R.R. Tolkien");
    let silmarillion = add_book(&tolkien, "The Silmarillion");
    em.persist(&tolkien).expect("persist");
    em.flush().expect("flush");

    let christopher = author("Christopher Tolkien");
    silmarillion.add_to_many("authors", &christopher);

    let original = provider
        .create_original_entity(&em, &silmarillion)
        .expect("original")
        .expect("flushed entity has an original");
    assert_eq!(original.to_many("authors"), vec![tolkien]);
    assert_eq!(silmarillion.to_many("authors").len(), 2);
}

#[test]
fn class_without_fields_always_has_an_original() {
    let mut em = entity_manager();
    em.register(ClassMetadata::new("Marker"));
    let provider = MutationMetadataProvider::default();

    let marker = EntityRef::new("Marker");
    let original = provider.create_original_entity(&em, &marker).expect("original");
    assert!(original.is_some_and(|original| original.snapshot().is_some_and(|data| data.is_empty())));
}

#[test]
fn unknown_class_is_reported() {
    let em = entity_manager();
    let err = MutationMetadataProvider::default()
        .create_original_entity(&em, &EntityRef::new("Sculpture"))
        .expect_err("unknown class");
    assert!(matches!(err, TrackerError::UnknownClass { .. }));
}
