use super::support::*;

#[test]
fn flushed_entity_with_changes_is_collected() {
    let em = entity_manager();
    let provider = MutationMetadataProvider::default();

    let sunflowers = painting("Sunflowers");
    em.persist(&sunflowers).expect("persist");
    em.flush().expect("flush");
    sunflowers.set_field("name", "The Sunflowers");

    let change_set = provider.compute_full_change_set(&em).expect("change set");
    assert_eq!(change_set.len(), 1);
    assert_eq!(change_set.get("Painting"), Some(&[sunflowers][..]));
}

#[test]
fn new_entities_reached_from_scheduled_insertions() {
    let em = entity_manager();
    let provider = MutationMetadataProvider::default();

    let gallery = gallery("foobar street 10");
    let henk = add_visitor(&gallery, "henk");
    em.persist(&gallery).expect("persist");
    let hans = add_visitor(&gallery, "hans");

    let change_set = provider.compute_full_change_set(&em).expect("change set");
    assert_eq!(change_set.classes(), vec!["Gallery", "Visitor"]);
    assert_eq!(change_set.get("Gallery"), Some(&[gallery][..]));
    assert_eq!(change_set.get("Visitor"), Some(&[hans, henk][..]));
}

#[test]
fn new_entities_reached_from_managed_entities() {
    let em = entity_manager();
    let provider = MutationMetadataProvider::default();

    let gallery = gallery("foobar street 10");
    let henk = add_visitor(&gallery, "henk");
    em.persist(&gallery).expect("persist");
    em.flush().expect("flush");
    let hans = add_visitor(&gallery, "hans");

    let change_set = provider.compute_full_change_set(&em).expect("change set");
    assert_eq!(change_set.get("Gallery"), Some(&[gallery][..]));
    assert_eq!(change_set.get("Visitor"), Some(&[hans, henk][..]));
}

#[test]
fn cascade_recurses_through_new_entities() {
    let em = entity_manager();
    let provider = MutationMetadataProvider::default();

    let a = EntityRef::new("A");
    let b1 = EntityRef::new("B");
    a.add_to_many("bees", &b1);
    b1.set_to_one("a", Some(&a));
    em.persist(&a).expect("persist a");
    em.persist(&b1).expect("persist b1");
    em.flush().expect("flush");

    let b2 = EntityRef::new("B");
    let c = EntityRef::new("C");
    a.add_to_many("bees", &b2);
    b2.set_to_one("a", Some(&a));
    b2.add_to_many("cees", &c);
    c.set_to_one("b", Some(&b2));

    let change_set = provider.compute_full_change_set(&em).expect("change set");
    assert_eq!(change_set.get("A").map(<[_]>::len), Some(1));
    assert_eq!(change_set.get("B").map(<[_]>::len), Some(2));
    assert_eq!(change_set.get("C"), Some(&[c][..]));
}

#[test]
fn associations_without_cascade_are_not_walked() {
    let em = entity_manager();
    let provider = MutationMetadataProvider::default();

    let root = node("root");
    let mirror = node("mirror");
    root.set_to_one("mirror", Some(&mirror));
    em.persist(&root).expect("persist");

    let change_set = provider.compute_full_change_set(&em).expect("change set");
    assert_eq!(change_set.get("Node"), Some(&[root][..]));
    assert!(!change_set.contains(&mirror));
}

#[test]
fn entities_appear_once_per_bucket() {
    let em = entity_manager();
    let provider = MutationMetadataProvider::default();

    let north = gallery("north wing");
    let south = gallery("south wing");
    em.persist(&north).expect("persist");
    em.persist(&south).expect("persist");

    let shared = add_visitor(&north, "shared");
    north.add_to_many("visitors", &shared);
    south.add_to_many("visitors", &shared);

    let change_set = provider.compute_full_change_set(&em).expect("change set");
    assert_eq!(change_set.get("Gallery"), Some(&[north, south][..]));
    assert_eq!(change_set.get("Visitor"), Some(&[shared][..]));
}

#[test]
fn subclasses_share_the_root_bucket() {
    let mut em = entity_manager();
    em.register(
        ClassMetadata::new("Watercolor")
            .root("Painting")
            .id("id")
            .field("name")
            .field("paper"),
    );
    let provider = MutationMetadataProvider::default();

    let irises = painting("Irises");
    let wheatfield = EntityRef::from_record("Watercolor", Record::new().with_field("name", "Wheatfield"));
    em.persist(&irises).expect("persist");
    em.persist(&wheatfield).expect("persist");

    let change_set = provider.compute_full_change_set(&em).expect("change set");
    assert_eq!(change_set.classes(), vec!["Painting"]);
    assert_eq!(change_set.get("Painting"), Some(&[irises, wheatfield][..]));
}

#[test]
fn empty_unit_of_work_gives_empty_change_set() {
    let em = entity_manager();
    let change_set = MutationMetadataProvider::default()
        .compute_full_change_set(&em)
        .expect("change set");
    assert!(change_set.is_empty());
}

#[test]
fn unknown_classes_cannot_be_persisted() {
    let em = entity_manager();
    let stranger = EntityRef::new("Sculpture");
    let err = em.persist(&stranger).expect_err("unknown class");
    assert!(matches!(err, TrackerError::UnknownClass { .. }));
}

#[test]
fn managed_state_follows_the_lifecycle() {
    let em = entity_manager();
    let provider = MutationMetadataProvider::default();

    let apples = painting("Apples of Cezanne");
    assert!(!provider.is_entity_managed(&em, &apples));

    em.persist(&apples).expect("persist");
    assert!(provider.is_entity_managed(&em, &apples));

    em.flush().expect("flush");
    assert!(provider.is_entity_managed(&em, &apples));

    em.remove(&apples).expect("remove");
    assert!(!provider.is_entity_managed(&em, &apples));
    assert_eq!(em.entity_state(&apples, None), EntityState::Removed);
}
