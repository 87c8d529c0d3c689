use super::support::*;

/// Context holding a stored `Painting` row with id 1 that is no longer in the
/// identity map.
fn stored_painting() -> MemoryEntityManager {
    let em = entity_manager();
    let irises = painting("Irises");
    em.persist(&irises).expect("persist");
    em.flush().expect("flush");
    em.detach(&irises);
    em
}

fn config(eligibility: Eligibility, proxy_traversal: ProxyTraversal) -> TrackerConfig {
    TrackerConfig {
        eligibility,
        proxy_traversal,
    }
}

#[test]
fn unloaded_reference_is_left_alone() {
    let em = stored_painting();
    let recorder = Recorder::attach(&em, &["Painting"]);

    let reference = em.get_reference("Painting", 1).expect("reference");
    assert!(!reference.is_initialized());
    em.flush().expect("flush");

    assert_eq!(recorder.len(), 0);
    assert!(!reference.is_initialized());
    assert_eq!(em.entity_state(&reference, None), EntityState::Managed);
}

#[test]
fn load_traversal_initializes_references() {
    let em = stored_painting();
    let recorder = Recorder::attach_with(
        &em,
        &["Painting"],
        &config(Eligibility::Initialized, ProxyTraversal::Load),
    );

    let reference = em.get_reference("Painting", 1).expect("reference");
    em.flush().expect("flush");

    assert!(reference.is_initialized());
    assert_eq!(reference.field("name"), Value::from("Irises"));
    assert_eq!(recorder.len(), 0);
}

#[test]
fn managed_eligibility_diffs_loaded_references() {
    let em = stored_painting();
    let recorder = Recorder::attach_with(
        &em,
        &["Painting"],
        &config(Eligibility::Managed, ProxyTraversal::Skip),
    );

    let reference = em.get_reference("Painting", 1).expect("reference");
    em.flush().expect("flush");
    assert!(reference.is_initialized());
    assert_eq!(recorder.len(), 0);

    reference.set_field("name", "Irises (1889)");
    em.flush().expect("flush");
    let events = recorder.take();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].mutated_fields, fields(&["name"]));
}

#[test]
fn missing_row_fails_the_flush() {
    let em = entity_manager();
    let _recorder = Recorder::attach_with(
        &em,
        &["Painting"],
        &config(Eligibility::Initialized, ProxyTraversal::Load),
    );

    em.get_reference("Painting", 99).expect("reference");
    let err = em.flush().expect_err("missing row");

    assert!(matches!(err, TrackerError::ProxyLoad { ref identifier, .. } if identifier == &["99"]));
    assert_eq!(em.flush_count(), 0);
}

#[test]
fn found_entity_is_diffed_against_its_row() {
    let em = stored_painting();
    let recorder = Recorder::attach(&em, &["Painting"]);

    let irises = em.find("Painting", 1).expect("find").expect("row exists");
    assert!(irises.is_initialized());
    irises.set_field("name", "Les Iris");
    em.flush().expect("flush");

    let events = recorder.take();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].mutated_fields, fields(&["name"]));
    let original = events[0].original.as_ref().expect("original");
    assert_eq!(original.field("name"), Value::from("Irises"));
    assert_eq!(original.field("id"), Value::from(1));
}

#[test]
fn reference_behind_an_association_is_not_loaded() {
    let em = stored_painting();
    let recorder = Recorder::attach(&em, &["Node"]);

    let start = node("start");
    em.persist(&start).expect("persist");
    em.flush().expect("flush");
    recorder.take();

    let reference = em.get_reference("Node", start.field("id")).expect("reference");
    assert!(reference.ptr_eq(&start));

    em.detach(&start);
    let proxy = em.get_reference("Node", 2).expect("reference");
    let end = node("end");
    end.set_to_one("parent", Some(&proxy));
    em.persist(&end).expect("persist");
    em.flush().expect("flush");

    let events = recorder.take();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].current, end);
    assert!(!proxy.is_initialized());
}
