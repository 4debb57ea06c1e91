use planlog_engine::{add_scenario, apply, EditRequest, RepresentationSynchronizer, StyleTable};
use planlog_model::{reserved, EditLog, EditStatus, Feature, LayerDescriptor};
use planlog_test_utils::{area, id, published_log, sample_layer, scenario, seeded_log, typed_area};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn remote_layer() -> LayerDescriptor {
    sample_layer("l2", "Remote")
}

fn baseline(count: usize) -> Vec<Feature> {
    (0..count)
        .map(|i| {
            typed_area(&format!("p{i}"), i as f64 * 5.0, "Sponge")
                .with_attribute(reserved::GLOBAL_ID, format!("{{G-{i}}}"))
        })
        .collect()
}

#[test]
fn add_then_delete_leaves_no_trace() {
    let log = apply(&EditLog::new(), &EditRequest::add(sample_layer("l1", "L1"), vec![area("A", 0.0)])).unwrap();
    let log = apply(&log, &EditRequest::delete(sample_layer("l1", "L1"), vec![area("A", 0.0)])).unwrap();

    let layer = log.layer(&id("l1")).unwrap();
    assert!(layer.adds.is_empty());
    assert!(layer.deletes.is_empty());
    assert_eq!(log.sequence, 2);
}

#[test]
fn update_of_published_feature_shadows_baseline() {
    let original = baseline(1).remove(0);
    let log = published_log(vec![original.clone()]);
    let changed = original.clone().with_attribute("NOTES", "moved north");

    let log = apply(&log, &EditRequest::update(remote_layer(), vec![changed.clone()])).unwrap();

    let layer = log.layer(&id("l2")).unwrap();
    assert_eq!(layer.updates.iter().cloned().collect::<Vec<_>>(), vec![changed.clone()]);
    assert!(layer.published.iter().any(|f| f == &original));
    assert_eq!(layer.status, EditStatus::Edited);
    assert_eq!(layer.effective_features(), vec![changed]);
}

#[test]
fn delete_of_published_feature_queues_global_id() {
    let log = published_log(baseline(2));
    // caller's copy lacks the remote id
    let log = apply(&log, &EditRequest::delete(remote_layer(), vec![area("p1", 0.0)])).unwrap();

    let layer = log.layer(&id("l2")).unwrap();
    assert_eq!(layer.deletes.len(), 1);
    assert_eq!(layer.deletes[0].global_id.as_deref(), Some("{G-1}"));
    assert_eq!(layer.effective_features().len(), 1);
}

#[test]
fn seeded_plan_holds_pending_layer() {
    let log = seeded_log();
    let plan = log.scenario(&id("s1")).unwrap();
    assert_eq!(plan.layers.len(), 1);
    assert_eq!(plan.layers[0].adds.len(), 2);
    assert_eq!(plan.status, EditStatus::Added);
}

proptest! {
    #[test]
    fn prop_repeated_update_is_idempotent(count in 1usize..6, pick in 0usize..6, x in -50.0f64..50.0) {
        let features = baseline(count);
        let target = features[pick % count].clone();
        let changed = Feature { geometry: area("tmp", x).geometry, ..target };
        let request = EditRequest::update(remote_layer(), vec![changed]);

        let once = apply(&published_log(features), &request).unwrap();
        let twice = apply(&once, &request).unwrap();

        prop_assert_eq!(twice.sequence, once.sequence + 1);
        let (a, b) = (once.layer(&id("l2")).unwrap(), twice.layer(&id("l2")).unwrap());
        prop_assert_eq!(&a.adds, &b.adds);
        prop_assert_eq!(&a.updates, &b.updates);
        prop_assert_eq!(&a.deletes, &b.deletes);
        prop_assert_eq!(&a.published, &b.published);
    }

    #[test]
    fn prop_move_collapses_buckets(count in 1usize..6, updated in 0usize..6, deleted in proptest::option::of(0usize..6)) {
        let features = baseline(count);
        let mut log = published_log(features.clone());
        log = apply(&log, &EditRequest::update(remote_layer(), vec![features[updated % count].clone()])).unwrap();
        if let Some(index) = deleted {
            log = apply(&log, &EditRequest::delete(remote_layer(), vec![features[index % count].clone()])).unwrap();
        }
        log = add_scenario(&log, &scenario("s2", "Destination")).unwrap();
        let expected = log.layer(&id("l2")).unwrap().effective_features().len();

        let moved = apply(&log, &EditRequest::move_to(remote_layer(), id("s2"))).unwrap();

        let destination = moved.scenario(&id("s2")).unwrap();
        let layer = destination.layer(&id("l2")).unwrap();
        prop_assert!(layer.updates.is_empty());
        prop_assert!(layer.published.is_empty());
        prop_assert!(layer.deletes.is_empty());
        prop_assert_eq!(layer.remote_id, None);
        prop_assert_eq!(layer.adds.len(), expected);
        prop_assert!(moved.entries.iter().all(|e| e.as_layer().is_none()));
    }

    #[test]
    fn prop_pre_publish_delete_erases(keys in proptest::collection::btree_set("[a-z]{1,6}", 1..6)) {
        let features: Vec<Feature> = keys.iter().enumerate().map(|(i, k)| area(k, i as f64)).collect();
        let layer = sample_layer("l1", "L1");

        let log = apply(&EditLog::new(), &EditRequest::add(layer.clone(), features.clone())).unwrap();
        let log = apply(&log, &EditRequest::delete(layer, features)).unwrap();

        let record = log.layer(&id("l1")).unwrap();
        prop_assert!(record.adds.is_empty());
        prop_assert!(record.deletes.is_empty());
    }
}

#[derive(Debug, Clone)]
enum Op {
    Add(usize, f64),
    Update(usize, f64),
    Delete(usize),
    Move(bool),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0usize..8, -20.0f64..20.0).prop_map(|(k, x)| Op::Add(k, x)),
        (0usize..8, -20.0f64..20.0).prop_map(|(k, x)| Op::Update(k, x)),
        (0usize..8).prop_map(Op::Delete),
        any::<bool>().prop_map(Op::Move),
    ]
}

proptest! {
    #[test]
    fn prop_mirrors_follow_authoritative_layer(ops in proptest::collection::vec(op(), 1..30)) {
        let layer = remote_layer();
        let mut log = published_log(baseline(3));
        log = add_scenario(&log, &scenario("s1", "First")).unwrap();
        log = add_scenario(&log, &scenario("s2", "Second")).unwrap();

        let mut sync = RepresentationSynchronizer::new(StyleTable::default());
        sync.resync_log(&log);

        for op in ops {
            let request = match op {
                Op::Add(k, x) => EditRequest::add(layer.clone(), vec![area(&format!("n{k}"), x)]),
                Op::Update(k, x) => EditRequest::update(layer.clone(), vec![area(&format!("p{}", k % 3), x)]),
                Op::Delete(k) => EditRequest::delete(layer.clone(), vec![area(&format!("n{k}"), 0.0)]),
                Op::Move(first) => EditRequest::move_to(layer.clone(), id(if first { "s1" } else { "s2" })),
            };
            log = apply(&log, &request).unwrap();
            sync.on_edit(&log, &request);
        }

        prop_assert!(sync.is_in_sync(&log));
        let mut authoritative: Vec<_> = log.layer(&id("l2")).unwrap()
            .effective_features()
            .into_iter()
            .map(|f| f.identity)
            .collect();
        authoritative.sort();
        let points: Vec<_> = sync.points(&id("l2")).iter().map(|g| g.feature.identity.clone()).collect();
        let hybrid: Vec<_> = sync.hybrid(&id("l2")).iter().map(|g| g.feature.identity.clone()).collect();
        prop_assert_eq!(&points, &authoritative);
        prop_assert_eq!(&hybrid, &authoritative);
    }
}
