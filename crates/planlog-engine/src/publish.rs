//! Publish identity mapping
//!
//! Publishing runs in two halves around the network. Before apply-edits,
//! [`reconcile_created_layers`] matches the create-layers response back to
//! local records by name: a sublayer named after a layer's label is the
//! layer itself, `<label>-points` is its points companion. After
//! apply-edits, [`commit_published`] folds the accepted edits into the
//! baseline.

use crate::error::{EngineError, ValidationError};
use crate::locator;
use im::Vector;
use planlog_model::{
    reserved, EditLog, EditStatus, Feature, Identity, LayerRecord, ServiceRef,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, warn};

/// Name suffix of a points sublayer
pub const POINTS_SUFFIX: &str = "-points";

/// One entry of a create-layers response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedLayer {
    /// Remote sublayer id
    pub id: u32,
    /// Sublayer name
    pub name: String,
}

impl CreatedLayer {
    /// Create new entry
    #[must_use]
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// Remote sublayer ids of one logical layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteLayerIds {
    /// Polygon sublayer
    pub service_id: u32,
    /// Points sublayer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points_service_id: Option<u32>,
}

/// Local layer identity to remote sublayer ids
pub type IdentityMap = BTreeMap<Identity, RemoteLayerIds>;

/// Name of the points sublayer for a label
#[must_use]
pub fn points_name(label: &str) -> String {
    format!("{label}{POINTS_SUFFIX}")
}

/// Identity map of every layer that already has a remote id
#[must_use]
pub fn identity_map(log: &EditLog) -> IdentityMap {
    log.layers()
        .filter_map(|layer| {
            layer.remote_id.map(|service_id| {
                (
                    layer.identity.clone(),
                    RemoteLayerIds {
                        service_id,
                        points_service_id: layer.points_remote_id,
                    },
                )
            })
        })
        .collect()
}

/// Match a create-layers response to unpublished layer records
///
/// Only records still missing a main or points id are eligible, so a second
/// run with the same response changes nothing. Entries are consumed in
/// order. A `<label>-points` entry fills the points id of a record whose
/// main id is already known, since the service lists each points sublayer
/// after its polygon sublayer; otherwise an entry named after a label fills
/// the main id of the first such record still without one, which keeps
/// duplicate labels apart. Unmatched entries are logged and skipped.
#[must_use]
pub fn reconcile_created_layers(log: &EditLog, response: &[CreatedLayer]) -> (EditLog, IdentityMap) {
    reconcile(log, log.layers(), response)
}

/// Same as [`reconcile_created_layers`], limited to one scenario's layers
///
/// Layers of other plans may share a label with the ones just created; this
/// keeps them out of the match.
///
/// # Errors
/// Returns error if the scenario does not exist
pub fn reconcile_scenario_layers(
    log: &EditLog,
    scenario: &Identity,
    response: &[CreatedLayer],
) -> Result<(EditLog, IdentityMap), EngineError> {
    let record = log
        .scenario(scenario)
        .ok_or_else(|| ValidationError::ScenarioNotFound(scenario.clone()))?;
    Ok(reconcile(log, record.layers.iter(), response))
}

struct Slot {
    identity: Identity,
    label: String,
    wants_points: bool,
    main: Option<u32>,
    points: Option<u32>,
}

impl Slot {
    fn awaits_points(&self, label: &str) -> bool {
        self.wants_points && self.points.is_none() && self.label == label
    }
}

fn reconcile<'a>(
    log: &EditLog,
    candidates: impl Iterator<Item = &'a LayerRecord>,
    response: &[CreatedLayer],
) -> (EditLog, IdentityMap) {
    let mut slots: Vec<Slot> = candidates
        .filter(|l| l.lacks_sublayers())
        .map(|l| Slot {
            identity: l.identity.clone(),
            label: l.label.clone(),
            wants_points: l.kind.has_companions(),
            main: l.remote_id,
            points: l.points_remote_id,
        })
        .collect();

    for created in response {
        let base = created.name.strip_suffix(POINTS_SUFFIX);
        let points_ready = base.and_then(|label| {
            slots
                .iter()
                .position(|s| s.awaits_points(label) && s.main.is_some())
        });
        let main = slots
            .iter()
            .position(|s| s.label == created.name && s.main.is_none());
        let points_any = base.and_then(|label| slots.iter().position(|s| s.awaits_points(label)));

        if let Some(index) = points_ready {
            slots[index].points = Some(created.id);
        } else if let Some(index) = main {
            slots[index].main = Some(created.id);
        } else if let Some(index) = points_any {
            slots[index].points = Some(created.id);
        } else {
            warn!(id = created.id, name = %created.name, "no local layer for created sublayer");
        }
    }

    let mut next = log.clone();
    let mut changed = false;
    for position in locator::layer_positions(log) {
        let Some(layer) = locator::layer_at_mut(&mut next, position) else {
            continue;
        };
        let Some(slot) = slots.iter().find(|s| s.identity == layer.identity) else {
            continue;
        };
        if slot.main != layer.remote_id || slot.points != layer.points_remote_id {
            layer.remote_id = slot.main;
            layer.points_remote_id = slot.points;
            changed = true;
        }
    }
    if changed {
        next.sequence += 1;
        debug!(
            layers = slots.len(),
            sequence = next.sequence,
            "reconciled created layers"
        );
    }

    let map = identity_map(&next);
    (next, map)
}

/// Record the hosted service a scenario publishes to
///
/// # Errors
/// Returns error if the scenario does not exist
pub fn attach_service(
    log: &EditLog,
    scenario: &Identity,
    service: &ServiceRef,
) -> Result<EditLog, EngineError> {
    let index = locator::scenario_index(log, scenario)
        .ok_or_else(|| ValidationError::ScenarioNotFound(scenario.clone()))?;
    if log
        .scenario(scenario)
        .is_some_and(|s| s.service.as_ref() == Some(service))
    {
        return Ok(log.clone());
    }

    let mut next = log.clone();
    if let Some(record) = locator::scenario_at_mut(&mut next, index) {
        record.service = Some(service.clone());
    }
    next.sequence += 1;
    debug!(scenario = %scenario, url = %service.url, "attached service");
    Ok(next)
}

/// Error reported for one rejected edit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditFailure {
    /// Service error code
    #[serde(default)]
    pub code: i64,
    /// Message
    #[serde(default)]
    pub description: String,
}

/// Outcome of one feature edit in an apply-edits response
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureEditResult {
    /// Object id assigned or touched
    #[serde(default)]
    pub object_id: Option<i64>,
    /// Global id assigned or touched
    #[serde(default)]
    pub global_id: Option<String>,
    /// Whether the edit was accepted
    pub success: bool,
    /// Rejection details
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<EditFailure>,
}

impl FeatureEditResult {
    /// Accepted edit
    #[must_use]
    pub fn accepted(object_id: i64, global_id: impl Into<String>) -> Self {
        Self {
            object_id: Some(object_id),
            global_id: Some(global_id.into()),
            success: true,
            error: None,
        }
    }

    /// Rejected edit
    #[must_use]
    pub fn rejected(code: i64, description: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(EditFailure {
                code,
                description: description.into(),
            }),
            ..Self::default()
        }
    }
}

/// Per-sublayer apply-edits outcome, positionally aligned with the request
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedEdits {
    /// Sublayer id
    #[serde(default)]
    pub id: u32,
    /// Results for `adds`
    #[serde(default)]
    pub add_results: Vec<FeatureEditResult>,
    /// Results for `updates`
    #[serde(default)]
    pub update_results: Vec<FeatureEditResult>,
    /// Results for `deletes`
    #[serde(default)]
    pub delete_results: Vec<FeatureEditResult>,
}

impl AppliedEdits {
    /// Number of rejected edits
    #[must_use]
    pub fn failures(&self) -> usize {
        self.add_results
            .iter()
            .chain(&self.update_results)
            .chain(&self.delete_results)
            .filter(|r| !r.success)
            .count()
    }
}

fn accepted(results: &[FeatureEditResult], index: usize) -> Option<&FeatureEditResult> {
    results.get(index).filter(|r| r.success)
}

fn stamp_remote_ids(mut feature: Feature, result: &FeatureEditResult) -> Feature {
    if let Some(global_id) = &result.global_id {
        feature.attributes.insert(reserved::GLOBAL_ID, global_id.as_str());
    }
    if let Some(object_id) = result.object_id {
        feature.attributes.insert(reserved::OBJECT_ID, object_id);
    }
    feature
}

fn upsert(bucket: &mut Vector<Feature>, feature: Feature) {
    match bucket.iter().position(|f| f.identity == feature.identity) {
        Some(index) => {
            bucket.set(index, feature);
        }
        None => bucket.push_back(feature),
    }
}

fn fold_results(layer: &mut LayerRecord, results: &AppliedEdits) {
    let mut published = layer.published.clone();

    let mut adds = Vector::new();
    for (index, feature) in layer.adds.iter().enumerate() {
        match accepted(&results.add_results, index) {
            Some(result) => upsert(&mut published, stamp_remote_ids(feature.clone(), result)),
            None => adds.push_back(feature.clone()),
        }
    }

    let mut updates = Vector::new();
    for (index, feature) in layer.updates.iter().enumerate() {
        match accepted(&results.update_results, index) {
            Some(result) => upsert(&mut published, stamp_remote_ids(feature.clone(), result)),
            None => updates.push_back(feature.clone()),
        }
    }

    let mut deletes = Vector::new();
    let mut removed = HashSet::new();
    for (index, entry) in layer.deletes.iter().enumerate() {
        if accepted(&results.delete_results, index).is_some() {
            removed.insert(entry.identity.clone());
        } else {
            deletes.push_back(entry.clone());
        }
    }
    published.retain(|f| !removed.contains(&f.identity));

    layer.adds = adds;
    layer.updates = updates;
    layer.deletes = deletes;
    layer.published = published;
    layer.status = if layer.has_pending_edits() {
        EditStatus::Edited
    } else {
        EditStatus::Published
    };
}

/// Fold an apply-edits outcome into a layer's baseline
///
/// Accepted adds and updates replace their baseline entry by identity and
/// pick up the remote global and object ids; accepted deletes leave the
/// baseline. Rejected edits stay pending and keep the layer `edited`.
///
/// # Errors
/// Returns error if the layer does not exist
pub fn commit_published(
    log: &EditLog,
    layer: &Identity,
    results: &AppliedEdits,
) -> Result<EditLog, EngineError> {
    let position = locator::locate(log, layer)
        .position()
        .ok_or_else(|| ValidationError::LayerNotFound(layer.clone()))?;

    let mut next = log.clone();
    let record = locator::layer_at_mut(&mut next, position)
        .ok_or_else(|| ValidationError::LayerNotFound(layer.clone()))?;
    fold_results(record, results);
    let status = record.status;

    if let Some(index) = position.scenario_index() {
        if let Some(scenario) = locator::scenario_at_mut(&mut next, index) {
            scenario.status = if scenario.layers.iter().all(|l| l.status == EditStatus::Published) {
                EditStatus::Published
            } else {
                EditStatus::Edited
            };
        }
    }
    next.sequence += 1;

    debug!(
        layer = %layer,
        ?status,
        failures = results.failures(),
        sequence = next.sequence,
        "committed published edits"
    );
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconciler::{add_scenario, apply, EditRequest};
    use planlog_model::{Geometry, LayerDescriptor, LayerKind, Polygon, ScenarioDescriptor};
    use pretty_assertions::assert_eq;

    fn id(key: &str) -> Identity {
        Identity::new(key).unwrap()
    }

    fn feature(key: &str) -> Feature {
        Feature::new(id(key), Geometry::Polygon(Polygon::square(0.0, 0.0, 1.0)))
    }

    fn pending(label: &str, key: &str) -> EditRequest {
        EditRequest::add(
            LayerDescriptor::new(id(key), label, LayerKind::SampleArea),
            vec![feature(&format!("{key}-f"))],
        )
        .with_scenario(id("s1"))
    }

    fn plan_with(requests: &[EditRequest]) -> EditLog {
        let mut log = add_scenario(&EditLog::new(), &ScenarioDescriptor::new(id("s1"), "Plan")).unwrap();
        for request in requests {
            log = apply(&log, request).unwrap();
        }
        log
    }

    #[test]
    fn matches_main_and_points_by_name() {
        let log = plan_with(&[pending("Plan A", "l1")]);
        let response = [CreatedLayer::new(10, "Plan A"), CreatedLayer::new(11, "Plan A-points")];
        let (next, map) = reconcile_created_layers(&log, &response);

        let layer = next.layer(&id("l1")).unwrap();
        assert_eq!(layer.remote_id, Some(10));
        assert_eq!(layer.points_remote_id, Some(11));
        assert_eq!(layer.status, EditStatus::Added);
        assert_eq!(
            map.get(&id("l1")),
            Some(&RemoteLayerIds {
                service_id: 10,
                points_service_id: Some(11)
            })
        );
        assert_eq!(next.sequence, log.sequence + 1);
    }

    #[test]
    fn second_reconcile_is_noop() {
        let log = plan_with(&[pending("Plan A", "l1")]);
        let response = [CreatedLayer::new(10, "Plan A"), CreatedLayer::new(11, "Plan A-points")];
        let (once, _) = reconcile_created_layers(&log, &response);
        let (twice, map) = reconcile_created_layers(&once, &response);
        assert_eq!(twice, once);
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn duplicate_labels_are_assigned_in_order() {
        let log = plan_with(&[pending("Samples", "l1"), pending("Samples", "l2")]);
        let response = [
            CreatedLayer::new(0, "Samples"),
            CreatedLayer::new(1, "Samples-points"),
            CreatedLayer::new(2, "Samples"),
            CreatedLayer::new(3, "Samples-points"),
        ];
        let (next, _) = reconcile_created_layers(&log, &response);
        assert_eq!(next.layer(&id("l1")).unwrap().remote_id, Some(0));
        assert_eq!(next.layer(&id("l1")).unwrap().points_remote_id, Some(1));
        assert_eq!(next.layer(&id("l2")).unwrap().remote_id, Some(2));
        assert_eq!(next.layer(&id("l2")).unwrap().points_remote_id, Some(3));
    }

    #[test]
    fn label_ending_in_points_suffix() {
        let log = plan_with(&[pending("Trace-points", "l1")]);
        let response = [CreatedLayer::new(4, "Trace-points"), CreatedLayer::new(5, "Trace-points-points")];
        let (next, _) = reconcile_created_layers(&log, &response);
        let layer = next.layer(&id("l1")).unwrap();
        assert_eq!((layer.remote_id, layer.points_remote_id), (Some(4), Some(5)));
    }

    #[test]
    fn labels_differing_by_points_suffix() {
        let log = plan_with(&[pending("Plan", "l1"), pending("Plan-points", "l2")]);
        let response = [
            CreatedLayer::new(0, "Plan"),
            CreatedLayer::new(1, "Plan-points"),
            CreatedLayer::new(2, "Plan-points"),
            CreatedLayer::new(3, "Plan-points-points"),
        ];
        let (next, _) = reconcile_created_layers(&log, &response);
        let first = next.layer(&id("l1")).unwrap();
        let second = next.layer(&id("l2")).unwrap();
        assert_eq!((first.remote_id, first.points_remote_id), (Some(0), Some(1)));
        assert_eq!((second.remote_id, second.points_remote_id), (Some(2), Some(3)));
    }

    #[test]
    fn labels_differing_by_points_suffix_in_reverse_order() {
        let log = plan_with(&[pending("Plan-points", "l2"), pending("Plan", "l1")]);
        let response = [
            CreatedLayer::new(0, "Plan-points"),
            CreatedLayer::new(1, "Plan-points-points"),
            CreatedLayer::new(2, "Plan"),
            CreatedLayer::new(3, "Plan-points"),
        ];
        let (next, _) = reconcile_created_layers(&log, &response);
        let first = next.layer(&id("l1")).unwrap();
        let second = next.layer(&id("l2")).unwrap();
        assert_eq!((second.remote_id, second.points_remote_id), (Some(0), Some(1)));
        assert_eq!((first.remote_id, first.points_remote_id), (Some(2), Some(3)));
    }

    #[test]
    fn missing_points_id_is_filled_later() {
        let log = plan_with(&[pending("Plan A", "l1")]);
        let (half, _) = reconcile_created_layers(&log, &[CreatedLayer::new(10, "Plan A")]);
        assert_eq!(half.layer(&id("l1")).unwrap().points_remote_id, None);

        let (full, _) = reconcile_created_layers(&half, &[CreatedLayer::new(10, "Plan A"), CreatedLayer::new(11, "Plan A-points")]);
        let layer = full.layer(&id("l1")).unwrap();
        assert_eq!((layer.remote_id, layer.points_remote_id), (Some(10), Some(11)));
    }

    #[test]
    fn unmatched_entries_are_skipped() {
        let log = plan_with(&[pending("Plan A", "l1")]);
        let (next, map) = reconcile_created_layers(&log, &[CreatedLayer::new(99, "Other")]);
        assert_eq!(next, log);
        assert!(map.is_empty());
    }

    #[test]
    fn scoped_reconcile_ignores_other_plans() {
        let log = plan_with(&[pending("Samples", "l1")]);
        let other = EditRequest::add(
            LayerDescriptor::new(id("root"), "Samples", LayerKind::SampleArea),
            vec![feature("r-f")],
        );
        let log = apply(&log, &other).unwrap();

        let response = [CreatedLayer::new(0, "Samples"), CreatedLayer::new(1, "Samples-points")];
        let (next, map) = reconcile_scenario_layers(&log, &id("s1"), &response).unwrap();
        assert_eq!(next.layer(&id("l1")).unwrap().remote_id, Some(0));
        assert_eq!(next.layer(&id("root")).unwrap().remote_id, None);
        assert_eq!(map.len(), 1);
        assert!(reconcile_scenario_layers(&log, &id("nope"), &response).is_err());
    }

    #[test]
    fn attach_service_is_idempotent() {
        let log = plan_with(&[]);
        let service = ServiceRef {
            url: "https://services.example/FeatureServer".to_string(),
            portal_id: "abc".to_string(),
        };
        let once = attach_service(&log, &id("s1"), &service).unwrap();
        assert_eq!(once.scenario(&id("s1")).unwrap().service.as_ref(), Some(&service));
        assert_eq!(once.sequence, log.sequence + 1);
        assert_eq!(attach_service(&once, &id("s1"), &service).unwrap(), once);
    }

    #[test]
    fn commit_folds_accepted_edits() {
        let log = plan_with(&[pending("Plan A", "l1")]);
        let results = AppliedEdits {
            id: 10,
            add_results: vec![FeatureEditResult::accepted(1, "{G-1}")],
            ..AppliedEdits::default()
        };
        let next = commit_published(&log, &id("l1"), &results).unwrap();
        let layer = next.layer(&id("l1")).unwrap();
        assert!(layer.adds.is_empty());
        assert_eq!(layer.published.len(), 1);
        assert_eq!(layer.published[0].global_id(), Some("{G-1}"));
        assert_eq!(
            layer.published[0].attributes.get(reserved::OBJECT_ID).and_then(|v| v.as_number()),
            Some(1.0)
        );
        assert_eq!(layer.status, EditStatus::Published);
        assert_eq!(next.scenario(&id("s1")).unwrap().status, EditStatus::Published);
    }

    #[test]
    fn commit_keeps_rejected_edits_pending() {
        let log = plan_with(&[pending("Plan A", "l1")]);
        let results = AppliedEdits {
            add_results: vec![FeatureEditResult::rejected(1000, "bad geometry")],
            ..AppliedEdits::default()
        };
        let next = commit_published(&log, &id("l1"), &results).unwrap();
        let layer = next.layer(&id("l1")).unwrap();
        assert_eq!(layer.adds.len(), 1);
        assert_eq!(layer.status, EditStatus::Edited);
        assert_eq!(results.failures(), 1);
    }

    #[test]
    fn commit_removes_deleted_from_baseline() {
        let descriptor = LayerDescriptor::new(id("l1"), "Plan A", LayerKind::SampleArea);
        let log = apply(&EditLog::new(), &EditRequest::import(descriptor.clone(), vec![feature("f1")]))
            .unwrap();
        let log = apply(&log, &EditRequest::delete(descriptor, vec![feature("f1")])).unwrap();
        let results = AppliedEdits {
            delete_results: vec![FeatureEditResult::accepted(1, "{G}")],
            ..AppliedEdits::default()
        };
        let next = commit_published(&log, &id("l1"), &results).unwrap();
        let layer = next.layer(&id("l1")).unwrap();
        assert!(layer.published.is_empty() && layer.deletes.is_empty());
    }

    #[test]
    fn commit_unknown_layer_fails() {
        let err = commit_published(&EditLog::new(), &id("x"), &AppliedEdits::default()).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn apply_edits_response_decodes() {
        let json = serde_json::json!({
            "id": 3,
            "addResults": [{ "objectId": 7, "globalId": "{A}", "success": true }],
            "updateResults": [],
            "deleteResults": [{ "success": false, "error": { "code": 1019, "description": "missing" } }]
        });
        let decoded: AppliedEdits = serde_json::from_value(json).unwrap();
        assert_eq!(decoded.add_results[0], FeatureEditResult::accepted(7, "{A}"));
        assert_eq!(decoded.failures(), 1);
    }
}
