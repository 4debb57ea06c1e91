//! Apply-edits payloads
//!
//! A layer's pending buckets become one payload for its polygon sublayer
//! and one for its points sublayer. Features are addressed by global id.
//! An add's global id is derived from its identity, so both payloads share
//! it and a resent add names the same remote feature as the first attempt.

use crate::config::SpatialReference;
use crate::wire::EsriFeature;
use planlog_engine::{point_mirror, AppliedEdits, FeatureEditResult};
use planlog_model::{reserved, Feature, Identity, LayerRecord};
use serde::Serialize;
use std::collections::HashSet;
use uuid::Uuid;

/// Edits for one sublayer
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct LayerEdits {
    /// New features
    pub adds: Vec<EsriFeature>,
    /// Changed features
    pub updates: Vec<EsriFeature>,
    /// Global ids to delete
    pub deletes: Vec<String>,
}

impl LayerEdits {
    /// Check if there is nothing to send
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.adds.is_empty() && self.updates.is_empty() && self.deletes.is_empty()
    }

    /// Number of edits
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.adds.len() + self.updates.len() + self.deletes.len()
    }
}

/// Payloads for both sublayers of one layer
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EditBatch {
    /// Polygon sublayer edits
    pub polygons: LayerEdits,
    /// Points sublayer edits
    pub points: LayerEdits,
}

/// Global id of a feature in the service's brace form
///
/// Stable for an identity: name-based UUID under the OID namespace.
#[must_use]
pub fn global_id_for(identity: &Identity) -> String {
    let uuid = Uuid::new_v5(&Uuid::NAMESPACE_OID, identity.as_str().as_bytes());
    format!("{{{}}}", uuid.to_string().to_uppercase())
}

fn with_global_id(mut feature: Feature, global_id: Option<&str>) -> Feature {
    if feature.global_id().is_none() {
        let global_id = global_id.map_or_else(|| global_id_for(&feature.identity), str::to_string);
        feature.attributes.insert(reserved::GLOBAL_ID, global_id);
    }
    feature
}

fn missing_result() -> FeatureEditResult {
    FeatureEditResult::rejected(-1, "missing result")
}

fn skipped_result() -> FeatureEditResult {
    FeatureEditResult {
        success: true,
        ..FeatureEditResult::default()
    }
}

impl LayerEdits {
    /// Global ids of adds and deletes
    #[must_use]
    pub fn addressed_global_ids(&self) -> Vec<String> {
        self.adds
            .iter()
            .filter_map(|f| f.attributes.global_id().map(str::to_string))
            .chain(self.deletes.iter().cloned())
            .collect()
    }

    /// Rewrite the payload against the global ids a sublayer already holds
    ///
    /// Adds already present are sent as updates and deletes of absent
    /// features are dropped, so a payload that partly went through before
    /// has the same effect when sent again.
    #[must_use]
    pub fn against_existing(&self, existing: &HashSet<String>) -> ResendPlan {
        let present = |f: &EsriFeature| f.attributes.global_id().is_some_and(|g| existing.contains(g));
        let resent_adds: Vec<bool> = self.adds.iter().map(present).collect();
        let sent_deletes: Vec<bool> = self.deletes.iter().map(|g| existing.contains(g)).collect();

        let adds = self.adds.iter().filter(|f| !present(*f)).cloned().collect();
        let updates = self
            .updates
            .iter()
            .chain(self.adds.iter().filter(|f| present(*f)))
            .cloned()
            .collect();
        let deletes = self.deletes.iter().filter(|g| existing.contains(*g)).cloned().collect();

        ResendPlan {
            payload: Self { adds, updates, deletes },
            resent_adds,
            sent_deletes,
            updates: self.updates.len(),
        }
    }
}

/// A sublayer payload checked against the sublayer's current contents
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResendPlan {
    /// Edits to send
    pub payload: LayerEdits,
    resent_adds: Vec<bool>,
    sent_deletes: Vec<bool>,
    updates: usize,
}

impl ResendPlan {
    /// Map the service's results back onto the entries of the original payload
    #[must_use]
    pub fn align(&self, applied: AppliedEdits) -> AppliedEdits {
        let mut added = applied.add_results.into_iter();
        let mut updated = applied.update_results.into_iter();
        let update_results: Vec<_> = (0..self.updates)
            .map(|_| updated.next().unwrap_or_else(missing_result))
            .collect();
        let add_results = self
            .resent_adds
            .iter()
            .map(|resent| {
                let next = if *resent { updated.next() } else { added.next() };
                next.unwrap_or_else(missing_result)
            })
            .collect();

        let mut deleted = applied.delete_results.into_iter();
        let delete_results = self
            .sent_deletes
            .iter()
            .map(|sent| {
                if *sent {
                    deleted.next().unwrap_or_else(missing_result)
                } else {
                    skipped_result()
                }
            })
            .collect();

        AppliedEdits {
            id: applied.id,
            add_results,
            update_results,
            delete_results,
        }
    }
}

/// Combine the results of a polygon sublayer and its points sublayer
///
/// Both payloads hold the same entries in the same order. An entry counts
/// as applied only when both sublayers accepted it; otherwise the points
/// rejection is kept so the edit stays pending.
#[must_use]
pub fn merge_sublayer_results(polygons: AppliedEdits, points: &AppliedEdits) -> AppliedEdits {
    AppliedEdits {
        id: polygons.id,
        add_results: merge_results(polygons.add_results, &points.add_results),
        update_results: merge_results(polygons.update_results, &points.update_results),
        delete_results: merge_results(polygons.delete_results, &points.delete_results),
    }
}

fn merge_results(results: Vec<FeatureEditResult>, mirrored: &[FeatureEditResult]) -> Vec<FeatureEditResult> {
    results
        .into_iter()
        .enumerate()
        .map(|(index, result)| match mirrored.get(index) {
            Some(point) if !point.success => point.clone(),
            _ => result,
        })
        .collect()
}

/// Expand delete results to one per queued delete
///
/// Deletes that were left out of the payload had nothing to remove
/// remotely and count as accepted.
#[must_use]
pub fn align_delete_results(layer: &LayerRecord, results: &[FeatureEditResult]) -> Vec<FeatureEditResult> {
    let mut sent = results.iter();
    layer
        .deletes
        .iter()
        .map(|entry| match &entry.global_id {
            Some(_) => sent.next().cloned().unwrap_or_else(missing_result),
            None => skipped_result(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use planlog_model::{DeleteEntry, Geometry, LayerDescriptor, LayerKind, Polygon};

    fn id(key: &str) -> Identity {
        Identity::new(key).unwrap()
    }

    fn area(key: &str) -> Feature {
        Feature::new(id(key), Geometry::Polygon(Polygon::square(2.0, 2.0, 2.0)))
    }

    fn layer() -> LayerRecord {
        let mut layer = LayerRecord::from_descriptor(&LayerDescriptor::new(
            id("l1"),
            "Plan A",
            LayerKind::SampleArea,
        ));
        layer.published.push_back(area("p1").with_attribute(reserved::GLOBAL_ID, "{P-1}"));
        layer.adds.push_back(area("n1"));
        layer.updates.push_back(area("p1"));
        layer.deletes.push_back(DeleteEntry {
            identity: id("p2"),
            global_id: Some("{P-2}".to_string()),
        });
        layer.deletes.push_back(DeleteEntry {
            identity: id("p3"),
            global_id: None,
        });
        layer
    }

    #[test]
    fn adds_share_global_id_across_sublayers() {
        let batch = EditBatch::for_layer(&layer(), SpatialReference::default());
        let polygon_id = batch.polygons.adds[0].attributes.global_id().unwrap();
        let points_id = batch.points.adds[0].attributes.global_id().unwrap();
        assert_eq!(polygon_id, points_id);
        assert!(polygon_id.starts_with('{') && polygon_id.ends_with('}'));
    }

    #[test]
    fn updates_borrow_baseline_global_id() {
        let batch = EditBatch::for_layer(&layer(), SpatialReference::default());
        assert_eq!(batch.polygons.updates[0].attributes.global_id(), Some("{P-1}"));
        assert_eq!(batch.polygons.deletes, vec!["{P-2}".to_string()]);
        assert_eq!(batch.polygons.len(), 3);
    }

    #[test]
    fn points_payload_holds_centroids() {
        let batch = EditBatch::for_layer(&layer(), SpatialReference::default());
        let json = serde_json::to_value(&batch.points.adds[0]).unwrap();
        assert_eq!(json["geometry"]["x"], 2.0);
        assert_eq!(json["geometry"]["y"], 2.0);
    }

    #[test]
    fn delete_results_are_realigned() {
        let results = vec![FeatureEditResult::accepted(2, "{P-2}")];
        let aligned = align_delete_results(&layer(), &results);
        assert_eq!(aligned.len(), 2);
        assert!(aligned.iter().all(|r| r.success));

        let aligned = align_delete_results(&layer(), &[]);
        assert!(!aligned[0].success);
        assert!(aligned[1].success);
    }

    #[test]
    fn empty_batch() {
        let empty = LayerRecord::from_descriptor(&LayerDescriptor::new(id("l2"), "B", LayerKind::Mask));
        let batch = EditBatch::for_layer(&empty, SpatialReference::default());
        assert!(batch.polygons.is_empty() && batch.points.is_empty());
    }

    #[test]
    fn add_global_ids_are_stable() {
        let first = EditBatch::for_layer(&layer(), SpatialReference::default());
        let second = EditBatch::for_layer(&layer(), SpatialReference::default());
        assert_eq!(
            first.polygons.adds[0].attributes.global_id(),
            second.polygons.adds[0].attributes.global_id()
        );
        assert_eq!(
            first.polygons.adds[0].attributes.global_id(),
            Some(global_id_for(&id("n1")).as_str())
        );
        assert_ne!(global_id_for(&id("n1")), global_id_for(&id("n2")));
    }

    #[test]
    fn resend_turns_present_adds_into_updates() {
        let edits = EditBatch::for_layer(&layer(), SpatialReference::default()).polygons;
        let existing: HashSet<String> = [global_id_for(&id("n1"))].into_iter().collect();

        let plan = edits.against_existing(&existing);
        assert!(plan.payload.adds.is_empty());
        assert_eq!(plan.payload.updates.len(), 2);
        // {P-2} is already gone remotely
        assert!(plan.payload.deletes.is_empty());

        let applied = AppliedEdits {
            id: 0,
            update_results: vec![
                FeatureEditResult::accepted(1, "{P-1}"),
                FeatureEditResult::accepted(2, global_id_for(&id("n1"))),
            ],
            ..AppliedEdits::default()
        };
        let aligned = plan.align(applied);
        assert_eq!(aligned.add_results.len(), 1);
        assert_eq!(aligned.add_results[0].object_id, Some(2));
        assert_eq!(aligned.update_results[0].object_id, Some(1));
        assert_eq!(aligned.delete_results.len(), 1);
        assert!(aligned.delete_results[0].success);
    }

    #[test]
    fn fresh_sublayer_payload_is_unchanged() {
        let edits = EditBatch::for_layer(&layer(), SpatialReference::default()).polygons;
        let plan = edits.against_existing(&[String::from("{P-2}")].into_iter().collect());
        assert_eq!(plan.payload, edits);

        let aligned = plan.align(AppliedEdits::default());
        assert_eq!(aligned.failures(), 3);
    }

    #[test]
    fn point_rejections_win() {
        let polygons = AppliedEdits {
            id: 0,
            add_results: vec![FeatureEditResult::accepted(1, "{A}"), FeatureEditResult::accepted(2, "{B}")],
            delete_results: vec![FeatureEditResult::accepted(3, "{C}")],
            ..AppliedEdits::default()
        };
        let points = AppliedEdits {
            id: 1,
            add_results: vec![FeatureEditResult::accepted(1, "{A}"), FeatureEditResult::rejected(1000, "bad point")],
            delete_results: vec![FeatureEditResult::rejected(1019, "not found")],
            ..AppliedEdits::default()
        };

        let merged = merge_sublayer_results(polygons, &points);
        assert_eq!(merged.id, 0);
        assert!(merged.add_results[0].success);
        assert!(!merged.add_results[1].success);
        assert!(!merged.delete_results[0].success);
    }
}
