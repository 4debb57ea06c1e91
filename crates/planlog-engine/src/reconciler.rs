//! Edit reconciliation
//!
//! [`apply`] turns one snapshot plus one [`EditRequest`] into the next
//! snapshot. The input snapshot is never touched: the function works on an
//! O(1) clone whose persistent collections copy only the branches an edit
//! reaches. On error the caller simply keeps its current snapshot.
//!
//! Bucket rules per operation:
//!
//! | operation | effect |
//! |---|---|
//! | add | append to `adds` (template record created if missing) |
//! | update | replace in `adds` or `updates`, else append to `updates` |
//! | delete | drop from `adds`; otherwise drop from `updates` and queue in `deletes` |
//! | move | collapse `updates` and `published` into `adds`, reparent under a scenario |
//! | arcgis-import | upsert remote features into `published`, dropping local `adds`/`updates` copies |
//! | properties | metadata only, buckets untouched |

use crate::error::{EngineError, ValidationError};
use crate::locator::{self, LayerPosition};
use im::Vector;
use planlog_model::{
    EditLog, EditType, Entry, Feature, Identity, LayerDescriptor, LayerRecord, ScenarioDescriptor,
    ScenarioRecord,
};
use std::collections::HashSet;
use tracing::debug;

/// One intended edit against a layer
#[derive(Debug, Clone, PartialEq)]
pub struct EditRequest {
    /// Target layer
    pub layer: LayerDescriptor,
    /// Owning scenario for template creation, destination for moves
    pub scenario: Option<Identity>,
    /// Operation kind
    pub operation: EditType,
    /// Changed features
    pub features: Vec<Feature>,
    /// Whether contamination results were computed for this edit
    pub contamination_ran: bool,
}

impl EditRequest {
    /// Request with no features
    #[must_use]
    pub fn new(layer: LayerDescriptor, operation: EditType) -> Self {
        Self {
            layer,
            scenario: None,
            operation,
            features: Vec::new(),
            contamination_ran: false,
        }
    }

    /// Add features
    #[must_use]
    pub fn add(layer: LayerDescriptor, features: Vec<Feature>) -> Self {
        Self::new(layer, EditType::Add).with_features(features)
    }

    /// Update features
    #[must_use]
    pub fn update(layer: LayerDescriptor, features: Vec<Feature>) -> Self {
        Self::new(layer, EditType::Update).with_features(features)
    }

    /// Delete features
    #[must_use]
    pub fn delete(layer: LayerDescriptor, features: Vec<Feature>) -> Self {
        Self::new(layer, EditType::Delete).with_features(features)
    }

    /// Move a layer under a scenario
    #[must_use]
    pub fn move_to(layer: LayerDescriptor, destination: Identity) -> Self {
        Self::new(layer, EditType::Move).with_scenario(destination)
    }

    /// Seed the remote baseline
    #[must_use]
    pub fn import(layer: LayerDescriptor, features: Vec<Feature>) -> Self {
        Self::new(layer, EditType::ArcgisImport).with_features(features)
    }

    /// Change layer metadata
    #[must_use]
    pub fn properties(layer: LayerDescriptor) -> Self {
        Self::new(layer, EditType::Properties)
    }

    /// With target scenario
    #[inline]
    #[must_use]
    pub fn with_scenario(mut self, scenario: Identity) -> Self {
        self.scenario = Some(scenario);
        self
    }

    /// With changed features
    #[inline]
    #[must_use]
    pub fn with_features(mut self, features: Vec<Feature>) -> Self {
        self.features = features;
        self
    }

    /// With contamination flag
    #[inline]
    #[must_use]
    pub fn with_contamination_ran(mut self, ran: bool) -> Self {
        self.contamination_ran = ran;
        self
    }
}

/// Apply an edit, producing the next snapshot
///
/// # Errors
/// Returns [`EngineError::Validation`] when a required record is missing and
/// [`EngineError::Model`] when a changed feature fails ingestion checks.
pub fn apply(log: &EditLog, request: &EditRequest) -> Result<EditLog, EngineError> {
    let features = request
        .features
        .iter()
        .cloned()
        .map(Feature::validated)
        .collect::<Result<Vec<_>, _>>()?;

    let mut next = log.clone();
    match request.operation {
        EditType::Add | EditType::Update | EditType::Delete | EditType::ArcgisImport => {
            apply_feature_edit(&mut next, request, &features)?;
        }
        EditType::Move => move_layer(&mut next, request)?,
        EditType::Properties => apply_properties(&mut next, request)?,
    }
    next.sequence += 1;

    debug!(
        layer = %request.layer.identity,
        operation = ?request.operation,
        features = features.len(),
        sequence = next.sequence,
        "applied edit"
    );
    Ok(next)
}

/// Create a new plan
///
/// # Errors
/// Returns error if the identity is already used by a scenario or layer
pub fn add_scenario(log: &EditLog, descriptor: &ScenarioDescriptor) -> Result<EditLog, EngineError> {
    if locator::locate(log, &descriptor.identity).is_found() {
        return Err(ValidationError::DuplicateIdentity(descriptor.identity.clone()).into());
    }

    let mut next = log.clone();
    next.entries
        .push_back(Entry::Scenario(ScenarioRecord::from_descriptor(descriptor)));
    next.sequence += 1;
    debug!(scenario = %descriptor.identity, sequence = next.sequence, "added scenario");
    Ok(next)
}

/// Delete a plan and all of its layers
///
/// # Errors
/// Returns error if the scenario does not exist
pub fn remove_scenario(log: &EditLog, identity: &Identity) -> Result<EditLog, EngineError> {
    let index = locator::scenario_index(log, identity)
        .ok_or_else(|| ValidationError::ScenarioNotFound(identity.clone()))?;

    let mut next = log.clone();
    next.entries.remove(index);
    next.sequence += 1;
    debug!(scenario = %identity, sequence = next.sequence, "removed scenario");
    Ok(next)
}

/// Remove a layer record from its parent
///
/// Queued deletes on the record are dropped with it.
///
/// # Errors
/// Returns error if the layer does not exist
pub fn remove_layer(log: &EditLog, identity: &Identity) -> Result<EditLog, EngineError> {
    let position = locator::locate(log, identity)
        .position()
        .ok_or_else(|| ValidationError::LayerNotFound(identity.clone()))?;

    let mut next = log.clone();
    detach(&mut next, position);
    if let Some(index) = position.scenario_index() {
        if let Some(scenario) = locator::scenario_at_mut(&mut next, index) {
            scenario.status = scenario.status.after_edit();
        }
    }
    next.sequence += 1;
    debug!(layer = %identity, sequence = next.sequence, "removed layer");
    Ok(next)
}

fn apply_feature_edit(
    log: &mut EditLog,
    request: &EditRequest,
    features: &[Feature],
) -> Result<(), EngineError> {
    let position = ensure_layer(log, request)?;
    let layer = locator::layer_at_mut(log, position)
        .ok_or_else(|| ValidationError::LayerNotFound(request.layer.identity.clone()))?;

    for feature in features {
        match request.operation {
            EditType::Add => upsert(&mut layer.adds, feature),
            EditType::Update => update_feature(layer, feature),
            EditType::Delete => delete_feature(layer, feature),
            EditType::ArcgisImport => import_feature(layer, feature),
            EditType::Move | EditType::Properties => {}
        }
    }
    touch_layer(layer, request);

    if let Some(index) = position.scenario_index() {
        if let Some(scenario) = locator::scenario_at_mut(log, index) {
            touch_scenario(scenario, request);
        }
    }
    Ok(())
}

/// Resolve the target layer, creating a template record when missing
fn ensure_layer(log: &mut EditLog, request: &EditRequest) -> Result<LayerPosition, EngineError> {
    let located = locator::locate(log, &request.layer.identity);
    if located.is_scenario() {
        return Err(ValidationError::NotALayer(request.layer.identity.clone()).into());
    }
    if let Some(position) = located.position() {
        return Ok(position);
    }

    let record = LayerRecord::from_descriptor(&request.layer);
    match &request.scenario {
        Some(scenario_id) => {
            let index = locator::scenario_index(log, scenario_id)
                .ok_or_else(|| ValidationError::ScenarioNotFound(scenario_id.clone()))?;
            let scenario = locator::scenario_at_mut(log, index)
                .ok_or_else(|| ValidationError::ScenarioNotFound(scenario_id.clone()))?;
            scenario.layers.push_back(record);
            Ok(LayerPosition::Nested {
                scenario: index,
                layer: scenario.layers.len() - 1,
            })
        }
        None => {
            log.entries.push_back(Entry::Layer(record));
            Ok(LayerPosition::Root(log.entries.len() - 1))
        }
    }
}

fn position_of(bucket: &Vector<Feature>, identity: &Identity) -> Option<usize> {
    bucket.iter().position(|f| &f.identity == identity)
}

fn upsert(bucket: &mut Vector<Feature>, feature: &Feature) {
    match position_of(bucket, &feature.identity) {
        Some(index) => {
            bucket.set(index, feature.clone());
        }
        None => bucket.push_back(feature.clone()),
    }
}

fn update_feature(layer: &mut LayerRecord, feature: &Feature) {
    // never published, so the edit stays a pending add
    if let Some(index) = position_of(&layer.adds, &feature.identity) {
        layer.adds.set(index, feature.clone());
        return;
    }
    upsert(&mut layer.updates, feature);
}

/// The remote copy becomes the baseline; local pending copies are dropped
fn import_feature(layer: &mut LayerRecord, feature: &Feature) {
    if let Some(index) = position_of(&layer.adds, &feature.identity) {
        layer.adds.remove(index);
    }
    if let Some(index) = position_of(&layer.updates, &feature.identity) {
        layer.updates.remove(index);
    }
    upsert(&mut layer.published, feature);
}

fn delete_feature(layer: &mut LayerRecord, feature: &Feature) {
    if let Some(index) = position_of(&layer.adds, &feature.identity) {
        layer.adds.remove(index);
        return;
    }
    if let Some(index) = position_of(&layer.updates, &feature.identity) {
        layer.updates.remove(index);
    }
    if layer.deletes.iter().any(|d| d.identity == feature.identity) {
        return;
    }

    // the baseline carries the remote global id; the caller's copy may not
    let entry = layer
        .published
        .iter()
        .find(|f| f.identity == feature.identity)
        .unwrap_or(feature)
        .delete_entry();
    layer.deletes.push_back(entry);
}

fn move_layer(log: &mut EditLog, request: &EditRequest) -> Result<(), EngineError> {
    let destination = request
        .scenario
        .as_ref()
        .ok_or(ValidationError::MissingDestination)?;
    if locator::scenario_index(log, destination).is_none() {
        return Err(ValidationError::ScenarioNotFound(destination.clone()).into());
    }
    let position = locator::locate(log, &request.layer.identity)
        .position()
        .ok_or_else(|| ValidationError::LayerNotFound(request.layer.identity.clone()))?;

    let mut layer = detach(log, position)
        .ok_or_else(|| ValidationError::LayerNotFound(request.layer.identity.clone()))?;
    if let Some(index) = position.scenario_index() {
        if let Some(source) = locator::scenario_at_mut(log, index) {
            touch_scenario(source, request);
        }
    }

    collapse_buckets(&mut layer);
    // the layer will be recreated in the destination's service
    layer.remote_id = None;
    layer.points_remote_id = None;
    touch_layer(&mut layer, request);

    // detaching a root entry may have shifted the destination index
    let index = locator::scenario_index(log, destination)
        .ok_or_else(|| ValidationError::ScenarioNotFound(destination.clone()))?;
    let scenario = locator::scenario_at_mut(log, index)
        .ok_or_else(|| ValidationError::ScenarioNotFound(destination.clone()))?;
    scenario.layers.push_back(layer);
    touch_scenario(scenario, request);
    Ok(())
}

/// Fold `updates` and un-deleted `published` entries into `adds`
fn collapse_buckets(layer: &mut LayerRecord) {
    let deleted: HashSet<Identity> = layer.deletes.iter().map(|d| d.identity.clone()).collect();

    let mut adds = layer.adds.clone();
    for feature in layer.updates.iter().chain(layer.published.iter()) {
        let represented = position_of(&adds, &feature.identity).is_some();
        if !represented && !deleted.contains(&feature.identity) {
            adds.push_back(feature.clone());
        }
    }

    layer.adds = adds;
    layer.updates = Vector::new();
    layer.deletes = Vector::new();
    layer.published = Vector::new();
}

fn apply_properties(log: &mut EditLog, request: &EditRequest) -> Result<(), EngineError> {
    let located = locator::locate(log, &request.layer.identity);

    if located.is_scenario() {
        let index = located
            .scenario_index
            .ok_or_else(|| ValidationError::ScenarioNotFound(request.layer.identity.clone()))?;
        if let Some(scenario) = locator::scenario_at_mut(log, index) {
            scenario.label.clone_from(&request.layer.label);
            scenario.visible = request.layer.visible;
            scenario.list_mode = request.layer.list_mode;
            touch_scenario(scenario, request);
        }
        return Ok(());
    }

    let position = ensure_layer(log, request)?;
    let layer = locator::layer_at_mut(log, position)
        .ok_or_else(|| ValidationError::LayerNotFound(request.layer.identity.clone()))?;
    layer.label.clone_from(&request.layer.label);
    layer.visible = request.layer.visible;
    layer.list_mode = request.layer.list_mode;
    touch_layer(layer, request);

    if let Some(index) = position.scenario_index() {
        if let Some(scenario) = locator::scenario_at_mut(log, index) {
            scenario.visible = scenario.layers.iter().any(|l| l.visible);
            touch_scenario(scenario, request);
        }
    }
    Ok(())
}

fn detach(log: &mut EditLog, position: LayerPosition) -> Option<LayerRecord> {
    match position {
        LayerPosition::Root(index) => match log.entries.remove(index) {
            Entry::Layer(layer) => Some(layer),
            other => {
                log.entries.insert(index, other);
                None
            }
        },
        LayerPosition::Nested { scenario, layer } => {
            let scenario = locator::scenario_at_mut(log, scenario)?;
            (layer < scenario.layers.len()).then(|| scenario.layers.remove(layer))
        }
    }
}

fn touch_layer(layer: &mut LayerRecord, request: &EditRequest) {
    layer.status = layer.status.after_edit();
    layer.edit_type = request.operation;
    layer.contamination_ran = request.contamination_ran;
}

fn touch_scenario(scenario: &mut ScenarioRecord, request: &EditRequest) {
    scenario.status = scenario.status.after_edit();
    scenario.edit_type = request.operation;
    scenario.contamination_ran = request.contamination_ran;
}
