//! Testing utilities for the planlog workspace
//!
//! Shared fixtures and an in-memory feature service.

#![allow(missing_docs)]
#![allow(clippy::missing_panics_doc)]

use async_trait::async_trait;
use planlog_engine::{
    add_scenario, apply, AppliedEdits, CreatedLayer, EditRequest, FeatureEditResult,
};
use planlog_model::{
    reserved, Coordinate, EditLog, Feature, Geometry, Identity, LayerDescriptor, LayerKind,
    Polygon, ScenarioDescriptor, ServiceRef,
};
use planlog_remote::{
    EsriFeature, FeatureService, LayerDefinition, LayerEdits, RemoteError, Renderer,
};
use std::collections::BTreeMap;
use tokio::sync::Mutex;

pub fn id(key: &str) -> Identity {
    Identity::new(key).unwrap()
}

pub fn area(key: &str, x: f64) -> Feature {
    Feature::new(id(key), Geometry::Polygon(Polygon::square(x, 0.0, 2.0)))
}

pub fn typed_area(key: &str, x: f64, feature_type: &str) -> Feature {
    area(key, x).with_attribute(reserved::TYPE, feature_type)
}

pub fn point(key: &str, x: f64, y: f64) -> Feature {
    Feature::new(id(key), Geometry::Point(Coordinate::new(x, y)))
}

pub fn sample_layer(key: &str, label: &str) -> LayerDescriptor {
    LayerDescriptor::new(id(key), label, LayerKind::SampleArea)
}

pub fn scenario(key: &str, label: &str) -> ScenarioDescriptor {
    ScenarioDescriptor::new(id(key), label)
}

/// Log with plan `s1` ("Plan") holding layer `l1` ("Plan A") with two pending areas
pub fn seeded_log() -> EditLog {
    let log = add_scenario(&EditLog::new(), &scenario("s1", "Plan")).unwrap();
    let request = EditRequest::add(
        sample_layer("l1", "Plan A"),
        vec![typed_area("f1", 0.0, "Sponge"), typed_area("f2", 10.0, "Swab")],
    )
    .with_scenario(id("s1"));
    apply(&log, &request).unwrap()
}

/// Log with a root layer `l2` ("Remote") whose baseline holds `features`
pub fn published_log(features: Vec<Feature>) -> EditLog {
    let descriptor = sample_layer("l2", "Remote").with_remote_ids(0, Some(1));
    apply(&EditLog::new(), &EditRequest::import(descriptor, features)).unwrap()
}

#[derive(Debug, Default)]
struct HostedLayer {
    name: String,
    next_object_id: i64,
    // keyed by global id
    features: BTreeMap<String, (i64, EsriFeature)>,
}

#[derive(Debug, Default)]
struct State {
    services: BTreeMap<String, ServiceRef>,
    layers: BTreeMap<(String, u32), HostedLayer>,
    renderers: BTreeMap<(String, u32), Renderer>,
    failing_lookups: u32,
    lookups: u32,
    failing_apply_edits: Option<u32>,
}

/// In-memory [`FeatureService`]
#[derive(Debug, Default)]
pub struct InMemoryFeatureService {
    state: Mutex<State>,
}

impl InMemoryFeatureService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `count` service lookups with a retryable error
    pub fn with_failing_lookups(count: u32) -> Self {
        let service = Self::default();
        service.state.try_lock().unwrap().failing_lookups = count;
        service
    }

    /// Fail the next apply-edits call on sublayer `layer_id` before it writes anything
    #[must_use]
    pub fn with_failing_apply_edits(mut self, layer_id: u32) -> Self {
        self.state.get_mut().failing_apply_edits = Some(layer_id);
        self
    }

    pub async fn lookups(&self) -> u32 {
        self.state.lock().await.lookups
    }

    pub async fn layer_names(&self, service: &ServiceRef) -> Vec<(u32, String)> {
        let state = self.state.lock().await;
        state
            .layers
            .iter()
            .filter(|((url, _), _)| url == &service.url)
            .map(|((_, id), layer)| (*id, layer.name.clone()))
            .collect()
    }

    pub async fn feature_count(&self, service: &ServiceRef, layer_id: u32) -> usize {
        let state = self.state.lock().await;
        state
            .layers
            .get(&(service.url.clone(), layer_id))
            .map_or(0, |l| l.features.len())
    }

    pub async fn renderer(&self, service: &ServiceRef, layer_id: u32) -> Option<Renderer> {
        let state = self.state.lock().await;
        state.renderers.get(&(service.url.clone(), layer_id)).cloned()
    }

    fn split_layer_url(layer_url: &str) -> Result<(String, u32), RemoteError> {
        let (service, id) = layer_url
            .rsplit_once('/')
            .ok_or_else(|| RemoteError::service(400, "invalid layer url"))?;
        let id = id
            .parse()
            .map_err(|_| RemoteError::service(400, "invalid layer id"))?;
        Ok((service.to_string(), id))
    }
}

#[async_trait]
impl FeatureService for InMemoryFeatureService {
    async fn get_or_create_service(
        &self,
        name: &str,
        _description: &str,
    ) -> Result<ServiceRef, RemoteError> {
        let mut state = self.state.lock().await;
        state.lookups += 1;
        if state.failing_lookups > 0 {
            state.failing_lookups -= 1;
            return Err(RemoteError::service(503, "service unavailable"));
        }
        let count = state.services.len();
        Ok(state
            .services
            .entry(name.to_string())
            .or_insert_with(|| ServiceRef {
                url: format!("https://services.test/rest/services/{name}/FeatureServer"),
                portal_id: format!("item-{count}"),
            })
            .clone())
    }

    async fn add_to_definition(
        &self,
        service: &ServiceRef,
        layers: &[LayerDefinition],
    ) -> Result<Vec<CreatedLayer>, RemoteError> {
        let mut state = self.state.lock().await;
        let mut next_id = state
            .layers
            .keys()
            .filter(|(url, _)| url == &service.url)
            .map(|(_, id)| id + 1)
            .max()
            .unwrap_or(0);

        let mut created = Vec::new();
        for definition in layers {
            state.layers.insert(
                (service.url.clone(), next_id),
                HostedLayer {
                    name: definition.name.clone(),
                    next_object_id: 1,
                    features: BTreeMap::new(),
                },
            );
            state.renderers.insert(
                (service.url.clone(), next_id),
                definition.drawing_info.renderer.clone(),
            );
            created.push(CreatedLayer::new(next_id, definition.name.clone()));
            next_id += 1;
        }
        Ok(created)
    }

    async fn list_layers(&self, service: &ServiceRef) -> Result<Vec<CreatedLayer>, RemoteError> {
        let state = self.state.lock().await;
        Ok(state
            .layers
            .iter()
            .filter(|((url, _), _)| url == &service.url)
            .map(|((_, id), layer)| CreatedLayer::new(*id, layer.name.clone()))
            .collect())
    }

    async fn update_definition(
        &self,
        service: &ServiceRef,
        layer_id: u32,
        renderer: &Renderer,
    ) -> Result<(), RemoteError> {
        let mut state = self.state.lock().await;
        let key = (service.url.clone(), layer_id);
        if !state.layers.contains_key(&key) {
            return Err(RemoteError::service(404, "layer not found"));
        }
        state.renderers.insert(key, renderer.clone());
        Ok(())
    }

    async fn apply_edits(
        &self,
        service: &ServiceRef,
        layer_id: u32,
        edits: &LayerEdits,
    ) -> Result<AppliedEdits, RemoteError> {
        let mut state = self.state.lock().await;
        if state.failing_apply_edits == Some(layer_id) {
            state.failing_apply_edits = None;
            return Err(RemoteError::service(503, "service unavailable"));
        }
        let layer = state
            .layers
            .get_mut(&(service.url.clone(), layer_id))
            .ok_or_else(|| RemoteError::service(404, "layer not found"))?;

        let mut applied = AppliedEdits {
            id: layer_id,
            ..AppliedEdits::default()
        };
        for feature in &edits.adds {
            let Some(global_id) = feature.attributes.global_id().map(str::to_string) else {
                applied.add_results.push(FeatureEditResult::rejected(1000, "missing global id"));
                continue;
            };
            if layer.features.contains_key(&global_id) {
                applied.add_results.push(FeatureEditResult::rejected(1000, "duplicate global id"));
                continue;
            }
            let object_id = layer.next_object_id;
            layer.next_object_id += 1;
            layer.features.insert(global_id.clone(), (object_id, feature.clone()));
            applied.add_results.push(FeatureEditResult::accepted(object_id, global_id));
        }
        for feature in &edits.updates {
            let global_id = feature.attributes.global_id().unwrap_or_default().to_string();
            match layer.features.get_mut(&global_id) {
                Some((object_id, stored)) => {
                    *stored = feature.clone();
                    applied
                        .update_results
                        .push(FeatureEditResult::accepted(*object_id, global_id));
                }
                None => applied
                    .update_results
                    .push(FeatureEditResult::rejected(1019, "feature not found")),
            }
        }
        for global_id in &edits.deletes {
            match layer.features.remove(global_id) {
                Some((object_id, _)) => applied
                    .delete_results
                    .push(FeatureEditResult::accepted(object_id, global_id.clone())),
                None => applied
                    .delete_results
                    .push(FeatureEditResult::rejected(1019, "feature not found")),
            }
        }
        Ok(applied)
    }

    async fn query_object_ids(&self, layer_url: &str) -> Result<Vec<i64>, RemoteError> {
        let key = Self::split_layer_url(layer_url)?;
        let state = self.state.lock().await;
        let layer = state
            .layers
            .get(&key)
            .ok_or_else(|| RemoteError::service(404, "layer not found"))?;
        let mut ids: Vec<i64> = layer.features.values().map(|(oid, _)| *oid).collect();
        ids.sort_unstable();
        Ok(ids)
    }

    async fn query_global_ids(
        &self,
        layer_url: &str,
        global_ids: &[String],
    ) -> Result<Vec<String>, RemoteError> {
        let key = Self::split_layer_url(layer_url)?;
        let state = self.state.lock().await;
        let layer = state
            .layers
            .get(&key)
            .ok_or_else(|| RemoteError::service(404, "layer not found"))?;
        Ok(global_ids
            .iter()
            .filter(|g| layer.features.contains_key(*g))
            .cloned()
            .collect())
    }

    async fn query_features(
        &self,
        layer_url: &str,
        object_ids: &[i64],
    ) -> Result<Vec<EsriFeature>, RemoteError> {
        let key = Self::split_layer_url(layer_url)?;
        let state = self.state.lock().await;
        let layer = state
            .layers
            .get(&key)
            .ok_or_else(|| RemoteError::service(404, "layer not found"))?;
        let mut found: Vec<(i64, EsriFeature)> = layer
            .features
            .values()
            .filter(|(oid, _)| object_ids.contains(oid))
            .map(|(oid, feature)| {
                let mut feature = feature.clone();
                feature.attributes.insert(reserved::OBJECT_ID, *oid);
                (*oid, feature)
            })
            .collect();
        found.sort_by_key(|(oid, _)| *oid);
        Ok(found.into_iter().map(|(_, f)| f).collect())
    }
}
