//! Publish workflow
//!
//! [`Publisher`] drives a [`FeatureService`] through the publish protocol
//! and threads the edit log through the engine's pure publish steps. Each
//! operation takes a snapshot and returns a new one only on full success;
//! on any error the caller keeps its snapshot and may simply retry.

use crate::config::RemoteConfig;
use crate::edits::{align_delete_results, merge_sublayer_results, EditBatch, LayerEdits};
use crate::error::RemoteError;
use crate::renderer::{missing_definitions, points_renderer, polygon_renderer};
use crate::service::{layer_url, FeatureService};
use crate::wire::EsriFeature;
use futures::future::try_join_all;
use planlog_engine::{
    apply, attach_service, commit_published, identity_map, reconcile_scenario_layers, AppliedEdits,
    EditRequest, EngineError, IdentityMap, StyleTable, ValidationError,
};
use planlog_model::{EditLog, Feature, Identity, LayerDescriptor, LayerRecord, ServiceRef};
use std::collections::HashSet;
use tracing::{debug, info, warn};

fn scenario_layers(log: &EditLog, scenario: &Identity) -> Vec<LayerRecord> {
    log.scenario(scenario)
        .map(|s| s.layers.iter().cloned().collect())
        .unwrap_or_default()
}

/// Result of a successful publish
#[derive(Debug, Clone, PartialEq)]
pub struct PublishOutcome {
    /// Snapshot with remote ids and committed baselines
    pub log: EditLog,
    /// Remote sublayer ids of every published layer
    pub identity_map: IdentityMap,
    /// Hosted service of the scenario
    pub service: ServiceRef,
    /// Sublayers created by this run
    pub created_layers: usize,
    /// Edits sent to polygon sublayers
    pub edits_sent: usize,
}

/// Publishes scenarios and imports remote layers
#[derive(Debug, Clone)]
pub struct Publisher<S> {
    service: S,
    config: RemoteConfig,
    styles: StyleTable,
}

impl<S: FeatureService> Publisher<S> {
    /// Create new publisher
    #[must_use]
    pub fn new(service: S, config: RemoteConfig) -> Self {
        Self {
            service,
            config,
            styles: StyleTable::default(),
        }
    }

    /// With renderer styles
    #[inline]
    #[must_use]
    pub fn with_styles(mut self, styles: StyleTable) -> Self {
        self.styles = styles;
        self
    }

    /// Underlying service
    #[inline]
    #[must_use]
    pub fn service(&self) -> &S {
        &self.service
    }

    /// Look up or create a hosted service, retrying with a fixed delay
    ///
    /// # Errors
    /// Returns [`RemoteError::RetriesExhausted`] once every attempt failed
    pub async fn lookup_service(&self, name: &str, description: &str) -> Result<ServiceRef, RemoteError> {
        let attempts = self.config.lookup_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.service.get_or_create_service(name, description).await {
                Ok(service) => return Ok(service),
                Err(error) if attempt < attempts => {
                    warn!(
                        "Service lookup failed (attempt {}/{}): {}",
                        attempt, attempts, error
                    );
                    tokio::time::sleep(self.config.lookup_retry_delay()).await;
                    attempt += 1;
                }
                Err(error) => {
                    return Err(RemoteError::RetriesExhausted {
                        attempts,
                        last: Box::new(error),
                    })
                }
            }
        }
    }

    /// Publish one scenario
    ///
    /// Looks up the hosted service, adopts sublayers a failed earlier run
    /// already created, creates the ones still missing, sends every pending
    /// edit and folds the results into the baseline. Adds that reached a
    /// sublayer before are resent as updates, so retrying after a partial
    /// failure does not duplicate anything remotely.
    ///
    /// # Errors
    /// Returns error if the scenario does not exist or any remote call fails
    #[tracing::instrument(skip(self, log), fields(scenario = %scenario))]
    pub async fn publish_scenario(
        &self,
        log: &EditLog,
        scenario: &Identity,
    ) -> Result<PublishOutcome, RemoteError> {
        let record = log
            .scenario(scenario)
            .ok_or_else(|| EngineError::from(ValidationError::ScenarioNotFound(scenario.clone())))?;
        info!("Publishing scenario: {}", record.label);

        let service = self.lookup_service(&record.label, &record.description).await?;
        let mut next = attach_service(log, scenario, &service)?;
        next = self.recover_sublayers(&next, scenario, &service).await?;

        let definitions: Vec<_> = scenario_layers(&next, scenario)
            .iter()
            .flat_map(|l| missing_definitions(l, &self.styles))
            .collect();
        let mut created_ids = HashSet::new();
        if !definitions.is_empty() {
            let created = self.service.add_to_definition(&service, &definitions).await?;
            created_ids.extend(created.iter().map(|c| c.id));
            let (reconciled, _) = reconcile_scenario_layers(&next, scenario, &created)?;
            next = reconciled;
        }

        let layers = scenario_layers(&next, scenario);
        let mut edits_sent = 0;
        for layer in &layers {
            let Some(remote_id) = layer.remote_id else {
                warn!("Layer {} has no remote sublayer after publish", layer.label);
                continue;
            };
            if !layer.has_pending_edits() {
                continue;
            }

            let batch = EditBatch::for_layer(layer, self.config.spatial_reference);
            edits_sent += batch.polygons.len();
            let fresh = |id: u32| created_ids.contains(&id);
            let polygons = self.send_edits(&service, remote_id, &batch.polygons, fresh(remote_id));
            let applied = match layer.points_remote_id {
                Some(points_id) if !batch.points.is_empty() => {
                    let points = self.send_edits(&service, points_id, &batch.points, fresh(points_id));
                    let (applied, points) = futures::try_join!(polygons, points)?;
                    if points.failures() > 0 {
                        warn!(
                            "Points sublayer of {} rejected {} edits; they stay pending",
                            layer.label,
                            points.failures()
                        );
                    }
                    merge_sublayer_results(applied, &points)
                }
                _ => polygons.await?,
            };

            let applied = AppliedEdits {
                delete_results: align_delete_results(layer, &applied.delete_results),
                ..applied
            };
            next = commit_published(&next, &layer.identity, &applied)?;
        }

        let identity_map = identity_map(&next);
        info!(
            "Published scenario {}: {} sublayers created, {} edits sent",
            record.label,
            created_ids.len(),
            edits_sent
        );
        Ok(PublishOutcome {
            log: next,
            identity_map,
            service,
            created_layers: created_ids.len(),
            edits_sent,
        })
    }

    /// Match sublayers the service already holds to layers that lack them
    async fn recover_sublayers(
        &self,
        log: &EditLog,
        scenario: &Identity,
        service: &ServiceRef,
    ) -> Result<EditLog, RemoteError> {
        let layers = scenario_layers(log, scenario);
        if !layers.iter().any(LayerRecord::lacks_sublayers) {
            return Ok(log.clone());
        }

        let used: HashSet<u32> = layers
            .iter()
            .flat_map(|l| l.remote_id.into_iter().chain(l.points_remote_id))
            .collect();
        let existing: Vec<_> = self
            .service
            .list_layers(service)
            .await?
            .into_iter()
            .filter(|l| !used.contains(&l.id))
            .collect();
        if existing.is_empty() {
            return Ok(log.clone());
        }

        info!("Adopting {} sublayers already on {}", existing.len(), service.url);
        let (recovered, _) = reconcile_scenario_layers(log, scenario, &existing)?;
        Ok(recovered)
    }

    /// Send one sublayer payload, checked against what the sublayer holds
    ///
    /// Sublayers created by the current run are empty and skip the check.
    async fn send_edits(
        &self,
        service: &ServiceRef,
        layer_id: u32,
        edits: &LayerEdits,
        fresh: bool,
    ) -> Result<AppliedEdits, RemoteError> {
        let addressed = edits.addressed_global_ids();
        let mut existing = HashSet::new();
        if !fresh && !addressed.is_empty() {
            let url = layer_url(service, layer_id);
            let found = try_join_all(
                addressed
                    .chunks(self.config.max_record_count.max(1))
                    .map(|chunk| self.service.query_global_ids(&url, chunk)),
            )
            .await?;
            existing.extend(found.into_iter().flatten());
        }

        let plan = edits.against_existing(&existing);
        if plan.payload.is_empty() {
            return Ok(plan.align(AppliedEdits {
                id: layer_id,
                ..AppliedEdits::default()
            }));
        }
        let applied = self.service.apply_edits(service, layer_id, &plan.payload).await?;
        debug!(layer_id, failures = applied.failures(), "applied edits");
        Ok(plan.align(applied))
    }

    /// Push current renderers to every published sublayer of a scenario
    ///
    /// # Errors
    /// Returns error if the scenario was never published or a call fails
    #[tracing::instrument(skip(self, log), fields(scenario = %scenario))]
    pub async fn update_renderers(&self, log: &EditLog, scenario: &Identity) -> Result<usize, RemoteError> {
        let record = log
            .scenario(scenario)
            .ok_or_else(|| EngineError::from(ValidationError::ScenarioNotFound(scenario.clone())))?;
        let service = record
            .service
            .as_ref()
            .ok_or_else(|| RemoteError::NotPublished(scenario.clone()))?;

        let mut updated = 0;
        for layer in record.layers.iter() {
            let Some(remote_id) = layer.remote_id else {
                continue;
            };
            let features = layer.effective_features();
            self.service
                .update_definition(service, remote_id, &polygon_renderer(&features, &self.styles))
                .await?;
            updated += 1;
            if let Some(points_id) = layer.points_remote_id {
                self.service
                    .update_definition(service, points_id, &points_renderer(&features, &self.styles))
                    .await?;
                updated += 1;
            }
        }
        debug!(updated, "updated renderers");
        Ok(updated)
    }

    /// Import every feature of a remote sublayer as the layer's baseline
    ///
    /// Object ids are fetched first, then features in pages of
    /// `max_record_count`.
    ///
    /// # Errors
    /// Returns error if the descriptor has no remote id, a query fails or
    /// a fetched feature cannot be decoded
    #[tracing::instrument(skip(self, log, descriptor), fields(layer = %descriptor.identity))]
    pub async fn import_layer(
        &self,
        log: &EditLog,
        service: &ServiceRef,
        descriptor: &LayerDescriptor,
        scenario: Option<Identity>,
    ) -> Result<EditLog, RemoteError> {
        let remote_id = descriptor
            .remote_id
            .ok_or_else(|| RemoteError::NotPublished(descriptor.identity.clone()))?;
        let url = layer_url(service, remote_id);

        let object_ids = self.service.query_object_ids(&url).await?;
        let pages = try_join_all(
            object_ids
                .chunks(self.config.max_record_count.max(1))
                .map(|chunk| self.service.query_features(&url, chunk)),
        )
        .await?;
        let features = pages
            .into_iter()
            .flatten()
            .map(EsriFeature::into_feature)
            .collect::<Result<Vec<Feature>, _>>()?;
        info!("Imported {} features from {}", features.len(), url);

        let mut request = EditRequest::import(descriptor.clone(), features);
        if let Some(scenario) = scenario {
            request = request.with_scenario(scenario);
        }
        Ok(apply(log, &request)?)
    }
}
