//! Feature service abstraction
//!
//! [`FeatureService`] is the seam between the publish workflow and the
//! network. [`crate::ArcGisClient`] talks to a real portal; tests use mocks
//! or the in-memory fake from the test utilities.

use crate::edits::LayerEdits;
use crate::error::RemoteError;
use crate::renderer::{LayerDefinition, Renderer};
use crate::wire::EsriFeature;
use async_trait::async_trait;
use planlog_engine::{AppliedEdits, CreatedLayer};
use planlog_model::ServiceRef;

/// URL of one sublayer
#[must_use]
pub fn layer_url(service: &ServiceRef, layer_id: u32) -> String {
    format!("{}/{layer_id}", service.url.trim_end_matches('/'))
}

/// Remote feature service operations
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FeatureService: Send + Sync {
    /// Look up a hosted service by name, creating it when missing
    async fn get_or_create_service(
        &self,
        name: &str,
        description: &str,
    ) -> Result<ServiceRef, RemoteError>;

    /// Add sublayers to a service
    async fn add_to_definition(
        &self,
        service: &ServiceRef,
        layers: &[LayerDefinition],
    ) -> Result<Vec<CreatedLayer>, RemoteError>;

    /// Sublayers the service already holds
    async fn list_layers(&self, service: &ServiceRef) -> Result<Vec<CreatedLayer>, RemoteError>;

    /// Replace a sublayer's renderer
    async fn update_definition(
        &self,
        service: &ServiceRef,
        layer_id: u32,
        renderer: &Renderer,
    ) -> Result<(), RemoteError>;

    /// Send adds, updates and deletes to one sublayer
    async fn apply_edits(
        &self,
        service: &ServiceRef,
        layer_id: u32,
        edits: &LayerEdits,
    ) -> Result<AppliedEdits, RemoteError>;

    /// Every object id of a sublayer
    async fn query_object_ids(&self, layer_url: &str) -> Result<Vec<i64>, RemoteError>;

    /// Which of the given global ids a sublayer holds
    async fn query_global_ids(
        &self,
        layer_url: &str,
        global_ids: &[String],
    ) -> Result<Vec<String>, RemoteError>;

    /// Features with the given object ids
    async fn query_features(
        &self,
        layer_url: &str,
        object_ids: &[i64],
    ) -> Result<Vec<EsriFeature>, RemoteError>;
}
