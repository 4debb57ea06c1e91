//! ArcGIS REST client
//!
//! Every endpoint answers HTTP 200 even on failure and reports errors in an
//! `{"error": {code, message}}` body, so responses are decoded as JSON first
//! and checked for that shape before being mapped to their typed form.

use crate::config::RemoteConfig;
use crate::edits::LayerEdits;
use crate::error::RemoteError;
use crate::renderer::{LayerDefinition, Renderer};
use crate::service::{layer_url, FeatureService};
use crate::wire::EsriFeature;
use async_trait::async_trait;
use planlog_engine::{AppliedEdits, CreatedLayer};
use planlog_model::{reserved, ServiceRef};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: i64,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateServiceResponse {
    #[serde(rename = "serviceurl")]
    service_url: String,
    item_id: String,
}

#[derive(Debug, Deserialize)]
struct LayersResponse {
    #[serde(default)]
    layers: Vec<CreatedLayer>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectIdsResponse {
    #[serde(default)]
    object_ids: Option<Vec<i64>>,
}

#[derive(Debug, Deserialize)]
struct FeaturesResponse {
    #[serde(default)]
    features: Vec<EsriFeature>,
}

/// Admin endpoint of a hosted feature service
#[must_use]
pub fn admin_url(service_url: &str) -> String {
    service_url
        .trim_end_matches('/')
        .replacen("/rest/services/", "/rest/admin/services/", 1)
}

fn global_id_clause(global_ids: &[String]) -> String {
    let quoted = global_ids
        .iter()
        .map(|g| format!("'{}'", g.replace('\'', "''")))
        .collect::<Vec<_>>()
        .join(",");
    format!("{} IN ({quoted})", reserved::GLOBAL_ID)
}

/// reqwest-backed [`FeatureService`]
#[derive(Debug, Clone)]
pub struct ArcGisClient {
    client: reqwest::Client,
    config: RemoteConfig,
}

impl ArcGisClient {
    /// Create new client
    ///
    /// # Errors
    /// Returns error if the configuration is invalid
    pub fn new(config: RemoteConfig) -> Result<Self, RemoteError> {
        config.validate()?;
        Ok(Self {
            client: reqwest::Client::new(),
            config,
        })
    }

    /// Client with a caller-supplied HTTP client
    ///
    /// # Errors
    /// Returns error if the configuration is invalid
    pub fn with_client(config: RemoteConfig, client: reqwest::Client) -> Result<Self, RemoteError> {
        config.validate()?;
        Ok(Self { client, config })
    }

    /// Configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &RemoteConfig {
        &self.config
    }

    fn base_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![("f", "json".to_string())];
        if let Some(token) = &self.config.token {
            params.push(("token", token.clone()));
        }
        params
    }

    async fn get<T: DeserializeOwned>(
        &self,
        url: &str,
        params: &[(&'static str, String)],
    ) -> Result<T, RemoteError> {
        let request = self.client.get(url).query(&self.base_params()).query(params);
        Self::read(request).await
    }

    async fn post<T: DeserializeOwned>(
        &self,
        url: &str,
        params: Vec<(&'static str, String)>,
    ) -> Result<T, RemoteError> {
        let mut form = self.base_params();
        form.extend(params);
        Self::read(self.client.post(url).form(&form)).await
    }

    async fn read<T: DeserializeOwned>(request: reqwest::RequestBuilder) -> Result<T, RemoteError> {
        let body: Value = request.send().await?.error_for_status()?.json().await?;
        if let Some(error) = body.get("error") {
            let error = ErrorBody::deserialize(error)?;
            return Err(RemoteError::service(error.code, error.message));
        }
        Ok(serde_json::from_value(body)?)
    }

    async fn find_service(&self, name: &str) -> Result<Option<ServiceRef>, RemoteError> {
        let url = format!("{}/search", self.config.sharing_url());
        let query = format!("title:\"{name}\" AND type:\"Feature Service\"");
        let response: SearchResponse = self.get(&url, &[("q", query)]).await?;
        Ok(response
            .results
            .into_iter()
            .find(|r| r.title == name)
            .and_then(|r| {
                r.url.map(|url| ServiceRef {
                    url,
                    portal_id: r.id,
                })
            }))
    }

    async fn create_service(&self, name: &str, description: &str) -> Result<ServiceRef, RemoteError> {
        let username = self
            .config
            .username
            .as_deref()
            .ok_or_else(|| RemoteError::Config("username is required to create services".to_string()))?;
        let url = format!("{}/content/users/{username}/createService", self.config.sharing_url());
        let parameters = json!({
            "name": name,
            "serviceDescription": description,
            "hasStaticData": false,
            "maxRecordCount": self.config.max_record_count,
            "capabilities": "Create,Delete,Query,Update,Editing",
            "spatialReference": self.config.spatial_reference,
        });
        let response: CreateServiceResponse = self
            .post(
                &url,
                vec![
                    ("createParameters", parameters.to_string()),
                    ("outputType", "featureService".to_string()),
                ],
            )
            .await?;
        info!("Created feature service {}: {}", name, response.service_url);
        Ok(ServiceRef {
            url: response.service_url,
            portal_id: response.item_id,
        })
    }
}

#[async_trait]
impl FeatureService for ArcGisClient {
    #[tracing::instrument(skip(self, description))]
    async fn get_or_create_service(
        &self,
        name: &str,
        description: &str,
    ) -> Result<ServiceRef, RemoteError> {
        if let Some(existing) = self.find_service(name).await? {
            debug!(url = %existing.url, "found existing service");
            return Ok(existing);
        }
        self.create_service(name, description).await
    }

    #[tracing::instrument(skip(self, layers), fields(url = %service.url, count = layers.len()))]
    async fn add_to_definition(
        &self,
        service: &ServiceRef,
        layers: &[LayerDefinition],
    ) -> Result<Vec<CreatedLayer>, RemoteError> {
        let url = format!("{}/addToDefinition", admin_url(&service.url));
        let definition = json!({ "layers": layers });
        let response: LayersResponse = self
            .post(&url, vec![("addToDefinition", definition.to_string())])
            .await?;
        Ok(response.layers)
    }

    #[tracing::instrument(skip(self), fields(url = %service.url))]
    async fn list_layers(&self, service: &ServiceRef) -> Result<Vec<CreatedLayer>, RemoteError> {
        let response: LayersResponse = self.get(service.url.trim_end_matches('/'), &[]).await?;
        Ok(response.layers)
    }

    #[tracing::instrument(skip(self, renderer), fields(url = %service.url))]
    async fn update_definition(
        &self,
        service: &ServiceRef,
        layer_id: u32,
        renderer: &Renderer,
    ) -> Result<(), RemoteError> {
        let url = format!("{}/{layer_id}/updateDefinition", admin_url(&service.url));
        let definition = json!({ "drawingInfo": { "renderer": renderer } });
        let _: Value = self
            .post(&url, vec![("updateDefinition", definition.to_string())])
            .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self, edits), fields(url = %service.url, edits = edits.len()))]
    async fn apply_edits(
        &self,
        service: &ServiceRef,
        layer_id: u32,
        edits: &LayerEdits,
    ) -> Result<AppliedEdits, RemoteError> {
        let url = format!("{}/applyEdits", layer_url(service, layer_id));
        let mut applied: AppliedEdits = self
            .post(
                &url,
                vec![
                    ("adds", serde_json::to_string(&edits.adds)?),
                    ("updates", serde_json::to_string(&edits.updates)?),
                    ("deletes", serde_json::to_string(&edits.deletes)?),
                    (
                        "honorSequenceOfEdits",
                        self.config.honor_sequence_of_edits.to_string(),
                    ),
                    ("useGlobalIds", self.config.use_global_ids.to_string()),
                ],
            )
            .await?;
        applied.id = layer_id;
        Ok(applied)
    }

    #[tracing::instrument(skip(self))]
    async fn query_object_ids(&self, layer_url: &str) -> Result<Vec<i64>, RemoteError> {
        let url = format!("{layer_url}/query");
        let response: ObjectIdsResponse = self
            .get(
                &url,
                &[
                    ("where", "1=1".to_string()),
                    ("returnIdsOnly", "true".to_string()),
                ],
            )
            .await?;
        Ok(response.object_ids.unwrap_or_default())
    }

    #[tracing::instrument(skip(self, global_ids), fields(count = global_ids.len()))]
    async fn query_global_ids(
        &self,
        layer_url: &str,
        global_ids: &[String],
    ) -> Result<Vec<String>, RemoteError> {
        if global_ids.is_empty() {
            return Ok(Vec::new());
        }
        let url = format!("{layer_url}/query");
        let response: FeaturesResponse = self
            .post(
                &url,
                vec![
                    ("where", global_id_clause(global_ids)),
                    ("outFields", reserved::GLOBAL_ID.to_string()),
                    ("returnGeometry", "false".to_string()),
                ],
            )
            .await?;
        Ok(response
            .features
            .iter()
            .filter_map(|f| f.attributes.global_id().map(str::to_string))
            .collect())
    }

    #[tracing::instrument(skip(self, object_ids), fields(count = object_ids.len()))]
    async fn query_features(
        &self,
        layer_url: &str,
        object_ids: &[i64],
    ) -> Result<Vec<EsriFeature>, RemoteError> {
        let url = format!("{layer_url}/query");
        let ids = object_ids
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let response: FeaturesResponse = self
            .post(
                &url,
                vec![
                    ("objectIds", ids),
                    ("outFields", "*".to_string()),
                    ("returnGeometry", "true".to_string()),
                    ("returnZ", "true".to_string()),
                    ("outSR", self.config.spatial_reference.wkid.to_string()),
                ],
            )
            .await?;
        Ok(response.features)
    }
}
