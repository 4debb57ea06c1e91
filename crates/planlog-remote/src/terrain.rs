//! Terrain sampling and async elevation assignment

use crate::error::RemoteError;
use async_trait::async_trait;
use planlog_engine::elevation::{apply_elevation, ElevationPlan, ElevationPolicy};
use planlog_model::{Coordinate, Feature};
use serde::Deserialize;

/// Ground elevation lookup
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TerrainSampler: Send + Sync {
    /// Ground elevation at a location, in map units
    async fn sample(&self, at: Coordinate) -> Result<f64, RemoteError>;
}

/// Elevate a feature under a policy, sampling terrain at most once
///
/// # Errors
/// Returns error if terrain sampling fails
pub async fn assign_elevation<S>(
    feature: Feature,
    reference: Option<Coordinate>,
    policy: &ElevationPolicy,
    sampler: &S,
) -> Result<Feature, RemoteError>
where
    S: TerrainSampler + ?Sized,
{
    match policy.plan(&feature, reference) {
        ElevationPlan::Unchanged => Ok(feature),
        ElevationPlan::Apply(z) => Ok(apply_elevation(feature, z)),
        ElevationPlan::Sample(at) => {
            let z = sampler.sample(at).await?;
            Ok(apply_elevation(feature, z))
        }
    }
}

/// Elevate several features, each at its own location
///
/// # Errors
/// Returns the first sampling error
pub async fn assign_elevation_all<S>(
    features: Vec<Feature>,
    policy: &ElevationPolicy,
    sampler: &S,
) -> Result<Vec<Feature>, RemoteError>
where
    S: TerrainSampler + ?Sized,
{
    futures::future::try_join_all(
        features
            .into_iter()
            .map(|feature| assign_elevation(feature, None, policy, sampler)),
    )
    .await
}

#[derive(Debug, Deserialize)]
struct SamplesResponse {
    #[serde(default)]
    samples: Vec<Sample>,
}

#[derive(Debug, Deserialize)]
struct Sample {
    value: String,
}

/// Samples an elevation image service via `getSamples`
#[derive(Debug, Clone)]
pub struct ImageServiceSampler {
    client: reqwest::Client,
    url: String,
    wkid: u32,
}

impl ImageServiceSampler {
    /// Create new sampler for an image service URL
    #[must_use]
    pub fn new(url: impl Into<String>, wkid: u32) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            wkid,
        }
    }
}

#[async_trait]
impl TerrainSampler for ImageServiceSampler {
    #[tracing::instrument(skip(self))]
    async fn sample(&self, at: Coordinate) -> Result<f64, RemoteError> {
        let geometry = serde_json::json!({
            "x": at.x,
            "y": at.y,
            "spatialReference": { "wkid": self.wkid },
        });
        let response: SamplesResponse = self
            .client
            .get(format!("{}/getSamples", self.url.trim_end_matches('/')))
            .query(&[
                ("geometry", geometry.to_string()),
                ("geometryType", "esriGeometryPoint".to_string()),
                ("returnFirstValueOnly", "true".to_string()),
                ("f", "json".to_string()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let value = response
            .samples
            .first()
            .ok_or_else(|| RemoteError::Terrain(format!("no sample at {}, {}", at.x, at.y)))?;
        value
            .value
            .trim()
            .parse()
            .map_err(|_| RemoteError::Terrain(format!("not a number: {}", value.value)))
    }
}
