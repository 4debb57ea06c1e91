//! Remote configuration
//!
//! Loaded from TOML; every field has a default so a minimal file only needs
//! the portal URL and credentials.

use crate::error::RemoteError;
use planlog_engine::ElevationPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Spatial reference of published geometries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpatialReference {
    /// Well-known id
    pub wkid: u32,
}

impl Default for SpatialReference {
    fn default() -> Self {
        // web mercator
        Self { wkid: 3857 }
    }
}

/// Feature service client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Portal root, e.g. `https://www.arcgis.com`
    pub portal_url: String,
    /// Portal user owning created services
    pub username: Option<String>,
    /// Access token appended to every request
    pub token: Option<String>,
    /// Page size for chunked queries
    pub max_record_count: usize,
    /// Attempts for the initial service lookup
    pub lookup_attempts: u32,
    /// Fixed delay between lookup attempts
    pub lookup_retry_delay_ms: u64,
    /// Ask the service to apply edits in request order
    pub honor_sequence_of_edits: bool,
    /// Address features by global id in apply-edits
    pub use_global_ids: bool,
    /// Spatial reference of sent and fetched geometries
    pub spatial_reference: SpatialReference,
    /// Elevation for new geometries
    pub elevation: ElevationPolicy,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            portal_url: "https://www.arcgis.com".to_string(),
            username: None,
            token: None,
            max_record_count: 1000,
            lookup_attempts: 3,
            lookup_retry_delay_ms: 1000,
            honor_sequence_of_edits: true,
            use_global_ids: true,
            spatial_reference: SpatialReference::default(),
            elevation: ElevationPolicy::default(),
        }
    }
}

impl RemoteConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a TOML document
    ///
    /// # Errors
    /// Returns error if the document is malformed or fails validation
    pub fn from_toml_str(source: &str) -> Result<Self, RemoteError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges
    ///
    /// # Errors
    /// Returns error describing the first invalid field
    pub fn validate(&self) -> Result<(), RemoteError> {
        if self.portal_url.trim().is_empty() {
            return Err(RemoteError::Config("portal_url must not be empty".to_string()));
        }
        if self.max_record_count == 0 {
            return Err(RemoteError::Config("max_record_count must be positive".to_string()));
        }
        if self.lookup_attempts == 0 {
            return Err(RemoteError::Config("lookup_attempts must be positive".to_string()));
        }
        Ok(())
    }

    /// Delay between lookup attempts
    #[inline]
    #[must_use]
    pub fn lookup_retry_delay(&self) -> Duration {
        Duration::from_millis(self.lookup_retry_delay_ms)
    }

    /// Portal REST root
    #[must_use]
    pub fn sharing_url(&self) -> String {
        format!("{}/sharing/rest", self.portal_url.trim_end_matches('/'))
    }

    /// With portal URL
    #[inline]
    #[must_use]
    pub fn with_portal_url(mut self, url: impl Into<String>) -> Self {
        self.portal_url = url.into();
        self
    }

    /// With portal user
    #[inline]
    #[must_use]
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// With access token
    #[inline]
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// With query page size
    #[inline]
    #[must_use]
    pub fn with_max_record_count(mut self, count: usize) -> Self {
        self.max_record_count = count;
        self
    }

    /// With lookup retry policy
    #[inline]
    #[must_use]
    pub fn with_lookup_retry(mut self, attempts: u32, delay_ms: u64) -> Self {
        self.lookup_attempts = attempts;
        self.lookup_retry_delay_ms = delay_ms;
        self
    }

    /// With elevation policy
    #[inline]
    #[must_use]
    pub fn with_elevation(mut self, elevation: ElevationPolicy) -> Self {
        self.elevation = elevation;
        self
    }

    /// With spatial reference
    #[inline]
    #[must_use]
    pub fn with_spatial_reference(mut self, wkid: u32) -> Self {
        self.spatial_reference = SpatialReference { wkid };
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = RemoteConfig::new();
        assert_eq!(config.max_record_count, 1000);
        assert_eq!(config.lookup_attempts, 3);
        assert_eq!(config.lookup_retry_delay(), Duration::from_secs(1));
        assert!(config.honor_sequence_of_edits && config.use_global_ids);
        assert_eq!(config.spatial_reference.wkid, 3857);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = RemoteConfig::from_toml_str(
            r#"
            portal_url = "https://portal.example.org/"
            token = "abc"
            max_record_count = 250

            [elevation]
            use_terrain = true
            "#,
        )
        .unwrap();
        assert_eq!(config.max_record_count, 250);
        assert_eq!(config.token.as_deref(), Some("abc"));
        assert!(config.elevation.use_terrain);
        assert_eq!(config.lookup_attempts, 3);
        assert_eq!(config.sharing_url(), "https://portal.example.org/sharing/rest");
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(
            RemoteConfig::from_toml_str("max_record_count = 0"),
            Err(RemoteError::Config(_))
        ));
        assert!(matches!(
            RemoteConfig::from_toml_str("portal_url = 5"),
            Err(RemoteError::Config(_))
        ));
    }

    #[test]
    fn builders() {
        let config = RemoteConfig::new()
            .with_username("planner")
            .with_lookup_retry(5, 10)
            .with_elevation(ElevationPolicy::fixed(2.0))
            .with_spatial_reference(4326);
        assert_eq!(config.username.as_deref(), Some("planner"));
        assert_eq!(config.lookup_attempts, 5);
        assert_eq!(config.elevation.override_z, Some(2.0));
        assert_eq!(config.spatial_reference.wkid, 4326);
    }
}
