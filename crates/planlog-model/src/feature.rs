//! Feature entries stored in layer buckets

use crate::attributes::{reserved, AttrValue, Attributes};
use crate::error::ModelError;
use crate::geometry::Geometry;
use crate::identity::Identity;
use serde::{Deserialize, Serialize};

/// One logical feature: identity, attributes and geometry
///
/// # Invariants
/// - `attributes[PERMANENT_IDENTIFIER] == identity` once validated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    /// Stable identity
    pub identity: Identity,
    /// Attribute bag
    #[serde(default)]
    pub attributes: Attributes,
    /// Shape
    pub geometry: Geometry,
}

impl Feature {
    /// Create a feature whose attributes carry its identity
    #[must_use]
    pub fn new(identity: Identity, geometry: Geometry) -> Self {
        let attributes = Attributes::new().with(reserved::IDENTITY, identity.as_str());
        Self {
            identity,
            attributes,
            geometry,
        }
    }

    /// Builder-style attribute insert
    #[inline]
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.attributes.insert(key, value);
        self
    }

    /// Validate geometry and reserved attributes, filling in the identity key
    ///
    /// # Errors
    /// Returns error if the geometry has no coordinates or reserved
    /// attributes are malformed
    pub fn validated(mut self) -> Result<Self, ModelError> {
        if self.geometry.centroid().is_none() {
            return Err(ModelError::EmptyGeometry);
        }
        self.attributes.validate(&self.identity)?;
        Ok(self)
    }

    /// Remote global id, if assigned
    #[inline]
    #[must_use]
    pub fn global_id(&self) -> Option<&str> {
        self.attributes.global_id()
    }

    /// Feature type name, if any
    #[inline]
    #[must_use]
    pub fn feature_type(&self) -> Option<&str> {
        self.attributes.feature_type()
    }

    /// Identity-only delete record for this feature
    #[inline]
    #[must_use]
    pub fn delete_entry(&self) -> DeleteEntry {
        DeleteEntry {
            identity: self.identity.clone(),
            global_id: self.global_id().map(str::to_string),
        }
    }
}

/// Identity-only record of a feature queued for remote deletion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteEntry {
    /// Local identity
    pub identity: Identity,
    /// Remote global id used by apply-edits
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_id: Option<String>,
}
