//! Scenario and layer records
//!
//! A [`LayerRecord`] tracks local edits against one layer in four buckets
//! (`adds`, `updates`, `deletes`, `published`). A [`ScenarioRecord`] groups
//! layers into a plan. Buckets and child lists are persistent vectors, so
//! cloning a record is cheap and edits only copy the touched branches.

use crate::feature::{DeleteEntry, Feature};
use crate::identity::Identity;
use im::Vector;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Publish status of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditStatus {
    /// Created locally, never published
    #[default]
    Added,
    /// Changed since last publish
    Edited,
    /// Matches the remote service
    Published,
}

impl EditStatus {
    /// Status after a local edit
    ///
    /// `added` stays `added`; everything else becomes `edited`.
    #[inline]
    #[must_use]
    pub fn after_edit(self) -> Self {
        match self {
            Self::Added => Self::Added,
            Self::Edited | Self::Published => Self::Edited,
        }
    }
}

/// Kind of the last operation applied to a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EditType {
    /// Features added
    #[default]
    Add,
    /// Features updated
    Update,
    /// Features deleted
    Delete,
    /// Layer moved into a scenario
    Move,
    /// Remote baseline imported
    ArcgisImport,
    /// Metadata changed
    Properties,
}

/// Table-of-contents display mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ListMode {
    /// Listed
    #[default]
    Show,
    /// Not listed
    Hide,
    /// Listed without children
    HideChildren,
}

/// Layer kind tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LayerKind {
    /// Sampling areas drawn by the user
    #[serde(rename = "Samples")]
    SampleArea,
    /// Generated sampling plan areas
    #[serde(rename = "VSP")]
    Vsp,
    /// Areas excluded from sampling
    #[serde(rename = "Sampling Mask")]
    Mask,
    /// Area of interest boundary
    #[serde(rename = "Area of Interest")]
    AreaOfInterest,
    /// Contamination map
    #[serde(rename = "Contamination Map")]
    ContaminationMap,
    /// Read-only reference data
    #[serde(rename = "Reference Layer")]
    Reference,
}

impl LayerKind {
    /// Check whether features of this kind get point and hybrid mirrors
    #[inline]
    #[must_use]
    pub fn has_companions(self) -> bool {
        matches!(self, Self::SampleArea | Self::Vsp)
    }
}

/// Remote ids are stored as `-1` when the layer was never published
mod remote_id {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(value: &Option<u32>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_i64(value.map_or(-1, i64::from))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u32>, D::Error> {
        let raw = i64::deserialize(d)?;
        if raw < 0 {
            return Ok(None);
        }
        u32::try_from(raw).map(Some).map_err(D::Error::custom)
    }
}

/// Caller-side description of the layer an edit targets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerDescriptor {
    /// Layer identity
    pub identity: Identity,
    /// Display label (also the remote sublayer name)
    pub label: String,
    /// Layer kind
    pub kind: LayerKind,
    /// Visibility
    pub visible: bool,
    /// List mode
    pub list_mode: ListMode,
    /// Known remote id
    #[serde(with = "remote_id", default)]
    pub remote_id: Option<u32>,
    /// Known remote points id
    #[serde(with = "remote_id", default)]
    pub points_remote_id: Option<u32>,
}

impl LayerDescriptor {
    /// Visible, listed layer that has never been published
    #[must_use]
    pub fn new(identity: Identity, label: impl Into<String>, kind: LayerKind) -> Self {
        Self {
            identity,
            label: label.into(),
            kind,
            visible: true,
            list_mode: ListMode::Show,
            remote_id: None,
            points_remote_id: None,
        }
    }

    /// With visibility
    #[inline]
    #[must_use]
    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    /// With list mode
    #[inline]
    #[must_use]
    pub fn with_list_mode(mut self, list_mode: ListMode) -> Self {
        self.list_mode = list_mode;
        self
    }

    /// With remote ids of an already published layer
    #[inline]
    #[must_use]
    pub fn with_remote_ids(mut self, remote_id: u32, points_remote_id: Option<u32>) -> Self {
        self.remote_id = Some(remote_id);
        self.points_remote_id = points_remote_id;
        self
    }
}

/// Caller-side description of a scenario
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioDescriptor {
    /// Scenario identity
    pub identity: Identity,
    /// Display label (also the remote service name)
    pub label: String,
    /// Free-form description
    #[serde(default)]
    pub description: String,
}

impl ScenarioDescriptor {
    /// Scenario with empty description
    #[must_use]
    pub fn new(identity: Identity, label: impl Into<String>) -> Self {
        Self {
            identity,
            label: label.into(),
            description: String::new(),
        }
    }

    /// With description
    #[inline]
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Hosted service a scenario publishes to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRef {
    /// Feature service URL
    pub url: String,
    /// Portal item id
    pub portal_id: String,
}

/// Edit tracking for one layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerRecord {
    /// Layer identity
    pub identity: Identity,
    /// Display label
    pub label: String,
    /// Layer kind
    pub kind: LayerKind,
    /// Remote sublayer id, `None` if never published
    #[serde(with = "remote_id", default)]
    pub remote_id: Option<u32>,
    /// Remote points sublayer id
    #[serde(with = "remote_id", default)]
    pub points_remote_id: Option<u32>,
    /// Publish status
    pub status: EditStatus,
    /// Last operation applied
    pub edit_type: EditType,
    /// Visibility
    pub visible: bool,
    /// List mode
    pub list_mode: ListMode,
    /// Whether contamination results were computed for the latest edit
    #[serde(default)]
    pub contamination_ran: bool,
    /// Created locally, not yet sent
    #[serde(default)]
    pub adds: Vector<Feature>,
    /// Published features modified locally
    #[serde(default)]
    pub updates: Vector<Feature>,
    /// Published features queued for removal
    #[serde(default)]
    pub deletes: Vector<DeleteEntry>,
    /// Last-known remote baseline
    #[serde(default)]
    pub published: Vector<Feature>,
}

impl LayerRecord {
    /// Empty record created lazily on the first edit of a layer
    #[must_use]
    pub fn from_descriptor(descriptor: &LayerDescriptor) -> Self {
        Self {
            identity: descriptor.identity.clone(),
            label: descriptor.label.clone(),
            kind: descriptor.kind,
            remote_id: descriptor.remote_id,
            points_remote_id: descriptor.points_remote_id,
            status: EditStatus::Added,
            edit_type: EditType::Add,
            visible: descriptor.visible,
            list_mode: descriptor.list_mode,
            contamination_ran: false,
            adds: Vector::new(),
            updates: Vector::new(),
            deletes: Vector::new(),
            published: Vector::new(),
        }
    }

    /// Check whether the layer exists remotely
    #[inline]
    #[must_use]
    pub fn is_remote(&self) -> bool {
        self.remote_id.is_some()
    }

    /// Check whether a sublayer this layer publishes to is not known yet
    #[inline]
    #[must_use]
    pub fn lacks_sublayers(&self) -> bool {
        self.remote_id.is_none() || (self.points_remote_id.is_none() && self.kind.has_companions())
    }

    /// Check for edits not yet sent
    #[inline]
    #[must_use]
    pub fn has_pending_edits(&self) -> bool {
        !(self.adds.is_empty() && self.updates.is_empty() && self.deletes.is_empty())
    }

    /// Current logical feature set
    ///
    /// Published baseline entries shadowed by an update or a delete are
    /// skipped; updates and adds follow in bucket order.
    #[must_use]
    pub fn effective_features(&self) -> Vec<Feature> {
        let shadowed: HashSet<&Identity> = self
            .updates
            .iter()
            .map(|f| &f.identity)
            .chain(self.deletes.iter().map(|d| &d.identity))
            .collect();

        self.published
            .iter()
            .filter(|f| !shadowed.contains(&f.identity))
            .chain(self.updates.iter())
            .chain(self.adds.iter())
            .cloned()
            .collect()
    }
}

/// A plan grouping layers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioRecord {
    /// Scenario identity
    pub identity: Identity,
    /// Display label
    pub label: String,
    /// Description
    #[serde(default)]
    pub description: String,
    /// Visibility
    pub visible: bool,
    /// List mode
    pub list_mode: ListMode,
    /// Publish status
    pub status: EditStatus,
    /// Last operation applied
    pub edit_type: EditType,
    /// Whether contamination results were computed for the latest edit
    #[serde(default)]
    pub contamination_ran: bool,
    /// Hosted service, once published
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<ServiceRef>,
    /// Child layers in display order
    #[serde(default)]
    pub layers: Vector<LayerRecord>,
    /// Derived results owned by the calculation collaborator
    #[serde(default)]
    pub results: serde_json::Value,
}

impl ScenarioRecord {
    /// Fresh scenario with no layers
    #[must_use]
    pub fn from_descriptor(descriptor: &ScenarioDescriptor) -> Self {
        Self {
            identity: descriptor.identity.clone(),
            label: descriptor.label.clone(),
            description: descriptor.description.clone(),
            visible: true,
            list_mode: ListMode::Show,
            status: EditStatus::Added,
            edit_type: EditType::Add,
            contamination_ran: false,
            service: None,
            layers: Vector::new(),
            results: serde_json::Value::Null,
        }
    }

    /// Child layer by identity
    #[must_use]
    pub fn layer(&self, identity: &Identity) -> Option<&LayerRecord> {
        self.layers.iter().find(|l| &l.identity == identity)
    }
}
