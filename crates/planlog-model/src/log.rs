//! The edit log snapshot
//!
//! [`EditLog`] owns every scenario and layer record. Snapshots are values:
//! cloning one is O(1) thanks to the persistent vectors underneath, and a
//! derived snapshot shares every branch it did not touch with its parent.

use crate::feature::Feature;
use crate::identity::Identity;
use crate::record::{LayerRecord, ScenarioRecord};
use im::Vector;
use serde::{Deserialize, Serialize};

/// Top-level log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Entry {
    /// Plan with child layers
    Scenario(ScenarioRecord),
    /// Layer not attached to any plan
    Layer(LayerRecord),
}

impl Entry {
    /// Identity of the entry
    #[inline]
    #[must_use]
    pub fn identity(&self) -> &Identity {
        match self {
            Self::Scenario(s) => &s.identity,
            Self::Layer(l) => &l.identity,
        }
    }

    /// Scenario, if this entry is one
    #[inline]
    #[must_use]
    pub fn as_scenario(&self) -> Option<&ScenarioRecord> {
        match self {
            Self::Scenario(s) => Some(s),
            Self::Layer(_) => None,
        }
    }

    /// Layer, if this entry is one
    #[inline]
    #[must_use]
    pub fn as_layer(&self) -> Option<&LayerRecord> {
        match self {
            Self::Layer(l) => Some(l),
            Self::Scenario(_) => None,
        }
    }
}

/// Versioned snapshot of all local edits
///
/// # Invariants
/// - `sequence` increases by one on every successful reconciler call
/// - identities are unique across scenarios and layers
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EditLog {
    /// Change counter
    pub sequence: u64,
    /// Scenarios and root-level layers in display order
    pub entries: Vector<Entry>,
}

impl EditLog {
    /// Empty log
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Iterate scenarios
    pub fn scenarios(&self) -> impl Iterator<Item = &ScenarioRecord> {
        self.entries.iter().filter_map(Entry::as_scenario)
    }

    /// Iterate every layer, root-level first then scenario children
    pub fn layers(&self) -> impl Iterator<Item = &LayerRecord> {
        self.entries
            .iter()
            .filter_map(Entry::as_layer)
            .chain(self.scenarios().flat_map(|s| s.layers.iter()))
    }

    /// Scenario by identity
    #[must_use]
    pub fn scenario(&self, identity: &Identity) -> Option<&ScenarioRecord> {
        self.scenarios().find(|s| &s.identity == identity)
    }

    /// Layer by identity, wherever it lives
    #[must_use]
    pub fn layer(&self, identity: &Identity) -> Option<&LayerRecord> {
        self.layers().find(|l| &l.identity == identity)
    }

    /// Current features of every layer in a scenario
    ///
    /// This is the set handed to the calculation collaborator.
    #[must_use]
    pub fn scenario_features(&self, identity: &Identity) -> Vec<Feature> {
        self.scenario(identity)
            .map(|s| s.layers.iter().flat_map(LayerRecord::effective_features).collect())
            .unwrap_or_default()
    }
}
