//! Record lookup by identity
//!
//! [`locate`] resolves a target identity to its position in the log. A miss
//! is not an error: it tells the reconciler to create a template record.

use planlog_model::{EditLog, Entry, Identity, LayerRecord, ScenarioRecord};

/// Where a layer record lives in the log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerPosition {
    /// Root-level entry index
    Root(usize),
    /// Child of the scenario at `scenario`, at child index `layer`
    Nested { scenario: usize, layer: usize },
}

impl LayerPosition {
    /// Index of the owning scenario entry, if nested
    #[inline]
    #[must_use]
    pub fn scenario_index(self) -> Option<usize> {
        match self {
            Self::Root(_) => None,
            Self::Nested { scenario, .. } => Some(scenario),
        }
    }
}

/// Lookup result
///
/// All fields are `None` when nothing matched. When the target is itself a
/// scenario, only the scenario fields are set.
#[derive(Debug, Clone, Copy, Default)]
pub struct Located<'a> {
    /// Index of the owning (or matched) scenario entry
    pub scenario_index: Option<usize>,
    /// Root entry index, or child index within the scenario
    pub layer_index: Option<usize>,
    /// Owning (or matched) scenario
    pub scenario: Option<&'a ScenarioRecord>,
    /// Matched layer
    pub layer: Option<&'a LayerRecord>,
}

impl<'a> Located<'a> {
    /// Check whether anything matched
    #[inline]
    #[must_use]
    pub fn is_found(&self) -> bool {
        self.layer.is_some() || self.scenario.is_some()
    }

    /// Check whether the target identity named a scenario
    #[inline]
    #[must_use]
    pub fn is_scenario(&self) -> bool {
        self.scenario.is_some() && self.layer.is_none()
    }

    /// Position of the matched layer
    #[must_use]
    pub fn position(&self) -> Option<LayerPosition> {
        match (self.scenario_index, self.layer_index) {
            (None, Some(layer)) => Some(LayerPosition::Root(layer)),
            (Some(scenario), Some(layer)) => Some(LayerPosition::Nested { scenario, layer }),
            _ => None,
        }
    }
}

/// Find a layer or scenario by identity
///
/// Search order: root-level layers, then scenarios themselves, then each
/// scenario's child layers. Linear in the number of records.
#[must_use]
pub fn locate<'a>(log: &'a EditLog, identity: &Identity) -> Located<'a> {
    for (index, entry) in log.entries.iter().enumerate() {
        if let Entry::Layer(layer) = entry {
            if &layer.identity == identity {
                return Located {
                    layer_index: Some(index),
                    layer: Some(layer),
                    ..Located::default()
                };
            }
        }
    }

    for (index, entry) in log.entries.iter().enumerate() {
        if let Entry::Scenario(scenario) = entry {
            if &scenario.identity == identity {
                return Located {
                    scenario_index: Some(index),
                    scenario: Some(scenario),
                    ..Located::default()
                };
            }
        }
    }

    for (index, entry) in log.entries.iter().enumerate() {
        if let Entry::Scenario(scenario) = entry {
            if let Some(child) = scenario.layers.iter().position(|l| &l.identity == identity) {
                return Located {
                    scenario_index: Some(index),
                    layer_index: Some(child),
                    scenario: Some(scenario),
                    layer: scenario.layers.get(child),
                };
            }
        }
    }

    Located::default()
}

/// Index of a scenario entry
#[must_use]
pub fn scenario_index(log: &EditLog, identity: &Identity) -> Option<usize> {
    log.entries
        .iter()
        .position(|e| matches!(e, Entry::Scenario(s) if &s.identity == identity))
}

/// Every layer position in log order
#[must_use]
pub fn layer_positions(log: &EditLog) -> Vec<LayerPosition> {
    let mut positions = Vec::new();
    for (index, entry) in log.entries.iter().enumerate() {
        match entry {
            Entry::Layer(_) => positions.push(LayerPosition::Root(index)),
            Entry::Scenario(s) => positions.extend(
                (0..s.layers.len()).map(|layer| LayerPosition::Nested {
                    scenario: index,
                    layer,
                }),
            ),
        }
    }
    positions
}

/// Layer at a position
#[must_use]
pub fn layer_at(log: &EditLog, position: LayerPosition) -> Option<&LayerRecord> {
    match position {
        LayerPosition::Root(index) => log.entries.get(index)?.as_layer(),
        LayerPosition::Nested { scenario, layer } => {
            log.entries.get(scenario)?.as_scenario()?.layers.get(layer)
        }
    }
}

/// Mutable layer at a position of an owned snapshot
pub(crate) fn layer_at_mut(log: &mut EditLog, position: LayerPosition) -> Option<&mut LayerRecord> {
    match position {
        LayerPosition::Root(index) => match log.entries.get_mut(index)? {
            Entry::Layer(layer) => Some(layer),
            Entry::Scenario(_) => None,
        },
        LayerPosition::Nested { scenario, layer } => match log.entries.get_mut(scenario)? {
            Entry::Scenario(s) => s.layers.get_mut(layer),
            Entry::Layer(_) => None,
        },
    }
}

/// Mutable scenario at an entry index of an owned snapshot
pub(crate) fn scenario_at_mut(log: &mut EditLog, index: usize) -> Option<&mut ScenarioRecord> {
    match log.entries.get_mut(index)? {
        Entry::Scenario(s) => Some(s),
        Entry::Layer(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use planlog_model::{LayerDescriptor, LayerKind, ScenarioDescriptor};

    fn id(key: &str) -> Identity {
        Identity::new(key).unwrap()
    }

    fn layer(key: &str) -> LayerRecord {
        LayerRecord::from_descriptor(&LayerDescriptor::new(id(key), key, LayerKind::SampleArea))
    }

    fn log() -> EditLog {
        let mut scenario = ScenarioRecord::from_descriptor(&ScenarioDescriptor::new(id("s1"), "Plan"));
        scenario.layers.push_back(layer("child-a"));
        scenario.layers.push_back(layer("child-b"));

        let mut log = EditLog::new();
        log.entries.push_back(Entry::Layer(layer("root")));
        log.entries.push_back(Entry::Scenario(scenario));
        log
    }

    #[test]
    fn locate_root_layer() {
        let log = log();
        let found = locate(&log, &id("root"));
        assert_eq!(found.position(), Some(LayerPosition::Root(0)));
        assert!(found.scenario.is_none());
    }

    #[test]
    fn locate_scenario_itself() {
        let log = log();
        let found = locate(&log, &id("s1"));
        assert!(found.is_scenario());
        assert_eq!(found.scenario_index, Some(1));
        assert_eq!(found.position(), None);
    }

    #[test]
    fn locate_nested_layer() {
        let log = log();
        let found = locate(&log, &id("child-b"));
        assert_eq!(
            found.position(),
            Some(LayerPosition::Nested { scenario: 1, layer: 1 })
        );
        assert_eq!(found.scenario.map(|s| s.identity.as_str()), Some("s1"));
        assert_eq!(found.layer.map(|l| l.identity.as_str()), Some("child-b"));
    }

    #[test]
    fn locate_missing_is_not_found() {
        let log = log();
        let found = locate(&log, &id("nope"));
        assert!(!found.is_found());
        assert!(found.scenario_index.is_none() && found.layer_index.is_none());
    }

    #[test]
    fn positions_cover_every_layer() {
        let log = log();
        let positions = layer_positions(&log);
        assert_eq!(positions.len(), 3);
        for position in positions {
            assert!(layer_at(&log, position).is_some());
        }
    }
}
