//! Planlog Engine
//!
//! Pure functions over [`planlog_model::EditLog`] snapshots.
//!
//! # Core Concepts
//!
//! - [`locate`]: resolve an identity to a scenario and layer position
//! - [`apply`]: reconcile one [`EditRequest`] into the next snapshot
//! - [`RepresentationSynchronizer`]: point and hybrid mirrors of every feature
//! - [`elevation`]: uniform z assignment before features enter the log
//! - [`reconcile_created_layers`] / [`commit_published`]: the two halves of a publish
//! - [`snapshot`]: JSON persistence
//!
//! # Example
//!
//! ```rust,ignore
//! use planlog_engine::{apply, EditRequest};
//! use planlog_model::{EditLog, LayerDescriptor, LayerKind};
//!
//! let log = EditLog::new();
//! let next = apply(&log, &EditRequest::add(descriptor, features))?;
//! assert_eq!(next.sequence, log.sequence + 1);
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod error;
mod locator;
mod publish;
mod reconciler;
mod sync;

pub mod elevation;
pub mod snapshot;

// Re-exports
pub use elevation::{ElevationPlan, ElevationPolicy};
pub use error::{EngineError, ValidationError};
pub use locator::{layer_at, layer_positions, locate, scenario_index, LayerPosition, Located};
pub use publish::{
    attach_service, commit_published, identity_map, points_name, reconcile_created_layers,
    reconcile_scenario_layers, AppliedEdits, CreatedLayer, EditFailure, FeatureEditResult,
    IdentityMap, RemoteLayerIds, POINTS_SUFFIX,
};
pub use reconciler::{add_scenario, apply, remove_layer, remove_scenario, EditRequest};
pub use sync::{
    authoritative_symbol, mirror_symbol, point_mirror, point_symbol, scene_symbol, Graphic,
    RepresentationSynchronizer, Representations, StyleTable, MARKER_SIZE,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod integration_tests {
    use super::*;
    use planlog_model::{
        EditLog, EditStatus, Feature, Geometry, Identity, LayerDescriptor, LayerKind, Polygon,
        ScenarioDescriptor,
    };
    use pretty_assertions::assert_eq;

    fn id(key: &str) -> Identity {
        Identity::new(key).unwrap()
    }

    #[test]
    fn edit_publish_reload_cycle() {
        let mut sync = RepresentationSynchronizer::default();
        let layer = LayerDescriptor::new(id("l1"), "Plan A", LayerKind::SampleArea);
        let feature = Feature::new(id("f1"), Geometry::Polygon(Polygon::square(0.0, 0.0, 4.0)));

        let log = add_scenario(&EditLog::new(), &ScenarioDescriptor::new(id("s1"), "Plan")).unwrap();
        let add = EditRequest::add(layer, vec![feature]).with_scenario(id("s1"));
        let log = apply(&log, &add).unwrap();
        sync.on_edit(&log, &add);
        assert!(sync.is_in_sync(&log));

        let response = [CreatedLayer::new(10, "Plan A"), CreatedLayer::new(11, "Plan A-points")];
        let (log, map) = reconcile_created_layers(&log, &response);
        assert_eq!(map[&id("l1")].service_id, 10);

        let results = AppliedEdits {
            id: 10,
            add_results: vec![FeatureEditResult::accepted(1, "{G-1}")],
            ..AppliedEdits::default()
        };
        let log = commit_published(&log, &id("l1"), &results).unwrap();
        assert_eq!(log.scenario(&id("s1")).unwrap().status, EditStatus::Published);

        let restored = snapshot::decode(&snapshot::encode(&log).unwrap()).unwrap();
        let mut fresh = RepresentationSynchronizer::default();
        fresh.resync_log(&restored);
        assert!(fresh.is_in_sync(&restored));
        assert_eq!(fresh.points(&id("l1")).len(), 1);
        assert_eq!(restored.layer(&id("l1")).unwrap().remote_id, Some(10));
    }
}
