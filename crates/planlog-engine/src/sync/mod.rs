//! Representation synchronization
//!
//! Every authoritative feature of a sample layer is displayed three ways:
//! as itself, as a point mirror (centroid of an area, the point itself
//! otherwise) and in a hybrid collection (point mirror for points, full
//! clone for areas). [`RepresentationSynchronizer`] keeps a keyed table per
//! layer so that after every edit the mirrors cover exactly the surviving
//! identities.

mod symbols;

pub use symbols::{
    authoritative_symbol, mirror_symbol, point_symbol, scene_symbol, StyleTable, MARKER_SIZE,
};

use crate::reconciler::EditRequest;
use im::{HashMap, OrdMap};
use planlog_model::{
    Coordinate, EditLog, EditType, Feature, Geometry, Identity, LayerKind, LayerRecord, Symbol,
};
use std::collections::HashSet;
use tracing::trace;

/// A feature with the symbol it is drawn with
#[derive(Debug, Clone, PartialEq)]
pub struct Graphic {
    /// Displayed feature
    pub feature: Feature,
    /// Display symbol
    pub symbol: Symbol,
}

/// All representations of one logical feature
#[derive(Debug, Clone, PartialEq)]
pub struct Representations {
    /// The feature as edited
    pub authoritative: Graphic,
    /// Point mirror, for layer kinds with companions
    pub point: Option<Graphic>,
    /// Hybrid mirror, for layer kinds with companions
    pub hybrid: Option<Graphic>,
}

impl Representations {
    /// Build every representation of a feature
    #[must_use]
    pub fn build(feature: &Feature, kind: LayerKind, styles: &StyleTable) -> Self {
        let authoritative = Graphic {
            feature: feature.clone(),
            symbol: authoritative_symbol(styles, feature),
        };
        if !kind.has_companions() {
            return Self {
                authoritative,
                point: None,
                hybrid: None,
            };
        }

        let point = Graphic {
            feature: point_mirror(feature),
            symbol: mirror_symbol(styles, feature),
        };
        let hybrid = if feature.geometry.is_point() {
            point.clone()
        } else {
            authoritative.clone()
        };
        Self {
            authoritative,
            point: Some(point),
            hybrid: Some(hybrid),
        }
    }
}

/// Point mirror of a feature
///
/// Areas collapse to their centroid, keeping the elevation when the area is
/// uniformly 3-D.
#[must_use]
pub fn point_mirror(feature: &Feature) -> Feature {
    let geometry = match &feature.geometry {
        Geometry::Point(c) => Geometry::Point(*c),
        Geometry::Polygon(polygon) => {
            let z = if feature.geometry.is_uniformly_3d() {
                polygon.coordinates().next().and_then(|c| c.z)
            } else {
                None
            };
            let centroid = polygon.centroid().unwrap_or(Coordinate::new(0.0, 0.0));
            Geometry::Point(Coordinate { z, ..centroid })
        }
    };
    Feature {
        identity: feature.identity.clone(),
        attributes: feature.attributes.clone(),
        geometry,
    }
}

#[derive(Debug, Clone, PartialEq)]
struct LayerTable {
    kind: LayerKind,
    entries: OrdMap<Identity, Representations>,
}

impl LayerTable {
    fn new(kind: LayerKind) -> Self {
        Self {
            kind,
            entries: OrdMap::new(),
        }
    }
}

/// Keeps point and hybrid mirrors in step with authoritative features
#[derive(Debug, Clone, Default)]
pub struct RepresentationSynchronizer {
    styles: StyleTable,
    tables: HashMap<Identity, LayerTable>,
}

impl RepresentationSynchronizer {
    /// Create new synchronizer
    #[must_use]
    pub fn new(styles: StyleTable) -> Self {
        Self {
            styles,
            tables: HashMap::new(),
        }
    }

    /// Style table
    #[inline]
    #[must_use]
    pub fn styles(&self) -> &StyleTable {
        &self.styles
    }

    /// Replace the style table and redraw every symbol
    pub fn set_styles(&mut self, styles: StyleTable) {
        self.styles = styles;
        let tables: Vec<_> = self.tables.keys().cloned().collect();
        for layer in tables {
            if let Some(table) = self.tables.get_mut(&layer) {
                let kind = table.kind;
                let styles = &self.styles;
                table.entries = table
                    .entries
                    .values()
                    .map(|r| {
                        let feature = &r.authoritative.feature;
                        (feature.identity.clone(), Representations::build(feature, kind, styles))
                    })
                    .collect();
            }
        }
    }

    fn table_mut(&mut self, layer: &Identity, kind: LayerKind) -> &mut LayerTable {
        self.tables
            .entry(layer.clone())
            .or_insert_with(|| LayerTable::new(kind))
    }

    /// Synthesize mirrors for new features
    pub fn insert(&mut self, layer: &LayerRecord, features: &[Feature]) {
        let styles = self.styles.clone();
        let table = self.table_mut(&layer.identity, layer.kind);
        for feature in features {
            table.entries.insert(
                feature.identity.clone(),
                Representations::build(feature, layer.kind, &styles),
            );
        }
    }

    /// Replace geometry, attributes and symbols in place by identity
    ///
    /// Unknown identities are inserted.
    pub fn update(&mut self, layer: &LayerRecord, features: &[Feature]) {
        self.insert(layer, features);
    }

    /// Remove every representation of the given identities
    pub fn remove<'a>(&mut self, layer: &Identity, identities: impl IntoIterator<Item = &'a Identity>) {
        if let Some(table) = self.tables.get_mut(layer) {
            for identity in identities {
                table.entries.remove(identity);
            }
        }
    }

    /// Move features from one layer's tables to another's
    pub fn move_features(&mut self, from: &Identity, to: &LayerRecord, features: &[Feature]) {
        self.remove(from, features.iter().map(|f| &f.identity));
        self.insert(to, features);
    }

    /// Rebuild a layer's table from its effective features
    pub fn resync(&mut self, layer: &LayerRecord) {
        let styles = self.styles.clone();
        let entries = layer
            .effective_features()
            .iter()
            .map(|f| (f.identity.clone(), Representations::build(f, layer.kind, &styles)))
            .collect();
        self.tables.insert(
            layer.identity.clone(),
            LayerTable {
                kind: layer.kind,
                entries,
            },
        );
    }

    /// Rebuild every table and drop tables of removed layers
    pub fn resync_log(&mut self, log: &EditLog) {
        let live: HashSet<&Identity> = log.layers().map(|l| &l.identity).collect();
        self.tables.retain(|layer, _| live.contains(layer));
        for layer in log.layers() {
            self.resync(layer);
        }
    }

    /// Follow one reconciler edit
    ///
    /// `log` is the snapshot the edit produced.
    pub fn on_edit(&mut self, log: &EditLog, request: &EditRequest) {
        let layer_id = &request.layer.identity;
        let Some(layer) = log.layer(layer_id) else {
            self.tables.remove(layer_id);
            return;
        };

        match request.operation {
            EditType::Add | EditType::Update | EditType::ArcgisImport => {
                // mirror what the log stored, not the raw request copies
                let touched: HashSet<&Identity> = request.features.iter().map(|f| &f.identity).collect();
                let stored: Vec<Feature> = layer
                    .effective_features()
                    .into_iter()
                    .filter(|f| touched.contains(&f.identity))
                    .collect();
                self.update(layer, &stored);
            }
            EditType::Delete => self.remove(layer_id, request.features.iter().map(|f| &f.identity)),
            EditType::Move => self.resync(layer),
            EditType::Properties => {
                if !self.tables.contains_key(layer_id) {
                    self.resync(layer);
                }
            }
        }
        trace!(layer = %layer_id, operation = ?request.operation, "synchronized representations");
    }

    /// Representations of one feature
    #[must_use]
    pub fn get(&self, layer: &Identity, feature: &Identity) -> Option<&Representations> {
        self.tables.get(layer)?.entries.get(feature)
    }

    /// Identities with representations in a layer
    #[must_use]
    pub fn identities(&self, layer: &Identity) -> Vec<Identity> {
        self.tables
            .get(layer)
            .map(|t| t.entries.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Authoritative graphics of a layer
    #[must_use]
    pub fn authoritative(&self, layer: &Identity) -> Vec<&Graphic> {
        self.collect(layer, |r| Some(&r.authoritative))
    }

    /// Point mirrors of a layer
    #[must_use]
    pub fn points(&self, layer: &Identity) -> Vec<&Graphic> {
        self.collect(layer, |r| r.point.as_ref())
    }

    /// Hybrid mirrors of a layer
    #[must_use]
    pub fn hybrid(&self, layer: &Identity) -> Vec<&Graphic> {
        self.collect(layer, |r| r.hybrid.as_ref())
    }

    fn collect<'a>(
        &'a self,
        layer: &Identity,
        pick: impl Fn(&'a Representations) -> Option<&'a Graphic>,
    ) -> Vec<&'a Graphic> {
        self.tables
            .get(layer)
            .map(|t| t.entries.values().filter_map(pick).collect())
            .unwrap_or_default()
    }

    /// Check that every layer's mirrors cover exactly its effective features
    #[must_use]
    pub fn is_in_sync(&self, log: &EditLog) -> bool {
        log.layers().all(|layer| {
            let expected: HashSet<Identity> = layer
                .effective_features()
                .into_iter()
                .map(|f| f.identity)
                .collect();
            let Some(table) = self.tables.get(&layer.identity) else {
                return expected.is_empty();
            };
            let actual: HashSet<Identity> = table.entries.keys().cloned().collect();
            let complete = !layer.kind.has_companions()
                || table.entries.values().all(|r| r.point.is_some() && r.hybrid.is_some());
            actual == expected && complete
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconciler::apply;
    use planlog_model::{reserved, LayerDescriptor, Polygon};

    fn id(key: &str) -> Identity {
        Identity::new(key).unwrap()
    }

    fn descriptor(key: &str) -> LayerDescriptor {
        LayerDescriptor::new(id(key), key, LayerKind::SampleArea)
    }

    fn area(key: &str, x: f64) -> Feature {
        Feature::new(id(key), Geometry::Polygon(Polygon::square(x, 0.0, 2.0)))
    }

    fn point(key: &str) -> Feature {
        Feature::new(id(key), Geometry::Point(Coordinate::new(5.0, 5.0)))
    }

    #[test]
    fn area_mirror_is_centroid() {
        let mirror = point_mirror(&area("a", 10.0));
        let Geometry::Point(c) = mirror.geometry else {
            panic!("expected point");
        };
        assert!((c.x - 10.0).abs() < 1e-9);
        assert_eq!(c.z, None);
    }

    #[test]
    fn uniform_z_carries_to_mirror() {
        let mut feature = area("a", 0.0);
        feature.geometry.set_uniform_z(42.0);
        let Geometry::Point(c) = point_mirror(&feature).geometry else {
            panic!("expected point");
        };
        assert_eq!(c.z, Some(42.0));
    }

    #[test]
    fn hybrid_mixes_points_and_areas() {
        let styles = StyleTable::default();
        let a = Representations::build(&area("a", 0.0), LayerKind::SampleArea, &styles);
        let p = Representations::build(&point("p"), LayerKind::SampleArea, &styles);
        assert!(a.hybrid.as_ref().is_some_and(|h| !h.feature.geometry.is_point()));
        assert!(p.hybrid.as_ref().is_some_and(|h| h.feature.geometry.is_point()));
    }

    #[test]
    fn reference_layers_have_no_mirrors() {
        let r = Representations::build(&area("a", 0.0), LayerKind::Reference, &StyleTable::default());
        assert!(r.point.is_none() && r.hybrid.is_none());
    }

    #[test]
    fn follows_add_update_delete() {
        let mut sync = RepresentationSynchronizer::default();
        let add = EditRequest::add(descriptor("l1"), vec![area("a", 0.0), area("b", 4.0)]);
        let log = apply(&EditLog::new(), &add).unwrap();
        sync.on_edit(&log, &add);
        assert_eq!(sync.points(&id("l1")).len(), 2);

        let moved = area("a", 20.0).with_attribute(reserved::TYPE, "Swab");
        let update = EditRequest::update(descriptor("l1"), vec![moved.clone()]);
        let log = apply(&log, &update).unwrap();
        sync.on_edit(&log, &update);
        let reps = sync.get(&id("l1"), &id("a")).unwrap();
        assert_eq!(reps.authoritative.feature, moved);
        assert_eq!(reps.point.as_ref().unwrap().feature.feature_type(), Some("Swab"));

        let delete = EditRequest::delete(descriptor("l1"), vec![area("b", 4.0)]);
        let log = apply(&log, &delete).unwrap();
        sync.on_edit(&log, &delete);
        assert_eq!(sync.identities(&id("l1")), vec![id("a")]);
        assert!(sync.is_in_sync(&log));
    }

    #[test]
    fn mirrors_carry_validated_attributes() {
        let mut bare = area("a", 0.0);
        bare.attributes.remove(reserved::IDENTITY);
        let add = EditRequest::add(descriptor("l1"), vec![bare]);
        let log = apply(&EditLog::new(), &add).unwrap();

        let mut sync = RepresentationSynchronizer::default();
        sync.on_edit(&log, &add);

        let reps = sync.get(&id("l1"), &id("a")).unwrap();
        assert_eq!(reps.authoritative.feature, log.layer(&id("l1")).unwrap().adds[0]);
        let point = &reps.point.as_ref().unwrap().feature;
        assert_eq!(point.attributes.text(reserved::IDENTITY), Some("a"));
    }

    #[test]
    fn move_features_between_layers() {
        let mut sync = RepresentationSynchronizer::default();
        let source = LayerRecord::from_descriptor(&descriptor("l1"));
        let target = LayerRecord::from_descriptor(&descriptor("l2"));
        sync.insert(&source, &[area("a", 0.0), area("b", 1.0)]);
        sync.move_features(&source.identity, &target, &[area("a", 0.0)]);
        assert_eq!(sync.identities(&id("l1")), vec![id("b")]);
        assert_eq!(sync.identities(&id("l2")), vec![id("a")]);
        assert_eq!(sync.hybrid(&id("l2")).len(), 1);
    }

    #[test]
    fn resync_log_drops_removed_layers() {
        let mut sync = RepresentationSynchronizer::default();
        let add = EditRequest::add(descriptor("l1"), vec![area("a", 0.0)]);
        let log = apply(&EditLog::new(), &add).unwrap();
        sync.resync_log(&log);
        assert!(sync.is_in_sync(&log));

        let empty = crate::reconciler::remove_layer(&log, &id("l1")).unwrap();
        sync.resync_log(&empty);
        assert!(sync.identities(&id("l1")).is_empty());
        assert!(sync.authoritative(&id("l1")).is_empty());
    }
}
