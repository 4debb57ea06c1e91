//! Symbol translation for point mirrors
//!
//! A point mirror is drawn with a marker derived from its source's fill:
//! the marker takes the fill color and outline unchanged, and the shape
//! comes from the feature's `POINT_STYLE` attribute. Because
//! [`MarkerSymbol::to_extruded`] also carries colors over untouched, a mirror
//! looks the same in flat and extruded scenes.

use im::HashMap;
use planlog_model::{ExtrudedMarker, Feature, FillSymbol, MarkerShape, MarkerSymbol, Symbol};

/// Marker size used for every point mirror
pub const MARKER_SIZE: f32 = 12.0;

/// Fill symbols keyed by feature `TYPE`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StyleTable {
    fallback: FillSymbol,
    by_type: HashMap<String, FillSymbol>,
}

impl StyleTable {
    /// Table where every type uses `fallback`
    #[must_use]
    pub fn new(fallback: FillSymbol) -> Self {
        Self {
            fallback,
            by_type: HashMap::new(),
        }
    }

    /// With a symbol for one feature type
    #[must_use]
    pub fn with_type(mut self, feature_type: impl Into<String>, symbol: FillSymbol) -> Self {
        self.by_type.insert(feature_type.into(), symbol);
        self
    }

    /// Fill for a feature, by its `TYPE` attribute
    #[must_use]
    pub fn fill_for(&self, feature: &Feature) -> FillSymbol {
        feature
            .feature_type()
            .and_then(|t| self.by_type.get(t))
            .copied()
            .unwrap_or(self.fallback)
    }

    /// Iterate configured types
    pub fn types(&self) -> impl Iterator<Item = (&String, &FillSymbol)> {
        self.by_type.iter()
    }
}

/// Flat marker for a fill and an optional point style descriptor
#[must_use]
pub fn point_symbol(fill: &FillSymbol, point_style: Option<&str>) -> MarkerSymbol {
    MarkerSymbol {
        shape: point_style.map(MarkerShape::parse).unwrap_or_default(),
        color: fill.color,
        outline: fill.outline,
        size: MARKER_SIZE,
    }
}

/// Extruded marker for a fill and an optional point style descriptor
#[must_use]
pub fn scene_symbol(fill: &FillSymbol, point_style: Option<&str>) -> ExtrudedMarker {
    point_symbol(fill, point_style).to_extruded()
}

/// Symbol of the authoritative graphic
#[must_use]
pub fn authoritative_symbol(styles: &StyleTable, feature: &Feature) -> Symbol {
    let fill = styles.fill_for(feature);
    if feature.geometry.is_point() {
        Symbol::Marker(point_symbol(&fill, feature.attributes.point_style()))
    } else {
        Symbol::Fill(fill)
    }
}

/// Symbol of the point mirror
#[must_use]
pub fn mirror_symbol(styles: &StyleTable, feature: &Feature) -> Symbol {
    let fill = styles.fill_for(feature);
    Symbol::Marker(point_symbol(&fill, feature.attributes.point_style()))
}
