//! Renderer and sublayer definitions
//!
//! Each logical layer is published as a polygon sublayer named after its
//! label and, for sample layers, a `<label>-points` sublayer. Both use a
//! unique-value renderer on `TYPE` with one class per distinct type found
//! in the layer's features.

use planlog_engine::{point_symbol, points_name, StyleTable};
use planlog_model::{
    reserved, AttrValue, Feature, FillSymbol, LayerRecord, MarkerShape, MarkerSymbol, Outline,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Line symbol of an outline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EsriLine {
    /// Always `esriSLS`
    #[serde(rename = "type")]
    pub kind: String,
    /// Always `esriSLSSolid`
    pub style: String,
    /// RGBA
    pub color: [u8; 4],
    /// Width in points
    pub width: f32,
}

impl From<Outline> for EsriLine {
    fn from(outline: Outline) -> Self {
        Self {
            kind: "esriSLS".to_string(),
            style: "esriSLSSolid".to_string(),
            color: outline.color.0,
            width: outline.width,
        }
    }
}

/// Service-side symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EsriSymbol {
    /// Simple fill
    #[serde(rename = "esriSFS")]
    Fill {
        /// Fill style
        style: String,
        /// RGBA
        color: [u8; 4],
        /// Outline
        outline: EsriLine,
    },
    /// Simple marker
    #[serde(rename = "esriSMS")]
    Marker {
        /// Marker style
        style: String,
        /// RGBA
        color: [u8; 4],
        /// Size in points
        size: f32,
        /// Outline
        outline: EsriLine,
    },
}

impl From<&FillSymbol> for EsriSymbol {
    fn from(fill: &FillSymbol) -> Self {
        Self::Fill {
            style: "esriSFSSolid".to_string(),
            color: fill.color.0,
            outline: fill.outline.into(),
        }
    }
}

impl From<&MarkerSymbol> for EsriSymbol {
    fn from(marker: &MarkerSymbol) -> Self {
        let style = match marker.shape {
            MarkerShape::Square => "esriSMSSquare",
            MarkerShape::Diamond => "esriSMSDiamond",
            MarkerShape::Triangle => "esriSMSTriangle",
            MarkerShape::Cross => "esriSMSCross",
            MarkerShape::X => "esriSMSX",
            // path icons have no simple-marker style
            MarkerShape::Circle | MarkerShape::Path(_) => "esriSMSCircle",
        };
        Self::Marker {
            style: style.to_string(),
            color: marker.color.0,
            size: marker.size,
            outline: marker.outline.into(),
        }
    }
}

/// One renderer class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniqueValueInfo {
    /// `TYPE` value
    pub value: String,
    /// Legend label
    pub label: String,
    /// Class symbol
    pub symbol: EsriSymbol,
}

/// Unique-value renderer on `TYPE`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Renderer {
    /// Always `uniqueValue`
    #[serde(rename = "type")]
    pub kind: String,
    /// Classified field
    pub field1: String,
    /// Symbol for unclassified features
    pub default_symbol: EsriSymbol,
    /// Legend label for unclassified features
    pub default_label: String,
    /// Classes in first-seen order
    pub unique_value_infos: Vec<UniqueValueInfo>,
}

impl Renderer {
    fn unique_value(default_symbol: EsriSymbol, unique_value_infos: Vec<UniqueValueInfo>) -> Self {
        Self {
            kind: "uniqueValue".to_string(),
            field1: reserved::TYPE.to_string(),
            default_symbol,
            default_label: "Other".to_string(),
            unique_value_infos,
        }
    }
}

/// First feature of every distinct `TYPE`, in first-seen order
fn distinct_types(features: &[Feature]) -> Vec<(&str, &Feature)> {
    let mut seen = Vec::new();
    for feature in features {
        if let Some(t) = feature.feature_type() {
            if !seen.iter().any(|(s, _)| *s == t) {
                seen.push((t, feature));
            }
        }
    }
    seen
}

/// Renderer of a polygon sublayer
#[must_use]
pub fn polygon_renderer(features: &[Feature], styles: &StyleTable) -> Renderer {
    let infos = distinct_types(features)
        .into_iter()
        .map(|(value, feature)| UniqueValueInfo {
            value: value.to_string(),
            label: value.to_string(),
            symbol: (&styles.fill_for(feature)).into(),
        })
        .collect();
    Renderer::unique_value((&FillSymbol::default()).into(), infos)
}

/// Renderer of a points sublayer
#[must_use]
pub fn points_renderer(features: &[Feature], styles: &StyleTable) -> Renderer {
    let infos = distinct_types(features)
        .into_iter()
        .map(|(value, feature)| {
            let marker = point_symbol(&styles.fill_for(feature), feature.attributes.point_style());
            UniqueValueInfo {
                value: value.to_string(),
                label: value.to_string(),
                symbol: (&marker).into(),
            }
        })
        .collect();
    let fallback = point_symbol(&FillSymbol::default(), None);
    Renderer::unique_value((&fallback).into(), infos)
}

/// Attribute field of a sublayer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    /// Field name
    pub name: String,
    /// `esriFieldType*`
    #[serde(rename = "type")]
    pub kind: String,
    /// Display alias
    pub alias: String,
    /// Whether nulls are allowed
    pub nullable: bool,
}

impl FieldDefinition {
    fn new(name: &str, kind: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: kind.to_string(),
            alias: name.to_string(),
            nullable: kind != "esriFieldTypeOID",
        }
    }
}

/// Drawing info wrapper
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawingInfo {
    /// Renderer
    pub renderer: Renderer,
}

/// One sublayer in an add-to-definition request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerDefinition {
    /// Sublayer name
    pub name: String,
    /// Always `Feature Layer`
    #[serde(rename = "type")]
    pub kind: String,
    /// `esriGeometryPolygon` or `esriGeometryPoint`
    pub geometry_type: String,
    /// Vertices carry z
    pub has_z: bool,
    /// Object id field name
    pub object_id_field: String,
    /// Global id field name
    pub global_id_field: String,
    /// Attribute schema
    pub fields: Vec<FieldDefinition>,
    /// Symbology
    pub drawing_info: DrawingInfo,
}

fn field_type(value: &AttrValue) -> &'static str {
    match value {
        AttrValue::Number(_) => "esriFieldTypeDouble",
        AttrValue::Bool(_) => "esriFieldTypeSmallInteger",
        AttrValue::Null | AttrValue::Text(_) => "esriFieldTypeString",
    }
}

/// Field schema: reserved fields first, then every other key seen
#[must_use]
pub fn fields_for(features: &[Feature]) -> Vec<FieldDefinition> {
    let mut fields = vec![
        FieldDefinition::new(reserved::OBJECT_ID, "esriFieldTypeOID"),
        FieldDefinition::new(reserved::GLOBAL_ID, "esriFieldTypeGlobalID"),
        FieldDefinition::new(reserved::IDENTITY, "esriFieldTypeString"),
        FieldDefinition::new(reserved::TYPE, "esriFieldTypeString"),
        FieldDefinition::new(reserved::TYPE_UUID, "esriFieldTypeString"),
        FieldDefinition::new(reserved::POINT_STYLE, "esriFieldTypeString"),
    ];

    let mut extra: BTreeMap<&str, &'static str> = BTreeMap::new();
    for (key, value) in features.iter().flat_map(|f| f.attributes.iter()) {
        if fields.iter().any(|f| f.name == key) {
            continue;
        }
        let kind = field_type(value);
        extra
            .entry(key)
            .and_modify(|k| {
                // a null first sighting should not pin the field to text
                if !value.is_null() {
                    *k = kind;
                }
            })
            .or_insert(kind);
    }
    fields.extend(extra.into_iter().map(|(name, kind)| FieldDefinition::new(name, kind)));
    fields
}

/// Sublayer definitions for an unpublished layer
///
/// Returns the polygon sublayer and, for layer kinds with companions, the
/// points sublayer.
#[must_use]
pub fn definitions_for(layer: &LayerRecord, styles: &StyleTable) -> Vec<LayerDefinition> {
    build_definitions(layer, styles, true, true)
}

/// Definitions of the sublayers a layer has no remote id for yet
#[must_use]
pub fn missing_definitions(layer: &LayerRecord, styles: &StyleTable) -> Vec<LayerDefinition> {
    build_definitions(
        layer,
        styles,
        layer.remote_id.is_none(),
        layer.points_remote_id.is_none(),
    )
}

fn build_definitions(
    layer: &LayerRecord,
    styles: &StyleTable,
    polygons: bool,
    points: bool,
) -> Vec<LayerDefinition> {
    let features = layer.effective_features();
    let fields = fields_for(&features);
    let definition = |name: String, geometry_type: &str, renderer: Renderer| LayerDefinition {
        name,
        kind: "Feature Layer".to_string(),
        geometry_type: geometry_type.to_string(),
        has_z: true,
        object_id_field: reserved::OBJECT_ID.to_string(),
        global_id_field: reserved::GLOBAL_ID.to_string(),
        fields: fields.clone(),
        drawing_info: DrawingInfo { renderer },
    };

    let mut definitions = Vec::new();
    if polygons {
        definitions.push(definition(
            layer.label.clone(),
            "esriGeometryPolygon",
            polygon_renderer(&features, styles),
        ));
    }
    if points && layer.kind.has_companions() {
        definitions.push(definition(
            points_name(&layer.label),
            "esriGeometryPoint",
            points_renderer(&features, styles),
        ));
    }
    definitions
}

#[cfg(test)]
mod tests {
    use super::*;
    use planlog_model::{Geometry, Identity, LayerDescriptor, LayerKind, Polygon, Rgba};
    use pretty_assertions::assert_eq;

    fn typed(key: &str, feature_type: &str) -> Feature {
        Feature::new(
            Identity::new(key).unwrap(),
            Geometry::Polygon(Polygon::square(0.0, 0.0, 1.0)),
        )
        .with_attribute(reserved::TYPE, feature_type)
    }

    fn sponge() -> FillSymbol {
        FillSymbol {
            color: Rgba::rgba(10, 20, 30, 200),
            outline: Outline {
                color: Rgba::rgb(1, 2, 3),
                width: 2.0,
            },
        }
    }

    #[test]
    fn renderer_has_one_class_per_type() {
        let features = vec![typed("a", "Sponge"), typed("b", "Swab"), typed("c", "Sponge")];
        let styles = StyleTable::default().with_type("Sponge", sponge());
        let renderer = polygon_renderer(&features, &styles);
        let values: Vec<_> = renderer.unique_value_infos.iter().map(|i| i.value.as_str()).collect();
        assert_eq!(values, vec!["Sponge", "Swab"]);
        assert_eq!(
            renderer.unique_value_infos[0].symbol,
            EsriSymbol::from(&sponge())
        );
    }

    #[test]
    fn points_renderer_uses_point_style() {
        let features = vec![typed("a", "Sponge").with_attribute(reserved::POINT_STYLE, "triangle")];
        let renderer = points_renderer(&features, &StyleTable::default().with_type("Sponge", sponge()));
        let EsriSymbol::Marker { style, color, .. } = &renderer.unique_value_infos[0].symbol else {
            panic!("expected marker");
        };
        assert_eq!(style, "esriSMSTriangle");
        assert_eq!(*color, sponge().color.0);
    }

    #[test]
    fn renderer_json_shape() {
        let json = serde_json::to_value(polygon_renderer(&[], &StyleTable::default())).unwrap();
        assert_eq!(json["type"], "uniqueValue");
        assert_eq!(json["field1"], "TYPE");
        assert_eq!(json["defaultSymbol"]["type"], "esriSFS");
        assert_eq!(json["defaultSymbol"]["outline"]["type"], "esriSLS");
    }

    #[test]
    fn sample_layers_get_points_definition() {
        let mut layer = LayerRecord::from_descriptor(&LayerDescriptor::new(
            Identity::new("l1").unwrap(),
            "Plan A",
            LayerKind::SampleArea,
        ));
        layer.adds.push_back(typed("a", "Sponge").with_attribute("AREA", 4.0));
        let definitions = definitions_for(&layer, &StyleTable::default());
        let names: Vec<_> = definitions.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["Plan A", "Plan A-points"]);
        assert_eq!(definitions[1].geometry_type, "esriGeometryPoint");
        assert!(definitions[0]
            .fields
            .iter()
            .any(|f| f.name == "AREA" && f.kind == "esriFieldTypeDouble"));

        layer.kind = LayerKind::Reference;
        assert_eq!(definitions_for(&layer, &StyleTable::default()).len(), 1);
    }

    #[test]
    fn missing_definitions_skip_known_sublayers() {
        let mut layer = LayerRecord::from_descriptor(&LayerDescriptor::new(
            Identity::new("l1").unwrap(),
            "Plan A",
            LayerKind::SampleArea,
        ));
        assert_eq!(missing_definitions(&layer, &StyleTable::default()).len(), 2);

        layer.remote_id = Some(4);
        let names: Vec<_> = missing_definitions(&layer, &StyleTable::default())
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(names, vec!["Plan A-points".to_string()]);

        layer.points_remote_id = Some(5);
        assert!(missing_definitions(&layer, &StyleTable::default()).is_empty());
    }
}
