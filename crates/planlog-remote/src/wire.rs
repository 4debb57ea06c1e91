//! Feature service JSON shapes for features and geometries

use crate::config::SpatialReference;
use crate::error::RemoteError;
use planlog_model::{reserved, Attributes, Coordinate, Feature, Geometry, Identity, Polygon};
use serde::{Deserialize, Serialize};

/// Geometry as sent to and returned by the service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EsriGeometry {
    /// `{x, y, z?}`
    Point {
        /// Easting
        x: f64,
        /// Northing
        y: f64,
        /// Elevation
        #[serde(default, skip_serializing_if = "Option::is_none")]
        z: Option<f64>,
        /// Spatial reference
        #[serde(rename = "spatialReference", default, skip_serializing_if = "Option::is_none")]
        spatial_reference: Option<SpatialReference>,
    },
    /// `{rings: [[[x, y, z?], ...]], hasZ}`
    Polygon {
        /// Rings as coordinate arrays
        rings: Vec<Vec<Vec<f64>>>,
        /// Whether vertices carry z
        #[serde(rename = "hasZ", default)]
        has_z: bool,
        /// Spatial reference
        #[serde(rename = "spatialReference", default, skip_serializing_if = "Option::is_none")]
        spatial_reference: Option<SpatialReference>,
    },
}

fn decode_error(message: &str) -> RemoteError {
    RemoteError::Decode(<serde_json::Error as serde::de::Error>::custom(message))
}

impl EsriGeometry {
    /// Encode a local geometry
    #[must_use]
    pub fn from_geometry(geometry: &Geometry, spatial_reference: SpatialReference) -> Self {
        match geometry {
            Geometry::Point(c) => Self::Point {
                x: c.x,
                y: c.y,
                z: c.z,
                spatial_reference: Some(spatial_reference),
            },
            Geometry::Polygon(p) => Self::Polygon {
                rings: p
                    .rings
                    .iter()
                    .map(|ring| {
                        ring.iter()
                            .map(|c| match c.z {
                                Some(z) => vec![c.x, c.y, z],
                                None => vec![c.x, c.y],
                            })
                            .collect()
                    })
                    .collect(),
                has_z: geometry.is_uniformly_3d(),
                spatial_reference: Some(spatial_reference),
            },
        }
    }

    /// Decode into a local geometry
    ///
    /// # Errors
    /// Returns error if a vertex has fewer than two ordinates
    pub fn to_geometry(&self) -> Result<Geometry, RemoteError> {
        match self {
            Self::Point { x, y, z, .. } => Ok(Geometry::Point(Coordinate { x: *x, y: *y, z: *z })),
            Self::Polygon { rings, has_z, .. } => {
                let rings = rings
                    .iter()
                    .map(|ring| {
                        ring.iter()
                            .map(|vertex| match vertex.as_slice() {
                                [x, y, z, ..] if *has_z => Ok(Coordinate::with_z(*x, *y, *z)),
                                [x, y, ..] => Ok(Coordinate::new(*x, *y)),
                                _ => Err(decode_error("polygon vertex needs at least two ordinates")),
                            })
                            .collect::<Result<Vec<_>, _>>()
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Geometry::Polygon(Polygon::new(rings)))
            }
        }
    }
}

/// Feature as sent to and returned by the service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EsriFeature {
    /// Attribute values
    #[serde(default)]
    pub attributes: Attributes,
    /// Shape, absent for attribute-only results
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry: Option<EsriGeometry>,
}

impl EsriFeature {
    /// Encode a local feature
    #[must_use]
    pub fn from_feature(feature: &Feature, spatial_reference: SpatialReference) -> Self {
        Self {
            attributes: feature.attributes.clone(),
            geometry: Some(EsriGeometry::from_geometry(&feature.geometry, spatial_reference)),
        }
    }

    /// Decode into a local feature
    ///
    /// The identity comes from `PERMANENT_IDENTIFIER`, then `GLOBALID`; a
    /// feature with neither gets a fresh one.
    ///
    /// # Errors
    /// Returns error if the geometry is missing or malformed
    pub fn into_feature(self) -> Result<Feature, RemoteError> {
        let geometry = self
            .geometry
            .as_ref()
            .ok_or_else(|| decode_error("feature has no geometry"))?
            .to_geometry()?;
        let identity = self
            .attributes
            .text(reserved::IDENTITY)
            .or_else(|| self.attributes.global_id())
            .and_then(|key| Identity::new(key).ok())
            .unwrap_or_else(Identity::generate);

        let mut attributes = self.attributes;
        attributes.insert(reserved::IDENTITY, identity.as_str());
        Ok(Feature {
            identity,
            attributes,
            geometry,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use planlog_model::AttrValue;
    use pretty_assertions::assert_eq;

    #[test]
    fn polygon_json_shape() {
        let mut geometry = Geometry::Polygon(Polygon::square(0.0, 0.0, 2.0));
        geometry.set_uniform_z(5.0);
        let json = serde_json::to_value(EsriGeometry::from_geometry(&geometry, SpatialReference::default()))
            .unwrap();
        assert_eq!(json["hasZ"], true);
        assert_eq!(json["rings"][0][0], serde_json::json!([-1.0, -1.0, 5.0]));
        assert_eq!(json["spatialReference"]["wkid"], 3857);
    }

    #[test]
    fn point_json_decodes() {
        let json = serde_json::json!({ "x": 1.5, "y": 2.5, "spatialReference": { "wkid": 3857 } });
        let decoded: EsriGeometry = serde_json::from_value(json).unwrap();
        assert_eq!(decoded.to_geometry().unwrap(), Geometry::Point(Coordinate::new(1.5, 2.5)));
    }

    #[test]
    fn remote_feature_takes_identity_from_attributes() {
        let json = serde_json::json!({
            "attributes": { "OBJECTID": 4, "GLOBALID": "{G-4}", "PERMANENT_IDENTIFIER": "f-4", "TYPE": "Sponge" },
            "geometry": { "rings": [[[0, 0], [0, 1], [1, 1], [0, 0]]] }
        });
        let feature: EsriFeature = serde_json::from_value(json).unwrap();
        let feature = feature.into_feature().unwrap();
        assert_eq!(feature.identity.as_str(), "f-4");
        assert_eq!(feature.attributes.get(reserved::OBJECT_ID), Some(&AttrValue::Number(4.0)));
        assert!(feature.validated().is_ok());
    }

    #[test]
    fn global_id_is_identity_fallback() {
        let feature = EsriFeature {
            attributes: Attributes::new().with(reserved::GLOBAL_ID, "{G-9}"),
            geometry: Some(EsriGeometry::Point {
                x: 0.0,
                y: 0.0,
                z: None,
                spatial_reference: None,
            }),
        };
        let feature = feature.into_feature().unwrap();
        assert_eq!(feature.identity.as_str(), "{G-9}");
        assert_eq!(feature.attributes.text(reserved::IDENTITY), Some("{G-9}"));
    }

    #[test]
    fn missing_geometry_is_a_decode_error() {
        let feature = EsriFeature {
            attributes: Attributes::new(),
            geometry: None,
        };
        assert!(matches!(feature.into_feature(), Err(RemoteError::Decode(_))));
    }
}
