//! Display symbols for authoritative features and their point mirrors
//!
//! Colors are stored as raw RGBA bytes so that a symbol rendered flat and the
//! same symbol rendered extruded share exactly the same color values.

use crate::error::ModelError;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Prefix marking a path-icon point style descriptor
pub const PATH_STYLE_PREFIX: &str = "path|";

/// RGBA color, alpha in `0..=255`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgba(pub [u8; 4]);

impl Rgba {
    /// Opaque color
    #[inline]
    #[must_use]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self([r, g, b, 255])
    }

    /// Color with explicit alpha
    #[inline]
    #[must_use]
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self([r, g, b, a])
    }

    /// Same color with a different alpha
    #[inline]
    #[must_use]
    pub const fn with_alpha(self, a: u8) -> Self {
        let [r, g, b, _] = self.0;
        Self([r, g, b, a])
    }
}

impl Display for Rgba {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let [r, g, b, a] = self.0;
        write!(f, "#{r:02x}{g:02x}{b:02x}{a:02x}")
    }
}

impl FromStr for Rgba {
    type Err = ModelError;

    /// Parse `#rrggbb` or `#rrggbbaa`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.strip_prefix('#').unwrap_or(s);
        if !(hex.len() == 6 || hex.len() == 8) || !hex.is_ascii() {
            return Err(ModelError::InvalidColor(s.to_string()));
        }
        let byte = |i: usize| {
            u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| ModelError::InvalidColor(s.to_string()))
        };
        let alpha = if hex.len() == 8 { byte(6)? } else { 255 };
        Ok(Self([byte(0)?, byte(2)?, byte(4)?, alpha]))
    }
}

/// Outline stroke
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Outline {
    /// Stroke color
    pub color: Rgba,
    /// Stroke width in points
    pub width: f32,
}

/// Fill symbol of an area feature
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FillSymbol {
    /// Interior color
    pub color: Rgba,
    /// Boundary stroke
    pub outline: Outline,
}

impl Default for FillSymbol {
    fn default() -> Self {
        Self {
            color: Rgba::rgba(150, 150, 150, 51),
            outline: Outline {
                color: Rgba::rgb(50, 50, 50),
                width: 2.0,
            },
        }
    }
}

/// Marker shape of a point feature
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MarkerShape {
    /// Circle (default)
    #[default]
    Circle,
    /// Square
    Square,
    /// Diamond
    Diamond,
    /// Triangle
    Triangle,
    /// Cross
    Cross,
    /// Diagonal cross
    X,
    /// SVG path icon
    Path(String),
}

impl MarkerShape {
    /// Parse a point style descriptor
    ///
    /// Unknown names fall back to [`MarkerShape::Circle`]; descriptors
    /// starting with `path|` carry an SVG path.
    #[must_use]
    pub fn parse(descriptor: &str) -> Self {
        if let Some(path) = descriptor.strip_prefix(PATH_STYLE_PREFIX) {
            return Self::Path(path.to_string());
        }
        match descriptor.trim().to_ascii_lowercase().as_str() {
            "square" => Self::Square,
            "diamond" => Self::Diamond,
            "triangle" => Self::Triangle,
            "cross" => Self::Cross,
            "x" => Self::X,
            _ => Self::Circle,
        }
    }

    /// Descriptor string for this shape
    #[must_use]
    pub fn descriptor(&self) -> String {
        match self {
            Self::Circle => "circle".to_string(),
            Self::Square => "square".to_string(),
            Self::Diamond => "diamond".to_string(),
            Self::Triangle => "triangle".to_string(),
            Self::Cross => "cross".to_string(),
            Self::X => "x".to_string(),
            Self::Path(path) => format!("{PATH_STYLE_PREFIX}{path}"),
        }
    }
}

impl From<String> for MarkerShape {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<MarkerShape> for String {
    fn from(value: MarkerShape) -> Self {
        value.descriptor()
    }
}

/// Flat point marker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerSymbol {
    /// Marker shape
    pub shape: MarkerShape,
    /// Interior color
    pub color: Rgba,
    /// Marker outline
    pub outline: Outline,
    /// Marker size in points
    pub size: f32,
}

/// Icon resource of an extruded marker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IconResource {
    /// Built-in primitive name
    Primitive(String),
    /// SVG path
    Path(String),
}

/// Extruded (3-D scene) point marker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtrudedMarker {
    /// Icon resource
    pub resource: IconResource,
    /// Material color
    pub color: Rgba,
    /// Icon outline
    pub outline: Outline,
    /// Icon size in points
    pub size: f32,
}

impl MarkerSymbol {
    /// Same marker for a 3-D scene
    ///
    /// Colors, outline and size carry over unchanged; only the shape is
    /// re-expressed as an icon resource.
    #[must_use]
    pub fn to_extruded(&self) -> ExtrudedMarker {
        let resource = match &self.shape {
            MarkerShape::Circle => IconResource::Primitive("circle".to_string()),
            MarkerShape::Square => IconResource::Primitive("square".to_string()),
            MarkerShape::Diamond => IconResource::Primitive("kite".to_string()),
            MarkerShape::Triangle => IconResource::Primitive("triangle".to_string()),
            MarkerShape::Cross => IconResource::Primitive("cross".to_string()),
            MarkerShape::X => IconResource::Primitive("x".to_string()),
            MarkerShape::Path(path) => IconResource::Path(path.clone()),
        };
        ExtrudedMarker {
            resource,
            color: self.color,
            outline: self.outline,
            size: self.size,
        }
    }
}

/// Symbol attached to a displayed feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Symbol {
    /// Area fill
    Fill(FillSymbol),
    /// Point marker
    Marker(MarkerSymbol),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgba_parse_and_display() {
        let c: Rgba = "#ff8000".parse().unwrap();
        assert_eq!(c, Rgba::rgb(255, 128, 0));
        assert_eq!(c.to_string(), "#ff8000ff");
        let c: Rgba = "10203040".parse().unwrap();
        assert_eq!(c.0, [0x10, 0x20, 0x30, 0x40]);
    }

    #[test]
    fn rgba_rejects_bad_input() {
        assert!("#12345".parse::<Rgba>().is_err());
        assert!("#gg0000".parse::<Rgba>().is_err());
    }

    #[test]
    fn marker_shape_descriptors() {
        assert_eq!(MarkerShape::parse("Square"), MarkerShape::Square);
        assert_eq!(MarkerShape::parse("unknown"), MarkerShape::Circle);
        let path = MarkerShape::parse("path|M 0 0 L 10 10 Z");
        assert_eq!(path, MarkerShape::Path("M 0 0 L 10 10 Z".to_string()));
        assert_eq!(path.descriptor(), "path|M 0 0 L 10 10 Z");
    }

    #[test]
    fn extruded_marker_keeps_colors() {
        let marker = MarkerSymbol {
            shape: MarkerShape::Path("M 1 1".to_string()),
            color: Rgba::rgba(1, 2, 3, 4),
            outline: Outline {
                color: Rgba::rgb(9, 8, 7),
                width: 1.5,
            },
            size: 12.0,
        };
        let extruded = marker.to_extruded();
        assert_eq!(extruded.color.0, marker.color.0);
        assert_eq!(extruded.outline, marker.outline);
        assert_eq!(extruded.resource, IconResource::Path("M 1 1".to_string()));
    }

    #[test]
    fn marker_shape_serializes_as_descriptor() {
        let json = serde_json::to_string(&MarkerShape::Diamond).unwrap();
        assert_eq!(json, "\"diamond\"");
    }
}
