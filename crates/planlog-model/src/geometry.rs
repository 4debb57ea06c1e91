//! Point and polygon geometry
//!
//! Geometries are stored in map units. Every coordinate may carry an
//! optional `z`; elevation rules live in the engine, this module only
//! provides the primitives (centroid, uniform-z checks, z stripping).

use serde::{Deserialize, Serialize};

/// Single coordinate with optional elevation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    /// Easting / longitude
    pub x: f64,
    /// Northing / latitude
    pub y: f64,
    /// Elevation, if assigned
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z: Option<f64>,
}

impl Coordinate {
    /// 2-D coordinate
    #[inline]
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y, z: None }
    }

    /// 3-D coordinate
    #[inline]
    #[must_use]
    pub const fn with_z(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z: Some(z) }
    }

    /// Same position without elevation
    #[inline]
    #[must_use]
    pub const fn flat(self) -> Self {
        Self::new(self.x, self.y)
    }
}

/// Closed ring of coordinates
pub type Ring = Vec<Coordinate>;

/// Polygon made of one outer ring followed by optional holes
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Polygon {
    /// Rings; the first is the outer boundary
    pub rings: Vec<Ring>,
}

impl Polygon {
    /// Polygon from rings
    #[inline]
    #[must_use]
    pub fn new(rings: Vec<Ring>) -> Self {
        Self { rings }
    }

    /// Axis-aligned square centred on `(cx, cy)`
    #[must_use]
    pub fn square(cx: f64, cy: f64, size: f64) -> Self {
        let h = size / 2.0;
        Self::new(vec![vec![
            Coordinate::new(cx - h, cy - h),
            Coordinate::new(cx - h, cy + h),
            Coordinate::new(cx + h, cy + h),
            Coordinate::new(cx + h, cy - h),
            Coordinate::new(cx - h, cy - h),
        ]])
    }

    /// Iterate every coordinate of every ring
    #[inline]
    pub fn coordinates(&self) -> impl Iterator<Item = &Coordinate> {
        self.rings.iter().flatten()
    }

    /// Area-weighted centroid of the outer ring
    ///
    /// Falls back to the vertex average when the ring is degenerate.
    #[must_use]
    pub fn centroid(&self) -> Option<Coordinate> {
        let ring = self.rings.first().filter(|r| !r.is_empty())?;

        let mut area2 = 0.0;
        let mut cx = 0.0;
        let mut cy = 0.0;
        for pair in ring.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            let cross = a.x * b.y - b.x * a.y;
            area2 += cross;
            cx += (a.x + b.x) * cross;
            cy += (a.y + b.y) * cross;
        }

        if area2.abs() > f64::EPSILON {
            return Some(Coordinate::new(cx / (3.0 * area2), cy / (3.0 * area2)));
        }

        #[allow(clippy::cast_precision_loss)]
        let n = ring.len() as f64;
        let (sx, sy) = ring.iter().fold((0.0, 0.0), |(sx, sy), c| (sx + c.x, sy + c.y));
        Some(Coordinate::new(sx / n, sy / n))
    }
}

/// Feature geometry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Geometry {
    /// Single point
    Point(Coordinate),
    /// Area
    Polygon(Polygon),
}

impl Geometry {
    /// Check if geometry is point-shaped
    #[inline]
    #[must_use]
    pub fn is_point(&self) -> bool {
        matches!(self, Self::Point(_))
    }

    /// Representative point: the point itself or the polygon centroid
    #[inline]
    #[must_use]
    pub fn centroid(&self) -> Option<Coordinate> {
        match self {
            Self::Point(c) => Some(*c),
            Self::Polygon(p) => p.centroid(),
        }
    }

    /// Check that every coordinate carries a z value
    ///
    /// Empty geometries are never considered 3-D.
    #[must_use]
    pub fn is_uniformly_3d(&self) -> bool {
        match self {
            Self::Point(c) => c.z.is_some(),
            Self::Polygon(p) => {
                let mut coords = p.coordinates().peekable();
                coords.peek().is_some() && coords.all(|c| c.z.is_some())
            }
        }
    }

    /// Set the same z on every coordinate
    pub fn set_uniform_z(&mut self, z: f64) {
        match self {
            Self::Point(c) => c.z = Some(z),
            Self::Polygon(p) => {
                for c in p.rings.iter_mut().flatten() {
                    c.z = Some(z);
                }
            }
        }
    }

    /// Strip every z value, returning the first one found
    pub fn strip_z(&mut self) -> Option<f64> {
        match self {
            Self::Point(c) => c.z.take(),
            Self::Polygon(p) => p
                .rings
                .iter_mut()
                .flatten()
                .fold(None, |found, c| {
                    let z = c.z.take();
                    found.or(z)
                }),
        }
    }
}
