//! Elevation assignment
//!
//! Geometries entering the log either already carry a z on every
//! coordinate or get one value applied to all of them. [`plan`] decides
//! what a feature needs without doing any I/O, so the terrain lookup can
//! happen elsewhere (see the remote crate's sampler); [`assign`] runs the
//! whole thing with a synchronous sampling closure.

use planlog_model::{Coordinate, Feature, Geometry};
use serde::{Deserialize, Serialize};

/// How z values are chosen
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ElevationPolicy {
    /// Sample terrain when no override is given
    #[serde(default)]
    pub use_terrain: bool,
    /// Fixed z for every new geometry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub override_z: Option<f64>,
}

impl ElevationPolicy {
    /// Sample terrain
    #[inline]
    #[must_use]
    pub const fn terrain() -> Self {
        Self {
            use_terrain: true,
            override_z: None,
        }
    }

    /// Fixed z
    #[inline]
    #[must_use]
    pub const fn fixed(z: f64) -> Self {
        Self {
            use_terrain: false,
            override_z: Some(z),
        }
    }

    /// Plan elevation for a feature under this policy
    ///
    /// Without terrain and without an override, flat geometries are placed
    /// at zero.
    #[must_use]
    pub fn plan(&self, feature: &Feature, reference: Option<Coordinate>) -> ElevationPlan {
        let override_z = match (self.override_z, self.use_terrain) {
            (Some(z), _) => Some(z),
            (None, false) => Some(0.0),
            (None, true) => None,
        };
        plan(feature, reference, override_z)
    }
}

/// What a feature needs before entering the log
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ElevationPlan {
    /// Already uniformly 3-D
    Unchanged,
    /// Apply a known z everywhere
    Apply(f64),
    /// Sample terrain once at this location, then apply everywhere
    Sample(Coordinate),
}

/// Decide how to elevate a feature
///
/// A point is sampled at its own location; an area at `reference`, or its
/// centroid when no reference is given.
#[must_use]
pub fn plan(feature: &Feature, reference: Option<Coordinate>, override_z: Option<f64>) -> ElevationPlan {
    if feature.geometry.is_uniformly_3d() {
        return ElevationPlan::Unchanged;
    }
    if let Some(z) = override_z {
        return ElevationPlan::Apply(z);
    }

    let location = match &feature.geometry {
        Geometry::Point(c) => Some(*c),
        Geometry::Polygon(_) => reference.or_else(|| feature.geometry.centroid()),
    };
    match location {
        Some(at) => ElevationPlan::Sample(at.flat()),
        None => ElevationPlan::Unchanged,
    }
}

/// Set one z on every coordinate
#[must_use]
pub fn apply_elevation(mut feature: Feature, z: f64) -> Feature {
    feature.geometry.set_uniform_z(z);
    feature
}

/// Elevate a feature, sampling terrain synchronously when needed
///
/// # Errors
/// Returns the sampler's error unchanged; the feature is dropped in that case.
pub fn assign<E>(
    feature: Feature,
    reference: Option<Coordinate>,
    override_z: Option<f64>,
    sample: impl FnOnce(Coordinate) -> Result<f64, E>,
) -> Result<Feature, E> {
    match plan(&feature, reference, override_z) {
        ElevationPlan::Unchanged => Ok(feature),
        ElevationPlan::Apply(z) => Ok(apply_elevation(feature, z)),
        ElevationPlan::Sample(at) => Ok(apply_elevation(feature, sample(at)?)),
    }
}

/// Strip every z value, returning the first one removed
#[must_use]
pub fn remove_z(mut feature: Feature) -> (Feature, Option<f64>) {
    let z = feature.geometry.strip_z();
    (feature, z)
}
