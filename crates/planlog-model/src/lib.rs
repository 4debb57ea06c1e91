//! Planlog Model
//!
//! Value types for the offline-first plan edit log.
//!
//! # Core Concepts
//!
//! - [`Identity`]: stable key joining features, layers and scenarios
//! - [`Feature`]: identity + [`Attributes`] + [`Geometry`]
//! - [`LayerRecord`]: four feature buckets (`adds`, `updates`, `deletes`, `published`)
//! - [`ScenarioRecord`]: a plan owning an ordered list of layers
//! - [`EditLog`]: the versioned snapshot owning every record
//!
//! # Example
//!
//! ```rust,ignore
//! use planlog_model::{EditLog, Feature, Geometry, Identity, Polygon};
//!
//! let log = EditLog::new();
//! let feature = Feature::new(Identity::generate(), Geometry::Polygon(Polygon::square(0.0, 0.0, 10.0)));
//! assert_eq!(log.sequence, 0);
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

// Core modules
mod attributes;
mod error;
mod feature;
mod geometry;
mod identity;
mod log;
mod record;
mod symbol;

// Re-exports
pub use attributes::{reserved, AttrValue, Attributes};
pub use error::ModelError;
pub use feature::{DeleteEntry, Feature};
pub use geometry::{Coordinate, Geometry, Polygon, Ring};
pub use identity::Identity;
pub use log::{EditLog, Entry};
pub use record::{
    EditStatus, EditType, LayerDescriptor, LayerKind, LayerRecord, ListMode, ScenarioDescriptor,
    ScenarioRecord, ServiceRef,
};
pub use symbol::{
    ExtrudedMarker, FillSymbol, IconResource, MarkerShape, MarkerSymbol, Outline, Rgba, Symbol,
    PATH_STYLE_PREFIX,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
