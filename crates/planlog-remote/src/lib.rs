//! Planlog Remote
//!
//! Async collaborators of the plan edit log: the feature service client,
//! the publish workflow and terrain sampling. The engine stays pure; this
//! crate performs the I/O and hands each response to the matching engine
//! step.
//!
//! # Core Concepts
//!
//! - [`FeatureService`]: create-service, layer listing, create-layers,
//!   update-definition, apply-edits and query
//! - [`ArcGisClient`]: reqwest implementation against an ArcGIS portal
//! - [`Publisher`]: publish a scenario, refresh renderers, import a layer
//! - [`TerrainSampler`] / [`assign_elevation`]: elevation before ingestion
//! - [`RemoteConfig`]: TOML configuration
//!
//! # Example
//!
//! ```rust,ignore
//! use planlog_remote::{ArcGisClient, Publisher, RemoteConfig};
//!
//! let config = RemoteConfig::from_toml_str(&std::fs::read_to_string("planlog.toml")?)?;
//! let publisher = Publisher::new(ArcGisClient::new(config.clone())?, config);
//! let outcome = publisher.publish_scenario(&log, &scenario_id).await?;
//! log = outcome.log;
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod config;
mod edits;
mod error;
mod http;
mod publisher;
mod renderer;
mod service;
mod terrain;
mod wire;

pub mod telemetry;

// Re-exports
pub use config::{RemoteConfig, SpatialReference};
pub use edits::{
    align_delete_results, global_id_for, merge_sublayer_results, EditBatch, LayerEdits, ResendPlan,
};
pub use error::RemoteError;
pub use http::{admin_url, ArcGisClient};
pub use publisher::{PublishOutcome, Publisher};
pub use renderer::{
    definitions_for, fields_for, missing_definitions, points_renderer, polygon_renderer,
    DrawingInfo, EsriLine, EsriSymbol, FieldDefinition, LayerDefinition, Renderer, UniqueValueInfo,
};
pub use service::{layer_url, FeatureService};
pub use terrain::{assign_elevation, assign_elevation_all, ImageServiceSampler, TerrainSampler};
pub use wire::{EsriFeature, EsriGeometry};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
