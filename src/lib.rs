//! `EcoGares` - eco-mobility scores for French train stations
//!
//! Counts bike parkings, EV chargers and carpool areas around each station,
//! folds them into a 0-10 note, tags stations by region and suggests a
//! better-equipped station nearby.

pub mod api;
pub mod cache;
pub mod config;
pub mod dataset;
pub mod error;
pub mod geo;
pub mod ranking;
pub mod registry;
pub mod scoring;
pub mod sources;
pub mod station;
pub mod stats;
pub mod tags;
pub mod telemetry;
pub mod web;

pub use config::EcoGaresConfig;
pub use dataset::{AmenityKind, PointDataset};
pub use error::EcoGaresError;
pub use geo::{BoundingBox, GeoPoint};
pub use ranking::{RankerSettings, find_best_alternative};
pub use registry::{SharedRegistry, StationRegistry};
pub use scoring::{AmenityCounts, AmenityDatasets, ScoreResult, analyze};
pub use station::{Station, StationCategory, StationId};
pub use stats::GlobalStats;
pub use tags::{Tag, compute_tags};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Core result type used throughout the library
pub type Result<T> = std::result::Result<T, EcoGaresError>;
