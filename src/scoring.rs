//! Station eco-score: nearby amenity counts folded into a capped 0–10 note.

use serde::{Deserialize, Serialize};

use crate::dataset::PointDataset;
use crate::station::Station;

/// Walking radius for bike parkings (roughly ten minutes on foot).
pub const BIKE_RADIUS_KM: f64 = 0.8;
/// Radius for EV chargers and carpool areas.
pub const CHARGER_RADIUS_KM: f64 = 3.0;
pub const CARPOOL_RADIUS_KM: f64 = 3.0;

pub const TGV_BONUS: f64 = 1.0;
pub const BIKE_WEIGHT: f64 = 1.0;
pub const BIKE_CAP: f64 = 7.0;
pub const CHARGER_WEIGHT: f64 = 0.5;
pub const CHARGER_CAP: f64 = 2.0;
pub const CARPOOL_WEIGHT: f64 = 0.5;
pub const CARPOOL_CAP: f64 = 1.0;
pub const MAX_NOTE: f64 = 10.0;

/// Amenity counts around one station.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmenityCounts {
    pub bikes: usize,
    pub chargers: usize,
    pub carpool: usize,
}

impl AmenityCounts {
    #[must_use]
    pub fn total(&self) -> usize {
        self.bikes + self.chargers + self.carpool
    }
}

/// Outcome of one station analysis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    /// Composite note in `[0, 10]`, one decimal.
    pub note: f64,
    pub details: AmenityCounts,
    /// Sum of the three counts, used to break ties between equal notes.
    pub total: usize,
}

impl ScoreResult {
    #[must_use]
    pub fn from_counts(is_tgv: bool, details: AmenityCounts) -> Self {
        Self {
            note: note_for(is_tgv, &details),
            details,
            total: details.total(),
        }
    }
}

/// Weighted, capped sum rounded to one decimal then clamped to [`MAX_NOTE`].
/// The caps add up to 11, so a full station saturates at 10.
#[must_use]
pub fn note_for(is_tgv: bool, counts: &AmenityCounts) -> f64 {
    let raw = if is_tgv { TGV_BONUS } else { 0.0 }
        + (counts.bikes as f64 * BIKE_WEIGHT).min(BIKE_CAP)
        + (counts.chargers as f64 * CHARGER_WEIGHT).min(CHARGER_CAP)
        + (counts.carpool as f64 * CARPOOL_WEIGHT).min(CARPOOL_CAP);
    ((raw * 10.0).round() / 10.0).min(MAX_NOTE)
}

/// Scores `station` against the three amenity layers. Pure and infallible.
#[must_use]
pub fn analyze(
    station: &Station,
    bikes: &PointDataset,
    chargers: &PointDataset,
    carpool: &PointDataset,
) -> ScoreResult {
    let center = &station.location;
    let details = AmenityCounts {
        bikes: bikes.count_nearby(center, BIKE_RADIUS_KM),
        chargers: chargers.count_nearby(center, CHARGER_RADIUS_KM),
        carpool: carpool.count_nearby(center, CARPOOL_RADIUS_KM),
    };
    ScoreResult::from_counts(station.is_tgv(), details)
}

/// The three layers loaded for a session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AmenityDatasets {
    pub bikes: PointDataset,
    pub chargers: PointDataset,
    pub carpool: PointDataset,
}

impl AmenityDatasets {
    #[must_use]
    pub fn new(bikes: PointDataset, chargers: PointDataset, carpool: PointDataset) -> Self {
        Self {
            bikes,
            chargers,
            carpool,
        }
    }

    #[must_use]
    pub fn analyze(&self, station: &Station) -> ScoreResult {
        analyze(station, &self.bikes, &self.chargers, &self.carpool)
    }
}
