//! Best nearby alternative to a station.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::geo::BoundingBox;
use crate::scoring::{AmenityDatasets, ScoreResult};
use crate::station::{Station, StationId};

pub const DEFAULT_SEARCH_RADIUS_KM: f64 = 10.0;
pub const DEFAULT_SEARCH_BOX_DEGREES: f64 = 0.15;

/// Candidate search area. The box only speeds the scan up: it is widened
/// to cover `radius_km` whenever the configured half-width is too small.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RankerSettings {
    pub radius_km: f64,
    pub box_half_width_deg: f64,
}

impl Default for RankerSettings {
    fn default() -> Self {
        Self {
            radius_km: DEFAULT_SEARCH_RADIUS_KM,
            box_half_width_deg: DEFAULT_SEARCH_BOX_DEGREES,
        }
    }
}

/// Station within the search radius scoring strictly better than `target`:
/// a higher note, or an equal note with more amenities in total. The first
/// candidate wins exact ties. `None` means `target` is the best around.
///
/// `cached` is consulted before falling back to a fresh analysis.
pub fn find_best_alternative<'a, F>(
    target: &Station,
    all_stations: &'a [Station],
    datasets: &AmenityDatasets,
    settings: &RankerSettings,
    cached: F,
) -> Option<&'a Station>
where
    F: Fn(StationId) -> Option<ScoreResult>,
{
    let score_of = |station: &Station| cached(station.id).unwrap_or_else(|| datasets.analyze(station));

    let target_score = score_of(target);
    let mut best: Option<&Station> = None;
    let mut best_note = target_score.note;
    let mut best_total = target_score.total;

    let bbox = BoundingBox::prefilter(
        &target.location,
        settings.box_half_width_deg,
        settings.radius_km,
    );

    for candidate in all_stations {
        if candidate.id == target.id || !bbox.contains(&candidate.location) {
            continue;
        }
        if target.location.distance_km(&candidate.location) > settings.radius_km {
            continue;
        }

        let score = score_of(candidate);
        if score.note > best_note || (score.note == best_note && score.total > best_total) {
            best_note = score.note;
            best_total = score.total;
            best = Some(candidate);
        }
    }

    debug!(
        "Best alternative to {} ({}): {:?}",
        target.id,
        target_score.note,
        best.map(|s| s.id)
    );
    best
}
