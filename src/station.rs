//! Train stations and their decoding from the SNCF passenger station export.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

use crate::geo::GeoPoint;

/// Name used when the upstream record carries none.
pub const UNKNOWN_STATION_NAME: &str = "Gare Inconnue";

/// Session-local station identifier: the record's position in the upstream list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StationId(pub u32);

impl fmt::Display for StationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// High-speed or regional service, inferred from the station name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StationCategory {
    #[serde(rename = "TGV")]
    Tgv,
    #[serde(rename = "TER")]
    Ter,
}

impl StationCategory {
    /// Best-effort classification: any name containing "TGV" is high-speed.
    /// Station data carries no authoritative service type.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        if name.contains("TGV") {
            StationCategory::Tgv
        } else {
            StationCategory::Ter
        }
    }
}

/// A station with valid coordinates. Scores and tags live in the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    pub id: StationId,
    pub name: String,
    pub location: GeoPoint,
}

impl Station {
    #[must_use]
    pub fn new(id: u32, name: impl Into<String>, lat: f64, lon: f64) -> Self {
        Self {
            id: StationId(id),
            name: name.into(),
            location: GeoPoint::new(lat, lon),
        }
    }

    #[must_use]
    pub fn category(&self) -> StationCategory {
        StationCategory::from_name(&self.name)
    }

    #[must_use]
    pub fn is_tgv(&self) -> bool {
        self.category() == StationCategory::Tgv
    }

    /// Name without a leading "Gare de " / "Gare d'" prefix.
    #[must_use]
    pub fn short_name(&self) -> &str {
        strip_station_prefix(&self.name)
    }
}

/// Removes a leading "Gare de " or "Gare d'" (any case) from a station name.
#[must_use]
pub fn strip_station_prefix(name: &str) -> &str {
    let trimmed = name.trim_start();
    for prefix in ["gare de ", "gare d'", "gare d’"] {
        if let Some(head) = trimmed.get(..prefix.len()) {
            if head.eq_ignore_ascii_case(prefix) {
                return trimmed[prefix.len()..].trim();
            }
        }
    }
    trimmed.trim()
}

/// One record of the SNCF "gares-de-voyageurs" JSON export.
#[derive(Debug, Clone, Deserialize)]
pub struct StationRecord {
    #[serde(default)]
    pub nom: Option<String>,
    #[serde(default)]
    pub position_geographique: Option<RecordPosition>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecordPosition {
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
}

impl StationRecord {
    fn location(&self) -> Option<GeoPoint> {
        let position = self.position_geographique.as_ref()?;
        let point = GeoPoint::new(position.lat?, position.lon?);
        point.is_finite().then_some(point)
    }
}

/// Turns raw records into stations. Ids are assigned from the source position
/// before filtering, so dropped records leave gaps.
#[must_use]
pub fn stations_from_records(records: Vec<StationRecord>) -> Vec<Station> {
    let total = records.len();
    let stations: Vec<Station> = records
        .into_iter()
        .enumerate()
        .filter_map(|(index, record)| {
            let Some(location) = record.location() else {
                debug!("Dropping station record {} without coordinates", index);
                return None;
            };
            let id = u32::try_from(index).ok()?;
            let name = record
                .nom
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| UNKNOWN_STATION_NAME.to_string());
            Some(Station {
                id: StationId(id),
                name,
                location,
            })
        })
        .collect();

    info!(
        "Decoded {} stations ({} records without coordinates)",
        stations.len(),
        total - stations.len()
    );
    stations
}
