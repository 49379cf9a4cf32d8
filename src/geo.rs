//! Geographic primitives: points, great-circle distance and bounding boxes.

use serde::{Deserialize, Serialize};

/// Kilometres per degree of latitude on the 6371 km sphere.
pub const KM_PER_DEGREE: f64 = 111.195;

/// Extra room added to radius-derived boxes so edge points are never cut.
const BOX_MARGIN: f64 = 1.1;

/// Reference point for the Paris-related tags.
pub const PARIS: GeoPoint = GeoPoint {
    lat: 48.8566,
    lon: 2.3522,
};

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    #[must_use]
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Great-circle distance to `other` in kilometres.
    #[must_use]
    pub fn distance_km(&self, other: &GeoPoint) -> f64 {
        distance_km(self.lat, self.lon, other.lat, other.lon)
    }

    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lon.is_finite()
    }
}

/// Haversine distance in kilometres on a sphere of radius 6371 km.
///
/// Inputs must be finite degrees; NaN or infinite coordinates are not guarded.
#[must_use]
pub fn distance_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    haversine::distance(
        haversine::Location {
            latitude: lat1,
            longitude: lon1,
        },
        haversine::Location {
            latitude: lat2,
            longitude: lon2,
        },
        haversine::Units::Kilometers,
    )
}

/// Axis-aligned latitude/longitude rectangle, bounds inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    /// Square window of `half_width_deg` degrees on both axes.
    #[must_use]
    pub fn around(center: &GeoPoint, half_width_deg: f64) -> Self {
        Self::with_half_widths(center, half_width_deg, half_width_deg)
    }

    /// Smallest box (plus a margin) guaranteed to hold every point within
    /// `radius_km` of `center`. Longitude degrees shrink with `cos(lat)`.
    #[must_use]
    pub fn covering(center: &GeoPoint, radius_km: f64) -> Self {
        let (lat_delta, lon_delta) = covering_half_widths(center, radius_km);
        Self::with_half_widths(center, lat_delta, lon_delta)
    }

    /// Fixed window of `half_width_deg`, widened where `radius_km` needs more.
    #[must_use]
    pub fn prefilter(center: &GeoPoint, half_width_deg: f64, radius_km: f64) -> Self {
        let (lat_delta, lon_delta) = covering_half_widths(center, radius_km);
        Self::with_half_widths(
            center,
            lat_delta.max(half_width_deg),
            lon_delta.max(half_width_deg),
        )
    }

    fn with_half_widths(center: &GeoPoint, lat_delta: f64, lon_delta: f64) -> Self {
        Self {
            min_lat: center.lat - lat_delta,
            max_lat: center.lat + lat_delta,
            min_lon: center.lon - lon_delta,
            max_lon: center.lon + lon_delta,
        }
    }

    #[must_use]
    pub fn contains(&self, point: &GeoPoint) -> bool {
        point.lat >= self.min_lat
            && point.lat <= self.max_lat
            && point.lon >= self.min_lon
            && point.lon <= self.max_lon
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.min_lat <= self.max_lat && self.min_lon <= self.max_lon
    }
}

fn covering_half_widths(center: &GeoPoint, radius_km: f64) -> (f64, f64) {
    let lat_delta = radius_km / KM_PER_DEGREE * BOX_MARGIN;
    let cos_lat = center.lat.to_radians().cos();
    let lon_delta = if cos_lat > 1e-6 {
        (lat_delta / cos_lat).min(180.0)
    } else {
        180.0
    };
    (lat_delta, lon_delta)
}
