//! Flat amenity point datasets and the proximity counting built on them.
//!
//! Upstream layers arrive as GeoJSON feature collections whose coordinates
//! are ordered `[lon, lat]`; they are swapped into [`GeoPoint`] here and never
//! deduplicated, so overlapping sources count twice.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::geo::{BoundingBox, GeoPoint};

/// Half-width in degrees of the pre-filter window used for amenity counts.
/// Holds every point up to ~3.5 km east-west at French latitudes; larger
/// radii widen the window through [`BoundingBox::prefilter`].
pub const AMENITY_BOX_DEGREES: f64 = 0.05;

/// Upper bound on points returned by a box query.
pub const MAX_POINTS_PER_QUERY: usize = 5000;

/// The three amenity layers a station is scored on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AmenityKind {
    Bikes,
    Chargers,
    Carpool,
}

impl AmenityKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            AmenityKind::Bikes => "bikes",
            AmenityKind::Chargers => "chargers",
            AmenityKind::Carpool => "carpool",
        }
    }
}

/// Minimal GeoJSON feature collection, enough to pull point coordinates.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeatureCollection {
    #[serde(default)]
    pub features: Vec<Feature>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Feature {
    #[serde(default)]
    pub geometry: Option<Geometry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Geometry {
    #[serde(default)]
    pub coordinates: Value,
}

impl Geometry {
    /// `[lon, lat, ...]` as a point; anything else is rejected.
    fn point(&self) -> Option<GeoPoint> {
        let coords = self.coordinates.as_array()?;
        let lon = coords.first()?.as_f64()?;
        let lat = coords.get(1)?.as_f64()?;
        let point = GeoPoint::new(lat, lon);
        point.is_finite().then_some(point)
    }
}

/// Unordered, read-only list of amenity locations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PointDataset {
    points: Vec<GeoPoint>,
}

impl PointDataset {
    #[must_use]
    pub fn new(points: Vec<GeoPoint>) -> Self {
        Self { points }
    }

    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Adapter from an upstream feature collection. Features without a point
    /// geometry are skipped.
    #[must_use]
    pub fn from_feature_collection(collection: FeatureCollection) -> Self {
        let total = collection.features.len();
        let points: Vec<GeoPoint> = collection
            .features
            .iter()
            .filter_map(|f| f.geometry.as_ref()?.point())
            .collect();
        if points.len() < total {
            debug!(
                "Skipped {} features without point geometry",
                total - points.len()
            );
        }
        Self { points }
    }

    #[must_use]
    pub fn points(&self) -> &[GeoPoint] {
        &self.points
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Number of points within `radius_km` of `center`.
    ///
    /// Box pre-filter first, exact haversine second. The box is the fixed
    /// [`AMENITY_BOX_DEGREES`] window unless the radius needs a wider one.
    #[must_use]
    pub fn count_nearby(&self, center: &GeoPoint, radius_km: f64) -> usize {
        count_nearby(&self.points, center, radius_km)
    }

    /// Points inside `bbox`, in dataset order.
    pub fn within<'a>(&'a self, bbox: &'a BoundingBox) -> impl Iterator<Item = &'a GeoPoint> + 'a {
        self.points.iter().filter(move |p| bbox.contains(p))
    }
}

impl From<Vec<GeoPoint>> for PointDataset {
    fn from(points: Vec<GeoPoint>) -> Self {
        Self::new(points)
    }
}

/// Two-stage proximity count over a plain slice.
#[must_use]
pub fn count_nearby(points: &[GeoPoint], center: &GeoPoint, radius_km: f64) -> usize {
    let bbox = BoundingBox::prefilter(center, AMENITY_BOX_DEGREES, radius_km);
    points
        .iter()
        .filter(|p| bbox.contains(p) && center.distance_km(p) <= radius_km)
        .count()
}

/// Keeps every `ceil(len / max)`-th item when `items` holds more than `max`.
#[must_use]
pub fn thin_out<T: Clone>(items: &[T], max: usize) -> Vec<T> {
    if max == 0 || items.len() <= max {
        return items.to_vec();
    }
    let step = items.len().div_ceil(max);
    items.iter().step_by(step).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{RngExt, SeedableRng, rngs::StdRng};
    use rstest::rstest;

    fn naive_count(points: &[GeoPoint], center: &GeoPoint, radius_km: f64) -> usize {
        points
            .iter()
            .filter(|p| center.distance_km(p) <= radius_km)
            .count()
    }

    #[test]
    fn test_feature_collection_swaps_coordinates() {
        let json = r#"{
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "geometry": {"type": "Point", "coordinates": [2.3522, 48.8566]}},
                {"type": "Feature", "geometry": null},
                {"type": "Feature"},
                {"type": "Feature", "geometry": {"type": "Point", "coordinates": ["x", 1]}},
                {"type": "Feature", "geometry": {"type": "Point", "coordinates": [5.0, 45.0, 210.0]}}
            ]
        }"#;
        let collection: FeatureCollection = serde_json::from_str(json).unwrap();
        let dataset = PointDataset::from_feature_collection(collection);

        assert_eq!(
            dataset.points(),
            &[GeoPoint::new(48.8566, 2.3522), GeoPoint::new(45.0, 5.0)]
        );
    }

    #[test]
    fn test_missing_features_is_empty() {
        let collection: FeatureCollection = serde_json::from_str("{}").unwrap();
        assert!(PointDataset::from_feature_collection(collection).is_empty());
    }

    #[test]
    fn test_count_nearby_on_empty_dataset() {
        let dataset = PointDataset::empty();
        assert_eq!(dataset.count_nearby(&GeoPoint::new(45.0, 5.0), 3.0), 0);
    }

    #[test]
    fn test_duplicates_count_twice() {
        let p = GeoPoint::new(45.001, 5.0);
        let dataset = PointDataset::new(vec![p, p]);
        assert_eq!(dataset.count_nearby(&GeoPoint::new(45.0, 5.0), 0.8), 2);
    }

    #[test]
    fn test_radius_boundary() {
        let center = GeoPoint::new(45.0, 5.0);
        let inside = GeoPoint::new(45.007, 5.0); // ~778 m
        let outside = GeoPoint::new(45.0075, 5.0); // ~834 m
        let dataset = PointDataset::new(vec![inside, outside]);
        assert_eq!(dataset.count_nearby(&center, 0.8), 1);
    }

    #[rstest]
    #[case(0.8)]
    #[case(3.0)]
    #[case(5.5)]
    fn test_two_stage_matches_naive_scan(#[case] radius_km: f64) {
        let mut rng = StdRng::seed_from_u64(0x6a7e);
        for _ in 0..20 {
            let center = GeoPoint::new(
                rng.random_range(42.5..51.0),
                rng.random_range(-4.5..7.5),
            );
            let points: Vec<GeoPoint> = (0..400)
                .map(|_| {
                    GeoPoint::new(
                        center.lat + rng.random_range(-0.12..0.12),
                        center.lon + rng.random_range(-0.12..0.12),
                    )
                })
                .collect();
            assert_eq!(
                count_nearby(&points, &center, radius_km),
                naive_count(&points, &center, radius_km)
            );
        }
    }

    #[test]
    fn test_within_box() {
        let dataset = PointDataset::new(vec![
            GeoPoint::new(45.0, 5.0),
            GeoPoint::new(46.0, 5.0),
            GeoPoint::new(45.5, 5.5),
        ]);
        let bbox = BoundingBox {
            min_lat: 44.9,
            max_lat: 45.6,
            min_lon: 4.9,
            max_lon: 5.6,
        };
        let inside: Vec<&GeoPoint> = dataset.within(&bbox).collect();
        assert_eq!(inside.len(), 2);
    }

    #[test]
    fn test_thin_out() {
        let items: Vec<u32> = (0..12).collect();
        assert_eq!(thin_out(&items, 5), vec![0, 3, 6, 9]);
        assert_eq!(thin_out(&items, 12), items);
        assert_eq!(thin_out(&items, 0), items);
    }
}
