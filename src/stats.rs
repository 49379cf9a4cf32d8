//! Network-wide summary over every scored station.

use serde::Serialize;

use crate::registry::StationRegistry;
use crate::station::StationId;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopBikeStation {
    pub id: StationId,
    pub name: String,
    pub bikes: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetTotals {
    pub bikes: usize,
    pub chargers: usize,
    pub carpool: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GlobalStats {
    pub stations: usize,
    pub mean_note: f64,
    /// Share of TGV stations, whole percent.
    pub tgv_share_percent: f64,
    pub mean_bikes: f64,
    pub mean_chargers: f64,
    pub mean_carpool: f64,
    pub dataset_points: DatasetTotals,
    pub stations_with_bikes: usize,
    pub stations_without_bikes: usize,
    /// Station with the most bike parkings, `None` when no station has any
    pub top_bike_station: Option<TopBikeStation>,
}

fn one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

impl GlobalStats {
    /// `None` until at least one station has been scored.
    #[must_use]
    pub fn compute(registry: &StationRegistry) -> Option<Self> {
        let mut stations = 0usize;
        let mut tgv = 0usize;
        let mut note_sum = 0.0;
        let (mut bikes, mut chargers, mut carpool) = (0usize, 0usize, 0usize);
        let mut with_bikes = 0usize;
        let mut top: Option<TopBikeStation> = None;

        for (station, score) in registry.scored() {
            stations += 1;
            note_sum += score.note;
            if station.is_tgv() {
                tgv += 1;
            }
            bikes += score.details.bikes;
            chargers += score.details.chargers;
            carpool += score.details.carpool;
            if score.details.bikes == 0 {
                continue;
            }
            with_bikes += 1;
            if top.as_ref().is_none_or(|t| score.details.bikes > t.bikes) {
                top = Some(TopBikeStation {
                    id: station.id,
                    name: station.name.clone(),
                    bikes: score.details.bikes,
                });
            }
        }

        if stations == 0 {
            return None;
        }
        let n = stations as f64;
        let datasets = registry.datasets();

        Some(Self {
            stations,
            mean_note: one_decimal(note_sum / n),
            tgv_share_percent: (tgv as f64 * 100.0 / n).round(),
            mean_bikes: one_decimal(bikes as f64 / n),
            mean_chargers: one_decimal(chargers as f64 / n),
            mean_carpool: one_decimal(carpool as f64 / n),
            dataset_points: DatasetTotals {
                bikes: datasets.bikes.len(),
                chargers: datasets.chargers.len(),
                carpool: datasets.carpool.len(),
            },
            stations_with_bikes: with_bikes,
            stations_without_bikes: stations - with_bikes,
            top_bike_station: top,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::PointDataset;
    use crate::geo::GeoPoint;
    use crate::scoring::AmenityDatasets;
    use crate::station::Station;

    fn registry() -> StationRegistry {
        let stations = vec![
            Station::new(0, "Valence TGV", 44.9915, 4.9785),
            Station::new(1, "Gare de Die", 44.7536, 5.3704),
            Station::new(2, "Gare de Crest", 44.7286, 5.0229),
            Station::new(3, "Gare de Livron", 44.7720, 4.8414),
        ];
        let bikes = vec![
            GeoPoint::new(44.9920, 4.9785),
            GeoPoint::new(44.9925, 4.9785),
            GeoPoint::new(44.7290, 5.0229),
            GeoPoint::new(44.7295, 5.0229),
            GeoPoint::new(44.7300, 5.0229),
        ];
        let chargers = vec![GeoPoint::new(44.7540, 5.3704)];
        StationRegistry::new(
            stations,
            AmenityDatasets::new(bikes.into(), chargers.into(), PointDataset::empty()),
        )
    }

    #[test]
    fn test_no_stats_before_scoring() {
        assert!(GlobalStats::compute(&registry()).is_none());
        let empty = StationRegistry::new(Vec::new(), AmenityDatasets::default());
        assert!(GlobalStats::compute(&empty).is_none());
    }

    #[test]
    fn test_compute() {
        let mut registry = registry();
        registry.precompute_sync();
        let stats = GlobalStats::compute(&registry).unwrap();

        assert_eq!(stats.stations, 4);
        // notes: 3.0, 0.5, 3.0, 0.0
        assert_eq!(stats.mean_note, 1.6);
        assert_eq!(stats.tgv_share_percent, 25.0);
        assert_eq!(stats.mean_bikes, 1.3);
        assert_eq!(stats.mean_chargers, 0.3);
        assert_eq!(stats.mean_carpool, 0.0);
        assert_eq!(
            stats.dataset_points,
            DatasetTotals {
                bikes: 5,
                chargers: 1,
                carpool: 0
            }
        );
        assert_eq!(stats.stations_with_bikes, 2);
        assert_eq!(stats.stations_without_bikes, 2);
        assert_eq!(stats.top_bike_station.unwrap().id, StationId(2));
    }

    #[test]
    fn test_top_bike_station_first_found_on_ties() {
        let stations = vec![
            Station::new(0, "Gare de A", 45.0, 5.0),
            Station::new(1, "Gare de B", 46.0, 5.0),
        ];
        let bikes = vec![GeoPoint::new(45.001, 5.0), GeoPoint::new(46.001, 5.0)];
        let mut registry = StationRegistry::new(
            stations,
            AmenityDatasets::new(bikes.into(), PointDataset::empty(), PointDataset::empty()),
        );
        registry.precompute_sync();
        let top = GlobalStats::compute(&registry)
            .unwrap()
            .top_bike_station
            .unwrap();
        assert_eq!(top.name, "Gare de A");
    }

    #[test]
    fn test_no_top_bike_station_without_bikes() {
        let stations = vec![
            Station::new(0, "Gare de A", 45.0, 5.0),
            Station::new(1, "Gare de B", 46.0, 5.0),
        ];
        let mut registry = StationRegistry::new(stations, AmenityDatasets::default());
        registry.precompute_sync();

        let stats = GlobalStats::compute(&registry).unwrap();
        assert_eq!(stats.stations, 2);
        assert_eq!(stats.stations_with_bikes, 0);
        assert_eq!(stats.stations_without_bikes, 2);
        assert!(stats.top_bike_station.is_none());
    }
}
