//! Loading stations and amenity layers from open-data endpoints.
//!
//! A failed source never aborts startup: it is logged, the local fallback
//! is tried when configured, and an empty collection is used otherwise.

use async_trait::async_trait;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::cache;
use crate::config::SourcesConfig;
use crate::dataset::{AmenityKind, FeatureCollection, PointDataset};
use crate::geo::GeoPoint;
use crate::scoring::AmenityDatasets;
use crate::station::{Station, StationRecord, stations_from_records};
use crate::Result;

const STATIONS_CACHE_KEY: &str = "stations";

#[async_trait]
pub trait OpenDataSource: Send + Sync {
    /// Short label used in logs.
    fn name(&self) -> &str;

    async fn stations(&self) -> Result<Vec<StationRecord>>;

    async fn layer(&self, kind: AmenityKind) -> Result<FeatureCollection>;
}

pub struct OpenDataClient {
    client: ClientWithMiddleware,
    config: SourcesConfig,
}

impl OpenDataClient {
    pub fn new(config: &SourcesConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.clone())
            .build()?;
        let retry_policy =
            ExponentialBackoff::builder().build_with_max_retries(config.max_retries);
        let client = ClientBuilder::new(client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    fn layer_url(&self, kind: AmenityKind) -> &str {
        match kind {
            AmenityKind::Bikes => &self.config.bikes_url,
            AmenityKind::Chargers => &self.config.chargers_url,
            AmenityKind::Carpool => &self.config.carpool_url,
        }
    }

    #[instrument(skip(self))]
    async fn fetch_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        debug!("Calling the API");
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl OpenDataSource for OpenDataClient {
    fn name(&self) -> &str {
        "open data"
    }

    async fn stations(&self) -> Result<Vec<StationRecord>> {
        self.fetch_json(&self.config.stations_url).await
    }

    async fn layer(&self, kind: AmenityKind) -> Result<FeatureCollection> {
        self.fetch_json(self.layer_url(kind)).await
    }
}

/// Local copies of the upstream payloads, one file per dataset.
pub struct LocalGeoJson {
    dir: PathBuf,
}

impl LocalGeoJson {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn file_name(kind: Option<AmenityKind>) -> &'static str {
        match kind {
            None => "gares.json",
            Some(AmenityKind::Bikes) => "velo.geojson",
            Some(AmenityKind::Chargers) => "irve.geojson",
            Some(AmenityKind::Carpool) => "covoiturage.geojson",
        }
    }

    async fn read<T: DeserializeOwned>(&self, path: &Path) -> Result<T> {
        let bytes = tokio::fs::read(path).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl OpenDataSource for LocalGeoJson {
    fn name(&self) -> &str {
        "local files"
    }

    async fn stations(&self) -> Result<Vec<StationRecord>> {
        self.read(&self.dir.join(Self::file_name(None))).await
    }

    async fn layer(&self, kind: AmenityKind) -> Result<FeatureCollection> {
        self.read(&self.dir.join(Self::file_name(Some(kind)))).await
    }
}

/// Everything one engine session is built from.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub stations: Vec<Station>,
    pub datasets: AmenityDatasets,
}

/// Loads stations and the three layers concurrently.
#[instrument(skip_all)]
pub async fn load_session(
    primary: &dyn OpenDataSource,
    fallback: Option<&dyn OpenDataSource>,
    ttl: Duration,
) -> Session {
    let (stations, bikes, chargers, carpool) = futures::join!(
        load_stations(primary, fallback, ttl),
        load_layer(primary, fallback, AmenityKind::Bikes, ttl),
        load_layer(primary, fallback, AmenityKind::Chargers, ttl),
        load_layer(primary, fallback, AmenityKind::Carpool, ttl),
    );
    info!(
        "Session loaded: {} stations, {} bikes, {} chargers, {} carpool areas",
        stations.len(),
        bikes.len(),
        chargers.len(),
        carpool.len()
    );
    Session {
        stations,
        datasets: AmenityDatasets::new(bikes, chargers, carpool),
    }
}

async fn cached<T: DeserializeOwned + Send + 'static>(key: &str) -> Option<T> {
    match cache::get::<T>(key).await {
        Ok(value) => value,
        Err(e) => {
            warn!("Cache read for '{}' failed: {:#}", key, e);
            None
        }
    }
}

async fn store<T: serde::Serialize + Send + 'static>(key: &str, value: T, ttl: Duration) {
    if let Err(e) = cache::put(key, value, cache::ttl_with_jitter(ttl)).await {
        warn!("Cache write for '{}' failed: {:#}", key, e);
    }
}

/// Primary, then fallback. `None` when neither produced a value.
async fn first_success<T, F>(
    what: &str,
    primary: &dyn OpenDataSource,
    fallback: Option<&dyn OpenDataSource>,
    fetch: F,
) -> Option<(T, bool)>
where
    F: for<'s> Fn(&'s dyn OpenDataSource) -> futures::future::BoxFuture<'s, Result<T>>,
{
    match fetch(primary).await {
        Ok(value) => return Some((value, true)),
        Err(e) => warn!("Loading {} from {} failed: {}", what, primary.name(), e),
    }
    let fallback = fallback?;
    match fetch(fallback).await {
        Ok(value) => {
            info!("Using {} from {}", what, fallback.name());
            Some((value, false))
        }
        Err(e) => {
            warn!("Loading {} from {} failed: {}", what, fallback.name(), e);
            None
        }
    }
}

async fn load_stations(
    primary: &dyn OpenDataSource,
    fallback: Option<&dyn OpenDataSource>,
    ttl: Duration,
) -> Vec<Station> {
    if let Some(stations) = cached::<Vec<Station>>(STATIONS_CACHE_KEY).await {
        debug!("Stations served from cache");
        return stations;
    }

    let Some((records, from_primary)) =
        first_success("stations", primary, fallback, |source| source.stations()).await
    else {
        return Vec::new();
    };

    let stations = stations_from_records(records);
    if from_primary && !stations.is_empty() {
        store(STATIONS_CACHE_KEY, stations.clone(), ttl).await;
    }
    stations
}

async fn load_layer(
    primary: &dyn OpenDataSource,
    fallback: Option<&dyn OpenDataSource>,
    kind: AmenityKind,
    ttl: Duration,
) -> PointDataset {
    let key = format!("layer:{}", kind.as_str());
    if let Some(points) = cached::<Vec<GeoPoint>>(&key).await {
        debug!("Layer {} served from cache", kind.as_str());
        return points.into();
    }

    let Some((collection, from_primary)) =
        first_success(kind.as_str(), primary, fallback, |source| source.layer(kind)).await
    else {
        return PointDataset::empty();
    };

    let dataset = PointDataset::from_feature_collection(collection);
    if from_primary && !dataset.is_empty() {
        store(&key, dataset.points().to_vec(), ttl).await;
    }
    dataset
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EcoGaresError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubSource {
        stations: Option<Vec<StationRecord>>,
        bikes: Option<FeatureCollection>,
        calls: AtomicUsize,
    }

    impl StubSource {
        fn failing() -> Self {
            Self {
                stations: None,
                bikes: None,
                calls: AtomicUsize::new(0),
            }
        }
    }

    fn records_json() -> &'static str {
        r#"[
            {"nom": "Grenoble", "position_geographique": {"lat": 45.1914, "lon": 5.7146}},
            {"nom": "Sans position"},
            {"nom": "Valence TGV", "position_geographique": {"lat": 44.9915, "lon": 4.9785}}
        ]"#
    }

    fn bikes_json() -> &'static str {
        r#"{"type": "FeatureCollection", "features": [
            {"type": "Feature", "geometry": {"type": "Point", "coordinates": [5.7150, 45.1918]}},
            {"type": "Feature", "geometry": {"type": "Point", "coordinates": [4.9790, 44.9920]}}
        ]}"#
    }

    #[async_trait]
    impl OpenDataSource for StubSource {
        fn name(&self) -> &str {
            "stub"
        }

        async fn stations(&self) -> Result<Vec<StationRecord>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.stations
                .clone()
                .ok_or_else(|| EcoGaresError::upstream("stations unavailable"))
        }

        async fn layer(&self, kind: AmenityKind) -> Result<FeatureCollection> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match kind {
                AmenityKind::Bikes => self
                    .bikes
                    .clone()
                    .ok_or_else(|| EcoGaresError::upstream("bikes unavailable")),
                _ => Err(EcoGaresError::upstream("layer unavailable")),
            }
        }
    }

    #[tokio::test]
    async fn test_load_session_from_primary() {
        let primary = StubSource {
            stations: Some(serde_json::from_str(records_json()).unwrap()),
            bikes: Some(serde_json::from_str(bikes_json()).unwrap()),
            calls: AtomicUsize::new(0),
        };
        let session = load_session(&primary, None, Duration::from_secs(60)).await;

        assert_eq!(session.stations.len(), 2);
        assert_eq!(session.stations[1].id.0, 2);
        assert_eq!(session.datasets.bikes.len(), 2);
        assert!(session.datasets.chargers.is_empty());
        assert!(session.datasets.carpool.is_empty());
        assert_eq!(primary.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_everything_down_gives_empty_session() {
        let primary = StubSource::failing();
        let fallback = StubSource::failing();
        let session = load_session(&primary, Some(&fallback), Duration::from_secs(60)).await;

        assert!(session.stations.is_empty());
        assert!(session.datasets.bikes.is_empty());
        assert_eq!(fallback.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_local_fallback_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("velo.geojson"), bikes_json()).unwrap();
        std::fs::write(dir.path().join("gares.json"), records_json()).unwrap();

        let local = LocalGeoJson::new(dir.path());
        let session =
            load_session(&StubSource::failing(), Some(&local), Duration::from_secs(60)).await;

        assert_eq!(session.stations.len(), 2);
        assert_eq!(session.datasets.bikes.len(), 2);
        assert!(session.datasets.carpool.is_empty());
    }

    #[test]
    fn test_client_builds_from_default_config() {
        assert!(OpenDataClient::new(&SourcesConfig::default()).is_ok());
    }
}
