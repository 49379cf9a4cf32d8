use axum::{
    Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::get,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::{
    EcoGaresError,
    dataset::{MAX_POINTS_PER_QUERY, thin_out},
    geo::{BoundingBox, GeoPoint},
    registry::{SharedRegistry, StationRegistry},
    scoring::ScoreResult,
    station::{Station, StationCategory, StationId},
    stats::GlobalStats,
    tags::Tag,
};

#[derive(Clone)]
pub struct AppState {
    pub registry: SharedRegistry,
    pub category_limit: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiStation {
    pub id: StationId,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    pub category: StationCategory,
    pub tags: Vec<Tag>,
    /// Cached note, absent until the station has been scored
    pub note: Option<f64>,
}

impl ApiStation {
    fn from_registry(registry: &StationRegistry, station: &Station) -> Self {
        Self {
            id: station.id,
            name: station.name.clone(),
            lat: station.location.lat,
            lon: station.location.lon,
            category: station.category(),
            tags: registry
                .tags(station.id)
                .map(|tags| tags.iter().copied().collect())
                .unwrap_or_default(),
            note: registry.cached_score(station.id).map(|s| s.note),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiScoredStation {
    pub station: ApiStation,
    pub score: ScoreResult,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiAlternative {
    pub alternative: Option<ApiScoredStation>,
    pub locally_optimal: bool,
}

#[derive(Debug, Deserialize)]
pub struct BikesQuery {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

#[derive(Debug, Deserialize)]
pub struct NearestQuery {
    pub lat: f64,
    pub lon: f64,
}

fn status_for(err: &EcoGaresError) -> StatusCode {
    match err {
        EcoGaresError::StationNotFound { .. } => StatusCode::NOT_FOUND,
        EcoGaresError::Validation { .. } => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn reject(err: EcoGaresError) -> StatusCode {
    let status = status_for(&err);
    if status.is_server_error() {
        tracing::error!("Request failed: {}", err);
    } else {
        tracing::debug!("Request rejected: {}", err.user_message());
    }
    status
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/stations", get(list_stations))
        .route("/stations/nearest", get(get_nearest))
        .route("/stations/{id}", get(get_station))
        .route("/stations/{id}/alternative", get(get_alternative))
        .route("/categories/{tag}", get(get_category))
        .route("/stats", get(get_stats))
        .route("/bikes", get(get_bikes))
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    let registry = state.registry.read().await;
    Json(json!({
        "status": "ok",
        "version": crate::VERSION,
        "stations": registry.len(),
    }))
}

async fn list_stations(State(state): State<AppState>) -> Json<Vec<ApiStation>> {
    let registry = state.registry.read().await;
    let stations = registry
        .stations()
        .iter()
        .map(|s| ApiStation::from_registry(&registry, s))
        .collect();
    Json(stations)
}

async fn get_station(
    State(state): State<AppState>,
    Path(id): Path<u32>,
) -> Result<Json<ApiScoredStation>, StatusCode> {
    let registry = state.registry.read().await;
    let id = StationId(id);
    let score = registry.analyze(id).map_err(reject)?;
    let station = registry.get(id).ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(ApiScoredStation {
        station: ApiStation::from_registry(&registry, station),
        score,
    }))
}

async fn get_nearest(
    State(state): State<AppState>,
    Query(query): Query<NearestQuery>,
) -> Result<Json<ApiStation>, StatusCode> {
    if !query.lat.is_finite() || !query.lon.is_finite() {
        return Err(reject(EcoGaresError::validation(
            "lat and lon must be finite numbers",
        )));
    }
    let registry = state.registry.read().await;
    let station = registry
        .nearest(&GeoPoint::new(query.lat, query.lon))
        .ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(ApiStation::from_registry(&registry, station)))
}

async fn get_alternative(
    State(state): State<AppState>,
    Path(id): Path<u32>,
) -> Result<Json<ApiAlternative>, StatusCode> {
    let registry = state.registry.read().await;
    let best = registry.best_alternative(StationId(id)).map_err(reject)?;

    let alternative = best.map(|station| ApiScoredStation {
        station: ApiStation::from_registry(&registry, station),
        score: registry
            .cached_score(station.id)
            .unwrap_or_else(|| registry.datasets().analyze(station)),
    });
    Ok(Json(ApiAlternative {
        locally_optimal: alternative.is_none(),
        alternative,
    }))
}

async fn get_category(
    State(state): State<AppState>,
    Path(tag): Path<String>,
) -> Result<Json<Vec<ApiScoredStation>>, StatusCode> {
    let tag: Tag = tag.parse().map_err(reject)?;
    let registry = state.registry.read().await;
    let ranked = registry
        .top_in_category(tag, state.category_limit)
        .into_iter()
        .map(|(station, score)| ApiScoredStation {
            station: ApiStation::from_registry(&registry, station),
            score,
        })
        .collect();
    Ok(Json(ranked))
}

async fn get_stats(State(state): State<AppState>) -> Result<Json<GlobalStats>, StatusCode> {
    let registry = state.registry.read().await;
    GlobalStats::compute(&registry)
        .map(Json)
        .ok_or(StatusCode::SERVICE_UNAVAILABLE)
}

/// Bike parkings in a box as a GeoJSON feature collection, thinned to
/// [`MAX_POINTS_PER_QUERY`] points.
async fn get_bikes(
    State(state): State<AppState>,
    Query(query): Query<BikesQuery>,
) -> Result<Json<Value>, StatusCode> {
    let bbox = BoundingBox {
        min_lat: query.min_lat,
        max_lat: query.max_lat,
        min_lon: query.min_lon,
        max_lon: query.max_lon,
    };
    if !bbox.is_valid() {
        return Err(reject(EcoGaresError::validation(
            "bounding box must have min <= max on both axes",
        )));
    }

    let registry = state.registry.read().await;
    let inside: Vec<GeoPoint> = registry.datasets().bikes.within(&bbox).copied().collect();
    let features: Vec<Value> = thin_out(&inside, MAX_POINTS_PER_QUERY)
        .into_iter()
        .map(|p| {
            json!({
                "type": "Feature",
                "geometry": {"type": "Point", "coordinates": [p.lon, p.lat]},
                "properties": {},
            })
        })
        .collect();
    Ok(Json(json!({
        "type": "FeatureCollection",
        "features": features,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::PointDataset;
    use crate::scoring::AmenityDatasets;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use std::sync::Arc;
    use tokio::sync::RwLock;
    use tower::ServiceExt;

    fn app() -> Router {
        let stations = vec![
            Station::new(0, "Gare de Grenoble", 45.1914, 5.7146),
            Station::new(1, "Gare de Gières", 45.1850, 5.7890),
        ];
        let bikes: Vec<GeoPoint> = (1..=4)
            .map(|i| GeoPoint::new(45.1914 + 0.0005 * f64::from(i), 5.7146))
            .collect();
        let mut registry = StationRegistry::new(
            stations,
            AmenityDatasets::new(bikes.into(), PointDataset::empty(), PointDataset::empty()),
        );
        registry.precompute_sync();
        router(AppState {
            registry: Arc::new(RwLock::new(registry)),
            category_limit: 9,
        })
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn test_station_detail() {
        let (status, body) = get_json(app(), "/stations/0").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["station"]["name"], "Gare de Grenoble");
        assert_eq!(body["station"]["category"], "TER");
        assert_eq!(body["score"]["note"], 4.0);
        assert_eq!(body["score"]["details"]["bikes"], 4);
        assert_eq!(body["score"]["total"], 4);
    }

    #[tokio::test]
    async fn test_unknown_station_is_404() {
        let (status, _) = get_json(app(), "/stations/42").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = get_json(app(), "/stations/42/alternative").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_nearest_station() {
        let (status, body) = get_json(app(), "/stations/nearest?lat=45.186&lon=5.78").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], 1);
        assert_eq!(body["name"], "Gare de Gières");

        let (status, body) = get_json(app(), "/stations/nearest?lat=45.19&lon=5.71").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], 0);

        let (status, _) = get_json(app(), "/stations/nearest?lat=45.19").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_nearest_without_stations_is_404() {
        let empty = router(AppState {
            registry: Arc::new(RwLock::new(StationRegistry::new(
                Vec::new(),
                AmenityDatasets::default(),
            ))),
            category_limit: 9,
        });
        let (status, _) = get_json(empty, "/stations/nearest?lat=45.0&lon=5.0").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_alternative() {
        let (status, body) = get_json(app(), "/stations/1/alternative").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["locally_optimal"], false);
        assert_eq!(body["alternative"]["station"]["id"], 0);

        let (_, body) = get_json(app(), "/stations/0/alternative").await;
        assert_eq!(body["locally_optimal"], true);
        assert!(body["alternative"].is_null());
    }

    #[tokio::test]
    async fn test_category() {
        let (status, body) = get_json(app(), "/categories/Mountain").await;
        assert_eq!(status, StatusCode::OK);
        let ids: Vec<u64> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|entry| entry["station"]["id"].as_u64().unwrap())
            .collect();
        assert_eq!(ids, vec![0, 1]);

        let (status, _) = get_json(app(), "/categories/volcano").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_bikes_in_box() {
        let (status, body) = get_json(
            app(),
            "/bikes?min_lat=45.19&max_lat=45.1925&min_lon=5.7&max_lon=5.72",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["type"], "FeatureCollection");
        assert_eq!(body["features"].as_array().unwrap().len(), 2);
        assert_eq!(body["features"][0]["geometry"]["coordinates"][0], 5.7146);

        let (status, _) = get_json(
            app(),
            "/bikes?min_lat=46&max_lat=45&min_lon=5.7&max_lon=5.72",
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_stats_and_health() {
        let (status, body) = get_json(app(), "/stats").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["stations"], 2);
        assert_eq!(body["top_bike_station"]["id"], 0);

        let (status, body) = get_json(app(), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["stations"], 2);
    }
}
