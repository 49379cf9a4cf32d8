//! Session station registry: immutable stations plus per-station scores and
//! tags kept in a side map keyed by id.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use crate::geo::GeoPoint;
use crate::ranking::{RankerSettings, find_best_alternative};
use crate::scoring::{AmenityDatasets, ScoreResult};
use crate::station::{Station, StationId};
use crate::tags::{Tag, TagSet, compute_tags, compute_tags_with_counts};
use crate::{EcoGaresError, Result};

/// Chunk size of the progressive background pass.
pub const DEFAULT_CHUNK_SIZE: usize = 100;
/// Stations shown when browsing a category.
pub const DEFAULT_CATEGORY_LIMIT: usize = 9;

/// Derived data attached to a station by the precomputation passes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StationAnnotations {
    pub tags: TagSet,
    pub score: Option<ScoreResult>,
}

pub struct StationRegistry {
    stations: Vec<Station>,
    index: HashMap<StationId, usize>,
    datasets: AmenityDatasets,
    annotations: HashMap<StationId, StationAnnotations>,
    ranker: RankerSettings,
}

impl StationRegistry {
    #[must_use]
    pub fn new(stations: Vec<Station>, datasets: AmenityDatasets) -> Self {
        let index = stations
            .iter()
            .enumerate()
            .map(|(position, station)| (station.id, position))
            .collect();
        Self {
            stations,
            index,
            datasets,
            annotations: HashMap::new(),
            ranker: RankerSettings::default(),
        }
    }

    #[must_use]
    pub fn with_ranker(mut self, ranker: RankerSettings) -> Self {
        self.ranker = ranker;
        self
    }

    #[must_use]
    pub fn stations(&self) -> &[Station] {
        &self.stations
    }

    #[must_use]
    pub fn datasets(&self) -> &AmenityDatasets {
        &self.datasets
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.stations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: StationId) -> Option<&Station> {
        self.index.get(&id).map(|&position| &self.stations[position])
    }

    fn require(&self, id: StationId) -> Result<&Station> {
        self.get(id).ok_or(EcoGaresError::StationNotFound { id })
    }

    #[must_use]
    pub fn annotations(&self, id: StationId) -> Option<&StationAnnotations> {
        self.annotations.get(&id)
    }

    #[must_use]
    pub fn cached_score(&self, id: StationId) -> Option<ScoreResult> {
        self.annotations.get(&id).and_then(|a| a.score)
    }

    #[must_use]
    pub fn tags(&self, id: StationId) -> Option<&TagSet> {
        self.annotations.get(&id).map(|a| &a.tags)
    }

    /// Fresh analysis, never served from the cache.
    pub fn analyze(&self, id: StationId) -> Result<ScoreResult> {
        Ok(self.datasets.analyze(self.require(id)?))
    }

    /// Cached score when present, fresh analysis otherwise.
    fn score_or_analyze(&self, station: &Station) -> ScoreResult {
        self.cached_score(station.id)
            .unwrap_or_else(|| self.datasets.analyze(station))
    }

    /// Bulk pass run right after load: geographic tags, then scores.
    #[instrument(skip(self), fields(stations = self.stations.len()))]
    pub fn precompute_sync(&mut self) {
        for station in &self.stations {
            let entry = self.annotations.entry(station.id).or_default();
            entry.tags = compute_tags(station);
        }
        for station in &self.stations {
            let score = self.datasets.analyze(station);
            if let Some(entry) = self.annotations.get_mut(&station.id) {
                entry.score = Some(score);
            }
        }
        info!("Tagged and scored {} stations", self.stations.len());
    }

    /// Background pass unit: re-derives tags (including `Nature`) and the
    /// score of up to `len` stations starting at position `start`.
    /// Returns the number of stations processed.
    pub fn refresh_chunk(&mut self, start: usize, len: usize) -> usize {
        let end = start.saturating_add(len).min(self.stations.len());
        if start >= end {
            return 0;
        }
        for station in &self.stations[start..end] {
            let score = self.datasets.analyze(station);
            let tags = compute_tags_with_counts(station, &score.details);
            self.annotations.insert(
                station.id,
                StationAnnotations {
                    tags,
                    score: Some(score),
                },
            );
        }
        end - start
    }

    /// Closest station to `point` by great-circle distance. The first one
    /// found wins ties; `None` only for an empty registry.
    #[must_use]
    pub fn nearest(&self, point: &GeoPoint) -> Option<&Station> {
        let mut nearest: Option<(&Station, f64)> = None;
        for station in &self.stations {
            let distance = point.distance_km(&station.location);
            if nearest.is_none_or(|(_, best)| distance < best) {
                nearest = Some((station, distance));
            }
        }
        nearest.map(|(station, _)| station)
    }

    /// Best-scoring station around `id`, `None` when `id` is locally optimal.
    pub fn best_alternative(&self, id: StationId) -> Result<Option<&Station>> {
        let target = self.require(id)?;
        Ok(find_best_alternative(
            target,
            &self.stations,
            &self.datasets,
            &self.ranker,
            |candidate| self.cached_score(candidate),
        ))
    }

    /// Stations carrying `tag`, best note first, at most `limit`.
    #[must_use]
    pub fn top_in_category(&self, tag: Tag, limit: usize) -> Vec<(&Station, ScoreResult)> {
        let mut candidates: Vec<(&Station, ScoreResult)> = self
            .stations
            .iter()
            .filter(|s| self.tags(s.id).is_some_and(|tags| tags.contains(&tag)))
            .map(|s| (s, self.score_or_analyze(s)))
            .collect();
        candidates.sort_by(|a, b| b.1.note.total_cmp(&a.1.note));
        candidates.truncate(limit);
        candidates
    }

    /// Stations with a cached score, in registry order.
    pub fn scored(&self) -> impl Iterator<Item = (&Station, ScoreResult)> {
        self.stations
            .iter()
            .filter_map(|s| self.cached_score(s.id).map(|score| (s, score)))
    }
}

pub type SharedRegistry = Arc<RwLock<StationRegistry>>;

/// Progressive pass over the whole registry, one write-locked chunk at a
/// time, yielding to the runtime between chunks so readers get through.
#[instrument(skip(registry))]
pub async fn run_background(registry: SharedRegistry, chunk_size: usize) {
    let chunk_size = chunk_size.max(1);
    let mut start = 0;
    let mut chunks = 0;
    loop {
        let processed = registry.write().await.refresh_chunk(start, chunk_size);
        if processed == 0 {
            break;
        }
        start += processed;
        chunks += 1;
        debug!("Background pass reached station {}", start);
        tokio::task::yield_now().await;
    }
    info!(
        "Background pass finished: {} stations in {} chunks",
        start, chunks
    );
}
