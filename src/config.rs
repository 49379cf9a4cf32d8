//! Configuration for the `EcoGares` server.
//!
//! Values come from an optional TOML file, then `ECOGARES__SECTION__KEY`
//! environment variables, then the defaults below.

use crate::EcoGaresError;
use crate::ranking::RankerSettings;
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EcoGaresConfig {
    pub server: ServerConfig,
    pub sources: SourcesConfig,
    pub cache: CacheConfig,
    pub scoring: ScoringConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Per-request timeout in seconds
    pub request_timeout_seconds: u64,
}

/// Upstream open-data endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub stations_url: String,
    pub bikes_url: String,
    pub chargers_url: String,
    pub carpool_url: String,
    pub timeout_seconds: u64,
    pub max_retries: u32,
    /// Directory holding local copies used when an upstream is down
    pub fallback_dir: Option<String>,
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub ttl_minutes: u64,
    pub location: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub alternative_radius_km: f64,
    pub alternative_box_degrees: f64,
    pub precompute_chunk_size: usize,
    pub category_limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// error, warn, info, debug or trace; `RUST_LOG` wins when set
    pub level: String,
    /// pretty or compact
    pub format: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_request_timeout() -> u64 {
    30
}

fn default_stations_url() -> String {
    "https://ressources.data.sncf.com/api/explore/v2.1/catalog/datasets/gares-de-voyageurs/exports/json".to_string()
}

fn default_bikes_url() -> String {
    "https://public.opendatasoft.com/api/explore/v2.1/catalog/datasets/osm-france-bicycle-parking/exports/geojson?limit=-1".to_string()
}

fn default_chargers_url() -> String {
    "https://public.opendatasoft.com/api/explore/v2.1/catalog/datasets/osm-france-charging-station/exports/geojson?limit=15000".to_string()
}

fn default_carpool_url() -> String {
    "https://public.opendatasoft.com/api/explore/v2.1/catalog/datasets/aires-covoiturage/exports/geojson?limit=5000".to_string()
}

fn default_source_timeout() -> u64 {
    60
}

fn default_max_retries() -> u32 {
    3
}

fn default_user_agent() -> String {
    format!("EcoGares/{}", crate::VERSION)
}

fn default_cache_ttl() -> u64 {
    60
}

fn default_cache_location() -> String {
    dirs::cache_dir()
        .map(|dir| dir.join("ecogares").to_string_lossy().into_owned())
        .unwrap_or_else(|| ".cache/ecogares".to_string())
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            stations_url: default_stations_url(),
            bikes_url: default_bikes_url(),
            chargers_url: default_chargers_url(),
            carpool_url: default_carpool_url(),
            timeout_seconds: default_source_timeout(),
            max_retries: default_max_retries(),
            fallback_dir: None,
            user_agent: default_user_agent(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_minutes: default_cache_ttl(),
            location: default_cache_location(),
        }
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        let ranker = RankerSettings::default();
        Self {
            alternative_radius_km: ranker.radius_km,
            alternative_box_degrees: ranker.box_half_width_deg,
            precompute_chunk_size: crate::registry::DEFAULT_CHUNK_SIZE,
            category_limit: crate::registry::DEFAULT_CATEGORY_LIMIT,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl SourcesConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl CacheConfig {
    #[must_use]
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_minutes * 60)
    }
}

impl EcoGaresConfig {
    pub fn load() -> Result<Self> {
        Self::load_from_path(None)
    }

    pub fn load_from_path(config_path: Option<PathBuf>) -> Result<Self> {
        let mut builder = Config::builder();

        let config_file = config_path.or_else(Self::get_config_path);
        if let Some(config_file) = config_file.filter(|path| path.exists()) {
            builder = builder.add_source(
                File::from(config_file)
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        builder = builder.add_source(
            Environment::with_prefix("ECOGARES")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .with_context(|| "Failed to build configuration")?;

        let mut config: EcoGaresConfig = settings
            .try_deserialize()
            .with_context(|| "Failed to deserialize configuration")?;

        config.apply_defaults();
        config.validate()?;

        Ok(config)
    }

    #[must_use]
    pub fn get_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("ecogares").join("config.toml"))
    }

    /// Replaces empty or zero values with their defaults.
    pub fn apply_defaults(&mut self) {
        if self.server.host.is_empty() {
            self.server.host = default_host();
        }
        if self.server.request_timeout_seconds == 0 {
            self.server.request_timeout_seconds = default_request_timeout();
        }
        if self.sources.stations_url.is_empty() {
            self.sources.stations_url = default_stations_url();
        }
        if self.sources.bikes_url.is_empty() {
            self.sources.bikes_url = default_bikes_url();
        }
        if self.sources.chargers_url.is_empty() {
            self.sources.chargers_url = default_chargers_url();
        }
        if self.sources.carpool_url.is_empty() {
            self.sources.carpool_url = default_carpool_url();
        }
        if self.sources.timeout_seconds == 0 {
            self.sources.timeout_seconds = default_source_timeout();
        }
        if self.sources.user_agent.is_empty() {
            self.sources.user_agent = default_user_agent();
        }
        if self.cache.ttl_minutes == 0 {
            self.cache.ttl_minutes = default_cache_ttl();
        }
        if self.cache.location.is_empty() {
            self.cache.location = default_cache_location();
        }
        let scoring = ScoringConfig::default();
        if self.scoring.precompute_chunk_size == 0 {
            self.scoring.precompute_chunk_size = scoring.precompute_chunk_size;
        }
        if self.scoring.category_limit == 0 {
            self.scoring.category_limit = scoring.category_limit;
        }
        if self.logging.level.is_empty() {
            self.logging.level = default_log_level();
        }
        if self.logging.format.is_empty() {
            self.logging.format = default_log_format();
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.validate_numeric_ranges()?;
        self.validate_string_values()?;
        Ok(())
    }

    fn validate_numeric_ranges(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(EcoGaresError::config("Server port cannot be 0").into());
        }

        if self.sources.timeout_seconds > 600 {
            return Err(
                EcoGaresError::config("Source timeout cannot exceed 600 seconds").into(),
            );
        }

        if self.sources.max_retries > 10 {
            return Err(EcoGaresError::config("Source max retries cannot exceed 10").into());
        }

        if self.cache.ttl_minutes > 7 * 24 * 60 {
            return Err(EcoGaresError::config("Cache TTL cannot exceed one week").into());
        }

        let radius = self.scoring.alternative_radius_km;
        if !(radius.is_finite() && radius > 0.0 && radius <= 100.0) {
            return Err(EcoGaresError::config(
                "Alternative radius must be within (0, 100] km",
            )
            .into());
        }

        let half_width = self.scoring.alternative_box_degrees;
        if !(half_width.is_finite() && half_width > 0.0 && half_width <= 2.0) {
            return Err(EcoGaresError::config(
                "Alternative box half-width must be within (0, 2] degrees",
            )
            .into());
        }

        if self.scoring.category_limit > 100 {
            return Err(EcoGaresError::config("Category limit cannot exceed 100").into());
        }

        Ok(())
    }

    fn validate_string_values(&self) -> Result<()> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.logging.level.as_str()) {
            return Err(EcoGaresError::config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            ))
            .into());
        }

        let valid_log_formats = ["pretty", "compact"];
        if !valid_log_formats.contains(&self.logging.format.as_str()) {
            return Err(EcoGaresError::config(format!(
                "Invalid log format '{}'. Must be one of: {}",
                self.logging.format,
                valid_log_formats.join(", ")
            ))
            .into());
        }

        let urls = [
            &self.sources.stations_url,
            &self.sources.bikes_url,
            &self.sources.chargers_url,
            &self.sources.carpool_url,
        ];
        if let Some(bad) = urls
            .iter()
            .find(|url| !url.starts_with("http://") && !url.starts_with("https://"))
        {
            return Err(EcoGaresError::config(format!(
                "Source URL '{bad}' must be an HTTP or HTTPS URL"
            ))
            .into());
        }

        Ok(())
    }

    #[must_use]
    pub fn ranker_settings(&self) -> RankerSettings {
        RankerSettings {
            radius_km: self.scoring.alternative_radius_km,
            box_half_width_deg: self.scoring.alternative_box_degrees,
        }
    }
}
