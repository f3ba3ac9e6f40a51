use serde::Deserialize;
use std::collections::HashSet;
use std::path::PathBuf;
use thiserror::Error;

use crate::predict::{CoordinatorConfig, GeoPos, TICK_INTERVAL};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Invalid station position: {0}")]
    Station(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub station: StationConfig,
    #[serde(default)]
    pub web: WebConfig,
    #[serde(default)]
    pub predict: PredictConfig,
    #[serde(default)]
    pub api_keys: Vec<ApiKey>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct PredictConfig {
    #[serde(default = "default_tle_folder")]
    pub tle_folder: PathBuf,
    #[serde(default = "default_hours_ahead")]
    pub hours_ahead: u32,
    #[serde(default = "default_min_elevation")]
    pub min_elevation: f64,
    /// NORAD ids selected at startup
    #[serde(default)]
    pub selection: Vec<u32>,
}

impl Default for PredictConfig {
    fn default() -> Self {
        Self {
            tle_folder: default_tle_folder(),
            hours_ahead: default_hours_ahead(),
            min_elevation: default_min_elevation(),
            selection: Vec::new(),
        }
    }
}

fn default_tle_folder() -> PathBuf {
    PathBuf::from("tles")
}

fn default_hours_ahead() -> u32 {
    8
}

fn default_min_elevation() -> f64 {
    16.0
}

impl PredictConfig {
    pub fn coordinator_config(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            hours_ahead: self.hours_ahead,
            min_elevation_deg: self.min_elevation,
            tick_interval: TICK_INTERVAL,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiKey {
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub permissions: HashSet<Permission>,
}

/// Either `coordinates: "lat, lon"` or a Maidenhead `qth` locator.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StationConfig {
    pub name: Option<String>,
    pub coordinates: Option<String>,
    pub qth: Option<String>,
    #[serde(default)]
    pub altitude_m: f64,
}

impl StationConfig {
    /// `Ok(None)` when no position is configured.
    pub fn position(&self) -> Result<Option<GeoPos>, ConfigError> {
        match (&self.coordinates, &self.qth) {
            (Some(coordinates), _) => GeoPos::from_coordinates(coordinates, Some(self.altitude_m))
                .map(Some)
                .ok_or_else(|| ConfigError::Station(format!("bad coordinates {:?}", coordinates))),
            (None, Some(qth)) => GeoPos::from_qth(qth, Some(self.altitude_m))
                .map(Some)
                .ok_or_else(|| ConfigError::Station(format!("bad QTH locator {:?}", qth))),
            (None, None) => Ok(None),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    TriggerSearch,
    UpdateStation,
    UpdateSelection,
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(content)?;
        config.station.position()?;
        Ok(config)
    }

    pub fn find_api_key(&self, key: &str) -> Option<&ApiKey> {
        self.api_keys.iter().find(|k| k.key == key)
    }
}
