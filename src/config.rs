//! Configuration loader - YAML settings + .env overrides

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Map surface defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    /// Initial viewport center, latitude degrees.
    pub center_lat: f64,
    /// Initial viewport center, longitude degrees.
    pub center_lon: f64,
    /// Initial zoom level.
    pub zoom: f64,
    /// Slippy tile URL template with {z}/{x}/{y} placeholders.
    pub tile_url: String,
    pub attribution: String,
    pub max_zoom: u8,
    /// Margin kept around fitted bounds, in pixels per side.
    pub fit_padding: f32,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            // Center of Côte d'Ivoire, zoomed to multi-kilometer parcels
            center_lat: 7.5,
            center_lon: -5.5,
            zoom: 10.0,
            tile_url: "https://tile.openstreetmap.org/{z}/{x}/{y}.png".to_string(),
            attribution: "© OpenStreetMap contributors".to_string(),
            max_zoom: 19,
            fit_padding: 30.0,
        }
    }
}

/// Main configuration loaded from viewer.yaml.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub map: MapConfig,
    /// Directory for downloaded tile images.
    pub tile_cache_dir: String,
}

impl ViewerConfig {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: ViewerConfig = serde_yaml::from_str(&content)?;
        if config.tile_cache_dir.is_empty() {
            config.tile_cache_dir = default_cache_dir();
        }
        Ok(config)
    }

    /// Apply .env overrides on top of the loaded values.
    pub fn apply_env(&mut self, env: &Env) {
        if let Some(url) = &env.tile_url {
            self.map.tile_url = url.clone();
        }
        if let Some(dir) = &env.tile_cache_dir {
            self.tile_cache_dir = dir.clone();
        }
        if self.tile_cache_dir.is_empty() {
            self.tile_cache_dir = default_cache_dir();
        }
    }
}

fn default_cache_dir() -> String {
    "data/tiles".to_string()
}

/// Overrides loaded from .env.
#[derive(Debug, Clone, Default)]
pub struct Env {
    pub tile_url: Option<String>,
    pub tile_cache_dir: Option<String>,
}

impl Env {
    /// Load overrides from the environment / .env file.
    pub fn load() -> Self {
        dotenvy::dotenv().ok();

        Env {
            tile_url: std::env::var("TILE_URL").ok(),
            tile_cache_dir: std::env::var("TILE_CACHE_DIR").ok(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ViewerConfig::default();
        assert_eq!(config.map.center_lat, 7.5);
        assert_eq!(config.map.center_lon, -5.5);
        assert_eq!(config.map.zoom, 10.0);
        assert_eq!(config.map.fit_padding, 30.0);
        assert!(config.map.tile_url.contains("{z}"));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = ViewerConfig::default();
        let env = Env {
            tile_url: Some("https://tiles.example/{z}/{x}/{y}.png".to_string()),
            tile_cache_dir: None,
        };
        config.apply_env(&env);
        assert_eq!(config.map.tile_url, "https://tiles.example/{z}/{x}/{y}.png");
        assert_eq!(config.tile_cache_dir, "data/tiles");
    }

    #[test]
    fn test_partial_yaml_falls_back_to_defaults() {
        let config: ViewerConfig = serde_yaml::from_str("map:\n  zoom: 12\n").unwrap();
        assert_eq!(config.map.zoom, 12.0);
        assert_eq!(config.map.center_lat, 7.5);
    }
}
