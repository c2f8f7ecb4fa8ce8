use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::error::StageError;

/// Everything the three stages need, stored as TOML.
///
/// Defaults reproduce the original single-household deployment; a config
/// file only needs the keys it wants to override.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Target location.
    pub latitude: f64,
    pub longitude: f64,

    /// Forward time window bounding the chart's x-axis.
    pub forecast_hours: i64,

    pub forecast_api_url: String,
    pub satellite_url: String,

    /// Stage outputs, each fully overwritten per run.
    pub satellite_path: PathBuf,
    pub chart_path: PathBuf,
    pub composite_path: PathBuf,

    /// Final composite dimensions.
    pub canvas_width: u32,
    pub canvas_height: u32,

    /// Rendered chart dimensions.
    pub chart_width: u32,
    pub chart_height: u32,

    /// Chart placement margin from the canvas edges.
    pub margin_px: u32,
    /// Backdrop rectangle inset around the chart region.
    pub backdrop_border_px: u32,
    pub backdrop_rgba: [u8; 4],

    /// Column width for wrapping the narrative text panel.
    pub wrap_columns: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            latitude: 42.34013,
            longitude: -71.12031,
            forecast_hours: 36,
            forecast_api_url: "https://api.weather.gov".to_string(),
            satellite_url: "https://cdn.star.nesdis.noaa.gov/GOES16/ABI/CONUS/GEOCOLOR/latest.jpg"
                .to_string(),
            satellite_path: PathBuf::from("latest_weather_image.jpg"),
            chart_path: PathBuf::from("current_forecast.png"),
            composite_path: PathBuf::from("composite.jpg"),
            canvas_width: 3840,
            canvas_height: 2160,
            chart_width: 720,
            chart_height: 1296,
            margin_px: 64,
            backdrop_border_px: 10,
            backdrop_rgba: [100, 100, 100, 100],
            wrap_columns: 45,
        }
    }
}

impl Config {
    /// Load config from `path`, or from the platform config directory when
    /// `path` is `None`. A missing file yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, StageError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_file_path()?,
        };

        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)?;
        toml::from_str(&contents)
            .map_err(|e| StageError::Config(format!("failed to parse {}: {e}", path.display())))
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self, path: Option<&Path>) -> Result<PathBuf, StageError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_file_path()?,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let toml = toml::to_string_pretty(self)
            .map_err(|e| StageError::Config(format!("failed to serialize configuration: {e}")))?;
        fs::write(&path, toml)?;

        Ok(path)
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf, StageError> {
        let dirs = ProjectDirs::from("dev", "wxframe", "wxframe").ok_or_else(|| {
            StageError::Config("could not determine platform config directory".to_string())
        })?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    pub fn forecast_window(&self) -> chrono::Duration {
        chrono::Duration::hours(self.forecast_hours)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_original_deployment() {
        let cfg = Config::default();
        assert_eq!(cfg.forecast_hours, 36);
        assert_eq!((cfg.canvas_width, cfg.canvas_height), (3840, 2160));
        assert_eq!(cfg.margin_px, 64);
        assert_eq!(cfg.backdrop_border_px, 10);
        assert_eq!(cfg.backdrop_rgba, [100, 100, 100, 100]);
        assert_eq!(cfg.wrap_columns, 45);
        assert!((cfg.latitude - 42.34013).abs() < 1e-9);
    }

    #[test]
    fn toml_round_trip() {
        let cfg = Config::default();
        let text = toml::to_string_pretty(&cfg).expect("serialize");
        let back: Config = toml::from_str(&text).expect("parse");
        assert_eq!(cfg, back);
    }

    #[test]
    fn partial_file_overrides_only_named_keys() {
        let cfg: Config = toml::from_str("latitude = 40.0\nforecast_hours = 48\n").expect("parse");
        assert!((cfg.latitude - 40.0).abs() < 1e-9);
        assert_eq!(cfg.forecast_hours, 48);
        // untouched keys keep their defaults
        assert!((cfg.longitude - -71.12031).abs() < 1e-9);
        assert_eq!(cfg.canvas_width, 3840);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("does-not-exist.toml");
        let cfg = Config::load(Some(&path)).expect("load");
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("config.toml");

        let mut cfg = Config::default();
        cfg.forecast_hours = 24;
        cfg.save(Some(&path)).expect("save");

        let back = Config::load(Some(&path)).expect("load");
        assert_eq!(back, cfg);
    }
}
