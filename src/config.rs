//! Viewer configuration.
//!
//! Colors, default opacities, zoom limits and capture settings. Stored as
//! JSON; every field falls back to its default when absent so older files
//! keep loading.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::enums::{Category, VideoFormat};
use crate::overlay::Rgb;

/// Current configuration file format version.
pub const CONFIG_VERSION: u32 = 1;

/// Number of selectable label ids (1..=5).
pub const LABEL_COUNT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionColors {
    pub tp: Rgb,
    pub fp: Rgb,
    #[serde(rename = "fn")]
    pub fn_: Rgb,
}

impl Default for PredictionColors {
    fn default() -> Self {
        Self {
            tp: [0.36, 0.68, 0.68],
            fp: [0.56, 0.1, 1.0],
            fn_: [1.0, 0.5, 0.0],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorScheme {
    #[serde(default = "default_background")]
    pub background: Rgb,
    #[serde(default = "default_brain")]
    pub brain: Rgb,
    /// Colors for label ids 1..=5, in id order.
    #[serde(default = "default_mask_colors")]
    pub mask: [Rgb; LABEL_COUNT],
    #[serde(default)]
    pub prediction: PredictionColors,
}

fn default_background() -> Rgb {
    [0.82, 0.82, 0.82]
}

fn default_brain() -> Rgb {
    [1.0, 0.9, 0.9]
}

fn default_mask_colors() -> [Rgb; LABEL_COUNT] {
    [
        [1.0, 0.0, 0.0],
        [1.0, 1.0, 0.0],
        [0.0, 1.0, 0.0],
        [0.0, 0.0, 1.0],
        [0.0, 1.0, 1.0],
    ]
}

impl Default for ColorScheme {
    fn default() -> Self {
        Self {
            background: default_background(),
            brain: default_brain(),
            mask: default_mask_colors(),
            prediction: PredictionColors::default(),
        }
    }
}

impl ColorScheme {
    /// Color for label `id`; `None` for background and ids above 5.
    pub fn mask_color(&self, id: u8) -> Option<Rgb> {
        match id as usize {
            1..=LABEL_COUNT => Some(self.mask[id as usize - 1]),
            _ => None,
        }
    }

    pub fn category_color(&self, category: Category) -> Rgb {
        match category {
            Category::TruePositive => self.prediction.tp,
            Category::FalsePositive => self.prediction.fp,
            Category::FalseNegative => self.prediction.fn_,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureSettings {
    #[serde(default = "default_fps")]
    pub fps: u32,
    #[serde(default = "default_orbit_frames")]
    pub orbit_frames: u32,
    #[serde(default = "default_orbit_step")]
    pub orbit_step_degrees: f64,
    #[serde(default)]
    pub video_format: VideoFormat,
    /// Encoder used for MP4 output.
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg: PathBuf,
}

fn default_fps() -> u32 {
    30
}

fn default_orbit_frames() -> u32 {
    360
}

fn default_orbit_step() -> f64 {
    1.0
}

fn default_ffmpeg() -> PathBuf {
    PathBuf::from("ffmpeg")
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            fps: default_fps(),
            orbit_frames: default_orbit_frames(),
            orbit_step_degrees: default_orbit_step(),
            video_format: VideoFormat::default(),
            ffmpeg: default_ffmpeg(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoomSettings {
    #[serde(default = "default_zoom_min")]
    pub min: f64,
    #[serde(default = "default_zoom_max")]
    pub max: f64,
    /// Vertical pointer travel, in pixels, that changes the zoom factor by 1.
    #[serde(default = "default_zoom_sensitivity")]
    pub sensitivity: f64,
}

fn default_zoom_min() -> f64 {
    0.5
}

fn default_zoom_max() -> f64 {
    2.0
}

fn default_zoom_sensitivity() -> f64 {
    100.0
}

impl Default for ZoomSettings {
    fn default() -> Self {
        Self {
            min: default_zoom_min(),
            max: default_zoom_max(),
            sensitivity: default_zoom_sensitivity(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewerConfig {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub colors: ColorScheme,
    #[serde(default = "default_overlay_opacity")]
    pub label_opacity: f32,
    #[serde(default = "default_overlay_opacity")]
    pub prediction_opacity: f32,
    #[serde(default = "default_brain_opacity")]
    pub brain_opacity: f32,
    /// Overlay opacity of the grid viewer, limited to `[0, 0.4]`.
    #[serde(default = "default_grid_opacity")]
    pub grid_opacity: f32,
    #[serde(default = "default_crosshair_color")]
    pub crosshair_color: Rgb,
    #[serde(default)]
    pub capture: CaptureSettings,
    #[serde(default)]
    pub zoom: ZoomSettings,
    #[serde(default)]
    pub log_level: LogLevel,
}

fn default_version() -> u32 {
    CONFIG_VERSION
}

fn default_overlay_opacity() -> f32 {
    0.5
}

fn default_brain_opacity() -> f32 {
    0.15
}

fn default_grid_opacity() -> f32 {
    0.2
}

fn default_crosshair_color() -> Rgb {
    [1.0, 1.0, 0.0]
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            colors: ColorScheme::default(),
            label_opacity: default_overlay_opacity(),
            prediction_opacity: default_overlay_opacity(),
            brain_opacity: default_brain_opacity(),
            grid_opacity: default_grid_opacity(),
            crosshair_color: default_crosshair_color(),
            capture: CaptureSettings::default(),
            zoom: ZoomSettings::default(),
            log_level: LogLevel::default(),
        }
    }
}

impl ViewerConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let config: ViewerConfig = serde_json::from_str(json)?;
        if config.version != CONFIG_VERSION {
            log::warn!(
                "Config version {} differs from supported version {}",
                config.version,
                CONFIG_VERSION
            );
        }
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Loads the configuration at `path`, or the defaults if the file does
    /// not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            log::info!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path)?;
        Ok(Self::from_json(&text)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_yields_defaults() {
        let config = ViewerConfig::from_json("{}").unwrap();
        assert_eq!(config, ViewerConfig::default());
        assert_eq!(config.capture.orbit_frames, 360);
        assert_eq!(config.zoom.max, 2.0);
    }

    #[test]
    fn partial_colors_keep_other_defaults() {
        let config =
            ViewerConfig::from_json(r#"{"colors": {"prediction": {"tp": [0,0,0], "fp": [1,1,1], "fn": [0.5,0.5,0.5]}}}"#)
                .unwrap();
        assert_eq!(config.colors.category_color(Category::FalseNegative), [0.5, 0.5, 0.5]);
        assert_eq!(config.colors.mask_color(1), Some([1.0, 0.0, 0.0]));
    }

    #[test]
    fn mask_color_rejects_background_and_unknown_ids() {
        let colors = ColorScheme::default();
        assert_eq!(colors.mask_color(0), None);
        assert_eq!(colors.mask_color(6), None);
        assert_eq!(colors.mask_color(5), Some([0.0, 1.0, 1.0]));
    }

    #[test]
    fn save_then_load_preserves_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("viewer.json");
        let mut config = ViewerConfig::default();
        config.label_opacity = 0.3;
        config.capture.video_format = VideoFormat::Mp4;
        config.capture.ffmpeg = PathBuf::from("/usr/local/bin/ffmpeg");
        config.save(&path).unwrap();
        assert_eq!(ViewerConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ViewerConfig::load(dir.path().join("absent.json")).unwrap();
        assert_eq!(config, ViewerConfig::default());
    }
}
