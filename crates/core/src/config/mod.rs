use std::{fs, path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{
    geometry::{Bounds, Size},
    mapping::TrendMapping,
    scene::CanvasSize,
    Color, FakeoutError, Result,
};

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub canvas: CanvasConfig,
    pub stepper: StepperConfig,
    pub bounce: BounceConfig,
    pub heart_rate: HeartRateConfig,
    pub picker: PickerConfig,
}

impl AppConfig {
    /// Reads a JSON config file. Missing sections fall back to defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)?;
        let config = Self::from_json(&raw)?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.canvas.size.width == 0 || self.canvas.size.height == 0 {
            return Err(FakeoutError::InvalidInput("canvas must be at least 1x1"));
        }
        self.stepper.interval()?;
        self.heart_rate.poll_interval()?;
        if !is_non_negative(self.bounce.speed) {
            return Err(FakeoutError::InvalidInput("bounce speed must not be negative"));
        }
        let mapping = &self.heart_rate.mapping;
        if [mapping.rising, mapping.falling, mapping.steady]
            .iter()
            .any(|style| !is_non_negative(style.speed))
        {
            return Err(FakeoutError::InvalidInput("trend speeds must not be negative"));
        }
        if self.picker.frames == 0 {
            return Err(FakeoutError::InvalidInput("picker needs at least one frame"));
        }
        Ok(())
    }
}

/// Converts a positive number of seconds into a [`Duration`], rejecting
/// zero, negative, non-finite and out-of-range values.
pub fn positive_duration(seconds: f64, what: &'static str) -> Result<Duration> {
    match Duration::try_from_secs_f64(seconds) {
        Ok(duration) if !duration.is_zero() => Ok(duration),
        _ => Err(FakeoutError::InvalidInput(what)),
    }
}

fn is_non_negative(speed: f32) -> bool {
    speed.is_finite() && speed >= 0.0
}

/// Size and background of the watch-face canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasConfig {
    pub size: CanvasSize,
    pub background: Color,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            size: CanvasSize::new(78, 93),
            background: Color::CLEAR,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepperConfig {
    pub interval_seconds: f64,
}

impl StepperConfig {
    pub fn interval(&self) -> Result<Duration> {
        positive_duration(self.interval_seconds, "stepper interval must be a positive duration")
    }
}

impl Default for StepperConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 0.02,
        }
    }
}

/// Starting geometry of the bouncing square.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BounceConfig {
    pub start: Bounds,
    pub fill: Color,
    pub speed: f32,
}

impl Default for BounceConfig {
    fn default() -> Self {
        Self {
            start: Bounds::new(20.0, 25.0, 5.0, 5.0),
            fill: Color::ORANGE,
            speed: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeartRateConfig {
    pub poll_interval_seconds: f64,
    /// Readings replayed by the scripted sensor, in beats per minute.
    pub script: Vec<f64>,
    pub mapping: TrendMapping,
}

impl HeartRateConfig {
    pub fn poll_interval(&self) -> Result<Duration> {
        positive_duration(self.poll_interval_seconds, "poll interval must be a positive duration")
    }
}

impl Default for HeartRateConfig {
    fn default() -> Self {
        Self {
            poll_interval_seconds: 1.0,
            script: vec![72.0, 75.0, 81.0, 78.0, 70.0, 66.0, 68.0, 74.0],
            mapping: TrendMapping::default(),
        }
    }
}

/// Precomputed picker images: a paddle sliding along the bottom edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PickerConfig {
    pub frames: usize,
    pub paddle: Size,
    pub bottom_margin: f32,
    pub fill: Color,
}

impl Default for PickerConfig {
    fn default() -> Self {
        Self {
            frames: 10,
            paddle: Size::new(20.0, 4.0),
            bottom_margin: 4.0,
            fill: Color::WHITE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_watch_face() {
        let config = AppConfig::default();

        assert_eq!(config.canvas.size, CanvasSize::new(78, 93));
        assert_eq!(config.stepper.interval().unwrap(), Duration::from_millis(20));
        assert_eq!(config.bounce.start, Bounds::new(20.0, 25.0, 5.0, 5.0));
        assert_eq!(config.heart_rate.poll_interval().unwrap(), Duration::from_secs(1));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_other_defaults() {
        let config = AppConfig::from_json(r#"{ "bounce": { "speed": 3.5 } }"#).unwrap();

        assert_eq!(config.bounce.speed, 3.5);
        assert_eq!(config.bounce.fill, Color::ORANGE);
        assert_eq!(config.canvas, CanvasConfig::default());
    }

    #[test]
    fn rejects_zero_interval() {
        let err = AppConfig::from_json(r#"{ "stepper": { "interval_seconds": 0.0 } }"#).unwrap_err();
        assert!(matches!(err, FakeoutError::InvalidInput(_)));
    }

    #[test]
    fn rejects_intervals_too_long_for_a_duration() {
        let err = AppConfig::from_json(r#"{ "stepper": { "interval_seconds": 1e20 } }"#).unwrap_err();
        assert!(matches!(err, FakeoutError::InvalidInput(_)));

        let err = AppConfig::from_json(r#"{ "heart_rate": { "poll_interval_seconds": 1e300 } }"#)
            .unwrap_err();
        assert!(matches!(err, FakeoutError::InvalidInput(_)));
    }

    #[test]
    fn unvalidated_interval_reports_instead_of_panicking() {
        let mut config = AppConfig::default();
        config.stepper.interval_seconds = f64::INFINITY;
        config.heart_rate.poll_interval_seconds = -1.0;

        assert!(matches!(config.stepper.interval(), Err(FakeoutError::InvalidInput(_))));
        assert!(matches!(config.heart_rate.poll_interval(), Err(FakeoutError::InvalidInput(_))));
    }

    #[test]
    fn rejects_malformed_json() {
        let err = AppConfig::from_json("{ not json").unwrap_err();
        assert!(matches!(err, FakeoutError::Json(_)));
    }

    #[test]
    fn loads_from_disk() {
        let path = std::env::temp_dir().join(format!("fakeout-config-{}.json", std::process::id()));
        let mut config = AppConfig::default();
        config.picker.frames = 3;
        fs::write(&path, serde_json::to_string(&config).unwrap()).unwrap();

        let loaded = AppConfig::load(&path).unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(loaded, config);
    }
}
