use serde::{Deserialize, Serialize};

use crate::Color;

/// Direction of the latest heart-rate reading relative to the running
/// average.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Trend {
    Rising,
    Falling,
    Steady,
}

impl Trend {
    pub fn classify(reading: f64, average: f64) -> Self {
        if reading > average {
            Trend::Rising
        } else if reading < average {
            Trend::Falling
        } else {
            Trend::Steady
        }
    }
}

/// Label colour and animation speed routed from a [`Trend`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendStyle {
    pub label_color: Color,
    pub speed: f32,
}

/// Per-trend styles. Defaults: rising is red and fast, falling is green and
/// slow, steady is yellow at the base speed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendMapping {
    pub rising: TrendStyle,
    pub falling: TrendStyle,
    pub steady: TrendStyle,
}

impl Default for TrendMapping {
    fn default() -> Self {
        Self {
            rising: TrendStyle {
                label_color: Color::RED,
                speed: 4.0,
            },
            falling: TrendStyle {
                label_color: Color::GREEN,
                speed: 1.0,
            },
            steady: TrendStyle {
                label_color: Color::YELLOW,
                speed: 2.0,
            },
        }
    }
}

impl TrendMapping {
    pub fn style(&self, trend: Trend) -> TrendStyle {
        match trend {
            Trend::Rising => self.rising,
            Trend::Falling => self.falling,
            Trend::Steady => self.steady,
        }
    }

    pub fn evaluate(&self, reading: f64, average: f64) -> (Trend, TrendStyle) {
        let trend = Trend::classify(reading, average);
        (trend, self.style(trend))
    }
}

/// Text shown under the animation for a reading, e.g. `"72 bpm"`.
pub fn bpm_label(reading: f64) -> String {
    format!("{} bpm", reading.trunc() as i64)
}
