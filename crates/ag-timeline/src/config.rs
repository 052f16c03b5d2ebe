//! Timeline configuration
//!
//! Resolution and the values a timeline reports before any event applies.

use ag_core::{AgError, AgResult, DEFAULT_DIVISION};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Default tempo in beats per second (120 BPM)
pub const DEFAULT_TEMPO: f64 = 2.0;

/// Default value of a change map and of a velocity list
pub const DEFAULT_VALUE: i32 = 80;

/// Shared configuration for the timelines of one score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineConfig {
    /// Ticks per quarter note
    pub division: i64,
    /// Tempo before the first tempo event, in beats per second
    pub default_tempo: f64,
    /// Change map value before the first event
    pub default_value: i32,
    /// Note velocity before the first dynamic
    pub default_velocity: i32,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            division: DEFAULT_DIVISION,
            default_tempo: DEFAULT_TEMPO,
            default_value: DEFAULT_VALUE,
            default_velocity: DEFAULT_VALUE,
        }
    }
}

impl TimelineConfig {
    /// Parse and validate a JSON config; missing fields take their defaults.
    pub fn from_json(json: &str) -> AgResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON config file
    pub fn load<P: AsRef<Path>>(path: P) -> AgResult<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        log::debug!("loading timeline config from {}", path.as_ref().display());
        Self::from_json(&content)
    }

    pub fn to_json(&self) -> AgResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> AgResult<()> {
        if self.division <= 0 {
            return Err(AgError::InvalidConfig(format!(
                "division must be positive, got {}",
                self.division
            )));
        }
        if !self.default_tempo.is_finite() || self.default_tempo <= 0.0 {
            return Err(AgError::InvalidConfig(format!(
                "default tempo must be positive, got {}",
                self.default_tempo
            )));
        }
        Ok(())
    }

    /// Set ticks per quarter note
    pub fn with_division(mut self, division: i64) -> Self {
        self.division = division;
        self
    }

    /// Set the tempo before the first tempo event (beats per second)
    pub fn with_default_tempo(mut self, tempo: f64) -> Self {
        self.default_tempo = tempo;
        self
    }
}
