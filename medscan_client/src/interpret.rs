use serde::Serialize;

use crate::error::ConfigError;
use crate::{AffectedArea, RawPayload, Region, Verdict};

/// Minimum confidence, in percent, for a result to count as confident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ConfidenceThreshold(u8);

impl ConfidenceThreshold {
    pub const MIN: u8 = 50;
    pub const MAX: u8 = 100;
    pub const DEFAULT: u8 = 90;

    pub fn new(percent: i64) -> Result<Self, ConfigError> {
        if percent < i64::from(Self::MIN) || percent > i64::from(Self::MAX) {
            return Err(ConfigError::invalid(
                "confidence_threshold",
                format!("{percent} is outside [{}, {}]", Self::MIN, Self::MAX),
            ));
        }
        Ok(Self(percent as u8))
    }

    pub fn percent(self) -> u8 {
        self.0
    }
}

impl Default for ConfidenceThreshold {
    fn default() -> Self {
        Self(Self::DEFAULT)
    }
}

/// Display-ready projection of a payload. Never persisted by the session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayResult {
    pub verdict: Verdict,
    pub confidence_percent: String,
    pub meets_threshold: bool,
    pub affected_areas: Vec<AffectedArea>,
    pub regions: Vec<Region>,
}

pub fn interpret(payload: &RawPayload, threshold: ConfidenceThreshold) -> DisplayResult {
    DisplayResult {
        verdict: payload.verdict,
        confidence_percent: format_confidence(payload.confidence),
        meets_threshold: displayed_percent(payload.confidence) >= f64::from(threshold.percent()),
        affected_areas: payload.affected_areas.clone(),
        regions: payload.regions.clone(),
    }
}

/// Percentage rounded to the two decimals that are displayed, so the
/// threshold check agrees with the printed figure.
fn displayed_percent(confidence: f64) -> f64 {
    (confidence * 10_000.0).round() / 100.0
}

pub fn format_confidence(confidence: f64) -> String {
    format!("{:.2}%", displayed_percent(confidence))
}
