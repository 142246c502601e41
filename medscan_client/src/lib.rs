pub mod config;
pub mod error;
pub mod interpret;
pub mod render;
pub mod report;
pub mod session;
pub mod settings;
pub mod transport;
pub mod validator;

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::TransportError;

/// The kind of scan being analyzed. Selects the endpoint path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Modality {
    BrainTumor,
    Pneumonia,
}

impl Modality {
    pub fn path_segment(&self) -> &'static str {
        match self {
            Modality::BrainTumor => "brain-tumor",
            Modality::Pneumonia => "pneumonia",
        }
    }

    pub fn headline(&self, verdict: Verdict) -> &'static str {
        match (self, verdict) {
            (Modality::BrainTumor, Verdict::Positive) => "Tumor Detected",
            (Modality::BrainTumor, Verdict::Negative) => "No Tumor Detected",
            (Modality::Pneumonia, Verdict::Positive) => "Pneumonia Detected",
            (Modality::Pneumonia, Verdict::Negative) => "No Pneumonia Detected",
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path_segment())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ImageMime {
    Png,
    Jpeg,
}

impl ImageMime {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageMime::Png => "image/png",
            ImageMime::Jpeg => "image/jpeg",
        }
    }

    /// Case-insensitive, without the leading dot.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "png" => Some(ImageMime::Png),
            "jpg" | "jpeg" => Some(ImageMime::Jpeg),
            _ => None,
        }
    }

    pub fn from_declared(mime: &str) -> Option<Self> {
        match mime.trim().to_ascii_lowercase().as_str() {
            "image/png" => Some(ImageMime::Png),
            "image/jpeg" | "image/jpg" => Some(ImageMime::Jpeg),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Verdict {
    Positive,
    Negative,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Positive => f.write_str("Positive"),
            Verdict::Negative => f.write_str("Negative"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    Mild,
    Moderate,
    Severe,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Mild => f.write_str("Mild"),
            Severity::Moderate => f.write_str("Moderate"),
            Severity::Severe => f.write_str("Severe"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffectedArea {
    pub region: String,
    pub severity: Severity,
}

/// Bounding box reported by the brain-tumor endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Analysis result exactly as the service returned it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPayload {
    #[serde(rename = "result")]
    pub verdict: Verdict,
    pub confidence: f64,
    #[serde(rename = "affectedAreas", default, deserialize_with = "null_as_empty")]
    pub affected_areas: Vec<AffectedArea>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub regions: Vec<Region>,
}

impl RawPayload {
    pub fn from_json(body: &[u8]) -> Result<Self, TransportError> {
        let payload: RawPayload = serde_json::from_slice(body)
            .map_err(|e| TransportError::InvalidPayload(e.to_string()))?;

        if !payload.confidence.is_finite() || !(0.0..=1.0).contains(&payload.confidence) {
            return Err(TransportError::InvalidPayload(format!(
                "confidence {} is outside [0, 1]",
                payload.confidence
            )));
        }

        Ok(payload)
    }
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}
