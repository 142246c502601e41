use std::fmt::Write;

use crate::error::ValidationError;
use crate::interpret::{ConfidenceThreshold, DisplayResult};
use crate::session::{AnalysisOutcome, AnalysisSession};
use crate::Modality;

pub fn render_session(session: &AnalysisSession, threshold: ConfidenceThreshold) -> String {
    match session.outcome() {
        None => match session.staged() {
            Some(request) => format!("{} is ready for analysis.", request.file_name()),
            None => format!(
                "No image submitted. Accepted: {} up to {} bytes.",
                session.policy().accepted_list(),
                session.policy().max_bytes()
            ),
        },
        Some(AnalysisOutcome::Pending) => "Analyzing image...".to_string(),
        Some(AnalysisOutcome::Failure(err)) => format!("Error: {err}"),
        Some(AnalysisOutcome::Success(_)) => match session.display(threshold) {
            Some(display) => render_result(session.modality(), &display, threshold),
            None => String::new(),
        },
    }
}

pub fn render_result(modality: Modality, display: &DisplayResult, threshold: ConfidenceThreshold) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", modality.headline(display.verdict));
    let _ = writeln!(out, "Confidence: {}", display.confidence_percent);
    if display.meets_threshold {
        let _ = writeln!(out, "Meets the {}% confidence threshold", threshold.percent());
    } else {
        let _ = writeln!(out, "Below the {}% confidence threshold", threshold.percent());
    }

    if !display.affected_areas.is_empty() {
        let _ = writeln!(out, "Affected Areas:");
        for area in &display.affected_areas {
            let _ = writeln!(out, "  - {} - {} severity", area.region, area.severity);
        }
    }

    if !display.regions.is_empty() {
        let _ = writeln!(out, "Regions:");
        for region in &display.regions {
            let _ = writeln!(
                out,
                "  - x={} y={} width={} height={}",
                region.x, region.y, region.width, region.height
            );
        }
    }

    out.trim_end().to_string()
}

pub fn render_validation_error(err: &ValidationError) -> String {
    format!("Error: {err}")
}
