use std::fs::File;
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::error::ReportError;
use crate::interpret::DisplayResult;
use crate::settings::SettingsStore;
use crate::Modality;

#[derive(Debug, Serialize)]
pub struct AnalysisReport<'a> {
    pub modality: Modality,
    pub file_name: &'a str,
    pub analyzed_at: DateTime<Utc>,
    pub confidence_threshold: u8,
    pub result: &'a DisplayResult,
}

/// Writes the report only when the save-results setting is on.
/// Returns whether a file was written.
pub fn save_report(
    settings: &dyn SettingsStore,
    report: &AnalysisReport<'_>,
    path: &Path,
) -> Result<bool, ReportError> {
    if !settings.save_results_enabled() {
        info!("result saving disabled, skipping report");
        return Ok(false);
    }

    let body = serde_json::to_string_pretty(report)?;
    let write_err = |source| ReportError::Write {
        path: path.to_path_buf(),
        source,
    };
    let mut file = File::create(path).map_err(write_err)?;
    file.write_all(body.as_bytes()).map_err(write_err)?;

    info!(path = %path.display(), "report saved");
    Ok(true)
}
