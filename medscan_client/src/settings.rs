use crate::interpret::ConfidenceThreshold;

/// Read-only view of user settings consumed by the workflow.
pub trait SettingsStore: Send + Sync {
    fn confidence_threshold(&self) -> ConfidenceThreshold;

    fn auto_analysis_enabled(&self) -> bool;

    /// Gate only. Where results go is the caller's concern.
    fn save_results_enabled(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticSettings {
    pub confidence_threshold: ConfidenceThreshold,
    pub auto_analysis: bool,
    pub save_results: bool,
}

impl Default for StaticSettings {
    fn default() -> Self {
        Self {
            confidence_threshold: ConfidenceThreshold::default(),
            auto_analysis: true,
            save_results: true,
        }
    }
}

impl SettingsStore for StaticSettings {
    fn confidence_threshold(&self) -> ConfidenceThreshold {
        self.confidence_threshold
    }

    fn auto_analysis_enabled(&self) -> bool {
        self.auto_analysis
    }

    fn save_results_enabled(&self) -> bool {
        self.save_results
    }
}
