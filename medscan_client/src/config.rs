use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::interpret::ConfidenceThreshold;
use crate::settings::StaticSettings;
use crate::validator::{UploadPolicy, DEFAULT_EXTENSIONS, DEFAULT_MAX_UPLOAD_BYTES};

const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:5000";

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ClientConfigFile {
    endpoint: Option<String>,
    upload: Option<UploadConfigFile>,
    transport: Option<TransportConfigFile>,
    settings: Option<SettingsConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct UploadConfigFile {
    max_bytes: Option<u64>,
    extensions: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct TransportConfigFile {
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct SettingsConfigFile {
    confidence_threshold: Option<i64>,
    auto_analysis: Option<bool>,
    save_results: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub endpoint: String,
    pub upload: UploadPolicy,
    pub timeout: Option<Duration>,
    pub settings: StaticSettings,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            upload: UploadPolicy::default(),
            timeout: None,
            settings: StaticSettings::default(),
        }
    }
}

impl ClientConfig {
    /// Defaults, then the TOML file at `path` or `MEDSCAN_CONFIG`, then
    /// `MEDSCAN_*` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let env_path = std::env::var("MEDSCAN_CONFIG").ok();
        let path = path.or(env_path.as_deref().map(Path::new));
        let file_cfg = match path {
            Some(path) => read_config_file(path)?,
            None => ClientConfigFile::default(),
        };
        let mut cfg = Self::from_file(file_cfg)?;
        cfg.apply_env(|key| std::env::var(key).ok())?;
        Ok(cfg)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let file: ClientConfigFile = toml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: "<inline>".into(),
            source,
        })?;
        Self::from_file(file)
    }

    fn from_file(file: ClientConfigFile) -> Result<Self, ConfigError> {
        let endpoint = file
            .endpoint
            .filter(|e| !e.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());

        let upload = file.upload.unwrap_or_default();
        let upload = UploadPolicy::new(
            upload.max_bytes.unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
            upload
                .extensions
                .unwrap_or_else(|| DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect()),
        )?;

        let timeout = file
            .transport
            .and_then(|t| t.timeout_secs)
            .map(timeout_from_secs)
            .transpose()?;

        let settings = file.settings.unwrap_or_default();
        let defaults = StaticSettings::default();
        let settings = StaticSettings {
            confidence_threshold: match settings.confidence_threshold {
                Some(percent) => ConfidenceThreshold::new(percent)?,
                None => defaults.confidence_threshold,
            },
            auto_analysis: settings.auto_analysis.unwrap_or(defaults.auto_analysis),
            save_results: settings.save_results.unwrap_or(defaults.save_results),
        };

        Ok(Self {
            endpoint,
            upload,
            timeout,
            settings,
        })
    }

    /// Blank values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(endpoint) = get("MEDSCAN_ENDPOINT") {
            self.endpoint = endpoint;
        }
        if let Some(max_bytes) = get("MEDSCAN_MAX_BYTES") {
            let max_bytes = max_bytes
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::invalid("MEDSCAN_MAX_BYTES", "must be an integer number of bytes"))?;
            self.upload = UploadPolicy::new(max_bytes, self.upload.extensions().to_vec())?;
        }
        if let Some(secs) = get("MEDSCAN_TIMEOUT_SECS") {
            let secs = secs
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::invalid("MEDSCAN_TIMEOUT_SECS", "must be an integer number of seconds"))?;
            self.timeout = Some(timeout_from_secs(secs)?);
        }
        if let Some(threshold) = get("MEDSCAN_CONFIDENCE_THRESHOLD") {
            let percent = threshold
                .trim()
                .parse::<i64>()
                .map_err(|_| ConfigError::invalid("MEDSCAN_CONFIDENCE_THRESHOLD", "must be an integer"))?;
            self.settings.confidence_threshold = ConfidenceThreshold::new(percent)?;
        }
        if let Some(flag) = get("MEDSCAN_AUTO_ANALYSIS") {
            self.settings.auto_analysis = parse_flag("MEDSCAN_AUTO_ANALYSIS", &flag)?;
        }
        if let Some(flag) = get("MEDSCAN_SAVE_RESULTS") {
            self.settings.save_results = parse_flag("MEDSCAN_SAVE_RESULTS", &flag)?;
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<ClientConfigFile, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn timeout_from_secs(secs: u64) -> Result<Duration, ConfigError> {
    if secs == 0 {
        return Err(ConfigError::invalid("transport.timeout_secs", "must be greater than zero"));
    }
    Ok(Duration::from_secs(secs))
}

fn parse_flag(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::invalid(key, format!("{raw:?} is not a boolean"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_settings_page() {
        let cfg = ClientConfig::from_toml_str("").unwrap();
        assert_eq!(cfg.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(cfg.upload, UploadPolicy::default());
        assert_eq!(cfg.timeout, None);
        assert_eq!(cfg.settings.confidence_threshold.percent(), 90);
        assert!(cfg.settings.auto_analysis);
        assert!(cfg.settings.save_results);
    }

    #[test]
    fn file_values_are_applied() {
        let cfg = ClientConfig::from_toml_str(
            r#"
            endpoint = "http://scans.internal:8080"

            [upload]
            max_bytes = 2048
            extensions = ["png"]

            [transport]
            timeout_secs = 15

            [settings]
            confidence_threshold = 75
            auto_analysis = false
            save_results = false
            "#,
        )
        .unwrap();
        assert_eq!(cfg.endpoint, "http://scans.internal:8080");
        assert_eq!(cfg.upload.max_bytes(), 2048);
        assert_eq!(cfg.upload.extensions(), ["png".to_string()]);
        assert_eq!(cfg.timeout, Some(Duration::from_secs(15)));
        assert_eq!(cfg.settings.confidence_threshold.percent(), 75);
        assert!(!cfg.settings.auto_analysis);
        assert!(!cfg.settings.save_results);
    }

    #[test]
    fn rejects_out_of_range_threshold() {
        let err = ClientConfig::from_toml_str("[settings]\nconfidence_threshold = 40").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn rejects_unknown_keys() {
        assert!(matches!(
            ClientConfig::from_toml_str("dark_mode = true").unwrap_err(),
            ConfigError::Parse { .. }
        ));
    }

    #[test]
    fn env_overrides_file() {
        let mut cfg = ClientConfig::from_toml_str("[settings]\nconfidence_threshold = 60").unwrap();
        cfg.apply_env(env(&[
            ("MEDSCAN_ENDPOINT", "http://10.0.0.9:5000"),
            ("MEDSCAN_MAX_BYTES", "4096"),
            ("MEDSCAN_TIMEOUT_SECS", "3"),
            ("MEDSCAN_CONFIDENCE_THRESHOLD", "95"),
            ("MEDSCAN_AUTO_ANALYSIS", "off"),
            ("MEDSCAN_SAVE_RESULTS", "0"),
        ]))
        .unwrap();
        assert_eq!(cfg.endpoint, "http://10.0.0.9:5000");
        assert_eq!(cfg.upload.max_bytes(), 4096);
        assert_eq!(cfg.timeout, Some(Duration::from_secs(3)));
        assert_eq!(cfg.settings.confidence_threshold.percent(), 95);
        assert!(!cfg.settings.auto_analysis);
        assert!(!cfg.settings.save_results);
    }

    #[test]
    fn blank_env_values_are_ignored() {
        let mut cfg = ClientConfig::default();
        cfg.apply_env(env(&[("MEDSCAN_ENDPOINT", "  "), ("MEDSCAN_TIMEOUT_SECS", "")]))
            .unwrap();
        assert_eq!(cfg.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(cfg.timeout, None);
    }

    #[test]
    fn malformed_env_values_fail() {
        let mut cfg = ClientConfig::default();
        assert!(cfg.apply_env(env(&[("MEDSCAN_MAX_BYTES", "ten")])).is_err());
        assert!(cfg.apply_env(env(&[("MEDSCAN_SAVE_RESULTS", "maybe")])).is_err());
        assert!(cfg.apply_env(env(&[("MEDSCAN_TIMEOUT_SECS", "0")])).is_err());
    }
}
