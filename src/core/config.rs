//! Settings and Overpass endpoint configuration for butterfly-net
//!
//! Settings are plain values passed into each extraction; nothing here is
//! process-global.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::error::{Error, Result};

/// Tags kept on nodes, ways and edges unless the settings say otherwise
pub const DEFAULT_KEEP_OSM_TAGS: &[&str] = &[
    "name", "ref", "highway", "service", "bridge", "tunnel", "access", "oneway", "toll", "lanes",
    "maxspeed", "hgv", "hov", "area", "width", "est_width", "junction",
];

/// Overpass API endpoints and status-discovery timings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OverpassConfig {
    /// Query endpoint (HTTP POST)
    pub interpreter_url: String,

    /// Status endpoint (HTTP GET, plain text)
    pub status_url: String,

    /// Delay before re-polling the status endpoint while a query is running
    pub status_retry_delay_secs: u64,

    /// Wait used when the status endpoint is unreachable or unparseable
    pub default_pause_secs: u64,
}

impl Default for OverpassConfig {
    fn default() -> Self {
        Self {
            interpreter_url: "https://overpass-api.de/api/interpreter".to_string(),
            status_url: "https://overpass-api.de/api/status".to_string(),
            status_retry_delay_secs: 5,
            default_pause_secs: 10,
        }
    }
}

impl OverpassConfig {
    /// Point both endpoints at a different Overpass instance
    pub fn with_base_url(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            interpreter_url: format!("{base}/api/interpreter"),
            status_url: format!("{base}/api/status"),
            ..Default::default()
        }
    }

    pub fn status_retry_delay(&self) -> Duration {
        Duration::from_secs(self.status_retry_delay_secs)
    }

    pub fn default_pause(&self) -> Duration {
        Duration::from_secs(self.default_pause_secs)
    }
}

/// Top-level butterfly-net settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// OSM tag names preserved on nodes, ways and edges
    pub keep_osm_tags: Vec<String>,

    /// Remote API configuration
    pub overpass: OverpassConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            keep_osm_tags: DEFAULT_KEEP_OSM_TAGS.iter().map(|t| t.to_string()).collect(),
            overpass: OverpassConfig::default(),
        }
    }
}

impl Settings {
    /// Parse settings from TOML text; absent fields keep their defaults
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let settings: Settings = toml::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::IoError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("Settings file not found: {}", path.display()),
            )));
        }
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    fn validate(&self) -> Result<()> {
        if let Some(tag) = self.keep_osm_tags.iter().find(|t| t.trim().is_empty()) {
            return Err(Error::InvalidInput(format!(
                "keep_osm_tags entries must be non-empty tag names, got {tag:?}"
            )));
        }
        if self.overpass.interpreter_url.is_empty() || self.overpass.status_url.is_empty() {
            return Err(Error::InvalidInput(
                "overpass endpoints must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.keep_osm_tags.len(), 17);
        assert!(settings.keep_osm_tags.contains(&"highway".to_string()));
        assert!(settings.keep_osm_tags.contains(&"est_width".to_string()));
        assert_eq!(
            settings.overpass.interpreter_url,
            "https://overpass-api.de/api/interpreter"
        );
        assert_eq!(settings.overpass.status_retry_delay(), Duration::from_secs(5));
        assert_eq!(settings.overpass.default_pause(), Duration::from_secs(10));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let settings = Settings::from_toml_str(
            r#"
            keep_osm_tags = ["highway", "name"]

            [overpass]
            default_pause_secs = 3
            "#,
        )
        .unwrap();

        assert_eq!(settings.keep_osm_tags, vec!["highway", "name"]);
        assert_eq!(settings.overpass.default_pause_secs, 3);
        assert_eq!(settings.overpass.status_retry_delay_secs, 5);
        assert_eq!(
            settings.overpass.status_url,
            "https://overpass-api.de/api/status"
        );
    }

    #[test]
    fn test_unknown_key_rejected() {
        let result = Settings::from_toml_str("log_colour = true");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_non_string_tag_rejected() {
        let result = Settings::from_toml_str("keep_osm_tags = [1, 2]");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_blank_tag_rejected() {
        let result = Settings::from_toml_str(r#"keep_osm_tags = ["highway", " "]"#);
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[overpass]").unwrap();
        writeln!(file, "interpreter_url = \"http://localhost:1234/api/interpreter\"").unwrap();

        let settings = Settings::from_file(file.path()).unwrap();
        assert_eq!(
            settings.overpass.interpreter_url,
            "http://localhost:1234/api/interpreter"
        );
        assert_eq!(settings.keep_osm_tags.len(), 17);
    }

    #[test]
    fn test_from_missing_file() {
        let result = Settings::from_file(Path::new("/nonexistent/butterfly-net.toml"));
        match result {
            Err(Error::IoError(err)) => assert_eq!(err.kind(), std::io::ErrorKind::NotFound),
            other => panic!("Expected NotFound IoError, got {other:?}"),
        }
    }

    #[test]
    fn test_with_base_url() {
        let config = OverpassConfig::with_base_url("http://127.0.0.1:8080/");
        assert_eq!(config.interpreter_url, "http://127.0.0.1:8080/api/interpreter");
        assert_eq!(config.status_url, "http://127.0.0.1:8080/api/status");
    }
}
