//! Runtime configuration
//!
//! Loaded from YAML, then overridden by `SKYPLOT_*` environment variables.
//! Every field has a default so an empty file (or none at all) is valid.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ConfigError;
use crate::footprint::DEFAULT_RANGE_SIZE;
use crate::overlay::DEFAULT_MARKER_RADIUS_DEG;
use crate::resolver::name::{DEFAULT_FOV_THRESHOLD_DEG, DEFAULT_SETTLE_DELAY};
use crate::resolver::sesame::DEFAULT_SESAME_URL;
use crate::resolver::ProbeSettings;
use crate::target::DEFAULT_TARGET_COLOR;

const ENV_PREFIX: &str = "SKYPLOT_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkyPlotConfig {
    /// Base URL of the backend serving `/lookup_tic` and `/csv_upload`
    pub backend_url: String,
    pub sesame_url: String,
    /// Path to the footprint CSV, or an `http(s)://` URL
    pub footprint_source: String,
    pub http_timeout_secs: u64,
    pub settle_delay_ms: u64,
    pub fov_threshold_deg: f64,
    /// Field of view the name-resolution view returns to after a lookup
    pub default_fov_deg: f64,
    pub marker_radius_deg: f64,
    pub cycle_size: u32,
    pub marker_color: String,
    pub circle_color: String,
    /// Send batch files to the backend instead of parsing them in-process
    pub upload_via_backend: bool,
    pub bind_addr: String,
    /// Upper bound on how long an HTTP submit waits for its batch
    pub submit_timeout_secs: u64,
}

impl Default for SkyPlotConfig {
    fn default() -> Self {
        Self {
            backend_url: "http://localhost:5000/".to_string(),
            sesame_url: DEFAULT_SESAME_URL.to_string(),
            footprint_source: "data/ccd_edges.csv".to_string(),
            http_timeout_secs: 30,
            settle_delay_ms: DEFAULT_SETTLE_DELAY.as_millis() as u64,
            fov_threshold_deg: DEFAULT_FOV_THRESHOLD_DEG,
            default_fov_deg: 0.5,
            marker_radius_deg: DEFAULT_MARKER_RADIUS_DEG,
            cycle_size: DEFAULT_RANGE_SIZE,
            marker_color: DEFAULT_TARGET_COLOR.to_string(),
            circle_color: "red".to_string(),
            upload_via_backend: false,
            bind_addr: "127.0.0.1:3000".to_string(),
            submit_timeout_secs: 30,
        }
    }
}

impl SkyPlotConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml).map_err(|e| ConfigError::Parse {
            path: "<inline>".to_string(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let config: Self = serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply `SKYPLOT_<FIELD>` overrides read through `lookup`, then validate
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |field: &str| lookup(&format!("{}{}", ENV_PREFIX, field.to_uppercase()));

        if let Some(v) = var("backend_url") {
            self.backend_url = v;
        }
        if let Some(v) = var("sesame_url") {
            self.sesame_url = v;
        }
        if let Some(v) = var("footprint_source") {
            self.footprint_source = v;
        }
        if let Some(v) = var("marker_color") {
            self.marker_color = v;
        }
        if let Some(v) = var("circle_color") {
            self.circle_color = v;
        }
        if let Some(v) = var("bind_addr") {
            self.bind_addr = v;
        }
        override_parsed(&mut self.http_timeout_secs, "http_timeout_secs", var("http_timeout_secs"))?;
        override_parsed(&mut self.settle_delay_ms, "settle_delay_ms", var("settle_delay_ms"))?;
        override_parsed(&mut self.fov_threshold_deg, "fov_threshold_deg", var("fov_threshold_deg"))?;
        override_parsed(&mut self.default_fov_deg, "default_fov_deg", var("default_fov_deg"))?;
        override_parsed(&mut self.marker_radius_deg, "marker_radius_deg", var("marker_radius_deg"))?;
        override_parsed(&mut self.cycle_size, "cycle_size", var("cycle_size"))?;
        override_parsed(&mut self.upload_via_backend, "upload_via_backend", var("upload_via_backend"))?;
        override_parsed(&mut self.submit_timeout_secs, "submit_timeout_secs", var("submit_timeout_secs"))?;

        self.validate()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.backend_url()?;
        parse_url("sesame_url", &self.sesame_url)?;
        if self.cycle_size == 0 {
            return Err(invalid("cycle_size", "0", "must be at least 1"));
        }
        if !(self.fov_threshold_deg.is_finite() && self.fov_threshold_deg > 0.0) {
            return Err(invalid(
                "fov_threshold_deg",
                &self.fov_threshold_deg.to_string(),
                "must be a positive number",
            ));
        }
        if !(self.marker_radius_deg.is_finite() && self.marker_radius_deg > 0.0) {
            return Err(invalid(
                "marker_radius_deg",
                &self.marker_radius_deg.to_string(),
                "must be a positive number",
            ));
        }
        if self.http_timeout_secs == 0 {
            return Err(invalid("http_timeout_secs", "0", "must be at least 1"));
        }
        Ok(())
    }

    /// Backend base URL, always with a trailing slash so endpoint joins
    /// append rather than replace the last path segment
    pub fn backend_url(&self) -> Result<Url, ConfigError> {
        let raw = if self.backend_url.ends_with('/') {
            self.backend_url.clone()
        } else {
            format!("{}/", self.backend_url)
        };
        parse_url("backend_url", &raw)
    }

    pub fn sesame_url(&self) -> Result<Url, ConfigError> {
        parse_url("sesame_url", &self.sesame_url)
    }

    /// `Some` when the footprint source is a remote URL
    pub fn footprint_url(&self) -> Option<Url> {
        let source = self.footprint_source.trim();
        if source.starts_with("http://") || source.starts_with("https://") {
            Url::parse(source).ok()
        } else {
            None
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn submit_timeout(&self) -> Duration {
        Duration::from_secs(self.submit_timeout_secs)
    }

    pub fn probe_settings(&self) -> ProbeSettings {
        ProbeSettings {
            settle_delay: Duration::from_millis(self.settle_delay_ms),
            fov_threshold_deg: self.fov_threshold_deg,
        }
    }
}

fn override_parsed<T: FromStr>(
    field: &mut T,
    key: &str,
    value: Option<String>,
) -> Result<(), ConfigError> {
    if let Some(raw) = value {
        *field = raw
            .trim()
            .parse()
            .map_err(|_| invalid(key, &raw, "could not be parsed"))?;
    }
    Ok(())
}

fn parse_url(key: &str, raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw).map_err(|e| invalid(key, raw, &e.to_string()))
}

fn invalid(key: &str, value: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
