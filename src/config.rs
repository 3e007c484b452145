//! Configuration management
//!
//! All tunables are carried in an explicit [`Config`] passed to the compiler
//! at construction; the core never reads the process environment on its own.

use std::{collections::HashMap, path::Path, time::Duration};

use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Outbound pacing configuration
    pub rate_limit: RateLimitConfig,
    /// Tag allow-list; empty means every operation is compiled
    pub enabled_tags: Vec<String>,
    /// Upstream API configuration
    pub api: ApiConfig,
}

/// Outbound pacing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Sustained requests per second admitted to the network
    pub requests_per_second: f64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 5.0,
        }
    }
}

/// Upstream API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Override for the spec document's server URL
    pub base_url: Option<String>,
    /// Pre-formed `Authorization` header value (e.g. `Bearer xyz`).
    /// The bridge performs no auth-flow negotiation of its own.
    pub credential: Option<String>,
    /// Static headers attached to every outbound request
    pub headers: HashMap<String, String>,
    /// Per-request deadline; exceeding it aborts the call
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            credential: None,
            headers: HashMap::new(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file with `BRIDGE_*` env overrides
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let mut figment = Figment::new();
        if path.exists() {
            figment = figment.merge(Yaml::file(path));
        }
        let mut config: Self = figment
            .merge(Env::prefixed("BRIDGE_").split("__"))
            .extract()
            .map_err(|e| Error::Config(e.to_string()))?;
        config.normalize_tags();
        Ok(config)
    }

    /// Split comma-separated tag entries, as supplied via environment input
    fn normalize_tags(&mut self) {
        self.enabled_tags = self
            .enabled_tags
            .iter()
            .flat_map(|t| t.split(','))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(String::from)
            .collect();
    }

    /// Whether an operation with the given tags passes the allow-list
    #[must_use]
    pub fn tags_enabled(&self, tags: &[String]) -> bool {
        self.enabled_tags.is_empty() || tags.iter().any(|t| self.enabled_tags.contains(t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_configuration() {
        let config = Config::default();
        assert!((config.rate_limit.requests_per_second - 5.0).abs() < f64::EPSILON);
        assert!(config.enabled_tags.is_empty());
        assert_eq!(config.api.timeout, Duration::from_secs(30));
        assert!(config.api.credential.is_none());
    }

    #[test]
    fn empty_allow_list_enables_every_tag() {
        let config = Config::default();
        assert!(config.tags_enabled(&["anything".to_string()]));
        assert!(config.tags_enabled(&[]));
    }

    #[test]
    fn allow_list_requires_intersection() {
        let config = Config {
            enabled_tags: vec!["users".to_string()],
            ..Default::default()
        };
        assert!(config.tags_enabled(&["users".to_string(), "admin".to_string()]));
        assert!(!config.tags_enabled(&["admin".to_string()]));
        assert!(!config.tags_enabled(&[]));
    }

    #[test]
    fn comma_separated_tags_are_split() {
        let mut config = Config {
            enabled_tags: vec!["users, items".to_string(), "admin".to_string()],
            ..Default::default()
        };
        config.normalize_tags();
        assert_eq!(config.enabled_tags, vec!["users", "items", "admin"]);
    }

    #[test]
    fn yaml_round_trip() {
        let yaml = r"
rate_limit:
  requests_per_second: 2.5
enabled_tags: [users]
api:
  base_url: https://api.test.com
  timeout: 10s
";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!((config.rate_limit.requests_per_second - 2.5).abs() < f64::EPSILON);
        assert_eq!(config.api.base_url.as_deref(), Some("https://api.test.com"));
        assert_eq!(config.api.timeout, Duration::from_secs(10));
    }
}
