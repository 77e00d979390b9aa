//! Application configuration loaded from environment variables.

use std::str::FromStr;

use query_pipeline::QueryPipelineConfig;
use query_pipeline::config::{DEFAULT_LIMIT, DEFAULT_MAX_LIMIT, DEFAULT_MULTI_VALUE_KEYS};
use ratings::{DEFAULT_MEAN, RatingsConfig};

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `QUERY_DEFAULT_LIMIT`: page size when none is requested (default: `100`)
/// - `QUERY_MAX_LIMIT`: largest page size a request may ask for (default: `1000`)
/// - `QUERY_MULTI_VALUE_KEYS`: comma-separated fields that may repeat
/// - `RATINGS_DEFAULT_MEAN`: rating shown for unreviewed tours (default: `4.5`)
///
/// Unparseable values fall back to the defaults.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub default_limit: usize,
    pub max_limit: usize,
    pub multi_value_keys: Vec<String>,
    pub default_mean: f64,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parsed(&lookup, "PORT").unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            default_limit: parsed(&lookup, "QUERY_DEFAULT_LIMIT")
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.default_limit),
            max_limit: parsed(&lookup, "QUERY_MAX_LIMIT")
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.max_limit),
            multi_value_keys: lookup("QUERY_MULTI_VALUE_KEYS")
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|k| !k.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or(defaults.multi_value_keys),
            default_mean: parsed(&lookup, "RATINGS_DEFAULT_MEAN")
                .filter(|m: &f64| (1.0..=5.0).contains(m))
                .unwrap_or(defaults.default_mean),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Query pipeline settings.
    pub fn pipeline(&self) -> QueryPipelineConfig {
        QueryPipelineConfig::default()
            .with_multi_value_keys(self.multi_value_keys.iter().cloned())
            .with_default_limit(self.default_limit)
            .with_max_limit(self.max_limit)
    }

    /// Ratings engine settings.
    pub fn ratings(&self) -> RatingsConfig {
        RatingsConfig::default().with_default_mean(self.default_mean)
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|v| v.trim().parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            default_limit: DEFAULT_LIMIT,
            max_limit: DEFAULT_MAX_LIMIT,
            multi_value_keys: DEFAULT_MULTI_VALUE_KEYS
                .iter()
                .map(|k| k.to_string())
                .collect(),
            default_mean: DEFAULT_MEAN,
        }
    }
}
