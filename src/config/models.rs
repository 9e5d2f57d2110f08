use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub use crate::worker::http::HttpConfig;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub pool: PoolConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Worker pool configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PoolConfig {
    /// Number of concurrent downloads
    #[serde(default = "default_workers")]
    pub workers: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
        }
    }
}

fn default_workers() -> usize {
    3
}

/// Log output configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Directory holding rotated log files
    #[serde(default = "default_log_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_log_prefix")]
    pub file_prefix: String,
    /// Rotated files kept on disk
    #[serde(default = "default_max_files")]
    pub max_files: usize,
    /// Show debug events on the console
    #[serde(default)]
    pub verbose: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_log_directory(),
            file_prefix: default_log_prefix(),
            max_files: default_max_files(),
            verbose: false,
        }
    }
}

fn default_log_directory() -> PathBuf {
    PathBuf::from("logs")
}

fn default_log_prefix() -> String {
    "app".to_string()
}

fn default_max_files() -> usize {
    10
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.pool.workers, 3);
        assert_eq!(config.http.max_redirects, 10);
        assert_eq!(config.logging.directory, PathBuf::from("logs"));
        assert_eq!(config.logging.max_files, 10);
        assert!(!config.logging.verbose);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
[pool]
workers = 8

[http]
proxy = "http://proxy:8080"
            "#,
        )
        .unwrap();

        assert_eq!(config.pool.workers, 8);
        assert_eq!(config.http.proxy.as_deref(), Some("http://proxy:8080"));
        assert_eq!(config.http.request_timeout_ms, 60_000);
        assert_eq!(config.logging.file_prefix, "app");
    }

    #[test]
    fn test_toml_roundtrip_of_defaults() {
        let rendered = toml::to_string(&Config::default()).unwrap();
        assert!(rendered.contains("[pool]"));
        assert!(rendered.contains("workers = 3"));
        // Unset proxy is omitted rather than rendered as an empty value
        assert!(!rendered.contains("proxy"));
    }
}
