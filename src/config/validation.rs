use super::models::Config;
use reqwest::Proxy;
use thiserror::Error;

/// Inclusive bounds on the worker count
pub const MIN_WORKERS: usize = 1;
pub const MAX_WORKERS: usize = 12;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Worker count must be an integer from {MIN_WORKERS} to {MAX_WORKERS} (inclusive), got {0}")]
    WorkerCountOutOfRange(usize),

    #[error("Timeout must be positive: {field} = 0")]
    ZeroTimeout { field: String },

    #[error("User agent must not be empty")]
    EmptyUserAgent,

    #[error("Invalid proxy '{proxy}': {message}")]
    InvalidProxy { proxy: String, message: String },

    #[error("Logging must keep at least one file")]
    NoLogFiles,
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_workers(config.pool.workers)?;
    validate_http(config)?;
    validate_logging(config)?;
    Ok(())
}

pub fn validate_workers(workers: usize) -> Result<(), ValidationError> {
    if !(MIN_WORKERS..=MAX_WORKERS).contains(&workers) {
        return Err(ValidationError::WorkerCountOutOfRange(workers));
    }
    Ok(())
}

fn validate_http(config: &Config) -> Result<(), ValidationError> {
    let http = &config.http;

    if http.connect_timeout_ms == 0 {
        return Err(ValidationError::ZeroTimeout {
            field: "http.connect_timeout_ms".to_string(),
        });
    }
    if http.request_timeout_ms == 0 {
        return Err(ValidationError::ZeroTimeout {
            field: "http.request_timeout_ms".to_string(),
        });
    }

    if http.user_agent.trim().is_empty() {
        return Err(ValidationError::EmptyUserAgent);
    }

    if let Some(ref proxy) = http.proxy {
        Proxy::all(proxy.as_str()).map_err(|e| ValidationError::InvalidProxy {
            proxy: proxy.clone(),
            message: e.to_string(),
        })?;
    }

    Ok(())
}

fn validate_logging(config: &Config) -> Result<(), ValidationError> {
    if config.logging.max_files == 0 {
        return Err(ValidationError::NoLogFiles);
    }
    Ok(())
}
