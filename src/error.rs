//! Error taxonomy for the scanner.
//!
//! [`PlatformError`] is the sum type every adapter, the retry driver, and
//! the job worker reason about; everything above the adapter boundary
//! consumes only this sum, never a transport-specific error type directly.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::platform::Platform;

/// Top-level crate error. Component-local errors convert into this via
/// `#[from]` so callers can use a single `Result` alias end to end.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Platform(#[from] PlatformError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("cache error: {0}")]
    Cache(String),

    #[error("queue error: {0}")]
    Queue(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Cache(format!("(de)serialization failed: {err}"))
    }
}

impl From<::redis::RedisError> for Error {
    fn from(err: ::redis::RedisError) -> Self {
        Error::Cache(err.to_string())
    }
}

/// Errors raised while fetching and validating markets from a platform.
///
/// Every variant carries the originating [`Platform`] so logs and alerts
/// can attribute failures without the caller re-threading it.
#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("[{platform}] network timeout")]
    NetworkTimeout {
        platform: Platform,
        #[source]
        cause: Option<reqwest::Error>,
    },

    #[error("[{platform}] http status {code}")]
    HttpStatus { platform: Platform, code: u16 },

    #[error("[{platform}] rate limited{}", retry_after_suffix(*.retry_after_seconds))]
    RateLimited {
        platform: Platform,
        retry_after_seconds: Option<u64>,
    },

    #[error("[{platform}] schema validation failed: {payload}")]
    ValidationFailure { platform: Platform, payload: String },

    #[error("[{platform}] required configuration missing")]
    ConfigMissing { platform: Platform },

    #[error("[{platform}] unknown error: {message}")]
    Unknown {
        platform: Platform,
        message: String,
    },
}

fn retry_after_suffix(retry_after_seconds: Option<u64>) -> String {
    match retry_after_seconds {
        Some(s) => format!(" (retry after {s}s)"),
        None => String::new(),
    }
}

impl PlatformError {
    /// Whether the retry driver should attempt this call again.
    #[must_use]
    pub fn retryable(&self) -> bool {
        match self {
            PlatformError::NetworkTimeout { .. } => true,
            PlatformError::HttpStatus { code, .. } => *code >= 500,
            PlatformError::RateLimited { .. } => true,
            PlatformError::ValidationFailure { .. }
            | PlatformError::ConfigMissing { .. }
            | PlatformError::Unknown { .. } => false,
        }
    }

    /// The delay the retry driver should wait before trying again.
    #[must_use]
    pub fn suggested_delay(&self) -> Duration {
        match self {
            PlatformError::RateLimited {
                retry_after_seconds,
                ..
            } => retry_after_seconds
                .map(|s| Duration::from_secs(s))
                .unwrap_or(Duration::from_millis(60_000)),
            PlatformError::HttpStatus { code, .. } if *code >= 500 => Duration::from_millis(5_000),
            PlatformError::NetworkTimeout { .. } => Duration::from_millis(2_000),
            _ => Duration::ZERO,
        }
    }

    /// The platform this error originated from.
    #[must_use]
    pub fn platform(&self) -> Platform {
        match self {
            PlatformError::NetworkTimeout { platform, .. }
            | PlatformError::HttpStatus { platform, .. }
            | PlatformError::RateLimited { platform, .. }
            | PlatformError::ValidationFailure { platform, .. }
            | PlatformError::ConfigMissing { platform, .. }
            | PlatformError::Unknown { platform, .. } => *platform,
        }
    }

    /// Classify a transport error (or a raw HTTP status) into the taxonomy.
    pub fn classify(platform: Platform, cause: reqwest::Error) -> Self {
        if cause.is_timeout() {
            return PlatformError::NetworkTimeout {
                platform,
                cause: Some(cause),
            };
        }
        if let Some(status) = cause.status() {
            let code = status.as_u16();
            if code == 429 {
                // A transport-level reqwest::Error carries no response headers,
                // so Retry-After can't be read here; classify_status (called
                // from the response path) handles that case.
                return PlatformError::RateLimited {
                    platform,
                    retry_after_seconds: None,
                };
            }
            return PlatformError::HttpStatus { platform, code };
        }
        PlatformError::Unknown {
            platform,
            message: cause.to_string(),
        }
    }

    /// Classify an HTTP status line observed directly (not via a reqwest
    /// transport error), e.g. after a successful response with a non-2xx
    /// code. `retry_after_seconds` comes from a parsed `Retry-After` header.
    #[must_use]
    pub fn classify_status(
        platform: Platform,
        code: u16,
        retry_after_seconds: Option<u64>,
    ) -> Self {
        if code == 429 {
            return PlatformError::RateLimited {
                platform,
                retry_after_seconds,
            };
        }
        PlatformError::HttpStatus { platform, code }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Errors raised while loading and validating the process configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limited_is_retryable_with_default_delay() {
        let e = PlatformError::RateLimited {
            platform: Platform::Pm,
            retry_after_seconds: None,
        };
        assert!(e.retryable());
        assert_eq!(e.suggested_delay(), Duration::from_millis(60_000));
    }

    #[test]
    fn rate_limited_honors_retry_after() {
        let e = PlatformError::RateLimited {
            platform: Platform::Kal,
            retry_after_seconds: Some(2),
        };
        assert_eq!(e.suggested_delay(), Duration::from_secs(2));
    }

    #[test]
    fn http_5xx_is_retryable() {
        let e = PlatformError::HttpStatus {
            platform: Platform::Man,
            code: 503,
        };
        assert!(e.retryable());
        assert_eq!(e.suggested_delay(), Duration::from_millis(5_000));
    }

    #[test]
    fn http_4xx_except_429_is_not_retryable() {
        let e = PlatformError::HttpStatus {
            platform: Platform::Man,
            code: 404,
        };
        assert!(!e.retryable());
    }

    #[test]
    fn network_timeout_is_retryable() {
        let e = PlatformError::NetworkTimeout {
            platform: Platform::Pm,
            cause: None,
        };
        assert!(e.retryable());
        assert_eq!(e.suggested_delay(), Duration::from_millis(2_000));
    }

    #[test]
    fn validation_failure_is_not_retryable() {
        let e = PlatformError::ValidationFailure {
            platform: Platform::Pm,
            payload: "{}".to_string(),
        };
        assert!(!e.retryable());
    }

    #[test]
    fn classify_status_maps_429_to_rate_limited() {
        let e = PlatformError::classify_status(Platform::Kal, 429, Some(5));
        assert!(matches!(e, PlatformError::RateLimited { .. }));
        assert_eq!(e.suggested_delay(), Duration::from_secs(5));
    }
}
