//! Process configuration (spec §6): TOML on disk, environment overrides
//! for secrets, validated eagerly on load.

use std::path::Path;

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::error::{ConfigError, Error, Result};
use crate::ratelimit::RateLimiterConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub fetching: FetchingConfig,
    pub matching: MatchingConfig,
    pub fees: FeesConfig,
    pub arbitrage: ArbitrageConfig,
    pub alerts: AlertsConfig,
    pub cache: CacheBackendConfig,
    pub queue: QueueConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FetchingConfig {
    pub polymarket_base_url: String,
    pub kalshi_base_url: String,
    pub manifold_base_url: String,
    pub markets_per_fetch: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MatchingConfig {
    pub max_date_diff_days: i64,
    pub min_match_char_length: usize,
    pub max_distance: f64,
    pub min_score: u8,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeesConfig {
    pub polymarket: Decimal,
    pub kalshi: Decimal,
    pub manifold: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArbitrageConfig {
    pub scan_interval_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlertsConfig {
    /// Overridden by the `ARB_SCANNER_WEBHOOK_URL` environment variable when
    /// present, so the URL (which may embed a token) never needs to live in
    /// the committed TOML file.
    pub webhook_url: Option<String>,
    pub min_roi_percent: Decimal,
    pub min_profit_amount: Decimal,
    pub cooldown_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum CacheBackendConfig {
    Memory,
    Redis {
        host: String,
        port: u16,
        /// Overridden by `ARB_SCANNER_REDIS_PASSWORD` when present.
        password: Option<String>,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    pub max_attempts: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

const ENV_WEBHOOK_URL: &str = "ARB_SCANNER_WEBHOOK_URL";
const ENV_REDIS_PASSWORD: &str = "ARB_SCANNER_REDIS_PASSWORD";

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        let mut config: Config = toml::from_str(&content).map_err(ConfigError::Parse)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var(ENV_WEBHOOK_URL) {
            self.alerts.webhook_url = Some(url);
        }
        if let CacheBackendConfig::Redis { password, .. } = &mut self.cache {
            if let Ok(pw) = std::env::var(ENV_REDIS_PASSWORD) {
                *password = Some(pw);
            }
        }
    }

    fn validate(&self) -> Result<()> {
        Self::validate_url("fetching.polymarket_base_url", &self.fetching.polymarket_base_url)?;
        Self::validate_url("fetching.kalshi_base_url", &self.fetching.kalshi_base_url)?;
        Self::validate_url("fetching.manifold_base_url", &self.fetching.manifold_base_url)?;
        if let Some(webhook_url) = &self.alerts.webhook_url {
            Self::validate_url("alerts.webhook_url", webhook_url)?;
        }
        if self.fetching.markets_per_fetch == 0 {
            return Err(Error::Config(ConfigError::InvalidValue {
                field: "fetching.markets_per_fetch",
                reason: "must be > 0".to_string(),
            }));
        }
        if !(0.0..=1.0).contains(&self.matching.max_distance) {
            return Err(Error::Config(ConfigError::InvalidValue {
                field: "matching.max_distance",
                reason: "must be in [0, 1]".to_string(),
            }));
        }
        if self.arbitrage.scan_interval_seconds == 0 {
            return Err(Error::Config(ConfigError::InvalidValue {
                field: "arbitrage.scan_interval_seconds",
                reason: "must be > 0".to_string(),
            }));
        }
        if self.queue.max_attempts == 0 {
            return Err(Error::Config(ConfigError::InvalidValue {
                field: "queue.max_attempts",
                reason: "must be > 0".to_string(),
            }));
        }
        Ok(())
    }

    #[must_use]
    pub fn rate_limiter_config(&self, platform: crate::platform::Platform) -> RateLimiterConfig {
        RateLimiterConfig::for_platform(platform)
    }

    fn validate_url(field: &'static str, value: &str) -> Result<()> {
        if value.is_empty() {
            return Err(Error::Config(ConfigError::MissingField { field }));
        }
        url::Url::parse(value).map_err(|e| {
            Error::Config(ConfigError::InvalidValue { field, reason: format!("not a valid URL: {e}") })
        })?;
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fetching: FetchingConfig {
                polymarket_base_url: "https://clob.polymarket.com".into(),
                kalshi_base_url: "https://trading-api.kalshi.com/trade-api/v2".into(),
                manifold_base_url: "https://api.manifold.markets".into(),
                markets_per_fetch: 100,
            },
            matching: MatchingConfig {
                max_date_diff_days: 30,
                min_match_char_length: 3,
                max_distance: 0.40,
                min_score: 60,
            },
            fees: FeesConfig {
                polymarket: rust_decimal_macros::dec!(0.02),
                kalshi: rust_decimal_macros::dec!(0.07),
                manifold: rust_decimal_macros::dec!(0.00),
            },
            arbitrage: ArbitrageConfig { scan_interval_seconds: 60 },
            alerts: AlertsConfig {
                webhook_url: None,
                min_roi_percent: rust_decimal_macros::dec!(5),
                min_profit_amount: rust_decimal_macros::dec!(0.01),
                cooldown_seconds: 3600,
            },
            cache: CacheBackendConfig::Memory,
            queue: QueueConfig { max_attempts: 3 },
            logging: LoggingConfig { level: "info".into(), format: "pretty".into() },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    struct TempPath(std::path::PathBuf);
    impl std::ops::Deref for TempPath {
        type Target = std::path::Path;
        fn deref(&self) -> &Self::Target {
            &self.0
        }
    }
    impl Drop for TempPath {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(&self.0);
        }
    }

    fn write_toml(contents: &str) -> TempPath {
        let path = std::env::temp_dir().join(format!("arb-scanner-test-{}.toml", uuid::Uuid::new_v4()));
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        TempPath(path)
    }

    const VALID: &str = r#"
        [fetching]
        polymarket_base_url = "https://clob.polymarket.com"
        kalshi_base_url = "https://trading-api.kalshi.com/trade-api/v2"
        manifold_base_url = "https://api.manifold.markets/v0"
        markets_per_fetch = 100

        [matching]
        max_date_diff_days = 30
        min_match_char_length = 3
        max_distance = 0.40
        min_score = 60

        [fees]
        polymarket = "0.02"
        kalshi = "0.07"
        manifold = "0.00"

        [arbitrage]
        scan_interval_seconds = 60

        [alerts]
        min_roi_percent = "5"
        min_profit_amount = "0.01"
        cooldown_seconds = 3600

        [cache]
        backend = "memory"

        [queue]
        max_attempts = 3

        [logging]
        level = "info"
        format = "pretty"
    "#;

    #[test]
    fn loads_a_valid_config() {
        let path = write_toml(VALID);
        let config = Config::load(&*path).unwrap();
        assert_eq!(config.fetching.markets_per_fetch, 100);
    }

    #[test]
    fn rejects_zero_scan_interval() {
        let bad = VALID.replace("scan_interval_seconds = 60", "scan_interval_seconds = 0");
        let path = write_toml(&bad);
        assert!(Config::load(&*path).is_err());
    }

    #[test]
    fn env_override_wins_over_file_webhook_url() {
        std::env::set_var(ENV_WEBHOOK_URL, "https://example.com/hook");
        let path = write_toml(VALID);
        let config = Config::load(&*path).unwrap();
        std::env::remove_var(ENV_WEBHOOK_URL);
        assert_eq!(config.alerts.webhook_url.as_deref(), Some("https://example.com/hook"));
    }
}
