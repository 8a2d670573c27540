use std::env;
use std::time::Duration;

use crate::background::BackgroundPolicy;

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub jwt_secret: String,
    pub server_host: String,
    pub server_port: u16,
    pub api_base_uri: String,
    pub rate_limit_window_secs: u64,
    pub rate_limit_requests: u32,
    pub influx: Option<InfluxConfig>,
    pub background_timeout_ms: u64,
    pub background_max_retries: u32,
    pub background_backoff_ms: u64,
}

/// 时序数据库（InfluxDB）写入配置
#[derive(Debug, Clone, serde::Deserialize)]
pub struct InfluxConfig {
    pub url: String,
    pub org: String,
    pub bucket: String,
    pub token: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        dotenv::dotenv().ok();

        // 未配置 INFLUX_URL 时不写入时序数据
        let influx = env::var("INFLUX_URL").ok().map(|url| InfluxConfig {
            url,
            org: env::var("INFLUX_ORG").unwrap_or_else(|_| "geotrack".into()),
            bucket: env::var("INFLUX_BUCKET").unwrap_or_else(|_| "locations".into()),
            token: env::var("INFLUX_TOKEN").ok(),
        });

        Ok(Config {
            database_url: env::var("DATABASE_URL")?,
            redis_url: env::var("REDIS_URL")?,
            jwt_secret: env::var("JWT_SECRET")?,
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            server_port: parse_or("SERVER_PORT", 3000),
            api_base_uri: env::var("API_BASE_URI").unwrap_or_else(|_| "/api".into()),
            rate_limit_window_secs: parse_or("RATE_LIMIT_WINDOW", 60),
            rate_limit_requests: parse_or("RATE_LIMIT_REQUESTS", 100),
            influx,
            background_timeout_ms: parse_or("BACKGROUND_TIMEOUT_MS", 5000),
            background_max_retries: parse_or("BACKGROUND_MAX_RETRIES", 2),
            background_backoff_ms: parse_or("BACKGROUND_BACKOFF_MS", 200),
        })
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }

    pub fn background_policy(&self) -> BackgroundPolicy {
        BackgroundPolicy {
            timeout: Duration::from_millis(self.background_timeout_ms),
            max_retries: self.background_max_retries,
            backoff: Duration::from_millis(self.background_backoff_ms),
        }
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
