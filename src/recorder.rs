//! 时序数据记录
//!
//! 每次位置上报都会尽力写一份到 InfluxDB 供分析使用，写入失败不影响上报。

use std::time::Duration;

use async_trait::async_trait;

use crate::config::InfluxConfig;
use crate::error::AppError;
use crate::location::model::LocationSample;

pub const MEASUREMENT: &str = "user_location";

#[async_trait]
pub trait TimeSeriesSink: Send + Sync {
    async fn record_point(&self, sample: &LocationSample) -> Result<(), AppError>;
}

/// 通过 HTTP 写入 InfluxDB v2
pub struct InfluxRecorder {
    client: reqwest::Client,
    write_url: String,
    token: Option<String>,
}

impl InfluxRecorder {
    pub fn new(config: &InfluxConfig, timeout: Duration) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Upstream(format!("Failed to build HTTP client: {}", e)))?;

        let write_url = format!(
            "{}/api/v2/write?org={}&bucket={}&precision=ns",
            config.url.trim_end_matches('/'),
            config.org,
            config.bucket
        );

        Ok(Self {
            client,
            write_url,
            token: config.token.clone(),
        })
    }
}

#[async_trait]
impl TimeSeriesSink for InfluxRecorder {
    async fn record_point(&self, sample: &LocationSample) -> Result<(), AppError> {
        let mut request = self
            .client
            .post(&self.write_url)
            .header(reqwest::header::CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(to_line_protocol(sample));

        if let Some(token) = &self.token {
            request = request.header(reqwest::header::AUTHORIZATION, format!("Token {}", token));
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("InfluxDB write failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream(format!(
                "InfluxDB rejected point: {} {}",
                status, body
            )));
        }

        Ok(())
    }
}

/// 将一次上报转换为 InfluxDB 行协议，缺失的数值字段记为 0
pub fn to_line_protocol(sample: &LocationSample) -> String {
    let coords = &sample.coordinates;
    let timestamp_ns = sample
        .timestamp
        .timestamp_nanos_opt()
        .unwrap_or_else(|| sample.timestamp.timestamp_micros() * 1000);

    format!(
        "{},user_id={},device_id={},connection_type={} \
         latitude={},longitude={},altitude={},accuracy={},speed={},battery_level={} {}",
        MEASUREMENT,
        escape_tag(&sample.user_id),
        escape_tag(sample.device_id.as_deref().unwrap_or("unknown")),
        sample.connection_type.as_str(),
        float_field(coords.latitude),
        float_field(coords.longitude),
        float_field(coords.altitude.unwrap_or(0.0)),
        float_field(coords.accuracy.unwrap_or(0.0)),
        float_field(coords.speed.unwrap_or(0.0)),
        float_field(sample.battery_level.unwrap_or(0.0)),
        timestamp_ns
    )
}

// 标签值中的逗号、等号和空格需要转义
fn escape_tag(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, ',' | '=' | ' ') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

// 保证整数值也按浮点写入，避免字段类型冲突
fn float_field(value: f64) -> String {
    if value.fract() == 0.0 && value.is_finite() {
        format!("{:.1}", value)
    } else {
        value.to_string()
    }
}
