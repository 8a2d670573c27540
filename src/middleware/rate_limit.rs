use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    middleware::Next,
    response::Response,
};
use redis::AsyncCommands;

use crate::{config::Config, error::AppError};

const RATE_LIMIT_PREFIX: &str = "rate_limit:";

/// 基于 Redis 计数器的固定窗口限流
#[derive(Clone)]
pub struct RateLimiter {
    redis: Arc<redis::Client>,
    config: Arc<Config>,
}

impl RateLimiter {
    pub fn new(redis: redis::Client, config: Config) -> Self {
        Self {
            redis: Arc::new(redis),
            config: Arc::new(config),
        }
    }

    pub async fn check_rate_limit(self: Arc<Self>, req: Request<Body>, next: Next) -> Result<Response, AppError> {
        let key = format!("{}{}", RATE_LIMIT_PREFIX, client_ip(&req));
        let window = self.config.rate_limit_window().as_secs();

        let mut conn = self.redis.get_multiplexed_async_connection().await?;

        // 使用 Redis 的 INCR 和 EXPIRE 命令实现计数器
        let count: u64 = conn.incr(&key, 1).await?;
        if count == 1 {
            // 窗口内第一次请求，设置过期时间
            let _: () = conn.expire(&key, window as i64).await?;
        }

        if count > u64::from(self.config.rate_limit_requests) {
            tracing::debug!(key = %key, count, "Rate limit exceeded");
            return Err(AppError::RateLimited {
                retry_after_secs: window,
            });
        }

        Ok(next.run(req).await)
    }
}

/// 优先使用代理头中的IP，其次使用连接IP
fn client_ip(req: &Request<Body>) -> String {
    let remote_ip = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string());

    req.headers()
        .get("x-real-ip")
        .and_then(|h| h.to_str().ok())
        .or_else(|| {
            req.headers()
                .get("x-forwarded-for")
                .and_then(|h| h.to_str().ok())
                .and_then(|s| s.split(',').find(|ip| !ip.trim().is_empty()))
        })
        .or(remote_ip.as_deref())
        .unwrap_or("unknown")
        .trim()
        .to_string()
}

pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    limiter.check_rate_limit(req, next).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_forwarded_headers() {
        let req = Request::builder()
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_ip(&req), "203.0.113.7");

        let req = Request::builder()
            .header("x-real-ip", "198.51.100.2")
            .header("x-forwarded-for", "203.0.113.7")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_ip(&req), "198.51.100.2");
    }

    #[test]
    fn falls_back_to_unknown() {
        let req = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(client_ip(&req), "unknown");
    }
}
