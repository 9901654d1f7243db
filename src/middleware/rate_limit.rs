use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderMap, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use redis::AsyncCommands;

use crate::{
    cache::keys::rate_limit_key,
    config::Config,
    utils::{error_codes, error_to_api_response},
};

/// Fixed-window request counter per client IP, shared across instances through redis.
pub struct RateLimiter {
    redis: Arc<redis::Client>,
    window_secs: u64,
    max_requests: i64,
}

impl RateLimiter {
    pub fn new(redis: Arc<redis::Client>, config: &Config) -> Self {
        Self {
            redis,
            window_secs: config.rate_limit_window().as_secs().max(1),
            max_requests: i64::from(config.rate_limit_requests),
        }
    }

    /// Bump the counter for `ip`; the first hit of a window sets its expiry.
    async fn hit(&self, ip: &str) -> Result<i64, redis::RedisError> {
        let key = rate_limit_key(ip);
        let mut conn = self.redis.get_multiplexed_async_connection().await?;
        let count: i64 = conn.incr(&key, 1).await?;
        if count == 1 {
            let _: () = conn.expire(&key, self.window_secs as i64).await?;
        }
        Ok(count)
    }

    fn rejection(&self) -> Response {
        (
            StatusCode::TOO_MANY_REQUESTS,
            error_to_api_response::<()>(
                error_codes::RATE_LIMIT,
                format!("Too many requests, retry in {} seconds", self.window_secs),
            ),
        )
            .into_response()
    }
}

/// Proxy headers win over the socket address.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').map(str::trim).find(|ip| !ip.is_empty()))
            .map(str::to_string)
    };
    header("x-real-ip")
        .or_else(|| header("x-forwarded-for"))
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let peer = req.extensions().get::<ConnectInfo<SocketAddr>>().map(|ci| ci.0);
    let ip = client_ip(req.headers(), peer);

    match limiter.hit(&ip).await {
        Ok(count) if count > limiter.max_requests => {
            tracing::warn!(ip = %ip, count, "rate limit exceeded");
            limiter.rejection()
        }
        Ok(_) => next.run(req).await,
        Err(e) => {
            // counting is best-effort; a redis outage must not take the api down
            tracing::warn!(error = %e, "rate limiter unavailable, request let through");
            next.run(req).await
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn peer() -> Option<SocketAddr> {
        Some(SocketAddr::from(([10, 0, 0, 7], 40000)))
    }

    #[test]
    fn real_ip_header_wins() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static(" 203.0.113.9 "));
        headers.insert("x-forwarded-for", HeaderValue::from_static("198.51.100.1"));
        assert_eq!(client_ip(&headers, peer()), "203.0.113.9");
    }

    #[test]
    fn forwarded_for_uses_first_hop() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static(" , 198.51.100.1, 10.0.0.1"));
        assert_eq!(client_ip(&headers, peer()), "198.51.100.1");
    }

    #[test]
    fn socket_address_is_the_fallback() {
        assert_eq!(client_ip(&HeaderMap::new(), peer()), "10.0.0.7");
        assert_eq!(client_ip(&HeaderMap::new(), None), "unknown");
    }

    #[tokio::test]
    async fn unreachable_redis_lets_requests_through() {
        use axum::{Router, routing::get};
        use tower::ServiceExt;

        let config = Config {
            database_url: String::new(),
            redis_url: String::new(),
            jwt_secret: "secret".into(),
            jwt_expiration_secs: 3600,
            rate_limit_window_secs: 60,
            rate_limit_requests: 1,
            server_host: "127.0.0.1".into(),
            server_port: 0,
            api_base_uri: String::new(),
            allowed_origins: Vec::new(),
            storage: Default::default(),
            smtp: None,
            google_api_key: None,
        };
        let redis = Arc::new(redis::Client::open("redis://127.0.0.1:1/").unwrap());
        let limiter = Arc::new(RateLimiter::new(redis, &config));
        let app = Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(axum::middleware::from_fn_with_state(limiter, rate_limit));

        for _ in 0..3 {
            let res = app
                .clone()
                .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(res.status(), StatusCode::OK);
        }
    }
}
