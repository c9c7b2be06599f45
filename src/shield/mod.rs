//! Request shield: attack pattern screening, bot detection and per-IP rate limiting.
//!
//! Checks run in that order and the first denial wins. In dry-run mode a
//! denial is logged and the request continues.

mod attack;
mod bot;
mod rate_limit;

pub use attack::AttackKind;
pub use bot::ClientKind;
pub use rate_limit::{RateDecision, RateLimiter};

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, Uri},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tokio::task::JoinHandle;

use crate::config::{ShieldConfig, ShieldMode};
use crate::errors::AppError;
use crate::middleware::client_ip;

const RATE_LIMIT_LIMIT: &str = "x-ratelimit-limit";
const RATE_LIMIT_REMAINING: &str = "x-ratelimit-remaining";

/// Why a request was denied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Denial {
    Attack(AttackKind),
    Bot,
    RateLimited { retry_after: Duration },
}

/// Shield state shared by all requests.
pub struct Shield {
    mode: ShieldMode,
    allow_search_engines: bool,
    limiter: RateLimiter,
}

impl Shield {
    pub fn new(config: &ShieldConfig) -> Self {
        Self {
            mode: config.mode,
            allow_search_engines: config.allow_search_engines,
            limiter: RateLimiter::new(
                config.rate_limit_capacity,
                config.rate_limit_refill_rate,
                config.rate_limit_interval,
            ),
        }
    }

    /// Run all checks for one request from `client`.
    ///
    /// Returns the tokens left in the client's bucket when allowed. The rate
    /// limit is only charged for requests that pass the other checks.
    pub fn evaluate(&self, client: &str, headers: &HeaderMap, uri: &Uri) -> Result<u32, Denial> {
        if let Some(kind) = attack::detect(uri) {
            return Err(Denial::Attack(kind));
        }

        let user_agent = headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok());
        match bot::classify(user_agent) {
            ClientKind::Human => {}
            ClientKind::SearchEngine if self.allow_search_engines => {}
            ClientKind::SearchEngine | ClientKind::Automated => return Err(Denial::Bot),
        }

        match self.limiter.check(client) {
            RateDecision::Allowed { remaining } => Ok(remaining),
            RateDecision::Limited { retry_after } => Err(Denial::RateLimited { retry_after }),
        }
    }

    fn denial_response(&self, denial: Denial) -> Response {
        match denial {
            Denial::Attack(_) => AppError::Forbidden("Request blocked".to_string()).into_response(),
            Denial::Bot => AppError::Forbidden("Bot detected".to_string()).into_response(),
            Denial::RateLimited { retry_after } => {
                let retry_after_secs = retry_after.as_secs_f64().ceil().max(1.0) as u64;
                let mut response = AppError::RateLimited {
                    message: "Rate limit exceeded".to_string(),
                    retry_after_secs,
                }
                .into_response();
                self.set_rate_headers(response.headers_mut(), 0);
                response
            }
        }
    }

    fn set_rate_headers(&self, headers: &mut HeaderMap, remaining: u32) {
        headers.insert(RATE_LIMIT_LIMIT, HeaderValue::from(self.limiter.capacity()));
        headers.insert(RATE_LIMIT_REMAINING, HeaderValue::from(remaining));
    }
}

/// Shield middleware.
pub async fn protect(State(shield): State<Arc<Shield>>, request: Request, next: Next) -> Response {
    let client = client_ip(&request)
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    match shield.evaluate(&client, request.headers(), request.uri()) {
        Ok(remaining) => {
            let mut response = next.run(request).await;
            shield.set_rate_headers(response.headers_mut(), remaining);
            response
        }
        Err(denial) if shield.mode == ShieldMode::DryRun => {
            tracing::warn!(client = %client, uri = %request.uri(), denial = ?denial, "Shield would deny request (dry run)");
            next.run(request).await
        }
        Err(denial) => {
            tracing::warn!(client = %client, uri = %request.uri(), denial = ?denial, "Shield denied request");
            shield.denial_response(denial)
        }
    }
}

/// Periodically drop idle rate limit buckets.
pub fn spawn_cleanup(shield: Arc<Shield>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            shield.limiter.cleanup();
            tracing::debug!(
                tracked_clients = shield.limiter.tracked_clients(),
                "Rate limit buckets swept"
            );
        }
    })
}
