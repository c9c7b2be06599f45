//! Per-request header and client IP logging.

use axum::{
    extract::Request,
    http::{header, HeaderMap, HeaderName},
    middleware::Next,
    response::Response,
};

use super::client_ip;

const REDACTED: &str = "[redacted]";

fn is_sensitive(name: &HeaderName) -> bool {
    *name == header::AUTHORIZATION || *name == header::COOKIE || *name == header::SET_COOKIE
}

/// Log the request headers and the client IP, then continue.
pub async fn log_request(request: Request, next: Next) -> Response {
    let headers = redacted_headers(request.headers());
    let ip = client_ip(&request)
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    tracing::info!(method = %request.method(), uri = %request.uri(), headers = ?headers, "Headers");
    tracing::info!(client_ip = %ip, "Client IP");

    next.run(request).await
}

/// Header pairs with credential-bearing values masked.
fn redacted_headers(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            let shown = if is_sensitive(name) {
                REDACTED.to_string()
            } else {
                String::from_utf8_lossy(value.as_bytes()).into_owned()
            };
            (name.as_str().to_string(), shown)
        })
        .collect()
}
