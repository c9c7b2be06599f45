//! Request middleware that is not tied to a single concern module.

pub mod request_log;

use std::net::{IpAddr, SocketAddr};

use axum::extract::{ConnectInfo, Request};

/// Peer IP of the connection, when the server was started with connect info.
pub fn client_ip(request: &Request) -> Option<IpAddr> {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
}
