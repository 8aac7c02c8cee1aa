//! Client identity used as the admission key.

use std::net::{IpAddr, SocketAddr};

use axum::extract::ConnectInfo;
use axum::http::{HeaderMap, Request};
use viddl_core::ClientKey;

use crate::http::constants::HEADER_FORWARDED_FOR;

/// Resolve the admission key for a request.
///
/// The peer address is used unless the deployment sits behind a trusted proxy,
/// in which case the left-most `X-Forwarded-For` entry wins when it parses as
/// an IP. Requests without either share the `unknown` key.
pub(crate) fn client_key<B>(req: &Request<B>, trust_forwarded_for: bool) -> ClientKey {
    if trust_forwarded_for && let Some(ip) = forwarded_ip(req.headers()) {
        return ClientKey::new(ip.to_string());
    }
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map_or_else(ClientKey::unknown, |ConnectInfo(addr)| {
            ClientKey::new(addr.ip().to_string())
        })
}

fn forwarded_ip(headers: &HeaderMap) -> Option<IpAddr> {
    headers
        .get(HEADER_FORWARDED_FOR)?
        .to_str()
        .ok()?
        .split(',')
        .next()
        .map(str::trim)
        .and_then(|first| first.parse().ok())
}
