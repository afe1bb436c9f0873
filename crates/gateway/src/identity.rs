//! Client-identity extraction.
//!
//! Quota enforcement keys on an opaque identity string — in practice the
//! client IP.  Forwarded headers are trusted (the gateway is expected to sit
//! behind a reverse proxy that sets them).

use std::net::SocketAddr;

use axum::http::HeaderMap;

/// Resolve the quota identity for a request: the first hop of
/// `X-Forwarded-For`, else `X-Real-Ip`, else the socket peer address.
pub fn client_identity(headers: &HeaderMap, peer: SocketAddr) -> String {
    if let Some(forwarded) = header_str(headers, "x-forwarded-for") {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }
    if let Some(real_ip) = header_str(headers, "x-real-ip") {
        let real_ip = real_ip.trim();
        if !real_ip.is_empty() {
            return real_ip.to_string();
        }
    }
    peer.ip().to_string()
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
