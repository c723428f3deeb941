//! Client address resolution.
//!
//! Forwarded headers are only honoured when the gateway is configured to sit
//! behind a trusted reverse proxy; otherwise the socket peer address wins.

use std::net::SocketAddr;

use axum::http::HeaderMap;

use crate::security::keys::normalize_ip;

pub const X_FORWARDED_FOR: &str = "x-forwarded-for";
pub const X_REAL_IP: &str = "x-real-ip";

/// Placeholder address for requests with no usable peer information.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Resolve the caller's canonical IP address.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>, trust_forwarded: bool) -> String {
    if trust_forwarded {
        let forwarded = headers
            .get(X_FORWARDED_FOR)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(normalize_ip);
        if let Some(ip) = forwarded {
            return ip;
        }

        let real = headers
            .get(X_REAL_IP)
            .and_then(|v| v.to_str().ok())
            .and_then(normalize_ip);
        if let Some(ip) = real {
            return ip;
        }
    }

    peer.map(|addr| addr.ip().to_canonical().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn peer() -> Option<SocketAddr> {
        Some("192.0.2.7:5555".parse().unwrap())
    }

    #[test]
    fn peer_address_when_untrusted() {
        let mut headers = HeaderMap::new();
        headers.insert(X_FORWARDED_FOR, HeaderValue::from_static("203.0.113.9"));
        assert_eq!(client_ip(&headers, peer(), false), "192.0.2.7");
    }

    #[test]
    fn first_forwarded_hop_when_trusted() {
        let mut headers = HeaderMap::new();
        headers.insert(
            X_FORWARDED_FOR,
            HeaderValue::from_static("203.0.113.9, 10.0.0.1"),
        );
        assert_eq!(client_ip(&headers, peer(), true), "203.0.113.9");
    }

    #[test]
    fn falls_back_through_real_ip_to_peer() {
        let mut headers = HeaderMap::new();
        headers.insert(X_FORWARDED_FOR, HeaderValue::from_static("garbage"));
        headers.insert(X_REAL_IP, HeaderValue::from_static("198.51.100.4"));
        assert_eq!(client_ip(&headers, peer(), true), "198.51.100.4");

        headers.remove(X_REAL_IP);
        assert_eq!(client_ip(&headers, peer(), true), "192.0.2.7");
        assert_eq!(client_ip(&headers, None, true), UNKNOWN_CLIENT);
    }
}
