//! Caller identity resolution.

use std::net::SocketAddr;

use axum::http::HeaderMap;

/// Sentinel identity shared by every caller whose address cannot be
/// resolved.
///
/// Deliberately one bucket: unresolved callers throttle as a group
/// rather than each receiving fresh quota.
pub const UNKNOWN_IDENTITY: &str = "unknown";

/// Resolve the identity a limiter tracks a request under.
///
/// Models a reverse-proxy deployment where the nearest trusted hop
/// rewrites headers: the first `X-Forwarded-For` entry wins, then
/// `X-Real-IP`, then the transport peer address, then
/// [`UNKNOWN_IDENTITY`].
pub fn client_identity(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
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

    match peer {
        Some(addr) => addr.ip().to_string(),
        None => UNKNOWN_IDENTITY.to_string(),
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer() -> Option<SocketAddr> {
        Some(SocketAddr::from(([198, 51, 100, 7], 44321)))
    }

    #[test]
    fn forwarded_chain_uses_first_entry() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.5, 10.0.0.1".parse().unwrap());

        assert_eq!(client_identity(&headers, peer()), "203.0.113.5");
    }

    #[test]
    fn forwarded_entry_is_trimmed() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "  203.0.113.5 ,10.0.0.1".parse().unwrap());

        assert_eq!(client_identity(&headers, peer()), "203.0.113.5");
    }

    #[test]
    fn empty_forwarded_header_falls_through() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "  ".parse().unwrap());
        headers.insert("x-real-ip", "192.0.2.9".parse().unwrap());

        assert_eq!(client_identity(&headers, peer()), "192.0.2.9");
    }

    #[test]
    fn real_ip_wins_over_peer() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", " 192.0.2.9 ".parse().unwrap());

        assert_eq!(client_identity(&headers, peer()), "192.0.2.9");
    }

    #[test]
    fn peer_address_is_the_transport_fallback() {
        assert_eq!(client_identity(&HeaderMap::new(), peer()), "198.51.100.7");
    }

    #[test]
    fn unknown_when_nothing_is_available() {
        assert_eq!(client_identity(&HeaderMap::new(), None), UNKNOWN_IDENTITY);
    }
}
