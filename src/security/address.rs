//! Client address resolution.
//!
//! A request is reduced to its direct peer address and the forwarded address
//! chain declared by proxy headers. The chain is client-controlled unless a
//! trusted reverse proxy rewrites it, so it is informational only and must
//! never feed an authorization decision.

use axum::http::HeaderMap;

use crate::config::ClientIpConfig;

/// The addresses a single request exposes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientAddrs {
    peer: String,
    forwarded: Vec<String>,
}

impl ClientAddrs {
    pub fn new(peer: impl Into<String>, forwarded: Vec<String>) -> Self {
        Self {
            peer: peer.into(),
            forwarded,
        }
    }

    /// Build from a transport peer address and the request headers.
    ///
    /// The forwarded chain is left empty when forwarded headers are not
    /// trusted.
    pub fn from_headers(peer: impl Into<String>, headers: &HeaderMap, config: &ClientIpConfig) -> Self {
        let forwarded = if config.trust_forwarded_header {
            parse_forwarded(headers, &config.forwarded_header)
        } else {
            Vec::new()
        };
        Self::new(peer, forwarded)
    }

    /// Direct-connection peer address as reported by the transport.
    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Forwarded address chain, in header order.
    pub fn forwarded(&self) -> &[String] {
        &self.forwarded
    }

    /// Key used to bucket the caller for rate limiting: the first
    /// forwarded address when present, otherwise the peer.
    pub fn rate_limit_key(&self) -> &str {
        self.forwarded.first().map(String::as_str).unwrap_or(&self.peer)
    }
}

/// Split every occurrence of `header` on commas, trimming entries and
/// dropping empty ones.
fn parse_forwarded(headers: &HeaderMap, header: &str) -> Vec<String> {
    headers
        .get_all(header)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

/// Resolve the address string echoed back to the caller.
///
/// Returns the peer address when no forwarded chain is present, otherwise
/// the chain joined by single spaces in its original order.
pub fn resolve_address(addrs: &ClientAddrs) -> String {
    if addrs.forwarded.is_empty() {
        addrs.peer.clone()
    } else {
        addrs.forwarded.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(values: &[&str]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for v in values {
            map.append("x-forwarded-for", HeaderValue::from_str(v).unwrap());
        }
        map
    }

    #[test]
    fn resolves_peer_without_forwarded_chain() {
        let addrs = ClientAddrs::new("203.0.113.7", vec![]);
        assert_eq!(resolve_address(&addrs), "203.0.113.7");
    }

    #[test]
    fn resolves_forwarded_chain_in_order() {
        let addrs = ClientAddrs::new(
            "10.0.0.1",
            vec!["a".into(), "b".into(), "c".into()],
        );
        assert_eq!(resolve_address(&addrs), "a b c");
    }

    #[test]
    fn peer_is_returned_verbatim() {
        let addrs = ClientAddrs::new("::ffff:127.0.0.1", vec![]);
        assert_eq!(resolve_address(&addrs), "::ffff:127.0.0.1");
    }

    #[test]
    fn resolution_is_repeatable() {
        let addrs = ClientAddrs::new("10.0.0.1", vec!["203.0.113.7".into()]);
        assert_eq!(resolve_address(&addrs), resolve_address(&addrs));
    }

    #[test]
    fn parses_comma_separated_header() {
        let config = ClientIpConfig::default();
        let addrs = ClientAddrs::from_headers(
            "10.0.0.1",
            &headers(&["203.0.113.7, 198.51.100.2"]),
            &config,
        );
        assert_eq!(addrs.forwarded(), ["203.0.113.7", "198.51.100.2"]);
    }

    #[test]
    fn concatenates_repeated_headers_and_skips_empty_entries() {
        let config = ClientIpConfig::default();
        let addrs = ClientAddrs::from_headers(
            "10.0.0.1",
            &headers(&["203.0.113.7,,", " 198.51.100.2 "]),
            &config,
        );
        assert_eq!(addrs.forwarded(), ["203.0.113.7", "198.51.100.2"]);
    }

    #[test]
    fn ignores_forwarded_header_when_untrusted() {
        let config = ClientIpConfig {
            trust_forwarded_header: false,
            ..ClientIpConfig::default()
        };
        let addrs = ClientAddrs::from_headers("10.0.0.1", &headers(&["203.0.113.7"]), &config);
        assert!(addrs.forwarded().is_empty());
        assert_eq!(resolve_address(&addrs), "10.0.0.1");
    }

    #[test]
    fn reads_configured_header_name() {
        let config = ClientIpConfig {
            forwarded_header: "x-real-ip".into(),
            ..ClientIpConfig::default()
        };
        let mut map = headers(&["198.51.100.2"]);
        map.insert("x-real-ip", HeaderValue::from_static("203.0.113.9"));

        let addrs = ClientAddrs::from_headers("10.0.0.1", &map, &config);
        assert_eq!(addrs.forwarded(), ["203.0.113.9"]);
    }

    #[test]
    fn rate_limit_key_prefers_first_forwarded() {
        let direct = ClientAddrs::new("10.0.0.1", vec![]);
        assert_eq!(direct.rate_limit_key(), "10.0.0.1");

        let proxied = ClientAddrs::new("10.0.0.1", vec!["203.0.113.7".into(), "10.0.0.2".into()]);
        assert_eq!(proxied.rate_limit_key(), "203.0.113.7");
    }
}
