//! Local-access guard for operational endpoints.
//!
//! Only the direct peer address is consulted. Forwarded headers are caller
//! supplied and never take part in the decision.
//!
//! The default policy is the literal pair `127.0.0.1` / `localhost`. Peers are
//! reported as numeric literals, so `localhost` does not match in practice and
//! IPv6 loopback (`::1`) is rejected. [`AccessPolicy::loopback`] covers
//! `127.0.0.0/8` and `::1` for deployments that opt in.

use std::net::IpAddr;
use std::str::FromStr;

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use ipnet::IpNet;
use thiserror::Error;

use crate::http::server::AppState;
use crate::observability::metrics;
use crate::security::address::ClientAddrs;

/// One entry of an access policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrustedAddress {
    /// Exact address; the peer must parse to the same address.
    Single(IpAddr),
    /// Any address inside the network.
    Network(IpNet),
    /// Compared byte-for-byte with the peer string.
    Literal(String),
}

impl TrustedAddress {
    /// Check whether a peer address matches this entry.
    pub fn matches(&self, peer: &str) -> bool {
        match self {
            TrustedAddress::Single(addr) => peer.parse::<IpAddr>().is_ok_and(|ip| ip == *addr),
            TrustedAddress::Network(net) => peer.parse::<IpAddr>().is_ok_and(|ip| net.contains(&ip)),
            TrustedAddress::Literal(literal) => literal == peer,
        }
    }
}

/// Returned for entries that are empty, contain whitespace, or look like an
/// address or network (contain `:` or `/`) but do not parse as one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid trusted address entry `{0}`")]
pub struct InvalidTrustedAddress(pub String);

impl FromStr for TrustedAddress {
    type Err = InvalidTrustedAddress;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(ip) = s.parse::<IpAddr>() {
            return Ok(TrustedAddress::Single(ip));
        }
        if let Ok(net) = s.parse::<IpNet>() {
            return Ok(TrustedAddress::Network(net));
        }
        if s.is_empty() || s.chars().any(|c| c.is_whitespace() || c == ':' || c == '/') {
            return Err(InvalidTrustedAddress(s.to_string()));
        }
        Ok(TrustedAddress::Literal(s.to_string()))
    }
}

/// Set of peer addresses considered local.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessPolicy {
    entries: Vec<TrustedAddress>,
}

impl AccessPolicy {
    /// Build from configuration strings, skipping entries that do not parse.
    pub fn from_entries<S: AsRef<str>>(entries: &[S]) -> Self {
        let entries = entries
            .iter()
            .filter_map(|entry| match entry.as_ref().parse::<TrustedAddress>() {
                Ok(parsed) => Some(parsed),
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping trusted address");
                    None
                }
            })
            .collect();
        Self { entries }
    }

    /// IPv4 and IPv6 loopback ranges.
    pub fn loopback() -> Self {
        Self::from_entries(&["127.0.0.0/8", "::1"])
    }

    /// Check whether a peer address is covered by the policy.
    pub fn permits(&self, peer: &str) -> bool {
        self.entries.iter().any(|entry| entry.matches(peer))
    }

    pub fn entries(&self) -> &[TrustedAddress] {
        &self.entries
    }
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self::from_entries(&["127.0.0.1", "localhost"])
    }
}

/// Authorization failure for a non-local peer. Rendered as 401.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("peer {peer} is not allowed to access local-only endpoints")]
pub struct AccessDenied {
    pub peer: String,
}

impl IntoResponse for AccessDenied {
    fn into_response(self) -> Response {
        (StatusCode::UNAUTHORIZED, "Unauthorized").into_response()
    }
}

/// Outcome of a guard check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Reject(AccessDenied),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    pub fn into_result(self) -> Result<(), AccessDenied> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Reject(denied) => Err(denied),
        }
    }
}

/// Gate for endpoints restricted to local callers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalAccessGuard {
    policy: AccessPolicy,
}

impl LocalAccessGuard {
    pub fn new(policy: AccessPolicy) -> Self {
        Self { policy }
    }

    /// Decide on a request. Only the peer address is read.
    pub fn check(&self, addrs: &ClientAddrs) -> Decision {
        self.check_peer(addrs.peer())
    }

    pub fn check_peer(&self, peer: &str) -> Decision {
        if self.policy.permits(peer) {
            Decision::Allow
        } else {
            Decision::Reject(AccessDenied {
                peer: peer.to_string(),
            })
        }
    }
}

/// Middleware rejecting non-local peers before the wrapped handler runs.
pub async fn local_access_middleware(
    State(state): State<AppState>,
    addrs: ClientAddrs,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AccessDenied> {
    let runtime = state.runtime();
    if let Err(denied) = runtime.guard.check(&addrs).into_result() {
        tracing::debug!(peer = %denied.peer, path = %request.uri().path(), "Local access denied");
        metrics::record_access_denied(&state.stats);
        return Err(denied);
    }
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guard() -> LocalAccessGuard {
        LocalAccessGuard::default()
    }

    #[test]
    fn default_policy_allows_literal_pair() {
        assert_eq!(guard().check_peer("127.0.0.1"), Decision::Allow);
        assert_eq!(guard().check_peer("localhost"), Decision::Allow);
    }

    #[test]
    fn default_policy_rejects_everything_else() {
        for peer in ["10.0.0.5", "8.8.8.8", "127.0.0.2", "::1", "", "LOCALHOST"] {
            assert_eq!(
                guard().check_peer(peer),
                Decision::Reject(AccessDenied { peer: peer.to_string() }),
                "peer {peer:?}"
            );
        }
    }

    #[test]
    fn decision_ignores_forwarded_chain() {
        let guard = guard();
        let chains: [Vec<String>; 3] = [
            vec![],
            vec!["127.0.0.1".into()],
            vec!["8.8.8.8".into(), "localhost".into()],
        ];

        for chain in chains {
            assert!(guard.check(&ClientAddrs::new("127.0.0.1", chain.clone())).is_allowed());
            assert!(!guard.check(&ClientAddrs::new("8.8.8.8", chain)).is_allowed());
        }
    }

    #[test]
    fn check_is_repeatable() {
        let guard = guard();
        let addrs = ClientAddrs::new("10.0.0.5", vec![]);
        assert_eq!(guard.check(&addrs), guard.check(&addrs));
    }

    #[test]
    fn loopback_policy_covers_ipv4_range_and_ipv6() {
        let guard = LocalAccessGuard::new(AccessPolicy::loopback());
        assert!(guard.check_peer("127.0.0.1").is_allowed());
        assert!(guard.check_peer("127.10.0.3").is_allowed());
        assert!(guard.check_peer("::1").is_allowed());
        assert!(!guard.check_peer("localhost").is_allowed());
        assert!(!guard.check_peer("10.0.0.5").is_allowed());
    }

    #[test]
    fn parses_entry_kinds() {
        assert!(matches!("::1".parse::<TrustedAddress>(), Ok(TrustedAddress::Single(_))));
        assert!(matches!("10.0.0.0/8".parse::<TrustedAddress>(), Ok(TrustedAddress::Network(_))));
        assert_eq!(
            "localhost".parse::<TrustedAddress>(),
            Ok(TrustedAddress::Literal("localhost".into()))
        );
        assert!("".parse::<TrustedAddress>().is_err());
        assert!("local host".parse::<TrustedAddress>().is_err());
    }

    #[test]
    fn rejects_malformed_networks_and_addresses() {
        for entry in ["127.0.0.0/33", "::1/129", "10.0.0.0/", "::g", "127.0.0.1:80"] {
            assert_eq!(
                entry.parse::<TrustedAddress>(),
                Err(InvalidTrustedAddress(entry.to_string())),
                "entry {entry:?}"
            );
        }
    }

    #[test]
    fn single_entry_compares_parsed_addresses() {
        let entry: TrustedAddress = "::1".parse().unwrap();
        assert!(entry.matches("0:0:0:0:0:0:0:1"));
        assert!(!entry.matches("not-an-ip"));
    }

    #[test]
    fn invalid_entries_are_skipped() {
        let policy = AccessPolicy::from_entries(&["127.0.0.1", "bad entry"]);
        assert_eq!(policy.entries().len(), 1);
    }

    #[test]
    fn access_denied_maps_to_unauthorized() {
        let response = AccessDenied { peer: "8.8.8.8".into() }.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
